//! Shared error types for the services crate.

use thiserror::Error;

use flash_core::model::{CardError, CardId, DeckError};
use flash_core::scheduler::SchedulerError;
use storage::StorageError;

/// Errors emitted by `ReviewService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ReviewServiceError {
    #[error("no card at index {index}")]
    CardNotFound { index: usize },
    #[error(transparent)]
    Scheduler(#[from] SchedulerError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted by `DeckService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum DeckServiceError {
    #[error("deck {0:?} does not exist")]
    DeckNotFound(String),
    #[error("a deck named {0:?} already exists")]
    AlreadyExists(String),
    #[error("card {0} is not in this deck")]
    CardNotFound(CardId),
    #[error(transparent)]
    Deck(#[from] DeckError),
    #[error(transparent)]
    Card(#[from] CardError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted by study sessions.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StudyError {
    #[error("deck {0:?} does not exist")]
    DeckNotFound(String),
    #[error("no flashcards in this deck")]
    EmptyDeck,
    #[error("reveal the answer before judging the card")]
    NotRevealed,
    #[error(transparent)]
    Review(#[from] ReviewServiceError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}
