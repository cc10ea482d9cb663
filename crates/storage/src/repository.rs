use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use thiserror::Error;

use flash_core::Clock;
use flash_core::model::{CardError, Deck, DeckError};
use flash_core::time::TimestampError;

use crate::json::JsonDirRepository;

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("not found")]
    NotFound,

    #[error("conflict")]
    Conflict,

    #[error("invalid deck name: {0:?}")]
    InvalidDeckName(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error(transparent)]
    Timestamp(#[from] TimestampError),

    #[error(transparent)]
    Card(#[from] CardError),

    #[error(transparent)]
    Deck(#[from] DeckError),
}

/// The card store: decks are saved and loaded whole, keyed by name.
#[async_trait]
pub trait DeckRepository: Send + Sync {
    /// Persist a deck, replacing any stored deck with the same name.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the deck cannot be stored.
    async fn save_deck(&self, deck: &Deck) -> Result<(), StorageError>;

    /// Fetch a deck by name.
    ///
    /// Returns `Ok(None)` when no such deck exists.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the deck exists but cannot be read.
    async fn get_deck(&self, name: &str) -> Result<Option<Deck>, StorageError>;

    /// Load every readable deck, ordered by name.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the store itself cannot be listed.
    async fn load_decks(&self) -> Result<Vec<Deck>, StorageError>;

    /// Delete a deck by name. Returns whether a deck was removed.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if removal fails.
    async fn delete_deck(&self, name: &str) -> Result<bool, StorageError>;
}

/// Simple in-memory repository implementation for testing and prototyping.
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    decks: Arc<Mutex<BTreeMap<String, Deck>>>,
}

impl InMemoryRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

fn poisoned<E: std::fmt::Display>(e: E) -> StorageError {
    StorageError::Io(std::io::Error::other(e.to_string()))
}

#[async_trait]
impl DeckRepository for InMemoryRepository {
    async fn save_deck(&self, deck: &Deck) -> Result<(), StorageError> {
        let mut guard = self.decks.lock().map_err(poisoned)?;
        guard.insert(deck.name().to_owned(), deck.clone());
        Ok(())
    }

    async fn get_deck(&self, name: &str) -> Result<Option<Deck>, StorageError> {
        let guard = self.decks.lock().map_err(poisoned)?;
        Ok(guard.get(name).cloned())
    }

    async fn load_decks(&self) -> Result<Vec<Deck>, StorageError> {
        let guard = self.decks.lock().map_err(poisoned)?;
        Ok(guard.values().cloned().collect())
    }

    async fn delete_deck(&self, name: &str) -> Result<bool, StorageError> {
        let mut guard = self.decks.lock().map_err(poisoned)?;
        Ok(guard.remove(name).is_some())
    }
}

/// Deck repository behind a trait object for easy backend swapping.
#[derive(Clone)]
pub struct Storage {
    pub decks: Arc<dyn DeckRepository>,
}

impl Storage {
    #[must_use]
    pub fn in_memory() -> Self {
        Self {
            decks: Arc::new(InMemoryRepository::new()),
        }
    }

    /// Build a `Storage` backed by one JSON file per deck under `dir`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Io` if the directory cannot be created.
    pub async fn json_dir(
        dir: impl Into<PathBuf>,
        clock: Clock,
        policy: crate::TimestampPolicy,
    ) -> Result<Self, StorageError> {
        let repo = JsonDirRepository::open(dir, clock)
            .await?
            .with_timestamp_policy(policy);
        Ok(Self {
            decks: Arc::new(repo),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flash_core::time::fixed_now;

    fn build_deck(name: &str, cards: usize) -> Deck {
        let mut deck = Deck::new(name).unwrap();
        for i in 0..cards {
            deck.add_card(format!("Q{i}"), format!("A{i}"), "", fixed_now())
                .unwrap();
        }
        deck
    }

    #[tokio::test]
    async fn round_trips_deck_by_name() {
        let repo = InMemoryRepository::new();
        let deck = build_deck("Japanese", 2);
        repo.save_deck(&deck).await.unwrap();

        let fetched = repo.get_deck("Japanese").await.unwrap().unwrap();
        assert_eq!(fetched, deck);
        assert!(repo.get_deck("Missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn load_decks_is_sorted_and_delete_reports_presence() {
        let repo = InMemoryRepository::new();
        repo.save_deck(&build_deck("b", 0)).await.unwrap();
        repo.save_deck(&build_deck("a", 1)).await.unwrap();

        let names: Vec<_> = repo
            .load_decks()
            .await
            .unwrap()
            .iter()
            .map(|d| d.name().to_owned())
            .collect();
        assert_eq!(names, ["a", "b"]);

        assert!(repo.delete_deck("a").await.unwrap());
        assert!(!repo.delete_deck("a").await.unwrap());
    }

    #[tokio::test]
    async fn storage_in_memory_shares_one_backend() {
        let storage = Storage::in_memory();
        let clone = storage.clone();
        storage.decks.save_deck(&build_deck("x", 1)).await.unwrap();
        assert!(clone.decks.get_deck("x").await.unwrap().is_some());
    }
}
