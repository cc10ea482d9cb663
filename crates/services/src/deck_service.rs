use std::path::{Path, PathBuf};
use std::sync::Arc;

use flash_core::model::{Card, CardError, CardId, Deck, Difficulty};
use flash_core::stats::DeckStats;
use storage::transfer;
use storage::{DeckRepository, TimestampPolicy};

use crate::Clock;
use crate::error::DeckServiceError;

/// What to do when an imported deck's name is already taken.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImportConflict {
    /// Replace the stored deck.
    Overwrite,
    /// Store the imported deck under another name.
    Rename(String),
    /// Leave the stored deck alone and drop the import.
    Skip,
}

/// Result of [`DeckService::import_deck`], carrying the name the deck ended up under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImportOutcome {
    Imported(String),
    Replaced(String),
    Skipped(String),
}

/// Orchestrates deck and card edits and persistence.
#[derive(Clone)]
pub struct DeckService {
    clock: Clock,
    decks: Arc<dyn DeckRepository>,
    policy: TimestampPolicy,
}

impl DeckService {
    #[must_use]
    pub fn new(clock: Clock, decks: Arc<dyn DeckRepository>) -> Self {
        Self {
            clock,
            decks,
            policy: TimestampPolicy::default(),
        }
    }

    /// Timestamp handling for imported deck files.
    #[must_use]
    pub fn with_timestamp_policy(mut self, policy: TimestampPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Create and persist an empty deck.
    ///
    /// # Errors
    ///
    /// Returns `DeckServiceError::AlreadyExists` if the name is taken,
    /// `DeckServiceError::Deck` for an invalid name, or storage errors.
    pub async fn create_deck(&self, name: &str) -> Result<Deck, DeckServiceError> {
        let deck = Deck::new(name)?;
        self.ensure_free(deck.name()).await?;
        self.decks.save_deck(&deck).await?;
        log::info!("created deck {:?}", deck.name());
        Ok(deck)
    }

    /// Every stored deck, ordered by name.
    ///
    /// # Errors
    ///
    /// Returns `DeckServiceError::Storage` if repository access fails.
    pub async fn list_decks(&self) -> Result<Vec<Deck>, DeckServiceError> {
        Ok(self.decks.load_decks().await?)
    }

    /// Fetch a deck by name.
    ///
    /// Returns `Ok(None)` when the deck does not exist.
    ///
    /// # Errors
    ///
    /// Returns `DeckServiceError::Storage` if repository access fails.
    pub async fn get_deck(&self, name: &str) -> Result<Option<Deck>, DeckServiceError> {
        Ok(self.decks.get_deck(name).await?)
    }

    /// Rename a deck, keeping its cards and their scheduling state.
    ///
    /// # Errors
    ///
    /// Returns `DeckServiceError::DeckNotFound`, `DeckServiceError::AlreadyExists`
    /// when the new name is taken, `DeckServiceError::Deck` for an invalid name,
    /// or storage errors.
    pub async fn rename_deck(&self, name: &str, new_name: &str) -> Result<Deck, DeckServiceError> {
        let mut deck = self.require_deck(name).await?;
        deck.rename(new_name)?;
        if deck.name() == name {
            return Ok(deck);
        }
        self.ensure_free(deck.name()).await?;

        // Save under the new name first so a failure never loses the deck.
        self.decks.save_deck(&deck).await?;
        self.decks.delete_deck(name).await?;
        log::info!("renamed deck {name:?} to {:?}", deck.name());
        Ok(deck)
    }

    /// Delete a deck. Returns whether it existed.
    ///
    /// # Errors
    ///
    /// Returns `DeckServiceError::Storage` if repository access fails.
    pub async fn delete_deck(&self, name: &str) -> Result<bool, DeckServiceError> {
        let removed = self.decks.delete_deck(name).await?;
        if removed {
            log::info!("deleted deck {name:?}");
        }
        Ok(removed)
    }

    /// Append a new card to a deck, optionally with a starting difficulty.
    ///
    /// # Errors
    ///
    /// Returns `DeckServiceError::DeckNotFound`, `DeckServiceError::Deck` for
    /// blank card sides, or storage errors.
    pub async fn add_card(
        &self,
        deck_name: &str,
        front: &str,
        back: &str,
        notes: &str,
        difficulty: Option<Difficulty>,
    ) -> Result<CardId, DeckServiceError> {
        let mut deck = self.require_deck(deck_name).await?;
        let now = self.clock.now();
        let id = deck.add_card(front, back, notes, now)?.id().clone();
        if let (Some(difficulty), Some(card)) = (difficulty, card_in(&mut deck, &id)) {
            card.set_difficulty(difficulty);
        }
        self.decks.save_deck(&deck).await?;
        log::debug!("added card {id} to deck {deck_name:?}");
        Ok(id)
    }

    /// Replace both sides of a card.
    ///
    /// # Errors
    ///
    /// Returns not-found errors, `DeckServiceError::Card` for blank sides, or
    /// storage errors.
    pub async fn edit_card(
        &self,
        deck_name: &str,
        card_id: &CardId,
        front: &str,
        back: &str,
    ) -> Result<(), DeckServiceError> {
        self.update_card(deck_name, card_id, |card| card.edit(front, back))
            .await
    }

    /// Change how hard a card is rated.
    ///
    /// # Errors
    ///
    /// Returns not-found errors or storage errors.
    pub async fn set_difficulty(
        &self,
        deck_name: &str,
        card_id: &CardId,
        difficulty: Difficulty,
    ) -> Result<(), DeckServiceError> {
        self.update_card(deck_name, card_id, |card| {
            card.set_difficulty(difficulty);
            Ok(())
        })
        .await
    }

    /// Replace a card's notes.
    ///
    /// # Errors
    ///
    /// Returns not-found errors or storage errors.
    pub async fn set_notes(
        &self,
        deck_name: &str,
        card_id: &CardId,
        notes: &str,
    ) -> Result<(), DeckServiceError> {
        self.update_card(deck_name, card_id, |card| {
            card.set_notes(notes);
            Ok(())
        })
        .await
    }

    /// Remove a card from a deck.
    ///
    /// # Errors
    ///
    /// Returns `DeckServiceError::DeckNotFound`, `DeckServiceError::CardNotFound`,
    /// or storage errors.
    pub async fn remove_card(&self, deck_name: &str, card_id: &CardId) -> Result<(), DeckServiceError> {
        let mut deck = self.require_deck(deck_name).await?;
        if !deck.remove_card(card_id) {
            return Err(DeckServiceError::CardNotFound(card_id.clone()));
        }
        self.decks.save_deck(&deck).await?;
        Ok(())
    }

    /// Counters and accuracy for a stored deck.
    ///
    /// # Errors
    ///
    /// Returns `DeckServiceError::DeckNotFound` or storage errors.
    pub async fn deck_stats(&self, name: &str) -> Result<DeckStats, DeckServiceError> {
        let deck = self.require_deck(name).await?;
        Ok(DeckStats::from_deck(&deck, self.clock.now()))
    }

    /// Write a stored deck to a `.deck` file. Returns the path written.
    ///
    /// # Errors
    ///
    /// Returns `DeckServiceError::DeckNotFound` or storage errors.
    pub async fn export_deck(&self, name: &str, path: &Path) -> Result<PathBuf, DeckServiceError> {
        let deck = self.require_deck(name).await?;
        Ok(transfer::export_deck(&deck, path).await?)
    }

    /// Read a deck file and store it, resolving name clashes with `on_conflict`.
    ///
    /// # Errors
    ///
    /// Returns storage errors for unreadable files, `DeckServiceError::AlreadyExists`
    /// if a rename target is also taken, or `DeckServiceError::Deck` for an
    /// invalid rename target.
    pub async fn import_deck(
        &self,
        path: &Path,
        on_conflict: ImportConflict,
    ) -> Result<ImportOutcome, DeckServiceError> {
        let mut deck = transfer::import_deck(path, self.clock.now(), self.policy).await?;

        let outcome = if self.decks.get_deck(deck.name()).await?.is_none() {
            ImportOutcome::Imported(deck.name().to_owned())
        } else {
            match on_conflict {
                ImportConflict::Skip => {
                    log::info!("skipped import of existing deck {:?}", deck.name());
                    return Ok(ImportOutcome::Skipped(deck.name().to_owned()));
                }
                ImportConflict::Overwrite => ImportOutcome::Replaced(deck.name().to_owned()),
                ImportConflict::Rename(new_name) => {
                    deck.rename(new_name)?;
                    self.ensure_free(deck.name()).await?;
                    ImportOutcome::Imported(deck.name().to_owned())
                }
            }
        };

        self.decks.save_deck(&deck).await?;
        log::info!(
            "imported deck {:?} ({} cards) from {}",
            deck.name(),
            deck.len(),
            path.display()
        );
        Ok(outcome)
    }

    async fn require_deck(&self, name: &str) -> Result<Deck, DeckServiceError> {
        self.decks
            .get_deck(name)
            .await?
            .ok_or_else(|| DeckServiceError::DeckNotFound(name.to_owned()))
    }

    async fn ensure_free(&self, name: &str) -> Result<(), DeckServiceError> {
        if self.decks.get_deck(name).await?.is_some() {
            return Err(DeckServiceError::AlreadyExists(name.to_owned()));
        }
        Ok(())
    }

    async fn update_card<F>(
        &self,
        deck_name: &str,
        card_id: &CardId,
        change: F,
    ) -> Result<(), DeckServiceError>
    where
        F: FnOnce(&mut Card) -> Result<(), CardError>,
    {
        let mut deck = self.require_deck(deck_name).await?;
        let card = card_in(&mut deck, card_id)
            .ok_or_else(|| DeckServiceError::CardNotFound(card_id.clone()))?;
        change(card)?;
        self.decks.save_deck(&deck).await?;
        Ok(())
    }
}

fn card_in<'a>(deck: &'a mut Deck, id: &CardId) -> Option<&'a mut Card> {
    let index = deck.position(id)?;
    deck.card_mut(index)
}
