use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::model::card::{Card, CardError};
use crate::model::ids::CardId;

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq)]
#[non_exhaustive]
pub enum DeckError {
    #[error("deck name cannot be empty")]
    EmptyName,

    #[error("deck name cannot contain path separators: {0}")]
    InvalidName(String),

    #[error(transparent)]
    Card(#[from] CardError),
}

//
// ─── DECK ──────────────────────────────────────────────────────────────────────
//

/// A named, ordered collection of flashcards.
///
/// Cards keep insertion order and are addressed by index. Id uniqueness
/// within a deck is the caller's concern.
#[derive(Debug, Clone, PartialEq)]
pub struct Deck {
    name: String,
    cards: Vec<Card>,
}

impl Deck {
    /// Creates an empty deck.
    ///
    /// # Errors
    ///
    /// Returns `DeckError::EmptyName` if the name is blank, or
    /// `DeckError::InvalidName` if it contains `/` or `\`.
    pub fn new(name: impl Into<String>) -> Result<Self, DeckError> {
        Self::with_cards(name, Vec::new())
    }

    /// Creates a deck from existing cards, preserving their order.
    ///
    /// # Errors
    ///
    /// Same name rules as [`Deck::new`].
    pub fn with_cards(name: impl Into<String>, cards: Vec<Card>) -> Result<Self, DeckError> {
        Ok(Self {
            name: validate_name(name.into())?,
            cards,
        })
    }

    // Accessors
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn cards(&self) -> &[Card] {
        &self.cards
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.cards.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }

    #[must_use]
    pub fn card(&self, index: usize) -> Option<&Card> {
        self.cards.get(index)
    }

    pub fn card_mut(&mut self, index: usize) -> Option<&mut Card> {
        self.cards.get_mut(index)
    }

    #[must_use]
    pub fn card_by_id(&self, id: &CardId) -> Option<&Card> {
        self.cards.iter().find(|c| c.id() == id)
    }

    #[must_use]
    pub fn position(&self, id: &CardId) -> Option<usize> {
        self.cards.iter().position(|c| c.id() == id)
    }

    /// Renames the deck.
    ///
    /// # Errors
    ///
    /// Same name rules as [`Deck::new`]; the name is unchanged on error.
    pub fn rename(&mut self, name: impl Into<String>) -> Result<(), DeckError> {
        self.name = validate_name(name.into())?;
        Ok(())
    }

    /// Creates a new card and appends it to the deck.
    ///
    /// # Errors
    ///
    /// Returns `DeckError::Card` if the card content is invalid.
    pub fn add_card(
        &mut self,
        front: impl Into<String>,
        back: impl Into<String>,
        notes: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Result<&Card, DeckError> {
        let card = Card::new(front, back, notes, now)?;
        self.cards.push(card);
        let last = self.cards.len() - 1;
        Ok(&self.cards[last])
    }

    pub fn push_card(&mut self, card: Card) {
        self.cards.push(card);
    }

    /// Removes every card with the given id. Returns whether anything was removed.
    pub fn remove_card(&mut self, id: &CardId) -> bool {
        let before = self.cards.len();
        self.cards.retain(|c| c.id() != id);
        self.cards.len() != before
    }
}

fn validate_name(name: String) -> Result<String, DeckError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(DeckError::EmptyName);
    }
    if trimmed.contains(['/', '\\']) {
        return Err(DeckError::InvalidName(trimmed.to_owned()));
    }
    Ok(trimmed.to_owned())
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
