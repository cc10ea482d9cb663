//! Study sessions: one open deck, the card on screen, and the review loop.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use flash_core::model::{Card, Deck, Difficulty};
use flash_core::scheduler::LearningRate;
use flash_core::stats::SessionTally;
use flash_core::time::Clock;
use storage::DeckRepository;

use crate::error::StudyError;
use crate::review_service::{ReviewResult, ReviewService};

/// What happened after judging the current card.
#[derive(Debug, Clone, PartialEq)]
pub struct AnswerOutcome {
    pub review: ReviewResult,
    pub next_index: usize,
}

//
// ─── SESSION ───────────────────────────────────────────────────────────────────
//

/// In-memory state of the deck currently being studied.
///
/// A session never persists anything itself; [`StudyService`] saves the deck
/// after every judged answer.
#[derive(Debug, Clone, PartialEq)]
pub struct StudySession {
    deck: Deck,
    current_index: usize,
    revealed: bool,
    notes_visible: bool,
    tally: SessionTally,
}

impl StudySession {
    /// Opens `deck`: adapts the learning rate once, then picks the first card.
    pub fn start(deck: Deck, reviews: &mut ReviewService) -> Self {
        reviews.activate_deck(&deck);
        let current_index = reviews.next_card_index(&deck);
        Self {
            deck,
            current_index,
            revealed: false,
            notes_visible: false,
            tally: SessionTally::new(),
        }
    }

    #[must_use]
    pub fn deck(&self) -> &Deck {
        &self.deck
    }

    #[must_use]
    pub fn current_index(&self) -> usize {
        self.current_index
    }

    #[must_use]
    pub fn is_revealed(&self) -> bool {
        self.revealed
    }

    #[must_use]
    pub fn notes_visible(&self) -> bool {
        self.notes_visible
    }

    #[must_use]
    pub fn tally(&self) -> &SessionTally {
        &self.tally
    }

    /// The card on screen.
    ///
    /// # Errors
    ///
    /// Returns `StudyError::EmptyDeck` when the deck has no cards.
    pub fn current_card(&self) -> Result<&Card, StudyError> {
        self.deck
            .card(self.current_index)
            .ok_or(StudyError::EmptyDeck)
    }

    /// Text currently showing: the front, or the back once revealed.
    ///
    /// # Errors
    ///
    /// Returns `StudyError::EmptyDeck` when the deck has no cards.
    pub fn visible_text(&self) -> Result<&str, StudyError> {
        let card = self.current_card()?;
        Ok(if self.revealed { card.back() } else { card.front() })
    }

    /// Turns the card over. Returns whether the answer is now showing.
    ///
    /// # Errors
    ///
    /// Returns `StudyError::EmptyDeck` when the deck has no cards.
    pub fn flip(&mut self) -> Result<bool, StudyError> {
        self.current_card()?;
        self.revealed = !self.revealed;
        Ok(self.revealed)
    }

    pub fn toggle_notes(&mut self) -> bool {
        self.notes_visible = !self.notes_visible;
        self.notes_visible
    }

    /// Manual navigation forward, wrapping at the end. `None` on an empty deck.
    pub fn next(&mut self) -> Option<usize> {
        let len = self.deck.len();
        if len == 0 {
            return None;
        }
        self.show((self.current_index + 1) % len);
        Some(self.current_index)
    }

    /// Manual navigation backward, wrapping at the start. `None` on an empty deck.
    pub fn previous(&mut self) -> Option<usize> {
        let len = self.deck.len();
        if len == 0 {
            return None;
        }
        self.show((self.current_index + len - 1) % len);
        Some(self.current_index)
    }

    /// Judge the current card and move to the next scheduled one.
    ///
    /// # Errors
    ///
    /// Returns `StudyError::EmptyDeck` without cards, `StudyError::NotRevealed`
    /// before the answer has been shown, and review errors from the scheduler.
    pub fn answer(
        &mut self,
        reviews: &ReviewService,
        is_right: bool,
        rerate: Option<Difficulty>,
    ) -> Result<AnswerOutcome, StudyError> {
        if self.deck.is_empty() {
            return Err(StudyError::EmptyDeck);
        }
        if !self.revealed {
            return Err(StudyError::NotRevealed);
        }

        let card = self
            .deck
            .card_mut(self.current_index)
            .ok_or(StudyError::EmptyDeck)?;
        let review = reviews.review_card(card, is_right, rerate)?;
        self.tally.record(is_right);

        let next_index = reviews.next_card_index(&self.deck);
        self.show(next_index);

        Ok(AnswerOutcome { review, next_index })
    }

    fn set_current_notes(&mut self, notes: String) -> Result<(), StudyError> {
        let card = self
            .deck
            .card_mut(self.current_index)
            .ok_or(StudyError::EmptyDeck)?;
        card.set_notes(notes);
        Ok(())
    }

    fn show(&mut self, index: usize) {
        self.current_index = index;
        self.revealed = false;
        self.notes_visible = false;
    }
}

//
// ─── SERVICE ───────────────────────────────────────────────────────────────────
//

/// Opens decks for study and persists every judged answer.
///
/// Holds the process-wide `ReviewService`, so the learning rate keeps
/// adapting across deck switches rather than resetting per deck.
pub struct StudyService {
    decks: Arc<dyn DeckRepository>,
    reviews: Mutex<ReviewService>,
}

impl StudyService {
    #[must_use]
    pub fn new(clock: Clock, decks: Arc<dyn DeckRepository>) -> Self {
        Self::with_review_service(ReviewService::new().with_clock(clock), decks)
    }

    #[must_use]
    pub fn with_review_service(reviews: ReviewService, decks: Arc<dyn DeckRepository>) -> Self {
        Self {
            decks,
            reviews: Mutex::new(reviews),
        }
    }

    fn reviews(&self) -> MutexGuard<'_, ReviewService> {
        // ReviewService has no invariants a panic could break mid-update.
        self.reviews.lock().unwrap_or_else(PoisonError::into_inner)
    }

    #[must_use]
    pub fn learning_rate(&self) -> LearningRate {
        self.reviews().learning_rate()
    }

    /// Load a deck by name and start studying it.
    ///
    /// # Errors
    ///
    /// Returns `StudyError::DeckNotFound` if no such deck is stored, or storage errors.
    pub async fn open(&self, name: &str) -> Result<StudySession, StudyError> {
        let deck = self
            .decks
            .get_deck(name)
            .await?
            .ok_or_else(|| StudyError::DeckNotFound(name.to_owned()))?;
        Ok(StudySession::start(deck, &mut self.reviews()))
    }

    /// Judge the current card and save the deck.
    ///
    /// If saving fails the session is restored to its state before the answer.
    ///
    /// # Errors
    ///
    /// Any error from [`StudySession::answer`], or storage errors while saving.
    pub async fn answer(
        &self,
        session: &mut StudySession,
        is_right: bool,
        rerate: Option<Difficulty>,
    ) -> Result<AnswerOutcome, StudyError> {
        let snapshot = session.clone();
        let outcome = {
            let reviews = self.reviews();
            session.answer(&reviews, is_right, rerate)?
        };

        if let Err(err) = self.decks.save_deck(session.deck()).await {
            *session = snapshot;
            return Err(err.into());
        }
        Ok(outcome)
    }

    /// Replace the notes on the current card and save the deck.
    ///
    /// # Errors
    ///
    /// Returns `StudyError::EmptyDeck` without cards, or storage errors.
    pub async fn save_notes(
        &self,
        session: &mut StudySession,
        notes: impl Into<String>,
    ) -> Result<(), StudyError> {
        let snapshot = session.clone();
        session.set_current_notes(notes.into())?;

        if let Err(err) = self.decks.save_deck(session.deck()).await {
            *session = snapshot;
            return Err(err.into());
        }
        Ok(())
    }
}
