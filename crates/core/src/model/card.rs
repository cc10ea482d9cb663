use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::model::{difficulty::Difficulty, ids::CardId};
use crate::stats;

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq)]
#[non_exhaustive]
pub enum CardError {
    #[error("card front cannot be empty")]
    EmptyFront,

    #[error("card back cannot be empty")]
    EmptyBack,

    #[error("difficulty must be between 1 and 5, got {0}")]
    InvalidDifficulty(u8),

    #[error("retention score must be a finite value in [0, 1], got {0}")]
    InvalidRetention(f64),
}

//
// ─── CARD ──────────────────────────────────────────────────────────────────────
//

/// A single flashcard together with its review history and schedule.
///
/// The scheduling fields (`retention_score`, `last_reviewed`, `next_review`)
/// are only written by the scheduler once a card has been reviewed.
#[derive(Debug, Clone, PartialEq)]
pub struct Card {
    id: CardId,
    front: String,
    back: String,
    notes: String,
    right_count: u32,
    wrong_count: u32,
    difficulty: Difficulty,
    retention_score: f64,
    last_reviewed: DateTime<Utc>,
    next_review: DateTime<Utc>,
}

impl Card {
    /// Creates a brand-new card that is due immediately.
    ///
    /// # Errors
    ///
    /// Returns `CardError::EmptyFront` / `CardError::EmptyBack` if either side is blank.
    pub fn new(
        front: impl Into<String>,
        back: impl Into<String>,
        notes: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Result<Self, CardError> {
        let (front, back) = validate_sides(front.into(), back.into())?;

        Ok(Self {
            id: CardId::generate(),
            front,
            back,
            notes: notes.into(),
            right_count: 0,
            wrong_count: 0,
            difficulty: Difficulty::default(),
            retention_score: 0.0,
            last_reviewed: now,
            next_review: now,
        })
    }

    /// Rehydrates a card from storage.
    ///
    /// Text is accepted as-is so older files with empty sides still load.
    ///
    /// # Errors
    ///
    /// Returns `CardError::InvalidRetention` if the score is not finite or outside `[0, 1]`.
    #[allow(clippy::too_many_arguments)]
    pub fn from_persisted(
        id: CardId,
        front: String,
        back: String,
        notes: String,
        right_count: u32,
        wrong_count: u32,
        difficulty: Difficulty,
        retention_score: f64,
        last_reviewed: DateTime<Utc>,
        next_review: DateTime<Utc>,
    ) -> Result<Self, CardError> {
        if !retention_score.is_finite() || !(0.0..=1.0).contains(&retention_score) {
            return Err(CardError::InvalidRetention(retention_score));
        }

        Ok(Self {
            id,
            front,
            back,
            notes,
            right_count,
            wrong_count,
            difficulty,
            retention_score,
            last_reviewed,
            next_review,
        })
    }

    // Accessors
    #[must_use]
    pub fn id(&self) -> &CardId {
        &self.id
    }

    #[must_use]
    pub fn front(&self) -> &str {
        &self.front
    }

    #[must_use]
    pub fn back(&self) -> &str {
        &self.back
    }

    #[must_use]
    pub fn notes(&self) -> &str {
        &self.notes
    }

    #[must_use]
    pub fn right_count(&self) -> u32 {
        self.right_count
    }

    #[must_use]
    pub fn wrong_count(&self) -> u32 {
        self.wrong_count
    }

    #[must_use]
    pub fn attempts(&self) -> u64 {
        u64::from(self.right_count) + u64::from(self.wrong_count)
    }

    #[must_use]
    pub fn difficulty(&self) -> Difficulty {
        self.difficulty
    }

    #[must_use]
    pub fn retention_score(&self) -> f64 {
        self.retention_score
    }

    #[must_use]
    pub fn last_reviewed(&self) -> DateTime<Utc> {
        self.last_reviewed
    }

    #[must_use]
    pub fn next_review(&self) -> DateTime<Utc> {
        self.next_review
    }

    /// True once `next_review` has been reached.
    #[must_use]
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.next_review <= now
    }

    /// Fraction of judged reviews answered correctly; `None` if never judged.
    #[must_use]
    pub fn accuracy(&self) -> Option<f64> {
        stats::accuracy(u64::from(self.right_count), u64::from(self.wrong_count))
    }

    /// Counts one judged review. Call this before scheduling the card.
    pub fn record_answer(&mut self, is_right: bool) {
        if is_right {
            self.right_count = self.right_count.saturating_add(1);
        } else {
            self.wrong_count = self.wrong_count.saturating_add(1);
        }
    }

    pub fn set_difficulty(&mut self, difficulty: Difficulty) {
        self.difficulty = difficulty;
    }

    pub fn set_notes(&mut self, notes: impl Into<String>) {
        self.notes = notes.into();
    }

    /// Replaces both sides of the card.
    ///
    /// # Errors
    ///
    /// Returns `CardError::EmptyFront` / `CardError::EmptyBack` if either side is blank.
    /// The card is unchanged on error.
    pub fn edit(
        &mut self,
        front: impl Into<String>,
        back: impl Into<String>,
    ) -> Result<(), CardError> {
        let (front, back) = validate_sides(front.into(), back.into())?;
        self.front = front;
        self.back = back;
        Ok(())
    }

    pub(crate) fn apply_schedule(
        &mut self,
        retention_score: f64,
        reviewed_at: DateTime<Utc>,
        next_review: DateTime<Utc>,
    ) {
        self.retention_score = retention_score.clamp(0.0, 1.0);
        self.last_reviewed = reviewed_at;
        self.next_review = next_review;
    }
}

fn validate_sides(front: String, back: String) -> Result<(String, String), CardError> {
    if front.trim().is_empty() {
        return Err(CardError::EmptyFront);
    }
    if back.trim().is_empty() {
        return Err(CardError::EmptyBack);
    }
    Ok((front, back))
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
