//! Review accuracy figures shared by the scheduler and front-ends.

use std::fmt;

use chrono::{DateTime, Utc};

use crate::model::Deck;

/// Fraction of correct answers, or `None` when nothing has been judged.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn accuracy(right: u64, wrong: u64) -> Option<f64> {
    let total = right + wrong;
    if total == 0 {
        None
    } else {
        Some(right as f64 / total as f64)
    }
}

//
// ─── DECK STATS ────────────────────────────────────────────────────────────────
//

/// Aggregate counters across every card of a deck.
#[derive(Debug, Clone, PartialEq)]
pub struct DeckStats {
    pub card_count: usize,
    pub due_count: usize,
    pub total_right: u64,
    pub total_wrong: u64,
    /// Deck-wide accuracy; 0.0 when no card has been judged yet.
    pub accuracy: f64,
    pub mean_retention: f64,
}

impl DeckStats {
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn from_deck(deck: &Deck, now: DateTime<Utc>) -> Self {
        let cards = deck.cards();
        let total_right: u64 = cards.iter().map(|c| u64::from(c.right_count())).sum();
        let total_wrong: u64 = cards.iter().map(|c| u64::from(c.wrong_count())).sum();
        let due_count = cards.iter().filter(|c| c.is_due(now)).count();
        let mean_retention = if cards.is_empty() {
            0.0
        } else {
            cards.iter().map(|c| c.retention_score()).sum::<f64>() / cards.len() as f64
        };

        Self {
            card_count: cards.len(),
            due_count,
            total_right,
            total_wrong,
            accuracy: accuracy(total_right, total_wrong).unwrap_or(0.0),
            mean_retention,
        }
    }

    #[must_use]
    pub fn total_attempts(&self) -> u64 {
        self.total_right + self.total_wrong
    }
}

//
// ─── SESSION TALLY ─────────────────────────────────────────────────────────────
//

/// Running right/wrong totals for a single study session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionTally {
    total: u32,
    correct: u32,
    incorrect: u32,
}

impl SessionTally {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, is_right: bool) {
        self.total = self.total.saturating_add(1);
        if is_right {
            self.correct = self.correct.saturating_add(1);
        } else {
            self.incorrect = self.incorrect.saturating_add(1);
        }
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    #[must_use]
    pub fn total(&self) -> u32 {
        self.total
    }

    #[must_use]
    pub fn correct(&self) -> u32 {
        self.correct
    }

    #[must_use]
    pub fn incorrect(&self) -> u32 {
        self.incorrect
    }

    /// Accuracy as a percentage in `[0, 100]`; 0 for an empty session.
    #[must_use]
    pub fn accuracy_percent(&self) -> f64 {
        accuracy(u64::from(self.correct), u64::from(self.incorrect)).map_or(0.0, |a| a * 100.0)
    }
}

impl fmt::Display for SessionTally {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Total answered: {}", self.total)?;
        writeln!(f, "Correct: {}", self.correct)?;
        writeln!(f, "Incorrect: {}", self.incorrect)?;
        write!(f, "Accuracy: {:.2}%", self.accuracy_percent())
    }
}

//
// ─── ACCURACY BAND ─────────────────────────────────────────────────────────────
//

/// Coarse grading of a percentage for feedback colouring.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccuracyBand {
    High,
    Medium,
    Low,
}

impl AccuracyBand {
    #[must_use]
    pub fn from_percent(percent: f64) -> Self {
        if percent >= 70.0 {
            Self::High
        } else if percent >= 40.0 {
            Self::Medium
        } else {
            Self::Low
        }
    }
}
