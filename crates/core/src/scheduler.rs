use chrono::{DateTime, Duration, Utc};
use thiserror::Error;

use crate::model::{Card, Deck, Difficulty};
use crate::stats;
use crate::time::whole_days_between;

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq)]
pub enum SchedulerError {
    #[error("review interval of {interval_days} days cannot be represented as a timestamp")]
    IntervalOverflow { interval_days: f64 },
}

//
// ─── CONSTANTS ─────────────────────────────────────────────────────────────────
//

/// Interval unit in days.
pub const BASE_INTERVAL_DAYS: f64 = 1.0;
/// Shortest interval ever scheduled.
pub const MIN_INTERVAL_DAYS: f64 = 1.0;
/// Cap applied before the streak bonus.
pub const MAX_INTERVAL_DAYS: f64 = 365.0;

/// Horizon (in days) of the retention decay curve.
const DECAY_HORIZON_DAYS: f64 = 30.0;
const RIGHT_GAIN: f64 = 0.1;
const WRONG_PENALTY: f64 = 0.2;
/// Interval multiplier at perfect retention.
const RETENTION_SPAN: f64 = 5.0;
const STREAK_STEP: f64 = 0.1;

const MILLIS_PER_DAY: f64 = 86_400_000.0;

//
// ─── LEARNING RATE ─────────────────────────────────────────────────────────────
//

/// Session-wide interval multiplier, adapted from aggregate deck accuracy.
///
/// Always within `[LearningRate::MIN, LearningRate::MAX]`.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct LearningRate(f64);

impl LearningRate {
    pub const MIN: f64 = 0.5;
    pub const MAX: f64 = 2.0;
    pub const INITIAL: f64 = 1.0;
    pub const STEP: f64 = 0.1;
    /// Accuracy strictly above this speeds reviews up.
    pub const RAISE_ABOVE: f64 = 0.8;
    /// Accuracy strictly below this slows reviews down.
    pub const LOWER_BELOW: f64 = 0.5;

    /// Builds a rate, clamping into the valid range. NaN falls back to the initial rate.
    #[must_use]
    pub fn new(value: f64) -> Self {
        if value.is_nan() {
            return Self::default();
        }
        Self(value.clamp(Self::MIN, Self::MAX))
    }

    #[must_use]
    pub fn value(self) -> f64 {
        self.0
    }

    /// Next rate given a deck accuracy in `[0, 1]`.
    #[must_use]
    pub fn adjusted(self, accuracy: f64) -> Self {
        if accuracy > Self::RAISE_ABOVE {
            Self((self.0 + Self::STEP).min(Self::MAX))
        } else if accuracy < Self::LOWER_BELOW {
            Self((self.0 - Self::STEP).max(Self::MIN))
        } else {
            self
        }
    }
}

impl Default for LearningRate {
    fn default() -> Self {
        Self(Self::INITIAL)
    }
}

//
// ─── SCHEDULED REVIEW ──────────────────────────────────────────────────────────
//

/// What `schedule_card` wrote onto the card.
#[derive(Debug, Clone, PartialEq)]
pub struct ScheduledReview {
    pub next_review: DateTime<Utc>,
    pub interval_days: f64,
    pub retention_score: f64,
    pub streak_bonus: bool,
}

//
// ─── SCHEDULER ─────────────────────────────────────────────────────────────────
//

/// Spaced-repetition policy: retention scoring, interval computation,
/// adaptive learning rate, and due-card selection.
///
/// Every operation takes the current time explicitly. The learning rate is
/// the only state carried between calls; it starts at 1.0 and only moves when
/// [`Scheduler::update_learning_rate`] runs, which callers do once per deck
/// activation, before any [`Scheduler::schedule_card`] for that deck.
///
/// # Examples
///
/// ```
/// # use flash_core::model::Deck;
/// # use flash_core::scheduler::Scheduler;
/// let now = chrono::Utc::now();
/// let mut deck = Deck::new("Kanji").unwrap();
/// deck.add_card("水", "water", "", now).unwrap();
///
/// let mut scheduler = Scheduler::new();
/// scheduler.update_learning_rate(&deck);
///
/// let index = scheduler.get_next_card_index(&deck, now);
/// let card = deck.card_mut(index).unwrap();
/// card.record_answer(true);
/// let scheduled = scheduler.schedule_card(card, true, now)?;
/// assert!(scheduled.interval_days >= 1.0);
/// # Ok::<(), flash_core::scheduler::SchedulerError>(())
/// ```
#[derive(Debug, Clone, Default)]
pub struct Scheduler {
    learning_rate: LearningRate,
}

impl Scheduler {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Resume with a rate carried over from elsewhere.
    #[must_use]
    pub fn with_learning_rate(learning_rate: LearningRate) -> Self {
        Self { learning_rate }
    }

    #[must_use]
    pub fn learning_rate(&self) -> LearningRate {
        self.learning_rate
    }

    /// Retention score after judging `card` at `now`, clamped to `[0, 1]`.
    ///
    /// Elapsed time counts whole days since `last_reviewed`, never less than one.
    #[must_use]
    #[allow(clippy::cast_precision_loss, clippy::unused_self)]
    pub fn calculate_retention_score(&self, card: &Card, is_right: bool, now: DateTime<Utc>) -> f64 {
        let days_since_review = whole_days_between(card.last_reviewed(), now).max(1) as f64;
        let difficulty = card.difficulty().as_f64();

        let raw_score = if is_right {
            card.retention_score() + RIGHT_GAIN * (1.0 / difficulty)
        } else {
            (card.retention_score() - WRONG_PENALTY * difficulty).max(0.0)
        };

        let decay = 1.0 / (1.0 + days_since_review / DECAY_HORIZON_DAYS);
        (raw_score * decay).clamp(0.0, 1.0)
    }

    /// Adapts the learning rate from the accuracy across every card in `deck`.
    ///
    /// Empty decks leave the rate alone. A deck whose cards were never judged
    /// counts as 0% accuracy.
    pub fn update_learning_rate(&mut self, deck: &Deck) -> LearningRate {
        if deck.is_empty() {
            return self.learning_rate;
        }

        let total_right: u64 = deck.cards().iter().map(|c| u64::from(c.right_count())).sum();
        let total_wrong: u64 = deck.cards().iter().map(|c| u64::from(c.wrong_count())).sum();
        let accuracy = stats::accuracy(total_right, total_wrong).unwrap_or(0.0);

        self.learning_rate = self.learning_rate.adjusted(accuracy);
        self.learning_rate
    }

    /// Interval in days for a freshly computed retention score.
    ///
    /// The `[1, 365]` clamp happens before the streak bonus, so a long
    /// run of correct answers can push the result past the cap.
    #[must_use]
    pub fn interval_days(
        &self,
        retention_score: f64,
        difficulty: Difficulty,
        is_right: bool,
        right_count: u32,
        wrong_count: u32,
    ) -> f64 {
        let interval = BASE_INTERVAL_DAYS
            * (retention_score * RETENTION_SPAN)
            * (1.0 / difficulty.as_f64())
            * self.learning_rate.value();
        let interval = interval.clamp(MIN_INTERVAL_DAYS, MAX_INTERVAL_DAYS);

        if streak_applies(is_right, right_count, wrong_count) {
            interval * (1.0 + f64::from(right_count) * STREAK_STEP)
        } else {
            interval
        }
    }

    /// Rescores `card` and sets its next review date.
    ///
    /// The right/wrong counters must already include this answer.
    ///
    /// # Errors
    ///
    /// Returns `SchedulerError::IntervalOverflow` when the streak bonus pushes the
    /// review date past what a timestamp can hold. The card is unchanged in that case.
    pub fn schedule_card(
        &self,
        card: &mut Card,
        is_right: bool,
        now: DateTime<Utc>,
    ) -> Result<ScheduledReview, SchedulerError> {
        let retention_score = self.calculate_retention_score(card, is_right, now);
        let interval_days = self.interval_days(
            retention_score,
            card.difficulty(),
            is_right,
            card.right_count(),
            card.wrong_count(),
        );

        let next_review = days_to_duration(interval_days)
            .and_then(|d| now.checked_add_signed(d))
            .ok_or(SchedulerError::IntervalOverflow { interval_days })?;

        card.apply_schedule(retention_score, now, next_review);

        Ok(ScheduledReview {
            next_review,
            interval_days,
            retention_score,
            streak_bonus: streak_applies(is_right, card.right_count(), card.wrong_count()),
        })
    }

    /// Index of the card to show next.
    ///
    /// Among due cards, picks the lowest retention score, then the highest
    /// difficulty, then the earliest position. Returns 0 for an empty deck or
    /// when nothing is due; callers must check emptiness before indexing.
    #[must_use]
    #[allow(clippy::unused_self)]
    pub fn get_next_card_index(&self, deck: &Deck, now: DateTime<Utc>) -> usize {
        deck.cards()
            .iter()
            .enumerate()
            .filter(|(_, card)| card.is_due(now))
            .min_by(|(_, a), (_, b)| {
                a.retention_score()
                    .total_cmp(&b.retention_score())
                    .then_with(|| b.difficulty().cmp(&a.difficulty()))
            })
            .map_or(0, |(index, _)| index)
    }

    /// Positions of every due card, in deck order.
    #[must_use]
    #[allow(clippy::unused_self)]
    pub fn due_indices(&self, deck: &Deck, now: DateTime<Utc>) -> Vec<usize> {
        deck.cards()
            .iter()
            .enumerate()
            .filter_map(|(i, card)| card.is_due(now).then_some(i))
            .collect()
    }

    #[must_use]
    #[allow(clippy::unused_self)]
    pub fn due_count(&self, deck: &Deck, now: DateTime<Utc>) -> usize {
        deck.cards().iter().filter(|c| c.is_due(now)).count()
    }
}

fn streak_applies(is_right: bool, right_count: u32, wrong_count: u32) -> bool {
    is_right && right_count > wrong_count
}

#[allow(clippy::cast_possible_truncation)]
fn days_to_duration(days: f64) -> Option<Duration> {
    let millis = (days * MILLIS_PER_DAY).round();
    // i64::MAX as f64 rounds up to 2^63, so `<` keeps the cast in range.
    if !millis.is_finite() || millis < 0.0 || millis >= i64::MAX as f64 {
        return None;
    }
    Duration::try_milliseconds(millis as i64)
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
