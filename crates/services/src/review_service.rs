use chrono::{DateTime, Utc};

use flash_core::{
    model::{Card, CardId, Deck, Difficulty},
    scheduler::{LearningRate, ScheduledReview, Scheduler},
    time::Clock,
};
use storage::DeckRepository;

use crate::error::ReviewServiceError;

//
// ─── REVIEW RESULT ─────────────────────────────────────────────────────────────
//

/// Result of judging one card: which card, the verdict, and its new schedule.
#[derive(Debug, Clone, PartialEq)]
pub struct ReviewResult {
    pub card_id: CardId,
    pub is_right: bool,
    pub scheduled: ScheduledReview,
}

//
// ─── SERVICE ───────────────────────────────────────────────────────────────────
//

/// Coordinates judging cards with the scheduler.
///
/// Owns the session's `Scheduler`, so the learning rate adapted by
/// [`ReviewService::activate_deck`] carries over to every later review.
#[derive(Debug, Clone, Default)]
pub struct ReviewService {
    clock: Clock,
    scheduler: Scheduler,
}

impl ReviewService {
    /// Review service with a fresh scheduler and the real-time clock.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Override the clock (usually for deterministic testing).
    #[must_use]
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    #[must_use]
    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    #[must_use]
    pub fn learning_rate(&self) -> LearningRate {
        self.scheduler.learning_rate()
    }

    /// Adapt the learning rate to a newly selected deck. Call once per activation.
    pub fn activate_deck(&mut self, deck: &Deck) -> LearningRate {
        let before = self.scheduler.learning_rate();
        let after = self.scheduler.update_learning_rate(deck);
        if after == before {
            log::debug!(
                "learning rate unchanged at {:.2} for deck {:?}",
                after.value(),
                deck.name()
            );
        } else {
            log::info!(
                "learning rate {:.2} -> {:.2} after activating deck {:?}",
                before.value(),
                after.value(),
                deck.name()
            );
        }
        after
    }

    /// Index of the card to show next, per the scheduler's due-card priority.
    #[must_use]
    pub fn next_card_index(&self, deck: &Deck) -> usize {
        self.scheduler.get_next_card_index(deck, self.now())
    }

    /// Judge a card: count the answer, apply any difficulty re-rating, then reschedule.
    ///
    /// The card is left exactly as it was if scheduling fails.
    ///
    /// # Errors
    ///
    /// Returns `ReviewServiceError::Scheduler` if the next review date overflows.
    pub fn review_card(
        &self,
        card: &mut Card,
        is_right: bool,
        rerate: Option<Difficulty>,
    ) -> Result<ReviewResult, ReviewServiceError> {
        let original = card.clone();

        card.record_answer(is_right);
        if let Some(difficulty) = rerate {
            card.set_difficulty(difficulty);
        }

        match self.scheduler.schedule_card(card, is_right, self.now()) {
            Ok(scheduled) => {
                log::debug!(
                    "card {} judged {}: retention {:.3}, next review in {:.2} days",
                    card.id(),
                    if is_right { "right" } else { "wrong" },
                    scheduled.retention_score,
                    scheduled.interval_days
                );
                Ok(ReviewResult {
                    card_id: card.id().clone(),
                    is_right,
                    scheduled,
                })
            }
            Err(err) => {
                *card = original;
                Err(err.into())
            }
        }
    }

    /// Judge the card at `index` and persist the deck.
    ///
    /// If persistence fails, the deck is rolled back to its original state.
    ///
    /// # Errors
    ///
    /// Returns `ReviewServiceError::CardNotFound` for a bad index, scheduler
    /// errors from [`ReviewService::review_card`], and storage errors on save.
    pub async fn review_card_persisted(
        &self,
        deck: &mut Deck,
        index: usize,
        is_right: bool,
        rerate: Option<Difficulty>,
        decks: &dyn DeckRepository,
    ) -> Result<ReviewResult, ReviewServiceError> {
        let original = deck.clone();

        let card = deck
            .card_mut(index)
            .ok_or(ReviewServiceError::CardNotFound { index })?;
        let result = self.review_card(card, is_right, rerate)?;

        match decks.save_deck(deck).await {
            Ok(()) => Ok(result),
            Err(err) => {
                *deck = original;
                Err(err.into())
            }
        }
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::Duration;
    use flash_core::time::{fixed_clock, fixed_now};
    use storage::{InMemoryRepository, StorageError};

    fn build_deck() -> Deck {
        let mut deck = Deck::new("Test").unwrap();
        deck.add_card("What is 2+2?", "4", "", fixed_now()).unwrap();
        deck.add_card("Capital of France?", "Paris", "", fixed_now())
            .unwrap();
        deck
    }

    struct FailingRepository;

    #[async_trait]
    impl DeckRepository for FailingRepository {
        async fn save_deck(&self, _deck: &Deck) -> Result<(), StorageError> {
            Err(StorageError::Conflict)
        }
        async fn get_deck(&self, _name: &str) -> Result<Option<Deck>, StorageError> {
            Ok(None)
        }
        async fn load_decks(&self) -> Result<Vec<Deck>, StorageError> {
            Ok(Vec::new())
        }
        async fn delete_deck(&self, _name: &str) -> Result<bool, StorageError> {
            Ok(false)
        }
    }

    #[test]
    fn review_counts_answer_before_scheduling() {
        let service = ReviewService::new().with_clock(fixed_clock());
        let mut deck = build_deck();
        let card = deck.card_mut(0).unwrap();

        let result = service.review_card(card, true, None).unwrap();

        assert_eq!(card.right_count(), 1);
        assert_eq!(card.wrong_count(), 0);
        assert_eq!(card.last_reviewed(), fixed_now());
        assert_eq!(card.next_review(), result.scheduled.next_review);
        // 1 right vs 0 wrong earns the streak bonus on the very first answer.
        assert!(result.scheduled.streak_bonus);
        assert_eq!(&result.card_id, card.id());
    }

    #[test]
    fn rerating_applies_before_interval_math() {
        let service = ReviewService::new().with_clock(fixed_clock());
        let mut deck = build_deck();
        let card = deck.card_mut(0).unwrap();

        let hardest = Difficulty::HARDEST;
        let result = service.review_card(card, false, Some(hardest)).unwrap();

        assert_eq!(card.difficulty(), hardest);
        assert_eq!(card.wrong_count(), 1);
        assert_eq!(result.scheduled.interval_days, 1.0);
        assert_eq!(card.next_review(), fixed_now() + Duration::days(1));
    }

    #[test]
    fn activate_deck_moves_learning_rate_once() {
        let mut service = ReviewService::new().with_clock(fixed_clock());
        let mut deck = build_deck();
        for _ in 0..5 {
            deck.card_mut(0).unwrap().record_answer(true);
        }

        let rate = service.activate_deck(&deck);
        assert!((rate.value() - 1.1).abs() < 1e-9);
        assert_eq!(service.learning_rate(), rate);
    }

    #[test]
    fn next_card_index_prefers_unreviewed() {
        let service = ReviewService::new().with_clock(fixed_clock());
        let mut deck = build_deck();
        service
            .review_card(deck.card_mut(0).unwrap(), true, None)
            .unwrap();

        assert_eq!(service.next_card_index(&deck), 1);
    }

    #[tokio::test]
    async fn review_card_persisted_saves_deck() {
        let repo = InMemoryRepository::new();
        let service = ReviewService::new().with_clock(fixed_clock());
        let mut deck = build_deck();

        service
            .review_card_persisted(&mut deck, 1, true, None, &repo)
            .await
            .unwrap();

        let stored = repo.get_deck("Test").await.unwrap().unwrap();
        assert_eq!(stored, deck);
        assert_eq!(stored.card(1).unwrap().right_count(), 1);
    }

    #[tokio::test]
    async fn review_card_persisted_rolls_back_on_storage_failure() {
        let service = ReviewService::new().with_clock(fixed_clock());
        let mut deck = build_deck();
        let before = deck.clone();

        let err = service
            .review_card_persisted(&mut deck, 0, true, None, &FailingRepository)
            .await
            .unwrap_err();

        assert!(matches!(err, ReviewServiceError::Storage(StorageError::Conflict)));
        assert_eq!(deck, before);
    }

    #[tokio::test]
    async fn review_card_persisted_rejects_bad_index() {
        let repo = InMemoryRepository::new();
        let service = ReviewService::new().with_clock(fixed_clock());
        let mut deck = build_deck();

        let err = service
            .review_card_persisted(&mut deck, 7, true, None, &repo)
            .await
            .unwrap_err();
        assert!(matches!(err, ReviewServiceError::CardNotFound { index: 7 }));
    }
}
