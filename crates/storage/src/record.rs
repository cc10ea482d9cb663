//! On-disk shapes for decks and cards.
//!
//! Field names match the deck files written by earlier versions of the app,
//! and every field is optional on read so older files keep loading. Those
//! versions named files `<deck>.txt`; `JsonDirRepository` reads both.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use flash_core::model::{Card, CardId, Deck, Difficulty};
use flash_core::time::{format_timestamp, parse_timestamp};

use crate::repository::StorageError;

/// What to do with a timestamp that cannot be parsed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TimestampPolicy {
    /// Fail the load with `StorageError::Timestamp`.
    #[default]
    Strict,
    /// Log a warning and use the current time, as if the card were new.
    SubstituteNow,
}

fn default_difficulty() -> u8 {
    Difficulty::default().value()
}

/// Persisted shape for a card.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CardRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default)]
    pub front: String,
    #[serde(default)]
    pub back: String,
    #[serde(default)]
    pub notes: String,
    #[serde(default)]
    pub right_count: u32,
    #[serde(default)]
    pub wrong_count: u32,
    #[serde(default = "default_difficulty")]
    pub difficulty: u8,
    #[serde(default)]
    pub retention_score: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_reviewed: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_review: Option<String>,
}

impl CardRecord {
    #[must_use]
    pub fn from_card(card: &Card) -> Self {
        Self {
            id: Some(card.id().to_string()),
            front: card.front().to_owned(),
            back: card.back().to_owned(),
            notes: card.notes().to_owned(),
            right_count: card.right_count(),
            wrong_count: card.wrong_count(),
            difficulty: card.difficulty().value(),
            retention_score: card.retention_score(),
            last_reviewed: Some(format_timestamp(card.last_reviewed())),
            next_review: Some(format_timestamp(card.next_review())),
        }
    }

    /// Convert the record back into a domain `Card`.
    ///
    /// Missing ids are generated and missing timestamps default to `now`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Card` for an out-of-range difficulty or retention score,
    /// and `StorageError::Timestamp` for unparsable timestamps under `TimestampPolicy::Strict`.
    pub fn into_card(
        self,
        now: DateTime<Utc>,
        policy: TimestampPolicy,
    ) -> Result<Card, StorageError> {
        let id = resolve_id(self.id.as_deref(), &self.front);
        let difficulty = Difficulty::new(self.difficulty)?;
        let last_reviewed = resolve_timestamp(self.last_reviewed.as_deref(), now, policy)?;
        let next_review = resolve_timestamp(self.next_review.as_deref(), now, policy)?;

        Ok(Card::from_persisted(
            id,
            self.front,
            self.back,
            self.notes,
            self.right_count,
            self.wrong_count,
            difficulty,
            self.retention_score,
            last_reviewed,
            next_review,
        )?)
    }
}

fn resolve_id(raw: Option<&str>, front: &str) -> CardId {
    if let Some(id) = raw.and_then(|raw| raw.parse::<CardId>().ok()) {
        return id;
    }
    let id = CardId::generate();
    // The new id only sticks once the deck is saved again.
    log::warn!("card {front:?} has no usable id; assigned {id} until the deck is saved");
    id
}

fn resolve_timestamp(
    raw: Option<&str>,
    now: DateTime<Utc>,
    policy: TimestampPolicy,
) -> Result<DateTime<Utc>, StorageError> {
    let Some(raw) = raw else {
        return Ok(now);
    };
    match (parse_timestamp(raw), policy) {
        (Ok(at), _) => Ok(at),
        (Err(err), TimestampPolicy::Strict) => Err(err.into()),
        (Err(err), TimestampPolicy::SubstituteNow) => {
            log::warn!("{err}; treating card as never reviewed");
            Ok(now)
        }
    }
}

/// Persisted shape for a deck.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeckRecord {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub flashcards: Vec<CardRecord>,
}

impl DeckRecord {
    #[must_use]
    pub fn from_deck(deck: &Deck) -> Self {
        Self {
            name: deck.name().to_owned(),
            flashcards: deck.cards().iter().map(CardRecord::from_card).collect(),
        }
    }

    /// Convert the record back into a domain `Deck`, keeping card order.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Deck` for an invalid name, or any card conversion error.
    pub fn into_deck(
        self,
        now: DateTime<Utc>,
        policy: TimestampPolicy,
    ) -> Result<Deck, StorageError> {
        let cards = self
            .flashcards
            .into_iter()
            .map(|record| record.into_card(now, policy))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Deck::with_cards(self.name, cards)?)
    }
}

pub(crate) fn encode_deck(deck: &Deck) -> Result<String, StorageError> {
    serde_json::to_string_pretty(&DeckRecord::from_deck(deck))
        .map_err(|e| StorageError::Serialization(e.to_string()))
}

pub(crate) fn decode_deck(
    raw: &str,
    now: DateTime<Utc>,
    policy: TimestampPolicy,
) -> Result<Deck, StorageError> {
    let record: DeckRecord =
        serde_json::from_str(raw).map_err(|e| StorageError::Serialization(e.to_string()))?;
    record.into_deck(now, policy)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use flash_core::model::CardError;
    use flash_core::time::fixed_now;

    #[test]
    fn legacy_card_without_scheduling_fields_loads_with_defaults() {
        let raw = r#"{
            "name": "Old",
            "flashcards": [
                {"id": "abc", "front": "Q", "back": "A", "notes": "n",
                 "right_count": 2, "wrong_count": 1}
            ]
        }"#;
        let deck = decode_deck(raw, fixed_now(), TimestampPolicy::Strict).unwrap();
        let card = deck.card(0).unwrap();

        assert_eq!(card.id().as_str(), "abc");
        assert_eq!(card.right_count(), 2);
        assert_eq!(card.difficulty(), Difficulty::EASIEST);
        assert_eq!(card.retention_score(), 0.0);
        assert_eq!(card.last_reviewed(), fixed_now());
        assert!(card.is_due(fixed_now()));
    }

    #[test]
    fn missing_id_is_generated() {
        let raw = r#"{"name": "Old", "flashcards": [{"front": "Q", "back": "A"}]}"#;
        let deck = decode_deck(raw, fixed_now(), TimestampPolicy::Strict).unwrap();
        assert!(!deck.card(0).unwrap().id().as_str().is_empty());
    }

    #[test]
    fn blank_id_is_replaced_and_kept_after_save() {
        let raw = r#"{"name": "Old", "flashcards": [{"id": "  ", "front": "Q", "back": "A"}]}"#;
        let deck = decode_deck(raw, fixed_now(), TimestampPolicy::Strict).unwrap();
        let assigned = deck.card(0).unwrap().id().clone();
        assert!(!assigned.as_str().trim().is_empty());

        let saved = encode_deck(&deck).unwrap();
        let reloaded = decode_deck(&saved, fixed_now(), TimestampPolicy::Strict).unwrap();
        assert_eq!(reloaded.card(0).unwrap().id(), &assigned);
    }

    #[test]
    fn naive_timestamps_from_old_files_parse() {
        let raw = r#"{"name": "Old", "flashcards": [{
            "front": "Q", "back": "A",
            "last_reviewed": "2023-11-14T22:13:20",
            "next_review": "2023-11-16T22:13:20.500000"
        }]}"#;
        let deck = decode_deck(raw, fixed_now(), TimestampPolicy::Strict).unwrap();
        let card = deck.card(0).unwrap();
        assert_eq!(card.last_reviewed(), fixed_now());
        assert_eq!(
            card.next_review(),
            fixed_now() + Duration::days(2) + Duration::milliseconds(500)
        );
    }

    #[test]
    fn strict_policy_surfaces_bad_timestamp() {
        let raw = r#"{"name": "Bad", "flashcards": [{"front": "Q", "back": "A", "last_reviewed": "soon"}]}"#;
        let err = decode_deck(raw, fixed_now(), TimestampPolicy::Strict).unwrap_err();
        assert!(matches!(err, StorageError::Timestamp(_)));
    }

    #[test]
    fn substitute_policy_recovers_with_now() {
        let raw = r#"{"name": "Bad", "flashcards": [{"front": "Q", "back": "A", "next_review": "soon"}]}"#;
        let deck = decode_deck(raw, fixed_now(), TimestampPolicy::SubstituteNow).unwrap();
        assert_eq!(deck.card(0).unwrap().next_review(), fixed_now());
    }

    #[test]
    fn zero_difficulty_is_rejected() {
        let raw = r#"{"name": "Bad", "flashcards": [{"front": "Q", "back": "A", "difficulty": 0}]}"#;
        let err = decode_deck(raw, fixed_now(), TimestampPolicy::SubstituteNow).unwrap_err();
        assert!(matches!(
            err,
            StorageError::Card(CardError::InvalidDifficulty(0))
        ));
    }

    #[test]
    fn blank_deck_name_is_rejected() {
        let err = decode_deck(r#"{"flashcards": []}"#, fixed_now(), TimestampPolicy::Strict)
            .unwrap_err();
        assert!(matches!(err, StorageError::Deck(_)));
    }

    #[test]
    fn encoded_deck_reads_back_identically() {
        let now = fixed_now();
        let mut deck = Deck::new("Round").unwrap();
        deck.add_card("Q1", "A1", "note", now).unwrap();
        let card = deck.card_mut(0).unwrap();
        card.record_answer(true);
        card.set_difficulty(Difficulty::new(3).unwrap());

        let raw = encode_deck(&deck).unwrap();
        assert!(raw.contains("\"flashcards\""));
        let back = decode_deck(&raw, now + Duration::days(9), TimestampPolicy::Strict).unwrap();
        assert_eq!(back, deck);
    }
}
