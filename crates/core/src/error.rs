use thiserror::Error;

use crate::model::{CardError, DeckError};
use crate::scheduler::SchedulerError;
use crate::time::TimestampError;

/// Umbrella error for callers that do not care which part of the domain failed.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Card(#[from] CardError),
    #[error(transparent)]
    Deck(#[from] DeckError),
    #[error(transparent)]
    Scheduler(#[from] SchedulerError),
    #[error(transparent)]
    Timestamp(#[from] TimestampError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Deck;

    fn build(name: &str) -> Result<Deck, Error> {
        Ok(Deck::new(name)?)
    }

    #[test]
    fn domain_errors_convert_and_keep_their_message() {
        let err = build("  ").unwrap_err();
        assert!(matches!(err, Error::Deck(DeckError::EmptyName)));
        assert_eq!(err.to_string(), DeckError::EmptyName.to_string());

        let err: Error = CardError::InvalidDifficulty(9).into();
        assert!(matches!(err, Error::Card(CardError::InvalidDifficulty(9))));
    }
}
