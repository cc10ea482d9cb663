use std::fmt;

use serde::{Deserialize, Serialize};

use crate::model::CardError;

/// User-assigned card difficulty, 1 (easiest) through 5.
///
/// The scheduler divides by this value, so zero is unrepresentable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct Difficulty(u8);

impl Difficulty {
    pub const EASIEST: Self = Self(1);
    pub const HARDEST: Self = Self(5);

    /// Validates a raw difficulty rating.
    ///
    /// # Errors
    ///
    /// Returns `CardError::InvalidDifficulty` unless `value` is in `1..=5`.
    pub fn new(value: u8) -> Result<Self, CardError> {
        if (Self::EASIEST.0..=Self::HARDEST.0).contains(&value) {
            Ok(Self(value))
        } else {
            Err(CardError::InvalidDifficulty(value))
        }
    }

    #[must_use]
    pub fn value(self) -> u8 {
        self.0
    }

    #[must_use]
    pub fn as_f64(self) -> f64 {
        f64::from(self.0)
    }
}

impl Default for Difficulty {
    fn default() -> Self {
        Self::EASIEST
    }
}

impl TryFrom<u8> for Difficulty {
    type Error = CardError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Difficulty> for u8 {
    fn from(value: Difficulty) -> Self {
        value.0
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
