#![forbid(unsafe_code)]

pub mod deck_service;
pub mod error;
pub mod review_service;
pub mod study;

pub use flash_core::Clock;

pub use deck_service::{DeckService, ImportConflict, ImportOutcome};
pub use error::{DeckServiceError, ReviewServiceError, StudyError};
pub use review_service::{ReviewResult, ReviewService};
pub use study::{AnswerOutcome, StudyService, StudySession};
