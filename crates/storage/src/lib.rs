#![forbid(unsafe_code)]

pub mod json;
pub mod record;
pub mod repository;
pub mod transfer;

pub use json::JsonDirRepository;
pub use record::{CardRecord, DeckRecord, TimestampPolicy};
pub use repository::{DeckRepository, InMemoryRepository, Storage, StorageError};
