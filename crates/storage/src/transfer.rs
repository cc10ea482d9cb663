//! Standalone `.deck` files for sharing decks between installations.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use tokio::fs;

use flash_core::model::Deck;

use crate::record::{TimestampPolicy, decode_deck, encode_deck};
use crate::repository::StorageError;

pub const DECK_EXPORT_EXTENSION: &str = "deck";

/// Appends `.deck` unless the path already ends with it.
#[must_use]
pub fn deck_file_path(path: &Path) -> PathBuf {
    if path
        .extension()
        .is_some_and(|ext| ext == DECK_EXPORT_EXTENSION)
    {
        return path.to_path_buf();
    }
    let mut raw = OsString::from(path.as_os_str());
    raw.push(".");
    raw.push(DECK_EXPORT_EXTENSION);
    PathBuf::from(raw)
}

/// Writes `deck` to `path` (with `.deck` appended if missing) and returns the final path.
///
/// # Errors
///
/// Returns `StorageError::Io` or `StorageError::Serialization` on failure.
pub async fn export_deck(deck: &Deck, path: &Path) -> Result<PathBuf, StorageError> {
    let target = deck_file_path(path);
    fs::write(&target, encode_deck(deck)?).await?;
    log::info!("exported deck {:?} to {}", deck.name(), target.display());
    Ok(target)
}

/// Reads a deck file written by [`export_deck`] or by older versions of the app.
///
/// # Errors
///
/// Returns `StorageError::NotFound` if the file does not exist, otherwise any
/// read or decode error.
pub async fn import_deck(
    path: &Path,
    now: DateTime<Utc>,
    policy: TimestampPolicy,
) -> Result<Deck, StorageError> {
    let raw = fs::read_to_string(path).await.map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => StorageError::NotFound,
        _ => StorageError::Io(e),
    })?;
    decode_deck(&raw, now, policy)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn appends_extension_when_missing() {
        assert_eq!(
            deck_file_path(Path::new("out/spanish")),
            PathBuf::from("out/spanish.deck")
        );
        assert_eq!(
            deck_file_path(Path::new("spanish.json")),
            PathBuf::from("spanish.json.deck")
        );
        assert_eq!(
            deck_file_path(Path::new("spanish.deck")),
            PathBuf::from("spanish.deck")
        );
    }
}
