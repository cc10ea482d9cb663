//! Deck store keeping one pretty-printed JSON file per deck.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;

use flash_core::Clock;
use flash_core::model::Deck;

use crate::record::{TimestampPolicy, decode_deck, encode_deck};
use crate::repository::{DeckRepository, StorageError};

const DECK_FILE_EXTENSION: &str = "json";
const LEGACY_FILE_EXTENSION: &str = "txt";

/// Stores decks as `<data_dir>/<deck name>.json`.
///
/// The file name is the deck's key. Older data directories holding
/// `<deck name>.txt` files are read too, and each one is replaced by a
/// `.json` file the next time that deck is saved.
#[derive(Debug, Clone)]
pub struct JsonDirRepository {
    dir: PathBuf,
    clock: Clock,
    policy: TimestampPolicy,
}

impl JsonDirRepository {
    /// Open (and create if needed) a data directory.
    ///
    /// `clock` supplies "now" for fields missing from older files.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Io` if the directory cannot be created.
    pub async fn open(dir: impl Into<PathBuf>, clock: Clock) -> Result<Self, StorageError> {
        let dir = dir.into();
        fs::create_dir_all(&dir).await?;
        Ok(Self {
            dir,
            clock,
            policy: TimestampPolicy::default(),
        })
    }

    #[must_use]
    pub fn with_timestamp_policy(mut self, policy: TimestampPolicy) -> Self {
        self.policy = policy;
        self
    }

    fn deck_path(&self, name: &str) -> Result<PathBuf, StorageError> {
        let trimmed = name.trim();
        if trimmed.is_empty() || trimmed.contains(['/', '\\']) {
            return Err(StorageError::InvalidDeckName(name.to_owned()));
        }
        Ok(self.dir.join(format!("{trimmed}.{DECK_FILE_EXTENSION}")))
    }

    async fn read_deck(&self, path: &Path) -> Result<Deck, StorageError> {
        let raw = fs::read_to_string(path).await?;
        let deck = decode_deck(&raw, self.clock.now(), self.policy)?;
        adopt_file_name(deck, path)
    }

    async fn read_if_present(&self, path: &Path) -> Result<Option<Deck>, StorageError> {
        match self.read_deck(path).await {
            Ok(deck) => Ok(Some(deck)),
            Err(StorageError::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }
}

/// Makes the deck's name agree with the file it was read from, so every
/// listed deck can be fetched, saved and deleted under that name.
fn adopt_file_name(mut deck: Deck, path: &Path) -> Result<Deck, StorageError> {
    let stem = path
        .file_stem()
        .and_then(|stem| stem.to_str())
        .ok_or_else(|| StorageError::InvalidDeckName(path.display().to_string()))?;
    if deck.name() == stem {
        return Ok(deck);
    }

    log::warn!(
        "deck file {} stores the name {:?}; using {stem:?}",
        path.display(),
        deck.name()
    );
    deck.rename(stem)?;
    if deck.name() != stem {
        return Err(StorageError::InvalidDeckName(stem.to_owned()));
    }
    Ok(deck)
}

async fn remove_if_present(path: &Path) -> Result<bool, StorageError> {
    match fs::remove_file(path).await {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e.into()),
    }
}

#[async_trait]
impl DeckRepository for JsonDirRepository {
    async fn save_deck(&self, deck: &Deck) -> Result<(), StorageError> {
        let path = self.deck_path(deck.name())?;
        let body = encode_deck(deck)?;

        // Write-then-rename so a crash never leaves a truncated deck behind.
        let tmp = path.with_extension(format!("{DECK_FILE_EXTENSION}.tmp"));
        fs::write(&tmp, body).await?;
        fs::rename(&tmp, &path).await?;
        if remove_if_present(&path.with_extension(LEGACY_FILE_EXTENSION)).await? {
            log::info!("migrated deck {:?} to {}", deck.name(), path.display());
        }

        log::debug!(
            "saved deck {:?} ({} cards) to {}",
            deck.name(),
            deck.len(),
            path.display()
        );
        Ok(())
    }

    async fn get_deck(&self, name: &str) -> Result<Option<Deck>, StorageError> {
        let path = self.deck_path(name)?;
        match self.read_if_present(&path).await? {
            Some(deck) => Ok(Some(deck)),
            None => {
                self.read_if_present(&path.with_extension(LEGACY_FILE_EXTENSION))
                    .await
            }
        }
    }

    async fn load_decks(&self) -> Result<Vec<Deck>, StorageError> {
        let mut decks = Vec::new();
        let mut entries = fs::read_dir(&self.dir).await?;

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let Some(ext) = path.extension() else {
                continue;
            };
            if ext == LEGACY_FILE_EXTENSION {
                // A saved `.json` twin supersedes the legacy file.
                if fs::try_exists(path.with_extension(DECK_FILE_EXTENSION)).await? {
                    continue;
                }
            } else if ext != DECK_FILE_EXTENSION {
                continue;
            }
            match self.read_deck(&path).await {
                Ok(deck) => decks.push(deck),
                Err(e) => log::warn!("skipping deck file {}: {e}", path.display()),
            }
        }

        decks.sort_by(|a, b| a.name().cmp(b.name()));
        Ok(decks)
    }

    async fn delete_deck(&self, name: &str) -> Result<bool, StorageError> {
        let path = self.deck_path(name)?;
        let removed = remove_if_present(&path).await?;
        let removed_legacy =
            remove_if_present(&path.with_extension(LEGACY_FILE_EXTENSION)).await?;
        if removed || removed_legacy {
            log::debug!("deleted deck {name:?}");
        }
        Ok(removed || removed_legacy)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flash_core::time::{fixed_clock, fixed_now};
    use tempfile::TempDir;

    #[tokio::test]
    async fn deck_path_rejects_traversal() {
        let temp = TempDir::new().unwrap();
        let repo = JsonDirRepository::open(temp.path(), fixed_clock()).await.unwrap();
        assert!(matches!(
            repo.deck_path("../etc"),
            Err(StorageError::InvalidDeckName(_))
        ));
        assert!(matches!(
            repo.deck_path("  "),
            Err(StorageError::InvalidDeckName(_))
        ));
        assert_eq!(
            repo.deck_path("Kanji").unwrap(),
            temp.path().join("Kanji.json")
        );
    }

    #[tokio::test]
    async fn save_leaves_no_temp_file() {
        let temp = TempDir::new().unwrap();
        let repo = JsonDirRepository::open(temp.path(), fixed_clock()).await.unwrap();
        let mut deck = Deck::new("Kanji").unwrap();
        deck.add_card("水", "water", "", fixed_now()).unwrap();
        repo.save_deck(&deck).await.unwrap();

        let names: Vec<_> = std::fs::read_dir(temp.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().into_string().unwrap())
            .collect();
        assert_eq!(names, ["Kanji.json"]);
    }
}
