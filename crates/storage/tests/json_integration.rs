use chrono::Duration;
use flash_core::model::{Deck, Difficulty};
use flash_core::scheduler::Scheduler;
use flash_core::time::{fixed_clock, fixed_now};
use storage::transfer::{export_deck, import_deck};
use storage::{DeckRepository, JsonDirRepository, StorageError, TimestampPolicy};
use tempfile::TempDir;

fn reviewed_deck(name: &str) -> Deck {
    let now = fixed_now();
    let mut deck = Deck::new(name).unwrap();
    deck.add_card("hund", "dog", "noun", now).unwrap();
    deck.add_card("katze", "cat", "", now).unwrap();

    let scheduler = Scheduler::new();
    let card = deck.card_mut(1).unwrap();
    card.set_difficulty(Difficulty::new(3).unwrap());
    card.record_answer(true);
    scheduler.schedule_card(card, true, now).unwrap();
    deck
}

#[tokio::test]
async fn json_dir_round_trips_scheduling_state() {
    let temp = TempDir::new().unwrap();
    let repo = JsonDirRepository::open(temp.path(), fixed_clock())
        .await
        .expect("open");

    let deck = reviewed_deck("German");
    repo.save_deck(&deck).await.unwrap();

    let fetched = repo.get_deck("German").await.unwrap().expect("deck stored");
    assert_eq!(fetched, deck);
    assert!(fetched.card(1).unwrap().next_review() > fixed_now());
    assert!(repo.get_deck("Nope").await.unwrap().is_none());
}

#[tokio::test]
async fn load_decks_skips_corrupt_files_and_sorts() {
    let temp = TempDir::new().unwrap();
    let repo = JsonDirRepository::open(temp.path(), fixed_clock())
        .await
        .unwrap();

    repo.save_deck(&reviewed_deck("Zulu")).await.unwrap();
    repo.save_deck(&reviewed_deck("Alpha")).await.unwrap();
    std::fs::write(temp.path().join("broken.json"), "{ not json").unwrap();
    std::fs::write(temp.path().join("ignored.md"), "whatever").unwrap();

    let decks = repo.load_decks().await.unwrap();
    let names: Vec<_> = decks.iter().map(|d| d.name().to_owned()).collect();
    assert_eq!(names, ["Alpha", "Zulu"]);
}

#[tokio::test]
async fn delete_removes_file_once() {
    let temp = TempDir::new().unwrap();
    let repo = JsonDirRepository::open(temp.path(), fixed_clock())
        .await
        .unwrap();
    repo.save_deck(&reviewed_deck("Gone")).await.unwrap();

    assert!(repo.delete_deck("Gone").await.unwrap());
    assert!(!repo.delete_deck("Gone").await.unwrap());
    assert!(!temp.path().join("Gone.json").exists());
}

#[tokio::test]
async fn get_deck_honours_timestamp_policy() {
    let temp = TempDir::new().unwrap();
    std::fs::write(
        temp.path().join("Legacy.json"),
        r#"{"name": "Legacy", "flashcards": [
            {"id": "1", "front": "Q", "back": "A", "last_reviewed": "not a date"}
        ]}"#,
    )
    .unwrap();

    let strict = JsonDirRepository::open(temp.path(), fixed_clock())
        .await
        .unwrap();
    assert!(matches!(
        strict.get_deck("Legacy").await,
        Err(StorageError::Timestamp(_))
    ));

    let lenient = strict.with_timestamp_policy(TimestampPolicy::SubstituteNow);
    let deck = lenient.get_deck("Legacy").await.unwrap().unwrap();
    assert_eq!(deck.card(0).unwrap().last_reviewed(), fixed_now());
}

#[tokio::test]
async fn export_then_import_preserves_deck() {
    let temp = TempDir::new().unwrap();
    let deck = reviewed_deck("Shared");

    let written = export_deck(&deck, &temp.path().join("shared")).await.unwrap();
    assert_eq!(written, temp.path().join("shared.deck"));

    let later = fixed_now() + Duration::days(30);
    let imported = import_deck(&written, later, TimestampPolicy::Strict)
        .await
        .unwrap();
    assert_eq!(imported, deck);

    assert!(matches!(
        import_deck(&temp.path().join("missing.deck"), later, TimestampPolicy::Strict).await,
        Err(StorageError::NotFound)
    ));
}

#[tokio::test]
async fn stored_name_follows_file_name() {
    let temp = TempDir::new().unwrap();
    std::fs::write(
        temp.path().join("shared.json"),
        r#"{"name": "Capitals", "flashcards": [{"id": "1", "front": "France", "back": "Paris"}]}"#,
    )
    .unwrap();
    let repo = JsonDirRepository::open(temp.path(), fixed_clock())
        .await
        .unwrap();

    let names: Vec<_> = repo
        .load_decks()
        .await
        .unwrap()
        .iter()
        .map(|d| d.name().to_owned())
        .collect();
    assert_eq!(names, ["shared"]);
    assert!(repo.get_deck("Capitals").await.unwrap().is_none());

    let deck = repo.get_deck("shared").await.unwrap().unwrap();
    assert_eq!(deck.card(0).unwrap().back(), "Paris");

    repo.save_deck(&deck).await.unwrap();
    assert!(!temp.path().join("Capitals.json").exists());
    assert!(repo.delete_deck("shared").await.unwrap());
    assert!(repo.load_decks().await.unwrap().is_empty());
}

#[tokio::test]
async fn legacy_txt_decks_load_and_migrate_on_save() {
    let temp = TempDir::new().unwrap();
    std::fs::write(
        temp.path().join("Old.txt"),
        r#"{"name": "Old", "flashcards": [{"id": "1", "front": "Q", "back": "A",
            "last_reviewed": "2023-11-14T22:13:20", "next_review": "2023-11-14T22:13:20"}]}"#,
    )
    .unwrap();
    let repo = JsonDirRepository::open(temp.path(), fixed_clock())
        .await
        .unwrap();

    let listed = repo.load_decks().await.unwrap();
    assert_eq!(listed.len(), 1);
    let mut deck = repo.get_deck("Old").await.unwrap().expect("legacy deck");
    assert_eq!(deck, listed[0]);

    deck.card_mut(0).unwrap().record_answer(true);
    repo.save_deck(&deck).await.unwrap();
    assert!(temp.path().join("Old.json").exists());
    assert!(!temp.path().join("Old.txt").exists());

    // A stale legacy copy next to the saved file is ignored.
    std::fs::write(temp.path().join("Old.txt"), "{ stale").unwrap();
    let listed = repo.load_decks().await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].card(0).unwrap().right_count(), 1);

    assert!(repo.delete_deck("Old").await.unwrap());
    assert!(!temp.path().join("Old.txt").exists());
    assert!(!temp.path().join("Old.json").exists());
}
