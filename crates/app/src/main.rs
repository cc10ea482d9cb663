use std::fmt;
use std::io::Write as _;
use std::path::PathBuf;
use std::sync::Arc;

use flash_core::model::Difficulty;
use flash_core::stats::{AccuracyBand, DeckStats};
use flash_core::time::format_timestamp;
use services::{Clock, DeckService, ImportConflict, ImportOutcome, StudyService};
use storage::{Storage, TimestampPolicy};
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};

#[derive(Debug)]
enum ArgsError {
    MissingValue { flag: &'static str },
    MissingArgument { what: &'static str },
    MissingCommand,
    UnknownCommand(String),
    UnknownArg(String),
    InvalidDifficulty { raw: String },
    InvalidConflict { raw: String },
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::MissingArgument { what } => write!(f, "missing {what}"),
            ArgsError::MissingCommand => write!(f, "no subcommand given"),
            ArgsError::UnknownCommand(cmd) => write!(f, "unknown subcommand: {cmd}"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::InvalidDifficulty { raw } => {
                write!(f, "invalid --difficulty value: {raw} (expected 1-5)")
            }
            ArgsError::InvalidConflict { raw } => write!(
                f,
                "invalid --on-conflict value: {raw} (expected overwrite, skip or rename:<name>)"
            ),
        }
    }
}

impl std::error::Error for ArgsError {}

fn require_value(
    args: &mut impl Iterator<Item = String>,
    flag: &'static str,
) -> Result<String, ArgsError> {
    args.next().ok_or(ArgsError::MissingValue { flag })
}

fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  flashdeck [--data-dir <dir>] [--strict-timestamps] <command>");
    eprintln!();
    eprintln!("Commands:");
    eprintln!("  decks");
    eprintln!("  create <name>");
    eprintln!("  rename <name> <new-name>");
    eprintln!("  delete <name>");
    eprintln!("  add --deck <name> --front <text> --back <text> [--notes <text>] [--difficulty <1-5>]");
    eprintln!("  review --deck <name>");
    eprintln!("  export --deck <name> <path>");
    eprintln!("  import <path> [--on-conflict overwrite|skip|rename:<name>]");
    eprintln!();
    eprintln!("Defaults:");
    eprintln!("  --data-dir data");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  FLASHDECK_DATA_DIR, RUST_LOG");
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Command {
    Decks,
    Create {
        name: String,
    },
    Rename {
        name: String,
        new_name: String,
    },
    Delete {
        name: String,
    },
    Add {
        deck: String,
        front: String,
        back: String,
        notes: String,
        difficulty: Option<Difficulty>,
    },
    Review {
        deck: String,
    },
    Export {
        deck: String,
        path: PathBuf,
    },
    Import {
        path: PathBuf,
        on_conflict: ImportConflict,
    },
}

/// Per-command flags and positionals, collected before the command is built.
#[derive(Debug, Default)]
struct Flags {
    deck: Option<String>,
    front: Option<String>,
    back: Option<String>,
    notes: Option<String>,
    difficulty: Option<Difficulty>,
    on_conflict: Option<ImportConflict>,
    positionals: Vec<String>,
}

impl Flags {
    fn positional(&self, index: usize, what: &'static str) -> Result<String, ArgsError> {
        self.positionals
            .get(index)
            .cloned()
            .ok_or(ArgsError::MissingArgument { what })
    }

    fn deck(&mut self) -> Result<String, ArgsError> {
        self.deck
            .take()
            .ok_or(ArgsError::MissingValue { flag: "--deck" })
    }
}

#[derive(Debug)]
struct Args {
    data_dir: PathBuf,
    strict_timestamps: bool,
    command: Command,
}

impl Args {
    fn parse(args: impl IntoIterator<Item = String>) -> Result<Option<Self>, ArgsError> {
        let mut data_dir = std::env::var("FLASHDECK_DATA_DIR")
            .ok()
            .filter(|value| !value.trim().is_empty())
            .map_or_else(|| PathBuf::from("data"), PathBuf::from);
        let mut strict_timestamps = false;
        let mut command_name: Option<String> = None;
        let mut flags = Flags::default();

        let mut args = args.into_iter();
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--data-dir" => data_dir = PathBuf::from(require_value(&mut args, "--data-dir")?),
                "--strict-timestamps" => strict_timestamps = true,
                "--deck" => flags.deck = Some(require_value(&mut args, "--deck")?),
                "--front" => flags.front = Some(require_value(&mut args, "--front")?),
                "--back" => flags.back = Some(require_value(&mut args, "--back")?),
                "--notes" => flags.notes = Some(require_value(&mut args, "--notes")?),
                "--difficulty" => {
                    let raw = require_value(&mut args, "--difficulty")?;
                    flags.difficulty = Some(parse_difficulty(&raw)?);
                }
                "--on-conflict" => {
                    let raw = require_value(&mut args, "--on-conflict")?;
                    flags.on_conflict = Some(parse_conflict(&raw)?);
                }
                "--help" | "-h" => return Ok(None),
                _ if arg.starts_with("--") => return Err(ArgsError::UnknownArg(arg)),
                _ if command_name.is_none() => command_name = Some(arg),
                _ => flags.positionals.push(arg),
            }
        }

        let name = command_name.ok_or(ArgsError::MissingCommand)?;
        let command = Command::build(&name, flags)?;
        Ok(Some(Self {
            data_dir,
            strict_timestamps,
            command,
        }))
    }
}

impl Command {
    fn build(name: &str, mut flags: Flags) -> Result<Self, ArgsError> {
        let command = match name {
            "decks" => Self::Decks,
            "create" => Self::Create {
                name: flags.positional(0, "deck name")?,
            },
            "rename" => Self::Rename {
                name: flags.positional(0, "deck name")?,
                new_name: flags.positional(1, "new deck name")?,
            },
            "delete" => Self::Delete {
                name: flags.positional(0, "deck name")?,
            },
            "add" => Self::Add {
                deck: flags.deck()?,
                front: flags
                    .front
                    .take()
                    .ok_or(ArgsError::MissingValue { flag: "--front" })?,
                back: flags
                    .back
                    .take()
                    .ok_or(ArgsError::MissingValue { flag: "--back" })?,
                notes: flags.notes.take().unwrap_or_default(),
                difficulty: flags.difficulty,
            },
            "review" => Self::Review {
                deck: flags.deck()?,
            },
            "export" => Self::Export {
                deck: flags.deck()?,
                path: PathBuf::from(flags.positional(0, "export path")?),
            },
            "import" => Self::Import {
                path: PathBuf::from(flags.positional(0, "import path")?),
                on_conflict: flags.on_conflict.unwrap_or(ImportConflict::Skip),
            },
            other => return Err(ArgsError::UnknownCommand(other.to_owned())),
        };
        Ok(command)
    }
}

fn parse_difficulty(raw: &str) -> Result<Difficulty, ArgsError> {
    raw.trim()
        .parse::<u8>()
        .ok()
        .and_then(|value| Difficulty::new(value).ok())
        .ok_or_else(|| ArgsError::InvalidDifficulty {
            raw: raw.to_owned(),
        })
}

fn parse_conflict(raw: &str) -> Result<ImportConflict, ArgsError> {
    match raw {
        "overwrite" => Ok(ImportConflict::Overwrite),
        "skip" => Ok(ImportConflict::Skip),
        _ => raw
            .strip_prefix("rename:")
            .filter(|name| !name.trim().is_empty())
            .map(|name| ImportConflict::Rename(name.to_owned()))
            .ok_or_else(|| ArgsError::InvalidConflict {
                raw: raw.to_owned(),
            }),
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let parsed = match Args::parse(std::env::args().skip(1)) {
        Ok(Some(parsed)) => parsed,
        Ok(None) => {
            print_usage();
            return Ok(());
        }
        Err(e) => {
            print_usage();
            return Err(e.into());
        }
    };

    // Files written by older versions may carry odd dates; only refuse them on request.
    let policy = if parsed.strict_timestamps {
        TimestampPolicy::Strict
    } else {
        TimestampPolicy::SubstituteNow
    };
    let clock = Clock::default();
    let storage = Storage::json_dir(&parsed.data_dir, clock, policy).await?;
    log::debug!("using data directory {}", parsed.data_dir.display());

    let decks = DeckService::new(clock, Arc::clone(&storage.decks)).with_timestamp_policy(policy);

    match parsed.command {
        Command::Decks => {
            let all = decks.list_decks().await?;
            if all.is_empty() {
                println!("No decks yet. Create one with `flashdeck create <name>`.");
            }
            for deck in &all {
                let stats = DeckStats::from_deck(deck, clock.now());
                println!("{}", describe_deck(deck.name(), &stats));
            }
        }
        Command::Create { name } => {
            let deck = decks.create_deck(&name).await?;
            println!("Created deck {:?}.", deck.name());
        }
        Command::Rename { name, new_name } => {
            let deck = decks.rename_deck(&name, &new_name).await?;
            println!("Renamed deck {name:?} to {:?}.", deck.name());
        }
        Command::Delete { name } => {
            if decks.delete_deck(&name).await? {
                println!("Deleted deck {name:?}.");
            } else {
                println!("No deck named {name:?}.");
            }
        }
        Command::Add {
            deck,
            front,
            back,
            notes,
            difficulty,
        } => {
            let id = decks.add_card(&deck, &front, &back, &notes, difficulty).await?;
            println!("Added card {id} to {deck:?}.");
        }
        Command::Review { deck } => {
            let study = StudyService::new(clock, Arc::clone(&storage.decks));
            review(&study, &deck).await?;
        }
        Command::Export { deck, path } => {
            let written = decks.export_deck(&deck, &path).await?;
            println!("Exported {deck:?} to {}.", written.display());
        }
        Command::Import { path, on_conflict } => match decks.import_deck(&path, on_conflict).await? {
            ImportOutcome::Imported(name) => println!("Imported deck {name:?}."),
            ImportOutcome::Replaced(name) => println!("Replaced deck {name:?}."),
            ImportOutcome::Skipped(name) => {
                println!("Deck {name:?} already exists; import skipped.");
            }
        },
    }

    Ok(())
}

fn describe_deck(name: &str, stats: &DeckStats) -> String {
    let percent = stats.accuracy * 100.0;
    let band = match AccuracyBand::from_percent(percent) {
        AccuracyBand::High => "good",
        AccuracyBand::Medium => "fair",
        AccuracyBand::Low => "needs work",
    };
    if stats.total_attempts() == 0 {
        format!(
            "{name}: {} cards, {} due, not reviewed yet",
            stats.card_count, stats.due_count
        )
    } else {
        format!(
            "{name}: {} cards, {} due, {percent:.1}% correct ({band})",
            stats.card_count, stats.due_count
        )
    }
}

type Input = Lines<BufReader<Stdin>>;

async fn prompt(input: &mut Input, text: &str) -> std::io::Result<Option<String>> {
    print!("{text}");
    std::io::stdout().flush()?;
    Ok(input.next_line().await?.map(|line| line.trim().to_owned()))
}

async fn review(study: &StudyService, deck: &str) -> Result<(), Box<dyn std::error::Error>> {
    let mut session = study.open(deck).await?;
    if session.deck().is_empty() {
        println!("No flashcards in {deck:?}. Add some with `flashdeck add`.");
        return Ok(());
    }
    log::info!(
        "reviewing {deck:?} at learning rate {:.2}",
        study.learning_rate().value()
    );

    let mut input = BufReader::new(tokio::io::stdin()).lines();
    'cards: loop {
        let card = session.current_card()?;
        println!();
        println!(
            "[{}/{}] {}",
            session.current_index() + 1,
            session.deck().len(),
            card.front()
        );
        match prompt(&mut input, "Press Enter to reveal, q to quit: ").await? {
            None => break,
            Some(line) if line == "q" => break,
            Some(_) => {}
        }

        session.flip()?;
        let card = session.current_card()?;
        println!("  {}", card.back());
        if !card.notes().is_empty() {
            println!("  notes: {}", card.notes());
            session.toggle_notes();
        }

        let mut rerate = None;
        let is_right = loop {
            let Some(line) =
                prompt(&mut input, "Right? y/n (1-5 re-rates, note <text>, q quits): ").await?
            else {
                break 'cards;
            };
            match line.as_str() {
                "y" => break true,
                "n" => break false,
                "q" => break 'cards,
                _ => {}
            }
            if let Some(text) = line.strip_prefix("note ") {
                study.save_notes(&mut session, text).await?;
                println!("  notes saved");
            } else if let Ok(difficulty) = parse_difficulty(&line) {
                rerate = Some(difficulty);
                println!("  difficulty set to {difficulty}");
            } else {
                println!("  answer y or n");
            }
        };

        let outcome = study.answer(&mut session, is_right, rerate).await?;
        println!(
            "  next review {} ({:.1} days)",
            format_timestamp(outcome.review.scheduled.next_review),
            outcome.review.scheduled.interval_days
        );
    }

    println!();
    println!("{}", session.tally());
    Ok(())
}

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    if let Err(err) = run().await {
        eprintln!("{err}");
        std::process::exit(2);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<Option<Args>, ArgsError> {
        Args::parse(args.iter().map(|s| (*s).to_owned()))
    }

    #[test]
    fn parses_add_with_global_flags() {
        let args = parse(&[
            "--data-dir",
            "/tmp/decks",
            "add",
            "--deck",
            "Spanish",
            "--front",
            "perro",
            "--back",
            "dog",
            "--difficulty",
            "3",
        ])
        .unwrap()
        .unwrap();

        assert_eq!(args.data_dir, PathBuf::from("/tmp/decks"));
        assert!(!args.strict_timestamps);
        assert_eq!(
            args.command,
            Command::Add {
                deck: "Spanish".into(),
                front: "perro".into(),
                back: "dog".into(),
                notes: String::new(),
                difficulty: Difficulty::new(3).ok(),
            }
        );
    }

    #[test]
    fn import_conflict_values() {
        assert_eq!(parse_conflict("overwrite").unwrap(), ImportConflict::Overwrite);
        assert_eq!(
            parse_conflict("rename:Copy").unwrap(),
            ImportConflict::Rename("Copy".into())
        );
        assert!(matches!(
            parse_conflict("rename:"),
            Err(ArgsError::InvalidConflict { .. })
        ));

        let args = parse(&["import", "shared.deck"]).unwrap().unwrap();
        assert_eq!(
            args.command,
            Command::Import {
                path: PathBuf::from("shared.deck"),
                on_conflict: ImportConflict::Skip,
            }
        );
    }

    #[test]
    fn rejects_bad_input() {
        assert!(matches!(parse(&[]), Err(ArgsError::MissingCommand)));
        assert!(matches!(parse(&["frobnicate"]), Err(ArgsError::UnknownCommand(_))));
        assert!(matches!(
            parse(&["review"]),
            Err(ArgsError::MissingValue { flag: "--deck" })
        ));
        assert!(matches!(
            parse(&["add", "--deck", "x", "--front", "a", "--back", "b", "--difficulty", "9"]),
            Err(ArgsError::InvalidDifficulty { .. })
        ));
        assert!(matches!(parse(&["decks", "--verbose"]), Err(ArgsError::UnknownArg(_))));
        assert!(parse(&["--help"]).unwrap().is_none());
    }

    #[test]
    fn describes_unreviewed_and_reviewed_decks() {
        let fresh = DeckStats {
            card_count: 2,
            due_count: 2,
            total_right: 0,
            total_wrong: 0,
            accuracy: 0.0,
            mean_retention: 0.0,
        };
        assert_eq!(
            describe_deck("A", &fresh),
            "A: 2 cards, 2 due, not reviewed yet"
        );

        let reviewed = DeckStats {
            total_right: 3,
            total_wrong: 1,
            accuracy: 0.75,
            ..fresh
        };
        assert_eq!(
            describe_deck("A", &reviewed),
            "A: 2 cards, 2 due, 75.0% correct (good)"
        );
    }
}
