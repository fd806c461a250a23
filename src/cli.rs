use crate::config::AppConfig;
use crate::console;
use crate::db::Database;
use crate::errors::{AppError, AppResult};
use crate::models::{Mood, NewEntry};
use crate::render::{render_entry_detail, render_history};
use crate::scheduler::{ReminderScheduler, TerminalNotifier};
use crate::session::{JournalSession, SessionUpdate};
use crate::worker::{StorageWorker, WorkerEvent};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedReceiver;

/// Local mood journal.
#[derive(Debug, Parser)]
#[command(name = "mood-journal", version, about)]
pub struct Cli {
    /// YAML configuration file.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Store location, overriding the configured one.
    #[arg(long, global = true)]
    pub db: Option<PathBuf>,

    /// Legacy JSON journal imported into an empty store.
    #[arg(long = "legacy-json", global = true)]
    pub legacy_json: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Archive one entry and exit.
    Add(AddArgs),
    /// Print past entries, newest first.
    List {
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Print one entry in full.
    Show { id: i64 },
    /// Write every entry to a CSV file, oldest first.
    Export { destination: PathBuf },
    /// Print the selectable moods.
    Moods,
    /// Line-oriented journaling session (the default).
    Interactive,
}

#[derive(Debug, Args)]
pub struct AddArgs {
    /// Entry text; several words are joined with spaces.
    #[arg(required = true)]
    pub text: Vec<String>,

    #[arg(long, short)]
    pub mood: Option<Mood>,

    #[arg(long)]
    pub body: Option<String>,

    #[arg(long)]
    pub trigger: Option<String>,

    #[arg(long)]
    pub need: Option<String>,

    #[arg(long)]
    pub intensity: Option<f64>,

    #[arg(long)]
    pub energy: Option<f64>,
}

impl Cli {
    /// Loads the config file, then applies command-line path overrides.
    pub fn resolve_config(&self) -> AppResult<AppConfig> {
        let mut config = AppConfig::load(self.config.as_deref())?;
        if let Some(db) = &self.db {
            config.db_path = db.clone();
        }
        if let Some(legacy) = &self.legacy_json {
            config.legacy_json_path = legacy.clone();
        }
        Ok(config)
    }
}

impl AddArgs {
    fn into_new_entry(self, config: &AppConfig) -> AppResult<NewEntry> {
        let text = config.limit_entry_text(&self.text.join(" "));
        if text.is_empty() {
            return Err(AppError::Cli("entry text must not be empty".to_string()));
        }
        let mood = self.mood.unwrap_or(Mood::Unspecified);
        let mut entry = NewEntry::new(text, mood.as_str());
        entry.body_sensation = self.body.unwrap_or_default();
        entry.trigger_event = self.trigger.unwrap_or_default();
        entry.need_boundary = self.need.unwrap_or_default();
        if let Some(intensity) = self.intensity {
            entry.emotion_intensity = intensity;
        }
        if let Some(energy) = self.energy {
            entry.energy_level = energy;
        }
        Ok(entry)
    }
}

pub async fn execute(command: Option<Command>, config: AppConfig) -> AppResult<()> {
    let command = command.unwrap_or(Command::Interactive);
    if matches!(command, Command::Moods) {
        for mood in Mood::CHOICES {
            println!("{:<12} {}", mood.as_str(), mood.label());
        }
        return Ok(());
    }

    let db = Database::initialize(&config.db_path, &config.legacy_json_path)?;
    let (worker, mut events) = StorageWorker::spawn(db)?;
    let mut session = JournalSession::new(worker);
    let scheduler = ReminderScheduler::new(
        Arc::new(TerminalNotifier),
        config.gentle_reminder_interval(),
    );

    let outcome = match command {
        Command::Interactive => {
            console::run_interactive(&mut session, &mut events, &scheduler, &config).await
        }
        other => run_once(other, &mut session, &mut events, &scheduler, &config).await,
    };

    scheduler.shutdown();
    if !session.shutdown(config.worker_shutdown_timeout()).await {
        tracing::warn!("exiting while the storage worker was still busy");
    }
    outcome
}

async fn run_once(
    command: Command,
    session: &mut JournalSession,
    events: &mut UnboundedReceiver<WorkerEvent>,
    scheduler: &ReminderScheduler,
    config: &AppConfig,
) -> AppResult<()> {
    match command {
        Command::Add(args) => {
            session.submit(args.into_new_entry(config)?, None)?;
            loop {
                match next_update(session, events).await? {
                    SessionUpdate::Archived { .. } => {
                        scheduler.notify_archived(&config.db_path);
                        return Ok(());
                    }
                    SessionUpdate::AppendFailed(message) => return Err(AppError::Append(message)),
                    _ => continue,
                }
            }
        }
        Command::List { limit } => {
            let mut entries = load_history(session, events).await?;
            if let Some(limit) = limit {
                entries.truncate(limit);
            }
            println!("{}", render_history(&entries));
            Ok(())
        }
        Command::Show { id } => {
            load_history(session, events).await?;
            let entry = session
                .entry(id)
                .ok_or_else(|| AppError::NotFound(format!("entry {}", id)))?;
            println!("{}", render_entry_detail(entry));
            Ok(())
        }
        Command::Export { destination } => {
            session.export(destination)?;
            loop {
                match next_update(session, events).await? {
                    SessionUpdate::Exported { rows, destination } => {
                        println!("Exported {} entries to {}", rows, destination.display());
                        return Ok(());
                    }
                    SessionUpdate::ExportFailed(message) => return Err(AppError::Export(message)),
                    _ => continue,
                }
            }
        }
        Command::Moods | Command::Interactive => Ok(()),
    }
}

async fn load_history(
    session: &mut JournalSession,
    events: &mut UnboundedReceiver<WorkerEvent>,
) -> AppResult<Vec<crate::models::JournalEntry>> {
    if let Some(entries) = session.refresh()? {
        return Ok(entries);
    }
    loop {
        match next_update(session, events).await? {
            SessionUpdate::HistoryChanged(entries) => return Ok(entries),
            SessionUpdate::LoadFailed(message) => {
                tracing::warn!(error = %message, "history unavailable");
                eprintln!("History could not be loaded: {}", message);
                return Ok(Vec::new());
            }
            _ => continue,
        }
    }
}

async fn next_update(
    session: &mut JournalSession,
    events: &mut UnboundedReceiver<WorkerEvent>,
) -> AppResult<SessionUpdate> {
    let event = events
        .recv()
        .await
        .ok_or_else(|| AppError::Worker("storage worker stopped unexpectedly".to_string()))?;
    Ok(session.handle_event(event))
}

#[cfg(test)]
mod tests {
    use super::{Cli, Command};
    use crate::config::AppConfig;
    use crate::errors::AppError;
    use crate::models::Mood;
    use clap::Parser;
    use std::path::PathBuf;

    #[test]
    fn bare_invocation_means_interactive() {
        let cli = Cli::try_parse_from(["mood-journal"]).expect("parse");
        assert!(cli.command.is_none());
    }

    #[test]
    fn add_collects_words_and_mood() {
        let cli = Cli::try_parse_from([
            "mood-journal",
            "--db",
            "/tmp/j.sqlite3",
            "add",
            "--mood",
            "Calm",
            "--intensity",
            "4.5",
            "slow",
            "morning",
        ])
        .expect("parse");
        assert_eq!(cli.db, Some(PathBuf::from("/tmp/j.sqlite3")));
        match cli.command {
            Some(Command::Add(args)) => {
                assert_eq!(args.text, vec!["slow".to_string(), "morning".to_string()]);
                assert_eq!(args.mood, Some(Mood::Calm));
                assert_eq!(args.intensity, Some(4.5));
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn add_requires_non_blank_text() {
        assert!(Cli::try_parse_from(["mood-journal", "add", "--mood", "calm"]).is_err());

        let cli = Cli::try_parse_from(["mood-journal", "add", "--mood", "calm", "   ", ""])
            .expect("parse");
        let Some(Command::Add(args)) = cli.command else {
            panic!("expected add");
        };
        let err = args
            .into_new_entry(&AppConfig::default())
            .expect_err("blank text must be refused");
        assert!(matches!(err, AppError::Cli(_)));
    }

    #[test]
    fn add_builds_a_trimmed_request_with_defaults() {
        let cli =
            Cli::try_parse_from(["mood-journal", "add", " quiet ", "evening "]).expect("parse");
        let Some(Command::Add(args)) = cli.command else {
            panic!("expected add");
        };
        let entry = args.into_new_entry(&AppConfig::default()).expect("entry");
        assert_eq!(entry.text, "quiet  evening");
        assert_eq!(entry.mood, "unspecified");
        assert_eq!(entry.emotion_intensity, 3.0);
    }

    #[test]
    fn unknown_mood_is_rejected() {
        assert!(Cli::try_parse_from(["mood-journal", "add", "--mood", "elated", "x"]).is_err());
    }

    #[test]
    fn path_overrides_win_over_config() {
        let cli = Cli::try_parse_from([
            "mood-journal",
            "list",
            "--db",
            "other.sqlite3",
            "--legacy-json",
            "old.json",
        ])
        .expect("parse");
        let config = cli.resolve_config().expect("config");
        assert_eq!(config.db_path, PathBuf::from("other.sqlite3"));
        assert_eq!(config.legacy_json_path, PathBuf::from("old.json"));
    }
}
