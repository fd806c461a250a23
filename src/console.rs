use crate::config::AppConfig;
use crate::errors::AppResult;
use crate::models::{Mood, NewEntry, DEFAULT_SCALE_VALUE};
use crate::render::{render_entry_detail, render_history};
use crate::scheduler::ReminderScheduler;
use crate::session::{JournalSession, SessionUpdate};
use crate::worker::WorkerEvent;
use std::path::PathBuf;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::time::Duration;

const HELP: &str = "\
Type a line to archive it. Commands:
  /mood <name>        /intensity <1-5>    /energy <1-5>
  /body <text>        /trigger <text>     /need <text>
  /remind <minutes|off>
  /list   /show <id>  /export <path>  /browse <store>
  /away   /back       /quit";

#[derive(Debug, Clone, PartialEq)]
pub enum InteractiveCommand {
    Archive(String),
    SetMood(Mood),
    SetIntensity(f64),
    SetEnergy(f64),
    SetBody(String),
    SetTrigger(String),
    SetNeed(String),
    Remind(Option<u64>),
    List,
    Show(i64),
    Export(PathBuf),
    Browse(PathBuf),
    Away,
    Back,
    Help,
    Quit,
}

/// Parses one input line; blank lines yield `None`.
pub fn parse_command(line: &str) -> Result<Option<InteractiveCommand>, String> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }
    let Some(rest) = line.strip_prefix('/') else {
        return Ok(Some(InteractiveCommand::Archive(line.to_string())));
    };

    let (name, argument) = match rest.split_once(char::is_whitespace) {
        Some((name, argument)) => (name, argument.trim()),
        None => (rest, ""),
    };

    let command = match name.to_ascii_lowercase().as_str() {
        "mood" => InteractiveCommand::SetMood(argument.parse::<Mood>()?),
        "intensity" => InteractiveCommand::SetIntensity(parse_scale(argument)?),
        "energy" => InteractiveCommand::SetEnergy(parse_scale(argument)?),
        "body" => InteractiveCommand::SetBody(argument.to_string()),
        "trigger" => InteractiveCommand::SetTrigger(argument.to_string()),
        "need" => InteractiveCommand::SetNeed(argument.to_string()),
        "remind" => match argument {
            "" | "off" => InteractiveCommand::Remind(None),
            minutes => InteractiveCommand::Remind(Some(
                minutes
                    .parse::<u64>()
                    .map_err(|_| format!("'{}' is not a number of minutes", minutes))?,
            )),
        },
        "list" => InteractiveCommand::List,
        "show" => InteractiveCommand::Show(
            argument
                .parse::<i64>()
                .map_err(|_| format!("'{}' is not an entry id", argument))?,
        ),
        "export" if !argument.is_empty() => InteractiveCommand::Export(PathBuf::from(argument)),
        "export" => return Err("usage: /export <path>".to_string()),
        "browse" if !argument.is_empty() => InteractiveCommand::Browse(PathBuf::from(argument)),
        "browse" => return Err("usage: /browse <store path>".to_string()),
        "away" => InteractiveCommand::Away,
        "back" => InteractiveCommand::Back,
        "help" => InteractiveCommand::Help,
        "quit" | "exit" => InteractiveCommand::Quit,
        other => return Err(format!("unknown command '/{}'", other)),
    };
    Ok(Some(command))
}

fn parse_scale(argument: &str) -> Result<f64, String> {
    argument
        .parse::<f64>()
        .map_err(|_| format!("'{}' is not a value between 1 and 5", argument))
}

/// Form state carried between archived entries.
#[derive(Debug, Clone, PartialEq)]
pub struct EntryDraft {
    pub mood: Mood,
    pub emotion_intensity: f64,
    pub energy_level: f64,
    pub body_sensation: String,
    pub trigger_event: String,
    pub need_boundary: String,
    pub remind_after: Option<Duration>,
}

impl Default for EntryDraft {
    fn default() -> Self {
        Self {
            mood: Mood::Unspecified,
            emotion_intensity: DEFAULT_SCALE_VALUE,
            energy_level: DEFAULT_SCALE_VALUE,
            body_sensation: String::new(),
            trigger_event: String::new(),
            need_boundary: String::new(),
            remind_after: None,
        }
    }
}

impl EntryDraft {
    pub fn to_new_entry(&self, text: String) -> NewEntry {
        let mut entry = NewEntry::new(text, self.mood.as_str());
        entry.body_sensation = self.body_sensation.clone();
        entry.trigger_event = self.trigger_event.clone();
        entry.need_boundary = self.need_boundary.clone();
        entry.emotion_intensity = self.emotion_intensity;
        entry.energy_level = self.energy_level;
        entry
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

#[derive(Debug, Default)]
struct ConsoleState {
    draft: EntryDraft,
    print_history_on_load: bool,
    show_on_load: Option<i64>,
}

enum Flow {
    Continue,
    Quit,
}

/// Runs until `/quit` or end of input. Store access only ever happens on
/// the worker; this loop reacts to its events between input lines.
pub async fn run_interactive(
    session: &mut JournalSession,
    events: &mut UnboundedReceiver<WorkerEvent>,
    scheduler: &ReminderScheduler,
    config: &AppConfig,
) -> AppResult<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut state = ConsoleState::default();

    println!("{}", HELP);
    session.refresh()?;

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else {
                    break;
                };
                match handle_line(&line, session, scheduler, config, &mut state) {
                    Ok(Flow::Quit) => break,
                    Ok(Flow::Continue) => {}
                    Err(error) => eprintln!("{}", error),
                }
            }
            Some(event) = events.recv() => {
                let update = session.handle_event(event);
                handle_update(update, session, scheduler, config, &mut state);
            }
        }
    }

    tracing::info!("interactive session ended");
    Ok(())
}

fn handle_line(
    line: &str,
    session: &mut JournalSession,
    scheduler: &ReminderScheduler,
    config: &AppConfig,
    state: &mut ConsoleState,
) -> AppResult<Flow> {
    let command = match parse_command(line) {
        Ok(Some(command)) => command,
        Ok(None) => return Ok(Flow::Continue),
        Err(message) => {
            eprintln!("{}", message);
            return Ok(Flow::Continue);
        }
    };

    match command {
        InteractiveCommand::Archive(text) => {
            let limited = config.limit_entry_text(&text);
            if limited.chars().count() < text.trim().chars().count() {
                println!("Entry cut to {} characters.", config.entry_character_limit);
            }
            session.submit(state.draft.to_new_entry(limited), state.draft.remind_after)?;
        }
        InteractiveCommand::SetMood(mood) => state.draft.mood = mood,
        InteractiveCommand::SetIntensity(value) => state.draft.emotion_intensity = value,
        InteractiveCommand::SetEnergy(value) => state.draft.energy_level = value,
        InteractiveCommand::SetBody(value) => state.draft.body_sensation = value,
        InteractiveCommand::SetTrigger(value) => state.draft.trigger_event = value,
        InteractiveCommand::SetNeed(value) => state.draft.need_boundary = value,
        InteractiveCommand::Remind(None) => state.draft.remind_after = None,
        InteractiveCommand::Remind(Some(minutes)) => match config.reminder_delay(minutes) {
            Some(delay) => state.draft.remind_after = Some(delay),
            None => eprintln!(
                "Reminder delay must be one of {:?} minutes.",
                config.reminder_delay_choices_minutes
            ),
        },
        InteractiveCommand::List => match session.refresh()? {
            Some(entries) => println!("{}", render_history(&entries)),
            None => state.print_history_on_load = true,
        },
        InteractiveCommand::Show(id) => {
            if session.cache().is_valid() {
                print_entry(session, id);
            } else {
                state.show_on_load = Some(id);
                session.refresh()?;
            }
        }
        InteractiveCommand::Export(destination) => session.export(destination)?,
        InteractiveCommand::Browse(store_path) => session.browse_store(store_path)?,
        InteractiveCommand::Away => {
            if scheduler.start_gentle_reminders() {
                println!("Gentle reminders on.");
            }
        }
        InteractiveCommand::Back => {
            if scheduler.stop_gentle_reminders() {
                println!("Gentle reminders off.");
            }
        }
        InteractiveCommand::Help => println!("{}", HELP),
        InteractiveCommand::Quit => return Ok(Flow::Quit),
    }
    Ok(Flow::Continue)
}

fn handle_update(
    update: SessionUpdate,
    session: &JournalSession,
    scheduler: &ReminderScheduler,
    config: &AppConfig,
    state: &mut ConsoleState,
) {
    match update {
        SessionUpdate::HistoryChanged(entries) => {
            if std::mem::take(&mut state.print_history_on_load) {
                println!("{}", render_history(&entries));
            }
            if let Some(id) = state.show_on_load.take() {
                print_entry(session, id);
            }
        }
        SessionUpdate::Archived { reminder } => {
            state.draft.reset();
            scheduler.notify_archived(&config.db_path);
            if let Some(reminder) = reminder {
                scheduler.schedule_entry_reminder(reminder.delay, &reminder.preview);
            }
        }
        SessionUpdate::AppendFailed(message) => {
            eprintln!("Entry was not archived: {}", message);
        }
        SessionUpdate::LoadFailed(message) => {
            state.print_history_on_load = false;
            state.show_on_load = None;
            eprintln!("History could not be loaded: {}", message);
        }
        SessionUpdate::StoreBrowsed { store_path, entries } => {
            println!("Entries in {}:", store_path.display());
            println!("{}", render_history(&entries));
        }
        SessionUpdate::Exported { rows, destination } => {
            println!("Exported {} entries to {}", rows, destination.display());
        }
        SessionUpdate::ExportFailed(message) => eprintln!("Export failed: {}", message),
    }
}

fn print_entry(session: &JournalSession, id: i64) {
    match session.entry(id) {
        Some(entry) => println!("{}", render_entry_detail(entry)),
        None => eprintln!("No entry with id {}.", id),
    }
}
