use crate::errors::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const MAX_GENTLE_REMINDER_INTERVAL_SECS: u64 = 7 * 24 * 60 * 60;
pub const MAX_REMINDER_DELAY_MINUTES: u64 = 24 * 60;

/// Startup configuration. Built once and handed to components by reference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default, deny_unknown_fields)]
pub struct AppConfig {
    pub db_path: PathBuf,
    pub legacy_json_path: PathBuf,
    pub log_dir: PathBuf,
    pub entry_character_limit: usize,
    pub gentle_reminder_interval_secs: u64,
    pub reminder_delay_choices_minutes: Vec<u64>,
    pub worker_shutdown_timeout_ms: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from("journal.sqlite3"),
            legacy_json_path: PathBuf::from("journal.json"),
            log_dir: PathBuf::from("logs"),
            entry_character_limit: 100,
            gentle_reminder_interval_secs: 10 * 60,
            reminder_delay_choices_minutes: vec![15, 30, 60],
            worker_shutdown_timeout_ms: 2000,
        }
    }
}

impl AppConfig {
    /// Reads a YAML config file; `None` means built-in defaults.
    pub fn load(path: Option<&Path>) -> AppResult<Self> {
        let config = match path {
            Some(path) => {
                let raw = fs::read_to_string(path)
                    .map_err(|err| AppError::Config(format!("{}: {}", path.display(), err)))?;
                if raw.trim().is_empty() {
                    Self::default()
                } else {
                    serde_yaml::from_str::<Self>(&raw)?
                }
            }
            None => Self::default(),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> AppResult<()> {
        if self.entry_character_limit == 0 {
            return Err(AppError::Config("entryCharacterLimit must be positive".to_string()));
        }
        if !(1..=MAX_GENTLE_REMINDER_INTERVAL_SECS).contains(&self.gentle_reminder_interval_secs) {
            return Err(AppError::Config(format!(
                "gentleReminderIntervalSecs must be between 1 and {}",
                MAX_GENTLE_REMINDER_INTERVAL_SECS
            )));
        }
        if self
            .reminder_delay_choices_minutes
            .iter()
            .any(|minutes| !(1..=MAX_REMINDER_DELAY_MINUTES).contains(minutes))
        {
            return Err(AppError::Config(format!(
                "reminderDelayChoicesMinutes must be between 1 and {}",
                MAX_REMINDER_DELAY_MINUTES
            )));
        }
        Ok(())
    }

    pub fn gentle_reminder_interval(&self) -> Duration {
        Duration::from_secs(self.gentle_reminder_interval_secs)
    }

    pub fn worker_shutdown_timeout(&self) -> Duration {
        Duration::from_millis(self.worker_shutdown_timeout_ms)
    }

    /// Delay for a `/remind` choice; `None` unless it is one of the configured choices.
    pub fn reminder_delay(&self, minutes: u64) -> Option<Duration> {
        if !self.reminder_delay_choices_minutes.contains(&minutes) {
            return None;
        }
        minutes.checked_mul(60).map(Duration::from_secs)
    }

    /// Cuts entry text at the front-end limit, counted in characters.
    pub fn limit_entry_text(&self, text: &str) -> String {
        text.trim().chars().take(self.entry_character_limit).collect()
    }
}
