use crate::cache::EntryCache;
use crate::errors::{AppError, AppResult};
use crate::models::{JournalEntry, NewEntry};
use crate::scheduler::reminder_preview;
use crate::worker::{StorageWorker, WorkerEvent};
use std::path::PathBuf;
use tokio::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppendState {
    Idle,
    Submitted,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PendingReminder {
    pub delay: Duration,
    pub preview: String,
}

/// What the front-end should do after a worker event.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionUpdate {
    HistoryChanged(Vec<JournalEntry>),
    /// Another store's entries; never merged into the session cache.
    StoreBrowsed {
        store_path: PathBuf,
        entries: Vec<JournalEntry>,
    },
    Archived { reminder: Option<PendingReminder> },
    AppendFailed(String),
    LoadFailed(String),
    Exported { rows: usize, destination: PathBuf },
    ExportFailed(String),
}

#[derive(Debug)]
struct PendingSubmission {
    preview: String,
    reminder_delay: Option<Duration>,
}

/// Interactive-side state: owns the entry cache and the archive action.
///
/// The cache is only ever touched here, in response to `EntriesLoaded`.
#[derive(Debug)]
pub struct JournalSession {
    worker: StorageWorker,
    cache: EntryCache,
    state: AppendState,
    pending: Option<PendingSubmission>,
}

impl JournalSession {
    pub fn new(worker: StorageWorker) -> Self {
        Self {
            worker,
            cache: EntryCache::new(),
            state: AppendState::Idle,
            pending: None,
        }
    }

    pub fn state(&self) -> AppendState {
        self.state
    }

    pub fn cache(&self) -> &EntryCache {
        &self.cache
    }

    pub fn entry(&self, id: i64) -> Option<&JournalEntry> {
        self.cache.get_by_id(id)
    }

    /// Serves the cached history when it is valid; otherwise asks the worker
    /// for a load and returns `None` until `HistoryChanged` arrives.
    pub fn refresh(&mut self) -> AppResult<Option<Vec<JournalEntry>>> {
        if self.cache.is_valid() {
            return Ok(Some(self.cache.get_all_ordered()));
        }
        self.worker.request_load(None)?;
        Ok(None)
    }

    /// Reads another store without touching this session's cache.
    pub fn browse_store(&self, store_path: PathBuf) -> AppResult<()> {
        self.worker.request_load(Some(store_path))
    }

    pub fn reload(&mut self) -> AppResult<()> {
        self.cache.invalidate();
        self.worker.request_load(None)
    }

    /// Sends one append. Only one may be in flight; the action stays
    /// disabled until the worker answers.
    pub fn submit(&mut self, entry: NewEntry, reminder_delay: Option<Duration>) -> AppResult<()> {
        if self.state == AppendState::Submitted {
            return Err(AppError::Busy("an entry is still being archived".to_string()));
        }
        let preview = entry.text.clone();
        self.worker.request_append(entry)?;
        self.state = AppendState::Submitted;
        self.pending = Some(PendingSubmission {
            preview,
            reminder_delay,
        });
        Ok(())
    }

    pub fn export(&self, destination: PathBuf) -> AppResult<()> {
        self.worker.request_export(destination)
    }

    pub fn handle_event(&mut self, event: WorkerEvent) -> SessionUpdate {
        match event {
            WorkerEvent::EntriesLoaded(entries) => {
                self.cache.load_all(entries.clone());
                SessionUpdate::HistoryChanged(entries)
            }
            WorkerEvent::StoreLoaded {
                store_path,
                entries,
            } => SessionUpdate::StoreBrowsed {
                store_path,
                entries,
            },
            WorkerEvent::AppendSucceeded => {
                self.state = AppendState::Idle;
                let reminder = self.pending.take().and_then(|pending| {
                    pending.reminder_delay.map(|delay| PendingReminder {
                        delay,
                        preview: reminder_preview(&pending.preview),
                    })
                });
                SessionUpdate::Archived { reminder }
            }
            WorkerEvent::AppendFailed(message) => {
                self.state = AppendState::Idle;
                self.pending = None;
                SessionUpdate::AppendFailed(message)
            }
            WorkerEvent::LoadFailed(message) => SessionUpdate::LoadFailed(message),
            WorkerEvent::Exported { rows, destination } => {
                SessionUpdate::Exported { rows, destination }
            }
            WorkerEvent::ExportFailed(message) => SessionUpdate::ExportFailed(message),
        }
    }

    pub async fn shutdown(self, limit: Duration) -> bool {
        self.worker.shutdown(limit).await
    }
}
