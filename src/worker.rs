use crate::db::Database;
use crate::errors::{AppError, AppResult};
use crate::models::{JournalEntry, NewEntry};
use std::path::{Path, PathBuf};
use std::thread::JoinHandle;
use tokio::sync::{mpsc, oneshot};
use tokio::time::Duration;

/// Messages from the interactive side to the storage thread.
#[derive(Debug, Clone)]
pub enum WorkerRequest {
    Load { store_path: Option<PathBuf> },
    Append(NewEntry),
    Export { destination: PathBuf },
    Shutdown,
}

/// Messages from the storage thread back to the interactive side.
#[derive(Debug, Clone, PartialEq)]
pub enum WorkerEvent {
    EntriesLoaded(Vec<JournalEntry>),
    /// Entries read from a store other than the worker's own.
    StoreLoaded {
        store_path: PathBuf,
        entries: Vec<JournalEntry>,
    },
    AppendSucceeded,
    AppendFailed(String),
    LoadFailed(String),
    Exported { rows: usize, destination: PathBuf },
    ExportFailed(String),
}

/// Handle to the thread that owns all store access.
///
/// Requests are processed one at a time, in the order they were sent. The
/// worker never sees the interactive side's cache; after a successful append
/// it reloads and emits the full list instead.
#[derive(Debug)]
pub struct StorageWorker {
    requests: mpsc::UnboundedSender<WorkerRequest>,
    finished: Option<oneshot::Receiver<()>>,
    thread: Option<JoinHandle<()>>,
}

impl StorageWorker {
    pub fn spawn(db: Database) -> AppResult<(Self, mpsc::UnboundedReceiver<WorkerEvent>)> {
        let (request_tx, request_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (finished_tx, finished_rx) = oneshot::channel();

        let thread = std::thread::Builder::new()
            .name("journal-storage".to_string())
            .spawn(move || {
                run_worker(db, request_rx, event_tx);
                let _ = finished_tx.send(());
            })?;

        Ok((
            Self {
                requests: request_tx,
                finished: Some(finished_rx),
                thread: Some(thread),
            },
            event_rx,
        ))
    }

    pub fn request_load(&self, store_path: Option<PathBuf>) -> AppResult<()> {
        self.send(WorkerRequest::Load { store_path })
    }

    pub fn request_append(&self, entry: NewEntry) -> AppResult<()> {
        self.send(WorkerRequest::Append(entry))
    }

    pub fn request_export(&self, destination: PathBuf) -> AppResult<()> {
        self.send(WorkerRequest::Export { destination })
    }

    /// Asks the worker to stop and waits up to `limit` for in-flight work.
    /// Returns false when the wait timed out; the thread is then left to
    /// finish on its own.
    pub async fn shutdown(mut self, limit: Duration) -> bool {
        let _ = self.requests.send(WorkerRequest::Shutdown);
        let Some(finished) = self.finished.take() else {
            return true;
        };

        match tokio::time::timeout(limit, finished).await {
            Ok(_) => {
                if let Some(thread) = self.thread.take() {
                    if thread.join().is_err() {
                        tracing::warn!("storage worker thread panicked");
                    }
                }
                true
            }
            Err(_) => {
                tracing::warn!(
                    timeout_ms = limit.as_millis() as u64,
                    "storage worker did not stop in time"
                );
                false
            }
        }
    }

    fn send(&self, request: WorkerRequest) -> AppResult<()> {
        self.requests
            .send(request)
            .map_err(|_| AppError::Worker("storage worker has stopped".to_string()))
    }
}

fn run_worker(
    db: Database,
    mut requests: mpsc::UnboundedReceiver<WorkerRequest>,
    events: mpsc::UnboundedSender<WorkerEvent>,
) {
    tracing::info!(path = %db.path().display(), "storage worker started");

    while let Some(request) = requests.blocking_recv() {
        match request {
            WorkerRequest::Load { store_path } => {
                emit(&events, load_event(&db, store_path.as_deref()));
            }
            WorkerRequest::Append(entry) => match db.append_entry(entry, None) {
                Ok(stored) => {
                    tracing::info!(entry_id = stored.id, "entry archived");
                    emit(&events, WorkerEvent::AppendSucceeded);
                    emit(&events, load_event(&db, None));
                }
                Err(error) => {
                    tracing::error!(error = %error, "append request failed");
                    emit(&events, WorkerEvent::AppendFailed(error.to_string()));
                }
            },
            WorkerRequest::Export { destination } => match db.export_csv(&destination) {
                Ok(rows) => emit(&events, WorkerEvent::Exported { rows, destination }),
                Err(error) => {
                    tracing::error!(
                        error = %error,
                        destination = %destination.display(),
                        "export request failed"
                    );
                    emit(&events, WorkerEvent::ExportFailed(error.to_string()));
                }
            },
            WorkerRequest::Shutdown => break,
        }
    }

    tracing::info!("storage worker stopped");
}

fn load_event(db: &Database, store_path: Option<&Path>) -> WorkerEvent {
    let loaded = match store_path {
        Some(path) if path != db.path() => {
            load_other_store(path).map(|entries| WorkerEvent::StoreLoaded {
                store_path: path.to_path_buf(),
                entries,
            })
        }
        _ => db.try_load_entries().map(WorkerEvent::EntriesLoaded),
    };

    loaded.unwrap_or_else(|error| {
        tracing::error!(error = %error, "load request failed");
        WorkerEvent::LoadFailed(error.to_string())
    })
}

/// A store that does not exist reads as empty.
fn load_other_store(path: &Path) -> AppResult<Vec<JournalEntry>> {
    match Database::open_existing(path)? {
        Some(other) => other.try_load_entries(),
        None => Ok(Vec::new()),
    }
}

fn emit(events: &mpsc::UnboundedSender<WorkerEvent>, event: WorkerEvent) {
    if events.send(event).is_err() {
        tracing::debug!("worker event dropped, receiver closed");
    }
}
