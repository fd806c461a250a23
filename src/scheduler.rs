use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::task::JoinHandle;
use tokio::time::{Duration, Instant};

pub const APP_TITLE: &str = "Mood Journal";
pub const FUTURE_REMINDER_TITLE: &str = "Future You";
pub const GENTLE_REMINDER_BODY: &str = "Capture the feeling worth keeping.";
pub const EMPTY_PREVIEW_REMINDER: &str = "Come back to the line you just wrote.";

const PREVIEW_LIMIT: usize = 60;

/// Where reminders and confirmations end up. Delivery is best effort.
pub trait Notifier: Send + Sync {
    fn notify(&self, title: &str, body: &str);
}

#[derive(Debug, Default)]
pub struct TerminalNotifier;

impl Notifier for TerminalNotifier {
    fn notify(&self, title: &str, body: &str) {
        tracing::info!(title, body, "notification");
        eprintln!("[{}] {}", title, body);
    }
}

/// Periodic idle nudges plus one-shot reminders for freshly archived entries.
/// Nothing here is persisted: a reminder pending at exit is dropped.
#[derive(Clone)]
pub struct ReminderScheduler {
    notifier: Arc<dyn Notifier>,
    gentle_interval: Duration,
    gentle: Arc<Mutex<Option<JoinHandle<()>>>>,
    pending: Arc<Mutex<Vec<JoinHandle<()>>>>,
}

impl ReminderScheduler {
    pub fn new(notifier: Arc<dyn Notifier>, gentle_interval: Duration) -> Self {
        Self {
            notifier,
            gentle_interval,
            gentle: Arc::new(Mutex::new(None)),
            pending: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn notifier(&self) -> Arc<dyn Notifier> {
        self.notifier.clone()
    }

    /// Starts the repeating nudge; the first one fires after a full interval.
    /// Returns false when it was already running.
    pub fn start_gentle_reminders(&self) -> bool {
        let mut gentle = lock(&self.gentle);
        if gentle.as_ref().is_some_and(|handle| !handle.is_finished()) {
            return false;
        }

        let notifier = self.notifier.clone();
        let period = self.gentle_interval;
        *gentle = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
            loop {
                ticker.tick().await;
                notifier.notify(APP_TITLE, GENTLE_REMINDER_BODY);
            }
        }));
        true
    }

    pub fn stop_gentle_reminders(&self) -> bool {
        match lock(&self.gentle).take() {
            Some(handle) => {
                handle.abort();
                true
            }
            None => false,
        }
    }

    pub fn gentle_reminders_active(&self) -> bool {
        lock(&self.gentle)
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    pub fn schedule_entry_reminder(&self, delay: Duration, preview: &str) {
        let notifier = self.notifier.clone();
        let message = reminder_preview(preview);
        tracing::debug!(delay_secs = delay.as_secs(), "entry reminder scheduled");

        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            notifier.notify(FUTURE_REMINDER_TITLE, &message);
        });

        let mut pending = lock(&self.pending);
        pending.retain(|handle| !handle.is_finished());
        pending.push(handle);
    }

    pub fn pending_reminders(&self) -> usize {
        lock(&self.pending)
            .iter()
            .filter(|handle| !handle.is_finished())
            .count()
    }

    pub fn notify_archived(&self, db_path: &Path) {
        let shown = std::fs::canonicalize(db_path).unwrap_or_else(|_| db_path.to_path_buf());
        self.notifier
            .notify(APP_TITLE, &format!("Entry archived to {}", shown.display()));
    }

    /// Drops every timer.
    pub fn shutdown(&self) {
        self.stop_gentle_reminders();
        for handle in lock(&self.pending).drain(..) {
            handle.abort();
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Whitespace-collapsed snippet of an entry, at most 60 characters.
pub fn reminder_preview(text: &str) -> String {
    let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.is_empty() {
        return EMPTY_PREVIEW_REMINDER.to_string();
    }
    if collapsed.chars().count() > PREVIEW_LIMIT {
        let mut cut = collapsed.chars().take(PREVIEW_LIMIT - 1).collect::<String>();
        cut.push('…');
        return cut;
    }
    collapsed
}
