use super::{decode_entry_row, Database, SELECT_COLUMNS};
use crate::errors::AppResult;
use std::fs;
use std::path::Path;

pub const CSV_HEADER: [&str; 9] = [
    "id",
    "timestamp",
    "mood",
    "text",
    "body_sensation",
    "trigger_event",
    "need_boundary",
    "emotion_intensity",
    "energy_level",
];

/// Rows written between flushes of the CSV writer.
pub const EXPORT_BATCH_SIZE: usize = 1000;

impl Database {
    /// Streams every entry, oldest first, into a CSV file at `destination`
    /// and returns the number of data rows written.
    pub fn export_csv(&self, destination: &Path) -> AppResult<usize> {
        if let Some(parent) = destination.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM moments ORDER BY timestamp ASC, id ASC",
            SELECT_COLUMNS
        ))?;
        let mut rows = stmt.query([])?;

        let mut writer = csv::Writer::from_path(destination)?;
        writer.write_record(CSV_HEADER)?;

        let mut written = 0usize;
        let mut skipped = 0usize;
        while let Some(row) = rows.next()? {
            let entry = match decode_entry_row(row) {
                Ok(entry) => entry,
                Err(error) => {
                    skipped += 1;
                    tracing::warn!(error = %error, "skipping malformed journal row in export");
                    continue;
                }
            };
            writer.write_record([
                entry.id.to_string(),
                entry.timestamp,
                entry.mood,
                entry.text,
                entry.body_sensation,
                entry.trigger_event,
                entry.need_boundary,
                format!("{:.1}", entry.emotion_intensity),
                format!("{:.1}", entry.energy_level),
            ])?;
            written += 1;
            if written % EXPORT_BATCH_SIZE == 0 {
                writer.flush()?;
            }
        }
        writer.flush()?;

        tracing::info!(
            rows = written,
            skipped,
            destination = %destination.display(),
            "exported journal to csv"
        );
        Ok(written)
    }
}

/// Exports the store at `db_path`; a store that does not exist yields 0 rows.
pub fn export_store_to_csv(db_path: &Path, destination: &Path) -> AppResult<usize> {
    match Database::open_existing(db_path)? {
        Some(db) => db.export_csv(destination),
        None => Ok(0),
    }
}
