mod export;
mod legacy;

pub use export::{export_store_to_csv, CSV_HEADER, EXPORT_BATCH_SIZE};
pub use legacy::LegacyImportOutcome;

use crate::cache::EntryCache;
use crate::errors::{AppError, AppResult, RowDecodeError};
use crate::models::{clamp_scale_value, local_now, JournalEntry, NewEntry, UNSPECIFIED_MOOD};
use chrono::{DateTime, FixedOffset};
use rusqlite::types::ValueRef;
use rusqlite::{params, Connection, Row};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

const SCHEMA_SQL: &str = include_str!("schema.sql");

const ID_COLLISION_ATTEMPTS: usize = 3;

const SELECT_COLUMNS: &str = "id, timestamp, mood, text, body_sensation, trigger_event, \
                              need_boundary, emotion_intensity, energy_level";

const STRUCTURED_COLUMNS: [(&str, &str); 5] = [
    ("body_sensation", "ALTER TABLE moments ADD COLUMN body_sensation TEXT NOT NULL DEFAULT ''"),
    ("trigger_event", "ALTER TABLE moments ADD COLUMN trigger_event TEXT NOT NULL DEFAULT ''"),
    ("need_boundary", "ALTER TABLE moments ADD COLUMN need_boundary TEXT NOT NULL DEFAULT ''"),
    (
        "emotion_intensity",
        "ALTER TABLE moments ADD COLUMN emotion_intensity REAL NOT NULL DEFAULT 3.0",
    ),
    ("energy_level", "ALTER TABLE moments ADD COLUMN energy_level REAL NOT NULL DEFAULT 3.0"),
];

/// Storage gateway over the single `moments` table.
///
/// The gateway never owns an [`EntryCache`]; callers that hold one on the
/// same thread may pass it in so appends and loads keep it current.
#[derive(Debug)]
pub struct Database {
    conn: Mutex<Connection>,
    db_path: PathBuf,
}

impl Database {
    /// Opens (creating if needed) the store, brings the schema up to date and
    /// runs the one-time legacy import. Schema failures are fatal; import
    /// failures are logged and ignored.
    pub fn initialize(db_path: &Path, legacy_json_path: &Path) -> AppResult<Self> {
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|err| AppError::Io(err.to_string()))?;
            }
        }
        let conn = open_connection(db_path).map_err(schema_error)?;
        conn.execute_batch(SCHEMA_SQL).map_err(schema_error)?;

        let db = Self {
            conn: Mutex::new(conn),
            db_path: db_path.to_path_buf(),
        };

        db.ensure_structured_fields()?;
        db.migrate_scale_columns_to_real()?;

        match db.import_legacy_json(legacy_json_path) {
            Ok(outcome) => {
                tracing::info!(
                    path = %legacy_json_path.display(),
                    outcome = ?outcome,
                    "legacy import checked"
                );
            }
            Err(error) => {
                tracing::error!(
                    path = %legacy_json_path.display(),
                    error = %error,
                    "legacy import failed"
                );
            }
        }

        Ok(db)
    }

    /// Opens a store that is expected to exist already, without touching the
    /// schema. Returns `None` when there is no file at `db_path`.
    pub fn open_existing(db_path: &Path) -> AppResult<Option<Self>> {
        if !db_path.exists() {
            return Ok(None);
        }
        let conn = open_connection(db_path)?;
        Ok(Some(Self {
            conn: Mutex::new(conn),
            db_path: db_path.to_path_buf(),
        }))
    }

    pub fn path(&self) -> &Path {
        &self.db_path
    }

    pub fn append_entry(
        &self,
        new_entry: NewEntry,
        cache: Option<&mut EntryCache>,
    ) -> AppResult<JournalEntry> {
        self.append_entry_at(new_entry, local_now(), cache)
    }

    /// Persists one entry created at `created_at`. A primary-key collision
    /// bumps the id by one and retries, up to three attempts in total.
    pub fn append_entry_at(
        &self,
        new_entry: NewEntry,
        created_at: DateTime<FixedOffset>,
        cache: Option<&mut EntryCache>,
    ) -> AppResult<JournalEntry> {
        let mut entry = new_entry.into_entry(&created_at);

        let conn = self.conn()?;
        for attempt in 1..=ID_COLLISION_ATTEMPTS {
            let inserted = conn.execute(
                "INSERT INTO moments (
                   id, timestamp, mood, text, body_sensation, trigger_event, need_boundary,
                   emotion_intensity, energy_level
                 ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    entry.id,
                    entry.timestamp,
                    entry.mood,
                    entry.text,
                    entry.body_sensation,
                    entry.trigger_event,
                    entry.need_boundary,
                    entry.emotion_intensity,
                    entry.energy_level,
                ],
            );

            match inserted {
                Ok(_) => {
                    drop(conn);
                    tracing::debug!(entry_id = entry.id, attempt, "journal entry appended");
                    if let Some(cache) = cache {
                        cache.add_entry(entry.clone());
                    }
                    return Ok(entry);
                }
                Err(error) if is_constraint_violation(&error) => {
                    tracing::debug!(entry_id = entry.id, attempt, "entry id collision, retrying");
                    entry.id += 1;
                }
                Err(error) => {
                    tracing::error!(error = %error, "failed to append journal entry");
                    return Err(AppError::Append(error.to_string()));
                }
            }
        }

        tracing::error!(attempts = ID_COLLISION_ATTEMPTS, "exhausted entry id retries");
        Err(AppError::Append(format!(
            "could not allocate a unique entry id after {} attempts",
            ID_COLLISION_ATTEMPTS
        )))
    }

    /// Returns every entry newest first, serving a valid cache without a
    /// query. Read failures degrade to an empty list.
    pub fn load_entries(&self, cache: Option<&mut EntryCache>) -> Vec<JournalEntry> {
        if let Some(cached) = cache.as_deref().filter(|cache| cache.is_valid()) {
            return cached.get_all_ordered();
        }

        let entries = match self.try_load_entries() {
            Ok(entries) => entries,
            Err(error) => {
                tracing::error!(error = %error, "failed to load journal entries");
                return Vec::new();
            }
        };

        if let Some(cache) = cache {
            cache.load_all(entries.clone());
        }
        entries
    }

    /// Full scan in canonical order. Rows that cannot be decoded are logged
    /// and left out.
    pub fn try_load_entries(&self) -> AppResult<Vec<JournalEntry>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM moments ORDER BY timestamp DESC, id DESC",
            SELECT_COLUMNS
        ))?;
        let mut rows = stmt.query([])?;

        let mut entries = Vec::new();
        let mut skipped = 0usize;
        while let Some(row) = rows.next()? {
            match decode_entry_row(row) {
                Ok(entry) => entries.push(entry),
                Err(error) => {
                    skipped += 1;
                    tracing::warn!(error = %error, "skipping malformed journal row");
                }
            }
        }
        if skipped > 0 {
            tracing::warn!(skipped, loaded = entries.len(), "journal load skipped rows");
        }
        Ok(entries)
    }

    pub fn count_entries(&self) -> AppResult<i64> {
        let conn = self.conn()?;
        let count = conn.query_row("SELECT COUNT(*) FROM moments", [], |row| row.get(0))?;
        Ok(count)
    }

    fn conn(&self) -> AppResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| AppError::Internal("database mutex poisoned".to_string()))
    }

    fn ensure_structured_fields(&self) -> AppResult<()> {
        let conn = self.conn()?;
        let existing = column_types(&conn, "moments").map_err(schema_error)?;
        for (column, alter_sql) in STRUCTURED_COLUMNS {
            if existing.contains_key(column) {
                continue;
            }
            conn.execute(alter_sql, []).map_err(|error| {
                tracing::error!(column, error = %error, "failed to add journal column");
                schema_error(error)
            })?;
            tracing::info!(column, "added journal column");
        }
        Ok(())
    }

    /// Older stores kept intensity and energy as INTEGER. SQLite cannot alter
    /// a column type, so the table is rebuilt inside one transaction.
    fn migrate_scale_columns_to_real(&self) -> AppResult<bool> {
        let mut conn = self.conn()?;
        let types = column_types(&conn, "moments").map_err(schema_error)?;
        let is_real = |column: &str| {
            types
                .get(column)
                .map(|declared| declared.eq_ignore_ascii_case("REAL"))
                .unwrap_or(false)
        };
        if is_real("emotion_intensity") && is_real("energy_level") {
            return Ok(false);
        }

        let tx = conn.transaction().map_err(schema_error)?;
        tx.execute_batch(
            "CREATE TABLE moments_rebuild (
               id INTEGER PRIMARY KEY,
               timestamp TEXT NOT NULL,
               mood TEXT NOT NULL,
               text TEXT NOT NULL,
               body_sensation TEXT NOT NULL DEFAULT '',
               trigger_event TEXT NOT NULL DEFAULT '',
               need_boundary TEXT NOT NULL DEFAULT '',
               emotion_intensity REAL NOT NULL DEFAULT 3.0,
               energy_level REAL NOT NULL DEFAULT 3.0
             );
             INSERT INTO moments_rebuild
               SELECT id, timestamp, mood, text, body_sensation, trigger_event, need_boundary,
                      CAST(emotion_intensity AS REAL), CAST(energy_level AS REAL)
               FROM moments;
             DROP TABLE moments;
             ALTER TABLE moments_rebuild RENAME TO moments;
             CREATE INDEX IF NOT EXISTS idx_moments_timestamp ON moments(timestamp);",
        )
        .map_err(|error| {
            tracing::error!(error = %error, "scale column migration failed, rolling back");
            schema_error(error)
        })?;
        tx.commit().map_err(schema_error)?;

        tracing::info!("migrated emotion_intensity and energy_level to REAL");
        Ok(true)
    }
}

fn open_connection(db_path: &Path) -> rusqlite::Result<Connection> {
    let conn = Connection::open(db_path)?;
    apply_pragmas(&conn);
    Ok(conn)
}

fn apply_pragmas(conn: &Connection) {
    if let Err(error) =
        conn.execute_batch(
            "PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL; PRAGMA temp_store=MEMORY;",
        )
    {
        tracing::warn!(error = %error, "failed to apply sqlite pragmas");
    }
}

fn schema_error(error: impl std::fmt::Display) -> AppError {
    AppError::Schema(error.to_string())
}

fn is_constraint_violation(error: &rusqlite::Error) -> bool {
    matches!(
        error,
        rusqlite::Error::SqliteFailure(inner, _)
            if inner.code == rusqlite::ErrorCode::ConstraintViolation
    )
}

fn column_types(conn: &Connection, table: &str) -> rusqlite::Result<HashMap<String, String>> {
    let pragma = format!("PRAGMA table_info({})", table);
    let mut stmt = conn.prepare(&pragma)?;
    let mut rows = stmt.query([])?;
    let mut columns = HashMap::new();
    while let Some(row) = rows.next()? {
        let name: String = row.get(1)?;
        let declared: String = row.get(2)?;
        columns.insert(name, declared);
    }
    Ok(columns)
}

/// Expects the column order of `SELECT_COLUMNS`.
fn decode_entry_row(row: &Row<'_>) -> Result<JournalEntry, RowDecodeError> {
    Ok(JournalEntry {
        id: decode_id(row.get_ref(0)?)?,
        timestamp: decode_required_text(row.get_ref(1)?, "timestamp")?,
        mood: decode_text(row.get_ref(2)?, "mood", UNSPECIFIED_MOOD)?,
        text: decode_text(row.get_ref(3)?, "text", "")?,
        body_sensation: decode_text(row.get_ref(4)?, "body_sensation", "")?,
        trigger_event: decode_text(row.get_ref(5)?, "trigger_event", "")?,
        need_boundary: decode_text(row.get_ref(6)?, "need_boundary", "")?,
        emotion_intensity: clamp_scale_value(decode_scale(row.get_ref(7)?)),
        energy_level: clamp_scale_value(decode_scale(row.get_ref(8)?)),
    })
}

fn decode_id(value: ValueRef<'_>) -> Result<i64, RowDecodeError> {
    match value {
        ValueRef::Integer(id) => Ok(id),
        ValueRef::Text(raw) => String::from_utf8_lossy(raw)
            .trim()
            .parse::<i64>()
            .map_err(|_| RowDecodeError::BadType {
                column: "id",
                found: "non-numeric text".to_string(),
            }),
        ValueRef::Null => Err(RowDecodeError::Null { column: "id" }),
        other => Err(RowDecodeError::BadType {
            column: "id",
            found: other.data_type().to_string(),
        }),
    }
}

fn decode_required_text(
    value: ValueRef<'_>,
    column: &'static str,
) -> Result<String, RowDecodeError> {
    match value {
        ValueRef::Null => Err(RowDecodeError::Null { column }),
        other => decode_text(other, column, ""),
    }
}

fn decode_text(
    value: ValueRef<'_>,
    column: &'static str,
    default: &str,
) -> Result<String, RowDecodeError> {
    match value {
        ValueRef::Null => Ok(default.to_string()),
        ValueRef::Text(raw) => Ok(String::from_utf8_lossy(raw).into_owned()),
        ValueRef::Integer(number) => Ok(number.to_string()),
        ValueRef::Real(number) => Ok(number.to_string()),
        ValueRef::Blob(_) => Err(RowDecodeError::BadType {
            column,
            found: "BLOB".to_string(),
        }),
    }
}

fn decode_scale(value: ValueRef<'_>) -> Option<f64> {
    match value {
        ValueRef::Integer(number) => Some(number as f64),
        ValueRef::Real(number) => Some(number),
        ValueRef::Text(raw) => String::from_utf8_lossy(raw).trim().parse::<f64>().ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::{column_types, Database};
    use crate::cache::EntryCache;
    use crate::errors::AppError;
    use crate::models::NewEntry;
    use chrono::{DateTime, FixedOffset, TimeZone};
    use rusqlite::{params, Connection};
    use std::path::Path;

    fn instant(hour: u32, minute: u32) -> DateTime<FixedOffset> {
        FixedOffset::east_opt(2 * 3600)
            .expect("offset")
            .with_ymd_and_hms(2025, 3, 14, hour, minute, 0)
            .single()
            .expect("valid instant")
    }

    fn fresh(dir: &Path) -> Database {
        Database::initialize(&dir.join("journal.sqlite3"), &dir.join("journal.json")).expect("db")
    }

    #[test]
    fn append_then_load_returns_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let db = fresh(dir.path());

        db.append_entry(NewEntry::new("hello", "calm"), None).expect("append");

        let entries = db.load_entries(None);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].text, "hello");
        assert_eq!(entries[0].mood, "calm");
        assert_eq!(entries[0].emotion_intensity, 3.0);
        assert_eq!(entries[0].energy_level, 3.0);
    }

    #[test]
    fn appended_entry_round_trips_after_clamping() {
        let dir = tempfile::tempdir().expect("tempdir");
        let db = fresh(dir.path());

        let mut request = NewEntry::new("a long day", "tired");
        request.body_sensation = format!("  {}  ", "x".repeat(40));
        request.trigger_event = "meeting ran over".to_string();
        request.need_boundary = "rest".to_string();
        request.emotion_intensity = 7.0;
        request.energy_level = 1.5;

        let stored = db.append_entry_at(request, instant(9, 30), None).expect("append");
        assert_eq!(stored.body_sensation, "x".repeat(30));
        assert_eq!(stored.emotion_intensity, 5.0);
        assert_eq!(stored.energy_level, 1.5);
        assert_eq!(stored.timestamp, "2025-03-14T09:30:00+02:00");

        let loaded = db.try_load_entries().expect("load");
        assert_eq!(loaded, vec![stored]);
    }

    #[test]
    fn empty_mood_and_text_are_stored_as_given() {
        let dir = tempfile::tempdir().expect("tempdir");
        let db = fresh(dir.path());

        let stored = db
            .append_entry_at(NewEntry::new("", ""), instant(7, 0), None)
            .expect("append");
        let entries = db.try_load_entries().expect("load");
        assert_eq!(entries, vec![stored]);
        assert_eq!(entries[0].mood, "");
        assert_eq!(entries[0].text, "");
    }

    #[test]
    fn same_millisecond_appends_get_distinct_ids() {
        let dir = tempfile::tempdir().expect("tempdir");
        let db = fresh(dir.path());
        let at = instant(10, 0);

        let first = db.append_entry_at(NewEntry::new("one", "calm"), at, None).expect("first");
        let second = db.append_entry_at(NewEntry::new("two", "calm"), at, None).expect("second");

        assert_eq!(first.id, at.timestamp_millis());
        assert_eq!(second.id, first.id + 1);
        assert_eq!(db.count_entries().expect("count"), 2);
    }

    #[test]
    fn exhausted_id_retries_fail_the_append() {
        let dir = tempfile::tempdir().expect("tempdir");
        let db = fresh(dir.path());
        let at = instant(10, 0);

        for text in ["a", "b", "c"] {
            db.append_entry_at(NewEntry::new(text, "calm"), at, None).expect("append");
        }
        let err = db
            .append_entry_at(NewEntry::new("d", "calm"), at, None)
            .expect_err("fourth append should fail");
        assert!(matches!(err, AppError::Append(_)));
        assert_eq!(db.count_entries().expect("count"), 3);
    }

    #[test]
    fn load_orders_by_timestamp_then_id_descending() {
        let dir = tempfile::tempdir().expect("tempdir");
        let db = fresh(dir.path());

        db.append_entry_at(NewEntry::new("early", "calm"), instant(8, 0), None).expect("early");
        db.append_entry_at(NewEntry::new("late", "calm"), instant(12, 0), None).expect("late");
        db.append_entry_at(NewEntry::new("late twin", "calm"), instant(12, 0), None).expect("twin");

        let texts = db
            .load_entries(None)
            .into_iter()
            .map(|entry| entry.text)
            .collect::<Vec<_>>();
        assert_eq!(texts, vec!["late twin", "late", "early"]);
    }

    #[test]
    fn valid_cache_is_served_without_querying() {
        let dir = tempfile::tempdir().expect("tempdir");
        let db = fresh(dir.path());
        db.append_entry_at(NewEntry::new("one", "calm"), instant(8, 0), None).expect("one");

        let mut cache = EntryCache::new();
        let first = db.load_entries(Some(&mut cache));
        assert!(cache.is_valid());
        assert_eq!(first.len(), 1);

        // Written behind the cache's back, so a cached read must not see it.
        db.append_entry_at(NewEntry::new("two", "calm"), instant(9, 0), None).expect("two");
        assert_eq!(db.load_entries(Some(&mut cache)).len(), 1);
        assert_eq!(db.load_entries(None).len(), 2);
    }

    #[test]
    fn cached_view_matches_uncached_load() {
        let dir = tempfile::tempdir().expect("tempdir");
        let db = fresh(dir.path());
        let mut cache = EntryCache::new();
        db.append_entry_at(NewEntry::new("initial", "calm"), instant(8, 0), None).expect("initial");
        db.load_entries(Some(&mut cache));

        db.append_entry_at(NewEntry::new("new entry", "joyful"), instant(9, 0), Some(&mut cache))
            .expect("append with cache");

        let cached = db.load_entries(Some(&mut cache));
        assert_eq!(cached[0].text, "new entry");
        assert_eq!(cached[1].text, "initial");
        assert_eq!(cached, db.load_entries(None));
    }

    #[test]
    fn malformed_rows_are_skipped() {
        let dir = tempfile::tempdir().expect("tempdir");
        let db = fresh(dir.path());
        db.append_entry_at(NewEntry::new("good", "calm"), instant(8, 0), None).expect("good");

        {
            let conn = Connection::open(db.path()).expect("raw connection");
            conn.execute(
                "INSERT INTO moments (id, timestamp, mood, text)
                 VALUES (?1, X'00FF', 'calm', 'bad')",
                params![42i64],
            )
            .expect("insert malformed row");
        }

        let entries = db.try_load_entries().expect("load");
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].text, "good");
    }

    #[test]
    fn legacy_integer_schema_is_migrated_in_place() {
        let dir = tempfile::tempdir().expect("tempdir");
        let db_path = dir.path().join("journal.sqlite3");
        {
            let conn = Connection::open(&db_path).expect("legacy store");
            conn.execute_batch(
                "CREATE TABLE moments (
                   id INTEGER PRIMARY KEY,
                   timestamp TEXT NOT NULL,
                   mood TEXT NOT NULL,
                   text TEXT NOT NULL,
                   emotion_intensity INTEGER NOT NULL DEFAULT 3,
                   energy_level INTEGER NOT NULL DEFAULT 3
                 );
                 INSERT INTO moments (id, timestamp, mood, text, emotion_intensity, energy_level)
                 VALUES (1, '2024-05-01T08:00:00+00:00', 'sad', 'old', 2, 4);",
            )
            .expect("seed legacy store");
        }

        let db = Database::initialize(&db_path, &dir.path().join("missing.json")).expect("db");

        {
            let conn = Connection::open(&db_path).expect("inspect");
            let types = column_types(&conn, "moments").expect("columns");
            assert_eq!(types.get("emotion_intensity").map(String::as_str), Some("REAL"));
            assert_eq!(types.get("energy_level").map(String::as_str), Some("REAL"));
            assert!(types.contains_key("need_boundary"));
        }

        let entries = db.try_load_entries().expect("load");
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].text, "old");
        assert_eq!(entries[0].emotion_intensity, 2.0);
        assert_eq!(entries[0].energy_level, 4.0);
        assert_eq!(entries[0].body_sensation, "");
    }

    #[test]
    fn initialize_is_idempotent() {
        let dir = tempfile::tempdir().expect("tempdir");
        let db = fresh(dir.path());
        db.append_entry_at(NewEntry::new("kept", "calm"), instant(8, 0), None).expect("append");
        drop(db);

        let reopened = fresh(dir.path());
        assert_eq!(reopened.count_entries().expect("count"), 1);
    }

    #[test]
    fn open_existing_reports_missing_store() {
        let dir = tempfile::tempdir().expect("tempdir");
        let missing = Database::open_existing(&dir.path().join("nope.sqlite3")).expect("open");
        assert!(missing.is_none());
    }
}
