use super::Database;
use anyhow::Context;
use crate::errors::AppResult;
use crate::models::{clamp_scale_value, clamp_structured_field, JournalEntry, UNSPECIFIED_MOOD};
use chrono::DateTime;
use rusqlite::params;
use serde_json::Value;
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LegacyImportOutcome {
    MissingFile,
    EmptyFile,
    NoEntries,
    StoreNotEmpty,
    Imported(usize),
}

impl Database {
    /// One-time import of the old `{"moments": [...]}` journal file. The
    /// file itself is never modified.
    pub(crate) fn import_legacy_json(&self, json_path: &Path) -> AppResult<LegacyImportOutcome> {
        let metadata = match fs::metadata(json_path) {
            Ok(metadata) => metadata,
            Err(_) => return Ok(LegacyImportOutcome::MissingFile),
        };
        if metadata.len() == 0 {
            return Ok(LegacyImportOutcome::EmptyFile);
        }

        let raw = fs::read_to_string(json_path)
            .with_context(|| format!("reading legacy journal {}", json_path.display()))?;
        let document: Value =
            serde_json::from_str(&raw).context("legacy journal is not valid JSON")?;
        let entries = legacy_entries(&document);
        if entries.is_empty() {
            return Ok(LegacyImportOutcome::NoEntries);
        }

        let mut conn = self.conn()?;
        let existing: i64 = conn.query_row("SELECT COUNT(*) FROM moments", [], |row| row.get(0))?;
        if existing > 0 {
            return Ok(LegacyImportOutcome::StoreNotEmpty);
        }

        let tx = conn.transaction()?;
        let mut imported = 0usize;
        {
            let mut stmt = tx.prepare(
                "INSERT OR IGNORE INTO moments (
                   id, timestamp, mood, text, body_sensation, trigger_event, need_boundary,
                   emotion_intensity, energy_level
                 ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            )?;
            for entry in &entries {
                imported += stmt.execute(params![
                    entry.id,
                    entry.timestamp,
                    entry.mood,
                    entry.text,
                    entry.body_sensation,
                    entry.trigger_event,
                    entry.need_boundary,
                    entry.emotion_intensity,
                    entry.energy_level,
                ])?;
            }
        }
        tx.commit()?;

        tracing::info!(imported, candidates = entries.len(), "imported legacy journal entries");
        Ok(LegacyImportOutcome::Imported(imported))
    }
}

fn legacy_entries(document: &Value) -> Vec<JournalEntry> {
    let Some(moments) = document.get("moments").and_then(Value::as_array) else {
        return Vec::new();
    };
    moments
        .iter()
        .filter_map(|raw| {
            let entry = legacy_entry(raw);
            if entry.is_none() {
                tracing::warn!(entry = %raw, "skipping unusable legacy entry");
            }
            entry
        })
        .collect()
}

fn legacy_entry(raw: &Value) -> Option<JournalEntry> {
    let fields = raw.as_object()?;
    let text_field = |name: &str| fields.get(name).map(scalar_to_string);

    let timestamp = text_field("timestamp").unwrap_or_default();
    let id = match fields.get("id") {
        Some(Value::Null) | None => id_from_timestamp(&timestamp)?,
        Some(value) => id_from_value(value)?,
    };
    let mood = text_field("mood")
        .filter(|mood| !mood.is_empty())
        .unwrap_or_else(|| UNSPECIFIED_MOOD.to_string());

    Some(JournalEntry {
        id,
        timestamp,
        mood,
        text: text_field("text").unwrap_or_default(),
        body_sensation: clamp_structured_field(&text_field("body_sensation").unwrap_or_default()),
        trigger_event: clamp_structured_field(&text_field("trigger_event").unwrap_or_default()),
        need_boundary: clamp_structured_field(&text_field("need_boundary").unwrap_or_default()),
        emotion_intensity: clamp_scale_value(
            fields.get("emotion_intensity").and_then(scale_from_value),
        ),
        energy_level: clamp_scale_value(fields.get("energy_level").and_then(scale_from_value)),
    })
}

fn scalar_to_string(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

fn id_from_value(value: &Value) -> Option<i64> {
    match value {
        Value::Number(number) => number
            .as_i64()
            .or_else(|| {
                number
                    .as_f64()
                    .filter(|float| float.fract() == 0.0)
                    .map(|float| float as i64)
            }),
        Value::String(text) => text.trim().parse().ok(),
        _ => None,
    }
}

fn id_from_timestamp(timestamp: &str) -> Option<i64> {
    DateTime::parse_from_rfc3339(timestamp)
        .ok()
        .map(|parsed| parsed.timestamp_millis())
}

fn scale_from_value(value: &Value) -> Option<f64> {
    match value {
        Value::Number(number) => number.as_f64(),
        Value::String(text) => text.trim().parse().ok(),
        _ => None,
    }
}
