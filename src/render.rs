use crate::models::{JournalEntry, Mood};
use chrono::DateTime;

pub const EMPTY_HISTORY_NOTICE: &str = "No entries yet.";
pub const UNKNOWN_TIME: &str = "Unknown time";
pub const EMPTY_BODY_PLACEHOLDER: &str = "(this moment was left empty)";

const LIST_SNIPPET_LIMIT: usize = 48;

/// `YYYY-MM-DD HH:MM` in the offset the entry was written with.
pub fn format_timestamp_display(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return UNKNOWN_TIME.to_string();
    }
    match DateTime::parse_from_rfc3339(trimmed) {
        Ok(parsed) => parsed.format("%Y-%m-%d %H:%M").to_string(),
        Err(_) => trimmed.to_string(),
    }
}

pub fn render_list_line(entry: &JournalEntry) -> String {
    let collapsed = entry.text.split_whitespace().collect::<Vec<_>>().join(" ");
    let snippet = if collapsed.chars().count() > LIST_SNIPPET_LIMIT {
        let mut cut = collapsed.chars().take(LIST_SNIPPET_LIMIT - 1).collect::<String>();
        cut.push('…');
        cut
    } else {
        collapsed
    };
    format!(
        "[{}] {}  {:<12} {}",
        entry.id,
        format_timestamp_display(&entry.timestamp),
        Mood::display_for(&entry.mood),
        snippet
    )
}

pub fn render_history(entries: &[JournalEntry]) -> String {
    if entries.is_empty() {
        return EMPTY_HISTORY_NOTICE.to_string();
    }
    entries
        .iter()
        .map(render_list_line)
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn render_entry_detail(entry: &JournalEntry) -> String {
    let mut lines = vec![
        format!(
            "{}  ({})",
            format_timestamp_display(&entry.timestamp),
            Mood::display_for(&entry.mood)
        ),
        format!(
            "Intensity {:.1}/5   Energy {:.1}/5",
            entry.emotion_intensity, entry.energy_level
        ),
    ];

    for (label, value) in [
        ("Body", &entry.body_sensation),
        ("Trigger", &entry.trigger_event),
        ("Need", &entry.need_boundary),
    ] {
        if !value.trim().is_empty() {
            lines.push(format!("{}: {}", label, value));
        }
    }

    lines.push(String::new());
    if entry.text.trim().is_empty() {
        lines.push(EMPTY_BODY_PLACEHOLDER.to_string());
    } else {
        lines.push(entry.text.clone());
    }
    lines.join("\n")
}
