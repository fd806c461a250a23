use chrono::{DateTime, FixedOffset, Local, SecondsFormat};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

pub const DEFAULT_SCALE_VALUE: f64 = 3.0;
pub const MIN_SCALE_VALUE: f64 = 1.0;
pub const MAX_SCALE_VALUE: f64 = 5.0;
pub const STRUCTURED_FIELD_LIMIT: usize = 30;
pub const UNSPECIFIED_MOOD: &str = "unspecified";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Mood {
    Calm,
    Joyful,
    Focused,
    Grateful,
    Tired,
    Anxious,
    Frustrated,
    Sad,
    Angry,
    Uncertain,
    Other,
    Unspecified,
}

impl Mood {
    /// Selectable moods, in the order the front-end offers them.
    pub const CHOICES: [Mood; 11] = [
        Self::Calm,
        Self::Joyful,
        Self::Focused,
        Self::Grateful,
        Self::Tired,
        Self::Anxious,
        Self::Frustrated,
        Self::Sad,
        Self::Angry,
        Self::Uncertain,
        Self::Other,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Calm => "calm",
            Self::Joyful => "joyful",
            Self::Focused => "focused",
            Self::Grateful => "grateful",
            Self::Tired => "tired",
            Self::Anxious => "anxious",
            Self::Frustrated => "frustrated",
            Self::Sad => "sad",
            Self::Angry => "angry",
            Self::Uncertain => "uncertain",
            Self::Other => "other",
            Self::Unspecified => UNSPECIFIED_MOOD,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Calm => "Calm",
            Self::Joyful => "Joyful",
            Self::Focused => "Focused",
            Self::Grateful => "Grateful",
            Self::Tired => "Tired",
            Self::Anxious => "Anxious",
            Self::Frustrated => "Frustrated",
            Self::Sad => "Sad",
            Self::Angry => "Angry",
            Self::Uncertain => "Uncertain",
            Self::Other => "Other",
            Self::Unspecified => "Unspecified",
        }
    }

    /// Display label for a stored mood; unknown values are shown verbatim.
    pub fn display_for(raw: &str) -> String {
        raw.parse::<Mood>()
            .map(|mood| mood.label().to_string())
            .unwrap_or_else(|_| raw.to_string())
    }
}

impl FromStr for Mood {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_ascii_lowercase();
        Self::CHOICES
            .into_iter()
            .chain(std::iter::once(Self::Unspecified))
            .find(|mood| mood.as_str() == normalized)
            .ok_or_else(|| format!("unknown mood '{}'", value))
    }
}

/// One archived journal entry as it lives in the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JournalEntry {
    pub id: i64,
    pub timestamp: String,
    pub mood: String,
    pub text: String,
    pub body_sensation: String,
    pub trigger_event: String,
    pub need_boundary: String,
    pub emotion_intensity: f64,
    pub energy_level: f64,
}

/// Fields of an append request, before clamping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewEntry {
    pub text: String,
    pub mood: String,
    #[serde(default)]
    pub body_sensation: String,
    #[serde(default)]
    pub trigger_event: String,
    #[serde(default)]
    pub need_boundary: String,
    #[serde(default = "default_scale_value")]
    pub emotion_intensity: f64,
    #[serde(default = "default_scale_value")]
    pub energy_level: f64,
}

fn default_scale_value() -> f64 {
    DEFAULT_SCALE_VALUE
}

impl NewEntry {
    pub fn new(text: impl Into<String>, mood: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            mood: mood.into(),
            body_sensation: String::new(),
            trigger_event: String::new(),
            need_boundary: String::new(),
            emotion_intensity: DEFAULT_SCALE_VALUE,
            energy_level: DEFAULT_SCALE_VALUE,
        }
    }

    /// Builds the record that gets written, applying the storage clamps.
    /// Mood and text are stored as given; front-ends pick the mood default.
    pub fn into_entry(self, created_at: &DateTime<FixedOffset>) -> JournalEntry {
        JournalEntry {
            id: created_at.timestamp_millis(),
            timestamp: entry_timestamp(created_at),
            mood: self.mood,
            text: self.text,
            body_sensation: clamp_structured_field(&self.body_sensation),
            trigger_event: clamp_structured_field(&self.trigger_event),
            need_boundary: clamp_structured_field(&self.need_boundary),
            emotion_intensity: clamp_scale_value(Some(self.emotion_intensity)),
            energy_level: clamp_scale_value(Some(self.energy_level)),
        }
    }
}

/// Current local time with its numeric offset.
pub fn local_now() -> DateTime<FixedOffset> {
    let now = Local::now();
    now.with_timezone(now.offset())
}

pub fn entry_timestamp(created_at: &DateTime<FixedOffset>) -> String {
    created_at.to_rfc3339_opts(SecondsFormat::Secs, false)
}

/// Maps a raw slider-like value onto the 1.0..=5.0 half-step scale.
pub fn clamp_scale_value(raw: Option<f64>) -> f64 {
    let value = match raw {
        Some(value) if value.is_finite() => value,
        _ => return DEFAULT_SCALE_VALUE,
    };
    let clamped = value.clamp(MIN_SCALE_VALUE, MAX_SCALE_VALUE);
    (clamped * 2.0).round() / 2.0
}

pub fn clamp_structured_field(raw: &str) -> String {
    raw.trim().chars().take(STRUCTURED_FIELD_LIMIT).collect()
}

#[cfg(test)]
mod tests {
    use super::{clamp_scale_value, clamp_structured_field, entry_timestamp, Mood, NewEntry};
    use chrono::{FixedOffset, TimeZone};

    #[test]
    fn scale_values_clamp_and_snap_to_half_steps() {
        assert_eq!(clamp_scale_value(None), 3.0);
        assert_eq!(clamp_scale_value(Some(f64::NAN)), 3.0);
        assert_eq!(clamp_scale_value(Some(0.0)), 1.0);
        assert_eq!(clamp_scale_value(Some(9.0)), 5.0);
        assert_eq!(clamp_scale_value(Some(2.5)), 2.5);
        assert_eq!(clamp_scale_value(Some(3.3)), 3.5);
        assert_eq!(clamp_scale_value(Some(4.0)), 4.0);
    }

    #[test]
    fn structured_fields_trim_then_cut_by_characters() {
        assert_eq!(clamp_structured_field("  tight chest  "), "tight chest");
        let long = "é".repeat(40);
        let clamped = clamp_structured_field(&long);
        assert_eq!(clamped.chars().count(), 30);
        assert_eq!(clamped, "é".repeat(30));
    }

    #[test]
    fn new_entry_derives_id_and_timestamp_from_creation_instant() {
        let created_at = FixedOffset::east_opt(0)
            .expect("utc offset")
            .with_ymd_and_hms(2025, 1, 1, 10, 0, 0)
            .single()
            .expect("valid instant");
        let entry = NewEntry::new("hello", "").into_entry(&created_at);
        assert_eq!(entry.id, created_at.timestamp_millis());
        assert_eq!(entry.timestamp, "2025-01-01T10:00:00+00:00");
        assert_eq!(entry.timestamp, entry_timestamp(&created_at));
        assert_eq!(entry.mood, "");
        assert_eq!(entry.emotion_intensity, 3.0);
        assert_eq!(entry.energy_level, 3.0);
    }

    #[test]
    fn moods_parse_case_insensitively_and_display_unknowns_verbatim() {
        assert_eq!("Calm".parse::<Mood>().expect("calm"), Mood::Calm);
        assert!("elated".parse::<Mood>().is_err());
        assert_eq!(Mood::display_for("sad"), "Sad");
        assert_eq!(Mood::display_for("elated"), "elated");
    }
}
