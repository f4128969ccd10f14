use chrono::{DateTime, NaiveDate};
use serde::{Deserialize, Serialize};

/// The monitored feed, e.g. a sheriff's office scanner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClipSource {
    pub id: i64,
    pub name: String,
    pub shorthand: String,
    pub timezone: String,
}

/// One calendar day with at least one clip for a source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClipDate {
    pub id: i64,
    pub date: String,
    pub source_id: i64,
}

/// A `ClipDate` with its source embedded. Working record for the selected date.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FullClipDate {
    pub id: i64,
    pub date: String,
    pub source: ClipSource,
}

/// One recorded audio segment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Clip {
    pub id: i64,
    /// `HH:MM:SS`
    pub time: String,
    pub date_id: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tone_processed: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tones_id: Option<i64>,
}

/// An alert-tone signature. Only used for colour-coding clip rows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tone {
    pub id: i64,
    pub name: String,
    /// Hex without the leading `#`.
    pub color: String,
    #[serde(default)]
    pub frequencies: Vec<String>,
    pub source_id: i64,
}

impl Tone {
    /// Parse `color` (`"ff8800"`) into an RGB triple.
    pub fn rgb(&self) -> Option<(u8, u8, u8)> {
        let hex = self.color.trim().trim_start_matches('#');
        if hex.len() != 6 || !hex.is_ascii() {
            return None;
        }
        let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).ok();
        Some((channel(0)?, channel(2)?, channel(4)?))
    }
}

impl ClipDate {
    pub fn display_date(&self) -> String {
        display_date(&self.date)
    }
}

impl FullClipDate {
    pub fn display_date(&self) -> String {
        display_date(&self.date)
    }
}

/// Anything listed newest-first by id.
pub trait HasId {
    fn id(&self) -> i64;
}

impl HasId for ClipDate {
    fn id(&self) -> i64 {
        self.id
    }
}

impl HasId for Clip {
    fn id(&self) -> i64 {
        self.id
    }
}

/// Sort by id descending (newest first).
pub fn sort_newest_first<T: HasId>(items: &mut [T]) {
    items.sort_by(|a, b| b.id().cmp(&a.id()));
}

/// Format an ISO date or timestamp as `MM/DD/YY`. Unparseable input is
/// returned verbatim.
pub fn display_date(raw: &str) -> String {
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return ts.date_naive().format("%m/%d/%y").to_string();
    }
    let day = raw.get(..10).unwrap_or(raw);
    match NaiveDate::parse_from_str(day, "%Y-%m-%d") {
        Ok(date) => date.format("%m/%d/%y").to_string(),
        Err(_) => raw.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tone(color: &str) -> Tone {
        Tone {
            id: 1,
            name: "Fire".into(),
            color: color.into(),
            frequencies: vec!["853.2".into(), "960.0".into()],
            source_id: 1,
        }
    }

    #[test]
    fn tone_color_parses_hex() {
        assert_eq!(tone("ff8800").rgb(), Some((255, 136, 0)));
        assert_eq!(tone("#0a0B0c").rgb(), Some((10, 11, 12)));
        assert_eq!(tone("fff").rgb(), None);
        assert_eq!(tone("zzzzzz").rgb(), None);
    }

    #[test]
    fn display_date_handles_timestamps_and_plain_dates() {
        assert_eq!(display_date("2024-06-10T00:00:00.000Z"), "06/10/24");
        assert_eq!(display_date("2024-06-15"), "06/15/24");
        assert_eq!(display_date("yesterday"), "yesterday");
    }

    #[test]
    fn clip_deserializes_without_tone_fields() {
        let clip: Clip =
            serde_json::from_str(r#"{"id":7,"time":"12:02:01","date_id":1}"#).unwrap();
        assert_eq!(clip.id, 7);
        assert_eq!(clip.tones_id, None);
        assert_eq!(clip.tone_processed, None);
    }

    #[test]
    fn sorts_newest_first() {
        let mut clips: Vec<Clip> = [3, 9, 1]
            .into_iter()
            .map(|id| Clip {
                id,
                time: "00:00:00".into(),
                date_id: 1,
                tone_processed: None,
                tones_id: None,
            })
            .collect();
        sort_newest_first(&mut clips);
        let ids: Vec<i64> = clips.iter().map(|c| c.id).collect();
        assert_eq!(ids, vec![9, 3, 1]);
    }
}
