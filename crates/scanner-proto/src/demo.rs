//! Fixture data for offline/demo operation.
//!
//! Six dates for the Sanders County feed, nine clips per date. Clip ids
//! ascend with recording time; every list is returned newest-first, the same
//! as the live backend.

use crate::models::{sort_newest_first, Clip, ClipDate, ClipSource, FullClipDate, Tone};

const DATES: [(i64, &str); 6] = [
    (1, "2024-06-10T00:00:00.000Z"),
    (2, "2024-06-11T00:00:00.000Z"),
    (3, "2024-06-12T00:00:00.000Z"),
    (4, "2024-06-13T00:00:00.000Z"),
    (5, "2024-06-14T00:00:00.000Z"),
    (6, "2024-06-15T00:00:00.000Z"),
];

const CLIP_TIMES: [&str; 9] = [
    "10:42:21", "10:52:41", "11:12:35", "11:22:25", "11:34:12", "11:42:11", "12:02:01",
    "12:20:21", "12:42:25",
];

pub fn source() -> ClipSource {
    ClipSource {
        id: 1,
        name: "Sanders County Sheriff's Office".to_string(),
        shorthand: "SCSO".to_string(),
        timezone: "America/Denver".to_string(),
    }
}

pub fn dates_by_source(source_id: i64) -> Vec<ClipDate> {
    let mut rows: Vec<ClipDate> = DATES
        .iter()
        .map(|(id, date)| ClipDate {
            id: *id,
            date: date.to_string(),
            source_id: 1,
        })
        .filter(|row| row.source_id == source_id)
        .collect();
    sort_newest_first(&mut rows);
    rows
}

pub fn full_date(date_id: i64) -> Option<FullClipDate> {
    DATES
        .iter()
        .find(|(id, _)| *id == date_id)
        .map(|(id, date)| FullClipDate {
            id: *id,
            date: date.to_string(),
            source: source(),
        })
}

pub fn clips_by_date(date_id: i64) -> Vec<Clip> {
    let mut rows: Vec<Clip> = DATES
        .iter()
        .enumerate()
        .flat_map(|(day_idx, (day_id, _))| {
            CLIP_TIMES.iter().enumerate().map(move |(i, time)| Clip {
                id: (day_idx * CLIP_TIMES.len() + i + 1) as i64,
                time: time.to_string(),
                date_id: *day_id,
                tone_processed: None,
                tones_id: None,
            })
        })
        .filter(|clip| clip.date_id == date_id)
        .collect();
    sort_newest_first(&mut rows);
    rows
}

/// The demo feed has no tone classifications.
pub fn tones_by_source(_source_id: i64) -> Vec<Tone> {
    Vec::new()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn six_dates_newest_first() {
        let ids: Vec<i64> = dates_by_source(1).iter().map(|d| d.id).collect();
        assert_eq!(ids, vec![6, 5, 4, 3, 2, 1]);
        assert!(dates_by_source(2).is_empty());
    }

    #[test]
    fn clips_match_fixture_ids() {
        let clips = clips_by_date(2);
        let ids: Vec<i64> = clips.iter().map(|c| c.id).collect();
        assert_eq!(ids, (10..=18).rev().collect::<Vec<_>>());
        assert_eq!(clips[0].time, "12:42:25");
        assert_eq!(clips[8].time, "10:42:21");
        assert!(clips_by_date(99).is_empty());
    }

    #[test]
    fn full_date_embeds_source() {
        let date = full_date(3).unwrap();
        assert_eq!(date.source.shorthand, "SCSO");
        assert_eq!(date.date, "2024-06-12T00:00:00.000Z");
        assert!(full_date(7).is_none());
    }
}
