//! In-memory backend for controller tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use scanner_proto::api::ClipsBackend;
use scanner_proto::demo;
use scanner_proto::models::{Clip, ClipDate, FullClipDate, Tone};

pub fn clip(id: i64, date_id: i64) -> Clip {
    Clip {
        id,
        time: format!("12:{:02}:00", id % 60),
        date_id,
        tone_processed: None,
        tones_id: None,
    }
}

pub fn clips(ids: &[i64], date_id: i64) -> Vec<Clip> {
    ids.iter().map(|&id| clip(id, date_id)).collect()
}

pub fn ids(clips: &[Clip]) -> Vec<i64> {
    clips.iter().map(|c| c.id).collect()
}

#[derive(Default)]
pub struct MockBackend {
    dates: Mutex<Vec<ClipDate>>,
    clips: Mutex<HashMap<i64, Vec<Clip>>>,
    delays: Mutex<HashMap<i64, Duration>>,
    clip_calls: AtomicUsize,
}

impl MockBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_dates(self, ids: &[i64]) -> Self {
        *self.dates.lock().unwrap() = ids
            .iter()
            .map(|&id| ClipDate {
                id,
                date: format!("2024-06-{:02}", 9 + id),
                source_id: 1,
            })
            .collect();
        self
    }

    pub fn with_clips(self, date_id: i64, ids: &[i64]) -> Self {
        self.set_clips(date_id, ids);
        self
    }

    pub fn set_clips(&self, date_id: i64, ids: &[i64]) {
        self.clips
            .lock()
            .unwrap()
            .insert(date_id, clips(ids, date_id));
    }

    /// Responses for `date_id` arrive after `delay`.
    pub fn delay(&self, date_id: i64, delay: Duration) {
        self.delays.lock().unwrap().insert(date_id, delay);
    }

    pub fn clip_calls(&self) -> usize {
        self.clip_calls.load(Ordering::SeqCst)
    }

    fn delay_for(&self, id: i64) -> Option<Duration> {
        self.delays.lock().unwrap().get(&id).copied()
    }
}

impl ClipsBackend for MockBackend {
    async fn dates_by_source(&self, _source_id: i64) -> Vec<ClipDate> {
        self.dates.lock().unwrap().clone()
    }

    async fn full_date(&self, date_id: i64) -> Option<FullClipDate> {
        if let Some(delay) = self.delay_for(date_id) {
            tokio::time::sleep(delay).await;
        }
        let dates = self.dates.lock().unwrap().clone();
        dates.into_iter().find(|d| d.id == date_id).map(|d| FullClipDate {
            id: d.id,
            date: d.date,
            source: demo::source(),
        })
    }

    async fn clips_by_date(&self, date_id: i64) -> Vec<Clip> {
        self.clip_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay_for(date_id) {
            tokio::time::sleep(delay).await;
        }
        self.clips
            .lock()
            .unwrap()
            .get(&date_id)
            .cloned()
            .unwrap_or_default()
    }

    async fn tones_by_source(&self, _source_id: i64) -> Vec<Tone> {
        Vec::new()
    }

    fn audio_url(&self, clip_id: i64) -> String {
        format!("mock://clips/{}", clip_id)
    }
}
