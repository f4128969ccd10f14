//! Read-only view of session state handed to components when drawing.

use std::collections::HashMap;

use scanner_proto::models::Tone;

use crate::player::Playback;

#[derive(Debug, Default)]
pub struct AppState {
    pub demo: bool,
    /// "SCSO · 06/12/24" style header text for the selected date.
    pub heading: Option<String>,
    pub current_date_id: Option<i64>,
    pub current_clip_id: Option<i64>,
    pub dates_loading: bool,
    pub clips_loading: bool,
    /// Playback caught up and is waiting for a next clip.
    pub waiting_for_clips: bool,
    pub playback: Playback,
    pub tones: HashMap<i64, Tone>,
}

impl AppState {
    pub fn tone(&self, id: Option<i64>) -> Option<&Tone> {
        id.and_then(|id| self.tones.get(&id))
    }
}
