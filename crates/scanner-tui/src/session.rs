//! Messages posted back into the UI loop by fetch tasks and timers.

use scanner_proto::models::{Clip, ClipDate, FullClipDate, Tone};

/// Monotonic tag attached to async work. A response carrying an older
/// generation than its owner's current one is discarded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Generation(u64);

impl Generation {
    pub fn bump(&mut self) -> Generation {
        self.0 += 1;
        *self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchKind {
    /// First load after a date change.
    Initial,
    /// Background refresh of the same date.
    Poll,
}

#[derive(Debug)]
pub enum SessionEvent {
    DatesLoaded {
        generation: Generation,
        dates: Vec<ClipDate>,
    },
    DateLoaded {
        generation: Generation,
        date_id: i64,
        date: Option<FullClipDate>,
    },
    TonesLoaded(Vec<Tone>),
    ClipsLoaded {
        generation: Generation,
        kind: FetchKind,
        clips: Vec<Clip>,
    },
    PollDue {
        generation: Generation,
    },
    RetryDue {
        generation: Generation,
    },
    SettleDue {
        generation: Generation,
    },
}
