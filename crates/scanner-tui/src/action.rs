//! Intents produced by components and dispatched by the App.

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComponentId {
    DateTable,
    ClipTable,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    SelectDate(i64),
    SelectClip(i64),
    ToggleDates,
    FocusNext,
    TogglePause,
    SeekRelative(f64),
    /// Jump to the clip that would play next.
    SkipClip,
    Quit,
}
