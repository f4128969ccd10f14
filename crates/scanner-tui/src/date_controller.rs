//! Date list for the monitored source and the selected date.

use std::sync::Arc;

use scanner_proto::api::ClipsBackend;
use scanner_proto::models::{sort_newest_first, ClipDate, FullClipDate};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::session::{Generation, SessionEvent};

pub struct DateController<B> {
    backend: Arc<B>,
    tx: mpsc::Sender<SessionEvent>,
    source_id: i64,
    list_generation: Generation,
    select_generation: Generation,
    dates: Vec<ClipDate>,
    loading: bool,
    selected_id: Option<i64>,
    selected: Option<FullClipDate>,
    /// Whether the date panel is open. Forced open while nothing is selected.
    expanded: bool,
}

impl<B: ClipsBackend> DateController<B> {
    pub fn new(backend: Arc<B>, tx: mpsc::Sender<SessionEvent>, source_id: i64) -> Self {
        Self {
            backend,
            tx,
            source_id,
            list_generation: Generation::default(),
            select_generation: Generation::default(),
            dates: Vec::new(),
            loading: false,
            selected_id: None,
            selected: None,
            expanded: true,
        }
    }

    /// Fetch the date list, then the tone palette, for the source.
    pub fn load(&mut self) {
        let generation = self.list_generation.bump();
        self.loading = true;

        let backend = Arc::clone(&self.backend);
        let tx = self.tx.clone();
        let source_id = self.source_id;
        tokio::spawn(async move {
            let dates = backend.dates_by_source(source_id).await;
            let _ = tx
                .send(SessionEvent::DatesLoaded { generation, dates })
                .await;
            let tones = backend.tones_by_source(source_id).await;
            let _ = tx.send(SessionEvent::TonesLoaded(tones)).await;
        });
    }

    pub fn handle_dates_loaded(
        &mut self,
        generation: Generation,
        mut dates: Vec<ClipDate>,
    ) -> bool {
        if generation != self.list_generation {
            return false;
        }
        sort_newest_first(&mut dates);
        info!("[dates] {} dates for source {}", dates.len(), self.source_id);
        self.loading = false;
        self.dates = dates;
        true
    }

    /// Make `date_id` the selected date and close the panel. Returns true
    /// if the selection changed.
    pub fn select(&mut self, date_id: i64) -> bool {
        self.expanded = false;
        if self.selected_id == Some(date_id) {
            return false;
        }
        let generation = self.select_generation.bump();
        self.selected_id = Some(date_id);
        self.selected = None;

        let backend = Arc::clone(&self.backend);
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let date = backend.full_date(date_id).await;
            let _ = tx
                .send(SessionEvent::DateLoaded {
                    generation,
                    date_id,
                    date,
                })
                .await;
        });
        true
    }

    pub fn handle_date_loaded(
        &mut self,
        generation: Generation,
        date_id: i64,
        date: Option<FullClipDate>,
    ) -> bool {
        if generation != self.select_generation {
            debug!("[dates] dropping stale details for date {}", date_id);
            return false;
        }
        match date {
            Some(date) => {
                self.selected = Some(date);
                true
            }
            None => {
                warn!("[dates] no details for date {}", date_id);
                false
            }
        }
    }

    /// Open or close the date panel. It stays open until a date is chosen.
    pub fn toggle_panel(&mut self) -> bool {
        if self.selected_id.is_none() {
            self.expanded = true;
            return false;
        }
        self.expanded = !self.expanded;
        true
    }

    pub fn expanded(&self) -> bool {
        self.expanded || self.selected_id.is_none()
    }

    pub fn dates(&self) -> &[ClipDate] {
        &self.dates
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn selected_id(&self) -> Option<i64> {
        self.selected_id
    }

    pub fn selected(&self) -> Option<&FullClipDate> {
        self.selected.as_ref()
    }

    /// The selected date as listed, available before its details arrive.
    pub fn selected_listing(&self) -> Option<&ClipDate> {
        let id = self.selected_id?;
        self.dates.iter().find(|d| d.id == id)
    }
}
