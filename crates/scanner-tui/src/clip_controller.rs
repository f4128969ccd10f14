//! Clip list for the selected date: initial fetch, periodic refresh and the
//! current-clip selection.

use std::sync::Arc;
use std::time::Duration;

use scanner_proto::api::ClipsBackend;
use scanner_proto::models::{sort_newest_first, Clip};
use tokio::sync::mpsc;
use tracing::{debug, info, trace};

use crate::session::{FetchKind, Generation, SessionEvent};
use crate::timer::ScheduledTask;

pub const CHECKING_STATUS: &str = "Checking for new clips...";

pub struct ClipController<B> {
    backend: Arc<B>,
    tx: mpsc::Sender<SessionEvent>,
    poll_every: Duration,
    generation: Generation,
    date_id: Option<i64>,
    /// Newest first.
    clips: Vec<Clip>,
    /// Index of the current clip in `clips`.
    current: Option<usize>,
    loading: bool,
    status: Option<&'static str>,
    poll: Option<ScheduledTask>,
}

impl<B: ClipsBackend> ClipController<B> {
    pub fn new(backend: Arc<B>, tx: mpsc::Sender<SessionEvent>, poll_every: Duration) -> Self {
        Self {
            backend,
            tx,
            poll_every,
            generation: Generation::default(),
            date_id: None,
            clips: Vec::new(),
            current: None,
            loading: false,
            status: None,
            poll: None,
        }
    }

    /// Switch to `date_id`: forget the old list and selection, fetch the new
    /// list and restart polling. Re-selecting the current date does nothing.
    pub fn select_date(&mut self, date_id: i64) -> bool {
        if self.date_id == Some(date_id) {
            return false;
        }
        let generation = self.generation.bump();
        info!("[clips] date {} (generation {:?})", date_id, generation);

        self.date_id = Some(date_id);
        self.clips.clear();
        self.current = None;
        self.loading = true;
        self.status = None;
        self.spawn_fetch(FetchKind::Initial);

        let tx = self.tx.clone();
        self.poll = Some(ScheduledTask::every(self.poll_every, tx, move || {
            SessionEvent::PollDue { generation }
        }));
        true
    }

    fn spawn_fetch(&self, kind: FetchKind) {
        let Some(date_id) = self.date_id else {
            return;
        };
        let backend = Arc::clone(&self.backend);
        let tx = self.tx.clone();
        let generation = self.generation;
        tokio::spawn(async move {
            let clips = backend.clips_by_date(date_id).await;
            let _ = tx
                .send(SessionEvent::ClipsLoaded {
                    generation,
                    kind,
                    clips,
                })
                .await;
        });
    }

    pub fn handle_poll_due(&mut self, generation: Generation) {
        if generation != self.generation {
            return;
        }
        trace!("[clips] polling date {:?}", self.date_id);
        self.status = Some(CHECKING_STATUS);
        self.spawn_fetch(FetchKind::Poll);
    }

    /// Apply a fetched list. Returns true if the list was replaced.
    ///
    /// Refreshes only replace the list when the id sequence differs, so an
    /// unchanged poll leaves the selection and page untouched.
    pub fn handle_loaded(
        &mut self,
        generation: Generation,
        kind: FetchKind,
        mut clips: Vec<Clip>,
    ) -> bool {
        if generation != self.generation {
            debug!("[clips] dropping stale {:?} response", kind);
            return false;
        }
        self.loading = false;
        if kind == FetchKind::Poll {
            self.status = None;
        }
        sort_newest_first(&mut clips);

        if kind == FetchKind::Poll && same_ids(&self.clips, &clips) {
            trace!("[clips] no change");
            return false;
        }
        if kind == FetchKind::Poll {
            info!("[clips] list changed: {} -> {} clips", self.clips.len(), clips.len());
        } else {
            debug!("[clips] loaded {} clips for date {:?}", clips.len(), self.date_id);
        }

        let current_id = self.current_id();
        self.clips = clips;
        self.current = current_id.and_then(|id| self.index_of(id));
        if self.current.is_none() && !self.clips.is_empty() {
            self.current = Some(0);
        }
        true
    }

    /// Make `id` current. No-op if it already is, or if it isn't listed.
    pub fn select_clip(&mut self, id: i64) -> bool {
        if self.current_id() == Some(id) {
            return false;
        }
        match self.index_of(id) {
            Some(index) => {
                self.current = Some(index);
                debug!("[clips] current clip {}", id);
                true
            }
            None => {
                debug!("[clips] clip {} not in list", id);
                false
            }
        }
    }

    fn index_of(&self, id: i64) -> Option<usize> {
        self.clips.iter().position(|c| c.id == id)
    }

    pub fn clips(&self) -> &[Clip] {
        &self.clips
    }

    pub fn current(&self) -> Option<&Clip> {
        self.current.and_then(|i| self.clips.get(i))
    }

    pub fn current_id(&self) -> Option<i64> {
        self.current().map(|c| c.id)
    }

    pub fn current_index(&self) -> Option<usize> {
        self.current
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn status(&self) -> Option<&'static str> {
        self.status
    }
}

fn same_ids(a: &[Clip], b: &[Clip]) -> bool {
    a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.id == y.id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{ids, MockBackend};

    type Controller = ClipController<MockBackend>;

    fn setup(backend: MockBackend) -> (Controller, mpsc::Receiver<SessionEvent>, Arc<MockBackend>) {
        let backend = Arc::new(backend);
        let (tx, rx) = mpsc::channel(64);
        let ctl = ClipController::new(Arc::clone(&backend), tx, Duration::from_secs(30));
        (ctl, rx, backend)
    }

    /// Feed the next event to the controller; returns whether the list changed.
    async fn pump(ctl: &mut Controller, rx: &mut mpsc::Receiver<SessionEvent>) -> bool {
        match rx.recv().await.expect("channel open") {
            SessionEvent::ClipsLoaded {
                generation,
                kind,
                clips,
            } => ctl.handle_loaded(generation, kind, clips),
            SessionEvent::PollDue { generation } => {
                ctl.handle_poll_due(generation);
                false
            }
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn newest_clip_is_selected_on_load() {
        let (mut ctl, mut rx, _) = setup(MockBackend::new().with_clips(1, &[3, 1, 2]));
        assert!(ctl.select_date(1));
        assert!(ctl.is_loading());
        assert_eq!(ctl.current_id(), None);

        assert!(pump(&mut ctl, &mut rx).await);
        assert!(!ctl.is_loading());
        assert_eq!(ids(ctl.clips()), vec![3, 2, 1]);
        assert_eq!(ctl.current_id(), Some(3));
        assert_eq!(ctl.current_index(), Some(0));
    }

    #[tokio::test(start_paused = true)]
    async fn empty_date_has_no_current_clip() {
        let (mut ctl, mut rx, _) = setup(MockBackend::new());
        ctl.select_date(4);
        assert!(pump(&mut ctl, &mut rx).await);
        assert!(ctl.clips().is_empty());
        assert_eq!(ctl.current_id(), None);
        assert!(!ctl.is_loading());
    }

    #[tokio::test(start_paused = true)]
    async fn late_response_for_previous_date_is_dropped() {
        let backend = MockBackend::new()
            .with_clips(1, &[12, 11, 10])
            .with_clips(2, &[22, 21]);
        backend.delay(1, Duration::from_secs(5));
        let (mut ctl, mut rx, _) = setup(backend);

        ctl.select_date(1);
        ctl.select_date(2);

        assert!(pump(&mut ctl, &mut rx).await);
        assert_eq!(ids(ctl.clips()), vec![22, 21]);

        // Date 1's response lands afterwards and must not win.
        assert!(!pump(&mut ctl, &mut rx).await);
        assert_eq!(ids(ctl.clips()), vec![22, 21]);
        assert_eq!(ctl.current_id(), Some(22));
    }

    #[tokio::test(start_paused = true)]
    async fn selecting_the_current_clip_is_a_no_op() {
        let (mut ctl, mut rx, _) = setup(MockBackend::new().with_clips(1, &[3, 2, 1]));
        ctl.select_date(1);
        pump(&mut ctl, &mut rx).await;

        assert!(!ctl.select_clip(3));
        assert!(!ctl.select_clip(99));
        assert_eq!(ctl.current_id(), Some(3));

        assert!(ctl.select_clip(1));
        assert_eq!(ctl.current_index(), Some(2));
        assert!(!ctl.select_clip(1));
    }

    #[tokio::test(start_paused = true)]
    async fn date_round_trip_starts_fresh() {
        let (mut ctl, mut rx, backend) = setup(
            MockBackend::new()
                .with_clips(1, &[3, 2, 1])
                .with_clips(2, &[5, 4]),
        );
        ctl.select_date(1);
        pump(&mut ctl, &mut rx).await;
        ctl.select_clip(1);

        ctl.select_date(2);
        assert_eq!(ctl.current_id(), None);
        pump(&mut ctl, &mut rx).await;
        assert_eq!(ctl.current_id(), Some(5));

        ctl.select_date(1);
        assert!(ctl.clips().is_empty());
        pump(&mut ctl, &mut rx).await;
        assert_eq!(ctl.current_id(), Some(3));

        assert!(!ctl.select_date(1));
        assert_eq!(backend.clip_calls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn poll_picks_up_new_clips_and_keeps_selection() {
        let (mut ctl, mut rx, backend) = setup(MockBackend::new().with_clips(1, &[2, 1]));
        ctl.select_date(1);
        pump(&mut ctl, &mut rx).await;
        ctl.select_clip(1);

        backend.set_clips(1, &[3, 2, 1]);
        // PollDue after 30s.
        assert!(!pump(&mut ctl, &mut rx).await);
        assert_eq!(ctl.status(), Some(CHECKING_STATUS));

        assert!(pump(&mut ctl, &mut rx).await);
        assert_eq!(ctl.status(), None);
        assert_eq!(ids(ctl.clips()), vec![3, 2, 1]);
        assert_eq!(ctl.current_id(), Some(1));
        assert_eq!(ctl.current_index(), Some(2));
    }

    #[tokio::test(start_paused = true)]
    async fn unchanged_poll_leaves_list_alone() {
        let (mut ctl, mut rx, _) = setup(MockBackend::new().with_clips(1, &[2, 1]));
        ctl.select_date(1);
        pump(&mut ctl, &mut rx).await;

        pump(&mut ctl, &mut rx).await;
        assert!(!pump(&mut ctl, &mut rx).await);
        assert_eq!(ctl.status(), None);
        assert_eq!(ctl.current_id(), Some(2));
    }

    #[tokio::test(start_paused = true)]
    async fn poll_with_same_count_but_new_ids_replaces() {
        let (mut ctl, mut rx, backend) = setup(MockBackend::new().with_clips(1, &[2, 1]));
        ctl.select_date(1);
        pump(&mut ctl, &mut rx).await;

        backend.set_clips(1, &[4, 3]);
        pump(&mut ctl, &mut rx).await;
        assert!(pump(&mut ctl, &mut rx).await);
        assert_eq!(ids(ctl.clips()), vec![4, 3]);
        // The old current clip is gone; fall back to the newest.
        assert_eq!(ctl.current_id(), Some(4));
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_the_controller_stops_polling() {
        let (mut ctl, mut rx, _) = setup(MockBackend::new().with_clips(1, &[1]));
        ctl.select_date(1);
        pump(&mut ctl, &mut rx).await;

        drop(ctl);
        // Every sender is gone once the poll timer is cancelled.
        assert!(rx.recv().await.is_none());
    }
}
