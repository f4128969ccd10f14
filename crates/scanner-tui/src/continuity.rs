//! What plays after a clip ends.
//!
//! Playback walks the list in display order (descending id):
//! 1. the next clip on the rendered page,
//! 2. otherwise turn the clips page and, after a settle delay, take the
//!    highest id on the new page,
//! 3. otherwise wait and try again after the retry delay. A retry that
//!    finds clips newer than the list it gave up on plays the oldest of
//!    them.
//!
//! At most one retry timer and one settle timer exist at a time. Any
//! successful transition cancels the retry.

use std::ops::Range;
use std::time::Duration;

use scanner_proto::models::Clip;
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::registry::{PageRegistry, PageTag};
use crate::session::{Generation, SessionEvent};
use crate::timer::ScheduledTask;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Continuation {
    /// Play this clip now.
    Next(i64),
    /// The clips page moved; a pick follows once it settles.
    PageTurned,
    /// Caught up; a retry is scheduled.
    Waiting,
    /// Nothing to do.
    Idle,
}

pub struct ContinuityController {
    tx: mpsc::Sender<SessionEvent>,
    retry_after: Duration,
    settle_after: Duration,
    generation: Generation,
    /// Clip whose successor is still owed.
    pending: Option<i64>,
    /// Newest id listed when playback caught up.
    caught_up_top: Option<i64>,
    retry: Option<ScheduledTask>,
    settle: Option<ScheduledTask>,
}

impl ContinuityController {
    pub fn new(
        tx: mpsc::Sender<SessionEvent>,
        retry_after: Duration,
        settle_after: Duration,
    ) -> Self {
        Self {
            tx,
            retry_after,
            settle_after,
            generation: Generation::default(),
            pending: None,
            caught_up_top: None,
            retry: None,
            settle: None,
        }
    }

    /// Forget any owed successor and cancel both timers.
    pub fn reset(&mut self) {
        self.generation.bump();
        self.pending = None;
        self.caught_up_top = None;
        self.retry = None;
        self.settle = None;
    }

    #[cfg(test)]
    pub fn retry_pending(&self) -> bool {
        self.retry.is_some()
    }

    pub fn is_waiting(&self) -> bool {
        self.pending.is_some()
    }

    pub fn on_clip_ended(
        &mut self,
        ended_id: i64,
        clips: &[Clip],
        registry: &PageRegistry,
    ) -> Continuation {
        if clips.is_empty() {
            self.reset();
            return Continuation::Idle;
        }
        self.pending = Some(ended_id);

        let handle = registry.get(PageTag::CLIPS);
        let range = handle
            .as_ref()
            .map(|h| h.current_range())
            .unwrap_or(0..clips.len());

        if let Some(next) = successor_on_page(ended_id, clips, range) {
            debug!("[continuity] {} -> {}", ended_id, next);
            return self.succeed(next);
        }

        if let Some(handle) = handle {
            if handle.go_to_next_page() {
                info!(
                    "[continuity] clip {} ended at page edge; moved to page {}",
                    ended_id,
                    handle.current_page()
                );
                self.retry = None;
                self.settle = Some(ScheduledTask::once(
                    self.settle_after,
                    self.tx.clone(),
                    SessionEvent::SettleDue {
                        generation: self.generation,
                    },
                ));
                return Continuation::PageTurned;
            }
        }

        if self.caught_up_top.is_none() {
            self.caught_up_top = clips.iter().map(|c| c.id).max();
        }
        if self.retry.is_none() {
            info!(
                "[continuity] nothing after clip {}; retrying in {:?}",
                ended_id, self.retry_after
            );
            self.retry = Some(ScheduledTask::once(
                self.retry_after,
                self.tx.clone(),
                SessionEvent::RetryDue {
                    generation: self.generation,
                },
            ));
        }
        Continuation::Waiting
    }

    pub fn on_retry_due(
        &mut self,
        generation: Generation,
        clips: &[Clip],
        registry: &PageRegistry,
    ) -> Continuation {
        if generation != self.generation {
            return Continuation::Idle;
        }
        self.retry = None;
        let Some(ended_id) = self.pending else {
            return Continuation::Idle;
        };
        match self.on_clip_ended(ended_id, clips, registry) {
            Continuation::Waiting => match self.arrived_since_caught_up(clips) {
                Some(id) => {
                    info!("[continuity] new clip {} arrived while waiting", id);
                    self.succeed(id)
                }
                None => Continuation::Waiting,
            },
            other => other,
        }
    }

    /// Manual skip from `current_id`. While a page turn is settling the pick
    /// is made right away instead of turning another page.
    pub fn skip(
        &mut self,
        current_id: i64,
        clips: &[Clip],
        registry: &PageRegistry,
    ) -> Continuation {
        if self.settle.is_some() {
            return self.on_settle_due(self.generation, clips, registry);
        }
        self.on_clip_ended(current_id, clips, registry)
    }

    /// Oldest clip newer than everything listed when playback caught up.
    fn arrived_since_caught_up(&self, clips: &[Clip]) -> Option<i64> {
        let top = self.caught_up_top?;
        clips.iter().map(|c| c.id).filter(|&id| id > top).min()
    }

    /// Pick the highest id on the page that was turned to.
    pub fn on_settle_due(
        &mut self,
        generation: Generation,
        clips: &[Clip],
        registry: &PageRegistry,
    ) -> Continuation {
        if generation != self.generation {
            return Continuation::Idle;
        }
        self.settle = None;

        let range = registry
            .get(PageTag::CLIPS)
            .map(|h| h.current_range())
            .unwrap_or(0..clips.len());
        let newest = clips.get(range).and_then(|page| page.iter().map(|c| c.id).max());
        match newest {
            Some(id) => self.succeed(id),
            None => match self.pending {
                Some(ended_id) => self.on_clip_ended(ended_id, clips, registry),
                None => Continuation::Idle,
            },
        }
    }

    fn succeed(&mut self, next: i64) -> Continuation {
        self.pending = None;
        self.caught_up_top = None;
        self.retry = None;
        self.settle = None;
        Continuation::Next(next)
    }
}

/// The clip after `ended_id` in list order, if it is on the current page.
/// When the ended clip is no longer listed, the highest id below it stands in.
fn successor_on_page(ended_id: i64, clips: &[Clip], page: Range<usize>) -> Option<i64> {
    let index = match clips.iter().position(|c| c.id == ended_id) {
        Some(i) => i + 1,
        None => clips.iter().position(|c| c.id < ended_id)?,
    };
    page.contains(&index).then(|| clips[index].id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    use crate::pagination::{PageLayout, Paginator, Viewport};
    use crate::test_support::clips;

    const RETRY: Duration = Duration::from_secs(10);
    const SETTLE: Duration = Duration::from_millis(250);

    struct Rig {
        ctl: ContinuityController,
        rx: mpsc::Receiver<SessionEvent>,
        registry: PageRegistry,
        pages: Paginator<Clip>,
    }

    impl Rig {
        fn new(ids: &[i64], per_page: usize) -> Self {
            let (tx, rx) = mpsc::channel(16);
            let registry = PageRegistry::new();
            let mut pages = Paginator::new(
                PageTag::CLIPS,
                PageLayout {
                    items_per_page_override: Some(per_page),
                    ..PageLayout::default()
                },
            );
            pages.mount(&registry, Viewport::new(120, 40), Instant::now());
            pages.set_items(clips(ids, 1));
            Self {
                ctl: ContinuityController::new(tx, RETRY, SETTLE),
                rx,
                registry,
                pages,
            }
        }

        fn ended(&mut self, id: i64) -> Continuation {
            self.ctl.on_clip_ended(id, self.pages.items(), &self.registry)
        }

        async fn fire(&mut self) -> Continuation {
            match self.rx.recv().await.expect("timer event") {
                SessionEvent::RetryDue { generation } => {
                    self.ctl.on_retry_due(generation, self.pages.items(), &self.registry)
                }
                SessionEvent::SettleDue { generation } => {
                    self.ctl.on_settle_due(generation, self.pages.items(), &self.registry)
                }
                other => panic!("unexpected event {:?}", other),
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn next_clip_on_the_same_page() {
        let mut rig = Rig::new(&[5, 4, 3, 2, 1], 5);
        assert_eq!(rig.ended(5), Continuation::Next(4));
        assert_eq!(rig.ended(2), Continuation::Next(1));
        assert!(!rig.ctl.retry_pending());
        assert!(!rig.ctl.is_waiting());
    }

    #[tokio::test(start_paused = true)]
    async fn last_clip_on_page_turns_to_the_next_page() {
        let mut rig = Rig::new(&[10, 9, 8, 7, 6, 5, 4, 3, 2, 1], 5);
        assert_eq!(rig.ended(6), Continuation::PageTurned);
        assert_eq!(rig.pages.cursor().current_page(), 2);
        assert_eq!(rig.fire().await, Continuation::Next(5));
        assert!(!rig.ctl.is_waiting());
    }

    #[tokio::test(start_paused = true)]
    async fn caught_up_schedules_exactly_one_retry() {
        let mut rig = Rig::new(&[5, 4, 3, 2, 1], 5);
        assert_eq!(rig.ended(1), Continuation::Waiting);
        assert_eq!(rig.ended(1), Continuation::Waiting);
        assert!(rig.ctl.retry_pending());

        tokio::task::yield_now().await;
        tokio::time::advance(RETRY * 3).await;
        tokio::task::yield_now().await;
        assert!(matches!(rig.rx.try_recv(), Ok(SessionEvent::RetryDue { .. })));
        assert!(rig.rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn retry_finds_a_late_clip() {
        let mut rig = Rig::new(&[6, 5, 4, 3, 2], 10);
        assert_eq!(rig.ended(2), Continuation::Waiting);

        // An out-of-sequence upload shows up below the ended clip.
        rig.pages.set_items(clips(&[6, 5, 4, 3, 2, 1], 1));
        assert_eq!(rig.fire().await, Continuation::Next(1));
        assert!(!rig.ctl.retry_pending());
    }

    #[tokio::test(start_paused = true)]
    async fn retry_plays_the_oldest_newly_arrived_clip() {
        let mut rig = Rig::new(&[5, 4, 3, 2, 1], 10);
        assert_eq!(rig.ended(1), Continuation::Waiting);

        // Nothing new yet: keep waiting.
        assert_eq!(rig.fire().await, Continuation::Waiting);
        assert!(rig.ctl.retry_pending());

        rig.pages.set_items(clips(&[7, 6, 5, 4, 3, 2, 1], 1));
        assert_eq!(rig.fire().await, Continuation::Next(6));
        assert!(!rig.ctl.retry_pending());
        assert!(!rig.ctl.is_waiting());
    }

    #[tokio::test(start_paused = true)]
    async fn skip_during_a_page_turn_takes_the_new_page() {
        let mut rig = Rig::new(&[10, 9, 8, 7, 6, 5, 4, 3, 2, 1], 5);
        assert_eq!(rig.ended(6), Continuation::PageTurned);

        // Clip 6 is still current while the turn settles.
        assert_eq!(rig.ctl.skip(6, rig.pages.items(), &rig.registry), Continuation::Next(5));
        assert_eq!(rig.pages.cursor().current_page(), 2);

        // The settle timer was dropped with the pick.
        tokio::task::yield_now().await;
        tokio::time::advance(SETTLE * 4).await;
        tokio::task::yield_now().await;
        assert!(rig.rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn retry_can_turn_a_page_that_appeared() {
        let mut rig = Rig::new(&[6, 5, 4], 3);
        assert_eq!(rig.ended(4), Continuation::Waiting);

        rig.pages.set_items(clips(&[6, 5, 4, 3, 2, 1], 1));
        assert_eq!(rig.fire().await, Continuation::PageTurned);
        assert!(!rig.ctl.retry_pending());
        assert_eq!(rig.fire().await, Continuation::Next(3));
    }

    #[tokio::test(start_paused = true)]
    async fn reset_cancels_the_retry() {
        let mut rig = Rig::new(&[2, 1], 5);
        assert_eq!(rig.ended(1), Continuation::Waiting);
        let stale = Generation::default();
        rig.ctl.reset();
        assert!(!rig.ctl.retry_pending());

        tokio::task::yield_now().await;
        tokio::time::advance(RETRY * 2).await;
        assert!(rig.rx.try_recv().is_err());

        let items = rig.pages.items().to_vec();
        assert_eq!(
            rig.ctl.on_retry_due(stale, &items, &rig.registry),
            Continuation::Idle
        );
    }

    #[tokio::test(start_paused = true)]
    async fn empty_list_never_schedules() {
        let mut rig = Rig::new(&[], 5);
        assert_eq!(rig.ended(3), Continuation::Idle);
        assert!(!rig.ctl.retry_pending());
    }

    #[tokio::test(start_paused = true)]
    async fn removed_clip_falls_through_to_the_next_lower_id() {
        let mut rig = Rig::new(&[9, 7, 5, 3], 5);
        assert_eq!(rig.ended(6), Continuation::Next(5));
    }

    #[tokio::test(start_paused = true)]
    async fn unmounted_list_is_treated_as_one_page() {
        let mut rig = Rig::new(&[3, 2, 1], 1);
        rig.pages.unmount();
        assert_eq!(rig.ended(3), Continuation::Next(2));
        assert_eq!(rig.ended(1), Continuation::Waiting);
    }
}
