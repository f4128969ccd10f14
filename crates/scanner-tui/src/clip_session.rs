//! The clip list and auto-advance for the selected date, reduced to what the
//! audio output has to do next.
//!
//! Every operation that can move the current clip returns an
//! [`AudioCommand`]: load the new clip's URL, stop because nothing is
//! current, or keep whatever is playing.

use std::sync::Arc;
use std::time::Duration;

use scanner_proto::api::ClipsBackend;
use scanner_proto::models::Clip;
use tokio::sync::mpsc;

use crate::clip_controller::ClipController;
use crate::continuity::{Continuation, ContinuityController};
use crate::registry::PageRegistry;
use crate::session::{FetchKind, Generation, SessionEvent};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AudioCommand {
    Keep,
    Load { clip_id: i64, url: String },
    Stop,
}

pub struct ClipSession<B> {
    backend: Arc<B>,
    clips: ClipController<B>,
    continuity: ContinuityController,
}

impl<B: ClipsBackend> ClipSession<B> {
    pub fn new(
        backend: Arc<B>,
        tx: mpsc::Sender<SessionEvent>,
        poll_every: Duration,
        retry_after: Duration,
        settle_after: Duration,
    ) -> Self {
        Self {
            clips: ClipController::new(Arc::clone(&backend), tx.clone(), poll_every),
            continuity: ContinuityController::new(tx, retry_after, settle_after),
            backend,
        }
    }

    pub fn clips(&self) -> &ClipController<B> {
        &self.clips
    }

    pub fn is_waiting(&self) -> bool {
        self.continuity.is_waiting()
    }

    /// Switch dates. Whatever was playing belongs to the old date.
    pub fn select_date(&mut self, date_id: i64) -> AudioCommand {
        if !self.clips.select_date(date_id) {
            return AudioCommand::Keep;
        }
        self.continuity.reset();
        AudioCommand::Stop
    }

    /// A manual pick. It supersedes any pending auto-advance.
    pub fn select_clip(&mut self, id: i64) -> AudioCommand {
        self.continuity.reset();
        let prev = self.clips.current_id();
        self.clips.select_clip(id);
        self.follow(prev)
    }

    pub fn handle_poll_due(&mut self, generation: Generation) {
        self.clips.handle_poll_due(generation);
    }

    /// `None` when the response was stale or changed nothing.
    pub fn handle_loaded(
        &mut self,
        generation: Generation,
        kind: FetchKind,
        clips: Vec<Clip>,
    ) -> Option<AudioCommand> {
        let prev = self.clips.current_id();
        if !self.clips.handle_loaded(generation, kind, clips) {
            return None;
        }
        if self.clips.clips().is_empty() {
            self.continuity.reset();
        }
        Some(self.follow(prev))
    }

    pub fn clip_ended(&mut self, ended_id: i64, registry: &PageRegistry) -> AudioCommand {
        let next = self
            .continuity
            .on_clip_ended(ended_id, self.clips.clips(), registry);
        self.advance(next)
    }

    /// Jump past the current clip as if it had ended.
    pub fn skip(&mut self, registry: &PageRegistry) -> AudioCommand {
        let Some(current) = self.clips.current_id() else {
            return AudioCommand::Keep;
        };
        let next = self.continuity.skip(current, self.clips.clips(), registry);
        self.advance(next)
    }

    pub fn retry_due(&mut self, generation: Generation, registry: &PageRegistry) -> AudioCommand {
        let next = self
            .continuity
            .on_retry_due(generation, self.clips.clips(), registry);
        self.advance(next)
    }

    pub fn settle_due(&mut self, generation: Generation, registry: &PageRegistry) -> AudioCommand {
        let next = self
            .continuity
            .on_settle_due(generation, self.clips.clips(), registry);
        self.advance(next)
    }

    /// The command that puts the current clip on the output from scratch.
    pub fn current_audio(&self) -> AudioCommand {
        match self.clips.current_id() {
            Some(clip_id) => AudioCommand::Load {
                clip_id,
                url: self.backend.audio_url(clip_id),
            },
            None => AudioCommand::Stop,
        }
    }

    fn advance(&mut self, next: Continuation) -> AudioCommand {
        match next {
            Continuation::Next(id) => {
                let prev = self.clips.current_id();
                self.clips.select_clip(id);
                self.follow(prev)
            }
            Continuation::PageTurned | Continuation::Waiting | Continuation::Idle => {
                AudioCommand::Keep
            }
        }
    }

    fn follow(&self, prev: Option<i64>) -> AudioCommand {
        if self.clips.current_id() == prev {
            return AudioCommand::Keep;
        }
        self.current_audio()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::test_support::MockBackend;

    const POLL: Duration = Duration::from_secs(30);
    const RETRY: Duration = Duration::from_secs(10);
    const SETTLE: Duration = Duration::from_millis(250);

    type Session = ClipSession<MockBackend>;

    fn setup(backend: MockBackend) -> (Session, mpsc::Receiver<SessionEvent>, Arc<MockBackend>) {
        let backend = Arc::new(backend);
        let (tx, rx) = mpsc::channel(64);
        let session = ClipSession::new(Arc::clone(&backend), tx, POLL, RETRY, SETTLE);
        (session, rx, backend)
    }

    fn load(id: i64) -> AudioCommand {
        AudioCommand::Load {
            clip_id: id,
            url: format!("mock://clips/{}", id),
        }
    }

    /// Route events until one yields an audio decision (or a no-op load).
    async fn next_audio(
        session: &mut Session,
        rx: &mut mpsc::Receiver<SessionEvent>,
        registry: &PageRegistry,
    ) -> Option<AudioCommand> {
        loop {
            match rx.recv().await.expect("channel open") {
                SessionEvent::ClipsLoaded {
                    generation,
                    kind,
                    clips,
                } => return session.handle_loaded(generation, kind, clips),
                SessionEvent::PollDue { generation } => session.handle_poll_due(generation),
                SessionEvent::RetryDue { generation } => {
                    return Some(session.retry_due(generation, registry))
                }
                SessionEvent::SettleDue { generation } => {
                    return Some(session.settle_due(generation, registry))
                }
                other => panic!("unexpected event {:?}", other),
            }
        }
    }

    /// Skip retries and refreshes that leave the output alone.
    async fn next_change(
        session: &mut Session,
        rx: &mut mpsc::Receiver<SessionEvent>,
        registry: &PageRegistry,
    ) -> AudioCommand {
        loop {
            match next_audio(session, rx, registry).await {
                None | Some(AudioCommand::Keep) => continue,
                Some(cmd) => return cmd,
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn ended_clip_loads_the_next_url() {
        let registry = PageRegistry::new();
        let (mut s, mut rx, _) = setup(MockBackend::new().with_clips(1, &[1, 2, 3, 4, 5]));

        assert_eq!(s.select_date(1), AudioCommand::Stop);
        assert_eq!(next_audio(&mut s, &mut rx, &registry).await, Some(load(5)));

        assert_eq!(s.clip_ended(5, &registry), load(4));
        assert_eq!(s.clips().current_id(), Some(4));
    }

    #[tokio::test(start_paused = true)]
    async fn empty_date_clears_the_audio() {
        let registry = PageRegistry::new();
        let (mut s, mut rx, _) = setup(MockBackend::new().with_clips(1, &[2, 1]));
        s.select_date(1);
        assert_eq!(next_audio(&mut s, &mut rx, &registry).await, Some(load(2)));

        assert_eq!(s.select_date(2), AudioCommand::Stop);
        assert_eq!(s.clips().current_id(), None);
        assert_eq!(next_audio(&mut s, &mut rx, &registry).await, Some(AudioCommand::Keep));
        assert_eq!(s.clips().current_id(), None);
        assert_eq!(s.current_audio(), AudioCommand::Stop);
        assert!(!s.is_waiting());
    }

    #[tokio::test(start_paused = true)]
    async fn refresh_that_empties_the_list_stops_playback() {
        let registry = PageRegistry::new();
        let (mut s, mut rx, backend) = setup(MockBackend::new().with_clips(1, &[2, 1]));
        s.select_date(1);
        next_audio(&mut s, &mut rx, &registry).await;
        assert_eq!(s.clip_ended(1, &registry), AudioCommand::Keep);
        assert!(s.is_waiting());

        backend.set_clips(1, &[]);
        assert_eq!(next_change(&mut s, &mut rx, &registry).await, AudioCommand::Stop);
        assert_eq!(s.clips().current_id(), None);
        assert!(!s.is_waiting());
    }

    #[tokio::test(start_paused = true)]
    async fn manual_pick_cancels_a_pending_retry() {
        let registry = PageRegistry::new();
        let (mut s, mut rx, _) = setup(MockBackend::new().with_clips(1, &[3, 2, 1]));
        s.select_date(1);
        next_audio(&mut s, &mut rx, &registry).await;

        assert_eq!(s.clip_ended(1, &registry), AudioCommand::Keep);
        assert!(s.is_waiting());

        assert_eq!(s.select_clip(2), load(2));
        assert!(!s.is_waiting());
        // Picking the current clip again changes nothing.
        assert_eq!(s.select_clip(2), AudioCommand::Keep);

        // Past the retry delay but before the next poll: no retry fires.
        tokio::task::yield_now().await;
        tokio::time::advance(RETRY * 2).await;
        tokio::task::yield_now().await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn caught_up_playback_resumes_on_a_polled_clip() {
        let registry = PageRegistry::new();
        let (mut s, mut rx, backend) = setup(MockBackend::new().with_clips(1, &[2, 1]));
        s.select_date(1);
        next_audio(&mut s, &mut rx, &registry).await;
        s.select_clip(1);
        assert_eq!(s.clip_ended(1, &registry), AudioCommand::Keep);

        // The next poll lists 3 and 4; the retry after it plays the older one.
        backend.set_clips(1, &[4, 3, 2, 1]);
        assert_eq!(next_change(&mut s, &mut rx, &registry).await, load(3));
        assert!(!s.is_waiting());
    }
}
