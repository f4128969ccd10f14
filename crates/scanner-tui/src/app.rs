//! App: owns the controllers, components and player, and runs the event loop.
//!
//! - Terminal input arrives from a blocking reader task.
//! - Fetch results and timer firings arrive as `SessionEvent`s.
//! - mpv events arrive on their own channel and are folded by the `Player`.
//! - Components return `Action`s; `dispatch` applies them.

use std::io;
use std::sync::Arc;
use std::time::{Duration, Instant};

use ratatui::crossterm::{
    event::{
        self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEvent, KeyEventKind,
        KeyModifiers, MouseEvent, MouseEventKind,
    },
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::Paragraph,
    Frame, Terminal,
};
use scanner_proto::api::ApiClient;
use scanner_proto::config::Config;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::action::{Action, ComponentId};
use crate::app_state::AppState;
use crate::clip_session::{AudioCommand, ClipSession};
use crate::component::Component;
use crate::components::{ClipTable, DateTable};
use crate::date_controller::DateController;
use crate::pagination::{PageLayout, Viewport, NARROW_WIDTH};
use crate::player::{MpvEvent, Player, PlayerEvent};
use crate::registry::PageRegistry;
use crate::session::SessionEvent;
use crate::theme::{style_muted, style_secondary, C_ACCENT, C_DEMO};
use crate::widgets::toast::ToastManager;
use crate::widgets::transport::draw_transport;

const SEEK_STEP_SECS: f64 = 10.0;
/// Width of the date pane when it sits beside the clips.
const DATE_PANE_WIDTH: u16 = 30;

const NOTICE_PLAYBACK: &str = "playback";

enum AppMessage {
    Input(Event),
}

/// Receivers handed to `App::run`.
pub struct Channels {
    session_rx: mpsc::Receiver<SessionEvent>,
    mpv_rx: mpsc::Receiver<MpvEvent>,
}

#[derive(Default, Clone, Copy)]
struct Areas {
    dates: Option<Rect>,
    clips: Option<Rect>,
}

pub struct App {
    state: AppState,
    registry: PageRegistry,
    dates: DateController<ApiClient>,
    session: ClipSession<ApiClient>,
    player: Player,
    date_table: DateTable,
    clip_table: ClipTable,
    focus: ComponentId,
    toast: ToastManager,
    viewport: Viewport,
    areas: Areas,
    should_quit: bool,
}

impl App {
    pub fn new(config: &Config, backend: ApiClient) -> (Self, Channels) {
        let (session_tx, session_rx) = mpsc::channel(256);
        let (mpv_tx, mpv_rx) = mpsc::channel(256);
        let backend = Arc::new(backend);
        let layout = PageLayout::from(&config.layout);

        let state = AppState {
            demo: backend.is_demo(),
            ..AppState::default()
        };

        let app = Self {
            dates: DateController::new(
                Arc::clone(&backend),
                session_tx.clone(),
                config.api.source_id,
            ),
            session: ClipSession::new(
                Arc::clone(&backend),
                session_tx,
                Duration::from_secs(config.polling.clip_poll_secs.max(1)),
                Duration::from_secs(config.polling.retry_secs.max(1)),
                Duration::from_millis(config.polling.settle_ms),
            ),
            player: Player::new(&config.player, mpv_tx),
            date_table: DateTable::new(layout.clone()),
            clip_table: ClipTable::new(layout),
            state,
            registry: PageRegistry::new(),
            focus: ComponentId::DateTable,
            toast: ToastManager::new(),
            viewport: Viewport::default(),
            areas: Areas::default(),
            should_quit: false,
        };
        (
            app,
            Channels {
                session_rx,
                mpv_rx,
            },
        )
    }

    pub async fn run(mut self, channels: Channels) -> anyhow::Result<()> {
        let Channels {
            mut session_rx,
            mut mpv_rx,
        } = channels;

        enable_raw_mode()?;
        let mut stdout = io::stdout();
        execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
        let mut terminal = Terminal::new(CrosstermBackend::new(stdout))?;

        let size = terminal.size()?;
        self.viewport = Viewport::new(size.width, size.height);
        let now = Instant::now();
        self.clip_table.mount(&self.registry, self.viewport, now);
        self.date_table.mount(&self.registry, self.viewport, now);

        if self.state.demo {
            self.toast.info("Demo mode: fixture data, placeholder audio");
        }
        self.state.dates_loading = true;
        self.dates.load();
        self.start_player().await;

        let (input_tx, mut input_rx) = mpsc::channel::<AppMessage>(256);
        tokio::task::spawn_blocking(move || {
            while let Ok(ev) = event::read() {
                if input_tx.blocking_send(AppMessage::Input(ev)).is_err() {
                    break;
                }
            }
        });

        let mut ui_tick = tokio::time::interval(Duration::from_millis(100));
        ui_tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        let mut needs_redraw = true;
        loop {
            if needs_redraw {
                terminal.draw(|f| self.draw(f))?;
            }
            needs_redraw = false;

            if self.should_quit {
                break;
            }

            tokio::select! {
                Some(AppMessage::Input(ev)) = input_rx.recv() => {
                    self.handle_input(ev).await;
                    needs_redraw = true;
                }
                Some(ev) = session_rx.recv() => {
                    self.handle_session(ev).await;
                    needs_redraw = true;
                }
                Some(ev) = mpv_rx.recv() => {
                    needs_redraw = self.handle_mpv(ev).await;
                }
                _ = ui_tick.tick() => {
                    let now = Instant::now();
                    self.toast.tick(now);
                    self.date_table.tick(now);
                    self.clip_table.tick(now);
                    needs_redraw = true;
                }
            }
        }

        self.player.shutdown().await;
        disable_raw_mode()?;
        execute!(
            terminal.backend_mut(),
            LeaveAlternateScreen,
            DisableMouseCapture
        )?;
        terminal.show_cursor()?;
        info!("scanner exiting");
        Ok(())
    }

    async fn start_player(&mut self) {
        if let Err(e) = self.player.start().await {
            warn!("[player] start failed: {:#}", e);
            self.notice_playback_not_ready();
        }
    }

    fn notice_playback_not_ready(&mut self) {
        self.toast.warn_once(
            NOTICE_PLAYBACK,
            "Playback is not ready: check that mpv is installed, then press space",
        );
    }

    // ── Input ─────────────────────────────────────────────────────────────────

    async fn handle_input(&mut self, ev: Event) {
        match ev {
            Event::Key(key) => self.handle_key(key).await,
            Event::Mouse(mouse) => self.handle_mouse(mouse).await,
            Event::Resize(w, h) => {
                self.viewport = Viewport::new(w, h);
                let now = Instant::now();
                self.date_table.resize(self.viewport, now);
                self.clip_table.resize(self.viewport, now);
            }
            _ => {}
        }
    }

    async fn handle_key(&mut self, key: KeyEvent) {
        if key.kind == KeyEventKind::Release {
            return;
        }
        let global = match key.code {
            KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                Some(Action::Quit)
            }
            KeyCode::Char('q') => Some(Action::Quit),
            KeyCode::Tab | KeyCode::BackTab => Some(Action::FocusNext),
            KeyCode::Char('d') => Some(Action::ToggleDates),
            KeyCode::Char(' ') if self.focus == ComponentId::ClipTable => {
                Some(Action::TogglePause)
            }
            KeyCode::Char('p') => Some(Action::TogglePause),
            KeyCode::Char('n') => Some(Action::SkipClip),
            KeyCode::Char(',') => Some(Action::SeekRelative(-SEEK_STEP_SECS)),
            KeyCode::Char('.') => Some(Action::SeekRelative(SEEK_STEP_SECS)),
            _ => None,
        };
        if let Some(action) = global {
            self.dispatch(action).await;
            return;
        }

        let actions = match self.focus {
            ComponentId::DateTable => self.date_table.handle_key(key, &self.state),
            ComponentId::ClipTable => self.clip_table.handle_key(key, &self.state),
        };
        for action in actions {
            self.dispatch(action).await;
        }
    }

    async fn handle_mouse(&mut self, mouse: MouseEvent) {
        let hit = |r: Option<Rect>| {
            r.filter(|r| {
                mouse.column >= r.x
                    && mouse.column < r.x + r.width
                    && mouse.row >= r.y
                    && mouse.row < r.y + r.height
            })
        };
        let actions = if let Some(area) = hit(self.areas.dates) {
            if matches!(mouse.kind, MouseEventKind::Down(_)) {
                self.focus = self.date_table.id();
            }
            self.date_table.handle_mouse(mouse, area, &self.state)
        } else if let Some(area) = hit(self.areas.clips) {
            if matches!(mouse.kind, MouseEventKind::Down(_)) {
                self.focus = self.clip_table.id();
            }
            self.clip_table.handle_mouse(mouse, area, &self.state)
        } else {
            Vec::new()
        };
        for action in actions {
            self.dispatch(action).await;
        }
    }

    async fn dispatch(&mut self, action: Action) {
        debug!("dispatch {:?}", action);
        match action {
            Action::SelectDate(id) => self.select_date(id).await,
            Action::SelectClip(id) => {
                let audio = self.session.select_clip(id);
                self.apply_audio(audio).await;
            }
            Action::ToggleDates => {
                self.dates.toggle_panel();
                self.sync_date_panel();
            }
            Action::FocusNext => {
                if self.dates.expanded() && self.dates.selected_id().is_some() {
                    self.focus = match self.focus {
                        ComponentId::DateTable => ComponentId::ClipTable,
                        ComponentId::ClipTable => ComponentId::DateTable,
                    };
                }
            }
            Action::TogglePause => {
                if !self.player.is_ready() {
                    self.start_player().await;
                    if self.player.is_ready() {
                        let audio = self.session.current_audio();
                        self.apply_audio(audio).await;
                    }
                    return;
                }
                if self.player.playback().clip_id.is_none() {
                    let audio = self.session.current_audio();
                    self.apply_audio(audio).await;
                    return;
                }
                if let Err(e) = self.player.toggle_pause().await {
                    warn!("[player] pause: {:#}", e);
                    self.notice_playback_not_ready();
                }
                self.state.playback = self.player.playback().clone();
            }
            Action::SeekRelative(secs) => {
                if let Err(e) = self.player.seek_relative(secs).await {
                    debug!("[player] seek: {:#}", e);
                }
            }
            Action::SkipClip => {
                let was_waiting = self.session.is_waiting();
                let audio = self.session.skip(&self.registry);
                self.after_continuity(was_waiting, audio).await;
            }
            Action::Quit => self.should_quit = true,
        }
    }

    // ── Session events ───────────────────────────────────────────────────────

    async fn handle_session(&mut self, ev: SessionEvent) {
        match ev {
            SessionEvent::DatesLoaded { generation, dates } => {
                if self.dates.handle_dates_loaded(generation, dates) {
                    self.date_table.set_dates(self.dates.dates());
                    if let Some(id) = self.dates.selected_id() {
                        self.date_table.focus_date(id);
                    }
                    if self.dates.dates().is_empty() {
                        self.toast.warning("No dates available for this source");
                    }
                }
            }
            SessionEvent::DateLoaded {
                generation,
                date_id,
                date,
            } => {
                self.dates.handle_date_loaded(generation, date_id, date);
            }
            SessionEvent::TonesLoaded(tones) => {
                self.state.tones = tones.into_iter().map(|t| (t.id, t)).collect();
            }
            SessionEvent::ClipsLoaded {
                generation,
                kind,
                clips,
            } => {
                if let Some(audio) = self.session.handle_loaded(generation, kind, clips) {
                    self.clip_table.set_clips(self.session.clips().clips());
                    if let Some(index) = self.session.clips().current_index() {
                        self.clip_table.reveal(index);
                    }
                    self.apply_audio(audio).await;
                }
            }
            SessionEvent::PollDue { generation } => self.session.handle_poll_due(generation),
            SessionEvent::RetryDue { generation } => {
                let was_waiting = self.session.is_waiting();
                let audio = self.session.retry_due(generation, &self.registry);
                self.after_continuity(was_waiting, audio).await;
            }
            SessionEvent::SettleDue { generation } => {
                let was_waiting = self.session.is_waiting();
                let audio = self.session.settle_due(generation, &self.registry);
                self.after_continuity(was_waiting, audio).await;
            }
        }
        self.toast.set_status(self.session.clips().status());
        self.sync_state();
    }

    async fn handle_mpv(&mut self, ev: MpvEvent) -> bool {
        let Some(parsed) = self.player.apply(&ev) else {
            return false;
        };
        match parsed {
            PlayerEvent::Ended => {
                if let Some(id) = self.player.playback().clip_id {
                    info!("[player] clip {} ended", id);
                    let was_waiting = self.session.is_waiting();
                    let audio = self.session.clip_ended(id, &self.registry);
                    self.after_continuity(was_waiting, audio).await;
                }
            }
            PlayerEvent::Failed(reason) => {
                warn!("[player] clip failed: {}", reason);
                self.toast.error(format!("Could not play clip: {}", reason));
            }
            PlayerEvent::Paused(_) | PlayerEvent::Position(_) | PlayerEvent::Duration(_) => {}
        }
        self.sync_state();
        true
    }

    async fn after_continuity(&mut self, was_waiting: bool, audio: AudioCommand) {
        if !was_waiting && self.session.is_waiting() {
            self.toast.info("Caught up, waiting for the next clip");
        }
        self.apply_audio(audio).await;
        self.sync_state();
    }

    // ── Selection plumbing ───────────────────────────────────────────────────

    async fn select_date(&mut self, date_id: i64) {
        if self.dates.select(date_id) {
            let audio = self.session.select_date(date_id);
            self.clip_table.reset();
            self.apply_audio(audio).await;
        }
        self.sync_date_panel();
        self.sync_state();
    }

    /// Put the session's audio decision on the output. A newly loaded clip
    /// is also scrolled into view.
    async fn apply_audio(&mut self, audio: AudioCommand) {
        let (id, url) = match audio {
            AudioCommand::Keep => return,
            AudioCommand::Stop => {
                self.player.stop().await;
                return;
            }
            AudioCommand::Load { clip_id, url } => (clip_id, url),
        };
        if let Some(index) = self.session.clips().current_index() {
            self.clip_table.reveal(index);
        }
        if !self.player.is_ready() {
            self.notice_playback_not_ready();
            return;
        }
        match self.player.play(id, &url).await {
            Ok(()) => {
                if !self.player.autoplay() {
                    self.toast.warn_once(
                        NOTICE_PLAYBACK,
                        "Autoplay is off: clips load paused, press space to play",
                    );
                }
            }
            Err(e) => {
                warn!("[player] load clip {}: {:#}", id, e);
                self.notice_playback_not_ready();
            }
        }
    }

    fn sync_date_panel(&mut self) {
        let now = Instant::now();
        if self.dates.expanded() {
            self.date_table.mount(&self.registry, self.viewport, now);
            if let Some(id) = self.dates.selected_id() {
                self.date_table.focus_date(id);
            }
            self.focus = ComponentId::DateTable;
        } else {
            self.date_table.unmount();
            self.focus = ComponentId::ClipTable;
        }
    }

    fn sync_state(&mut self) {
        let s = &mut self.state;
        s.current_date_id = self.dates.selected_id();
        s.current_clip_id = self.session.clips().current_id();
        s.dates_loading = self.dates.is_loading();
        s.clips_loading = self.session.clips().is_loading();
        s.waiting_for_clips = self.session.is_waiting();
        s.playback = self.player.playback().clone();
        s.heading = match (self.dates.selected(), self.dates.selected_listing()) {
            (Some(full), _) => Some(format!(
                "{} · {}",
                full.source.shorthand,
                full.display_date()
            )),
            (None, Some(listed)) => Some(listed.display_date()),
            (None, None) => None,
        };
    }

    // ── Drawing ───────────────────────────────────────────────────────────────

    fn draw(&mut self, frame: &mut Frame) {
        let area = frame.area();
        let rows = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(1),
                Constraint::Min(3),
                Constraint::Length(1),
                Constraint::Length(1),
            ])
            .split(area);

        self.draw_header(frame, rows[0]);

        let main = rows[1];
        self.areas = Areas::default();
        if self.dates.expanded() {
            if area.width >= NARROW_WIDTH && self.dates.selected_id().is_some() {
                let cols = Layout::default()
                    .direction(Direction::Horizontal)
                    .constraints([Constraint::Length(DATE_PANE_WIDTH), Constraint::Min(20)])
                    .split(main);
                self.areas.dates = Some(cols[0]);
                self.areas.clips = Some(cols[1]);
            } else {
                self.areas.dates = Some(main);
            }
        } else {
            self.areas.clips = Some(main);
        }

        if let Some(r) = self.areas.dates {
            let focused = self.focus == ComponentId::DateTable;
            self.date_table.draw(frame, r, focused, &self.state);
        }
        if let Some(r) = self.areas.clips {
            let focused = self.focus == ComponentId::ClipTable;
            self.clip_table.draw(frame, r, focused, &self.state);
        }

        let label = self
            .state
            .playback
            .clip_id
            .and_then(|id| self.session.clips().clips().iter().find(|c| c.id == id))
            .map(|c| format!("{} #{}", c.time, c.id));
        draw_transport(frame, rows[2], &self.state.playback, label.as_deref());
        self.draw_help(frame, rows[3]);
        if !self.toast.is_empty() {
            self.toast.draw(frame, main);
        }
    }

    fn draw_header(&self, frame: &mut Frame, area: Rect) {
        let mut spans = vec![Span::styled(
            " scanner ",
            Style::default().fg(C_ACCENT).add_modifier(Modifier::BOLD),
        )];
        if let Some(h) = &self.state.heading {
            spans.push(Span::styled(format!("· {} ", h), style_secondary()));
        }
        if self.state.demo {
            spans.push(Span::styled(" DEMO ", Style::default().fg(C_DEMO)));
        }
        if self.state.waiting_for_clips {
            spans.push(Span::styled(" waiting for clips ", style_muted()));
        }
        frame.render_widget(Paragraph::new(Line::from(spans)), area);
    }

    fn draw_help(&self, frame: &mut Frame, area: Rect) {
        let text = if area.width < NARROW_WIDTH {
            " ↑↓ move ⏎ pick ←→ page d dates ␣ play n next q quit"
        } else {
            " ↑↓ move  ⏎ select  ←→ page  Home/End first/last  Tab focus  d dates  ␣ play/pause  n next  ,/. seek  q quit"
        };
        frame.render_widget(Paragraph::new(Span::styled(text, style_muted())), area);
    }
}
