//! Clip list for the selected date, newest first.

use std::time::Instant;

use ratatui::crossterm::event::{KeyCode, KeyEvent, KeyEventKind, MouseEvent};
use ratatui::{
    layout::{Constraint, Rect},
    style::Style,
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Row, Table},
    Frame,
};
use scanner_proto::models::Clip;

use super::PagedTable;
use crate::action::{Action, ComponentId};
use crate::app_state::AppState;
use crate::component::Component;
use crate::pagination::{PageLayout, Viewport};
use crate::registry::{PageRegistry, PageTag};
use crate::theme::{
    style_border, style_cursor, style_default, style_muted, style_playing, style_secondary,
    tone_color, C_LOADING,
};
use crate::widgets::pager::draw_pager;

pub struct ClipTable {
    table: PagedTable<Clip>,
}

impl ClipTable {
    pub fn new(layout: PageLayout) -> Self {
        Self {
            table: PagedTable::new(PageTag::CLIPS, layout),
        }
    }

    pub fn mount(&mut self, registry: &PageRegistry, viewport: Viewport, now: Instant) {
        if !self.table.pages.is_mounted() {
            self.table.pages.mount(registry, viewport, now);
        }
    }

    pub fn resize(&mut self, viewport: Viewport, now: Instant) {
        self.table.pages.resize(viewport, now);
    }

    /// Replace the rows, keeping the current page where it still exists.
    pub fn set_clips(&mut self, clips: &[Clip]) {
        self.table.set_items(clips.to_vec());
    }

    /// New date: back to page 1.
    pub fn reset(&mut self) {
        self.table.set_items(Vec::new());
        self.table.pages.first();
    }

    /// Show the page holding the clip at `index` and put the cursor on it.
    pub fn reveal(&mut self, index: usize) {
        self.table.focus_index(index);
    }
}

impl Component for ClipTable {
    fn id(&self) -> ComponentId {
        ComponentId::ClipTable
    }

    fn handle_key(&mut self, key: KeyEvent, _state: &AppState) -> Vec<Action> {
        if key.kind == KeyEventKind::Release {
            return vec![];
        }
        if self.table.navigate(key.code) {
            return vec![];
        }
        match key.code {
            KeyCode::Enter => self
                .table
                .selected()
                .map(|c| vec![Action::SelectClip(c.id)])
                .unwrap_or_default(),
            _ => vec![],
        }
    }

    fn handle_mouse(&mut self, event: MouseEvent, area: Rect, _state: &AppState) -> Vec<Action> {
        match self.table.mouse(event, area, area.y + 2) {
            Some(clip) => vec![Action::SelectClip(clip.id)],
            None => vec![],
        }
    }

    fn tick(&mut self, now: Instant) {
        self.table.tick(now);
    }

    fn draw(&mut self, frame: &mut Frame, area: Rect, focused: bool, state: &AppState) {
        let title = match &state.heading {
            Some(h) => format!(" clips · {} ", h),
            None => " clips ".to_string(),
        };
        let block = Block::default()
            .borders(Borders::ALL)
            .border_style(style_border(focused))
            .title(Span::styled(title, style_secondary()));
        let inner = block.inner(area);
        frame.render_widget(block, area);
        if inner.height < 2 {
            return;
        }

        if self.table.pages.is_empty() {
            let (text, style) = if state.current_date_id.is_none() {
                ("  select a date (d)", style_muted())
            } else if state.clips_loading {
                ("  loading clips…", Style::default().fg(C_LOADING))
            } else {
                ("  no clips for this date yet", style_muted())
            };
            frame.render_widget(Paragraph::new(Span::styled(text, style)), inner);
            return;
        }

        self.table.measure();
        let body = Rect {
            height: inner.height - 1,
            ..inner
        };
        let footer = Rect {
            y: inner.y + inner.height - 1,
            height: 1,
            ..inner
        };

        let cursor = self.table.cursor_row();
        let rows: Vec<Row> = self
            .table
            .pages
            .current_items()
            .iter()
            .enumerate()
            .map(|(i, clip)| {
                let is_current = state.current_clip_id == Some(clip.id);
                let marker = match (is_current, state.playback.paused) {
                    (false, _) => " ",
                    (true, true) => "⏸",
                    (true, false) => "▶",
                };
                let time_style = if is_current {
                    style_playing()
                } else {
                    style_default()
                };
                let tone = match state.tone(clip.tones_id) {
                    Some(t) => Span::styled(t.name.clone(), Style::default().fg(tone_color(t.rgb()))),
                    None => Span::styled("-", style_muted()),
                };
                let row = Row::new(vec![
                    Line::from(Span::styled(marker, style_playing())),
                    Line::from(Span::styled(clip.time.clone(), time_style)),
                    Line::from(tone),
                    Line::from(Span::styled(format!("#{}", clip.id), style_muted())),
                ]);
                if i == cursor {
                    row.style(style_cursor(focused))
                } else {
                    row
                }
            })
            .collect();

        let table = Table::new(
            rows,
            [
                Constraint::Length(2),
                Constraint::Length(9),
                Constraint::Min(8),
                Constraint::Length(8),
            ],
        )
        .header(Row::new(vec!["", "Time", "Tone", "ID"]).style(style_secondary()));
        frame.render_widget(table, body);
        draw_pager(frame, footer, &self.table.pages);
    }
}
