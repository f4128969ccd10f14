//! Date picker pane. Only mounted while the date panel is open.

use std::time::Instant;

use ratatui::crossterm::event::{KeyCode, KeyEvent, KeyEventKind, MouseEvent};
use ratatui::{
    layout::{Constraint, Rect},
    style::Style,
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Row, Table},
    Frame,
};
use scanner_proto::models::ClipDate;

use super::PagedTable;
use crate::action::{Action, ComponentId};
use crate::app_state::AppState;
use crate::component::Component;
use crate::pagination::{PageLayout, Viewport};
use crate::registry::{PageRegistry, PageTag};
use crate::theme::{
    style_border, style_cursor, style_default, style_muted, style_playing, style_secondary,
    C_LOADING,
};
use crate::widgets::pager::draw_pager;

pub struct DateTable {
    table: PagedTable<ClipDate>,
}

impl DateTable {
    pub fn new(layout: PageLayout) -> Self {
        Self {
            table: PagedTable::new(PageTag::DATES, layout),
        }
    }

    pub fn mount(&mut self, registry: &PageRegistry, viewport: Viewport, now: Instant) {
        if !self.table.pages.is_mounted() {
            self.table.pages.mount(registry, viewport, now);
        }
    }

    pub fn unmount(&mut self) {
        self.table.pages.unmount();
    }

    pub fn resize(&mut self, viewport: Viewport, now: Instant) {
        self.table.pages.resize(viewport, now);
    }

    pub fn set_dates(&mut self, dates: &[ClipDate]) {
        self.table.set_items(dates.to_vec());
    }

    /// Put the cursor on the selected date.
    pub fn focus_date(&mut self, date_id: i64) {
        if let Some(index) = self.table.pages.items().iter().position(|d| d.id == date_id) {
            self.table.focus_index(index);
        }
    }
}

impl Component for DateTable {
    fn id(&self) -> ComponentId {
        ComponentId::DateTable
    }

    fn handle_key(&mut self, key: KeyEvent, _state: &AppState) -> Vec<Action> {
        if key.kind == KeyEventKind::Release {
            return vec![];
        }
        if self.table.navigate(key.code) {
            return vec![];
        }
        match key.code {
            KeyCode::Enter | KeyCode::Char(' ') => self
                .table
                .selected()
                .map(|d| vec![Action::SelectDate(d.id)])
                .unwrap_or_default(),
            KeyCode::Esc => vec![Action::ToggleDates],
            _ => vec![],
        }
    }

    fn handle_mouse(&mut self, event: MouseEvent, area: Rect, _state: &AppState) -> Vec<Action> {
        // Border + header row.
        match self.table.mouse(event, area, area.y + 2) {
            Some(date) => vec![Action::SelectDate(date.id)],
            None => vec![],
        }
    }

    fn tick(&mut self, now: Instant) {
        self.table.tick(now);
    }

    fn draw(&mut self, frame: &mut Frame, area: Rect, focused: bool, state: &AppState) {
        let block = Block::default()
            .borders(Borders::ALL)
            .border_style(style_border(focused))
            .title(Span::styled(" dates ", style_secondary()));
        let inner = block.inner(area);
        frame.render_widget(block, area);
        if inner.height < 2 {
            return;
        }

        if self.table.pages.is_empty() {
            let (text, style) = if state.dates_loading {
                ("  loading dates…", Style::default().fg(C_LOADING))
            } else {
                ("  no dates for this source", style_muted())
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
            .map(|(i, date)| {
                let is_current = state.current_date_id == Some(date.id);
                let marker = if is_current { "●" } else { " " };
                let date_style = if is_current {
                    style_playing()
                } else {
                    style_default()
                };
                let row = Row::new(vec![
                    Line::from(Span::styled(marker, style_playing())),
                    Line::from(Span::styled(date.display_date(), date_style)),
                    Line::from(Span::styled(format!("#{}", date.id), style_muted())),
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
                Constraint::Length(10),
                Constraint::Min(6),
            ],
        )
        .header(Row::new(vec!["", "Date", "ID"]).style(style_secondary()));
        frame.render_widget(table, body);
        draw_pager(frame, footer, &self.table.pages);
    }
}
