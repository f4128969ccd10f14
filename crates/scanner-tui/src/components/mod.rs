pub mod clip_table;
pub mod date_table;

pub use clip_table::ClipTable;
pub use date_table::DateTable;

use ratatui::crossterm::event::{KeyCode, MouseEvent, MouseEventKind};
use ratatui::layout::Rect;

use crate::pagination::{PageLayout, Paginator};
use crate::registry::PageTag;

/// Rendered height of one table row.
pub const ROW_HEIGHT: u16 = 1;

/// A paginated list with a row cursor inside the current page.
pub struct PagedTable<T> {
    pub pages: Paginator<T>,
    /// Row within the current page.
    cursor: usize,
}

impl<T> PagedTable<T> {
    pub fn new(tag: PageTag, layout: PageLayout) -> Self {
        Self {
            pages: Paginator::new(tag, layout),
            cursor: 0,
        }
    }

    pub fn set_items(&mut self, items: Vec<T>) {
        self.pages.set_items(items);
        self.clamp_cursor();
    }

    fn clamp_cursor(&mut self) {
        let rows = self.pages.current_items().len();
        self.cursor = self.cursor.min(rows.saturating_sub(1));
    }

    pub fn cursor_row(&self) -> usize {
        self.cursor
    }

    pub fn selected(&self) -> Option<&T> {
        self.pages.current_items().get(self.cursor)
    }

    /// Show the page holding `index` and put the cursor on it.
    pub fn focus_index(&mut self, index: usize) {
        if index >= self.pages.items().len() {
            return;
        }
        self.pages.reveal(index);
        self.cursor = index - self.pages.page_offset();
    }

    pub fn tick(&mut self, now: std::time::Instant) {
        if self.pages.tick(now) {
            self.clamp_cursor();
        }
    }

    pub fn measure(&mut self) {
        if !self.pages.is_empty() {
            self.pages.measure_row(ROW_HEIGHT);
            self.clamp_cursor();
        }
    }

    /// Cursor and page movement. Returns false for keys it doesn't own.
    pub fn navigate(&mut self, code: KeyCode) -> bool {
        let rows = self.pages.current_items().len();
        match code {
            KeyCode::Up | KeyCode::Char('k') => {
                if self.cursor > 0 {
                    self.cursor -= 1;
                } else if self.pages.previous() {
                    self.cursor = self.pages.current_items().len().saturating_sub(1);
                }
            }
            KeyCode::Down | KeyCode::Char('j') => {
                if self.cursor + 1 < rows {
                    self.cursor += 1;
                } else if self.pages.next() {
                    self.cursor = 0;
                }
            }
            KeyCode::Left | KeyCode::PageUp | KeyCode::Char('h') => {
                if self.pages.previous() {
                    self.cursor = 0;
                }
            }
            KeyCode::Right | KeyCode::PageDown | KeyCode::Char('l') => {
                if self.pages.next() {
                    self.cursor = 0;
                }
            }
            KeyCode::Home | KeyCode::Char('g') => {
                self.pages.first();
                self.cursor = 0;
            }
            KeyCode::End | KeyCode::Char('G') => {
                self.pages.last();
                self.cursor = 0;
            }
            _ => return false,
        }
        self.clamp_cursor();
        true
    }

    /// Wheel scrolls rows; a left click on a row returns that row's item.
    /// `first_row_y` is the screen row of the first data row.
    pub fn mouse(&mut self, event: MouseEvent, area: Rect, first_row_y: u16) -> Option<&T> {
        match event.kind {
            MouseEventKind::ScrollUp => {
                self.navigate(KeyCode::Up);
                None
            }
            MouseEventKind::ScrollDown => {
                self.navigate(KeyCode::Down);
                None
            }
            MouseEventKind::Down(ratatui::crossterm::event::MouseButton::Left) => {
                let inside = event.column >= area.x
                    && event.column < area.x + area.width
                    && event.row >= first_row_y;
                if !inside {
                    return None;
                }
                let row = (event.row - first_row_y) as usize;
                if row < self.pages.current_items().len() {
                    self.cursor = row;
                    self.selected()
                } else {
                    None
                }
            }
            _ => None,
        }
    }
}
