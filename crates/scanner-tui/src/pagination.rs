//! Page size from terminal height and measured row height.
//!
//! A `Paginator<T>` owns the ordered item list and a shared `PageCursor`.
//! The cursor is what gets published in the [`PageRegistry`] so other parts
//! of the session can turn pages without holding the paginator itself.
//!
//! Lists are newest-first, so page 1 holds the newest items and `next()`
//! moves toward older ones.

use std::cell::RefCell;
use std::ops::Range;
use std::rc::Rc;
use std::time::{Duration, Instant};

use scanner_proto::config::LayoutConfig;
use tracing::trace;

use crate::registry::{PageRegistry, PageTag, Registration};

/// Terminals narrower than this get the "mobile" reservations.
pub const NARROW_WIDTH: u16 = 80;
/// Rows taken by header, pager line, transport, help line and borders.
const RESERVED_ROWS: u16 = 6;
const RESERVED_ROWS_NARROW: u16 = 10;
const MIN_ROWS: usize = 3;
const MIN_ROWS_NARROW: usize = 1;
/// Page links shown on either side of the current page.
const PAGE_WINDOW: usize = 4;
const PAGE_WINDOW_NARROW: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Viewport {
    pub width: u16,
    pub height: u16,
}

impl Viewport {
    pub fn new(width: u16, height: u16) -> Self {
        Self { width, height }
    }

    pub fn is_narrow(&self) -> bool {
        self.width < NARROW_WIDTH
    }
}

#[derive(Debug, Clone)]
pub struct PageLayout {
    /// Fraction of the available rows usable for list rows.
    pub viewport_percentage: f32,
    pub items_per_page_override: Option<usize>,
    pub resize_debounce: Duration,
    pub mount_settle: Duration,
}

impl Default for PageLayout {
    fn default() -> Self {
        Self::from(&LayoutConfig::default())
    }
}

impl From<&LayoutConfig> for PageLayout {
    fn from(config: &LayoutConfig) -> Self {
        Self {
            viewport_percentage: config.viewport_percentage,
            items_per_page_override: config.items_per_page,
            resize_debounce: Duration::from_millis(config.resize_debounce_ms),
            mount_settle: Duration::from_millis(config.mount_settle_ms),
        }
    }
}

/// How many rows of `row_height` fit the viewport. Always at least 1, and
/// never more than `item_count` when there are items.
pub fn items_per_page(
    viewport: Viewport,
    row_height: u16,
    item_count: usize,
    layout: &PageLayout,
) -> usize {
    let upper = item_count.max(1);
    if let Some(fixed) = layout.items_per_page_override {
        return fixed.clamp(1, upper);
    }

    let (reserved, minimum) = if viewport.is_narrow() {
        (RESERVED_ROWS_NARROW, MIN_ROWS_NARROW)
    } else {
        (RESERVED_ROWS, MIN_ROWS)
    };
    let available = viewport.height.saturating_sub(reserved) as f32;
    let usable = available * layout.viewport_percentage.clamp(0.0, 1.0);
    let fit = (usable / row_height.max(1) as f32).floor() as usize;

    fit.max(minimum).min(upper).max(1)
}

/// Page position over a list of `item_count` items. Pages are 1-based.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageCursor {
    current_page: usize,
    items_per_page: usize,
    item_count: usize,
}

impl Default for PageCursor {
    fn default() -> Self {
        Self {
            current_page: 1,
            items_per_page: 1,
            item_count: 0,
        }
    }
}

impl PageCursor {
    pub fn current_page(&self) -> usize {
        self.current_page
    }

    pub fn total_pages(&self) -> usize {
        self.item_count.div_ceil(self.items_per_page.max(1))
    }

    /// Index range of the current page into the full item list.
    pub fn range(&self) -> Range<usize> {
        let start = ((self.current_page - 1) * self.items_per_page).min(self.item_count);
        let end = (start + self.items_per_page).min(self.item_count);
        start..end
    }

    /// Page holding `index`.
    pub fn page_of(&self, index: usize) -> usize {
        index / self.items_per_page.max(1) + 1
    }

    /// Jump to `page`, clamped into `[1, max(1, total_pages)]`.
    /// Returns true if the page changed.
    pub fn go_to(&mut self, page: usize) -> bool {
        let target = page.clamp(1, self.total_pages().max(1));
        let changed = target != self.current_page;
        self.current_page = target;
        changed
    }

    /// Toward older items. False on the last page.
    pub fn next(&mut self) -> bool {
        if self.current_page >= self.total_pages() {
            return false;
        }
        self.go_to(self.current_page + 1)
    }

    /// Toward page 1 (newer items). False on page 1.
    pub fn previous(&mut self) -> bool {
        if self.current_page <= 1 {
            return false;
        }
        self.go_to(self.current_page - 1)
    }

    pub fn first(&mut self) -> bool {
        self.go_to(1)
    }

    pub fn last(&mut self) -> bool {
        self.go_to(self.total_pages())
    }

    fn set_layout(&mut self, item_count: usize, items_per_page: usize) {
        self.item_count = item_count;
        self.items_per_page = items_per_page.max(1);
        // Never strand the cursor past the end after the list shrinks.
        self.go_to(self.current_page);
    }
}

/// Shared view of one paginator's cursor. This is the capability
/// published in the registry.
#[derive(Debug, Clone, Default)]
pub struct PageHandle(Rc<RefCell<PageCursor>>);

impl PageHandle {
    pub fn go_to_next_page(&self) -> bool {
        self.0.borrow_mut().next()
    }

    pub fn current_page(&self) -> usize {
        self.0.borrow().current_page()
    }

    pub fn total_pages(&self) -> usize {
        self.0.borrow().total_pages()
    }

    pub fn current_range(&self) -> Range<usize> {
        self.0.borrow().range()
    }

    pub fn snapshot(&self) -> PageCursor {
        self.0.borrow().clone()
    }

    pub fn same_as(&self, other: &PageHandle) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    fn with<R>(&self, f: impl FnOnce(&mut PageCursor) -> R) -> R {
        f(&mut self.0.borrow_mut())
    }
}

pub struct Paginator<T> {
    tag: PageTag,
    items: Vec<T>,
    cursor: PageHandle,
    layout: PageLayout,
    viewport: Viewport,
    /// Height of one rendered row; `None` until the first row is drawn.
    row_height: Option<u16>,
    recompute_at: Option<Instant>,
    registration: Option<Registration>,
}

impl<T> Paginator<T> {
    pub fn new(tag: PageTag, layout: PageLayout) -> Self {
        Self {
            tag,
            items: Vec::new(),
            cursor: PageHandle::default(),
            layout,
            viewport: Viewport::default(),
            row_height: None,
            recompute_at: None,
            registration: None,
        }
    }

    /// Publish the cursor under this paginator's tag and schedule the
    /// post-mount recompute.
    pub fn mount(&mut self, registry: &PageRegistry, viewport: Viewport, now: Instant) {
        self.viewport = viewport;
        self.registration = Some(registry.register(self.tag, self.cursor.clone()));
        self.recompute();
        self.recompute_at = Some(now + self.layout.mount_settle);
    }

    pub fn unmount(&mut self) {
        self.registration = None;
        self.recompute_at = None;
    }

    pub fn is_mounted(&self) -> bool {
        self.registration.is_some()
    }

    /// Replace the items, keeping the current page where it still exists.
    pub fn set_items(&mut self, items: Vec<T>) {
        self.items = items;
        self.recompute();
    }

    pub fn items(&self) -> &[T] {
        &self.items
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// The slice shown on the current page.
    pub fn current_items(&self) -> &[T] {
        &self.items[self.cursor.current_range()]
    }

    /// First index of the current page in `items()`.
    pub fn page_offset(&self) -> usize {
        self.cursor.current_range().start
    }

    pub fn handle(&self) -> PageHandle {
        self.cursor.clone()
    }

    pub fn cursor(&self) -> PageCursor {
        self.cursor.snapshot()
    }

    /// Record the height of a rendered row. Until this is called the page
    /// holds a single seed row.
    pub fn measure_row(&mut self, height: u16) {
        if self.row_height != Some(height) {
            self.row_height = Some(height);
            self.recompute();
        }
    }

    /// Debounced: the recompute happens on the first `tick` after the delay.
    pub fn resize(&mut self, viewport: Viewport, now: Instant) {
        if viewport != self.viewport {
            self.viewport = viewport;
            self.recompute_at = Some(now + self.layout.resize_debounce);
        }
    }

    /// Apply a due recompute. Returns true if one ran.
    pub fn tick(&mut self, now: Instant) -> bool {
        match self.recompute_at {
            Some(at) if now >= at => {
                self.recompute_at = None;
                self.recompute();
                true
            }
            _ => false,
        }
    }

    pub fn recompute(&mut self) {
        let per_page = match (self.row_height, self.layout.items_per_page_override) {
            (None, None) => 1,
            (row, _) => items_per_page(
                self.viewport,
                row.unwrap_or(1),
                self.items.len(),
                &self.layout,
            ),
        };
        let count = self.items.len();
        self.cursor.with(|c| c.set_layout(count, per_page));
        trace!(
            "[page:{}] {} items, {} per page, page {}/{}",
            self.tag.as_str(),
            count,
            per_page,
            self.cursor.current_page(),
            self.cursor.total_pages()
        );
    }

    pub fn go_to(&mut self, page: usize) -> bool {
        self.cursor.with(|c| c.go_to(page))
    }

    pub fn next(&mut self) -> bool {
        self.cursor.with(PageCursor::next)
    }

    pub fn previous(&mut self) -> bool {
        self.cursor.with(PageCursor::previous)
    }

    pub fn first(&mut self) -> bool {
        self.cursor.with(PageCursor::first)
    }

    pub fn last(&mut self) -> bool {
        self.cursor.with(PageCursor::last)
    }

    /// Turn to the page holding `index`.
    pub fn reveal(&mut self, index: usize) -> bool {
        if index >= self.items.len() {
            return false;
        }
        self.cursor.with(|c| {
            let page = c.page_of(index);
            c.go_to(page)
        })
    }

    /// "Showing X to Y of N entries", or `None` for an empty list.
    pub fn summary(&self) -> Option<String> {
        if self.items.is_empty() {
            return None;
        }
        let range = self.cursor.current_range();
        Some(format!(
            "Showing {} to {} of {} entries",
            range.start + 1,
            range.end,
            self.items.len()
        ))
    }

    /// Page links around the current page, shifted so the window stays
    /// full near either end.
    pub fn page_numbers(&self) -> Vec<usize> {
        let cursor = self.cursor.snapshot();
        let total = cursor.total_pages() as i64;
        if total == 0 {
            return Vec::new();
        }
        let window = if self.viewport.is_narrow() {
            PAGE_WINDOW_NARROW
        } else {
            PAGE_WINDOW
        } as i64;
        let current = cursor.current_page() as i64;

        let mut start = current - window;
        let mut end = current + window;
        if start < 1 {
            end += start.abs() + 1;
            start = 1;
        }
        if end > total {
            start = (start - (end - total)).max(1);
            end = total;
        }
        (start..=end).map(|p| p as usize).collect()
    }
}
