//! Footer line under a paginated table.

use ratatui::{
    layout::{Alignment, Rect},
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::Paragraph,
    Frame,
};

use crate::pagination::Paginator;
use crate::theme::{style_muted, style_secondary, C_PAGE_CURRENT};

pub fn draw_pager<T>(frame: &mut Frame, area: Rect, pages: &Paginator<T>) {
    if area.height == 0 {
        return;
    }
    let Some(summary) = pages.summary() else {
        return;
    };
    let cursor = pages.cursor();
    let current = cursor.current_page();
    let total = cursor.total_pages();

    let mut strip = vec![Span::styled(
        if current > 1 { "‹ " } else { "  " },
        style_secondary(),
    )];
    for page in pages.page_numbers() {
        if page == current {
            strip.push(Span::styled(
                format!("[{}]", page),
                Style::default()
                    .fg(C_PAGE_CURRENT)
                    .add_modifier(Modifier::BOLD),
            ));
        } else {
            strip.push(Span::styled(format!(" {} ", page), style_muted()));
        }
    }
    strip.push(Span::styled(
        if current < total { " ›" } else { "  " },
        style_secondary(),
    ));
    strip.push(Span::styled(format!("  Page {} of {} ", current, total), style_secondary()));

    frame.render_widget(
        Paragraph::new(Span::styled(format!(" {}", summary), style_muted())),
        area,
    );
    frame.render_widget(
        Paragraph::new(Line::from(strip)).alignment(Alignment::Right),
        area,
    );
}
