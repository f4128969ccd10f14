//! Playback line: state glyph, clip label, smooth progress bar and times.

use ratatui::{
    layout::Rect,
    style::Style,
    text::{Line, Span},
    widgets::Paragraph,
    Frame,
};
use unicode_width::UnicodeWidthStr;

use crate::player::Playback;
use crate::theme::{style_muted, style_secondary, C_LOADING, C_MUTED, C_PLAYING};

const BLOCKS: [char; 9] = [' ', '▏', '▎', '▍', '▌', '▋', '▊', '▉', '█'];

pub fn draw_transport(frame: &mut Frame, area: Rect, playback: &Playback, label: Option<&str>) {
    if area.width < 8 || area.height == 0 {
        return;
    }

    let (glyph, color) = match (playback.clip_id, playback.paused) {
        (None, _) => ("■", C_MUTED),
        (Some(_), true) => ("⏸", C_LOADING),
        (Some(_), false) => ("▶", C_PLAYING),
    };
    let label = label.map(|l| format!(" {} ", l)).unwrap_or_else(|| " ".into());
    let times = format!(
        " {} / {}",
        fmt_time(playback.position),
        playback.duration.map(fmt_time).unwrap_or_else(|| "-:--".into())
    );

    let fixed = 2 + label.width() + times.width();
    let bar_w = (area.width as usize).saturating_sub(fixed);
    let progress = match playback.duration {
        Some(d) if d > 0.0 => playback.position / d,
        _ => 0.0,
    };

    let mut spans = vec![
        Span::styled(format!(" {}", glyph), Style::default().fg(color)),
        Span::styled(label, style_secondary()),
    ];
    if bar_w >= 4 {
        spans.push(Span::styled(bar(progress, bar_w), Style::default().fg(C_PLAYING)));
    }
    spans.push(Span::styled(times, style_muted()));

    frame.render_widget(Paragraph::new(Line::from(spans)), area);
}

/// `width` cells filled to `progress` (0.0..=1.0) in eighth-block steps.
fn bar(progress: f64, width: usize) -> String {
    let eighths = (progress.clamp(0.0, 1.0) * width as f64 * 8.0) as usize;
    let full = eighths / 8;
    let mut out: String = "█".repeat(full);
    if full < width {
        out.push(BLOCKS[eighths % 8]);
        out.push_str(&"─".repeat(width - full - 1));
    }
    out
}

pub fn fmt_time(secs: f64) -> String {
    let s = if secs.is_finite() && secs > 0.0 { secs as u64 } else { 0 };
    let (h, m, s) = (s / 3600, (s % 3600) / 60, s % 60);
    if h > 0 {
        format!("{}:{:02}:{:02}", h, m, s)
    } else {
        format!("{}:{:02}", m, s)
    }
}
