//! Transient notices in the top-right corner, plus one persistent status
//! line with a spinner (e.g. while clips are being re-checked).

use std::collections::{HashSet, VecDeque};
use std::time::{Duration, Instant};

use ratatui::{
    layout::Rect,
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Clear, Paragraph},
    Frame,
};
use unicode_width::UnicodeWidthStr;

use crate::theme::{C_TOAST_ERROR, C_TOAST_INFO, C_TOAST_WARNING};

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Severity {
    Info,
    Warning,
    Error,
}

struct Toast {
    message: String,
    severity: Severity,
    expires: Instant,
}

const SPINNER_FRAMES: &[&str] = &["⣾", "⣽", "⣻", "⢿", "⡿", "⣟", "⣯", "⣷"];
const MAX_VISIBLE: usize = 4;

#[derive(Default)]
pub struct ToastManager {
    toasts: VecDeque<Toast>,
    status: Option<String>,
    frame: usize,
    /// Keys of notices that may only ever be shown once per session.
    shown_once: HashSet<&'static str>,
}

impl ToastManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, message: impl Into<String>, severity: Severity, duration: Duration) {
        let message = message.into();
        self.toasts.retain(|t| t.message != message);
        self.toasts.push_back(Toast {
            message,
            severity,
            expires: Instant::now() + duration,
        });
        while self.toasts.len() > MAX_VISIBLE * 2 {
            self.toasts.pop_front();
        }
    }

    pub fn info(&mut self, message: impl Into<String>) {
        self.push(message, Severity::Info, Duration::from_secs(3));
    }

    pub fn warning(&mut self, message: impl Into<String>) {
        self.push(message, Severity::Warning, Duration::from_secs(5));
    }

    pub fn error(&mut self, message: impl Into<String>) {
        self.push(message, Severity::Error, Duration::from_secs(6));
    }

    /// Show a warning the first time `key` is seen; later calls are ignored.
    pub fn warn_once(&mut self, key: &'static str, message: impl Into<String>) -> bool {
        if !self.shown_once.insert(key) {
            return false;
        }
        self.push(message, Severity::Warning, Duration::from_secs(8));
        true
    }

    /// Set or clear the persistent status line.
    pub fn set_status(&mut self, status: Option<&str>) {
        if self.status.as_deref() != status {
            self.status = status.map(str::to_string);
            self.frame = 0;
        }
    }

    pub fn tick(&mut self, now: Instant) {
        self.toasts.retain(|t| t.expires > now);
        if self.status.is_some() {
            self.frame = (self.frame + 1) % SPINNER_FRAMES.len();
        }
    }

    pub fn is_empty(&self) -> bool {
        self.toasts.is_empty() && self.status.is_none()
    }

    fn rows(&self) -> Vec<(String, Style)> {
        let mut rows = Vec::new();
        if let Some(status) = &self.status {
            rows.push((
                format!(" {} {} ", SPINNER_FRAMES[self.frame], status),
                Style::default().fg(C_TOAST_INFO),
            ));
        }
        for toast in self.toasts.iter().rev().take(MAX_VISIBLE) {
            let (icon, color) = match toast.severity {
                Severity::Info => ("·", C_TOAST_INFO),
                Severity::Warning => ("!", C_TOAST_WARNING),
                Severity::Error => ("✗", C_TOAST_ERROR),
            };
            rows.push((
                format!(" {} {} ", icon, toast.message),
                Style::default().fg(color).add_modifier(Modifier::BOLD),
            ));
        }
        rows
    }

    pub fn draw(&self, frame: &mut Frame, area: Rect) {
        let max_width = (area.width / 2).clamp(30, 70).min(area.width);
        let bottom = area.y + area.height;
        let mut y = area.y + 1;

        for (text, style) in self.rows() {
            if y >= bottom {
                break;
            }
            let width = (text.width() as u16).min(max_width);
            let toast_area = Rect {
                x: area.x + area.width.saturating_sub(width + 1),
                y,
                width,
                height: 1,
            };
            frame.render_widget(Clear, toast_area);
            frame.render_widget(Paragraph::new(Line::from(Span::styled(text, style))), toast_area);
            y += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn warn_once_only_fires_once() {
        let mut toasts = ToastManager::new();
        assert!(toasts.warn_once("playback", "Playback is not ready"));
        assert!(!toasts.warn_once("playback", "Playback is not ready"));
        assert_eq!(toasts.rows().len(), 1);
    }

    #[test]
    fn duplicates_collapse_and_expire() {
        let mut toasts = ToastManager::new();
        toasts.info("Loaded");
        toasts.info("Loaded");
        assert_eq!(toasts.rows().len(), 1);

        toasts.tick(Instant::now() + Duration::from_secs(10));
        assert!(toasts.is_empty());
    }

    #[test]
    fn status_line_leads_and_clears() {
        let mut toasts = ToastManager::new();
        toasts.warning("No audio");
        toasts.set_status(Some("Checking for new clips..."));
        let rows = toasts.rows();
        assert_eq!(rows.len(), 2);
        assert!(rows[0].0.contains("Checking for new clips..."));

        toasts.set_status(None);
        assert_eq!(toasts.rows().len(), 1);
    }
}
