use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use super::platform;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub demo: DemoConfig,
    #[serde(default)]
    pub polling: PollingConfig,
    #[serde(default)]
    pub layout: LayoutConfig,
    #[serde(default)]
    pub player: PlayerConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Base URL of the clips backend; requests go to `{host}/api/...`.
    #[serde(default = "default_api_host")]
    pub host: String,
    /// Sent as the `api-key` header when set.
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// The single monitored source for this session.
    #[serde(default = "default_source_id")]
    pub source_id: i64,
}

/// Offline mode: fixture data instead of the network.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DemoConfig {
    #[serde(default)]
    pub enabled: bool,
    /// Placeholder media played for every clip in demo mode.
    #[serde(default = "default_demo_audio_url")]
    pub audio_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollingConfig {
    #[serde(default = "default_clip_poll_secs")]
    pub clip_poll_secs: u64,
    /// Delay before re-checking for a next clip once playback caught up.
    #[serde(default = "default_retry_secs")]
    pub retry_secs: u64,
    /// Wait after a page turn before picking the clip on the new page.
    #[serde(default = "default_settle_ms")]
    pub settle_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LayoutConfig {
    /// Fraction of the available rows usable for list rows.
    #[serde(default = "default_viewport_percentage")]
    pub viewport_percentage: f32,
    /// Fixed page size; skips measurement when set.
    #[serde(default)]
    pub items_per_page: Option<usize>,
    #[serde(default = "default_resize_debounce_ms")]
    pub resize_debounce_ms: u64,
    #[serde(default = "default_mount_settle_ms")]
    pub mount_settle_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerConfig {
    #[serde(default = "default_volume")]
    pub volume: f32,
    #[serde(default = "default_autoplay")]
    pub autoplay: bool,
    #[serde(default)]
    pub mpv_path: Option<PathBuf>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: default_api_host(),
            api_key: None,
            timeout_secs: default_timeout_secs(),
            source_id: default_source_id(),
        }
    }
}

impl Default for DemoConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            audio_url: default_demo_audio_url(),
        }
    }
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            clip_poll_secs: default_clip_poll_secs(),
            retry_secs: default_retry_secs(),
            settle_ms: default_settle_ms(),
        }
    }
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            viewport_percentage: default_viewport_percentage(),
            items_per_page: None,
            resize_debounce_ms: default_resize_debounce_ms(),
            mount_settle_ms: default_mount_settle_ms(),
        }
    }
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            volume: default_volume(),
            autoplay: default_autoplay(),
            mpv_path: None,
        }
    }
}

fn default_api_host() -> String {
    "http://127.0.0.1:3001".to_string()
}

fn default_timeout_secs() -> u64 {
    10
}

fn default_source_id() -> i64 {
    1
}

fn default_demo_audio_url() -> String {
    "https://www.soundhelix.com/examples/mp3/SoundHelix-Song-1.mp3".to_string()
}

fn default_clip_poll_secs() -> u64 {
    30
}

fn default_retry_secs() -> u64 {
    10
}

fn default_settle_ms() -> u64 {
    250
}

fn default_viewport_percentage() -> f32 {
    0.6
}

fn default_resize_debounce_ms() -> u64 {
    150
}

fn default_mount_settle_ms() -> u64 {
    250
}

fn default_volume() -> f32 {
    0.7
}

fn default_autoplay() -> bool {
    true
}

impl Config {
    /// Load from the default location, writing defaults on first run, then
    /// apply environment overrides (a `.env` in the working directory counts).
    pub fn load() -> anyhow::Result<Self> {
        if let Ok(path) = dotenvy::dotenv() {
            tracing::debug!("loaded environment from {}", path.display());
        }
        let mut config = Self::load_from(&Self::config_path())?;
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            let config = Self::default();
            config.save_to(path)?;
            return Ok(config);
        }

        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    pub fn save_to(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn config_path() -> PathBuf {
        platform::config_dir().join("config.toml")
    }

    /// `SCANNER_API_HOST`, `SCANNER_API_KEY` and `SCANNER_DEMO` win over the
    /// file. `lookup` is `std::env::var` outside tests.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(host) = lookup("SCANNER_API_HOST").filter(|h| !h.trim().is_empty()) {
            self.api.host = host.trim().trim_end_matches('/').to_string();
        }
        if let Some(key) = lookup("SCANNER_API_KEY").filter(|k| !k.is_empty()) {
            self.api.api_key = Some(key);
        }
        if let Some(flag) = lookup("SCANNER_DEMO") {
            self.demo.enabled = matches!(
                flag.trim().to_ascii_lowercase().as_str(),
                "1" | "true" | "yes" | "on"
            );
        }
    }
}
