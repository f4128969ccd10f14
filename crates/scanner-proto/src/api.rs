//! Clips backend client.
//!
//! Every list call degrades to an empty collection on any failure; callers
//! treat "empty" and "error" the same. The `try_*` methods on `LiveClient`
//! keep the error for logging and tests.

use std::future::Future;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::{ApiConfig, Config};
use crate::demo;
use crate::models::{Clip, ClipDate, FullClipDate, Tone};

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("request to {url} failed: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("{url} returned status {status}")]
    Status { url: String, status: u16 },
    #[error("could not decode response from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),
}

/// The four backend reads plus the audio URL for a clip.
pub trait ClipsBackend: Send + Sync + 'static {
    /// All dates for a source, newest first.
    fn dates_by_source(&self, source_id: i64) -> impl Future<Output = Vec<ClipDate>> + Send;

    fn full_date(&self, date_id: i64) -> impl Future<Output = Option<FullClipDate>> + Send;

    /// All clips for a date, newest first.
    fn clips_by_date(&self, date_id: i64) -> impl Future<Output = Vec<Clip>> + Send;

    fn tones_by_source(&self, source_id: i64) -> impl Future<Output = Vec<Tone>> + Send;

    /// Streamable media URL for a clip.
    fn audio_url(&self, clip_id: i64) -> String;
}

#[derive(Deserialize)]
struct FullDateEnvelope {
    date: FullClipDate,
}

/// JSON client for the REST backend at `{host}/api`.
#[derive(Clone)]
pub struct LiveClient {
    client: reqwest::Client,
    host: String,
    api_key: Option<String>,
}

impl LiveClient {
    pub fn new(config: &ApiConfig) -> Result<Self, ApiError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs.max(1)))
            .build()
            .map_err(ApiError::Client)?;
        Ok(Self {
            client,
            host: config.host.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api{}", self.host, path)
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        let url = self.url(path);
        debug!("GET {}", url);

        let mut request = self
            .client
            .get(&url)
            .header("Accept", "application/json")
            .header("Content-Type", "application/json");
        if let Some(key) = &self.api_key {
            request = request.header("api-key", key);
        }

        let response = request.send().await.map_err(|source| ApiError::Http {
            url: url.clone(),
            source,
        })?;

        if !response.status().is_success() {
            return Err(ApiError::Status {
                url,
                status: response.status().as_u16(),
            });
        }

        response
            .json::<T>()
            .await
            .map_err(|source| ApiError::Decode { url, source })
    }

    pub async fn try_dates_by_source(&self, source_id: i64) -> Result<Vec<ClipDate>, ApiError> {
        self.get_json(&format!("/dates/many/source_id/{}", source_id))
            .await
    }

    pub async fn try_full_date(&self, date_id: i64) -> Result<FullClipDate, ApiError> {
        let envelope: FullDateEnvelope = self
            .get_json(&format!("/dates/one/date_id/{}", date_id))
            .await?;
        Ok(envelope.date)
    }

    pub async fn try_clips_by_date(&self, date_id: i64) -> Result<Vec<Clip>, ApiError> {
        self.get_json(&format!("/clips/many/date_id/{}", date_id))
            .await
    }

    pub async fn try_tones_by_source(&self, source_id: i64) -> Result<Vec<Tone>, ApiError> {
        self.get_json(&format!("/tones/many/source_id/{}", source_id))
            .await
    }
}

fn or_empty<T: Default>(what: &str, result: Result<T, ApiError>) -> T {
    result.unwrap_or_else(|e| {
        warn!("[api] {}: {}", what, e);
        T::default()
    })
}

impl ClipsBackend for LiveClient {
    async fn dates_by_source(&self, source_id: i64) -> Vec<ClipDate> {
        or_empty("dates", self.try_dates_by_source(source_id).await)
    }

    async fn full_date(&self, date_id: i64) -> Option<FullClipDate> {
        match self.try_full_date(date_id).await {
            Ok(date) => Some(date),
            Err(e) => {
                warn!("[api] date {}: {}", date_id, e);
                None
            }
        }
    }

    async fn clips_by_date(&self, date_id: i64) -> Vec<Clip> {
        or_empty("clips", self.try_clips_by_date(date_id).await)
    }

    async fn tones_by_source(&self, source_id: i64) -> Vec<Tone> {
        or_empty("tones", self.try_tones_by_source(source_id).await)
    }

    fn audio_url(&self, clip_id: i64) -> String {
        self.url(&format!("/clips/audio/{}", clip_id))
    }
}

/// Serves the fixture set from [`crate::demo`]; never touches the network.
#[derive(Debug, Clone)]
pub struct DemoClient {
    audio_url: String,
}

impl DemoClient {
    pub fn new(audio_url: impl Into<String>) -> Self {
        Self {
            audio_url: audio_url.into(),
        }
    }
}

impl ClipsBackend for DemoClient {
    async fn dates_by_source(&self, source_id: i64) -> Vec<ClipDate> {
        demo::dates_by_source(source_id)
    }

    async fn full_date(&self, date_id: i64) -> Option<FullClipDate> {
        demo::full_date(date_id)
    }

    async fn clips_by_date(&self, date_id: i64) -> Vec<Clip> {
        demo::clips_by_date(date_id)
    }

    async fn tones_by_source(&self, source_id: i64) -> Vec<Tone> {
        demo::tones_by_source(source_id)
    }

    fn audio_url(&self, _clip_id: i64) -> String {
        self.audio_url.clone()
    }
}

/// Live or demo, picked once from config.
#[derive(Clone)]
pub enum ApiClient {
    Live(LiveClient),
    Demo(DemoClient),
}

impl ApiClient {
    pub fn from_config(config: &Config) -> Result<Self, ApiError> {
        if config.demo.enabled {
            return Ok(Self::Demo(DemoClient::new(config.demo.audio_url.clone())));
        }
        Ok(Self::Live(LiveClient::new(&config.api)?))
    }

    pub fn is_demo(&self) -> bool {
        matches!(self, Self::Demo(_))
    }
}

impl ClipsBackend for ApiClient {
    async fn dates_by_source(&self, source_id: i64) -> Vec<ClipDate> {
        match self {
            Self::Live(c) => c.dates_by_source(source_id).await,
            Self::Demo(c) => c.dates_by_source(source_id).await,
        }
    }

    async fn full_date(&self, date_id: i64) -> Option<FullClipDate> {
        match self {
            Self::Live(c) => c.full_date(date_id).await,
            Self::Demo(c) => c.full_date(date_id).await,
        }
    }

    async fn clips_by_date(&self, date_id: i64) -> Vec<Clip> {
        match self {
            Self::Live(c) => c.clips_by_date(date_id).await,
            Self::Demo(c) => c.clips_by_date(date_id).await,
        }
    }

    async fn tones_by_source(&self, source_id: i64) -> Vec<Tone> {
        match self {
            Self::Live(c) => c.tones_by_source(source_id).await,
            Self::Demo(c) => c.tones_by_source(source_id).await,
        }
    }

    fn audio_url(&self, clip_id: i64) -> String {
        match self {
            Self::Live(c) => c.audio_url(clip_id),
            Self::Demo(c) => c.audio_url(clip_id),
        }
    }
}
