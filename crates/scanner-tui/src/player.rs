//! Audio output through an mpv child process, driven over its JSON IPC socket.
//!
//! ```text
//!   Player::start()
//!         ├── writer task  ← requests via mpsc, one JSON line each
//!         └── reader task  → replies matched by request_id,
//!                            everything else forwarded as MpvEvent
//! ```
//!
//! The UI only learns about playback through [`Player::apply`], which folds
//! mpv events into [`Playback`] and reports the end of a clip.

use std::collections::HashMap;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, bail, Context};
use scanner_proto::config::PlayerConfig;
use scanner_proto::platform;
use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::Child;
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

#[cfg(unix)]
use tokio::net::UnixStream;

#[cfg(windows)]
use tokio::net::windows::named_pipe::ClientOptions;

static NEXT_REQ_ID: AtomicU64 = AtomicU64::new(1);

const OBS_PAUSE: u64 = 1;
const OBS_TIME_POS: u64 = 2;
const OBS_DURATION: u64 = 3;

const IPC_TIMEOUT: Duration = Duration::from_secs(5);

type Pending = Arc<Mutex<HashMap<u64, oneshot::Sender<anyhow::Result<Value>>>>>;

struct Request {
    req_id: u64,
    payload: String,
    reply: oneshot::Sender<anyhow::Result<Value>>,
}

/// Unsolicited line from mpv (event or property change).
#[derive(Debug, Clone)]
pub struct MpvEvent {
    pub raw: Value,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PlayerEvent {
    /// The loaded clip played to its end.
    Ended,
    /// mpv could not play the loaded clip.
    Failed(String),
    Paused(bool),
    Position(f64),
    Duration(f64),
}

impl PlayerEvent {
    pub fn parse(raw: &Value) -> Option<Self> {
        match raw.get("event")?.as_str()? {
            "property-change" => {
                let data = raw.get("data")?;
                match raw.get("id")?.as_u64()? {
                    OBS_PAUSE => data.as_bool().map(Self::Paused),
                    OBS_TIME_POS => data.as_f64().map(Self::Position),
                    OBS_DURATION => data.as_f64().map(Self::Duration),
                    _ => None,
                }
            }
            "end-file" => match raw.get("reason").and_then(Value::as_str) {
                Some("eof") => Some(Self::Ended),
                Some("error") => Some(Self::Failed(
                    raw.get("file_error")
                        .and_then(Value::as_str)
                        .unwrap_or("unknown error")
                        .to_string(),
                )),
                // "stop" and "redirect" follow our own loadfile/stop.
                _ => None,
            },
            _ => None,
        }
    }
}

/// What the transport bar shows.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Playback {
    pub clip_id: Option<i64>,
    pub paused: bool,
    pub position: f64,
    pub duration: Option<f64>,
}

#[derive(Clone)]
struct MpvHandle {
    tx: mpsc::Sender<Request>,
    /// Cancelled once either IO task exits.
    closed: CancellationToken,
}

impl MpvHandle {
    fn is_alive(&self) -> bool {
        !self.closed.is_cancelled() && !self.tx.is_closed()
    }

    async fn send(&self, command: Value) -> anyhow::Result<Value> {
        if !self.is_alive() {
            bail!("mpv connection lost");
        }
        let req_id = NEXT_REQ_ID.fetch_add(1, Ordering::Relaxed);
        let mut payload = serde_json::to_string(&json!({ "command": command, "request_id": req_id }))?;
        payload.push('\n');

        let (reply, reply_rx) = oneshot::channel();
        self.tx
            .send(Request {
                req_id,
                payload,
                reply,
            })
            .await
            .map_err(|_| anyhow!("mpv writer task gone"))?;

        tokio::time::timeout(IPC_TIMEOUT, reply_rx)
            .await
            .map_err(|_| anyhow!("mpv IPC timeout for req={}", req_id))?
            .map_err(|_| anyhow!("mpv reply channel dropped req={}", req_id))?
    }

    async fn set_property(&self, name: &str, value: Value) -> anyhow::Result<()> {
        self.send(json!(["set_property", name, value])).await?;
        Ok(())
    }
}

pub struct Player {
    mpv_path: Option<PathBuf>,
    volume: f32,
    autoplay: bool,
    socket_name: String,
    process: Option<Child>,
    handle: Option<MpvHandle>,
    event_tx: mpsc::Sender<MpvEvent>,
    playback: Playback,
}

impl Player {
    pub fn new(config: &PlayerConfig, event_tx: mpsc::Sender<MpvEvent>) -> Self {
        Self {
            mpv_path: config.mpv_path.clone(),
            volume: config.volume,
            autoplay: config.autoplay,
            socket_name: platform::mpv_socket_name(),
            process: None,
            handle: None,
            event_tx,
            playback: Playback::default(),
        }
    }

    /// Connected to a live mpv. False again once its connection drops.
    pub fn is_ready(&self) -> bool {
        self.handle.as_ref().is_some_and(MpvHandle::is_alive)
    }

    pub fn autoplay(&self) -> bool {
        self.autoplay
    }

    pub fn playback(&self) -> &Playback {
        &self.playback
    }

    /// Spawn mpv idle and connect to it.
    pub async fn start(&mut self) -> anyhow::Result<()> {
        self.shutdown().await;

        let binary = platform::find_mpv_binary(self.mpv_path.as_deref())
            .ok_or_else(|| anyhow!("mpv binary not found"))?;
        info!("[player] spawning {}", binary.display());

        let child = tokio::process::Command::new(&binary)
            .arg("--no-video")
            .arg("--idle=yes")
            .arg("--quiet")
            .arg(platform::mpv_socket_arg())
            .arg(format!(
                "--volume={}",
                (self.volume * 100.0).clamp(0.0, 100.0).round() as i64
            ))
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .with_context(|| format!("failed to spawn {}", binary.display()))?;
        self.process = Some(child);

        let handle = self.connect().await?;
        for (id, name) in [
            (OBS_PAUSE, "pause"),
            (OBS_TIME_POS, "time-pos"),
            (OBS_DURATION, "duration"),
        ] {
            if let Err(e) = handle.send(json!(["observe_property", id, name])).await {
                warn!("[player] observe {} failed: {}", name, e);
            }
        }
        self.handle = Some(handle);
        Ok(())
    }

    #[cfg(unix)]
    async fn connect(&self) -> anyhow::Result<MpvHandle> {
        let socket_path = PathBuf::from(&self.socket_name);
        for _ in 0..50 {
            tokio::time::sleep(Duration::from_millis(100)).await;
            if socket_path.exists() {
                break;
            }
        }
        if !socket_path.exists() {
            bail!("mpv IPC socket did not appear");
        }
        let stream = UnixStream::connect(&socket_path)
            .await
            .context("connecting to mpv socket")?;
        info!("[player] connected to {}", socket_path.display());

        let (read_half, write_half) = stream.into_split();
        Ok(self.start_io(BufReader::new(read_half), write_half))
    }

    #[cfg(windows)]
    async fn connect(&self) -> anyhow::Result<MpvHandle> {
        let pipe_path = format!(r"\\.\pipe\{}", self.socket_name);
        for _ in 0..50 {
            tokio::time::sleep(Duration::from_millis(100)).await;
            if let Ok(client) = ClientOptions::new().open(&pipe_path) {
                info!("[player] connected to {}", pipe_path);
                let (read_half, write_half) = tokio::io::split(client);
                return Ok(self.start_io(BufReader::new(read_half), write_half));
            }
        }
        bail!("mpv named pipe did not appear")
    }

    fn start_io<R, W>(&self, reader: BufReader<R>, writer: W) -> MpvHandle
    where
        R: tokio::io::AsyncRead + Unpin + Send + 'static,
        W: tokio::io::AsyncWrite + Unpin + Send + 'static,
    {
        let pending: Pending = Arc::new(Mutex::new(HashMap::new()));
        let (tx, rx) = mpsc::channel(64);
        let closed = CancellationToken::new();
        tokio::spawn(writer_task(writer, rx, Arc::clone(&pending), closed.clone()));
        tokio::spawn(reader_task(reader, pending, self.event_tx.clone(), closed.clone()));
        MpvHandle { tx, closed }
    }

    fn handle(&self) -> anyhow::Result<&MpvHandle> {
        let handle = self.handle.as_ref().context("player not started")?;
        if !handle.is_alive() {
            bail!("mpv connection lost");
        }
        Ok(handle)
    }

    /// Load `url` for `clip_id`. Starts paused when autoplay is off.
    pub async fn play(&mut self, clip_id: i64, url: &str) -> anyhow::Result<()> {
        let handle = self.handle()?.clone();
        handle.set_property("pause", json!(!self.autoplay)).await?;
        handle.send(json!(["loadfile", url, "replace"])).await?;
        debug!("[player] clip {} <- {}", clip_id, url);
        self.playback = Playback {
            clip_id: Some(clip_id),
            paused: !self.autoplay,
            position: 0.0,
            duration: None,
        };
        Ok(())
    }

    pub async fn stop(&mut self) {
        if let Some(handle) = &self.handle {
            if let Err(e) = handle.send(json!(["stop"])).await {
                debug!("[player] stop: {}", e);
            }
        }
        self.playback = Playback::default();
    }

    pub async fn toggle_pause(&mut self) -> anyhow::Result<()> {
        let paused = !self.playback.paused;
        self.handle()?.set_property("pause", json!(paused)).await?;
        self.playback.paused = paused;
        Ok(())
    }

    pub async fn seek_relative(&self, secs: f64) -> anyhow::Result<()> {
        if self.playback.clip_id.is_none() {
            return Ok(());
        }
        self.handle()?
            .send(json!(["seek", secs, "relative"]))
            .await?;
        Ok(())
    }

    /// Fold an mpv event into the playback state.
    pub fn apply(&mut self, event: &MpvEvent) -> Option<PlayerEvent> {
        let parsed = PlayerEvent::parse(&event.raw)?;
        match &parsed {
            PlayerEvent::Paused(p) => self.playback.paused = *p,
            PlayerEvent::Position(pos) => self.playback.position = *pos,
            PlayerEvent::Duration(d) => self.playback.duration = Some(*d),
            PlayerEvent::Ended | PlayerEvent::Failed(_) => {
                if self.playback.clip_id.is_none() {
                    return None;
                }
                if let Some(d) = self.playback.duration {
                    self.playback.position = d;
                }
            }
        }
        Some(parsed)
    }

    pub async fn shutdown(&mut self) {
        if let Some(handle) = self.handle.take().filter(MpvHandle::is_alive) {
            let _ = handle.send(json!(["quit"])).await;
        }
        if let Some(mut child) = self.process.take() {
            let _ = child.kill().await;
        }
        #[cfg(unix)]
        {
            let _ = tokio::fs::remove_file(&self.socket_name).await;
        }
    }
}

async fn reader_task<R>(
    mut reader: BufReader<R>,
    pending: Pending,
    event_tx: mpsc::Sender<MpvEvent>,
    closed: CancellationToken,
) where
    R: tokio::io::AsyncRead + Unpin,
{
    let _closed = closed.drop_guard();
    let mut line = String::new();
    let reason = loop {
        line.clear();
        match reader.read_line(&mut line).await {
            Ok(0) => break "connection closed".to_string(),
            Ok(_) => {
                let trimmed = line.trim();
                if trimmed.is_empty() {
                    continue;
                }
                let val: Value = match serde_json::from_str(trimmed) {
                    Ok(v) => v,
                    Err(e) => {
                        debug!("[player] bad json '{}': {}", trimmed, e);
                        continue;
                    }
                };

                match val.get("request_id").and_then(Value::as_u64) {
                    Some(req_id) => {
                        let Some(tx) = pending.lock().await.remove(&req_id) else {
                            continue;
                        };
                        let result = match val["error"].as_str() {
                            Some("success") => Ok(val),
                            other => Err(anyhow!("mpv error: {}", other.unwrap_or("unknown error"))),
                        };
                        let _ = tx.send(result);
                    }
                    None => {
                        if event_tx.send(MpvEvent { raw: val }).await.is_err() {
                            break "event receiver gone".to_string();
                        }
                    }
                }
            }
            Err(e) => break format!("read error: {}", e),
        }
    };

    debug!("[player] reader exiting: {}", reason);
    for (_, tx) in pending.lock().await.drain() {
        let _ = tx.send(Err(anyhow!("mpv IPC {}", reason)));
    }
}

async fn writer_task<W>(
    mut writer: W,
    mut rx: mpsc::Receiver<Request>,
    pending: Pending,
    closed: CancellationToken,
) where
    W: tokio::io::AsyncWrite + Unpin,
{
    let _closed = closed.drop_guard();
    while let Some(req) = rx.recv().await {
        // Register before writing so the reader can always match the reply.
        pending.lock().await.insert(req.req_id, req.reply);
        if let Err(e) = writer.write_all(req.payload.as_bytes()).await {
            warn!("[player] write failed: {}", e);
            if let Some(tx) = pending.lock().await.remove(&req.req_id) {
                let _ = tx.send(Err(anyhow!("mpv write error: {}", e)));
            }
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn player() -> (Player, mpsc::Receiver<MpvEvent>) {
        let (tx, rx) = mpsc::channel(8);
        (Player::new(&PlayerConfig::default(), tx), rx)
    }

    #[test]
    fn parses_end_of_file_reasons() {
        let eof = json!({ "event": "end-file", "reason": "eof", "playlist_entry_id": 1 });
        assert_eq!(PlayerEvent::parse(&eof), Some(PlayerEvent::Ended));

        let stopped = json!({ "event": "end-file", "reason": "stop" });
        assert_eq!(PlayerEvent::parse(&stopped), None);

        let failed = json!({ "event": "end-file", "reason": "error", "file_error": "loading failed" });
        assert_eq!(
            PlayerEvent::parse(&failed),
            Some(PlayerEvent::Failed("loading failed".into()))
        );
    }

    #[test]
    fn parses_observed_properties() {
        let pause = json!({ "event": "property-change", "id": OBS_PAUSE, "name": "pause", "data": true });
        assert_eq!(PlayerEvent::parse(&pause), Some(PlayerEvent::Paused(true)));

        let pos = json!({ "event": "property-change", "id": OBS_TIME_POS, "data": 12.5 });
        assert_eq!(PlayerEvent::parse(&pos), Some(PlayerEvent::Position(12.5)));

        // Unset duration before a file loads.
        let none = json!({ "event": "property-change", "id": OBS_DURATION, "data": null });
        assert_eq!(PlayerEvent::parse(&none), None);

        assert_eq!(PlayerEvent::parse(&json!({ "event": "idle" })), None);
    }

    #[test]
    fn apply_tracks_playback() {
        let (mut p, _rx) = player();
        let ev = |raw: Value| MpvEvent { raw };

        // Nothing loaded: an eof is ignored.
        assert_eq!(p.apply(&ev(json!({ "event": "end-file", "reason": "eof" }))), None);

        p.playback.clip_id = Some(7);
        p.apply(&ev(json!({ "event": "property-change", "id": OBS_DURATION, "data": 42.0 })));
        p.apply(&ev(json!({ "event": "property-change", "id": OBS_TIME_POS, "data": 3.0 })));
        assert_eq!(p.playback().position, 3.0);
        assert_eq!(p.playback().duration, Some(42.0));

        assert_eq!(
            p.apply(&ev(json!({ "event": "end-file", "reason": "eof" }))),
            Some(PlayerEvent::Ended)
        );
        assert_eq!(p.playback().position, 42.0);
    }

    #[tokio::test]
    async fn commands_fail_before_start() {
        let (mut p, _rx) = player();
        assert!(!p.is_ready());
        assert!(p.play(1, "http://example/1").await.is_err());
        assert!(p.toggle_pause().await.is_err());
        p.stop().await;
        assert_eq!(p.playback(), &Playback::default());
    }

    #[tokio::test]
    async fn lost_connection_is_not_ready() {
        let (mut p, _rx) = player();
        let (client, mpv) = tokio::io::duplex(1024);
        let (read_half, write_half) = tokio::io::split(client);
        p.handle = Some(p.start_io(BufReader::new(read_half), write_half));
        assert!(p.is_ready());

        // mpv goes away mid-session.
        drop(mpv);
        tokio::time::timeout(Duration::from_secs(1), async {
            while p.is_ready() {
                tokio::task::yield_now().await;
            }
        })
        .await
        .expect("reader notices the closed connection");

        let err = p.toggle_pause().await.unwrap_err();
        assert!(err.to_string().contains("connection lost"));
    }
}
