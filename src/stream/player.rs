//! Local Player - mpv playback engine
//!
//! Launches mpv paused with `--input-ipc-server` and drives it over the JSON
//! IPC socket. Property changes and `end-file` notifications are translated
//! into [`EngineEvent`]s tagged with the load they belong to.

use serde::Deserialize;
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::UnixStream;
use tokio::process::{Child, Command};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::models::{MediaInfo, TrackType};
use crate::playback::{EngineEvent, LoadToken, PlaybackEngine, PlaybackError};

/// Default mpv binary looked up in PATH
pub const DEFAULT_MPV_BINARY: &str = "mpv";

const OBSERVE_TIME_POS: u64 = 1;
const OBSERVE_DURATION: u64 = 2;
const CONNECT_ATTEMPTS: u32 = 50;
const CONNECT_INTERVAL: Duration = Duration::from_millis(100);

/// Errors from local player operations
#[derive(Debug, Error)]
pub enum PlayerError {
    #[error("Player '{0}' not found. Install it first.")]
    NotFound(String),
    #[error("Failed to start player: {0}")]
    StartFailed(#[from] std::io::Error),
    #[error("Player IPC unavailable: {0}")]
    Ipc(String),
}

/// mpv-backed [`PlaybackEngine`]
pub struct MpvEngine {
    binary: String,
    events: mpsc::UnboundedSender<EngineEvent>,
    /// IPC commands for the running instance
    commands: Option<mpsc::UnboundedSender<Value>>,
    child: Option<Child>,
    task: Option<JoinHandle<()>>,
    socket: Option<PathBuf>,
}

impl MpvEngine {
    /// Create an engine using `binary`. Events for every load arrive on the
    /// returned receiver.
    pub fn new(binary: impl Into<String>) -> (Self, mpsc::UnboundedReceiver<EngineEvent>) {
        let (events, rx) = mpsc::unbounded_channel();
        let engine = Self {
            binary: binary.into(),
            events,
            commands: None,
            child: None,
            task: None,
            socket: None,
        };
        (engine, rx)
    }

    /// Create an engine using `mpv` from PATH
    pub fn mpv() -> (Self, mpsc::UnboundedReceiver<EngineEvent>) {
        Self::new(DEFAULT_MPV_BINARY)
    }

    pub fn binary(&self) -> &str {
        &self.binary
    }

    /// Check if the player is available on the system
    pub async fn is_available(&self) -> bool {
        if self.binary.contains('/') {
            return Path::new(&self.binary).exists();
        }

        Command::new("which")
            .arg(&self.binary)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
            .map(|s| s.success())
            .unwrap_or(false)
    }

    fn spawn_player(&self, media: &MediaInfo, start: Duration, socket: &Path) -> Result<Child, PlayerError> {
        let mut cmd = Command::new(&self.binary);
        cmd.arg(&media.content_url)
            .arg(format!("--input-ipc-server={}", socket.display()))
            .arg("--pause")
            .arg(format!("--start={:.3}", start.as_secs_f64()))
            .arg("--force-window=immediate")
            .arg("--no-terminal");
        if !media.title().is_empty() {
            cmd.arg(format!("--force-media-title={}", media.title()));
        }
        for track in &media.tracks {
            if let (TrackType::Text, Some(url)) = (track.kind, &track.content_id) {
                cmd.arg(format!("--sub-file={}", url));
            }
        }

        cmd.stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true);

        cmd.spawn().map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                PlayerError::NotFound(self.binary.clone())
            } else {
                PlayerError::StartFailed(e)
            }
        })
    }

    fn send(&self, command: Value) {
        match &self.commands {
            Some(tx) => {
                if tx.send(command).is_err() {
                    debug!("mpv IPC task already finished");
                }
            }
            None => debug!("No mpv instance running"),
        }
    }
}

impl PlaybackEngine for MpvEngine {
    fn load(&mut self, token: LoadToken, media: &MediaInfo, start: Duration) {
        self.stop();

        let socket = socket_path(token);
        let _ = std::fs::remove_file(&socket);

        let child = match self.spawn_player(media, start, &socket) {
            Ok(child) => child,
            Err(e) => {
                warn!(error = %e, "Failed to launch mpv");
                let error = PlaybackError::Engine(e.to_string());
                let _ = self.events.send(EngineEvent::failed(token, error));
                return;
            }
        };
        info!(url = %media.content_url, binary = %self.binary, "Launched mpv");

        let (tx, rx) = mpsc::unbounded_channel();
        self.task = Some(tokio::spawn(run_ipc(
            socket.clone(),
            token,
            rx,
            self.events.clone(),
        )));
        self.commands = Some(tx);
        self.child = Some(child);
        self.socket = Some(socket);
    }

    fn play(&mut self) {
        self.send(json!({ "command": ["set_property", "pause", false] }));
    }

    fn pause(&mut self) {
        self.send(json!({ "command": ["set_property", "pause", true] }));
    }

    fn seek(&mut self, position: Duration) {
        self.send(json!({ "command": ["seek", position.as_secs_f64(), "absolute"] }));
    }

    fn stop(&mut self) {
        self.commands = None;
        if let Some(task) = self.task.take() {
            task.abort();
        }
        if let Some(mut child) = self.child.take() {
            if let Err(e) = child.start_kill() {
                debug!(error = %e, "mpv already exited");
            }
        }
        if let Some(socket) = self.socket.take() {
            let _ = std::fs::remove_file(socket);
        }
    }
}

impl Drop for MpvEngine {
    fn drop(&mut self) {
        self.stop();
    }
}

fn socket_path(token: LoadToken) -> PathBuf {
    std::env::temp_dir().join(format!(
        "reelcast-mpv-{}-{}.sock",
        std::process::id(),
        token.0
    ))
}

// =============================================================================
// IPC
// =============================================================================

/// Raw message from the mpv IPC socket
#[derive(Debug, Deserialize)]
struct IpcMessage {
    event: Option<String>,
    id: Option<u64>,
    data: Option<Value>,
    reason: Option<String>,
    file_error: Option<String>,
}

/// mpv notifications the engine cares about
#[derive(Debug, Clone, PartialEq)]
enum IpcEvent {
    TimePos(Duration),
    Duration(Duration),
    PlaybackRestart,
    EndFile { reason: String, error: Option<String> },
}

fn parse_ipc_line(line: &str) -> Option<IpcEvent> {
    let msg: IpcMessage = serde_json::from_str(line).ok()?;
    match msg.event.as_deref()? {
        "property-change" => {
            let secs = msg.data.as_ref().and_then(Value::as_f64)?;
            if !secs.is_finite() || secs < 0.0 {
                return None;
            }
            let value = Duration::from_secs_f64(secs);
            match msg.id? {
                OBSERVE_TIME_POS => Some(IpcEvent::TimePos(value)),
                OBSERVE_DURATION => Some(IpcEvent::Duration(value)),
                _ => None,
            }
        }
        "playback-restart" => Some(IpcEvent::PlaybackRestart),
        "end-file" => Some(IpcEvent::EndFile {
            reason: msg.reason.unwrap_or_default(),
            error: msg.file_error,
        }),
        _ => None,
    }
}

/// Turns IPC notifications for one load into engine events
#[derive(Debug)]
struct EventTranslator {
    token: LoadToken,
    duration: Option<Duration>,
    ready: bool,
    finished: bool,
}

impl EventTranslator {
    fn new(token: LoadToken) -> Self {
        Self {
            token,
            duration: None,
            ready: false,
            finished: false,
        }
    }

    fn translate(&mut self, event: IpcEvent) -> Option<EngineEvent> {
        if self.finished {
            return None;
        }
        match event {
            IpcEvent::Duration(d) => {
                self.duration = Some(d);
                None
            }
            // mpv emits playback-restart once, possibly before the client
            // subscribed. The first reported position proves the file loaded.
            IpcEvent::TimePos(_) if !self.ready => {
                self.ready = true;
                Some(EngineEvent::ready(self.token, self.duration))
            }
            IpcEvent::TimePos(p) => Some(EngineEvent::position(self.token, p)),
            IpcEvent::PlaybackRestart if !self.ready => {
                self.ready = true;
                Some(EngineEvent::ready(self.token, self.duration))
            }
            IpcEvent::PlaybackRestart => None,
            IpcEvent::EndFile { reason, error } => {
                self.finished = true;
                match reason.as_str() {
                    "error" => {
                        let detail = error.unwrap_or_else(|| "unknown error".to_string());
                        Some(EngineEvent::failed(
                            self.token,
                            PlaybackError::Unplayable(detail),
                        ))
                    }
                    // "quit" is the user closing the window
                    _ => Some(EngineEvent::ended(self.token)),
                }
            }
        }
    }

    /// The socket closed. A load that never finished counts as a failure.
    fn disconnected(&mut self) -> Option<EngineEvent> {
        if self.finished {
            return None;
        }
        self.finished = true;
        let error = PlaybackError::Engine("mpv exited unexpectedly".to_string());
        Some(EngineEvent::failed(self.token, error))
    }

    fn is_finished(&self) -> bool {
        self.finished
    }
}

async fn connect(socket: &Path) -> Result<UnixStream, PlayerError> {
    let mut last_error = None;
    for _ in 0..CONNECT_ATTEMPTS {
        match UnixStream::connect(socket).await {
            Ok(stream) => return Ok(stream),
            Err(e) => last_error = Some(e),
        }
        tokio::time::sleep(CONNECT_INTERVAL).await;
    }
    Err(PlayerError::Ipc(
        last_error
            .map(|e| e.to_string())
            .unwrap_or_else(|| "connection timed out".to_string()),
    ))
}

async fn run_ipc(
    socket: PathBuf,
    token: LoadToken,
    mut commands: mpsc::UnboundedReceiver<Value>,
    events: mpsc::UnboundedSender<EngineEvent>,
) {
    let stream = match connect(&socket).await {
        Ok(stream) => stream,
        Err(e) => {
            warn!(error = %e, "Could not reach mpv");
            let _ = events.send(EngineEvent::failed(token, PlaybackError::Engine(e.to_string())));
            return;
        }
    };
    debug!(socket = %socket.display(), "Connected to mpv");

    let (reader, mut writer) = stream.into_split();
    let observe = [
        json!({ "command": ["observe_property", OBSERVE_TIME_POS, "time-pos"] }),
        json!({ "command": ["observe_property", OBSERVE_DURATION, "duration"] }),
    ];
    for command in &observe {
        if let Err(e) = write_command(&mut writer, command).await {
            warn!(error = %e, "Failed to subscribe to mpv properties");
        }
    }

    let mut lines = BufReader::new(reader).lines();
    let mut translator = EventTranslator::new(token);

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let event = match line {
                    Ok(Some(line)) => parse_ipc_line(&line).and_then(|e| translator.translate(e)),
                    Ok(None) | Err(_) => translator.disconnected(),
                };
                if let Some(event) = event {
                    if events.send(event).is_err() {
                        return;
                    }
                }
                if translator.is_finished() {
                    return;
                }
            }
            Some(command) = commands.recv() => {
                if let Err(e) = write_command(&mut writer, &command).await {
                    warn!(error = %e, "Failed to send mpv command");
                }
            }
        }
    }
}

async fn write_command(
    writer: &mut tokio::net::unix::OwnedWriteHalf,
    command: &Value,
) -> std::io::Result<()> {
    let mut line = command.to_string();
    line.push('\n');
    writer.write_all(line.as_bytes()).await
}
