//! Chromecast control via catt CLI
//!
//! Discovers Chromecast devices and controls playback using catt.
//! catt provides a simpler interface than native Cast protocol.
//!
//! Commands for one session run in order on a background worker, so a
//! `pause` queued right after `cast` never overtakes it. Between commands the
//! same worker polls `catt status` and reports it as [`RemoteEvent::Status`].

use std::time::Duration;
use thiserror::Error;
use tokio::process::Command;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::models::{CastDevice, MediaInfo, TextTrackSubtype, TrackType};
use crate::playback::{PlaybackError, RemoteEvent, RemotePlayerState, RemoteSession, RemoteStatus};

/// Default catt binary looked up in PATH
pub const DEFAULT_CATT_BINARY: &str = "catt";

/// How often a session asks the receiver for its status
pub const STATUS_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Errors from catt invocations
#[derive(Debug, Error)]
pub enum CastError {
    #[error("catt not found. Install with: pip install catt")]
    NotFound,
    #[error("catt {action} failed: {stderr}")]
    CommandFailed { action: String, stderr: String },
    #[error("No Chromecast devices found")]
    NoDevices,
    #[error("catt I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// One queued catt invocation
#[derive(Debug)]
struct CattJob {
    args: Vec<String>,
    /// Report failure as a session error rather than a warning
    critical: bool,
}

/// A cast session with one Chromecast, driven through catt
pub struct CattSession {
    catt_path: String,
    device: String,
    jobs: mpsc::UnboundedSender<CattJob>,
}

impl CattSession {
    /// Open a session with `device`. Session failures arrive on the returned
    /// receiver.
    pub fn new(device: impl Into<String>) -> (Self, mpsc::UnboundedReceiver<RemoteEvent>) {
        Self::with_path(DEFAULT_CATT_BINARY, device)
    }

    /// Create with custom catt path
    pub fn with_path(
        catt_path: impl Into<String>,
        device: impl Into<String>,
    ) -> (Self, mpsc::UnboundedReceiver<RemoteEvent>) {
        Self::with_poll_interval(catt_path, device, STATUS_POLL_INTERVAL)
    }

    /// Create with custom catt path and status poll interval
    pub fn with_poll_interval(
        catt_path: impl Into<String>,
        device: impl Into<String>,
        poll_interval: Duration,
    ) -> (Self, mpsc::UnboundedReceiver<RemoteEvent>) {
        let catt_path = catt_path.into();
        let device = device.into();
        let (events, events_rx) = mpsc::unbounded_channel();
        let (jobs, jobs_rx) = mpsc::unbounded_channel();
        let worker = Worker {
            catt_path: catt_path.clone(),
            device: device.clone(),
            events,
            catt_missing: false,
        };
        tokio::spawn(worker.run(jobs_rx, poll_interval));

        let session = Self {
            catt_path,
            device,
            jobs,
        };
        (session, events_rx)
    }

    fn queue(&self, action: &[String], critical: bool) {
        let mut args = vec!["-d".to_string(), self.device.clone()];
        args.extend_from_slice(action);
        if self.jobs.send(CattJob { args, critical }).is_err() {
            warn!(device = %self.device, "catt worker stopped");
        }
    }

    /// Query the receiver's status
    pub async fn poll_status(&self) -> Result<RemoteStatus, CastError> {
        status(&self.catt_path, &self.device).await
    }
}

/// Query the status of `device` without holding a session
pub async fn status(catt_path: &str, device: &str) -> Result<RemoteStatus, CastError> {
    let args = ["-d", device, "status"];
    let stdout = run_catt(catt_path, &args[..]).await?;
    Ok(parse_catt_status(&stdout))
}

impl RemoteSession for CattSession {
    fn device_name(&self) -> &str {
        &self.device
    }

    fn load(&mut self, media: &MediaInfo, position: Duration, autoplay: bool) {
        info!(device = %self.device, url = %media.content_url, ?position, "Casting media");
        self.queue(&cast_args(media, position), true);
        if !autoplay {
            self.queue(&["pause".to_string()], false);
        }
    }

    fn play(&mut self) {
        self.queue(&["play".to_string()], false);
    }

    fn pause(&mut self) {
        self.queue(&["pause".to_string()], false);
    }

    fn seek(&mut self, position: Duration) {
        self.queue(&["seek".to_string(), position.as_secs().to_string()], false);
    }

    fn stop(&mut self) {
        self.queue(&["stop".to_string()], false);
    }

    fn enqueue(&mut self, media: &MediaInfo) {
        info!(device = %self.device, url = %media.content_url, "Adding media to receiver queue");
        self.queue(&["add".to_string(), media.content_url.clone()], false);
    }
}

/// Arguments for `catt cast`, including the first caption track
fn cast_args(media: &MediaInfo, position: Duration) -> Vec<String> {
    let mut args = vec!["cast".to_string()];
    if !position.is_zero() {
        args.push("-t".to_string());
        args.push(position.as_secs().to_string());
    }
    let subtitles = media.tracks.iter().find(|t| {
        t.kind == TrackType::Text
            && matches!(
                t.subtype,
                TextTrackSubtype::Subtitles | TextTrackSubtype::Captions
            )
    });
    if let Some(url) = subtitles.and_then(|t| t.content_id.as_ref()) {
        args.push("-s".to_string());
        args.push(url.clone());
    }
    args.push(media.content_url.clone());
    args
}

/// Runs one session's catt commands in order and polls status in between.
/// Exits once the session is dropped and its queued commands are done.
struct Worker {
    catt_path: String,
    device: String,
    events: mpsc::UnboundedSender<RemoteEvent>,
    /// Set after the binary was not found; polling stops
    catt_missing: bool,
}

impl Worker {
    async fn run(mut self, mut jobs: mpsc::UnboundedReceiver<CattJob>, poll_interval: Duration) {
        let mut poll = tokio::time::interval(poll_interval);
        poll.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                job = jobs.recv() => match job {
                    Some(job) => self.run_job(job).await,
                    None => return,
                },
                _ = poll.tick(), if !self.catt_missing => {
                    if !self.poll_status().await {
                        return;
                    }
                }
            }
        }
    }

    async fn run_job(&mut self, job: CattJob) {
        debug!(args = ?job.args, "Running catt");
        let Err(e) = run_catt(&self.catt_path, &job.args[..]).await else {
            return;
        };
        if matches!(e, CastError::NotFound) {
            self.catt_missing = true;
        }
        if job.critical {
            let _ = self
                .events
                .send(RemoteEvent::Failed(PlaybackError::Remote(e.to_string())));
        } else {
            warn!(error = %e, "catt command failed");
        }
    }

    /// Returns false once nobody listens for events
    async fn poll_status(&mut self) -> bool {
        let event = match status(&self.catt_path, &self.device).await {
            Ok(status) => RemoteEvent::Status(status),
            Err(CastError::NotFound) => {
                self.catt_missing = true;
                RemoteEvent::Failed(PlaybackError::Remote(CastError::NotFound.to_string()))
            }
            Err(e) => {
                debug!(device = %self.device, error = %e, "Cast status poll failed");
                return true;
            }
        };
        self.events.send(event).is_ok()
    }
}

async fn run_catt<S: AsRef<std::ffi::OsStr>>(catt_path: &str, args: &[S]) -> Result<String, CastError> {
    let output = Command::new(catt_path)
        .args(args)
        .output()
        .await
        .map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                CastError::NotFound
            } else {
                CastError::Io(e)
            }
        })?;

    if output.status.success() {
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    } else {
        let action = args
            .get(2)
            .or_else(|| args.first())
            .map(|a| a.as_ref().to_string_lossy().into_owned())
            .unwrap_or_default();
        Err(CastError::CommandFailed {
            action,
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        })
    }
}

/// Discover Chromecast devices on the local network
pub async fn scan(catt_path: &str) -> Result<Vec<CastDevice>, CastError> {
    let output = Command::new(catt_path)
        .arg("scan")
        .output()
        .await
        .map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                CastError::NotFound
            } else {
                CastError::Io(e)
            }
        })?;

    let stdout = String::from_utf8_lossy(&output.stdout);
    let devices = CastDevice::parse_catt_scan(&stdout);
    if !devices.is_empty() {
        return Ok(devices);
    }

    // catt sometimes reports on stderr
    let stderr = String::from_utf8_lossy(&output.stderr);
    let devices = CastDevice::parse_catt_scan(&stderr);
    if devices.is_empty() {
        Err(CastError::NoDevices)
    } else {
        Ok(devices)
    }
}

/// Parse `catt status` output
///
/// ```text
/// Title: Big Buck Bunny
/// Time: 0:01:05 / 0:09:56 (10%)
/// Volume: 100
/// State: PLAYING
/// ```
///
/// Older catt versions print `Current time`/`Duration` in seconds instead of
/// `Time`. Anything unrecognised leaves the status idle.
pub fn parse_catt_status(output: &str) -> RemoteStatus {
    let mut status = RemoteStatus {
        state: RemotePlayerState::Idle,
        position: Duration::ZERO,
        duration: None,
        title: None,
    };

    for line in output.lines() {
        let Some((key, value)) = line.trim().split_once(':') else {
            continue;
        };
        let value = value.trim();
        match key.trim().to_lowercase().as_str() {
            "state" => status.state = RemotePlayerState::from_str_loose(value),
            "title" => status.title = Some(value.to_string()),
            "time" => {
                let mut parts = value.split('/');
                if let Some(position) = parts.next().and_then(parse_clock) {
                    status.position = position;
                }
                if let Some(duration) = parts
                    .next()
                    .and_then(|rest| rest.split_whitespace().next())
                    .and_then(parse_clock)
                {
                    status.duration = Some(duration);
                }
            }
            "current time" => {
                if let Some(position) = parse_seconds(value) {
                    status.position = position;
                }
            }
            "duration" => status.duration = parse_seconds(value),
            _ => {}
        }
    }

    status
}

fn parse_seconds(value: &str) -> Option<Duration> {
    value
        .parse::<f64>()
        .ok()
        .filter(|s| s.is_finite() && *s >= 0.0)
        .map(Duration::from_secs_f64)
}

/// `H:MM:SS` or `MM:SS`
fn parse_clock(value: &str) -> Option<Duration> {
    let mut total = 0u64;
    for part in value.trim().split(':') {
        total = total
            .checked_mul(60)?
            .checked_add(part.parse::<u64>().ok()?)?;
    }
    Some(Duration::from_secs(total))
}
