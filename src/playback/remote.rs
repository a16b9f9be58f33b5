//! Remote cast session boundary

use serde::Serialize;
use std::fmt;
use std::time::Duration;

use super::PlaybackError;
use crate::models::MediaInfo;

/// A connected remote receiver that can take over playback
pub trait RemoteSession {
    fn device_name(&self) -> &str;
    /// Start `media` on the receiver at `position`
    fn load(&mut self, media: &MediaInfo, position: Duration, autoplay: bool);
    fn play(&mut self);
    fn pause(&mut self);
    fn seek(&mut self, position: Duration);
    fn stop(&mut self);
    /// Append `media` to the receiver's queue, after what is playing now
    fn enqueue(&mut self, media: &MediaInfo);
}

/// Player state as reported by the receiver
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RemotePlayerState {
    Idle,
    Buffering,
    Playing,
    Paused,
}

impl RemotePlayerState {
    /// Parse a receiver state name, unknown names count as idle
    pub fn from_str_loose(s: &str) -> Self {
        match s.trim().to_uppercase().as_str() {
            "PLAYING" => RemotePlayerState::Playing,
            "PAUSED" => RemotePlayerState::Paused,
            "BUFFERING" | "LOADING" => RemotePlayerState::Buffering,
            _ => RemotePlayerState::Idle,
        }
    }
}

impl fmt::Display for RemotePlayerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RemotePlayerState::Idle => write!(f, "Idle"),
            RemotePlayerState::Buffering => write!(f, "Buffering..."),
            RemotePlayerState::Playing => write!(f, "▶ Playing"),
            RemotePlayerState::Paused => write!(f, "⏸ Paused"),
        }
    }
}

/// Receiver status snapshot
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteStatus {
    pub state: RemotePlayerState,
    pub position: Duration,
    pub duration: Option<Duration>,
    pub title: Option<String>,
}

/// Signals from the remote session
#[derive(Debug, Clone, PartialEq)]
pub enum RemoteEvent {
    Status(RemoteStatus),
    Failed(PlaybackError),
    SessionEnded,
}
