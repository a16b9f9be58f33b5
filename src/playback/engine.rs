//! Local playback engine boundary
//!
//! Commands are fire-and-forget. The engine reports back asynchronously with
//! [`EngineEvent`]s that the host feeds into
//! [`PlaybackStateMachine::handle_engine_event`](super::PlaybackStateMachine::handle_engine_event).
//! Each event carries the [`LoadToken`] of the load it belongs to, so events
//! from a torn-down load can be recognised and dropped.

use std::time::Duration;

use super::PlaybackError;
use crate::models::MediaInfo;

/// Identifies one engine load
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LoadToken(pub(crate) u64);

/// Local media player driven by the state machine
pub trait PlaybackEngine {
    /// Prepare `media` for playback starting at `start`, paused. Report
    /// readiness with [`EngineEventKind::Ready`].
    fn load(&mut self, token: LoadToken, media: &MediaInfo, start: Duration);
    fn play(&mut self);
    fn pause(&mut self);
    fn seek(&mut self, position: Duration);
    /// Tear down the current load
    fn stop(&mut self);
}

#[derive(Debug, Clone, PartialEq)]
pub enum EngineEventKind {
    /// Buffered enough to play; duration if the engine knows it
    Ready { duration: Option<Duration> },
    /// Periodic position report
    Position(Duration),
    /// Reached the end of the media
    Ended,
    Failed(PlaybackError),
}

#[derive(Debug, Clone, PartialEq)]
pub struct EngineEvent {
    pub token: LoadToken,
    pub kind: EngineEventKind,
}

impl EngineEvent {
    pub fn ready(token: LoadToken, duration: Option<Duration>) -> Self {
        Self {
            token,
            kind: EngineEventKind::Ready { duration },
        }
    }

    pub fn position(token: LoadToken, position: Duration) -> Self {
        Self {
            token,
            kind: EngineEventKind::Position(position),
        }
    }

    pub fn ended(token: LoadToken) -> Self {
        Self {
            token,
            kind: EngineEventKind::Ended,
        }
    }

    pub fn failed(token: LoadToken, error: PlaybackError) -> Self {
        Self {
            token,
            kind: EngineEventKind::Failed(error),
        }
    }
}
