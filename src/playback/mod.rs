//! Playback control
//!
//! - `machine`: the local player state machine and remote handoff
//! - `engine`: boundary to the local playback engine
//! - `remote`: boundary to a remote cast session
//! - `delegate`: host callbacks for presentation side effects

pub mod delegate;
pub mod engine;
pub mod machine;
pub mod remote;

use thiserror::Error;

pub use delegate::PlaybackDelegate;
pub use engine::{EngineEvent, EngineEventKind, LoadToken, PlaybackEngine};
pub use machine::PlaybackStateMachine;
pub use remote::{RemoteEvent, RemotePlayerState, RemoteSession, RemoteStatus};

/// Playback failure surfaced to the host
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PlaybackError {
    #[error("Media cannot be played: {0}")]
    Unplayable(String),

    #[error("Playback engine failed: {0}")]
    Engine(String),

    #[error("Remote session failed: {0}")]
    Remote(String),
}
