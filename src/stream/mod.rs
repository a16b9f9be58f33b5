//! Playback adapters
//!
//! - Player: local playback through mpv's JSON IPC
//! - Cast: Chromecast discovery and control via catt

pub mod cast;
pub mod player;

pub use cast::{CastError, CattSession};
pub use player::{MpvEngine, PlayerError};
