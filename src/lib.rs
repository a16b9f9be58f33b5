//! reelcast - browse a video catalog and play it locally or on a Chromecast
//!
//! # Modules
//!
//! - `models` - Media descriptors, player state, cast devices
//! - `catalog` - Media hierarchy tree, document parsing and asynchronous loading
//! - `api` - HTTP client for catalog documents
//! - `playback` - Playback state machine with local/remote handoff
//! - `stream` - mpv engine and catt cast session adapters
//! - `config` - Config file handling
//! - `logging` - tracing subscriber setup
//! - `cli` / `commands` - Command line interface

pub mod api;
pub mod catalog;
pub mod cli;
pub mod commands;
pub mod config;
pub mod logging;
pub mod models;
pub mod playback;
pub mod stream;

// Re-export commonly used types
pub use models::{
    CastDevice, MediaImage, MediaInfo, MediaMetadata, MediaTrack, NavBarStyle, Orientation,
    PlaybackStatus, PlayerState, StreamType,
};

pub use api::CatalogClient;
pub use catalog::{ItemRef, LoadError, MediaHierarchyLoader, MediaItem, MediaTree};
pub use playback::{PlaybackDelegate, PlaybackEngine, PlaybackError, PlaybackStateMachine, RemoteSession};
