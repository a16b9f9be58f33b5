//! Data structures and types for reelcast
//!
//! Contains the shared models used across the application organized by domain:
//! - **Media**: playable media descriptors decoded from the catalog
//! - **Playback**: local player lifecycle state and status snapshots
//! - **Presentation**: navigation bar style and device orientation
//! - **Cast**: Chromecast devices discovered through catt

use serde::{Deserialize, Serialize, Serializer};
use std::fmt;
use std::net::IpAddr;
use std::time::Duration;

/// Default MIME type for video sources without one
pub const DEFAULT_VIDEO_MIME_TYPE: &str = "video/mp4";
/// MIME type assigned to every text track
pub const DEFAULT_TRACK_MIME_TYPE: &str = "text/vtt";

pub const THUMBNAIL_WIDTH: u32 = 480;
pub const THUMBNAIL_HEIGHT: u32 = 720;
pub const POSTER_WIDTH: u32 = 780;
pub const POSTER_HEIGHT: u32 = 1200;

// =============================================================================
// Media Models
// =============================================================================

/// How the media is delivered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamType {
    None,
    #[default]
    Buffered,
    Live,
}

/// An image attached to media metadata
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaImage {
    pub url: String,
    pub width: u32,
    pub height: u32,
}

/// Descriptive metadata for a playable item
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MediaMetadata {
    pub title: String,
    /// Free-text description
    pub subtitle: Option<String>,
    pub studio: Option<String>,
    /// Large poster image
    pub poster_url: Option<String>,
    /// Thumbnail first, then poster
    pub images: Vec<MediaImage>,
}

/// Track kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackType {
    Audio,
    Text,
    Video,
    Unknown,
}

impl TrackType {
    /// Parse the catalog's `type` string, unknown values map to `Unknown`
    pub fn from_catalog(s: &str) -> Self {
        match s {
            "audio" => TrackType::Audio,
            "text" => TrackType::Text,
            "video" => TrackType::Video,
            _ => TrackType::Unknown,
        }
    }
}

/// Text track subtype
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TextTrackSubtype {
    Captions,
    Chapters,
    Descriptions,
    Metadata,
    Subtitles,
    Unknown,
}

impl TextTrackSubtype {
    /// Parse the catalog's `subtype` string
    pub fn from_catalog(s: &str) -> Self {
        match s {
            "captions" => TextTrackSubtype::Captions,
            "chapters" => TextTrackSubtype::Chapters,
            "descriptions" => TextTrackSubtype::Descriptions,
            "metadata" => TextTrackSubtype::Metadata,
            "subtitles" => TextTrackSubtype::Subtitles,
            _ => TextTrackSubtype::Unknown,
        }
    }
}

/// A side track (captions, alternate audio) attached to a media item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaTrack {
    pub id: u64,
    /// Absolute URL of the track file
    pub content_id: Option<String>,
    pub content_type: String,
    pub kind: TrackType,
    pub subtype: TextTrackSubtype,
    pub name: Option<String>,
    pub language: Option<String>,
}

/// Playable media descriptor handed to the engine or the remote receiver
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MediaInfo {
    /// Absolute content URL, doubles as the content identifier
    pub content_url: String,
    pub content_type: String,
    pub stream_type: StreamType,
    #[serde(serialize_with = "serialize_opt_secs")]
    pub duration: Option<Duration>,
    pub metadata: MediaMetadata,
    pub tracks: Vec<MediaTrack>,
}

impl MediaInfo {
    /// Create a buffered descriptor with empty metadata
    pub fn new(content_url: impl Into<String>, content_type: impl Into<String>) -> Self {
        Self {
            content_url: content_url.into(),
            content_type: content_type.into(),
            stream_type: StreamType::Buffered,
            duration: None,
            metadata: MediaMetadata::default(),
            tracks: Vec::new(),
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.metadata.title = title.into();
        self
    }

    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = Some(duration);
        self
    }

    pub fn title(&self) -> &str {
        &self.metadata.title
    }

    /// First image, used as the list thumbnail and splash image
    pub fn thumbnail(&self) -> Option<&MediaImage> {
        self.metadata.images.first()
    }
}

impl fmt::Display for MediaInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.duration {
            Some(d) => write!(f, "{} [{}]", self.metadata.title, format_duration(d)),
            None => write!(f, "{}", self.metadata.title),
        }
    }
}

// =============================================================================
// Playback Models
// =============================================================================

/// Local player lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlayerState {
    /// Splash screen, nothing loaded into the engine
    #[default]
    Stopped,
    /// Waiting for the engine to become ready
    Starting,
    Playing,
    Paused,
}

impl PlayerState {
    /// Playing or paused
    pub fn is_active(&self) -> bool {
        matches!(self, PlayerState::Playing | PlayerState::Paused)
    }
}

impl fmt::Display for PlayerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlayerState::Stopped => write!(f, "⏹ Stopped"),
            PlayerState::Starting => write!(f, "Starting..."),
            PlayerState::Playing => write!(f, "▶ Playing"),
            PlayerState::Paused => write!(f, "⏸ Paused"),
        }
    }
}

/// Snapshot of the playback state machine for display
#[derive(Debug, Clone, Serialize)]
pub struct PlaybackStatus {
    pub state: PlayerState,
    pub title: Option<String>,
    #[serde(serialize_with = "serialize_secs")]
    pub position: Duration,
    #[serde(serialize_with = "serialize_secs")]
    pub duration: Duration,
    pub playing_locally: bool,
    pub fullscreen: bool,
}

impl PlaybackStatus {
    /// Format position as HH:MM:SS
    pub fn format_position(&self) -> String {
        format_duration(self.position)
    }

    /// Format duration as HH:MM:SS
    pub fn format_duration(&self) -> String {
        format_duration(self.duration)
    }

    /// Get progress as fraction (0.0-1.0)
    pub fn progress(&self) -> f32 {
        if self.duration.is_zero() {
            0.0
        } else {
            (self.position.as_secs_f32() / self.duration.as_secs_f32()).min(1.0)
        }
    }
}

impl fmt::Display for PlaybackStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let surface = if self.playing_locally { "local" } else { "cast" };
        write!(
            f,
            "{} {} / {} ({})",
            self.state,
            self.format_position(),
            self.format_duration(),
            surface
        )
    }
}

// =============================================================================
// Presentation Models
// =============================================================================

/// Navigation bar chrome requested from the host
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavBarStyle {
    /// Overlaid on fullscreen video
    Transparent,
    /// Regular opaque chrome
    Standard,
}

/// Device orientation reported by the host
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Orientation {
    #[default]
    Portrait,
    Landscape,
}

impl Orientation {
    pub fn is_landscape(&self) -> bool {
        matches!(self, Orientation::Landscape)
    }
}

// =============================================================================
// Cast Models (Chromecast)
// =============================================================================

/// Chromecast device discovered on the network
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CastDevice {
    pub name: String,
    pub address: IpAddr,
    pub model: Option<String>,
}

impl CastDevice {
    /// Parse devices from catt scan output
    /// Format: "192.168.1.36 - Device Name - Google Inc. Chromecast"
    pub fn parse_catt_scan(output: &str) -> Vec<CastDevice> {
        output
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with("Scanning"))
            .filter_map(|line| {
                let mut parts = line.splitn(3, " - ");
                let address = parts.next()?.trim().parse::<IpAddr>().ok()?;
                let name = parts.next()?.trim().to_string();
                let model = parts.next().map(|m| m.trim().to_string());
                Some(CastDevice {
                    name,
                    address,
                    model,
                })
            })
            .collect()
    }
}

impl fmt::Display for CastDevice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.model {
            Some(model) => write!(f, "{} ({}) - {}", self.name, model, self.address),
            None => write!(f, "{} - {}", self.name, self.address),
        }
    }
}

// =============================================================================
// Utility Functions
// =============================================================================

/// Format a Duration as HH:MM:SS or MM:SS
pub fn format_duration(d: Duration) -> String {
    let total_secs = d.as_secs();
    let hours = total_secs / 3600;
    let mins = (total_secs % 3600) / 60;
    let secs = total_secs % 60;

    if hours > 0 {
        format!("{:02}:{:02}:{:02}", hours, mins, secs)
    } else {
        format!("{:02}:{:02}", mins, secs)
    }
}

fn serialize_secs<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_f64(d.as_secs_f64())
}

fn serialize_opt_secs<S: Serializer>(d: &Option<Duration>, s: S) -> Result<S::Ok, S::Error> {
    match d {
        Some(d) => s.serialize_some(&d.as_secs_f64()),
        None => s.serialize_none(),
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
