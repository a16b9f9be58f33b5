//! CLI - Command Line Interface for reelcast
//!
//! Every command is scriptable. All output is JSON-parseable with `--json`.
//!
//! # Examples
//!
//! ```bash
//! # Browse the catalog tree
//! reelcast browse
//! reelcast browse https://example.com/catalog.json --json
//!
//! # Inspect and play an item
//! reelcast info "Big Buck Bunny"
//! reelcast play "Big Buck Bunny" --start 60
//! reelcast play "Big Buck Bunny" --device "Living Room TV"
//! ```

use clap::{Args, Parser, Subcommand};
use serde::{Deserialize, Serialize};
use std::io::IsTerminal;
use std::path::PathBuf;

use crate::catalog::ItemRef;
use crate::models::MediaInfo;

// =============================================================================
// Exit Codes
// =============================================================================

/// Exit codes for CLI operations (semantic for scripting)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ExitCode {
    /// Success
    Success = 0,
    /// General error
    Error = 1,
    /// Invalid arguments
    InvalidArgs = 2,
    /// Network error
    NetworkError = 3,
    /// Device not found
    DeviceNotFound = 4,
    /// Catalog item not found
    NotFound = 5,
    /// Cast failed
    CastFailed = 6,
    /// Local playback failed
    PlaybackFailed = 7,
    /// Catalog document could not be decoded
    BadCatalog = 8,
}

impl From<ExitCode> for i32 {
    fn from(code: ExitCode) -> i32 {
        code as i32
    }
}

impl From<ExitCode> for std::process::ExitCode {
    fn from(code: ExitCode) -> std::process::ExitCode {
        std::process::ExitCode::from(code as u8)
    }
}

// =============================================================================
// Main CLI Structure
// =============================================================================

/// reelcast - browse a video catalog and play it locally or on a Chromecast
#[derive(Parser, Debug)]
#[command(
    name = "reelcast",
    version,
    about = "Browse a video catalog and play it locally or on a Chromecast",
    long_about = "Loads a hierarchical video catalog from a URL, plays items in mpv \
                  and hands playback over to a Chromecast through catt.",
    after_help = "EXAMPLES:\n\
                  reelcast browse                         Show the catalog tree\n\
                  reelcast info \"Big Buck Bunny\"          Show item details\n\
                  reelcast play \"Big Buck Bunny\" -d TV    Cast an item\n\
                  reelcast devices --json                 List Chromecasts"
)]
pub struct Cli {
    /// Output format as JSON (default for non-TTY)
    #[arg(long, short = 'j', global = true)]
    pub json: bool,

    /// Target Chromecast device name
    #[arg(long, short = 'd', global = true)]
    pub device: Option<String>,

    /// Suppress non-essential output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(long, short = 'v', global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Path to config file
    #[arg(long, short = 'c', global = true)]
    pub config: Option<PathBuf>,

    /// Catalog document URL (overrides config and REELCAST_CATALOG_URL)
    #[arg(long, global = true)]
    pub catalog: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    /// Check if JSON output should be used
    pub fn should_json(&self) -> bool {
        self.json || !std::io::stdout().is_terminal()
    }
}

// =============================================================================
// Subcommands
// =============================================================================

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Show the catalog tree
    #[command(visible_alias = "b")]
    Browse(BrowseCmd),

    /// Show details for a catalog item
    #[command(visible_alias = "i")]
    Info(InfoCmd),

    /// Play a catalog item locally or on a Chromecast
    #[command(visible_alias = "p")]
    Play(PlayCmd),

    /// Discover Chromecast devices
    #[command(visible_alias = "dev")]
    Devices(DevicesCmd),
}

// =============================================================================
// Browse Command
// =============================================================================

/// Load the catalog and print its groups and items
#[derive(Args, Debug)]
pub struct BrowseCmd {
    /// Catalog URL (defaults to the configured catalog)
    pub url: Option<String>,

    /// Only show groups up to this depth
    #[arg(long)]
    pub depth: Option<usize>,
}

// =============================================================================
// Info Command
// =============================================================================

/// Get detailed information about a catalog item
#[derive(Args, Debug)]
pub struct InfoCmd {
    /// Item title (case-insensitive)
    #[arg(required = true)]
    pub title: String,
}

// =============================================================================
// Play Command
// =============================================================================

/// Play a catalog item. Casts when a device is given, plays in mpv otherwise.
///
/// While playing, type a command and press enter:
/// `p` play/pause, `s <secs>` seek, `x` stop, `c <device>` move to a
/// Chromecast, `l` back to local playback, `a [title]` add to the
/// Chromecast's queue, `q` quit.
///
/// While casting, stopping keeps the session open. Pressing `p` then asks
/// whether to play the item again (`y`) or add it to the queue (`a`).
#[derive(Args, Debug)]
pub struct PlayCmd {
    /// Item title (case-insensitive)
    #[arg(required = true)]
    pub title: String,

    /// Target device name (overrides --device global flag)
    #[arg(long = "to")]
    pub device: Option<String>,

    /// Start position in seconds
    #[arg(long, short = 's', default_value = "0")]
    pub start: f64,

    /// Load paused instead of starting right away
    #[arg(long)]
    pub paused: bool,

    /// mpv binary to use
    #[arg(long)]
    pub player: Option<String>,

    /// catt binary to use when casting
    #[arg(long)]
    pub catt: Option<String>,
}

impl PlayCmd {
    /// Get effective device name (command-specific or global)
    pub fn effective_device<'a>(&'a self, global: &'a Option<String>) -> Option<&'a str> {
        self.device.as_deref().or(global.as_deref())
    }
}

// =============================================================================
// Devices Command
// =============================================================================

#[derive(Args, Debug)]
pub struct DevicesCmd {
    /// catt binary to use (defaults to the configured one)
    #[arg(long)]
    pub catt: Option<String>,
}

// =============================================================================
// Interactive playback input
// =============================================================================

/// A line typed while `play` is running
#[derive(Debug, Clone, PartialEq)]
pub enum PlayInput {
    TogglePause,
    Seek(f64),
    Stop,
    Cast(String),
    Local,
    /// Confirm playing the stopped item again on the receiver
    PlayNow,
    /// Add an item, or the current one, to the receiver's queue
    Enqueue(Option<String>),
    Quit,
    Invalid(String),
}

impl PlayInput {
    pub fn parse(line: &str) -> Option<Self> {
        let line = line.trim();
        if line.is_empty() {
            return None;
        }
        let (cmd, arg) = match line.split_once(char::is_whitespace) {
            Some((cmd, arg)) => (cmd, arg.trim()),
            None => (line, ""),
        };
        let input = match (cmd, arg) {
            ("p" | "pause" | "play", _) => PlayInput::TogglePause,
            ("s" | "seek", secs) => match parse_seek(secs) {
                Some(secs) => PlayInput::Seek(secs),
                None => PlayInput::Invalid(line.to_string()),
            },
            ("x" | "stop", _) => PlayInput::Stop,
            ("c" | "cast", device) if !device.is_empty() => PlayInput::Cast(device.to_string()),
            ("l" | "local", _) => PlayInput::Local,
            ("y" | "now", _) => PlayInput::PlayNow,
            ("a" | "add", "") => PlayInput::Enqueue(None),
            ("a" | "add", title) => PlayInput::Enqueue(Some(title.to_string())),
            ("q" | "quit", _) => PlayInput::Quit,
            _ => PlayInput::Invalid(line.to_string()),
        };
        Some(input)
    }
}

/// Longest seek target accepted from the prompt (one week)
const MAX_SEEK_SECS: f64 = 7.0 * 24.0 * 3600.0;

/// Seconds, `MM:SS` or `HH:MM:SS`
fn parse_seek(s: &str) -> Option<f64> {
    let secs = if s.contains(':') {
        let mut total = 0.0;
        for part in s.split(':') {
            total = total * 60.0 + part.parse::<u64>().ok()? as f64;
        }
        total
    } else {
        s.parse::<f64>().ok()?
    };
    (secs.is_finite() && (0.0..=MAX_SEEK_SECS).contains(&secs)).then_some(secs)
}

// =============================================================================
// JSON Output Types
// =============================================================================

/// Generic JSON output wrapper with status
#[derive(Debug, Serialize, Deserialize)]
pub struct JsonOutput<T: Serialize> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "is_zero")]
    pub exit_code: i32,
}

fn is_zero(n: &i32) -> bool {
    *n == 0
}

impl<T: Serialize> JsonOutput<T> {
    /// Create success output with data
    pub fn success(data: T) -> Self {
        Self {
            data: Some(data),
            error: None,
            exit_code: 0,
        }
    }

    /// Create error output (no data)
    pub fn error_msg(msg: impl Into<String>, code: ExitCode) -> JsonOutput<()> {
        JsonOutput::<()> {
            data: None,
            error: Some(msg.into()),
            exit_code: code.into(),
        }
    }
}

/// Catalog tree node for `browse --json`
#[derive(Debug, Serialize)]
pub struct CatalogNode {
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<CatalogNode>,
}

impl CatalogNode {
    /// Convert a subtree, keeping groups down to `max_depth`
    pub fn from_item(item: ItemRef<'_>, max_depth: Option<usize>) -> Self {
        let children = if max_depth.map_or(true, |d| item.depth() < d) {
            item.children()
                .into_iter()
                .map(|child| CatalogNode::from_item(child, max_depth))
                .collect()
        } else {
            Vec::new()
        };
        Self {
            title: item.title().to_string(),
            image: item.image_url().map(str::to_string),
            url: item.media_info().map(|m| m.content_url.clone()),
            children,
        }
    }
}

/// Catalog response for `browse`
#[derive(Debug, Serialize)]
pub struct CatalogResponse {
    pub title: String,
    pub url: String,
    pub items: Vec<CatalogNode>,
}

/// Item details for `info`
#[derive(Debug, Serialize)]
pub struct InfoResponse<'a> {
    pub path: Vec<&'a str>,
    pub media: &'a MediaInfo,
}

/// Final outcome of `play`
#[derive(Debug, Serialize)]
pub struct PlayResponse {
    pub status: &'static str,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device: Option<String>,
    pub position: f64,
}

// =============================================================================
// Output Helpers
// =============================================================================

/// Output handler for consistent formatting
pub struct Output {
    pub json: bool,
    pub quiet: bool,
}

impl Output {
    pub fn new(cli: &Cli) -> Self {
        Self {
            json: cli.should_json(),
            quiet: cli.quiet,
        }
    }

    /// Print success data
    pub fn print<T: Serialize>(&self, data: T) -> anyhow::Result<()> {
        if self.json {
            let output = JsonOutput::success(data);
            println!("{}", serde_json::to_string_pretty(&output)?);
        } else {
            println!("{}", serde_json::to_string_pretty(&data)?);
        }
        Ok(())
    }

    /// Print human-readable text, or `data` as JSON
    pub fn print_or<T: Serialize>(&self, data: T, text: impl FnOnce() -> String) -> anyhow::Result<()> {
        if self.json {
            self.print(data)
        } else {
            println!("{}", text());
            Ok(())
        }
    }

    /// Print error and return exit code
    pub fn error(&self, msg: impl Into<String>, code: ExitCode) -> ExitCode {
        let msg = msg.into();
        if self.json {
            let output = JsonOutput::<()>::error_msg(&msg, code);
            if let Ok(json) = serde_json::to_string_pretty(&output) {
                eprintln!("{}", json);
            }
        } else if !self.quiet {
            eprintln!("Error: {}", msg);
        }
        code
    }

    /// Print info message (suppressed in quiet mode)
    pub fn info(&self, msg: impl std::fmt::Display) {
        if !self.quiet && !self.json {
            eprintln!("{}", msg);
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
