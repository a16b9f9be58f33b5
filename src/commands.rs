//! CLI Command Handlers
//!
//! Implements all CLI commands by calling the appropriate backend services.
//! Each handler takes CLI args and Output, returns ExitCode.

use std::fmt::Write as _;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::debug;

use crate::catalog::{LoadError, LoadErrorKind, LoadOutcome, MediaHierarchyLoader, MediaTree};
use crate::cli::{
    BrowseCmd, CatalogNode, CatalogResponse, DevicesCmd, ExitCode, InfoCmd, InfoResponse, Output,
    PlayCmd, PlayInput, PlayResponse,
};
use crate::config::Config;
use crate::models::{format_duration, NavBarStyle, PlayerState};
use crate::playback::{PlaybackDelegate, PlaybackError, PlaybackStateMachine, RemoteEvent};
use crate::stream::cast::{self, CastError, CattSession};
use crate::stream::MpvEngine;

// =============================================================================
// Catalog Helpers
// =============================================================================

fn exit_code_for(error: &LoadError) -> ExitCode {
    match error.kind() {
        LoadErrorKind::Network => ExitCode::NetworkError,
        LoadErrorKind::MalformedDocument | LoadErrorKind::UnsupportedSchema => ExitCode::BadCatalog,
    }
}

/// Load the catalog at `url`, reporting failures through `output`
async fn load_catalog(url: &str, output: &Output) -> Result<(String, Arc<MediaTree>), ExitCode> {
    output.info(format!("Loading catalog: {}", url));

    let mut loader = MediaHierarchyLoader::new();
    loader.load_from_url(url);

    match loader.next_outcome().await {
        Some(LoadOutcome::Loaded { title, tree, .. }) => Ok((title, tree)),
        Some(LoadOutcome::Failed { error, .. }) => Err(output.error(
            format!("Catalog load failed: {}", error),
            exit_code_for(&error),
        )),
        None => Err(output.error("Catalog load was cancelled", ExitCode::Error)),
    }
}

// =============================================================================
// Browse Command
// =============================================================================

pub async fn browse_cmd(cmd: BrowseCmd, catalog_url: &str, output: &Output) -> ExitCode {
    let url = cmd.url.as_deref().unwrap_or(catalog_url);
    let (title, tree) = match load_catalog(url, output).await {
        Ok(loaded) => loaded,
        Err(code) => return code,
    };

    let response = CatalogResponse {
        title: title.clone(),
        url: url.to_string(),
        items: tree
            .root()
            .children()
            .into_iter()
            .map(|item| CatalogNode::from_item(item, cmd.depth))
            .collect(),
    };

    let result = output.print_or(&response, || render_tree(&title, &tree, cmd.depth));
    if let Err(e) = result {
        return output.error(format!("Failed to serialize: {}", e), ExitCode::Error);
    }
    ExitCode::Success
}

/// Indented text rendering of the catalog
fn render_tree(title: &str, tree: &MediaTree, max_depth: Option<usize>) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}", title);
    for item in tree.walk().into_iter().skip(1) {
        let depth = item.depth();
        if max_depth.is_some_and(|d| depth > d) {
            continue;
        }
        let indent = "  ".repeat(depth - 1);
        match item.media_info() {
            Some(media) => {
                let _ = writeln!(out, "{}  {}", indent, media);
            }
            None => {
                let _ = writeln!(out, "{}▸ {} ({})", indent, item.title(), item.children().len());
            }
        }
    }
    out.trim_end().to_string()
}

// =============================================================================
// Info Command
// =============================================================================

pub async fn info_cmd(cmd: InfoCmd, catalog_url: &str, output: &Output) -> ExitCode {
    let (_, tree) = match load_catalog(catalog_url, output).await {
        Ok(loaded) => loaded,
        Err(code) => return code,
    };

    let Some(item) = tree.find_leaf(&cmd.title) else {
        return output.error(format!("No item titled '{}'", cmd.title), ExitCode::NotFound);
    };
    let Some(media) = item.media_info() else {
        return output.error(format!("'{}' is not playable", cmd.title), ExitCode::NotFound);
    };

    let mut path: Vec<&str> = std::iter::successors(item.parent(), |p| p.parent())
        .map(|p| p.title())
        .filter(|t| !t.is_empty())
        .collect();
    path.reverse();

    let response = InfoResponse { path, media };
    let result = output.print_or(&response, || {
        let mut text = String::new();
        let _ = writeln!(text, "{}", media.metadata.title);
        if !response.path.is_empty() {
            let _ = writeln!(text, "  In:       {}", response.path.join(" / "));
        }
        if let Some(studio) = &media.metadata.studio {
            let _ = writeln!(text, "  Studio:   {}", studio);
        }
        if let Some(duration) = media.duration {
            let _ = writeln!(text, "  Duration: {}", format_duration(duration));
        }
        let _ = writeln!(text, "  URL:      {}", media.content_url);
        if let Some(poster) = &media.metadata.poster_url {
            let _ = writeln!(text, "  Poster:   {}", poster);
        }
        for track in &media.tracks {
            let name = track.name.as_deref().unwrap_or("unnamed");
            let lang = track.language.as_deref().unwrap_or("?");
            let _ = writeln!(text, "  Track:    {} ({})", name, lang);
        }
        if let Some(description) = &media.metadata.subtitle {
            let _ = writeln!(text, "\n{}", description);
        }
        text.trim_end().to_string()
    });
    if let Err(e) = result {
        return output.error(format!("Failed to serialize: {}", e), ExitCode::Error);
    }
    ExitCode::Success
}

// =============================================================================
// Play Command
// =============================================================================

/// Delegate for the terminal host. There is no window chrome to restyle, so
/// presentation requests are only logged; failures are kept for the exit code.
///
/// While casting, the play button on the splash screen asks whether to play
/// again or add to the receiver's queue instead of restarting right away.
#[derive(Default)]
struct TerminalHost {
    failure: Mutex<Option<PlaybackError>>,
    casting: AtomicBool,
    /// Waiting for `y` or `a` after the play button
    choice_pending: AtomicBool,
}

impl TerminalHost {
    fn has_failed(&self) -> bool {
        self.failure.lock().map(|f| f.is_some()).unwrap_or(false)
    }
}

impl PlaybackDelegate for TerminalHost {
    fn set_navigation_bar_style(&self, style: NavBarStyle) {
        debug!(?style, "Navigation bar style requested");
    }

    fn hide_navigation_bar(&self, hidden: bool) {
        debug!(hidden, "Navigation bar visibility requested");
    }

    fn continue_after_play_button_clicked(&self) -> bool {
        if self.casting.load(Ordering::Relaxed) {
            self.choice_pending.store(true, Ordering::Relaxed);
            return false;
        }
        true
    }

    fn playback_did_fail(&self, error: &PlaybackError) {
        if let Ok(mut failure) = self.failure.lock() {
            *failure = Some(error.clone());
        }
    }
}

/// Receive from the session's event channel, or wait forever without one
async fn next_remote_event(rx: &mut Option<mpsc::UnboundedReceiver<RemoteEvent>>) -> Option<RemoteEvent> {
    match rx {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

/// Hand playback to `device`. A current cast session is replaced.
fn start_cast(
    machine: &mut PlaybackStateMachine<MpvEngine>,
    catt: &str,
    device: &str,
    output: &Output,
) -> mpsc::UnboundedReceiver<RemoteEvent> {
    output.info(format!("Casting to {}...", device));
    let (session, events) = CattSession::with_path(catt, device);
    machine.remote_session_started(Box::new(session));
    events
}

pub async fn play_cmd(
    cmd: PlayCmd,
    device: Option<&str>,
    config: &Config,
    catalog_url: &str,
    output: &Output,
) -> ExitCode {
    let (_, tree) = match load_catalog(catalog_url, output).await {
        Ok(loaded) => loaded,
        Err(code) => return code,
    };
    let Some(media) = tree.find_leaf(&cmd.title).and_then(|item| item.media_info().cloned()) else {
        return output.error(format!("No item titled '{}'", cmd.title), ExitCode::NotFound);
    };

    let global_device = device.map(str::to_string).or_else(|| config.default_device.clone());
    let cast_target = cmd.effective_device(&global_device).map(str::to_string);
    let catt = cmd.catt.as_deref().unwrap_or(config.catt_binary()).to_string();

    let binary = cmd.player.as_deref().unwrap_or(config.player_binary());
    let (engine, mut engine_events) = MpvEngine::new(binary);
    if cast_target.is_none() && !engine.is_available().await {
        return output.error(
            format!("Player '{}' not found. Install it first.", binary),
            ExitCode::PlaybackFailed,
        );
    }

    let host = Arc::new(TerminalHost::default());
    let delegate: Arc<dyn PlaybackDelegate> = host.clone();
    let mut machine = PlaybackStateMachine::new(engine);
    machine.set_delegate(Arc::downgrade(&delegate));

    let mut remote_events = cast_target
        .as_deref()
        .map(|device| start_cast(&mut machine, &catt, device, output));

    let start = if cmd.start.is_finite() && cmd.start > 0.0 {
        Duration::from_secs_f64(cmd.start)
    } else {
        Duration::ZERO
    };
    let selected = media.clone();
    let mut title = media.title().to_string();
    machine.load_media(Some(media), !(cmd.paused || config.start_paused), start);
    output.info(format!(
        "Playing {} (p play/pause, s <secs> seek, x stop, c <device> cast, l local, a [title] queue, q quit)",
        title
    ));

    let mut stdin = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;
    let mut quit = false;
    let mut last_state = machine.player_state();
    let mut last_position = machine.stream_position();

    loop {
        tokio::select! {
            Some(event) = engine_events.recv() => machine.handle_engine_event(event),
            Some(event) = next_remote_event(&mut remote_events) => machine.handle_remote_event(event),
            line = stdin.next_line(), if stdin_open => match line {
                Ok(Some(line)) => match PlayInput::parse(&line) {
                    Some(PlayInput::TogglePause) => {
                        machine.play_button_clicked();
                        if host.choice_pending.swap(false, Ordering::Relaxed) {
                            output.info("'y' plays it again, 'a' adds it to the queue");
                        }
                    }
                    Some(PlayInput::PlayNow) => machine.play(),
                    Some(PlayInput::Enqueue(requested)) => {
                        let item = match requested {
                            Some(name) => tree.find_leaf(&name).and_then(|item| item.media_info().cloned()),
                            None => Some(selected.clone()),
                        };
                        match item {
                            Some(item) => {
                                let name = item.title().to_string();
                                if machine.enqueue_media(item) {
                                    output.info(format!("Queued {}", name));
                                } else {
                                    output.info("Only a Chromecast has a queue, cast first with c <device>");
                                }
                            }
                            None => output.info("No such item in the catalog"),
                        }
                    }
                    Some(PlayInput::Seek(secs)) => machine.seek_to_time(secs),
                    Some(PlayInput::Stop) => machine.stop(),
                    Some(PlayInput::Quit) => quit = true,
                    Some(PlayInput::Cast(device)) => {
                        remote_events = Some(start_cast(&mut machine, &catt, &device, output));
                    }
                    Some(PlayInput::Local) => {
                        if machine.remote_device().is_some() {
                            output.info("Resuming locally...");
                            machine.stop_casting();
                            remote_events = None;
                        }
                    }
                    Some(PlayInput::Invalid(input)) => output.info(format!("Unknown command: {}", input)),
                    None => {}
                },
                Ok(None) | Err(_) => stdin_open = false,
            },
            _ = tokio::signal::ctrl_c() => quit = true,
        }

        let casting = machine.remote_device().is_some();
        host.casting.store(casting, Ordering::Relaxed);

        let state = machine.player_state();
        if state.is_active() {
            last_position = machine.stream_position();
        }
        if let Some(current) = machine.media() {
            if current.title() != title {
                title = current.title().to_string();
            }
        }
        if state != last_state {
            if state != PlayerState::Stopped {
                output.info(machine.status());
            } else if casting && stdin_open {
                output.info("Stopped (p play again, a [title] queue, q quit)");
            }
            last_state = state;
        }

        if quit {
            machine.stop();
            break;
        }
        // A cast session stays open on the splash screen for more input
        if state == PlayerState::Stopped && (!casting || !stdin_open || host.has_failed()) {
            break;
        }
    }

    let failure = host.failure.lock().ok().and_then(|mut f| f.take());
    if let Some(error) = failure {
        let code = match error {
            PlaybackError::Remote(_) => ExitCode::CastFailed,
            _ => ExitCode::PlaybackFailed,
        };
        return output.error(format!("Playback failed: {}", error), code);
    }

    let response = PlayResponse {
        status: "finished",
        title,
        device: machine.remote_device().map(str::to_string),
        position: last_position.as_secs_f64(),
    };
    let result = output.print_or(&response, || {
        format!(
            "Finished {} at {}",
            response.title,
            format_duration(last_position)
        )
    });
    if let Err(e) = result {
        return output.error(format!("Failed to serialize: {}", e), ExitCode::Error);
    }
    ExitCode::Success
}

// =============================================================================
// Devices Command
// =============================================================================

pub async fn devices_cmd(cmd: DevicesCmd, config: &Config, output: &Output) -> ExitCode {
    output.info("Scanning for Chromecast devices...");

    let catt = cmd.catt.as_deref().unwrap_or(config.catt_binary());
    let result = cast::scan(catt).await;
    crate::log_result!("scan devices", result);

    match result {
        Ok(devices) => {
            let printed = output.print_or(&devices, || {
                devices
                    .iter()
                    .map(|d| d.to_string())
                    .collect::<Vec<_>>()
                    .join("\n")
            });
            if let Err(e) = printed {
                return output.error(format!("Failed to serialize: {}", e), ExitCode::Error);
            }
            ExitCode::Success
        }
        Err(CastError::NoDevices) => {
            output.error("No Chromecast devices found", ExitCode::DeviceNotFound)
        }
        Err(e @ CastError::NotFound) => output.error(e.to_string(), ExitCode::Error),
        Err(e) => output.error(format!("Device scan failed: {}", e), ExitCode::NetworkError),
    }
}
