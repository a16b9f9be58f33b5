//! Playback state machine
//!
//! ```text
//! Stopped ──load──▶ Starting ──ready──▶ Playing ⇄ Paused
//!    ▲                 │                   │        │
//!    └────── stop / show_splash_screen / failure ───┘
//! ```
//!
//! While a remote session holds playback authority the engine is left alone:
//! commands are forwarded to the session and `player_state` mirrors the
//! receiver's status. When the session ends, local playback resumes from the
//! last known remote position.
//!
//! Media added to a receiver's queue is tracked here too, so the machine can
//! follow the receiver when it moves on to the next item.

use std::collections::VecDeque;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tracing::{debug, error, info, warn};

use super::delegate::PlaybackDelegate;
use super::engine::{EngineEvent, EngineEventKind, LoadToken, PlaybackEngine};
use super::remote::{RemoteEvent, RemotePlayerState, RemoteSession, RemoteStatus};
use super::PlaybackError;
use crate::models::{MediaInfo, NavBarStyle, Orientation, PlaybackStatus, PlayerState};

pub struct PlaybackStateMachine<E: PlaybackEngine> {
    engine: E,
    remote: Option<Box<dyn RemoteSession>>,
    delegate: Option<Weak<dyn PlaybackDelegate>>,
    state: PlayerState,
    media: Option<MediaInfo>,
    position: Duration,
    duration: Duration,
    orientation: Orientation,
    fullscreen: bool,
    /// Resolve `Starting` to `Playing` rather than `Paused`
    pending_play: bool,
    next_token: u64,
    /// Token of the load the engine currently holds
    current_token: Option<LoadToken>,
    /// Last state reported by the remote receiver
    remote_state: Option<RemotePlayerState>,
    /// Media queued on the receiver after the current item
    queue: VecDeque<MediaInfo>,
    last_error: Option<PlaybackError>,
}

impl<E: PlaybackEngine> PlaybackStateMachine<E> {
    pub fn new(engine: E) -> Self {
        Self {
            engine,
            remote: None,
            delegate: None,
            state: PlayerState::Stopped,
            media: None,
            position: Duration::ZERO,
            duration: Duration::ZERO,
            orientation: Orientation::Portrait,
            fullscreen: false,
            pending_play: false,
            next_token: 0,
            current_token: None,
            remote_state: None,
            queue: VecDeque::new(),
            last_error: None,
        }
    }

    pub fn set_delegate(&mut self, delegate: Weak<dyn PlaybackDelegate>) {
        self.delegate = Some(delegate);
    }

    // -------------------------------------------------------------------------
    // Observers
    // -------------------------------------------------------------------------

    pub fn player_state(&self) -> PlayerState {
        self.state
    }

    /// Current media; hidden on the splash screen
    pub fn media(&self) -> Option<&MediaInfo> {
        self.media
            .as_ref()
            .filter(|_| self.state != PlayerState::Stopped)
    }

    pub fn stream_position(&self) -> Duration {
        self.position
    }

    /// Zero while unknown
    pub fn stream_duration(&self) -> Duration {
        self.duration
    }

    pub fn is_playing_locally(&self) -> bool {
        self.remote.is_none()
    }

    pub fn is_fullscreen(&self) -> bool {
        self.fullscreen
    }

    pub fn orientation(&self) -> Orientation {
        self.orientation
    }

    pub fn last_error(&self) -> Option<&PlaybackError> {
        self.last_error.as_ref()
    }

    /// Name of the receiver holding playback authority
    pub fn remote_device(&self) -> Option<&str> {
        self.remote.as_ref().map(|r| r.device_name())
    }

    /// Media waiting in the receiver's queue, next first
    pub fn queue(&self) -> &VecDeque<MediaInfo> {
        &self.queue
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn status(&self) -> PlaybackStatus {
        PlaybackStatus {
            state: self.state,
            title: self.media().map(|m| m.title().to_string()),
            position: self.position,
            duration: self.duration,
            playing_locally: self.is_playing_locally(),
            fullscreen: self.fullscreen,
        }
    }

    // -------------------------------------------------------------------------
    // Commands
    // -------------------------------------------------------------------------

    /// Load `media` and enter `Starting`. A missing descriptor is ignored.
    pub fn load_media(&mut self, media: Option<MediaInfo>, auto_play: bool, start_position: Duration) {
        let Some(media) = media else {
            warn!("load_media called without a media descriptor");
            return;
        };
        info!(title = %media.title(), auto_play, start = ?start_position, "Loading media");

        self.teardown_local();
        self.last_error = None;
        self.queue.clear();
        self.duration = media.duration.unwrap_or(Duration::ZERO);
        self.position = self.clamp_reported(start_position);
        self.pending_play = auto_play;
        self.set_state(PlayerState::Starting);

        match self.remote.as_mut() {
            Some(remote) => {
                remote.load(&media, self.position, auto_play);
                self.remote_state = None;
            }
            None => {
                let token = self.issue_token();
                self.engine.load(token, &media, self.position);
            }
        }
        self.media = Some(media);
        self.refresh_presentation(false);
    }

    /// Resume, or restart the loaded media from the splash screen
    pub fn play(&mut self) {
        if self.remote.is_some() {
            self.play_remote();
            return;
        }

        match self.state {
            PlayerState::Paused => {
                self.engine.play();
                self.set_state(PlayerState::Playing);
            }
            PlayerState::Starting => self.pending_play = true,
            PlayerState::Stopped => match self.media.clone() {
                Some(media) => {
                    self.duration = media.duration.unwrap_or(Duration::ZERO);
                    self.position = Duration::ZERO;
                    self.pending_play = true;
                    let token = self.issue_token();
                    self.engine.load(token, &media, Duration::ZERO);
                    self.set_state(PlayerState::Starting);
                }
                None => debug!("play ignored, nothing loaded"),
            },
            PlayerState::Playing => {}
        }
        self.refresh_presentation(false);
    }

    pub fn pause(&mut self) {
        if let Some(remote) = self.remote.as_mut() {
            if matches!(self.state, PlayerState::Playing | PlayerState::Starting) {
                debug!("Forwarding pause to remote session");
                remote.pause();
            }
            self.pending_play = false;
            return;
        }

        match self.state {
            PlayerState::Playing => {
                self.engine.pause();
                self.set_state(PlayerState::Paused);
            }
            PlayerState::Starting => self.pending_play = false,
            _ => debug!(state = ?self.state, "pause ignored"),
        }
        self.refresh_presentation(false);
    }

    /// Back to the splash screen. The media stays loaded so `play` can restart it.
    pub fn stop(&mut self) {
        if self.state == PlayerState::Stopped {
            return;
        }
        match self.remote.as_mut() {
            Some(remote) => {
                remote.stop();
                self.remote_state = None;
                self.queue.clear();
            }
            None => self.teardown_local(),
        }
        self.reset_to_splash();
    }

    pub fn toggle_pause(&mut self) {
        let about_to_play = self.state == PlayerState::Playing
            || (self.state == PlayerState::Starting && self.pending_play);
        if about_to_play {
            self.pause();
        } else {
            self.play();
        }
    }

    /// The play/pause button. On the splash screen the delegate may veto it.
    pub fn play_button_clicked(&mut self) {
        if self.state == PlayerState::Stopped {
            if let Some(delegate) = self.delegate() {
                if !delegate.continue_after_play_button_clicked() {
                    debug!("Play button handled by delegate");
                    return;
                }
            }
        }
        self.toggle_pause();
    }

    /// Seek within `[0, stream_duration]`. Only valid while playing or paused.
    pub fn seek_to_time(&mut self, seconds: f64) {
        if !self.state.is_active() {
            debug!(state = ?self.state, "seek ignored");
            return;
        }
        let requested = if seconds.is_finite() && seconds > 0.0 {
            Duration::from_secs_f64(seconds)
        } else {
            Duration::ZERO
        };
        let target = requested.min(self.duration);
        self.position = target;

        match self.remote.as_mut() {
            Some(remote) => remote.seek(target),
            None => self.engine.seek(target),
        }
    }

    /// Force the splash screen and forget the media
    pub fn show_splash_screen(&mut self) {
        if self.state != PlayerState::Stopped {
            if let Some(remote) = self.remote.as_mut() {
                remote.stop();
                self.remote_state = None;
            }
        }
        self.teardown_local();
        self.media = None;
        self.queue.clear();
        self.reset_to_splash();
    }

    /// Add `media` to the receiver's queue. Only a remote session has a
    /// queue; returns false without one. On the splash screen there is
    /// nothing to queue behind, so the media starts right away.
    pub fn enqueue_media(&mut self, media: MediaInfo) -> bool {
        if self.remote.is_none() {
            debug!(title = %media.title(), "enqueue ignored, not casting");
            return false;
        }
        if self.state == PlayerState::Stopped {
            self.load_media(Some(media), true, Duration::ZERO);
            return true;
        }

        info!(title = %media.title(), position = self.queue.len() + 1, "Queueing media on receiver");
        if let Some(remote) = self.remote.as_mut() {
            remote.enqueue(&media);
        }
        self.queue.push_back(media);
        true
    }

    /// Device rotated; recompute fullscreen and ask the host for matching chrome
    pub fn orientation_changed(&mut self, orientation: Orientation) {
        debug!(?orientation, "Orientation changed");
        self.orientation = orientation;
        self.refresh_presentation(true);
    }

    // -------------------------------------------------------------------------
    // External signals
    // -------------------------------------------------------------------------

    pub fn handle_engine_event(&mut self, event: EngineEvent) {
        if self.remote.is_some() || self.current_token != Some(event.token) {
            debug!(?event, "Ignoring stale engine event");
            return;
        }

        match event.kind {
            EngineEventKind::Ready { duration } => {
                if self.state != PlayerState::Starting {
                    return;
                }
                if let Some(duration) = duration {
                    self.duration = duration;
                }
                self.position = self.clamp_reported(self.position);
                if self.pending_play {
                    self.pending_play = false;
                    self.engine.play();
                    self.set_state(PlayerState::Playing);
                } else {
                    self.set_state(PlayerState::Paused);
                }
                self.refresh_presentation(false);
            }
            EngineEventKind::Position(position) => {
                if self.state.is_active() {
                    self.position = self.clamp_reported(position);
                }
            }
            EngineEventKind::Ended => {
                info!("Local playback ended");
                self.teardown_local();
                self.reset_to_splash();
            }
            EngineEventKind::Failed(error) => self.fail(error),
        }
    }

    /// Hand playback authority to `session`. Active media continues on the
    /// receiver from the current position. A session that already held
    /// authority is stopped; the engine stays idle during the switch.
    pub fn remote_session_started(&mut self, mut session: Box<dyn RemoteSession>) {
        info!(device = session.device_name(), "Remote session started");

        let was_playing = self.state == PlayerState::Playing
            || (self.state == PlayerState::Starting && self.pending_play);
        match self.remote.take() {
            Some(mut previous) => {
                info!(
                    from = previous.device_name(),
                    to = session.device_name(),
                    "Switching remote session"
                );
                previous.stop();
            }
            None => self.teardown_local(),
        }
        if self.state != PlayerState::Stopped {
            if let Some(media) = &self.media {
                session.load(media, self.position, was_playing);
            }
        }

        self.pending_play = was_playing;
        self.remote_state = None;
        self.queue.clear();
        self.remote = Some(session);
        self.refresh_presentation(false);
    }

    /// The receiver went away on its own. Resumes locally unless it had
    /// nothing playing.
    pub fn remote_session_ended(&mut self) {
        let Some(session) = self.remote.take() else {
            return;
        };
        info!(device = session.device_name(), "Remote session ended");
        self.resume_locally();
    }

    /// Stop the receiver and take playback back to the engine
    pub fn stop_casting(&mut self) {
        let Some(mut session) = self.remote.take() else {
            debug!("stop_casting ignored, not casting");
            return;
        };
        info!(device = session.device_name(), "Casting stopped");
        session.stop();
        self.resume_locally();
    }

    pub fn handle_remote_event(&mut self, event: RemoteEvent) {
        if self.remote.is_none() {
            debug!(?event, "Ignoring remote event without a session");
            return;
        }
        match event {
            RemoteEvent::Status(status) => self.mirror_remote(status),
            RemoteEvent::Failed(error) => {
                self.remote_state = None;
                self.fail(error);
            }
            RemoteEvent::SessionEnded => self.remote_session_ended(),
        }
    }

    // -------------------------------------------------------------------------
    // Internals
    // -------------------------------------------------------------------------

    fn mirror_remote(&mut self, status: RemoteStatus) {
        let was_active = matches!(
            self.remote_state,
            Some(RemotePlayerState::Playing | RemotePlayerState::Paused | RemotePlayerState::Buffering)
        );
        self.remote_state = Some(status.state);
        if let Some(title) = status.title.as_deref() {
            self.follow_queue(title);
        }
        if self.media.is_none() || self.state == PlayerState::Stopped {
            return;
        }
        if let Some(duration) = status.duration {
            self.duration = duration;
        }

        match status.state {
            RemotePlayerState::Playing => {
                self.pending_play = false;
                self.set_state(PlayerState::Playing);
            }
            RemotePlayerState::Paused => self.set_state(PlayerState::Paused),
            RemotePlayerState::Buffering => {}
            // A receiver that has not picked up the load yet reports idle too
            RemotePlayerState::Idle => {
                if was_active {
                    info!("Remote playback ended");
                    self.reset_to_splash();
                }
                return;
            }
        }

        if self.state.is_active() {
            self.position = self.clamp_reported(status.position);
        }
    }

    /// The receiver reports `title`. When that is the next queued item rather
    /// than the current one, it becomes the current media.
    fn follow_queue(&mut self, title: &str) {
        let current = self
            .media
            .as_ref()
            .filter(|_| self.state != PlayerState::Stopped);
        if current.is_some_and(|media| shows_title(media, title)) {
            return;
        }
        if !self.queue.front().is_some_and(|media| shows_title(media, title)) {
            return;
        }
        let Some(next) = self.queue.pop_front() else {
            return;
        };

        info!(title = %next.title(), "Receiver moved on to queued media");
        self.duration = next.duration.unwrap_or(Duration::ZERO);
        self.position = Duration::ZERO;
        self.media = Some(next);
        if self.state == PlayerState::Stopped {
            self.set_state(PlayerState::Starting);
        }
    }

    /// Play while the receiver holds authority; never starts a local stream
    fn play_remote(&mut self) {
        let Some(media) = self.media.clone() else {
            debug!("play ignored, nothing loaded");
            return;
        };

        if self.state == PlayerState::Stopped {
            debug!("Restarting media on remote session");
            self.duration = media.duration.unwrap_or(Duration::ZERO);
            self.position = Duration::ZERO;
            self.pending_play = true;
            self.remote_state = None;
            self.queue.clear();
            if let Some(remote) = self.remote.as_mut() {
                remote.load(&media, Duration::ZERO, true);
            }
            self.set_state(PlayerState::Starting);
        } else {
            debug!("Forwarding play to remote session");
            if let Some(remote) = self.remote.as_mut() {
                remote.play();
            }
            if self.state == PlayerState::Starting {
                self.pending_play = true;
            }
        }
    }

    fn fail(&mut self, error: PlaybackError) {
        error!(%error, "Playback failed");
        self.queue.clear();
        self.teardown_local();
        self.reset_to_splash();
        if let Some(delegate) = self.delegate() {
            delegate.playback_did_fail(&error);
        }
        self.last_error = Some(error);
    }

    /// Continue on the engine after the remote session is gone
    fn resume_locally(&mut self) {
        let autoplay = self.state == PlayerState::Playing
            || (self.state == PlayerState::Starting && self.pending_play);
        let position = self.position;
        self.remote_state = None;
        self.queue.clear();

        let resume = self
            .media
            .clone()
            .filter(|_| self.state != PlayerState::Stopped);
        match resume {
            Some(media) => self.load_media(Some(media), autoplay, position),
            None => self.reset_to_splash(),
        }
    }

    fn issue_token(&mut self) -> LoadToken {
        self.next_token += 1;
        let token = LoadToken(self.next_token);
        self.current_token = Some(token);
        token
    }

    fn teardown_local(&mut self) {
        if self.current_token.take().is_some() {
            self.engine.stop();
        }
    }

    fn reset_to_splash(&mut self) {
        self.set_state(PlayerState::Stopped);
        self.position = Duration::ZERO;
        self.duration = Duration::ZERO;
        self.pending_play = false;
        self.refresh_presentation(true);
    }

    fn set_state(&mut self, state: PlayerState) {
        if self.state != state {
            debug!(from = ?self.state, to = ?state, "Player state transition");
            self.state = state;
        }
    }

    /// Positions reported by an engine or receiver; unbounded while the
    /// duration is unknown
    fn clamp_reported(&self, position: Duration) -> Duration {
        if self.duration.is_zero() {
            position
        } else {
            position.min(self.duration)
        }
    }

    fn refresh_presentation(&mut self, force: bool) {
        let fullscreen = self.state != PlayerState::Stopped
            && self.orientation.is_landscape()
            && self.is_playing_locally();
        let changed = fullscreen != self.fullscreen;
        self.fullscreen = fullscreen;
        if !(changed || force) {
            return;
        }

        if let Some(delegate) = self.delegate() {
            if fullscreen {
                delegate.set_navigation_bar_style(NavBarStyle::Transparent);
                delegate.hide_navigation_bar(true);
            } else {
                delegate.set_navigation_bar_style(NavBarStyle::Standard);
                delegate.hide_navigation_bar(false);
            }
        }
    }

    fn delegate(&self) -> Option<Arc<dyn PlaybackDelegate>> {
        self.delegate.as_ref().and_then(Weak::upgrade)
    }
}

/// Receivers report either the title sent with the media or the file name
fn shows_title(media: &MediaInfo, title: &str) -> bool {
    media.title() == title || media.content_url.rsplit('/').next() == Some(title)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::DEFAULT_VIDEO_MIME_TYPE;
    use std::sync::Mutex;

    #[derive(Debug, Clone, PartialEq)]
    enum Call {
        Load(Duration),
        Play,
        Pause,
        Seek(Duration),
        Stop,
    }

    #[derive(Default)]
    struct FakeEngine {
        calls: Vec<Call>,
        token: Option<LoadToken>,
    }

    impl FakeEngine {
        fn token(&self) -> LoadToken {
            self.token.expect("engine was never loaded")
        }

        fn loads(&self) -> usize {
            self.calls
                .iter()
                .filter(|c| matches!(c, Call::Load(_)))
                .count()
        }
    }

    impl PlaybackEngine for FakeEngine {
        fn load(&mut self, token: LoadToken, _media: &MediaInfo, start: Duration) {
            self.token = Some(token);
            self.calls.push(Call::Load(start));
        }
        fn play(&mut self) {
            self.calls.push(Call::Play);
        }
        fn pause(&mut self) {
            self.calls.push(Call::Pause);
        }
        fn seek(&mut self, position: Duration) {
            self.calls.push(Call::Seek(position));
        }
        fn stop(&mut self) {
            self.calls.push(Call::Stop);
        }
    }

    #[derive(Debug, Clone, PartialEq)]
    enum RemoteCall {
        Load { position: Duration, autoplay: bool },
        Play,
        Pause,
        Seek(Duration),
        Stop,
        Enqueue(String),
    }

    struct FakeRemote {
        name: &'static str,
        calls: Arc<Mutex<Vec<RemoteCall>>>,
    }

    impl RemoteSession for FakeRemote {
        fn device_name(&self) -> &str {
            self.name
        }
        fn load(&mut self, _media: &MediaInfo, position: Duration, autoplay: bool) {
            self.calls
                .lock()
                .unwrap()
                .push(RemoteCall::Load { position, autoplay });
        }
        fn play(&mut self) {
            self.calls.lock().unwrap().push(RemoteCall::Play);
        }
        fn pause(&mut self) {
            self.calls.lock().unwrap().push(RemoteCall::Pause);
        }
        fn seek(&mut self, position: Duration) {
            self.calls.lock().unwrap().push(RemoteCall::Seek(position));
        }
        fn stop(&mut self) {
            self.calls.lock().unwrap().push(RemoteCall::Stop);
        }
        fn enqueue(&mut self, media: &MediaInfo) {
            self.calls
                .lock()
                .unwrap()
                .push(RemoteCall::Enqueue(media.title().to_string()));
        }
    }

    fn fake_remote() -> (Box<dyn RemoteSession>, Arc<Mutex<Vec<RemoteCall>>>) {
        fake_remote_named("Living Room TV")
    }

    fn fake_remote_named(name: &'static str) -> (Box<dyn RemoteSession>, Arc<Mutex<Vec<RemoteCall>>>) {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let remote = FakeRemote {
            name,
            calls: calls.clone(),
        };
        (Box::new(remote), calls)
    }

    fn remote_status(state: RemotePlayerState, position: u64, title: Option<&str>) -> RemoteEvent {
        RemoteEvent::Status(RemoteStatus {
            state,
            position: secs(position),
            duration: Some(secs(120)),
            title: title.map(str::to_string),
        })
    }

    #[derive(Default)]
    struct FakeDelegate {
        veto_play: bool,
        styles: Mutex<Vec<NavBarStyle>>,
        hidden: Mutex<Vec<bool>>,
        failures: Mutex<Vec<PlaybackError>>,
        play_clicks: Mutex<usize>,
    }

    impl PlaybackDelegate for FakeDelegate {
        fn set_navigation_bar_style(&self, style: NavBarStyle) {
            self.styles.lock().unwrap().push(style);
        }
        fn hide_navigation_bar(&self, hidden: bool) {
            self.hidden.lock().unwrap().push(hidden);
        }
        fn continue_after_play_button_clicked(&self) -> bool {
            *self.play_clicks.lock().unwrap() += 1;
            !self.veto_play
        }
        fn playback_did_fail(&self, error: &PlaybackError) {
            self.failures.lock().unwrap().push(error.clone());
        }
    }

    fn attach(machine: &mut PlaybackStateMachine<FakeEngine>, delegate: &Arc<FakeDelegate>) {
        let delegate: Arc<dyn PlaybackDelegate> = delegate.clone();
        machine.set_delegate(Arc::downgrade(&delegate));
    }

    fn clip() -> MediaInfo {
        MediaInfo::new("https://x/a.mp4", DEFAULT_VIDEO_MIME_TYPE)
            .with_title("Clip A")
            .with_duration(Duration::from_secs(120))
    }

    fn secs(s: u64) -> Duration {
        Duration::from_secs(s)
    }

    /// Load and resolve `Starting` through the engine
    fn playing_at(start: u64) -> PlaybackStateMachine<FakeEngine> {
        let mut machine = PlaybackStateMachine::new(FakeEngine::default());
        machine.load_media(Some(clip()), true, secs(start));
        let token = machine.engine().token();
        machine.handle_engine_event(EngineEvent::ready(token, Some(secs(120))));
        machine
    }

    #[test]
    fn test_starts_on_splash() {
        let machine = PlaybackStateMachine::new(FakeEngine::default());
        assert_eq!(machine.player_state(), PlayerState::Stopped);
        assert!(machine.media().is_none());
        assert!(machine.is_playing_locally());
        assert!(!machine.is_fullscreen());
    }

    #[test]
    fn test_load_without_media_is_noop() {
        let mut machine = PlaybackStateMachine::new(FakeEngine::default());
        machine.load_media(None, true, secs(10));
        assert_eq!(machine.player_state(), PlayerState::Stopped);
        assert!(machine.engine().calls.is_empty());
    }

    #[test]
    fn test_autoplay_reaches_playing_without_play() {
        let machine = playing_at(0);
        assert_eq!(machine.player_state(), PlayerState::Playing);
        assert_eq!(machine.engine().calls, vec![Call::Load(secs(0)), Call::Play]);
        assert_eq!(machine.media().map(|m| m.title()), Some("Clip A"));
    }

    #[test]
    fn test_load_paused_then_play() {
        let mut machine = PlaybackStateMachine::new(FakeEngine::default());
        machine.load_media(Some(clip()), false, secs(0));
        assert_eq!(machine.player_state(), PlayerState::Starting);

        let token = machine.engine().token();
        machine.handle_engine_event(EngineEvent::ready(token, None));
        assert_eq!(machine.player_state(), PlayerState::Paused);

        machine.play();
        assert_eq!(machine.player_state(), PlayerState::Playing);
    }

    #[test]
    fn test_load_then_stop_resets_position() {
        let mut machine = PlaybackStateMachine::new(FakeEngine::default());
        machine.load_media(Some(clip()), true, secs(30));
        assert_eq!(machine.stream_position(), secs(30));

        machine.stop();
        assert_eq!(machine.player_state(), PlayerState::Stopped);
        assert_eq!(machine.stream_position(), Duration::ZERO);
        assert_eq!(machine.stream_duration(), Duration::ZERO);
        assert!(machine.media().is_none());
        assert_eq!(machine.engine().calls.last(), Some(&Call::Stop));
    }

    #[test]
    fn test_play_after_stop_restarts_from_beginning() {
        let mut machine = playing_at(30);
        machine.stop();
        machine.play();
        assert_eq!(machine.player_state(), PlayerState::Starting);
        assert_eq!(machine.engine().calls.last(), Some(&Call::Load(Duration::ZERO)));
    }

    #[test]
    fn test_invalid_commands_are_noops() {
        let mut machine = PlaybackStateMachine::new(FakeEngine::default());
        machine.pause();
        machine.stop();
        machine.play();
        machine.seek_to_time(10.0);
        assert_eq!(machine.player_state(), PlayerState::Stopped);
        assert!(machine.engine().calls.is_empty());

        let mut machine = playing_at(0);
        machine.play();
        assert_eq!(machine.player_state(), PlayerState::Playing);
        machine.pause();
        machine.pause();
        assert_eq!(machine.player_state(), PlayerState::Paused);
        assert_eq!(
            machine
                .engine()
                .calls
                .iter()
                .filter(|c| **c == Call::Pause)
                .count(),
            1
        );
    }

    #[test]
    fn test_pause_while_starting_resolves_to_paused() {
        let mut machine = PlaybackStateMachine::new(FakeEngine::default());
        machine.load_media(Some(clip()), true, secs(0));
        machine.pause();
        let token = machine.engine().token();
        machine.handle_engine_event(EngineEvent::ready(token, None));
        assert_eq!(machine.player_state(), PlayerState::Paused);
    }

    #[test]
    fn test_toggle_pause() {
        let mut machine = playing_at(0);
        machine.toggle_pause();
        assert_eq!(machine.player_state(), PlayerState::Paused);
        machine.toggle_pause();
        assert_eq!(machine.player_state(), PlayerState::Playing);
    }

    #[test]
    fn test_seek_clamps_into_stream() {
        let mut machine = playing_at(0);

        machine.seek_to_time(500.0);
        assert_eq!(machine.stream_position(), secs(120));

        machine.seek_to_time(-5.0);
        assert_eq!(machine.stream_position(), Duration::ZERO);

        machine.seek_to_time(f64::NAN);
        assert_eq!(machine.stream_position(), Duration::ZERO);

        machine.seek_to_time(42.5);
        assert_eq!(machine.stream_position(), Duration::from_secs_f64(42.5));
        assert_eq!(machine.player_state(), PlayerState::Playing);
        assert_eq!(
            machine.engine().calls.last(),
            Some(&Call::Seek(Duration::from_secs_f64(42.5)))
        );
    }

    #[test]
    fn test_engine_positions_are_clamped() {
        let mut machine = playing_at(0);
        let token = machine.engine().token();
        machine.handle_engine_event(EngineEvent::position(token, secs(45)));
        assert_eq!(machine.stream_position(), secs(45));
        machine.handle_engine_event(EngineEvent::position(token, secs(999)));
        assert_eq!(machine.stream_position(), secs(120));
    }

    #[test]
    fn test_stale_engine_events_are_dropped() {
        let mut machine = PlaybackStateMachine::new(FakeEngine::default());
        machine.load_media(Some(clip()), true, secs(0));
        let stale = machine.engine().token();
        machine.load_media(Some(clip().with_title("Clip B")), true, secs(0));

        machine.handle_engine_event(EngineEvent::ready(stale, None));
        assert_eq!(machine.player_state(), PlayerState::Starting);
        machine.handle_engine_event(EngineEvent::failed(
            stale,
            PlaybackError::Engine("old".into()),
        ));
        assert_eq!(machine.player_state(), PlayerState::Starting);

        let current = machine.engine().token();
        machine.handle_engine_event(EngineEvent::ready(current, None));
        assert_eq!(machine.player_state(), PlayerState::Playing);
        assert_eq!(machine.media().map(|m| m.title()), Some("Clip B"));
    }

    #[test]
    fn test_engine_failure_returns_to_splash() {
        let delegate = Arc::new(FakeDelegate::default());
        let mut machine = PlaybackStateMachine::new(FakeEngine::default());
        attach(&mut machine, &delegate);
        machine.load_media(Some(clip()), true, secs(0));

        let token = machine.engine().token();
        let error = PlaybackError::Unplayable("unsupported codec".into());
        machine.handle_engine_event(EngineEvent::failed(token, error.clone()));

        assert_eq!(machine.player_state(), PlayerState::Stopped);
        assert_eq!(machine.last_error(), Some(&error));
        assert_eq!(*delegate.failures.lock().unwrap(), vec![error]);
    }

    #[test]
    fn test_end_of_media_returns_to_splash() {
        let mut machine = playing_at(0);
        let token = machine.engine().token();
        machine.handle_engine_event(EngineEvent::ended(token));
        assert_eq!(machine.player_state(), PlayerState::Stopped);
        assert!(machine.last_error().is_none());
    }

    #[test]
    fn test_show_splash_screen_forgets_media() {
        let mut machine = playing_at(10);
        machine.show_splash_screen();
        assert_eq!(machine.player_state(), PlayerState::Stopped);
        machine.play();
        assert_eq!(machine.player_state(), PlayerState::Stopped);
    }

    #[test]
    fn test_delegate_can_intercept_play_button() {
        let delegate = Arc::new(FakeDelegate {
            veto_play: true,
            ..Default::default()
        });
        let mut machine = playing_at(0);
        attach(&mut machine, &delegate);
        machine.stop();
        let loads = machine.engine().loads();

        machine.play_button_clicked();
        assert_eq!(*delegate.play_clicks.lock().unwrap(), 1);
        assert_eq!(machine.player_state(), PlayerState::Stopped);
        assert_eq!(machine.engine().loads(), loads);
    }

    #[test]
    fn test_play_button_defaults_to_continue() {
        let delegate = Arc::new(FakeDelegate::default());
        let mut machine = playing_at(0);
        attach(&mut machine, &delegate);

        machine.play_button_clicked();
        assert_eq!(machine.player_state(), PlayerState::Paused);
        // Only consulted on the splash screen
        assert_eq!(*delegate.play_clicks.lock().unwrap(), 0);

        machine.stop();
        machine.play_button_clicked();
        assert_eq!(machine.player_state(), PlayerState::Starting);
    }

    #[test]
    fn test_dropped_delegate_is_skipped() {
        let delegate = Arc::new(FakeDelegate::default());
        let mut machine = playing_at(0);
        attach(&mut machine, &delegate);
        drop(delegate);

        machine.orientation_changed(Orientation::Landscape);
        assert!(machine.is_fullscreen());
    }

    #[test]
    fn test_orientation_drives_fullscreen_chrome() {
        let delegate = Arc::new(FakeDelegate::default());
        let mut machine = playing_at(0);
        attach(&mut machine, &delegate);

        machine.orientation_changed(Orientation::Landscape);
        assert!(machine.is_fullscreen());
        assert_eq!(delegate.styles.lock().unwrap().last(), Some(&NavBarStyle::Transparent));
        assert_eq!(delegate.hidden.lock().unwrap().last(), Some(&true));

        machine.orientation_changed(Orientation::Portrait);
        assert!(!machine.is_fullscreen());
        assert_eq!(delegate.styles.lock().unwrap().last(), Some(&NavBarStyle::Standard));
        assert_eq!(delegate.hidden.lock().unwrap().last(), Some(&false));
    }

    #[test]
    fn test_landscape_splash_is_not_fullscreen() {
        let mut machine = PlaybackStateMachine::new(FakeEngine::default());
        machine.orientation_changed(Orientation::Landscape);
        assert!(!machine.is_fullscreen());

        machine.load_media(Some(clip()), true, secs(0));
        assert!(machine.is_fullscreen());
        machine.stop();
        assert!(!machine.is_fullscreen());
    }

    #[test]
    fn test_remote_session_takes_over_playing_media() {
        let mut machine = playing_at(0);
        let token = machine.engine().token();
        machine.handle_engine_event(EngineEvent::position(token, secs(30)));

        let (remote, calls) = fake_remote();
        machine.remote_session_started(remote);

        assert!(!machine.is_playing_locally());
        assert_eq!(machine.remote_device(), Some("Living Room TV"));
        assert_eq!(machine.engine().calls.last(), Some(&Call::Stop));
        assert_eq!(
            *calls.lock().unwrap(),
            vec![RemoteCall::Load {
                position: secs(30),
                autoplay: true
            }]
        );

        // A second local stream is never started
        let loads = machine.engine().loads();
        machine.play();
        machine.play_button_clicked();
        assert_eq!(machine.engine().loads(), loads);

        // Late events from the torn-down engine are ignored
        machine.handle_engine_event(EngineEvent::ended(token));
        assert_eq!(machine.player_state(), PlayerState::Playing);
    }

    #[test]
    fn test_remote_status_is_mirrored() {
        let mut machine = playing_at(0);
        let (remote, calls) = fake_remote();
        machine.remote_session_started(remote);

        // Receiver has not picked up the load yet
        machine.handle_remote_event(RemoteEvent::Status(RemoteStatus {
            state: RemotePlayerState::Idle,
            position: Duration::ZERO,
            duration: None,
            title: None,
        }));
        assert_eq!(machine.player_state(), PlayerState::Playing);

        machine.handle_remote_event(RemoteEvent::Status(RemoteStatus {
            state: RemotePlayerState::Paused,
            position: secs(50),
            duration: Some(secs(120)),
            title: Some("Clip A".into()),
        }));
        assert_eq!(machine.player_state(), PlayerState::Paused);
        assert_eq!(machine.stream_position(), secs(50));

        machine.seek_to_time(70.0);
        machine.pause();
        machine.play();
        assert_eq!(
            calls.lock().unwrap()[1..],
            [RemoteCall::Seek(secs(70)), RemoteCall::Play]
        );

        machine.handle_remote_event(RemoteEvent::Status(RemoteStatus {
            state: RemotePlayerState::Idle,
            position: Duration::ZERO,
            duration: None,
            title: None,
        }));
        assert_eq!(machine.player_state(), PlayerState::Stopped);
    }

    #[test]
    fn test_remote_end_resumes_locally_at_remote_position() {
        let mut machine = playing_at(0);
        let (remote, _calls) = fake_remote();
        machine.remote_session_started(remote);
        machine.handle_remote_event(RemoteEvent::Status(RemoteStatus {
            state: RemotePlayerState::Playing,
            position: secs(75),
            duration: Some(secs(120)),
            title: None,
        }));

        machine.handle_remote_event(RemoteEvent::SessionEnded);
        assert!(machine.is_playing_locally());
        assert_eq!(machine.player_state(), PlayerState::Starting);
        assert_eq!(machine.engine().calls.last(), Some(&Call::Load(secs(75))));

        let token = machine.engine().token();
        machine.handle_engine_event(EngineEvent::ready(token, None));
        assert_eq!(machine.player_state(), PlayerState::Playing);
    }

    #[test]
    fn test_remote_end_on_splash_stays_on_splash() {
        let mut machine = PlaybackStateMachine::new(FakeEngine::default());
        let (remote, calls) = fake_remote();
        machine.remote_session_started(remote);
        assert!(calls.lock().unwrap().is_empty());

        machine.remote_session_ended();
        assert!(machine.is_playing_locally());
        assert_eq!(machine.player_state(), PlayerState::Stopped);
        assert!(machine.engine().calls.is_empty());
    }

    #[test]
    fn test_remote_failure_returns_to_splash() {
        let delegate = Arc::new(FakeDelegate::default());
        let mut machine = playing_at(0);
        attach(&mut machine, &delegate);
        let (remote, _calls) = fake_remote();
        machine.remote_session_started(remote);

        let error = PlaybackError::Remote("receiver went away".into());
        machine.handle_remote_event(RemoteEvent::Failed(error.clone()));
        assert_eq!(machine.player_state(), PlayerState::Stopped);
        assert_eq!(machine.last_error(), Some(&error));
        assert_eq!(delegate.failures.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_status_snapshot() {
        let machine = playing_at(30);
        let status = machine.status();
        assert_eq!(status.state, PlayerState::Playing);
        assert_eq!(status.title.as_deref(), Some("Clip A"));
        assert_eq!(status.position, secs(30));
        assert!(status.playing_locally);
        assert_eq!(status.to_string(), "▶ Playing 00:30 / 02:00 (local)");
    }

    #[test]
    fn test_switching_receivers_keeps_engine_idle() {
        let mut machine = playing_at(0);
        let (first, first_calls) = fake_remote_named("Kitchen");
        machine.remote_session_started(first);
        machine.handle_remote_event(remote_status(RemotePlayerState::Playing, 40, Some("Clip A")));
        let engine_calls = machine.engine().calls.clone();

        let (second, second_calls) = fake_remote_named("Bedroom");
        machine.remote_session_started(second);

        assert_eq!(machine.engine().calls, engine_calls);
        assert_eq!(first_calls.lock().unwrap().last(), Some(&RemoteCall::Stop));
        assert_eq!(
            *second_calls.lock().unwrap(),
            vec![RemoteCall::Load {
                position: secs(40),
                autoplay: true
            }]
        );
        assert_eq!(machine.remote_device(), Some("Bedroom"));
        assert_eq!(machine.player_state(), PlayerState::Playing);
    }

    #[test]
    fn test_switching_receivers_on_splash_loads_nothing() {
        let mut machine = PlaybackStateMachine::new(FakeEngine::default());
        let (first, first_calls) = fake_remote_named("Kitchen");
        machine.remote_session_started(first);
        let (second, second_calls) = fake_remote_named("Bedroom");
        machine.remote_session_started(second);

        assert_eq!(*first_calls.lock().unwrap(), vec![RemoteCall::Stop]);
        assert!(second_calls.lock().unwrap().is_empty());
        assert!(machine.engine().calls.is_empty());
    }

    #[test]
    fn test_stop_casting_stops_receiver_and_resumes_locally() {
        let mut machine = playing_at(0);
        let (remote, calls) = fake_remote();
        machine.remote_session_started(remote);
        machine.handle_remote_event(remote_status(RemotePlayerState::Paused, 65, Some("Clip A")));

        machine.stop_casting();
        assert_eq!(calls.lock().unwrap().last(), Some(&RemoteCall::Stop));
        assert!(machine.is_playing_locally());
        assert_eq!(machine.player_state(), PlayerState::Starting);
        assert_eq!(machine.engine().calls.last(), Some(&Call::Load(secs(65))));

        // Paused on the receiver, so it comes back paused
        let token = machine.engine().token();
        machine.handle_engine_event(EngineEvent::ready(token, None));
        assert_eq!(machine.player_state(), PlayerState::Paused);

        // Nothing left to stop
        let loads = machine.engine().loads();
        machine.stop_casting();
        assert_eq!(machine.engine().loads(), loads);
    }

    #[test]
    fn test_enqueue_needs_a_receiver() {
        let mut machine = playing_at(0);
        assert!(!machine.enqueue_media(clip().with_title("Clip B")));
        assert!(machine.queue().is_empty());
        assert_eq!(machine.media().map(|m| m.title()), Some("Clip A"));
    }

    #[test]
    fn test_enqueue_on_splash_starts_right_away() {
        let mut machine = PlaybackStateMachine::new(FakeEngine::default());
        let (remote, calls) = fake_remote();
        machine.remote_session_started(remote);

        assert!(machine.enqueue_media(clip()));
        assert_eq!(machine.player_state(), PlayerState::Starting);
        assert!(machine.queue().is_empty());
        assert_eq!(
            *calls.lock().unwrap(),
            vec![RemoteCall::Load {
                position: Duration::ZERO,
                autoplay: true
            }]
        );
        assert!(machine.engine().calls.is_empty());
    }

    #[test]
    fn test_receiver_advances_through_queue() {
        let mut machine = playing_at(0);
        let (remote, calls) = fake_remote();
        machine.remote_session_started(remote);
        machine.handle_remote_event(remote_status(RemotePlayerState::Playing, 10, Some("Clip A")));

        assert!(machine.enqueue_media(clip().with_title("Clip B")));
        assert!(machine.enqueue_media(
            MediaInfo::new("https://x/c.mp4", DEFAULT_VIDEO_MIME_TYPE).with_title("Clip C")
        ));
        assert_eq!(machine.queue().len(), 2);
        assert_eq!(
            calls.lock().unwrap()[1..],
            [
                RemoteCall::Enqueue("Clip B".into()),
                RemoteCall::Enqueue("Clip C".into())
            ]
        );
        assert_eq!(machine.player_state(), PlayerState::Playing);

        // Straight on to the next item
        machine.handle_remote_event(remote_status(RemotePlayerState::Playing, 3, Some("Clip B")));
        assert_eq!(machine.media().map(|m| m.title()), Some("Clip B"));
        assert_eq!(machine.stream_position(), secs(3));
        assert_eq!(machine.queue().len(), 1);

        // Idle between items, then the receiver reports the file name
        machine.handle_remote_event(remote_status(RemotePlayerState::Idle, 0, None));
        assert_eq!(machine.player_state(), PlayerState::Stopped);
        machine.handle_remote_event(remote_status(RemotePlayerState::Playing, 1, Some("c.mp4")));
        assert_eq!(machine.player_state(), PlayerState::Playing);
        assert_eq!(machine.media().map(|m| m.title()), Some("Clip C"));
        assert!(machine.queue().is_empty());
        assert_eq!(machine.engine().loads(), 1);
    }

    #[test]
    fn test_stop_and_session_change_clear_queue() {
        let mut machine = playing_at(0);
        let (remote, _calls) = fake_remote();
        machine.remote_session_started(remote);
        machine.enqueue_media(clip().with_title("Clip B"));
        machine.stop();
        assert!(machine.queue().is_empty());

        machine.play();
        machine.enqueue_media(clip().with_title("Clip B"));
        let (other, _other_calls) = fake_remote_named("Bedroom");
        machine.remote_session_started(other);
        assert!(machine.queue().is_empty());
    }

    // -------------------------------------------------------------------------
    // Every command from every state
    // -------------------------------------------------------------------------

    #[derive(Debug, Clone, Copy)]
    enum Command {
        Play,
        Pause,
        Stop,
        TogglePause,
        PlayButton,
        Seek,
        ShowSplash,
    }

    fn apply(machine: &mut PlaybackStateMachine<FakeEngine>, command: Command) {
        match command {
            Command::Play => machine.play(),
            Command::Pause => machine.pause(),
            Command::Stop => machine.stop(),
            Command::TogglePause => machine.toggle_pause(),
            Command::PlayButton => machine.play_button_clicked(),
            Command::Seek => machine.seek_to_time(30.0),
            Command::ShowSplash => machine.show_splash_screen(),
        }
    }

    fn local_in(state: PlayerState) -> PlaybackStateMachine<FakeEngine> {
        let mut machine = match state {
            PlayerState::Starting => PlaybackStateMachine::new(FakeEngine::default()),
            _ => playing_at(0),
        };
        match state {
            PlayerState::Stopped => machine.stop(),
            PlayerState::Starting => machine.load_media(Some(clip()), false, Duration::ZERO),
            PlayerState::Playing => {}
            PlayerState::Paused => machine.pause(),
        }
        assert_eq!(machine.player_state(), state);
        machine
    }

    fn remote_in(state: PlayerState) -> (PlaybackStateMachine<FakeEngine>, Arc<Mutex<Vec<RemoteCall>>>) {
        let mut machine = PlaybackStateMachine::new(FakeEngine::default());
        let (remote, calls) = fake_remote();
        machine.remote_session_started(remote);
        machine.load_media(Some(clip()), state != PlayerState::Starting, Duration::ZERO);
        match state {
            PlayerState::Starting => {}
            PlayerState::Paused => {
                machine.handle_remote_event(remote_status(RemotePlayerState::Paused, 0, Some("Clip A")))
            }
            PlayerState::Playing | PlayerState::Stopped => {
                machine.handle_remote_event(remote_status(RemotePlayerState::Playing, 0, Some("Clip A")))
            }
        }
        if state == PlayerState::Stopped {
            machine.stop();
        }
        assert_eq!(machine.player_state(), state);
        calls.lock().unwrap().clear();
        (machine, calls)
    }

    #[test]
    fn test_local_transition_table() {
        use Command::*;
        use PlayerState::{Paused as P, Playing as G, Starting as S, Stopped as X};

        let load = || vec![Call::Load(Duration::ZERO)];
        let none = Vec::new;
        let cases: Vec<(PlayerState, Command, PlayerState, Vec<Call>)> = vec![
            (X, Play, S, load()),
            (X, Pause, X, none()),
            (X, Stop, X, none()),
            (X, TogglePause, S, load()),
            (X, PlayButton, S, load()),
            (X, Seek, X, none()),
            (X, ShowSplash, X, none()),
            (S, Play, S, none()),
            (S, Pause, S, none()),
            (S, Stop, X, vec![Call::Stop]),
            (S, TogglePause, S, none()),
            (S, PlayButton, S, none()),
            (S, Seek, S, none()),
            (S, ShowSplash, X, vec![Call::Stop]),
            (G, Play, G, none()),
            (G, Pause, P, vec![Call::Pause]),
            (G, Stop, X, vec![Call::Stop]),
            (G, TogglePause, P, vec![Call::Pause]),
            (G, PlayButton, P, vec![Call::Pause]),
            (G, Seek, G, vec![Call::Seek(secs(30))]),
            (G, ShowSplash, X, vec![Call::Stop]),
            (P, Play, G, vec![Call::Play]),
            (P, Pause, P, none()),
            (P, Stop, X, vec![Call::Stop]),
            (P, TogglePause, G, vec![Call::Play]),
            (P, PlayButton, G, vec![Call::Play]),
            (P, Seek, P, vec![Call::Seek(secs(30))]),
            (P, ShowSplash, X, vec![Call::Stop]),
        ];

        for (from, command, to, expected) in cases {
            let mut machine = local_in(from);
            let before = machine.engine().calls.len();
            apply(&mut machine, command);
            assert_eq!(machine.player_state(), to, "{:?} from {:?}", command, from);
            assert_eq!(
                machine.engine().calls[before..],
                expected[..],
                "{:?} from {:?}",
                command,
                from
            );
        }
    }

    #[test]
    fn test_remote_transition_table() {
        use Command::*;
        use PlayerState::{Paused as P, Playing as G, Starting as S, Stopped as X};

        let restart = || {
            vec![RemoteCall::Load {
                position: Duration::ZERO,
                autoplay: true,
            }]
        };
        let none = Vec::new;
        let cases: Vec<(PlayerState, Command, PlayerState, Vec<RemoteCall>)> = vec![
            (X, Play, S, restart()),
            (X, Pause, X, none()),
            (X, Stop, X, none()),
            (X, TogglePause, S, restart()),
            (X, PlayButton, S, restart()),
            (X, Seek, X, none()),
            (X, ShowSplash, X, none()),
            (S, Play, S, vec![RemoteCall::Play]),
            (S, Pause, S, vec![RemoteCall::Pause]),
            (S, Stop, X, vec![RemoteCall::Stop]),
            (S, TogglePause, S, vec![RemoteCall::Play]),
            (S, PlayButton, S, vec![RemoteCall::Play]),
            (S, Seek, S, none()),
            (S, ShowSplash, X, vec![RemoteCall::Stop]),
            // The receiver's next status confirms the change
            (G, Play, G, vec![RemoteCall::Play]),
            (G, Pause, G, vec![RemoteCall::Pause]),
            (G, Stop, X, vec![RemoteCall::Stop]),
            (G, TogglePause, G, vec![RemoteCall::Pause]),
            (G, PlayButton, G, vec![RemoteCall::Pause]),
            (G, Seek, G, vec![RemoteCall::Seek(secs(30))]),
            (G, ShowSplash, X, vec![RemoteCall::Stop]),
            (P, Play, P, vec![RemoteCall::Play]),
            (P, Pause, P, none()),
            (P, Stop, X, vec![RemoteCall::Stop]),
            (P, TogglePause, P, vec![RemoteCall::Play]),
            (P, PlayButton, P, vec![RemoteCall::Play]),
            (P, Seek, P, vec![RemoteCall::Seek(secs(30))]),
            (P, ShowSplash, X, vec![RemoteCall::Stop]),
        ];

        for (from, command, to, expected) in cases {
            let (mut machine, calls) = remote_in(from);
            apply(&mut machine, command);
            assert_eq!(machine.player_state(), to, "{:?} from {:?}", command, from);
            assert_eq!(*calls.lock().unwrap(), expected, "{:?} from {:?}", command, from);
            assert!(
                machine.engine().calls.is_empty(),
                "{:?} from {:?} reached the engine",
                command,
                from
            );
        }
    }
}
