//! Host callbacks requested by the state machine

use super::PlaybackError;
use crate::models::NavBarStyle;

/// Presentation side effects and play-button interception.
///
/// Held weakly by the state machine; a dropped delegate is skipped. The last
/// two methods are optional and have defaults.
pub trait PlaybackDelegate {
    fn set_navigation_bar_style(&self, style: NavBarStyle);

    fn hide_navigation_bar(&self, hidden: bool);

    /// Called when the play button is pressed on the splash screen. Returning
    /// `false` keeps the state machine from starting local playback, e.g. so
    /// the host can start a cast session instead.
    fn continue_after_play_button_clicked(&self) -> bool {
        true
    }

    /// Playback was forced back to the splash screen by an error
    fn playback_did_fail(&self, _error: &PlaybackError) {}
}
