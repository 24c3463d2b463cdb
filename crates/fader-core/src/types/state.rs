//! Playback state of a single engine instance.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Playback state of the engine.
///
/// `Stopped` is both the resting state before the first play request and
/// the terminal state of a playback session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlayerState {
    #[default]
    Stopped,
    Playing,
    Paused,
    /// Manual fade-in after a play request.
    FadingIn,
    /// Manual fade-out after a pause or stop request.
    FadingOut,
    /// Seek fade-out running; the position jump has not been committed yet.
    Seeking,
    /// Seek committed, seek fade-in running.
    FadingInAfterSeek,
}

impl PlayerState {
    /// Whether the engine emits audio chunks in this state.
    pub const fn is_audible(self) -> bool {
        matches!(
            self,
            Self::Playing | Self::FadingIn | Self::FadingOut | Self::Seeking | Self::FadingInAfterSeek
        )
    }

    /// Whether a volume envelope is shaping the output.
    pub const fn is_fading(self) -> bool {
        matches!(
            self,
            Self::FadingIn | Self::FadingOut | Self::Seeking | Self::FadingInAfterSeek
        )
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Stopped => "stopped",
            Self::Playing => "playing",
            Self::Paused => "paused",
            Self::FadingIn => "fading in",
            Self::FadingOut => "fading out",
            Self::Seeking => "seeking",
            Self::FadingInAfterSeek => "fading in after seek",
        }
    }
}

impl fmt::Display for PlayerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}
