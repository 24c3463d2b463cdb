//! Engine configuration.

use std::time::Duration;

use crate::types::Volume;
use crate::{Error, Result};

/// Frames emitted per playback-loop iteration.
pub const DEFAULT_CHUNK_SIZE: usize = 1024;

/// Tuning and initial settings for one playback engine.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    /// Frames per emitted chunk.
    pub chunk_size: usize,
    /// Length of the manual fade used by play/pause/stop when fading is on.
    pub fade_duration: Duration,
    /// Length of each half of the fade bracketing a seek.
    pub seek_fade_duration: Duration,
    pub initial_volume: Volume,
    pub fade_enabled: bool,
    pub seek_fade_enabled: bool,
    pub looping: bool,
    /// Upper bound on how long an idle engine waits for the next command.
    pub idle_wait: Duration,
    /// Start playing as soon as the engine is constructed.
    pub autoplay: bool,
    /// Output device name filter (case-insensitive substring); default device if unset.
    pub device: Option<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            fade_duration: Duration::from_millis(1500),
            seek_fade_duration: Duration::from_millis(300),
            initial_volume: Volume::DEFAULT,
            fade_enabled: false,
            seek_fade_enabled: true,
            looping: false,
            idle_wait: Duration::from_millis(100),
            autoplay: true,
            device: None,
        }
    }
}

impl EngineConfig {
    pub const fn with_chunk_size(mut self, frames: usize) -> Self {
        self.chunk_size = frames;
        self
    }

    pub const fn with_fade_duration(mut self, duration: Duration) -> Self {
        self.fade_duration = duration;
        self
    }

    pub const fn with_seek_fade_duration(mut self, duration: Duration) -> Self {
        self.seek_fade_duration = duration;
        self
    }

    pub fn with_volume(mut self, volume: f32) -> Self {
        self.initial_volume = Volume::new(volume);
        self
    }

    pub const fn with_fade_enabled(mut self, enabled: bool) -> Self {
        self.fade_enabled = enabled;
        self
    }

    pub const fn with_seek_fade_enabled(mut self, enabled: bool) -> Self {
        self.seek_fade_enabled = enabled;
        self
    }

    pub const fn with_looping(mut self, looping: bool) -> Self {
        self.looping = looping;
        self
    }

    pub const fn with_idle_wait(mut self, wait: Duration) -> Self {
        self.idle_wait = wait;
        self
    }

    pub const fn with_autoplay(mut self, autoplay: bool) -> Self {
        self.autoplay = autoplay;
        self
    }

    pub fn with_device(mut self, device: Option<String>) -> Self {
        self.device = device;
        self
    }

    /// Reject settings the engine cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(Error::InvalidArgument(
                "chunk size must be at least one frame".to_string(),
            ));
        }
        if self.fade_duration.is_zero() {
            return Err(Error::InvalidArgument(
                "fade duration must be positive".to_string(),
            ));
        }
        if self.seek_fade_duration.is_zero() {
            return Err(Error::InvalidArgument(
                "seek fade duration must be positive".to_string(),
            ));
        }
        Ok(())
    }
}
