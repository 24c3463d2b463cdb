//! Command-line interface definitions.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Result};
use clap::Parser;
use fader_core::EngineConfig;

#[derive(Parser, Debug)]
#[command(name = "fader", version, about = "Play one audio file with fades and smooth seeking")]
pub struct Args {
    /// Path to the audio file
    #[arg(required_unless_present = "list_devices")]
    pub path: Option<PathBuf>,

    /// List output devices and exit
    #[arg(long)]
    pub list_devices: bool,

    /// Use a specific output device by substring match
    #[arg(long)]
    pub device: Option<String>,

    /// Initial volume (0.0 to 1.0)
    #[arg(long, default_value_t = 0.5)]
    pub volume: f32,

    /// Fade on play, pause and stop
    #[arg(long)]
    pub fade: bool,

    /// Jump straight to the seek target instead of fading around it
    #[arg(long)]
    pub no_seek_fade: bool,

    /// Restart from the beginning when the track ends
    #[arg(long = "loop")]
    pub looping: bool,

    /// Frames rendered per playback-loop iteration
    #[arg(long, default_value_t = fader_core::config::DEFAULT_CHUNK_SIZE)]
    pub chunk_size: usize,

    /// Length of play/pause/stop fades in seconds
    #[arg(long, default_value_t = 1.5)]
    pub fade_secs: f64,

    /// Length of each half of the seek fade in seconds
    #[arg(long, default_value_t = 0.3)]
    pub seek_fade_secs: f64,

    /// Load the track without starting playback
    #[arg(long)]
    pub paused: bool,

    /// Print status updates as JSON lines
    #[arg(long)]
    pub json: bool,
}

impl Args {
    /// Engine settings requested on the command line.
    pub fn engine_config(&self) -> Result<EngineConfig> {
        let config = EngineConfig::default()
            .with_volume(self.volume)
            .with_fade_enabled(self.fade)
            .with_seek_fade_enabled(!self.no_seek_fade)
            .with_looping(self.looping)
            .with_chunk_size(self.chunk_size)
            .with_fade_duration(seconds("--fade-secs", self.fade_secs)?)
            .with_seek_fade_duration(seconds("--seek-fade-secs", self.seek_fade_secs)?)
            .with_autoplay(!self.paused)
            .with_device(self.device.clone());

        config.validate()?;
        Ok(config)
    }
}

/// Whole milliseconds, so `0.3` means exactly 300 ms.
fn seconds(flag: &str, value: f64) -> Result<Duration> {
    if !value.is_finite() || value < 0.0 {
        bail!("{flag} must be a non-negative number of seconds, got {value}");
    }
    Ok(Duration::from_millis((value * 1000.0).round() as u64))
}
