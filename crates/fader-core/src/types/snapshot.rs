//! Point-in-time view of an engine for UI reflection.

use serde::Serialize;

use super::{Duration, PlayerState, Position};

/// Everything a front end needs to redraw one player.
///
/// Fields may be stale by one playback-loop iteration.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EngineSnapshot {
    pub track_name: String,
    pub state: PlayerState,
    /// Fraction of the track played, `None` while a seek is being committed.
    pub position: Option<f64>,
    /// Track length in seconds.
    pub duration: f64,
    pub volume: f32,
    pub looping: bool,
    pub fade_enabled: bool,
    pub seek_fade_enabled: bool,
}

impl EngineSnapshot {
    /// Elapsed time, if the position is currently known.
    pub fn elapsed(&self) -> Option<Position> {
        self.position
            .map(|fraction| Position::from_seconds(fraction * self.duration))
    }

    /// `elapsed / total` label, e.g. `0:42 / 3:10`.
    pub fn time_label(&self) -> Option<String> {
        let elapsed = self.elapsed()?;
        Some(format!(
            "{} / {}",
            elapsed.format(),
            Duration::from_secs_f64(self.duration).format()
        ))
    }
}
