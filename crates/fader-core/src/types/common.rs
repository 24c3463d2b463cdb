//! Common value types shared across the engine and its front ends.

#![allow(clippy::unwrap_used)] // Tests use unwrap for brevity

use serde::{Deserialize, Serialize};

/// Duration in whole seconds.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Default)]
pub struct Duration(pub u64);

impl Duration {
    pub const fn from_seconds(seconds: u64) -> Self {
        Self(seconds)
    }

    /// Truncates a fractional length in seconds; negative or NaN input is zero.
    pub fn from_secs_f64(seconds: f64) -> Self {
        if seconds.is_finite() && seconds > 0.0 {
            Self(seconds as u64)
        } else {
            Self(0)
        }
    }

    pub const fn as_seconds(&self) -> u64 {
        self.0
    }

    /// Format as M:SS or H:MM:SS.
    pub fn format(&self) -> String {
        let total_secs = self.0;
        let hours = total_secs / 3600;
        let minutes = (total_secs % 3600) / 60;
        let seconds = total_secs % 60;

        if hours > 0 {
            format!("{hours}:{minutes:02}:{seconds:02}")
        } else {
            format!("{minutes}:{seconds:02}")
        }
    }
}

impl From<u64> for Duration {
    fn from(seconds: u64) -> Self {
        Self(seconds)
    }
}

/// Playback position in milliseconds.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Default)]
pub struct Position(pub u64);

impl Position {
    pub const fn from_millis(millis: u64) -> Self {
        Self(millis)
    }

    pub fn from_seconds(seconds: f64) -> Self {
        if seconds.is_finite() && seconds > 0.0 {
            Self((seconds * 1000.0) as u64)
        } else {
            Self(0)
        }
    }

    pub const fn as_millis(&self) -> u64 {
        self.0
    }

    pub fn as_seconds(&self) -> f64 {
        self.0 as f64 / 1000.0
    }

    /// Format as M:SS or H:MM:SS.
    pub fn format(&self) -> String {
        Duration::from_seconds(self.0 / 1000).format()
    }
}

/// Volume level (0.0 to 1.0).
///
/// Every construction path clamps, so a stored `Volume` is always in range.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, PartialOrd)]
pub struct Volume(f32);

impl Volume {
    pub const MIN: Self = Self(0.0);
    pub const MAX: Self = Self(1.0);
    pub const DEFAULT: Self = Self(0.5);

    /// Clamp `value` into `[0, 1]`. NaN maps to silence.
    pub fn new(value: f32) -> Self {
        if value.is_nan() {
            Self::MIN
        } else {
            Self(value.clamp(0.0, 1.0))
        }
    }

    pub const fn as_f32(&self) -> f32 {
        self.0
    }

    pub fn as_percentage(&self) -> u8 {
        (self.0 * 100.0).round() as u8
    }
}

impl Default for Volume {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl From<f32> for Volume {
    fn from(value: f32) -> Self {
        Self::new(value)
    }
}

/// Clamp a fractional track position into `[0, 1]`. NaN maps to the start.
pub fn clamp_unit(position: f64) -> f64 {
    if position.is_nan() {
        0.0
    } else {
        position.clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_duration_format() {
        assert_eq!(Duration::from_seconds(0).format(), "0:00");
        assert_eq!(Duration::from_seconds(65).format(), "1:05");
        assert_eq!(Duration::from_seconds(3725).format(), "1:02:05");
        assert_eq!(Duration::from_secs_f64(10.9).as_seconds(), 10);
        assert_eq!(Duration::from_secs_f64(f64::NAN), Duration(0));
    }

    #[test]
    fn test_position_format() {
        let pos = Position::from_seconds(42.7);
        assert_eq!(pos.as_millis(), 42_700);
        assert_eq!(pos.format(), "0:42");
        assert_eq!(Position::from_seconds(-3.0), Position(0));
    }

    #[test]
    #[allow(clippy::float_cmp)]
    fn test_volume_clamps() {
        assert_eq!(Volume::new(1.5).as_f32(), 1.0);
        assert_eq!(Volume::new(-0.2).as_f32(), 0.0);
        assert_eq!(Volume::new(f32::NAN).as_f32(), 0.0);
        assert_eq!(Volume::new(0.754).as_percentage(), 75);
        assert_eq!(Volume::default().as_percentage(), 50);
    }

    #[test]
    #[allow(clippy::float_cmp)]
    fn test_clamp_unit() {
        assert_eq!(clamp_unit(0.25), 0.25);
        assert_eq!(clamp_unit(2.0), 1.0);
        assert_eq!(clamp_unit(-1.0), 0.0);
        assert_eq!(clamp_unit(f64::NAN), 0.0);
    }

    #[test]
    fn test_volume_serializes_as_number() {
        let json = serde_json::to_string(&Volume::new(0.25)).unwrap();
        assert_eq!(json, "0.25");
    }

    proptest! {
        #[test]
        fn volume_is_always_clamped(v in proptest::num::f32::ANY) {
            let stored = Volume::new(v).as_f32();
            prop_assert!((0.0..=1.0).contains(&stored));
            if !v.is_nan() {
                prop_assert_eq!(stored, v.clamp(0.0, 1.0));
            }
        }
    }
}
