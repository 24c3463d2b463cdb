//! Wall-clock volume envelopes.
//!
//! An envelope is evaluated once per emitted chunk, so linear interpolation
//! against `Instant` is precise enough: the step between two chunks is a
//! few tens of milliseconds of ramp.

use std::time::{Duration, Instant};

/// Direction of a running fade.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FadeKind {
    In,
    Out,
}

/// Linear volume ramp of fixed duration.
///
/// At most one fade is armed at a time; arming replaces the previous one.
/// Once the ramp completes the envelope deactivates and keeps reporting its
/// target volume.
#[derive(Debug, Clone)]
pub struct FadeEnvelope {
    duration: Duration,
    kind: Option<FadeKind>,
    start_time: Instant,
    start_volume: f32,
    target_volume: f32,
    active: bool,
}

impl FadeEnvelope {
    pub fn new(duration: Duration) -> Self {
        Self {
            duration,
            kind: None,
            start_time: Instant::now(),
            start_volume: 1.0,
            target_volume: 1.0,
            active: false,
        }
    }

    pub const fn kind(&self) -> Option<FadeKind> {
        self.kind
    }

    pub const fn is_active(&self) -> bool {
        self.active
    }

    pub const fn target_volume(&self) -> f32 {
        self.target_volume
    }

    /// Ramp from silence up to `target_volume`, starting now.
    pub fn start_fade_in(&mut self, target_volume: f32) {
        self.start_fade_in_at(target_volume, Instant::now());
    }

    /// Ramp from `current_volume` down to silence, starting now.
    pub fn start_fade_out(&mut self, current_volume: f32) {
        self.start_fade_out_at(current_volume, Instant::now());
    }

    pub fn start_fade_in_at(&mut self, target_volume: f32, now: Instant) {
        self.arm(FadeKind::In, 0.0, target_volume, now);
    }

    pub fn start_fade_out_at(&mut self, current_volume: f32, now: Instant) {
        self.arm(FadeKind::Out, current_volume, 0.0, now);
    }

    fn arm(&mut self, kind: FadeKind, start_volume: f32, target_volume: f32, now: Instant) {
        self.kind = Some(kind);
        self.start_time = now;
        self.start_volume = start_volume;
        self.target_volume = target_volume;
        self.active = true;
    }

    /// Abandon the running ramp where it is.
    pub fn cancel(&mut self) {
        self.active = false;
    }

    /// Follow a volume change without restarting the ramp.
    ///
    /// A fade-in moves its target. A fade-out may only lower its starting
    /// level, so its output never rises on the way to silence.
    pub fn retarget(&mut self, volume: f32) {
        if !self.active {
            return;
        }
        match self.kind {
            Some(FadeKind::In) => self.target_volume = volume,
            Some(FadeKind::Out) => self.start_volume = self.start_volume.min(volume),
            None => {}
        }
    }

    /// Current multiplier; deactivates the envelope once the ramp is complete.
    pub fn get_volume_multiplier(&mut self) -> f32 {
        self.volume_at(Instant::now())
    }

    /// Multiplier at `now`.
    ///
    /// Never returns a value past the target: when the ramp has run its full
    /// duration the target is returned exactly.
    pub fn volume_at(&mut self, now: Instant) -> f32 {
        if !self.active {
            return self.target_volume;
        }

        let elapsed = now.saturating_duration_since(self.start_time);
        let progress = (elapsed.as_secs_f32() / self.duration.as_secs_f32()).min(1.0);

        if progress >= 1.0 {
            self.active = false;
            return self.target_volume;
        }

        match self.kind {
            Some(FadeKind::In) => {
                self.start_volume + (self.target_volume - self.start_volume) * progress
            }
            Some(FadeKind::Out) => self.start_volume * (1.0 - progress),
            None => self.target_volume,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use proptest::prelude::*;

    const SECOND: Duration = Duration::from_secs(1);

    #[test]
    #[allow(clippy::float_cmp)]
    fn test_inactive_reports_target() {
        let mut fade = FadeEnvelope::new(SECOND);
        assert!(!fade.is_active());
        assert_eq!(fade.get_volume_multiplier(), 1.0);
    }

    #[test]
    fn test_fade_in_ramps_linearly() {
        let start = Instant::now();
        let mut fade = FadeEnvelope::new(SECOND);
        fade.start_fade_in_at(0.8, start);

        assert_eq!(fade.kind(), Some(FadeKind::In));
        assert_relative_eq!(fade.volume_at(start), 0.0);
        assert_relative_eq!(fade.volume_at(start + SECOND / 4), 0.2, epsilon = 1e-6);
        assert_relative_eq!(fade.volume_at(start + SECOND / 2), 0.4, epsilon = 1e-6);
        assert!(fade.is_active());
    }

    #[test]
    fn test_fade_out_ramps_to_silence() {
        let start = Instant::now();
        let mut fade = FadeEnvelope::new(SECOND);
        fade.start_fade_out_at(0.6, start);

        assert_relative_eq!(fade.volume_at(start), 0.6);
        assert_relative_eq!(fade.volume_at(start + SECOND / 2), 0.3, epsilon = 1e-6);
    }

    #[test]
    #[allow(clippy::float_cmp)]
    fn test_completion_clamps_to_target_and_deactivates() {
        let start = Instant::now();
        let mut fade = FadeEnvelope::new(SECOND);
        fade.start_fade_in_at(0.7, start);

        assert_eq!(fade.volume_at(start + SECOND * 3), 0.7);
        assert!(!fade.is_active());
        // Resting value persists after completion.
        assert_eq!(fade.volume_at(start + SECOND * 10), 0.7);

        fade.start_fade_out_at(0.7, start);
        assert_eq!(fade.volume_at(start + SECOND), 0.0);
        assert!(!fade.is_active());
    }

    #[test]
    fn test_arming_replaces_running_fade() {
        let start = Instant::now();
        let mut fade = FadeEnvelope::new(SECOND);
        fade.start_fade_in_at(1.0, start);
        fade.start_fade_out_at(0.5, start + SECOND / 2);

        assert_eq!(fade.kind(), Some(FadeKind::Out));
        assert_relative_eq!(fade.volume_at(start + SECOND / 2), 0.5);
    }

    #[test]
    fn test_retarget_keeps_progress() {
        let start = Instant::now();
        let mut fade = FadeEnvelope::new(SECOND);
        fade.start_fade_in_at(0.4, start);
        fade.retarget(0.8);
        assert_relative_eq!(fade.volume_at(start + SECOND / 2), 0.4, epsilon = 1e-6);

        fade.start_fade_out_at(0.8, start);
        fade.retarget(0.4);
        assert_relative_eq!(fade.volume_at(start + SECOND / 2), 0.2, epsilon = 1e-6);
        assert_relative_eq!(fade.target_volume(), 0.0);
    }

    #[test]
    fn test_raising_volume_does_not_lift_fade_out() {
        let start = Instant::now();
        let mut fade = FadeEnvelope::new(SECOND);
        fade.start_fade_out_at(0.2, start);
        let before = fade.volume_at(start + SECOND / 2);
        assert_relative_eq!(before, 0.1, epsilon = 1e-6);

        fade.retarget(1.0);
        let after = fade.volume_at(start + SECOND / 2 + Duration::from_millis(10));
        assert!(after <= before, "fade-out rose from {before} to {after}");
    }

    #[test]
    fn test_cancel_deactivates() {
        let start = Instant::now();
        let mut fade = FadeEnvelope::new(SECOND);
        fade.start_fade_out_at(0.5, start);
        fade.cancel();
        assert!(!fade.is_active());
        assert_relative_eq!(fade.volume_at(start + SECOND / 2), 0.0);
    }

    #[test]
    #[allow(clippy::float_cmp)]
    fn test_retarget_ignored_when_inactive() {
        let mut fade = FadeEnvelope::new(SECOND);
        fade.retarget(0.2);
        assert_eq!(fade.target_volume(), 1.0);
    }

    proptest! {
        #[test]
        fn fade_in_is_non_decreasing(
            target in 0.0f32..=1.0,
            mut offsets in proptest::collection::vec(0u64..2_000, 1..40),
        ) {
            offsets.sort_unstable();
            let start = Instant::now();
            let mut fade = FadeEnvelope::new(SECOND);
            fade.start_fade_in_at(target, start);

            let mut last = 0.0f32;
            for ms in offsets {
                let value = fade.volume_at(start + Duration::from_millis(ms));
                prop_assert!(value >= last);
                prop_assert!(value <= target);
                last = value;
            }
        }

        #[test]
        fn fade_out_is_non_increasing(
            from in 0.0f32..=1.0,
            mut offsets in proptest::collection::vec(0u64..2_000, 1..40),
        ) {
            offsets.sort_unstable();
            let start = Instant::now();
            let mut fade = FadeEnvelope::new(SECOND);
            fade.start_fade_out_at(from, start);

            let mut last = from;
            for ms in offsets {
                let value = fade.volume_at(start + Duration::from_millis(ms));
                prop_assert!(value <= last);
                prop_assert!(value >= 0.0);
                last = value;
            }
        }

        #[test]
        fn fade_out_never_rises_across_volume_changes(
            from in 0.0f32..=1.0,
            mut steps in proptest::collection::vec((0u64..2_000, proptest::option::of(0.0f32..=1.0)), 1..40),
        ) {
            steps.sort_unstable_by_key(|(ms, _)| *ms);
            let start = Instant::now();
            let mut fade = FadeEnvelope::new(SECOND);
            fade.start_fade_out_at(from, start);

            let mut last = from;
            for (ms, volume) in steps {
                if let Some(volume) = volume {
                    fade.retarget(volume);
                }
                let value = fade.volume_at(start + Duration::from_millis(ms));
                prop_assert!(value <= last, "rose from {} to {}", last, value);
                prop_assert!(value >= 0.0);
                last = value;
            }
        }

        #[test]
        fn completed_fade_equals_target(
            target in 0.0f32..=1.0,
            extra_ms in 0u64..5_000,
        ) {
            let start = Instant::now();
            let mut fade = FadeEnvelope::new(SECOND);
            fade.start_fade_in_at(target, start);
            let value = fade.volume_at(start + SECOND + Duration::from_millis(extra_ms));
            prop_assert_eq!(value, target);
            prop_assert!(!fade.is_active());
        }
    }
}
