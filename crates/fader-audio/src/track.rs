//! In-memory track buffer.

use std::path::Path;

use fader_core::{Error, Result};
use tracing::info;

use crate::decode::TrackDecoder;

/// A fully decoded track.
///
/// Samples are interleaved frames of `channels` values each. Mono sources are
/// widened to two channels so every track plays through a stereo stream.
/// Immutable after construction.
#[derive(Debug, Clone)]
pub struct Track {
    samples: Vec<f32>,
    sample_rate: u32,
    channels: u16,
}

impl Track {
    /// Decode the whole file at `path` into memory.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let decoder = TrackDecoder::open(path)?;
        let sample_rate = decoder.sample_rate();
        let (samples, channels) = decoder.decode_all()?;

        let track = Self::from_interleaved(samples, sample_rate, channels)?;
        info!(
            "Loaded {}: {} frames, {} Hz, {} channels, {:.2}s",
            path.display(),
            track.frame_count(),
            track.sample_rate,
            track.channels,
            track.duration()
        );
        Ok(track)
    }

    /// Build a track from already decoded interleaved samples.
    ///
    /// A trailing partial frame is dropped.
    pub fn from_interleaved(samples: Vec<f32>, sample_rate: u32, channels: u16) -> Result<Self> {
        if sample_rate == 0 {
            return Err(Error::Load("sample rate must be positive".to_string()));
        }
        if channels == 0 {
            return Err(Error::Load("channel count must be positive".to_string()));
        }

        let (mut samples, channels) = if channels == 1 {
            (samples.iter().flat_map(|&s| [s, s]).collect(), 2)
        } else {
            (samples, channels)
        };

        let whole = samples.len() - samples.len() % usize::from(channels);
        samples.truncate(whole);

        if samples.is_empty() {
            return Err(Error::Load("track contains no audio frames".to_string()));
        }

        Ok(Self {
            samples,
            sample_rate,
            channels,
        })
    }

    pub const fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub const fn channels(&self) -> u16 {
        self.channels
    }

    /// Number of frames in the buffer.
    pub fn frame_count(&self) -> usize {
        self.samples.len() / usize::from(self.channels)
    }

    /// Track length in seconds, derived from the frame count.
    pub fn duration(&self) -> f64 {
        self.frame_count() as f64 / f64::from(self.sample_rate)
    }

    /// Interleaved samples for up to `len` frames starting at frame `start`.
    ///
    /// Clamped at the end of the buffer, so the slice may be short or empty.
    pub fn frames(&self, start: usize, len: usize) -> &[f32] {
        let channels = usize::from(self.channels);
        let total = self.frame_count();
        let start = start.min(total);
        let end = start.saturating_add(len).min(total);
        &self.samples[start * channels..end * channels]
    }

    /// All interleaved samples.
    pub fn samples(&self) -> &[f32] {
        &self.samples
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use approx::assert_relative_eq;
    use std::path::PathBuf;

    fn write_wav(dir: &tempfile::TempDir, name: &str, channels: u16, frames: &[i16]) -> PathBuf {
        let path = dir.path().join(name);
        let spec = hound::WavSpec {
            channels,
            sample_rate: 8000,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(&path, spec).unwrap();
        for &sample in frames {
            writer.write_sample(sample).unwrap();
        }
        writer.finalize().unwrap();
        path
    }

    #[test]
    fn test_mono_is_duplicated_to_stereo() {
        let track = Track::from_interleaved(vec![0.1, 0.2, 0.3], 44_100, 1).unwrap();
        assert_eq!(track.channels(), 2);
        assert_eq!(track.frame_count(), 3);
        assert_eq!(track.samples(), &[0.1, 0.1, 0.2, 0.2, 0.3, 0.3]);
    }

    #[test]
    fn test_duration_is_derived() {
        let track = Track::from_interleaved(vec![0.0; 44_100 * 2 * 10], 44_100, 2).unwrap();
        assert_relative_eq!(track.duration(), 10.0);
    }

    #[test]
    fn test_frames_clamp_at_end() {
        let samples: Vec<f32> = (0..10).map(|i| i as f32).collect();
        let track = Track::from_interleaved(samples, 10, 2).unwrap();

        assert_eq!(track.frames(0, 2), &[0.0, 1.0, 2.0, 3.0]);
        assert_eq!(track.frames(4, 3), &[8.0, 9.0]);
        assert!(track.frames(5, 3).is_empty());
        assert!(track.frames(50, 3).is_empty());
    }

    #[test]
    fn test_partial_frame_dropped() {
        let track = Track::from_interleaved(vec![0.0; 7], 8000, 2).unwrap();
        assert_eq!(track.frame_count(), 3);
    }

    #[test]
    fn test_rejects_empty_and_degenerate_input() {
        assert!(Track::from_interleaved(Vec::new(), 8000, 2).unwrap_err().is_load_error());
        assert!(Track::from_interleaved(vec![0.0; 4], 0, 2).is_err());
        assert!(Track::from_interleaved(vec![0.0; 4], 8000, 0).is_err());
    }

    #[test]
    fn test_load_mono_wav() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_wav(&dir, "mono.wav", 1, &[0, i16::MAX / 2, i16::MIN / 2, 0]);

        let track = Track::load(&path).unwrap();
        assert_eq!(track.sample_rate(), 8000);
        assert_eq!(track.channels(), 2);
        assert_eq!(track.frame_count(), 4);

        let second = track.frames(1, 1);
        assert_relative_eq!(second[0], second[1]);
        assert_relative_eq!(second[0], 0.5, epsilon = 1e-3);
    }

    #[test]
    fn test_load_stereo_wav() {
        let frames: Vec<i16> = (0..8000).flat_map(|_| [1000, -1000]).collect();
        let dir = tempfile::tempdir().unwrap();
        let path = write_wav(&dir, "stereo.wav", 2, &frames);

        let track = Track::load(&path).unwrap();
        assert_eq!(track.channels(), 2);
        assert_eq!(track.frame_count(), 8000);
        assert_relative_eq!(track.duration(), 1.0);
        assert!(track.frames(0, 1)[0] > 0.0);
        assert!(track.frames(0, 1)[1] < 0.0);
    }

    #[test]
    fn test_load_missing_file() {
        let err = Track::load("/definitely/not/here.wav").unwrap_err();
        assert!(err.is_load_error());
    }

    #[test]
    fn test_load_corrupt_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("noise.wav");
        std::fs::write(&path, b"this is not audio at all").unwrap();

        let err = Track::load(&path).unwrap_err();
        assert!(err.is_load_error(), "unexpected error: {err}");
    }
}
