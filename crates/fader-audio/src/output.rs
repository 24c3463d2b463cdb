//! Audio output sinks.
//!
//! The playback loop talks to an [`AudioSink`]: a blocking "submit chunk"
//! primitive. [`CpalSink`] implements it on top of a cpal output stream by
//! parking the producer on a bounded [`SampleQueue`] that the device callback
//! drains.

pub mod queue;

use std::sync::Arc;
use std::time::Duration;

use cpal::{
    traits::{DeviceTrait, HostTrait, StreamTrait},
    Device, SampleFormat, Stream, StreamConfig, SupportedStreamConfig,
};
use fader_core::{Error, Result};
use tracing::{debug, error, info, warn};

pub use queue::{PushError, SampleQueue};

/// Frames buffered between the playback thread and the device.
const BUFFER_FRAMES: usize = 4096;

/// How long a write may wait for the device to make room before it is
/// treated as a dead stream.
const STALL_TIMEOUT: Duration = Duration::from_secs(2);

/// Destination for rendered audio chunks.
///
/// `write` blocks until the chunk has been accepted by the device queue;
/// that blocking is what paces playback. `close` flushes, releases the
/// device, and may be called any number of times.
pub trait AudioSink {
    /// Submit interleaved samples.
    fn write(&mut self, chunk: &[f32]) -> Result<()>;

    /// Flush and release the device. Idempotent.
    fn close(&mut self);
}

/// Audio output stream configuration.
#[derive(Debug, Clone)]
pub struct OutputConfig {
    pub sample_rate: u32,
    pub channels: u16,
    pub sample_format: SampleFormat,
}

/// Blocking sink backed by a cpal output stream.
///
/// cpal streams are not `Send` on every host, so a `CpalSink` must be opened
/// on the thread that will write to it.
pub struct CpalSink {
    stream: Option<Stream>,
    queue: Arc<SampleQueue>,
    config: OutputConfig,
    device_name: String,
}

impl CpalSink {
    /// Open an output stream at exactly `sample_rate` and `channels`.
    ///
    /// `device` selects an output by case-insensitive name substring; the
    /// host default is used when it is `None`.
    pub fn open(sample_rate: u32, channels: u16, device: Option<&str>) -> Result<Self> {
        let host = cpal::default_host();
        let device = pick_device(&host, device)?;
        let device_name = device.name().unwrap_or_else(|_| "Unknown".to_string());
        info!("Using audio output device: {device_name}");

        let supported = pick_output_config(&device, sample_rate, channels)?;
        let sample_format = supported.sample_format();
        let config: StreamConfig = supported.into();

        let output_config = OutputConfig {
            sample_rate,
            channels,
            sample_format,
        };
        let queue = Arc::new(SampleQueue::new(BUFFER_FRAMES * usize::from(channels)));

        debug!(
            "Output config: {}Hz, {} channels, {:?}",
            output_config.sample_rate, output_config.channels, sample_format
        );

        let stream = match sample_format {
            SampleFormat::F32 => build_stream::<f32>(&device, &config, &queue)?,
            SampleFormat::I16 => build_stream::<i16>(&device, &config, &queue)?,
            SampleFormat::U16 => build_stream::<u16>(&device, &config, &queue)?,
            other => {
                return Err(Error::Device(format!(
                    "Unsupported sample format: {other:?}"
                )));
            }
        };

        stream
            .play()
            .map_err(|e| Error::Device(format!("Failed to start stream: {e}")))?;

        Ok(Self {
            stream: Some(stream),
            queue,
            config: output_config,
            device_name,
        })
    }

    pub const fn config(&self) -> &OutputConfig {
        &self.config
    }

    pub fn device_name(&self) -> &str {
        &self.device_name
    }

    /// Time it takes the device to play `samples` interleaved samples.
    fn play_time(&self, samples: usize) -> Duration {
        let frames = samples / usize::from(self.config.channels.max(1));
        Duration::from_secs_f64(frames as f64 / f64::from(self.config.sample_rate.max(1)))
    }
}

impl AudioSink for CpalSink {
    fn write(&mut self, chunk: &[f32]) -> Result<()> {
        if self.stream.is_none() {
            return Err(Error::Device("Output stream is closed".to_string()));
        }

        self.queue
            .push_blocking(chunk, STALL_TIMEOUT)
            .map_err(|e| match e {
                PushError::Closed => Error::Device("Output stream is closed".to_string()),
                PushError::Failed(reason) => Error::Device(format!("Output stream failed: {reason}")),
                PushError::Stalled => Error::Device(format!(
                    "Output device stopped consuming audio for {}s",
                    STALL_TIMEOUT.as_secs()
                )),
            })
    }

    fn close(&mut self) {
        let Some(stream) = self.stream.take() else {
            return;
        };

        // Let the tail of the track reach the speakers before tearing down.
        let tail = self.play_time(self.queue.len()) + Duration::from_millis(50);
        if !self.queue.wait_drained(tail.min(STALL_TIMEOUT)) {
            debug!("Output queue not drained before close");
        }
        self.queue.close();

        if let Err(e) = stream.pause() {
            debug!("Failed to pause stream on close: {e}");
        }
        drop(stream);
        info!("Audio output closed: {}", self.device_name);
    }
}

impl Drop for CpalSink {
    fn drop(&mut self) {
        self.close();
    }
}

fn build_stream<T>(device: &Device, config: &StreamConfig, queue: &Arc<SampleQueue>) -> Result<Stream>
where
    T: cpal::SizedSample + cpal::FromSample<f32>,
{
    let data_queue = Arc::clone(queue);
    let err_queue = Arc::clone(queue);
    let mut scratch: Vec<f32> = Vec::new();
    let mut starved = false;

    let err_fn = move |err: cpal::StreamError| {
        error!("Audio stream error: {err}");
        err_queue.fail(err.to_string());
    };

    device
        .build_output_stream(
            config,
            move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
                if scratch.len() < data.len() {
                    scratch.resize(data.len(), 0.0);
                }
                let buf = &mut scratch[..data.len()];
                let read = data_queue.pop_into(buf);
                buf[read..].fill(0.0);

                for (out, &sample) in data.iter_mut().zip(buf.iter()) {
                    *out = T::from_sample(sample);
                }

                // Silence while idle is expected; only log the transition.
                if read < data.len() && read > 0 && !starved {
                    warn!("Buffer underrun: needed {}, got {}", data.len(), read);
                }
                starved = read < data.len();
            },
            err_fn,
            None,
        )
        .map_err(|e| Error::Device(format!("Failed to build stream: {e}")))
}

/// Pick an output device by name substring (case-insensitive), or the host default.
pub fn pick_device(host: &cpal::Host, needle: Option<&str>) -> Result<Device> {
    let Some(needle) = needle else {
        return host
            .default_output_device()
            .ok_or_else(|| Error::Device("No output device found".to_string()));
    };

    let needle = needle.to_lowercase();
    host.output_devices()
        .map_err(|e| Error::Device(format!("Failed to list devices: {e}")))?
        .find(|d| {
            d.name()
                .map(|name| name.to_lowercase().contains(&needle))
                .unwrap_or(false)
        })
        .ok_or_else(|| Error::Device(format!("No output device matched: {needle}")))
}

/// Find a device config that plays `sample_rate` Hz with `channels` channels.
///
/// Prefers `f32`, then `i16`, then `u16`; other formats are not supported.
fn pick_output_config(device: &Device, sample_rate: u32, channels: u16) -> Result<SupportedStreamConfig> {
    let ranges = device
        .supported_output_configs()
        .map_err(|e| Error::Device(format!("Failed to get output configs: {e}")))?;

    ranges
        .filter(|range| {
            range.channels() == channels
                && range.min_sample_rate().0 <= sample_rate
                && sample_rate <= range.max_sample_rate().0
        })
        .filter_map(|range| format_rank(range.sample_format()).map(|rank| (rank, range)))
        .min_by_key(|(rank, _)| *rank)
        .map(|(_, range)| range.with_sample_rate(cpal::SampleRate(sample_rate)))
        .ok_or_else(|| {
            Error::Device(format!(
                "Device does not support {sample_rate} Hz with {channels} channels"
            ))
        })
}

const fn format_rank(format: SampleFormat) -> Option<u8> {
    match format {
        SampleFormat::F32 => Some(0),
        SampleFormat::I16 => Some(1),
        SampleFormat::U16 => Some(2),
        _ => None,
    }
}

/// List available output devices.
pub fn list_output_devices() -> Result<Vec<String>> {
    let host = cpal::default_host();

    let devices: Vec<String> = host
        .output_devices()
        .map_err(|e| Error::Device(format!("Failed to list devices: {e}")))?
        .filter_map(|d| d.name().ok())
        .collect();

    Ok(devices)
}

/// Get the default output device name.
pub fn default_device_name() -> Option<String> {
    let host = cpal::default_host();
    host.default_output_device().and_then(|d| d.name().ok())
}
