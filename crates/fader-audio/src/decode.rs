//! Audio file decoding using symphonia.

use std::fs::File;
use std::path::Path;

use fader_core::{Error, Result};
use symphonia::core::{
    audio::SampleBuffer,
    codecs::{Decoder, DecoderOptions, CODEC_TYPE_NULL},
    errors::Error as SymphoniaError,
    formats::{FormatOptions, FormatReader},
    io::{MediaSourceStream, MediaSourceStreamOptions},
    meta::MetadataOptions,
    probe::Hint,
};
use tracing::{debug, warn};

/// Decoder for the first audio track of a file.
pub struct TrackDecoder {
    format: Box<dyn FormatReader>,
    decoder: Box<dyn Decoder>,
    track_id: u32,
    sample_rate: u32,
    channels: Option<u16>,
    sample_buf: Option<SampleBuffer<f32>>,
}

impl TrackDecoder {
    /// Open and probe `path`.
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)
            .map_err(|e| Error::Load(format!("Cannot open {}: {e}", path.display())))?;
        let mss = MediaSourceStream::new(Box::new(file), MediaSourceStreamOptions::default());

        let mut hint = Hint::new();
        if let Some(ext) = path.extension().and_then(|ext| ext.to_str()) {
            hint.with_extension(ext);
        }

        let format_opts = FormatOptions {
            enable_gapless: true,
            ..Default::default()
        };

        let probed = symphonia::default::get_probe()
            .format(&hint, mss, &format_opts, &MetadataOptions::default())
            .map_err(|e| match e {
                SymphoniaError::Unsupported(what) => Error::UnsupportedFormat(format!(
                    "{}: {what}",
                    path.display()
                )),
                other => Error::Load(format!("Failed to probe {}: {other}", path.display())),
            })?;

        let format = probed.format;

        let track = format
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            .ok_or_else(|| Error::Load(format!("No audio tracks in {}", path.display())))?;

        let track_id = track.id;
        let sample_rate = track
            .codec_params
            .sample_rate
            .ok_or_else(|| Error::Load(format!("Unknown sample rate in {}", path.display())))?;
        let channels = track.codec_params.channels.map(|c| c.count() as u16);

        debug!(
            "Audio track: id={}, sample_rate={}, channels={:?}",
            track_id, sample_rate, channels
        );

        let decoder = symphonia::default::get_codecs()
            .make(&track.codec_params, &DecoderOptions::default())
            .map_err(|e| Error::UnsupportedFormat(format!("No decoder for {}: {e}", path.display())))?;

        Ok(Self {
            format,
            decoder,
            track_id,
            sample_rate,
            channels,
            sample_buf: None,
        })
    }

    pub const fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Decode the next packet into interleaved f32 samples.
    ///
    /// Returns `Ok(None)` at end of stream. Corrupt packets are skipped.
    pub fn decode_next(&mut self) -> Result<Option<&[f32]>> {
        loop {
            let packet = match self.format.next_packet() {
                Ok(packet) => packet,
                Err(SymphoniaError::IoError(e))
                    if e.kind() == std::io::ErrorKind::UnexpectedEof =>
                {
                    return Ok(None);
                }
                Err(SymphoniaError::ResetRequired) => return Ok(None),
                Err(e) => {
                    return Err(Error::Decode(format!("Failed to read packet: {e}")));
                }
            };

            if packet.track_id() != self.track_id {
                continue;
            }

            match self.decoder.decode(&packet) {
                Ok(decoded) => {
                    let spec = *decoded.spec();
                    let frames = decoded.capacity();
                    self.channels = Some(spec.channels.count() as u16);

                    // Packets may grow; reallocate only when the scratch buffer is too small.
                    let needed = frames * spec.channels.count();
                    if self
                        .sample_buf
                        .as_ref()
                        .is_some_and(|buf| buf.capacity() < needed)
                    {
                        self.sample_buf = None;
                    }
                    let buf = self
                        .sample_buf
                        .get_or_insert_with(|| SampleBuffer::new(frames as u64, spec));
                    buf.copy_interleaved_ref(decoded);
                    return Ok(Some(buf.samples()));
                }
                Err(SymphoniaError::DecodeError(e)) => {
                    warn!("Decode error (skipping packet): {e}");
                }
                Err(e) => {
                    return Err(Error::Decode(format!("Decode failed: {e}")));
                }
            }
        }
    }

    /// Decode every remaining packet.
    ///
    /// Returns the interleaved samples and the channel count they are laid out in.
    pub fn decode_all(mut self) -> Result<(Vec<f32>, u16)> {
        let mut samples = Vec::new();
        while let Some(chunk) = self.decode_next()? {
            samples.extend_from_slice(chunk);
        }

        let channels = self
            .channels
            .ok_or_else(|| Error::Load("Track contains no decodable audio".to_string()))?;
        Ok((samples, channels))
    }
}
