//! # fader-audio
//!
//! Real-time playback engine for a single decoded track.
//!
//! Features:
//! - Eager symphonia decoding into an in-memory track buffer
//! - Dedicated playback thread driven by an explicit state machine
//! - Wall-clock fade envelopes for play/pause/stop and click-free seeking
//! - Blocking cpal output sink that paces the playback loop

pub mod command;
pub mod decode;
pub mod engine;
pub mod fade;
pub mod output;
pub mod track;

pub use command::{command_channel, CommandReceiver, CommandSender, EngineCommand};
pub use engine::{EngineEvent, PlaybackEngine};
pub use fade::{FadeEnvelope, FadeKind};
pub use output::{AudioSink, CpalSink};
pub use track::Track;

pub use fader_core::PlayerState;
