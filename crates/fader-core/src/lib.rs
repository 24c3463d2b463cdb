//! # fader-core
//!
//! Core types, configuration, and error handling shared by the fader
//! playback engine and its front ends.

pub mod config;
pub mod error;
pub mod types;

pub use config::EngineConfig;
pub use error::{Error, Result};
pub use types::*;
