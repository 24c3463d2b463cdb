//! Error types for fader.

use thiserror::Error;

/// Result type alias using fader's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for fader.
#[derive(Error, Debug)]
pub enum Error {
    // Track loading errors
    #[error("Failed to load track: {0}")]
    Load(String),

    #[error("Audio decode error: {0}")]
    Decode(String),

    #[error("Unsupported audio format: {0}")]
    UnsupportedFormat(String),

    // Output device errors
    #[error("Audio device error: {0}")]
    Device(String),

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // Generic errors
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Returns true if the track could not be read or decoded.
    ///
    /// These errors surface from engine construction before any playback
    /// thread is started.
    pub const fn is_load_error(&self) -> bool {
        matches!(
            self,
            Self::Load(_) | Self::Decode(_) | Self::UnsupportedFormat(_) | Self::Io(_)
        )
    }

    /// Returns true if the output device failed, at open time or mid-stream.
    pub const fn is_device_error(&self) -> bool {
        matches!(self, Self::Device(_))
    }
}
