//! Core domain types for fader.

pub mod common;
pub mod snapshot;
pub mod state;

pub use common::*;
pub use snapshot::EngineSnapshot;
pub use state::PlayerState;
