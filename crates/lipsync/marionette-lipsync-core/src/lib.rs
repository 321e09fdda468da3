//! marionette-lipsync-core
//!
//! Plays a voice clip through a host [`AudioDevice`] and turns the clip's
//! instantaneous loudness into a mouth-open value for the model.

pub mod config;
pub mod device;
pub mod error;
pub mod lipsync;

pub use config::{AnalyserConfig, LipSyncConfig, PlayOptions};
pub use device::AudioDevice;
pub use error::{AudioError, LipSyncError};
pub use lipsync::{LipSync, LipSyncSource};
