//! Error type for model construction

use marionette_api_core::LoadError;
use marionette_lipsync_core::LipSyncError;
use marionette_motion_core::MotionError;

/// Failures that make the model under construction meaningless. Optional
/// resources never produce one of these.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum FactoryError {
    /// No registered platform could read the settings document
    #[error("Unknown settings format")]
    UnknownSettingsFormat,

    /// Settings were parsed but no platform accepts them
    #[error("Unknown model settings: {name}")]
    UnknownModelSettings { name: String },

    #[error("Model settings missing from factory context")]
    MissingSettings,

    #[error("Missing internal model after construction")]
    MissingInternalModel,

    #[error(transparent)]
    Load(#[from] LoadError),

    /// A platform adapter rejected its input
    #[error("Platform error: {reason}")]
    Platform { reason: String },

    #[error(transparent)]
    Motion(#[from] MotionError),

    #[error(transparent)]
    LipSync(#[from] LipSyncError),
}

impl FactoryError {
    pub fn platform(reason: impl ToString) -> Self {
        Self::Platform {
            reason: reason.to_string(),
        }
    }

    #[inline]
    pub fn category(&self) -> &'static str {
        match self {
            Self::UnknownSettingsFormat
            | Self::UnknownModelSettings { .. }
            | Self::MissingSettings
            | Self::MissingInternalModel => "structure",
            Self::Load(err) => err.category(),
            Self::Platform { .. } => "platform",
            Self::Motion(err) => err.category(),
            Self::LipSync(err) => err.category(),
        }
    }
}
