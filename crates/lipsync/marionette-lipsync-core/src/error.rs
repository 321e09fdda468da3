//! Error types for audio playback and lip sync

/// Failure reported by an [`crate::AudioDevice`].
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum AudioError {
    /// The audio context could not be created or resumed
    #[error("Audio context unavailable: {reason}")]
    Context { reason: String },

    /// The source could not be fetched or decoded
    #[error("Cannot load audio source {url}: {reason}")]
    Source { url: String, reason: String },

    #[error("Playback failed: {reason}")]
    Playback { reason: String },
}

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum LipSyncError {
    #[error(transparent)]
    Audio(#[from] AudioError),

    #[error("Lip sync has been destroyed")]
    Destroyed,

    #[error("Invalid lip sync configuration: {reason}")]
    InvalidConfig { reason: String },
}

impl LipSyncError {
    pub(crate) fn invalid_config(reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            reason: reason.into(),
        }
    }

    #[inline]
    pub fn category(&self) -> &'static str {
        match self {
            Self::Audio(AudioError::Source { .. }) => "io",
            Self::Audio(_) => "audio",
            Self::Destroyed => "lifecycle",
            Self::InvalidConfig { .. } => "config",
        }
    }
}
