//! Error type for motion and expression decoding.

use marionette_api_core::LoadError;

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum MotionError {
    /// The payload was fetched but does not describe a usable clip
    #[error("Malformed motion data in {file}: {reason}")]
    Malformed { file: String, reason: String },

    #[error(transparent)]
    Load(#[from] LoadError),

    #[error("Invalid motion manager options: {reason}")]
    InvalidOptions { reason: String },
}

impl MotionError {
    pub fn malformed(file: impl Into<String>, reason: impl ToString) -> Self {
        Self::Malformed {
            file: file.into(),
            reason: reason.to_string(),
        }
    }

    #[inline]
    pub fn category(&self) -> &'static str {
        match self {
            Self::Malformed { .. } => "data",
            Self::Load(err) => err.category(),
            Self::InvalidOptions { .. } => "config",
        }
    }
}
