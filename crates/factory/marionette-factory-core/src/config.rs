//! Options threaded through model construction

use marionette_lipsync_core::LipSyncConfig;
use marionette_motion_core::MotionManagerOptions;
use serde::{Deserialize, Serialize};

use crate::FactoryError;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FactoryOptions {
    /// Cross-origin mode passed to the texture source
    pub cross_origin: Option<String>,
    /// Options for the model's motion manager
    pub motion: MotionManagerOptions,
    /// Used by [`crate::Model::create_lip_sync`]
    pub lipsync: LipSyncConfig,
}

impl FactoryOptions {
    pub fn validate(&self) -> Result<(), FactoryError> {
        self.motion.validate()?;
        self.lipsync.validate()?;
        Ok(())
    }
}
