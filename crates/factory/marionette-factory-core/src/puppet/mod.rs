//! Reference platform.
//!
//! Settings are plain JSON, the core model is a [`ParameterTable`] decoded
//! from `id=value` lines, motions and expressions are curve clips, and the
//! rig is a static pose plus linear physics rules.
//!
//! [`ParameterTable`]: marionette_api_core::ParameterTable

mod model;
mod platform;
mod rig;
mod settings;

pub use model::{PuppetModel, MOUTH_PARAMETER};
pub use platform::{parse_core_model, PuppetPlatform};
pub use rig::{PhysicsRule, PuppetPhysics, PuppetPose};
pub use settings::PuppetSettings;
