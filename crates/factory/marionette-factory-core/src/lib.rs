//! marionette-factory-core
//!
//! Turns a settings url, a settings JSON document or an already-parsed
//! settings object into a playable [`Model`]. Construction runs as a chain
//! of middleware stages over a shared [`FactoryContext`]; each stage may act
//! before and after the rest of the chain.
//!
//! Default order:
//!
//! 1. [`stages::url_to_json`]
//! 2. [`stages::json_to_settings`]
//! 3. [`stages::setup_model`] (textures, then finalises after 4 and 5)
//! 4. [`stages::create_internal_model`]
//! 5. [`stages::setup_optionals`]
//!
//! Platforms (one per supported runtime) plug in through [`Platform`]; the
//! [`puppet`] platform is a complete reference implementation.

pub mod config;
pub mod context;
pub mod error;
pub mod events;
pub mod factory;
pub mod middleware;
pub mod model;
pub mod platform;
pub mod puppet;
pub mod stages;
pub mod texture;

pub use config::FactoryOptions;
pub use context::{FactoryContext, FactoryServices, ModelSource};
pub use error::FactoryError;
pub use events::ModelEvent;
pub use factory::ModelFactory;
pub use middleware::{Middleware, Next};
pub use model::Model;
pub use platform::{InternalModel, Platform, SharedInternalModel};
pub use texture::{Texture, TextureSource, TextureStatus};
