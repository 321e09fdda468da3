//! marionette-api-core: contracts shared by every marionette crate.
//!
//! Nothing in here knows about motions or models. It provides the
//! notification channel, the resource-loading contract with its per-slot
//! deduplication map, the settings contract and the parameter-valued core
//! model contract that the runtimes write into.

pub mod events;
pub mod loader;
pub mod parameters;
pub mod settings;
pub mod tasks;

pub use events::{Emitter, Event, ListenerId};
pub use loader::{FsLoader, LoadError, LoadRequest, Payload, ResourceLoader, ResourceType};
pub use parameters::{CoreModel, ParameterTable};
pub use settings::{resolve_relative, ModelSettings};
pub use tasks::{SharedTask, TaskMap};
