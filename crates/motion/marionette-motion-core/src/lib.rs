//! marionette-motion-core
//!
//! Decides which motion may play at any instant and drives it. The pieces,
//! leaf first:
//!
//! - [`state::MotionState`]: reservation/active bookkeeping keyed by priority.
//! - [`library::MotionLibrary`]: definitions, loaded-motion cache and the
//!   deduplicated in-flight loads.
//! - [`parallel::ParallelMotionManager`]: one playback lane; turns scheduling
//!   decisions into calls on a pluggable [`runtime::MotionRuntime`].
//! - [`manager::MotionManager`]: owns the library and one or more lanes.
//! - [`expression::ExpressionManager`]: the same load pattern for expressions.
//! - [`curve`]: a small keyframe runtime usable without any vendor runtime.

pub mod config;
pub mod curve;
pub mod error;
pub mod events;
pub mod expression;
pub mod library;
pub mod manager;
pub mod parallel;
pub mod runtime;
pub mod state;

pub use config::MotionManagerOptions;
pub use curve::{CurveCodec, CurveExpressionSpec, CurveMotion, CurveMotionSpec, CurveRuntime};
pub use error::MotionError;
pub use events::{ExpressionEvent, MotionEvent};
pub use expression::{ExpressionManager, ExpressionRef};
pub use library::{MotionEntry, MotionLibrary};
pub use manager::MotionManager;
pub use parallel::ParallelMotionManager;
pub use runtime::{ExpressionCodec, ModelOf, MotionCodec, MotionOf, MotionRuntime, SpecOf};
pub use state::{MotionPhase, MotionPriority, MotionSlot, MotionState};

pub use marionette_api_core::{CoreModel, Emitter, ResourceLoader};
