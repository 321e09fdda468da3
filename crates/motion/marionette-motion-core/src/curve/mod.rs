//! Reference keyframe runtime.
//!
//! Clips are JSON documents of per-parameter linear curves:
//!
//! ```json
//! { "duration": 2.0, "loop": false,
//!   "curves": [{ "id": "ParamAngleX", "points": [[0.0, 0.0], [1.0, 30.0], [2.0, 0.0]] }] }
//! ```
//!
//! Times are seconds. Expressions use the flat form
//! `{ "parameters": [{ "id": "ParamEyeLSmile", "value": 1.0 }] }` and hold
//! their values until replaced.

mod clip;
mod codec;
mod runtime;

pub use clip::{Curve, CurveMotion};
pub use codec::{CurveCodec, CurveExpressionSpec, CurveMotionSpec};
pub use runtime::CurveRuntime;
