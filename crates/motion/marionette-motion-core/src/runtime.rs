//! Seams between the scheduler and a concrete model runtime.
//!
//! The scheduling logic in [`crate::parallel`] is written once. Each
//! supported runtime supplies a [`MotionRuntime`] (how to play a decoded
//! clip) and a [`MotionCodec`] (where a definition's file lives and how to
//! decode it). Expressions get their own [`ExpressionCodec`] because their
//! definitions carry a name and are not grouped.

use std::rc::Rc;

use marionette_api_core::{Payload, ResourceType};

use crate::MotionError;

/// Plays decoded motions against a model.
pub trait MotionRuntime: 'static {
    /// Decoded, playable clip.
    type Motion: 'static;
    /// Definition entry as listed in the model settings.
    type Spec: 'static;
    /// What `advance_concrete` writes into.
    type Model: ?Sized;

    /// Replace whatever is playing with `motion`. Runtimes must stop the
    /// current clip first; two clips never overlap on one runtime.
    fn start_concrete(&mut self, motion: Rc<Self::Motion>);

    fn stop_all_concrete(&mut self);

    /// Write the current pose into `model`. `now` is in milliseconds.
    /// Returns whether any parameter was written.
    fn advance_concrete(&mut self, model: &mut Self::Model, now: f64) -> bool;

    fn is_concrete_finished(&self) -> bool;

    /// Human-readable name for a definition, used in log lines.
    fn name_of(&self, spec: &Self::Spec) -> String;
}

pub type MotionOf<C> = <<C as MotionCodec>::Runtime as MotionRuntime>::Motion;
pub type SpecOf<C> = <<C as MotionCodec>::Runtime as MotionRuntime>::Spec;
pub type ModelOf<C> = <<C as MotionCodec>::Runtime as MotionRuntime>::Model;

/// Locates and decodes motion files for one runtime.
pub trait MotionCodec: 'static {
    type Runtime: MotionRuntime;

    fn resource_type(&self) -> ResourceType {
        ResourceType::Json
    }

    /// File reference of `spec`, relative to the model settings.
    fn motion_file<'a>(&self, spec: &'a SpecOf<Self>) -> &'a str;

    fn create_motion(&self, data: &Payload, spec: &SpecOf<Self>)
        -> Result<MotionOf<Self>, MotionError>;

    fn create_runtime(&self) -> Self::Runtime;
}

/// Locates and decodes expression files for one runtime.
pub trait ExpressionCodec: 'static {
    type Spec: 'static;
    type Runtime: MotionRuntime;

    fn resource_type(&self) -> ResourceType {
        ResourceType::Json
    }

    fn expression_name<'a>(&self, spec: &'a Self::Spec) -> &'a str;

    fn expression_file<'a>(&self, spec: &'a Self::Spec) -> &'a str;

    fn create_expression(
        &self,
        data: &Payload,
        spec: &Self::Spec,
    ) -> Result<<Self::Runtime as MotionRuntime>::Motion, MotionError>;

    /// The neutral expression a reset switches to.
    fn default_expression(&self) -> <Self::Runtime as MotionRuntime>::Motion;

    fn expression_runtime(&self) -> Self::Runtime;
}
