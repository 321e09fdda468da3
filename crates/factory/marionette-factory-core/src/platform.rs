//! Platform adapter contracts.
//!
//! A [`Platform`] knows one model format end to end: how to recognise its
//! settings, how to decode its core-model binary and how to wrap both into
//! an [`InternalModel`]. The factory only talks to these traits.

use std::any::Any;
use std::rc::Rc;

use futures::future::LocalBoxFuture;
use marionette_api_core::ModelSettings;
use marionette_lipsync_core::LipSyncSource;
use marionette_motion_core::{ExpressionRef, MotionPriority};
use serde_json::Value as JsonValue;

use crate::{FactoryError, FactoryOptions, FactoryServices};

pub type SharedInternalModel = Rc<dyn InternalModel>;

pub trait Platform {
    fn name(&self) -> &str;

    /// Higher versions are tried first.
    fn version(&self) -> u32;

    /// Parse a settings document, or `None` if it is not this platform's.
    fn create_model_settings(&self, json: &JsonValue) -> Option<Rc<dyn ModelSettings>>;

    /// Whether parsed settings belong to this platform.
    fn test(&self, settings: &dyn ModelSettings) -> bool;

    fn create_core_model(&self, data: &[u8]) -> Result<Box<dyn Any>, FactoryError>;

    fn create_internal_model(
        &self,
        core: Box<dyn Any>,
        settings: Rc<dyn ModelSettings>,
        options: &FactoryOptions,
        services: &FactoryServices,
    ) -> Result<SharedInternalModel, FactoryError>;

    fn create_pose(
        &self,
        model: &dyn InternalModel,
        data: &JsonValue,
    ) -> Result<Box<dyn Any>, FactoryError>;

    fn create_physics(
        &self,
        model: &dyn InternalModel,
        data: &JsonValue,
    ) -> Result<Box<dyn Any>, FactoryError>;
}

/// The platform-specific model: core model plus its motion, expression and
/// optional rig state. Every method takes `&self` so listeners may call
/// back into the model while it is updating.
pub trait InternalModel {
    fn settings(&self) -> Rc<dyn ModelSettings>;

    fn parameter(&self, id: &str) -> Option<f32>;

    /// Advance one frame. Returns true if any parameter was written.
    fn update(&self, dt: f64, now: f64) -> bool;

    fn start_motion(
        &self,
        group: &str,
        index: usize,
        priority: MotionPriority,
    ) -> LocalBoxFuture<'static, bool>;

    fn start_random_motion(
        &self,
        group: &str,
        priority: MotionPriority,
    ) -> LocalBoxFuture<'static, bool>;

    fn stop_all_motions(&self);

    fn set_expression(&self, which: ExpressionRef<'_>) -> LocalBoxFuture<'static, bool>;

    fn set_random_expression(&self) -> LocalBoxFuture<'static, bool>;

    fn reset_expression(&self);

    /// Attach a pose built by [`Platform::create_pose`]. Returns false if the
    /// object is not this model's pose type or the model is gone.
    fn attach_pose(&self, pose: Box<dyn Any>) -> bool;

    fn attach_physics(&self, physics: Box<dyn Any>) -> bool;

    fn has_pose(&self) -> bool;

    fn has_physics(&self) -> bool;

    fn set_lip_sync(&self, source: Option<Rc<dyn LipSyncSource>>);

    fn destroy(&self);

    fn is_destroyed(&self) -> bool;

    fn as_any(&self) -> &dyn Any;
}
