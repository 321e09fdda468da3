use std::any::Any;
use std::cell::{Cell, Ref, RefCell};
use std::fmt;
use std::rc::Rc;

use futures::future::LocalBoxFuture;
use futures::task::{LocalSpawn, LocalSpawnExt};
use marionette_api_core::{CoreModel, ModelSettings, ParameterTable};
use marionette_lipsync_core::LipSyncSource;
use marionette_motion_core::{
    CurveCodec, ExpressionManager, ExpressionRef, MotionManager, MotionPriority,
};
use tracing::{debug, warn};

use super::{PuppetPhysics, PuppetPose, PuppetSettings};
use crate::platform::InternalModel;
use crate::{FactoryError, FactoryOptions, FactoryServices};

/// Parameter the lip-sync value is written to.
pub const MOUTH_PARAMETER: &str = "ParamMouthOpenY";

pub struct PuppetModel {
    tag: String,
    settings: Rc<dyn ModelSettings>,
    core: RefCell<ParameterTable>,
    motions: MotionManager<CurveCodec>,
    expressions: ExpressionManager<CurveCodec>,
    pose: RefCell<Option<PuppetPose>>,
    physics: RefCell<Option<PuppetPhysics>>,
    lip_sync: RefCell<Option<Rc<dyn LipSyncSource>>>,
    spawner: Rc<dyn LocalSpawn>,
    destroyed: Cell<bool>,
}

impl fmt::Debug for PuppetModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PuppetModel")
            .field("tag", &self.tag)
            .field("motions", &self.motions)
            .field("expressions", &self.expressions)
            .field("pose", &self.has_pose())
            .field("physics", &self.has_physics())
            .field("destroyed", &self.destroyed.get())
            .finish()
    }
}

impl PuppetModel {
    pub fn new(
        core: ParameterTable,
        settings: Rc<dyn ModelSettings>,
        options: &FactoryOptions,
        services: &FactoryServices,
    ) -> Result<Self, FactoryError> {
        let puppet = settings
            .as_any()
            .downcast_ref::<PuppetSettings>()
            .ok_or_else(|| FactoryError::UnknownModelSettings {
                name: settings.name().to_string(),
            })?;
        let motions = MotionManager::new(
            CurveCodec,
            Rc::clone(&settings),
            Rc::clone(&services.loader),
            puppet.motions.clone(),
            options.motion.clone(),
        )?;
        let expressions = ExpressionManager::new(
            CurveCodec,
            Rc::clone(&settings),
            Rc::clone(&services.loader),
            puppet.expressions.clone(),
        );
        Ok(Self {
            tag: format!("PuppetModel({})", settings.name()),
            settings,
            core: RefCell::new(core),
            motions,
            expressions,
            pose: RefCell::new(None),
            physics: RefCell::new(None),
            lip_sync: RefCell::new(None),
            spawner: Rc::clone(&services.spawner),
            destroyed: Cell::new(false),
        })
    }

    #[inline]
    pub fn tag(&self) -> &str {
        &self.tag
    }

    #[inline]
    pub fn motions(&self) -> &MotionManager<CurveCodec> {
        &self.motions
    }

    #[inline]
    pub fn expressions(&self) -> &ExpressionManager<CurveCodec> {
        &self.expressions
    }

    /// The table as of the last finished frame. Listeners running inside
    /// [`InternalModel::update`] see the previous frame.
    pub fn core(&self) -> Ref<'_, ParameterTable> {
        self.core.borrow()
    }

    /// Queue a random idle motion when nothing is playing or pending.
    pub fn request_idle_motion(&self) {
        let Some(group) = self.motions.options().idle_group.as_deref() else {
            return;
        };
        if !self.motions.should_request_idle_motion()
            || self.motions.library().group_len(group) == 0
        {
            return;
        }
        let start = self.motions.start_random_motion(group, MotionPriority::Idle);
        let spawned = self.spawner.spawn_local(async move {
            start.await;
        });
        if let Err(err) = spawned {
            warn!(tag = %self.tag, error = %err, "could not schedule idle motion");
        }
    }
}

impl InternalModel for PuppetModel {
    fn settings(&self) -> Rc<dyn ModelSettings> {
        Rc::clone(&self.settings)
    }

    fn parameter(&self, id: &str) -> Option<f32> {
        self.core.try_borrow().ok()?.parameter(id)
    }

    fn update(&self, _dt: f64, now: f64) -> bool {
        if self.destroyed.get() {
            return false;
        }
        self.request_idle_motion();

        // Motion and expression listeners fire mid-frame and may read the
        // table, so the frame is built on a copy and committed at the end.
        let mut frame = self.core.borrow().clone();
        let mut changed = self.motions.update(&mut frame, now);
        changed |= self.expressions.update(&mut frame, now);

        let lip_sync = self.lip_sync.borrow().clone();
        if let Some(source) = lip_sync.filter(|source| source.is_active()) {
            changed |= frame.set_parameter(MOUTH_PARAMETER, source.value());
        }
        if let Some(pose) = &*self.pose.borrow() {
            pose.apply(&mut frame);
            changed = true;
        }
        if let Some(physics) = &*self.physics.borrow() {
            physics.apply(&mut frame);
            changed = true;
        }
        *self.core.borrow_mut() = frame;
        changed
    }

    fn start_motion(
        &self,
        group: &str,
        index: usize,
        priority: MotionPriority,
    ) -> LocalBoxFuture<'static, bool> {
        self.motions.start_motion(group, index, priority)
    }

    fn start_random_motion(
        &self,
        group: &str,
        priority: MotionPriority,
    ) -> LocalBoxFuture<'static, bool> {
        self.motions.start_random_motion(group, priority)
    }

    fn stop_all_motions(&self) {
        self.motions.stop_all_motions();
    }

    fn set_expression(&self, which: ExpressionRef<'_>) -> LocalBoxFuture<'static, bool> {
        self.expressions.set_expression(which)
    }

    fn set_random_expression(&self) -> LocalBoxFuture<'static, bool> {
        self.expressions.set_random_expression()
    }

    fn reset_expression(&self) {
        self.expressions.reset_expression();
    }

    fn attach_pose(&self, pose: Box<dyn Any>) -> bool {
        if self.destroyed.get() {
            return false;
        }
        match pose.downcast::<PuppetPose>() {
            Ok(pose) => {
                debug!(tag = %self.tag, parameters = pose.parameters.len(), "pose attached");
                *self.pose.borrow_mut() = Some(*pose);
                true
            }
            Err(_) => false,
        }
    }

    fn attach_physics(&self, physics: Box<dyn Any>) -> bool {
        if self.destroyed.get() {
            return false;
        }
        match physics.downcast::<PuppetPhysics>() {
            Ok(physics) => {
                debug!(tag = %self.tag, rules = physics.rules.len(), "physics attached");
                *self.physics.borrow_mut() = Some(*physics);
                true
            }
            Err(_) => false,
        }
    }

    fn has_pose(&self) -> bool {
        self.pose.borrow().is_some()
    }

    fn has_physics(&self) -> bool {
        self.physics.borrow().is_some()
    }

    fn set_lip_sync(&self, source: Option<Rc<dyn LipSyncSource>>) {
        *self.lip_sync.borrow_mut() = source;
    }

    fn destroy(&self) {
        if self.destroyed.replace(true) {
            return;
        }
        self.motions.destroy();
        self.expressions.destroy();
        self.lip_sync.borrow_mut().take();
        self.pose.borrow_mut().take();
        self.physics.borrow_mut().take();
    }

    fn is_destroyed(&self) -> bool {
        self.destroyed.get()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
