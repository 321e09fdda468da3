//! Externally visible model.
//!
//! A [`Model`] exists before construction starts so that listeners can
//! subscribe to the construction notifications. The factory fills it in:
//! textures first, then the internal model once every required stage has
//! finished.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use futures::future::{self, FutureExt, LocalBoxFuture};
use marionette_api_core::Emitter;
use marionette_lipsync_core::{AudioDevice, LipSync, LipSyncSource};
use marionette_motion_core::{ExpressionRef, MotionPriority};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::platform::SharedInternalModel;
use crate::{FactoryError, FactoryOptions, ModelEvent, Texture, TextureStatus};

struct ModelInner {
    id: Uuid,
    options: RefCell<FactoryOptions>,
    textures: RefCell<Vec<Texture>>,
    textures_loaded: Cell<bool>,
    internal: RefCell<Option<SharedInternalModel>>,
    events: Emitter<ModelEvent>,
    destroyed: Cell<bool>,
}

/// Cloning shares the model.
#[derive(Clone)]
pub struct Model {
    inner: Rc<ModelInner>,
}

impl Default for Model {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Model")
            .field("id", &self.inner.id)
            .field("textures", &self.inner.textures.borrow().len())
            .field("ready", &self.is_ready())
            .field("destroyed", &self.inner.destroyed.get())
            .finish()
    }
}

impl Model {
    pub fn new() -> Self {
        Self {
            inner: Rc::new(ModelInner {
                id: Uuid::new_v4(),
                options: RefCell::new(FactoryOptions::default()),
                textures: RefCell::new(Vec::new()),
                textures_loaded: Cell::new(false),
                internal: RefCell::new(None),
                events: Emitter::new(),
                destroyed: Cell::new(false),
            }),
        }
    }

    #[inline]
    pub fn id(&self) -> Uuid {
        self.inner.id
    }

    #[inline]
    pub fn events(&self) -> &Emitter<ModelEvent> {
        &self.inner.events
    }

    pub fn options(&self) -> FactoryOptions {
        self.inner.options.borrow().clone()
    }

    pub fn textures(&self) -> Vec<Texture> {
        self.inner.textures.borrow().clone()
    }

    /// True once every texture is valid.
    pub fn texture_valid(&self) -> bool {
        self.inner.textures.borrow().iter().all(Texture::is_valid)
    }

    pub fn internal_model(&self) -> Option<SharedInternalModel> {
        self.inner.internal.borrow().clone()
    }

    #[inline]
    pub fn is_ready(&self) -> bool {
        self.inner.internal.borrow().is_some()
    }

    #[inline]
    pub fn is_destroyed(&self) -> bool {
        self.inner.destroyed.get()
    }

    pub fn parameter(&self, id: &str) -> Option<f32> {
        self.internal_model()?.parameter(id)
    }

    /// Advance the internal model. Does nothing until construction finished.
    pub fn update(&self, dt: f64, now: f64) -> bool {
        if self.is_destroyed() {
            return false;
        }
        match self.internal_model() {
            Some(internal) => internal.update(dt, now),
            None => false,
        }
    }

    /// Start a motion. Without an index a random one from `group` is picked;
    /// without a priority the configured default is used.
    pub fn motion(
        &self,
        group: &str,
        index: Option<usize>,
        priority: Option<MotionPriority>,
    ) -> LocalBoxFuture<'static, bool> {
        let Some(internal) = self.live_internal() else {
            return future::ready(false).boxed_local();
        };
        let priority = priority.unwrap_or(self.inner.options.borrow().motion.default_priority);
        match index {
            Some(index) => internal.start_motion(group, index, priority),
            None => internal.start_random_motion(group, priority),
        }
    }

    /// Set an expression by index or name, or a random one.
    pub fn expression<'a>(
        &self,
        which: Option<ExpressionRef<'a>>,
    ) -> LocalBoxFuture<'static, bool> {
        let Some(internal) = self.live_internal() else {
            return future::ready(false).boxed_local();
        };
        match which {
            Some(which) => internal.set_expression(which),
            None => internal.set_random_expression(),
        }
    }

    pub fn set_lip_sync(&self, source: Option<Rc<dyn LipSyncSource>>) -> bool {
        match self.live_internal() {
            Some(internal) => {
                internal.set_lip_sync(source);
                true
            }
            None => false,
        }
    }

    /// Create a lip-sync driver on `device` and route its value into this
    /// model's mouth parameter.
    pub fn create_lip_sync<D>(&self, device: D) -> Result<Rc<LipSync<D>>, FactoryError>
    where
        D: AudioDevice + 'static,
    {
        let internal = self.live_internal().ok_or(FactoryError::MissingInternalModel)?;
        let config = self.inner.options.borrow().lipsync.clone();
        let lip_sync = Rc::new(LipSync::new(internal.settings().name(), device, config)?);
        let source: Rc<dyn LipSyncSource> = lip_sync.clone();
        internal.set_lip_sync(Some(source));
        Ok(lip_sync)
    }

    /// Tear the model down. Emits `destroy` before listeners are dropped.
    pub fn destroy(&self) {
        if self.inner.destroyed.replace(true) {
            return;
        }
        self.inner.events.emit(ModelEvent::Destroy);
        if let Some(internal) = self.inner.internal.borrow_mut().take() {
            internal.destroy();
        }
        self.inner.textures.borrow_mut().clear();
        self.inner.events.clear();
    }

    fn live_internal(&self) -> Option<SharedInternalModel> {
        if self.is_destroyed() {
            return None;
        }
        self.internal_model()
    }

    pub(crate) fn set_options(&self, options: FactoryOptions) {
        *self.inner.options.borrow_mut() = options;
    }

    /// Register a texture and emit `textureAdded`.
    pub(crate) fn add_texture(&self, texture: Texture) {
        let index = {
            let mut textures = self.inner.textures.borrow_mut();
            textures.push(texture.clone());
            textures.len() - 1
        };
        self.inner.events.emit(ModelEvent::TextureAdded {
            index,
            url: texture.url().to_string(),
        });
    }

    /// Watch every registered texture and emit `textureLoaded` once they are
    /// all valid. Checks right away too, for textures that were already
    /// valid when added.
    pub(crate) fn watch_textures(&self) {
        for texture in self.textures() {
            let weak = Rc::downgrade(&self.inner);
            let url = texture.url().to_string();
            texture.on_settled(move |status| match status {
                TextureStatus::Valid => {
                    if let Some(inner) = Weak::upgrade(&weak) {
                        Model { inner }.check_textures_loaded();
                    }
                }
                TextureStatus::Failed(reason) => {
                    warn!(tag = "ModelFactory", %url, %reason, "texture failed to load");
                }
                TextureStatus::Loading => {}
            });
        }
        self.check_textures_loaded();
    }

    fn check_textures_loaded(&self) {
        if self.is_destroyed() || self.inner.textures_loaded.get() || !self.texture_valid() {
            return;
        }
        self.inner.textures_loaded.set(true);
        debug!(model = %self.inner.id, "all textures loaded");
        self.inner.events.emit(ModelEvent::TextureLoaded);
    }

    /// Returns false, dropping `internal`, if the model was destroyed while
    /// it was being built.
    pub(crate) fn attach_internal_model(&self, internal: SharedInternalModel) -> bool {
        if self.is_destroyed() {
            internal.destroy();
            return false;
        }
        *self.inner.internal.borrow_mut() = Some(internal);
        true
    }
}
