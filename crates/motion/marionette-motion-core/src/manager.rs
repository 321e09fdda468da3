//! Library plus lanes: the object a model holds on to.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use futures::future::{self, join_all, FutureExt, LocalBoxFuture};
use indexmap::IndexMap;
use marionette_api_core::{Emitter, ModelSettings, ResourceLoader};
use tracing::debug;

use crate::library::MotionLibrary;
use crate::runtime::{ModelOf, MotionCodec, SpecOf};
use crate::{MotionError, MotionEvent, MotionManagerOptions, MotionPriority, MotionSlot};
use crate::parallel::ParallelMotionManager;

/// Owns the [`MotionLibrary`] and its playback lanes.
///
/// Lane 0 is the primary lane used by [`start_motion`](Self::start_motion)
/// and idle scheduling. Extra lanes let unrelated motions (say a body sway
/// and a blink loop) play side by side, each with its own priority gate.
#[derive(Debug)]
pub struct MotionManager<C: MotionCodec> {
    tag: String,
    library: MotionLibrary<C>,
    lanes: RefCell<Vec<ParallelMotionManager<C>>>,
    events: Emitter<MotionEvent>,
    options: MotionManagerOptions,
    destroyed: Cell<bool>,
}

impl<C: MotionCodec> MotionManager<C> {
    pub fn new(
        codec: C,
        settings: Rc<dyn ModelSettings>,
        loader: Rc<dyn ResourceLoader>,
        definitions: IndexMap<String, Vec<SpecOf<C>>>,
        options: MotionManagerOptions,
    ) -> Result<Self, MotionError> {
        options.validate()?;
        let tag = format!("MotionManager({})", settings.name());
        let library = MotionLibrary::new(tag.clone(), codec, settings, loader, definitions);
        let events = Emitter::new();
        let lanes = (0..options.lanes)
            .map(|i| ParallelMotionManager::new(library.clone(), i, events.clone()))
            .collect();
        Ok(Self {
            tag,
            library,
            lanes: RefCell::new(lanes),
            events,
            options,
            destroyed: Cell::new(false),
        })
    }

    #[inline]
    pub fn tag(&self) -> &str {
        &self.tag
    }

    #[inline]
    pub fn library(&self) -> &MotionLibrary<C> {
        &self.library
    }

    #[inline]
    pub fn options(&self) -> &MotionManagerOptions {
        &self.options
    }

    #[inline]
    pub fn events(&self) -> &Emitter<MotionEvent> {
        &self.events
    }

    pub fn lane(&self, index: usize) -> Option<ParallelMotionManager<C>> {
        self.lanes.borrow().get(index).cloned()
    }

    pub fn lane_count(&self) -> usize {
        self.lanes.borrow().len()
    }

    fn primary(&self) -> ParallelMotionManager<C> {
        // `new` validated at least one lane and lanes are never removed.
        self.lanes.borrow()[0].clone()
    }

    fn ensure_lanes(&self, count: usize) {
        let mut lanes = self.lanes.borrow_mut();
        while lanes.len() < count {
            let index = lanes.len();
            debug!(tag = %self.tag, lane = index, "adding motion lane");
            lanes.push(ParallelMotionManager::new(
                self.library.clone(),
                index,
                self.events.clone(),
            ));
        }
    }

    pub fn start_motion(
        &self,
        group: &str,
        index: usize,
        priority: MotionPriority,
    ) -> LocalBoxFuture<'static, bool> {
        if self.destroyed.get() {
            return future::ready(false).boxed_local();
        }
        self.primary().start_motion(group, index, priority)
    }

    pub fn start_random_motion(
        &self,
        group: &str,
        priority: MotionPriority,
    ) -> LocalBoxFuture<'static, bool> {
        if self.destroyed.get() {
            return future::ready(false).boxed_local();
        }
        self.primary().start_random_motion(group, priority)
    }

    /// Start `slots[i]` on lane `i`, adding lanes as needed. Resolves to one
    /// result per slot once every load has settled.
    pub fn start_parallel_motion(
        &self,
        slots: &[MotionSlot],
        priority: MotionPriority,
    ) -> LocalBoxFuture<'static, Vec<bool>> {
        if self.destroyed.get() {
            return future::ready(vec![false; slots.len()]).boxed_local();
        }
        self.ensure_lanes(slots.len());
        let lanes = self.lanes.borrow();
        let starts: Vec<_> = slots
            .iter()
            .zip(lanes.iter())
            .map(|(slot, lane)| lane.start_motion(&slot.group, slot.index, priority))
            .collect();
        join_all(starts).boxed_local()
    }

    pub fn should_request_idle_motion(&self) -> bool {
        !self.destroyed.get() && self.primary().state().should_request_idle_motion()
    }

    pub fn is_playing(&self) -> bool {
        self.lanes.borrow().iter().any(|lane| lane.is_playing())
    }

    pub fn stop_all_motions(&self) {
        for lane in self.lanes.borrow().iter() {
            lane.stop_all_motions();
        }
    }

    /// Tick every lane. Returns true if any lane wrote a parameter.
    pub fn update(&self, model: &mut ModelOf<C>, now: f64) -> bool {
        if self.destroyed.get() {
            return false;
        }
        // Listeners may add lanes from inside a lane's update.
        let lanes: Vec<_> = self.lanes.borrow().clone();
        lanes
            .iter()
            .fold(false, |changed, lane| lane.update(model, now) | changed)
    }

    pub fn destroy(&self) {
        if self.destroyed.replace(true) {
            return;
        }
        let lanes: Vec<_> = self.lanes.borrow().clone();
        for lane in &lanes {
            lane.destroy();
        }
        self.library.release();
    }

    #[inline]
    pub fn is_destroyed(&self) -> bool {
        self.destroyed.get()
    }
}
