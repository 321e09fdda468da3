//! A single playback lane.

use std::cell::{Cell, Ref, RefCell};
use std::fmt;
use std::rc::Rc;

use futures::future::{self, FutureExt, LocalBoxFuture};
use marionette_api_core::Emitter;
use rand::Rng;
use tracing::debug;

use crate::library::MotionLibrary;
use crate::runtime::{ModelOf, MotionCodec, MotionOf, MotionRuntime};
use crate::{MotionEvent, MotionPriority, MotionState};

struct Lane<C: MotionCodec> {
    tag: String,
    index: usize,
    library: MotionLibrary<C>,
    runtime: RefCell<C::Runtime>,
    state: RefCell<MotionState>,
    playing: Cell<bool>,
    destroyed: Cell<bool>,
    events: Emitter<MotionEvent>,
}

/// Schedules motions on one concrete runtime.
///
/// Starting is split in two: the priority check, reservation and load
/// request happen when [`start_motion`](Self::start_motion) is called, and
/// the returned future finishes the start once the load resolves. A
/// request that cannot win priority therefore never issues a load.
pub struct ParallelMotionManager<C: MotionCodec> {
    lane: Rc<Lane<C>>,
}

impl<C: MotionCodec> Clone for ParallelMotionManager<C> {
    fn clone(&self) -> Self {
        Self {
            lane: Rc::clone(&self.lane),
        }
    }
}

impl<C: MotionCodec> fmt::Debug for ParallelMotionManager<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParallelMotionManager")
            .field("tag", &self.lane.tag)
            .field("lane", &self.lane.index)
            .field("state", &*self.lane.state.borrow())
            .field("playing", &self.lane.playing.get())
            .field("destroyed", &self.lane.destroyed.get())
            .finish()
    }
}

impl<C: MotionCodec> ParallelMotionManager<C> {
    pub fn new(library: MotionLibrary<C>, index: usize, events: Emitter<MotionEvent>) -> Self {
        let tag = format!("{}#{index}", library.tag());
        let runtime = library.codec().create_runtime();
        Self {
            lane: Rc::new(Lane {
                state: RefCell::new(MotionState::new(tag.clone())),
                tag,
                index,
                library,
                runtime: RefCell::new(runtime),
                playing: Cell::new(false),
                destroyed: Cell::new(false),
                events,
            }),
        }
    }

    #[inline]
    pub fn tag(&self) -> &str {
        &self.lane.tag
    }

    #[inline]
    pub fn index(&self) -> usize {
        self.lane.index
    }

    #[inline]
    pub fn is_playing(&self) -> bool {
        self.lane.playing.get()
    }

    #[inline]
    pub fn is_destroyed(&self) -> bool {
        self.lane.destroyed.get()
    }

    pub fn state(&self) -> Ref<'_, MotionState> {
        self.lane.state.borrow()
    }

    pub fn runtime(&self) -> Ref<'_, C::Runtime> {
        self.lane.runtime.borrow()
    }

    #[inline]
    pub fn events(&self) -> &Emitter<MotionEvent> {
        &self.lane.events
    }

    pub fn start_motion(
        &self,
        group: &str,
        index: usize,
        priority: MotionPriority,
    ) -> LocalBoxFuture<'static, bool> {
        let lane = &self.lane;
        if lane.destroyed.get() || !lane.state.borrow_mut().reserve(group, index, priority) {
            return future::ready(false).boxed_local();
        }

        let Some(name) = lane
            .library
            .definition(group, index)
            .map(|spec| lane.runtime.borrow().name_of(spec))
        else {
            // Nothing to load: hand the reservation back.
            lane.state
                .borrow_mut()
                .start::<MotionOf<C>>(None, group, index, priority);
            return future::ready(false).boxed_local();
        };

        debug!(tag = %lane.tag, %priority, "start motion: {name}");

        let load = lane.library.load_motion(group, index);
        let this = self.clone();
        let group = group.to_string();
        async move {
            let motion = load.await;
            this.finish_start(motion, &group, index, priority)
        }
        .boxed_local()
    }

    fn finish_start(
        &self,
        motion: Option<Rc<MotionOf<C>>>,
        group: &str,
        index: usize,
        priority: MotionPriority,
    ) -> bool {
        let lane = &self.lane;
        if lane.destroyed.get() {
            return false;
        }
        if !lane
            .state
            .borrow_mut()
            .start(motion.as_deref(), group, index, priority)
        {
            return false;
        }
        let Some(motion) = motion else {
            return false;
        };

        lane.events.emit(MotionEvent::Start {
            lane: lane.index,
            group: group.to_string(),
            index,
        });
        lane.playing.set(true);
        lane.runtime.borrow_mut().start_concrete(motion);
        true
    }

    /// Start a uniformly chosen motion from `group`, skipping slots that are
    /// already playing or reserved and slots whose last load failed.
    pub fn start_random_motion(
        &self,
        group: &str,
        priority: MotionPriority,
    ) -> LocalBoxFuture<'static, bool> {
        match self.pick_random(group, &mut rand::rng()) {
            Some(index) => self.start_motion(group, index, priority),
            None => future::ready(false).boxed_local(),
        }
    }

    fn pick_random(&self, group: &str, rng: &mut impl Rng) -> Option<usize> {
        let library = &self.lane.library;
        let state = self.lane.state.borrow();
        let candidates: Vec<usize> = (0..library.group_len(group))
            .filter(|&i| !library.is_unavailable(group, i) && !state.is_active(group, i))
            .collect();
        if candidates.is_empty() {
            return None;
        }
        Some(candidates[rng.random_range(0..candidates.len())])
    }

    /// Stop playback and clear the priority gate, whatever was reserved.
    pub fn stop_all_motions(&self) {
        self.lane.runtime.borrow_mut().stop_all_concrete();
        self.lane.state.borrow_mut().reset();
    }

    /// Per-frame tick. `now` is in milliseconds. Returns whether the runtime
    /// wrote any parameter.
    pub fn update(&self, model: &mut ModelOf<C>, now: f64) -> bool {
        let lane = &self.lane;
        let finished = lane.runtime.borrow().is_concrete_finished();
        if finished {
            if lane.playing.replace(false) {
                lane.events.emit(MotionEvent::Finish { lane: lane.index });
            }
            lane.state.borrow_mut().complete();
        }
        lane.runtime.borrow_mut().advance_concrete(model, now)
    }

    pub fn destroy(&self) {
        let lane = &self.lane;
        if lane.destroyed.replace(true) {
            return;
        }
        lane.events.emit(MotionEvent::Destroy { lane: lane.index });
        self.stop_all_motions();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::curve::{CurveCodec, CurveMotionSpec};
    use indexmap::IndexMap;
    use marionette_api_core::{LoadError, LoadRequest, ModelSettings, Payload, ResourceLoader};
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use serde_json::json;
    use std::any::Any;

    #[derive(Debug)]
    struct Settings;

    impl ModelSettings for Settings {
        fn name(&self) -> &str {
            "unit"
        }
        fn url(&self) -> &str {
            "m/unit.json"
        }
        fn moc(&self) -> &str {
            "unit.moc"
        }
        fn textures(&self) -> &[String] {
            &[]
        }
        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    struct Instant;

    impl ResourceLoader for Instant {
        fn load(&self, request: LoadRequest) -> LocalBoxFuture<'static, Result<Payload, LoadError>> {
            let result = if request.url.ends_with("bad.json") {
                Err(LoadError::NotFound { url: request.url })
            } else {
                Ok(Payload::json(json!({
                    "duration": 1.0,
                    "curves": [{ "id": "ParamAngleX", "points": [[0.0, 0.0], [1.0, 30.0]] }]
                })))
            };
            future::ready(result).boxed_local()
        }
    }

    fn lane(files: &[&str]) -> ParallelMotionManager<CurveCodec> {
        let mut defs = IndexMap::new();
        defs.insert(
            "idle".to_string(),
            files.iter().map(|f| CurveMotionSpec::new(*f)).collect(),
        );
        let library = MotionLibrary::new("unit", CurveCodec, Rc::new(Settings), Rc::new(Instant), defs);
        ParallelMotionManager::new(library, 0, Emitter::new())
    }

    #[test]
    fn undefined_slot_returns_reservation() {
        let lane = lane(&["a.json"]);
        assert!(!futures::executor::block_on(lane.start_motion("idle", 3, MotionPriority::Normal)));
        assert!(lane.state().should_request_idle_motion());
    }

    #[test]
    fn random_pick_skips_active_and_unavailable() {
        let lane = lane(&["a.json", "bad.json", "c.json"]);
        assert!(!futures::executor::block_on(lane.start_motion("idle", 1, MotionPriority::Idle)));
        assert!(lane.library_for_test().is_unavailable("idle", 1));
        assert!(futures::executor::block_on(lane.start_motion("idle", 0, MotionPriority::Idle)));

        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..32 {
            assert_eq!(lane.pick_random("idle", &mut rng), Some(2));
        }
        assert_eq!(lane.pick_random("missing", &mut rng), None);
    }

    impl<C: MotionCodec> ParallelMotionManager<C> {
        fn library_for_test(&self) -> &MotionLibrary<C> {
            &self.lane.library
        }
    }
}
