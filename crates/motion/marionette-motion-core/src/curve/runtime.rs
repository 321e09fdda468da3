use std::rc::Rc;

use marionette_api_core::CoreModel;

use super::{CurveMotion, CurveMotionSpec};
use crate::MotionRuntime;

#[derive(Debug)]
struct Playing {
    clip: Rc<CurveMotion>,
    /// Set on the first advance after the clip was started, in ms.
    started_at: Option<f64>,
    elapsed: f32,
}

/// Plays one [`CurveMotion`] at a time.
#[derive(Debug, Default)]
pub struct CurveRuntime {
    playing: Option<Playing>,
}

impl CurveRuntime {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> Option<&Rc<CurveMotion>> {
        self.playing.as_ref().map(|p| &p.clip)
    }

    /// Seconds since the current clip started, 0 when idle.
    pub fn elapsed(&self) -> f32 {
        self.playing.as_ref().map_or(0.0, |p| p.elapsed)
    }
}

impl MotionRuntime for CurveRuntime {
    type Motion = CurveMotion;
    type Spec = CurveMotionSpec;
    type Model = dyn CoreModel;

    fn start_concrete(&mut self, motion: Rc<CurveMotion>) {
        self.stop_all_concrete();
        self.playing = Some(Playing {
            clip: motion,
            started_at: None,
            elapsed: 0.0,
        });
    }

    fn stop_all_concrete(&mut self) {
        self.playing = None;
    }

    fn advance_concrete(&mut self, model: &mut (dyn CoreModel + 'static), now: f64) -> bool {
        let Some(playing) = self.playing.as_mut() else {
            return false;
        };
        let started_at = *playing.started_at.get_or_insert(now);
        playing.elapsed = (((now - started_at) / 1000.0).max(0.0)) as f32;
        let t = playing.clip.local_time(playing.elapsed);
        playing.clip.apply(t, model)
    }

    fn is_concrete_finished(&self) -> bool {
        self.playing
            .as_ref()
            .map_or(true, |p| p.clip.is_finished_at(p.elapsed))
    }

    fn name_of(&self, spec: &CurveMotionSpec) -> String {
        spec.name.clone().unwrap_or_else(|| spec.file.clone())
    }
}
