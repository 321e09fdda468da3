//! Scripted [`AudioDevice`] for lip-sync tests.

use std::cell::RefCell;
use std::rc::Rc;

use futures::future::{self, FutureExt, LocalBoxFuture};
use hashbrown::{HashMap, HashSet};
use marionette_lipsync_core::{AnalyserConfig, AudioDevice, AudioError};

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct ScriptedHandle(pub u32);

#[derive(Debug, Clone)]
pub struct ScriptedAnalyser {
    pub config: AnalyserConfig,
}

struct Source {
    url: String,
    on_finish: Option<Box<dyn FnOnce()>>,
    on_error: Option<Box<dyn FnOnce(AudioError)>>,
    volume: Option<f32>,
    cross_origin: Option<String>,
    connected: bool,
}

#[derive(Default)]
struct State {
    contexts_created: usize,
    contexts_closed: usize,
    analysers_created: usize,
    samples: Vec<f32>,
    next_handle: u32,
    sources: HashMap<ScriptedHandle, Source>,
    playing: HashSet<ScriptedHandle>,
    disposed: Vec<ScriptedHandle>,
    broken_urls: HashSet<String>,
    fail_context: bool,
    fail_play: bool,
    finish_on_play: bool,
}

/// Cloning shares the script, so a test keeps one clone to drive the device
/// after handing another to the code under test.
#[derive(Clone, Default)]
pub struct ScriptedAudioDevice {
    state: Rc<RefCell<State>>,
}

impl ScriptedAudioDevice {
    pub fn new() -> Self {
        Self::default()
    }

    /// Samples the analyser reports, repeated to fill its window.
    pub fn set_samples(&self, samples: Vec<f32>) {
        self.state.borrow_mut().samples = samples;
    }

    /// `add` fails for this url.
    pub fn break_source(&self, url: impl Into<String>) {
        self.state.borrow_mut().broken_urls.insert(url.into());
    }

    pub fn fail_context(&self, fail: bool) {
        self.state.borrow_mut().fail_context = fail;
    }

    pub fn fail_play(&self, fail: bool) {
        self.state.borrow_mut().fail_play = fail;
    }

    /// Finish every source synchronously from inside `play`, the way a
    /// backend does for a clip that is already at its end.
    pub fn finish_on_play(&self, finish: bool) {
        self.state.borrow_mut().finish_on_play = finish;
    }

    /// Fire the natural-finish callback of `handle`.
    pub fn finish(&self, handle: ScriptedHandle) -> bool {
        let callback = {
            let mut state = self.state.borrow_mut();
            state.playing.remove(&handle);
            state
                .sources
                .get_mut(&handle)
                .and_then(|s| s.on_finish.take())
        };
        match callback {
            Some(callback) => {
                callback();
                true
            }
            None => false,
        }
    }

    /// Fire the error callback of `handle`.
    pub fn error(&self, handle: ScriptedHandle, reason: &str) -> bool {
        let callback = {
            let mut state = self.state.borrow_mut();
            state.playing.remove(&handle);
            state.sources.get_mut(&handle).and_then(|s| s.on_error.take())
        };
        match callback {
            Some(callback) => {
                callback(AudioError::Playback {
                    reason: reason.to_string(),
                });
                true
            }
            None => false,
        }
    }

    pub fn last_handle(&self) -> Option<ScriptedHandle> {
        let next = self.state.borrow().next_handle;
        next.checked_sub(1).map(ScriptedHandle)
    }

    pub fn url_of(&self, handle: ScriptedHandle) -> Option<String> {
        self.state.borrow().sources.get(&handle).map(|s| s.url.clone())
    }

    pub fn volume_of(&self, handle: ScriptedHandle) -> Option<f32> {
        self.state.borrow().sources.get(&handle).and_then(|s| s.volume)
    }

    pub fn cross_origin_of(&self, handle: ScriptedHandle) -> Option<String> {
        self.state
            .borrow()
            .sources
            .get(&handle)
            .and_then(|s| s.cross_origin.clone())
    }

    pub fn is_connected(&self, handle: ScriptedHandle) -> bool {
        self.state
            .borrow()
            .sources
            .get(&handle)
            .is_some_and(|s| s.connected)
    }

    pub fn is_playing(&self, handle: ScriptedHandle) -> bool {
        self.state.borrow().playing.contains(&handle)
    }

    pub fn disposed(&self) -> Vec<ScriptedHandle> {
        self.state.borrow().disposed.clone()
    }

    pub fn contexts_created(&self) -> usize {
        self.state.borrow().contexts_created
    }

    pub fn contexts_closed(&self) -> usize {
        self.state.borrow().contexts_closed
    }

    pub fn analysers_created(&self) -> usize {
        self.state.borrow().analysers_created
    }
}

impl AudioDevice for ScriptedAudioDevice {
    type Handle = ScriptedHandle;
    type Analyser = ScriptedAnalyser;

    fn create_context(&mut self) -> LocalBoxFuture<'static, Result<(), AudioError>> {
        let mut state = self.state.borrow_mut();
        let result = if state.fail_context {
            Err(AudioError::Context {
                reason: "scripted context failure".into(),
            })
        } else {
            state.contexts_created += 1;
            Ok(())
        };
        future::ready(result).boxed_local()
    }

    fn create_analyser(&mut self, config: &AnalyserConfig) -> Result<ScriptedAnalyser, AudioError> {
        self.state.borrow_mut().analysers_created += 1;
        Ok(ScriptedAnalyser {
            config: config.clone(),
        })
    }

    fn add(
        &mut self,
        url: &str,
        on_finish: Box<dyn FnOnce()>,
        on_error: Box<dyn FnOnce(AudioError)>,
    ) -> Result<ScriptedHandle, AudioError> {
        let mut state = self.state.borrow_mut();
        if state.broken_urls.contains(url) {
            return Err(AudioError::Source {
                url: url.to_string(),
                reason: "scripted decode failure".into(),
            });
        }
        let handle = ScriptedHandle(state.next_handle);
        state.next_handle += 1;
        state.sources.insert(
            handle,
            Source {
                url: url.to_string(),
                on_finish: Some(on_finish),
                on_error: Some(on_error),
                volume: None,
                cross_origin: None,
                connected: false,
            },
        );
        Ok(handle)
    }

    fn set_volume(&mut self, handle: &ScriptedHandle, volume: f32) {
        if let Some(source) = self.state.borrow_mut().sources.get_mut(handle) {
            source.volume = Some(volume);
        }
    }

    fn set_cross_origin(&mut self, handle: &ScriptedHandle, mode: &str) {
        if let Some(source) = self.state.borrow_mut().sources.get_mut(handle) {
            source.cross_origin = Some(mode.to_string());
        }
    }

    fn connect(&mut self, handle: &ScriptedHandle, _analyser: &ScriptedAnalyser) -> Result<(), AudioError> {
        match self.state.borrow_mut().sources.get_mut(handle) {
            Some(source) => {
                source.connected = true;
                Ok(())
            }
            None => Err(AudioError::Playback {
                reason: "unknown handle".into(),
            }),
        }
    }

    fn play(&mut self, handle: &ScriptedHandle) -> LocalBoxFuture<'static, Result<(), AudioError>> {
        let mut state = self.state.borrow_mut();
        if state.fail_play {
            return future::ready(Err(AudioError::Playback {
                reason: "scripted play failure".into(),
            }))
            .boxed_local();
        }
        if state.finish_on_play {
            let callback = state.sources.get_mut(handle).and_then(|s| s.on_finish.take());
            drop(state);
            if let Some(callback) = callback {
                callback();
            }
        } else {
            state.playing.insert(*handle);
        }
        future::ready(Ok(())).boxed_local()
    }

    fn dispose(&mut self, handle: ScriptedHandle) {
        let mut state = self.state.borrow_mut();
        state.playing.remove(&handle);
        if let Some(source) = state.sources.get_mut(&handle) {
            source.on_finish = None;
            source.on_error = None;
        }
        state.disposed.push(handle);
    }

    fn time_domain_data(&self, _analyser: &ScriptedAnalyser, out: &mut [f32]) {
        let state = self.state.borrow();
        if state.samples.is_empty() {
            out.fill(0.0);
            return;
        }
        for (i, slot) in out.iter_mut().enumerate() {
            *slot = state.samples[i % state.samples.len()];
        }
    }

    fn close_context(&mut self) {
        self.state.borrow_mut().contexts_closed += 1;
    }
}
