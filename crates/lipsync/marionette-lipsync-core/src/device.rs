//! Host audio backend.

use futures::future::LocalBoxFuture;

use crate::{AnalyserConfig, AudioError};

/// Playback and analysis primitives supplied by the host (a browser audio
/// graph, a native output stream, a test double).
///
/// Callbacks passed to [`add`](Self::add) may be invoked from any later
/// call on the device, including synchronously from `play` or `dispose`.
pub trait AudioDevice {
    type Handle: Clone;
    type Analyser;

    /// Create (or resume) the audio context. Called once, before anything
    /// else.
    fn create_context(&mut self) -> LocalBoxFuture<'static, Result<(), AudioError>>;

    fn create_analyser(&mut self, config: &AnalyserConfig) -> Result<Self::Analyser, AudioError>;

    /// Register a source. `on_finish` fires when playback reaches its end,
    /// `on_error` when it fails afterwards.
    fn add(
        &mut self,
        url: &str,
        on_finish: Box<dyn FnOnce()>,
        on_error: Box<dyn FnOnce(AudioError)>,
    ) -> Result<Self::Handle, AudioError>;

    fn set_volume(&mut self, handle: &Self::Handle, volume: f32);

    fn set_cross_origin(&mut self, handle: &Self::Handle, mode: &str);

    /// Route the source's output through `analyser` as well as to the
    /// speakers.
    fn connect(&mut self, handle: &Self::Handle, analyser: &Self::Analyser)
        -> Result<(), AudioError>;

    fn play(&mut self, handle: &Self::Handle) -> LocalBoxFuture<'static, Result<(), AudioError>>;

    /// Stop and release a source. Must tolerate handles that already
    /// finished.
    fn dispose(&mut self, handle: Self::Handle);

    /// Copy the analyser's current time-domain window into `out`.
    fn time_domain_data(&self, analyser: &Self::Analyser, out: &mut [f32]);

    fn close_context(&mut self);
}
