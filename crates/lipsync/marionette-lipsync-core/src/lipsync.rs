use std::cell::RefCell;
use std::rc::{Rc, Weak};

use tracing::{debug, warn};

use crate::{AudioDevice, AudioError, LipSyncConfig, LipSyncError, PlayOptions};

/// Anything that can report a mouth-open value each frame.
pub trait LipSyncSource {
    fn value(&self) -> f32;

    /// Whether the value currently reflects a playing voice.
    fn is_active(&self) -> bool;
}

struct Session<D: AudioDevice> {
    analyser: Option<Rc<D::Analyser>>,
    buffer: Vec<f32>,
    current: Option<D::Handle>,
    /// Handles released while the device was busy; disposed once it is free.
    pending_dispose: Vec<D::Handle>,
    /// Bumped on every play so callbacks from older sources can be told apart.
    generation: u64,
    playing: bool,
    destroyed: bool,
}

impl<D: AudioDevice> Session<D> {
    fn clear_if_current(&mut self, generation: u64) -> Option<D::Handle> {
        if self.generation != generation {
            return None;
        }
        self.playing = false;
        self.current.take()
    }
}

pub struct LipSync<D: AudioDevice> {
    tag: String,
    config: LipSyncConfig,
    device: Rc<RefCell<D>>,
    session: Rc<RefCell<Session<D>>>,
}

/// Long `data:` urls are cut down before they reach the logs.
fn loggable(url: &str) -> String {
    const KEEP: usize = 40;
    if url.starts_with("data:") && url.len() > KEEP {
        let cut = (0..=KEEP).rev().find(|&i| url.is_char_boundary(i)).unwrap_or(0);
        format!("{}...", &url[..cut])
    } else {
        url.to_string()
    }
}

impl<D: AudioDevice + 'static> LipSync<D> {
    pub fn new(name: &str, device: D, config: LipSyncConfig) -> Result<Self, LipSyncError> {
        config.validate()?;
        Ok(Self {
            tag: format!("LipSync({name})"),
            config,
            device: Rc::new(RefCell::new(device)),
            session: Rc::new(RefCell::new(Session {
                analyser: None,
                buffer: Vec::new(),
                current: None,
                pending_dispose: Vec::new(),
                generation: 0,
                playing: false,
                destroyed: false,
            })),
        })
    }

    #[inline]
    pub fn tag(&self) -> &str {
        &self.tag
    }

    #[inline]
    pub fn config(&self) -> &LipSyncConfig {
        &self.config
    }

    #[inline]
    pub fn is_playing(&self) -> bool {
        self.session.borrow().playing
    }

    pub fn is_initialized(&self) -> bool {
        self.session.borrow().analyser.is_some()
    }

    /// Play `url`, replacing anything already playing.
    ///
    /// On failure the partial playback is torn down and the error is
    /// returned after being logged.
    pub async fn play(&self, url: &str, options: PlayOptions) -> Result<(), LipSyncError> {
        if self.session.borrow().destroyed {
            return Err(LipSyncError::Destroyed);
        }
        let result = self.try_play(url, options).await;
        if let Err(err) = &result {
            warn!(tag = %self.tag, source = %loggable(url), error = %err, "failed to play audio");
            self.stop();
        }
        result
    }

    async fn try_play(&self, url: &str, options: PlayOptions) -> Result<(), LipSyncError> {
        let analyser = self.ensure_analyser().await?;

        self.stop();

        let generation = {
            let mut session = self.session.borrow_mut();
            session.generation = session.generation.wrapping_add(1);
            session.generation
        };

        let on_finish = {
            let session = Rc::downgrade(&self.session);
            let device = Rc::downgrade(&self.device);
            let tag = self.tag.clone();
            Box::new(move || {
                debug!(tag = %tag, "audio finished");
                release(&session, &device, generation);
            })
        };
        let on_error = {
            let session = Rc::downgrade(&self.session);
            let device = Rc::downgrade(&self.device);
            let tag = self.tag.clone();
            Box::new(move |err: AudioError| {
                warn!(tag = %tag, error = %err, "audio playback error");
                release(&session, &device, generation);
            })
        };

        let handle = self.device.borrow_mut().add(url, on_finish, on_error);
        self.flush_disposals();
        let handle = handle?;
        self.session.borrow_mut().current = Some(handle.clone());

        let connected = {
            let mut device = self.device.borrow_mut();
            if let Some(mode) = options.cross_origin.as_ref().or(self.config.cross_origin.as_ref()) {
                device.set_cross_origin(&handle, mode);
            }
            if let Some(volume) = options.volume {
                device.set_volume(&handle, volume);
            }
            device.connect(&handle, &analyser)
        };
        self.flush_disposals();
        connected?;

        let started = self.device.borrow_mut().play(&handle);
        self.flush_disposals();
        started.await?;

        let mut session = self.session.borrow_mut();
        if session.generation == generation && session.current.is_some() {
            session.playing = true;
            debug!(tag = %self.tag, source = %loggable(url), "audio playing");
        }
        Ok(())
    }

    async fn ensure_analyser(&self) -> Result<Rc<D::Analyser>, LipSyncError> {
        if let Some(analyser) = self.session.borrow().analyser.clone() {
            return Ok(analyser);
        }

        let context = self.device.borrow_mut().create_context();
        context.await?;

        // A concurrent play may have finished initialising first.
        if let Some(analyser) = self.session.borrow().analyser.clone() {
            return Ok(analyser);
        }
        let analyser = Rc::new(self.device.borrow_mut().create_analyser(&self.config.analyser)?);
        let mut session = self.session.borrow_mut();
        session.buffer = vec![0.0; self.config.analyser.fft_size];
        session.analyser = Some(Rc::clone(&analyser));
        Ok(analyser)
    }

    /// Current mouth-open value.
    ///
    /// 0 when nothing is playing or the window is silent; otherwise the
    /// root-mean-square level, compressed and clamped into the configured
    /// range.
    pub fn get_value(&self) -> f32 {
        let (analyser, mut buffer) = {
            let mut session = self.session.borrow_mut();
            if !session.playing || session.current.is_none() {
                return 0.0;
            }
            let Some(analyser) = session.analyser.clone() else {
                return 0.0;
            };
            (analyser, std::mem::take(&mut session.buffer))
        };
        if buffer.is_empty() {
            return 0.0;
        }

        self.device.borrow().time_domain_data(&analyser, &mut buffer);
        let value = self.level(&buffer);
        self.session.borrow_mut().buffer = buffer;
        value
    }

    fn level(&self, samples: &[f32]) -> f32 {
        let sum_squares: f32 = samples.iter().map(|s| s * s).sum();
        if sum_squares == 0.0 {
            return 0.0;
        }
        let c = &self.config;
        let rms = (sum_squares / samples.len() as f32 * c.gain).sqrt();
        (rms.powf(c.bias_power) * c.bias_weight).clamp(c.min_value, c.max_value)
    }

    /// Dispose the current source. Safe to call at any time.
    pub fn stop(&self) {
        let handle = {
            let mut session = self.session.borrow_mut();
            session.playing = false;
            session.current.take()
        };
        if let Some(handle) = handle {
            self.device.borrow_mut().dispose(handle);
        }
        self.flush_disposals();
    }

    /// Dispose handles whose callbacks fired while the device was borrowed.
    fn flush_disposals(&self) {
        loop {
            let pending = std::mem::take(&mut self.session.borrow_mut().pending_dispose);
            if pending.is_empty() {
                return;
            }
            for handle in pending {
                self.device.borrow_mut().dispose(handle);
            }
        }
    }

    /// Stop, close the audio context and drop the analyser. Further plays
    /// fail with [`LipSyncError::Destroyed`].
    pub fn destroy(&self) {
        self.stop();
        {
            let mut session = self.session.borrow_mut();
            if session.destroyed {
                return;
            }
            session.destroyed = true;
            session.analyser = None;
            session.buffer = Vec::new();
        }
        self.device.borrow_mut().close_context();
    }
}

fn release<D: AudioDevice>(
    session: &Weak<RefCell<Session<D>>>,
    device: &Weak<RefCell<D>>,
    generation: u64,
) {
    let Some(session) = session.upgrade() else {
        return;
    };
    let Some(handle) = session.borrow_mut().clear_if_current(generation) else {
        return;
    };
    let Some(device) = device.upgrade() else {
        return;
    };
    // The device may be reporting from inside one of its own calls.
    match device.try_borrow_mut() {
        Ok(mut device) => device.dispose(handle),
        Err(_) => session.borrow_mut().pending_dispose.push(handle),
    };
}

impl<D: AudioDevice + 'static> LipSyncSource for LipSync<D> {
    fn value(&self) -> f32 {
        self.get_value()
    }

    fn is_active(&self) -> bool {
        self.is_playing()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn data_urls_are_abbreviated() {
        let long = format!("data:audio/wav;base64,{}", "A".repeat(500));
        let shown = loggable(&long);
        assert!(shown.len() < 50);
        assert!(shown.ends_with("..."));
        assert_eq!(loggable("voice/hello.wav"), "voice/hello.wav");
    }
}
