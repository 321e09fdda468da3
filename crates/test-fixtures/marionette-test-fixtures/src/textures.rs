//! [`TextureSource`] that settles textures only when told to.

use std::cell::RefCell;
use std::rc::Rc;

use marionette_factory_core::{Texture, TextureSource};

#[derive(Default)]
struct State {
    textures: Vec<Texture>,
    cross_origins: Vec<Option<String>>,
    instant: bool,
}

/// Cloning shares the recorded textures.
#[derive(Clone, Default)]
pub struct ManualTextureSource {
    state: Rc<RefCell<State>>,
}

impl ManualTextureSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// A source whose textures are valid as soon as they are requested.
    pub fn instant() -> Self {
        let source = Self::new();
        source.state.borrow_mut().instant = true;
        source
    }

    pub fn textures(&self) -> Vec<Texture> {
        self.state.borrow().textures.clone()
    }

    pub fn urls(&self) -> Vec<String> {
        self.textures().iter().map(|t| t.url().to_string()).collect()
    }

    pub fn cross_origins(&self) -> Vec<Option<String>> {
        self.state.borrow().cross_origins.clone()
    }

    /// Mark every pending texture valid. Returns how many were settled.
    pub fn resolve_all(&self) -> usize {
        self.textures().iter().filter(|t| t.resolve()).count()
    }

    pub fn fail(&self, url: &str, reason: &str) -> bool {
        self.textures()
            .iter()
            .filter(|t| t.url() == url)
            .any(|t| t.fail(reason))
    }
}

impl TextureSource for ManualTextureSource {
    fn load(&self, url: &str, cross_origin: Option<&str>) -> Texture {
        let mut state = self.state.borrow_mut();
        let texture = if state.instant {
            Texture::valid(url)
        } else {
            Texture::loading(url)
        };
        state.textures.push(texture.clone());
        state.cross_origins.push(cross_origin.map(str::to_string));
        texture
    }
}
