use std::rc::Rc;

use marionette_api_core::{Event, ModelSettings};
use serde_json::Value as JsonValue;

/// Notifications emitted on a [`crate::Model`] while it is built and used.
#[derive(Clone, Debug)]
pub enum ModelEvent {
    /// Raw settings JSON fetched from a url, with the url recorded on it.
    SettingsJsonLoaded(Rc<JsonValue>),
    /// Settings parsed by a platform.
    SettingsLoaded(Rc<dyn ModelSettings>),
    TextureAdded { index: usize, url: String },
    /// Every texture is valid. Fires at most once per model.
    TextureLoaded,
    ModelLoaded,
    Destroy,
}

impl ModelEvent {
    pub const SETTINGS_JSON_LOADED: &'static str = "settingsJSONLoaded";
    pub const SETTINGS_LOADED: &'static str = "settingsLoaded";
    pub const TEXTURE_ADDED: &'static str = "textureAdded";
    pub const TEXTURE_LOADED: &'static str = "textureLoaded";
    pub const MODEL_LOADED: &'static str = "modelLoaded";
    pub const DESTROY: &'static str = "destroy";

    pub const ALL: [&'static str; 6] = [
        Self::SETTINGS_JSON_LOADED,
        Self::SETTINGS_LOADED,
        Self::TEXTURE_ADDED,
        Self::TEXTURE_LOADED,
        Self::MODEL_LOADED,
        Self::DESTROY,
    ];
}

impl Event for ModelEvent {
    fn name(&self) -> &'static str {
        match self {
            Self::SettingsJsonLoaded(_) => Self::SETTINGS_JSON_LOADED,
            Self::SettingsLoaded(_) => Self::SETTINGS_LOADED,
            Self::TextureAdded { .. } => Self::TEXTURE_ADDED,
            Self::TextureLoaded => Self::TEXTURE_LOADED,
            Self::ModelLoaded => Self::MODEL_LOADED,
            Self::Destroy => Self::DESTROY,
        }
    }
}
