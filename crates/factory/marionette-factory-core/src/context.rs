use std::fmt;
use std::rc::Rc;

use futures::task::LocalSpawn;
use marionette_api_core::{LoadError, ModelSettings, Payload, ResourceLoader, TaskMap};
use serde_json::Value as JsonValue;

use crate::platform::{Platform, SharedInternalModel};
use crate::{FactoryOptions, Model, TextureSource};

/// What a model is built from. Stages narrow it from url to settings.
#[derive(Clone)]
pub enum ModelSource {
    Url(String),
    Json(Rc<JsonValue>),
    Settings(Rc<dyn ModelSettings>),
}

impl fmt::Debug for ModelSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Url(url) => f.debug_tuple("Url").field(url).finish(),
            Self::Json(_) => f.write_str("Json(..)"),
            Self::Settings(s) => f.debug_tuple("Settings").field(&s.name()).finish(),
        }
    }
}

impl From<&str> for ModelSource {
    fn from(url: &str) -> Self {
        Self::Url(url.to_string())
    }
}

impl From<String> for ModelSource {
    fn from(url: String) -> Self {
        Self::Url(url)
    }
}

impl From<JsonValue> for ModelSource {
    fn from(json: JsonValue) -> Self {
        Self::Json(Rc::new(json))
    }
}

impl From<Rc<dyn ModelSettings>> for ModelSource {
    fn from(settings: Rc<dyn ModelSettings>) -> Self {
        Self::Settings(settings)
    }
}

/// Host collaborators handed to every stage and platform.
#[derive(Clone)]
pub struct FactoryServices {
    pub loader: Rc<dyn ResourceLoader>,
    pub textures: Rc<dyn TextureSource>,
    /// Runs fire-and-forget work such as optional resource loads.
    pub spawner: Rc<dyn LocalSpawn>,
}

impl fmt::Debug for FactoryServices {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FactoryServices").finish_non_exhaustive()
    }
}

pub(crate) type MocTasks = TaskMap<String, Result<Payload, LoadError>>;

/// Mutable record threaded through one construction.
pub struct FactoryContext {
    pub source: ModelSource,
    pub options: FactoryOptions,
    pub model: Model,
    pub settings: Option<Rc<dyn ModelSettings>>,
    pub internal_model: Option<SharedInternalModel>,
    pub platform: Option<Rc<dyn Platform>>,
    /// Snapshot of the factory's platforms, highest version first.
    pub platforms: Vec<Rc<dyn Platform>>,
    pub services: FactoryServices,
    pub(crate) moc_tasks: MocTasks,
}

impl fmt::Debug for FactoryContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FactoryContext")
            .field("source", &self.source)
            .field("settings", &self.settings.as_ref().map(|s| s.name().to_string()))
            .field("internal_model", &self.internal_model.is_some())
            .field("platform", &self.platform.as_ref().map(|p| p.name().to_string()))
            .field("platforms", &self.platforms.len())
            .finish()
    }
}
