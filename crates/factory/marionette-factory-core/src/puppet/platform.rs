use std::any::Any;
use std::rc::Rc;

use marionette_api_core::{ModelSettings, ParameterTable};
use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;
use tracing::debug;

use super::{PuppetModel, PuppetPhysics, PuppetPose, PuppetSettings};
use crate::platform::{InternalModel, Platform, SharedInternalModel};
use crate::{FactoryError, FactoryOptions, FactoryServices};

#[derive(Copy, Clone, Debug, Default)]
pub struct PuppetPlatform;

/// Decode a core model: UTF-8 `id=value` lines, blank lines and `#`
/// comments ignored.
pub fn parse_core_model(data: &[u8]) -> Result<ParameterTable, FactoryError> {
    let text = std::str::from_utf8(data).map_err(FactoryError::platform)?;
    let mut table = ParameterTable::new();
    for (number, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let (id, value) = line.split_once('=').ok_or_else(|| {
            FactoryError::platform(format!("line {}: expected id=value", number + 1))
        })?;
        let value: f32 = value.trim().parse().map_err(|err| {
            FactoryError::platform(format!("line {}: {err}", number + 1))
        })?;
        table.insert(id.trim(), value);
    }
    Ok(table)
}

fn decode<T: DeserializeOwned>(what: &str, data: &JsonValue) -> Result<T, FactoryError> {
    serde_json::from_value(data.clone())
        .map_err(|err| FactoryError::platform(format!("invalid {what}: {err}")))
}

impl Platform for PuppetPlatform {
    fn name(&self) -> &str {
        "puppet"
    }

    fn version(&self) -> u32 {
        1
    }

    fn create_model_settings(&self, json: &JsonValue) -> Option<Rc<dyn ModelSettings>> {
        match PuppetSettings::from_json(json) {
            Ok(settings) => Some(Rc::new(settings)),
            Err(err) => {
                debug!(platform = "puppet", error = %err, "not a puppet settings document");
                None
            }
        }
    }

    fn test(&self, settings: &dyn ModelSettings) -> bool {
        settings.as_any().is::<PuppetSettings>()
    }

    fn create_core_model(&self, data: &[u8]) -> Result<Box<dyn Any>, FactoryError> {
        Ok(Box::new(parse_core_model(data)?))
    }

    fn create_internal_model(
        &self,
        core: Box<dyn Any>,
        settings: Rc<dyn ModelSettings>,
        options: &FactoryOptions,
        services: &FactoryServices,
    ) -> Result<SharedInternalModel, FactoryError> {
        let core = core
            .downcast::<ParameterTable>()
            .map_err(|_| FactoryError::platform("core model is not a parameter table"))?;
        let model = PuppetModel::new(*core, settings, options, services)?;
        Ok(Rc::new(model))
    }

    fn create_pose(
        &self,
        _model: &dyn InternalModel,
        data: &JsonValue,
    ) -> Result<Box<dyn Any>, FactoryError> {
        Ok(Box::new(decode::<PuppetPose>("pose", data)?))
    }

    fn create_physics(
        &self,
        _model: &dyn InternalModel,
        data: &JsonValue,
    ) -> Result<Box<dyn Any>, FactoryError> {
        Ok(Box::new(decode::<PuppetPhysics>("physics", data)?))
    }
}
