use std::any::Any;

use indexmap::IndexMap;
use marionette_api_core::ModelSettings;
use marionette_motion_core::{CurveExpressionSpec, CurveMotionSpec};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// Puppet settings document.
///
/// ```json
/// { "name": "haru", "model": "haru.moc", "textures": ["t0.png"],
///   "pose": "haru.pose.json", "motions": { "idle": [{ "file": "idle.json" }] },
///   "expressions": [{ "name": "smile", "file": "smile.exp.json" }] }
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PuppetSettings {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub url: String,
    pub model: String,
    pub textures: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pose: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub physics: Option<String>,
    #[serde(default)]
    pub motions: IndexMap<String, Vec<CurveMotionSpec>>,
    #[serde(default)]
    pub expressions: Vec<CurveExpressionSpec>,
}

impl PuppetSettings {
    /// Parse a settings document. A missing name falls back to the file
    /// name of `url`.
    pub fn from_json(json: &JsonValue) -> Result<Self, serde_json::Error> {
        let mut settings: Self = serde_json::from_value(json.clone())?;
        if settings.name.is_empty() {
            settings.name = name_from_url(&settings.url);
        }
        Ok(settings)
    }
}

fn name_from_url(url: &str) -> String {
    let file = url.rsplit('/').next().unwrap_or(url);
    file.split('.').next().unwrap_or(file).to_string()
}

impl ModelSettings for PuppetSettings {
    fn name(&self) -> &str {
        &self.name
    }

    fn url(&self) -> &str {
        &self.url
    }

    fn moc(&self) -> &str {
        &self.model
    }

    fn pose(&self) -> Option<&str> {
        self.pose.as_deref()
    }

    fn physics(&self) -> Option<&str> {
        self.physics.as_deref()
    }

    fn textures(&self) -> &[String] {
        &self.textures
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_and_resolves_against_url() {
        let settings = PuppetSettings::from_json(&json!({
            "url": "models/shizuku/shizuku.model.json",
            "model": "shizuku.moc",
            "textures": ["t/0.png"],
            "motions": { "idle": [{ "file": "m/idle.json" }] }
        }))
        .unwrap();

        assert_eq!(settings.name(), "shizuku");
        assert_eq!(settings.pose(), None);
        assert_eq!(settings.resolve_url(settings.moc()), "models/shizuku/shizuku.moc");
        assert_eq!(settings.motions["idle"][0].file, "m/idle.json");
    }

    #[test]
    fn documents_without_model_or_textures_are_rejected() {
        assert!(PuppetSettings::from_json(&json!({ "textures": [] })).is_err());
        assert!(PuppetSettings::from_json(&json!({ "model": "a.moc" })).is_err());
        assert!(PuppetSettings::from_json(&json!([1, 2])).is_err());
    }
}
