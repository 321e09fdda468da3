use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use once_cell::sync::Lazy;
use serde::de::DeserializeOwned;
use serde::Deserialize;

pub mod audio;
pub mod loader;
pub mod textures;

pub use audio::{ScriptedAnalyser, ScriptedAudioDevice, ScriptedHandle};
pub use loader::MockLoader;
pub use textures::ManualTextureSource;

static MANIFEST: Lazy<Manifest> = Lazy::new(|| {
    let raw = include_str!("../../../../fixtures/manifest.json");
    serde_json::from_str(raw).expect("fixtures manifest should parse")
});

#[derive(Debug, Deserialize)]
struct Manifest {
    models: HashMap<String, String>,
    assets: HashMap<String, AssetKind>,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetKind {
    Json,
    Bytes,
}

fn fixtures_root() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("../../../fixtures")
}

fn resolve_path(rel: &str) -> PathBuf {
    fixtures_root().join(rel)
}

fn read_bytes(rel: &str) -> Result<Vec<u8>> {
    let path = resolve_path(rel);
    fs::read(&path).with_context(|| format!("failed to read fixture at {}", path.display()))
}

fn load_json<T: DeserializeOwned>(rel: &str) -> Result<T> {
    let bytes = read_bytes(rel)?;
    serde_json::from_slice(&bytes).with_context(|| format!("failed to parse JSON fixture {rel}"))
}

fn lookup<'a, T>(map: &'a HashMap<String, T>, kind: &str, name: &str) -> Result<&'a T> {
    map.get(name)
        .ok_or_else(|| anyhow!("unknown {kind} fixture '{name}'"))
}

/// Model settings documents. Their manifest path doubles as their url.
pub mod models {
    use super::*;

    pub fn keys() -> Vec<String> {
        MANIFEST.models.keys().cloned().collect()
    }

    pub fn url(name: &str) -> Result<String> {
        lookup(&MANIFEST.models, "model", name).cloned()
    }

    pub fn json(name: &str) -> Result<serde_json::Value> {
        let rel = lookup(&MANIFEST.models, "model", name)?;
        super::load_json(rel)
    }

    pub fn load<T: DeserializeOwned>(name: &str) -> Result<T> {
        let rel = lookup(&MANIFEST.models, "model", name)?;
        super::load_json(rel)
    }
}

/// Every other file a model references, keyed by url.
pub mod assets {
    use super::*;

    pub fn urls() -> Vec<String> {
        MANIFEST.assets.keys().cloned().collect()
    }

    pub fn kind(url: &str) -> Result<AssetKind> {
        lookup(&MANIFEST.assets, "asset", url).copied()
    }

    pub fn bytes(url: &str) -> Result<Vec<u8>> {
        lookup(&MANIFEST.assets, "asset", url)?;
        super::read_bytes(url)
    }

    pub fn json(url: &str) -> Result<serde_json::Value> {
        lookup(&MANIFEST.assets, "asset", url)?;
        super::load_json(url)
    }

    pub fn path(url: &str) -> Result<PathBuf> {
        lookup(&MANIFEST.assets, "asset", url)?;
        Ok(resolve_path(url))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_manifest_entry_exists() {
        for name in models::keys() {
            models::json(&name).unwrap();
        }
        for url in assets::urls() {
            match assets::kind(&url).unwrap() {
                AssetKind::Json => {
                    assets::json(&url).unwrap();
                }
                AssetKind::Bytes => assert!(!assets::bytes(&url).unwrap().is_empty()),
            }
        }
    }
}
