//! Resource loading contract.
//!
//! Transport is not our concern: the host plugs in a [`ResourceLoader`]
//! (fetch, filesystem, archive...) and everything above it only sees decoded
//! [`Payload`]s. Payloads and errors are cheap to clone because a single
//! load may be awaited by several callers at once (see [`crate::tasks`]).

use std::fmt;
use std::path::PathBuf;
use std::rc::Rc;

use futures::future::{self, FutureExt, LocalBoxFuture};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// How the loader should decode the fetched bytes.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceType {
    Json,
    ArrayBuffer,
}

impl ResourceType {
    #[inline]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::ArrayBuffer => "arraybuffer",
        }
    }
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Decoded resource.
#[derive(Clone, Debug, PartialEq)]
pub enum Payload {
    Json(Rc<JsonValue>),
    Bytes(Rc<[u8]>),
}

impl Payload {
    pub fn json(value: JsonValue) -> Self {
        Self::Json(Rc::new(value))
    }

    pub fn bytes(data: impl Into<Vec<u8>>) -> Self {
        let data: Vec<u8> = data.into();
        Self::Bytes(Rc::from(data))
    }

    #[inline]
    pub fn resource_type(&self) -> ResourceType {
        match self {
            Self::Json(_) => ResourceType::Json,
            Self::Bytes(_) => ResourceType::ArrayBuffer,
        }
    }

    pub fn as_json(&self) -> Result<&JsonValue, LoadError> {
        match self {
            Self::Json(v) => Ok(&**v),
            other => Err(LoadError::UnexpectedPayload {
                expected: ResourceType::Json,
                actual: other.resource_type(),
            }),
        }
    }

    pub fn as_bytes(&self) -> Result<&[u8], LoadError> {
        match self {
            Self::Bytes(b) => Ok(&**b),
            other => Err(LoadError::UnexpectedPayload {
                expected: ResourceType::ArrayBuffer,
                actual: other.resource_type(),
            }),
        }
    }
}

/// One load request. `url` is already resolved against the model settings.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LoadRequest {
    pub url: String,
    pub ty: ResourceType,
    /// Tag of the component asking, for diagnostics only.
    pub target: String,
}

impl LoadRequest {
    pub fn new(url: impl Into<String>, ty: ResourceType) -> Self {
        Self {
            url: url.into(),
            ty,
            target: String::new(),
        }
    }

    #[inline]
    pub fn with_target(mut self, target: impl Into<String>) -> Self {
        self.target = target.into();
        self
    }
}

/// Failure to fetch or decode a single resource.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum LoadError {
    #[error("resource not found: {url}")]
    NotFound { url: String },

    #[error("failed to fetch {url}: {reason}")]
    Network { url: String, reason: String },

    #[error("failed to decode {url} as {expected}: {reason}")]
    Decode {
        url: String,
        expected: ResourceType,
        reason: String,
    },

    #[error("expected {expected} payload, got {actual}")]
    UnexpectedPayload {
        expected: ResourceType,
        actual: ResourceType,
    },
}

impl LoadError {
    #[inline]
    pub fn category(&self) -> &'static str {
        match self {
            Self::NotFound { .. } | Self::Network { .. } => "io",
            Self::Decode { .. } | Self::UnexpectedPayload { .. } => "decode",
        }
    }
}

/// Host-provided transport.
pub trait ResourceLoader {
    fn load(&self, request: LoadRequest) -> LocalBoxFuture<'static, Result<Payload, LoadError>>;
}

impl<L: ResourceLoader + ?Sized> ResourceLoader for Rc<L> {
    fn load(&self, request: LoadRequest) -> LocalBoxFuture<'static, Result<Payload, LoadError>> {
        (**self).load(request)
    }
}

/// Loads resources from the local filesystem, treating urls as paths
/// relative to `root`.
#[derive(Clone, Debug)]
pub struct FsLoader {
    root: PathBuf,
}

impl FsLoader {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn read(&self, request: &LoadRequest) -> Result<Payload, LoadError> {
        let path = self.root.join(request.url.trim_start_matches('/'));
        let bytes = std::fs::read(&path).map_err(|err| match err.kind() {
            std::io::ErrorKind::NotFound => LoadError::NotFound {
                url: request.url.clone(),
            },
            _ => LoadError::Network {
                url: request.url.clone(),
                reason: err.to_string(),
            },
        })?;
        match request.ty {
            ResourceType::ArrayBuffer => Ok(Payload::bytes(bytes)),
            ResourceType::Json => serde_json::from_slice(&bytes)
                .map(Payload::json)
                .map_err(|err| LoadError::Decode {
                    url: request.url.clone(),
                    expected: ResourceType::Json,
                    reason: err.to_string(),
                }),
        }
    }
}

impl ResourceLoader for FsLoader {
    fn load(&self, request: LoadRequest) -> LocalBoxFuture<'static, Result<Payload, LoadError>> {
        tracing::debug!(target_tag = %request.target, url = %request.url, ty = %request.ty, "fs load");
        future::ready(self.read(&request)).boxed_local()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::executor::block_on;
    use serde_json::json;

    #[test]
    fn payload_type_mismatch_is_reported() {
        let p = Payload::bytes(vec![1, 2, 3]);
        assert_eq!(p.as_bytes().unwrap(), &[1, 2, 3]);
        let err = p.as_json().unwrap_err();
        assert_eq!(
            err,
            LoadError::UnexpectedPayload {
                expected: ResourceType::Json,
                actual: ResourceType::ArrayBuffer
            }
        );
        assert_eq!(err.category(), "decode");
    }

    #[test]
    fn fs_loader_reads_json_and_bytes() {
        let dir = std::env::temp_dir().join(format!("marionette-fs-{}", std::process::id()));
        std::fs::create_dir_all(dir.join("m")).unwrap();
        std::fs::write(dir.join("m/a.json"), br#"{"x":1}"#).unwrap();
        std::fs::write(dir.join("m/b.bin"), [9u8, 8]).unwrap();

        let loader = FsLoader::new(&dir);
        let json_payload =
            block_on(loader.load(LoadRequest::new("m/a.json", ResourceType::Json))).unwrap();
        assert_eq!(json_payload.as_json().unwrap(), &json!({"x": 1}));

        let bin =
            block_on(loader.load(LoadRequest::new("/m/b.bin", ResourceType::ArrayBuffer))).unwrap();
        assert_eq!(bin.as_bytes().unwrap(), &[9, 8]);

        let missing = block_on(loader.load(LoadRequest::new("nope.json", ResourceType::Json)));
        assert!(matches!(missing, Err(LoadError::NotFound { .. })));

        let _ = std::fs::remove_dir_all(&dir);
    }
}
