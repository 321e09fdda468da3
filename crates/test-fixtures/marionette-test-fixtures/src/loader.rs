//! In-memory [`ResourceLoader`] with per-url gates.
//!
//! Gated urls park every load until [`MockLoader::release`] is called, which
//! lets a test interleave a load with other requests on a `LocalPool`.

use std::cell::RefCell;
use std::rc::Rc;

use futures::channel::oneshot;
use futures::future::{self, FutureExt, LocalBoxFuture};
use hashbrown::{HashMap, HashSet};
use marionette_api_core::{LoadError, LoadRequest, Payload, ResourceLoader};

use crate::{assets, models, AssetKind};

#[derive(Default)]
struct State {
    routes: HashMap<String, Result<Payload, LoadError>>,
    gated: HashSet<String>,
    waiting: HashMap<String, Vec<oneshot::Sender<()>>>,
    requests: Vec<LoadRequest>,
}

/// Cloning shares the routes, gates and request log.
#[derive(Clone, Default)]
pub struct MockLoader {
    state: Rc<RefCell<State>>,
}

impl MockLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// A loader serving every file listed in the fixtures manifest at its
    /// manifest path.
    pub fn with_fixtures() -> anyhow::Result<Self> {
        let loader = Self::new();
        for name in models::keys() {
            loader.json(models::url(&name)?, models::json(&name)?);
        }
        for url in assets::urls() {
            match assets::kind(&url)? {
                AssetKind::Json => loader.json(&url, assets::json(&url)?),
                AssetKind::Bytes => loader.bytes(&url, assets::bytes(&url)?),
            };
        }
        Ok(loader)
    }

    pub fn json(&self, url: impl Into<String>, value: serde_json::Value) -> &Self {
        self.route(url, Ok(Payload::json(value)))
    }

    pub fn bytes(&self, url: impl Into<String>, data: impl Into<Vec<u8>>) -> &Self {
        self.route(url, Ok(Payload::bytes(data)))
    }

    /// Make `url` fail with a network error.
    pub fn fail(&self, url: impl Into<String>) -> &Self {
        let url = url.into();
        let err = LoadError::Network {
            url: url.clone(),
            reason: "scripted failure".into(),
        };
        self.route(url, Err(err))
    }

    fn route(&self, url: impl Into<String>, result: Result<Payload, LoadError>) -> &Self {
        self.state.borrow_mut().routes.insert(url.into(), result);
        self
    }

    /// Hold loads of `url` until [`release`](Self::release).
    pub fn gate(&self, url: impl Into<String>) -> &Self {
        self.state.borrow_mut().gated.insert(url.into());
        self
    }

    /// Let every parked and future load of `url` through. Returns how many
    /// were parked.
    pub fn release(&self, url: &str) -> usize {
        let waiting = {
            let mut state = self.state.borrow_mut();
            state.gated.remove(url);
            state.waiting.remove(url).unwrap_or_default()
        };
        let count = waiting.len();
        for tx in waiting {
            let _ = tx.send(());
        }
        count
    }

    /// Number of loads issued for `url`.
    pub fn calls(&self, url: &str) -> usize {
        self.state
            .borrow()
            .requests
            .iter()
            .filter(|r| r.url == url)
            .count()
    }

    pub fn total_calls(&self) -> usize {
        self.state.borrow().requests.len()
    }

    pub fn requests(&self) -> Vec<LoadRequest> {
        self.state.borrow().requests.clone()
    }
}

impl ResourceLoader for MockLoader {
    fn load(&self, request: LoadRequest) -> LocalBoxFuture<'static, Result<Payload, LoadError>> {
        let mut state = self.state.borrow_mut();
        state.requests.push(request.clone());
        let result = state
            .routes
            .get(&request.url)
            .cloned()
            .unwrap_or_else(|| {
                Err(LoadError::NotFound {
                    url: request.url.clone(),
                })
            });

        if !state.gated.contains(&request.url) {
            return future::ready(result).boxed_local();
        }
        let (tx, rx) = oneshot::channel();
        state.waiting.entry(request.url).or_default().push(tx);
        async move {
            let _ = rx.await;
            result
        }
        .boxed_local()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::executor::{block_on, LocalPool};
    use marionette_api_core::ResourceType;

    #[test]
    fn serves_fixtures_and_counts_calls() {
        let loader = MockLoader::with_fixtures().unwrap();
        let url = models::url("haru").unwrap();
        let payload = block_on(loader.load(LoadRequest::new(&url, ResourceType::Json))).unwrap();
        assert_eq!(payload.as_json().unwrap()["name"], "haru");
        assert_eq!(loader.calls(&url), 1);

        let missing = block_on(loader.load(LoadRequest::new("nope", ResourceType::Json)));
        assert!(matches!(missing, Err(LoadError::NotFound { .. })));
    }

    #[test]
    fn gated_loads_wait_for_release() {
        let loader = MockLoader::new();
        loader.json("a", serde_json::json!(1)).gate("a");
        let mut pool = LocalPool::new();

        let pending = loader.load(LoadRequest::new("a", ResourceType::Json));
        let mut pending = pending.fuse();
        pool.run_until_stalled();
        assert!(futures::FutureExt::now_or_never(&mut pending).is_none());

        assert_eq!(loader.release("a"), 1);
        assert!(pool.run_until(pending).is_ok());
    }
}
