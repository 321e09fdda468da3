use std::fmt;
use std::rc::Rc;

use futures::future::{FutureExt, LocalBoxFuture};
use tracing::{debug, warn};

use crate::context::MocTasks;
use crate::middleware::run_chain;
use crate::platform::Platform;
use crate::{
    stages, FactoryContext, FactoryError, FactoryOptions, FactoryServices, Middleware, Model,
    ModelSource,
};

const TAG: &str = "ModelFactory";

/// Builds [`Model`]s by running a middleware chain over a fresh
/// [`FactoryContext`] per call.
///
/// Platforms and middlewares are snapshotted when a construction starts, so
/// registering a platform never affects one that is already running.
pub struct ModelFactory {
    platforms: Vec<Rc<dyn Platform>>,
    middlewares: Vec<Middleware<FactoryContext>>,
    services: FactoryServices,
    moc_tasks: MocTasks,
}

impl fmt::Debug for ModelFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let platforms: Vec<_> = self
            .platforms
            .iter()
            .map(|p| format!("{}@{}", p.name(), p.version()))
            .collect();
        f.debug_struct("ModelFactory")
            .field("platforms", &platforms)
            .field("middlewares", &self.middlewares.len())
            .field("pending_mocs", &self.moc_tasks.len())
            .finish()
    }
}

impl ModelFactory {
    /// The stages every factory starts with.
    pub fn default_middlewares() -> Vec<Middleware<FactoryContext>> {
        let chain: [Middleware<FactoryContext>; 5] = [
            stages::url_to_json,
            stages::json_to_settings,
            stages::setup_model,
            stages::create_internal_model,
            stages::setup_optionals,
        ];
        chain.to_vec()
    }

    pub fn new(services: FactoryServices) -> Self {
        Self {
            platforms: Vec::new(),
            middlewares: Self::default_middlewares(),
            services,
            moc_tasks: MocTasks::new(),
        }
    }

    #[inline]
    pub fn services(&self) -> &FactoryServices {
        &self.services
    }

    /// Add a platform, keeping the list ordered by descending version.
    /// Platforms of equal version keep registration order.
    pub fn register_platform(&mut self, platform: Rc<dyn Platform>) {
        debug!(
            tag = TAG,
            platform = %platform.name(),
            version = platform.version(),
            "register platform"
        );
        let at = self
            .platforms
            .iter()
            .position(|p| p.version() < platform.version())
            .unwrap_or(self.platforms.len());
        self.platforms.insert(at, platform);
    }

    pub fn platforms(&self) -> &[Rc<dyn Platform>] {
        &self.platforms
    }

    pub fn middlewares(&self) -> &[Middleware<FactoryContext>] {
        &self.middlewares
    }

    /// Edit the chain, e.g. to insert a stage of one's own.
    pub fn middlewares_mut(&mut self) -> &mut Vec<Middleware<FactoryContext>> {
        &mut self.middlewares
    }

    /// Core-model loads currently in flight.
    pub fn pending_core_loads(&self) -> usize {
        self.moc_tasks.len()
    }

    /// Build a new model from `source`.
    pub fn create_model(
        &self,
        source: impl Into<ModelSource>,
        options: FactoryOptions,
    ) -> LocalBoxFuture<'static, Result<Model, FactoryError>> {
        let model = Model::new();
        let build = self.build_into(&model, source, options);
        async move {
            build.await?;
            Ok(model)
        }
        .boxed_local()
    }

    /// Build into a model the caller already holds, so listeners can be
    /// attached before the first notification.
    pub fn build_into(
        &self,
        model: &Model,
        source: impl Into<ModelSource>,
        options: FactoryOptions,
    ) -> LocalBoxFuture<'static, Result<(), FactoryError>> {
        let chain = self.middlewares.clone();
        let mut ctx = FactoryContext {
            source: source.into(),
            options,
            model: model.clone(),
            settings: None,
            internal_model: None,
            platform: None,
            platforms: self.platforms.clone(),
            services: self.services.clone(),
            moc_tasks: self.moc_tasks.clone(),
        };
        async move {
            ctx.options.validate()?;
            let result = run_chain(&chain, &mut ctx).await;
            if let Err(err) = &result {
                warn!(
                    tag = TAG,
                    source = ?ctx.source,
                    category = err.category(),
                    error = %err,
                    "model construction failed"
                );
            }
            result
        }
        .boxed_local()
    }
}
