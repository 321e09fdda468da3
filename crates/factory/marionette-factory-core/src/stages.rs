//! The default construction stages, in the order [`crate::ModelFactory`]
//! runs them.

use std::rc::Rc;

use futures::future::{FutureExt, LocalBoxFuture};
use futures::task::LocalSpawnExt;
use marionette_api_core::{LoadError, LoadRequest, ModelSettings, Payload, ResourceType};
use serde_json::Value as JsonValue;
use tracing::{debug, warn};

use crate::platform::{Platform, SharedInternalModel};
use crate::{FactoryContext, FactoryError, ModelEvent, ModelSource, Next};

const TAG: &str = "ModelFactory";

type Stage<'a> = LocalBoxFuture<'a, Result<(), FactoryError>>;

/// Fetch a url source as JSON and record the url on it.
pub fn url_to_json<'a>(
    ctx: &'a mut FactoryContext,
    next: Next<'a, FactoryContext>,
) -> Stage<'a> {
    async move {
        if let ModelSource::Url(url) = &ctx.source {
            let url = url.clone();
            let request = LoadRequest::new(url.clone(), ResourceType::Json).with_target(TAG);
            let payload = ctx.services.loader.load(request).await?;
            let mut json = payload.as_json()?.clone();
            if let JsonValue::Object(map) = &mut json {
                map.insert("url".to_string(), JsonValue::String(url));
            }
            let json = Rc::new(json);
            ctx.source = ModelSource::Json(Rc::clone(&json));
            ctx.model.events().emit(ModelEvent::SettingsJsonLoaded(json));
        }
        next.run(ctx).await
    }
    .boxed_local()
}

/// Turn the source into settings, probing platforms highest version first.
pub fn json_to_settings<'a>(
    ctx: &'a mut FactoryContext,
    next: Next<'a, FactoryContext>,
) -> Stage<'a> {
    async move {
        let settings = match &ctx.source {
            ModelSource::Settings(settings) => Rc::clone(settings),
            ModelSource::Json(json) => {
                let settings = ctx
                    .platforms
                    .iter()
                    .find_map(|platform| platform.create_model_settings(json))
                    .ok_or(FactoryError::UnknownSettingsFormat)?;
                ctx.model
                    .events()
                    .emit(ModelEvent::SettingsLoaded(Rc::clone(&settings)));
                settings
            }
            ModelSource::Url(_) => return Err(FactoryError::UnknownSettingsFormat),
        };
        debug!(tag = TAG, model = %settings.name(), "settings ready");
        ctx.settings = Some(settings);
        next.run(ctx).await
    }
    .boxed_local()
}

/// Start loading textures, run the rest of the chain, then attach the
/// internal model it produced.
pub fn setup_model<'a>(
    ctx: &'a mut FactoryContext,
    next: Next<'a, FactoryContext>,
) -> Stage<'a> {
    async move {
        let settings = ctx.settings.clone().ok_or(FactoryError::MissingSettings)?;
        ctx.model.set_options(ctx.options.clone());

        let cross_origin = ctx.options.cross_origin.as_deref();
        for file in settings.textures() {
            let url = settings.resolve_url(file);
            let texture = ctx.services.textures.load(&url, cross_origin);
            ctx.model.add_texture(texture);
        }
        ctx.model.watch_textures();

        next.run(ctx).await?;

        let internal = ctx
            .internal_model
            .clone()
            .ok_or(FactoryError::MissingInternalModel)?;
        if ctx.model.attach_internal_model(internal) {
            ctx.model.events().emit(ModelEvent::ModelLoaded);
        }
        Ok(())
    }
    .boxed_local()
}

/// Pick the platform, fetch the core-model binary and build the internal
/// model.
pub fn create_internal_model<'a>(
    ctx: &'a mut FactoryContext,
    next: Next<'a, FactoryContext>,
) -> Stage<'a> {
    async move {
        let settings = ctx.settings.clone().ok_or(FactoryError::MissingSettings)?;
        let platform = ctx
            .platforms
            .iter()
            .find(|platform| platform.test(&*settings))
            .cloned()
            .ok_or_else(|| FactoryError::UnknownModelSettings {
                name: settings.name().to_string(),
            })?;

        let url = settings.resolve_url(settings.moc());
        let loader = Rc::clone(&ctx.services.loader);
        let task = ctx.moc_tasks.request(url.clone(), move || {
            loader.load(LoadRequest::new(url, ResourceType::ArrayBuffer).with_target(TAG))
        });
        let payload = task.await?;

        let core = platform.create_core_model(payload.as_bytes()?)?;
        let internal =
            platform.create_internal_model(core, settings, &ctx.options, &ctx.services)?;
        debug!(tag = TAG, platform = %platform.name(), "internal model created");

        ctx.internal_model = Some(internal);
        ctx.platform = Some(platform);
        next.run(ctx).await
    }
    .boxed_local()
}

#[derive(Copy, Clone, Debug)]
enum Optional {
    Pose,
    Physics,
}

impl Optional {
    fn name(self) -> &'static str {
        match self {
            Self::Pose => "pose",
            Self::Physics => "physics",
        }
    }

    fn file(self, settings: &dyn ModelSettings) -> Option<&str> {
        match self {
            Self::Pose => settings.pose(),
            Self::Physics => settings.physics(),
        }
    }
}

/// Load pose and physics in the background. Failures are logged and never
/// reach the caller.
pub fn setup_optionals<'a>(
    ctx: &'a mut FactoryContext,
    next: Next<'a, FactoryContext>,
) -> Stage<'a> {
    async move {
        if let (Some(settings), Some(internal), Some(platform)) =
            (&ctx.settings, &ctx.internal_model, &ctx.platform)
        {
            for kind in [Optional::Pose, Optional::Physics] {
                let Some(file) = kind.file(&**settings) else {
                    continue;
                };
                let url = settings.resolve_url(file);
                let request = LoadRequest::new(url.clone(), ResourceType::Json).with_target(TAG);
                let load = ctx.services.loader.load(request);
                let internal = Rc::clone(internal);
                let platform = Rc::clone(platform);
                let spawned = ctx.services.spawner.spawn_local(async move {
                    if let Err(err) = attach_optional(kind, load.await, &*platform, &internal) {
                        warn!(
                            tag = TAG,
                            resource = kind.name(),
                            %url,
                            error = %err,
                            "failed to load optional resource"
                        );
                    }
                });
                if let Err(err) = spawned {
                    warn!(
                        tag = TAG,
                        resource = kind.name(),
                        error = %err,
                        "could not schedule optional resource"
                    );
                }
            }
        }
        next.run(ctx).await
    }
    .boxed_local()
}

fn attach_optional(
    kind: Optional,
    loaded: Result<Payload, LoadError>,
    platform: &dyn Platform,
    internal: &SharedInternalModel,
) -> Result<(), FactoryError> {
    let payload = loaded?;
    let data = payload.as_json()?;
    let attached = match kind {
        Optional::Pose => internal.attach_pose(platform.create_pose(&**internal, data)?),
        Optional::Physics => {
            internal.attach_physics(platform.create_physics(&**internal, data)?)
        }
    };
    if !attached {
        debug!(
            tag = TAG,
            resource = kind.name(),
            "internal model declined optional resource"
        );
    }
    Ok(())
}
