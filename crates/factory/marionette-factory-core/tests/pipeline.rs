use std::any::Any;
use std::cell::RefCell;
use std::rc::Rc;

use futures::executor::LocalPool;
use futures::future::{FutureExt, LocalBoxFuture};
use futures::task::LocalSpawnExt;
use marionette_api_core::{Event, LoadError, ModelSettings};
use marionette_factory_core::puppet::{PuppetPlatform, PuppetSettings};
use marionette_factory_core::{
    stages, FactoryContext, FactoryError, FactoryOptions, FactoryServices, InternalModel,
    Middleware, Model, ModelEvent, ModelFactory, ModelSource, Next, Platform, SharedInternalModel,
};
use marionette_motion_core::MotionManagerOptions;
use marionette_test_fixtures::{models, ManualTextureSource, MockLoader};
use serde_json::{json, Value as JsonValue};

const HARU: &str = "models/haru/haru.model.json";
const HARU_MINIMAL: &str = "models/haru/haru.minimal.model.json";
const MOC: &str = "models/haru/haru.moc";
const POSE: &str = "models/haru/haru.pose.json";
const PHYSICS: &str = "models/haru/haru.physics.json";

fn init_tracing() {
    let filter = std::env::var("RUST_LOG")
        .unwrap_or_else(|_| "marionette_factory_core=debug".to_string());
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
}

struct Rig {
    loader: MockLoader,
    textures: ManualTextureSource,
    pool: LocalPool,
    factory: ModelFactory,
}

impl Rig {
    fn new() -> Self {
        Self::with_textures(ManualTextureSource::new())
    }

    fn with_textures(textures: ManualTextureSource) -> Self {
        init_tracing();
        let loader = MockLoader::with_fixtures().unwrap();
        let pool = LocalPool::new();
        let mut factory = ModelFactory::new(FactoryServices {
            loader: Rc::new(loader.clone()),
            textures: Rc::new(textures.clone()),
            spawner: Rc::new(pool.spawner()),
        });
        factory.register_platform(Rc::new(PuppetPlatform));
        Self {
            loader,
            textures,
            pool,
            factory,
        }
    }

    /// Build into `model` and let background loads settle.
    fn build(
        &mut self,
        model: &Model,
        source: impl Into<ModelSource>,
    ) -> Result<(), FactoryError> {
        self.build_with(model, source, FactoryOptions::default())
    }

    fn build_with(
        &mut self,
        model: &Model,
        source: impl Into<ModelSource>,
        options: FactoryOptions,
    ) -> Result<(), FactoryError> {
        let build = self.factory.build_into(model, source, options);
        let result = self.pool.run_until(build);
        self.pool.run_until_stalled();
        result
    }
}

fn record(model: &Model) -> Rc<RefCell<Vec<&'static str>>> {
    let log = Rc::new(RefCell::new(Vec::new()));
    for name in ModelEvent::ALL {
        let log = Rc::clone(&log);
        model
            .events()
            .on(name, move |event: &ModelEvent| log.borrow_mut().push(event.name()));
    }
    log
}

fn internal(model: &Model) -> SharedInternalModel {
    model.internal_model().expect("model should be built")
}

#[test]
fn url_source_notifies_in_stage_order() {
    let mut rig = Rig::new();
    let model = Model::new();
    let log = record(&model);

    let seen_url = Rc::new(RefCell::new(None));
    let s = Rc::clone(&seen_url);
    model.events().on(ModelEvent::SETTINGS_JSON_LOADED, move |e| {
        if let ModelEvent::SettingsJsonLoaded(json) = e {
            *s.borrow_mut() = json["url"].as_str().map(str::to_string);
        }
    });

    rig.build(&model, HARU).unwrap();

    assert_eq!(
        *log.borrow(),
        vec![
            ModelEvent::SETTINGS_JSON_LOADED,
            ModelEvent::SETTINGS_LOADED,
            ModelEvent::TEXTURE_ADDED,
            ModelEvent::TEXTURE_ADDED,
            ModelEvent::MODEL_LOADED,
        ]
    );
    assert_eq!(seen_url.borrow().as_deref(), Some(HARU));
    assert_eq!(
        rig.textures.urls(),
        vec![
            "models/haru/textures/texture_00.png",
            "models/haru/textures/texture_01.png"
        ]
    );
    assert!(model.is_ready());
    assert!(!model.texture_valid());

    assert_eq!(rig.textures.resolve_all(), 2);
    assert!(model.texture_valid());
    assert_eq!(log.borrow().last(), Some(&ModelEvent::TEXTURE_LOADED));
    assert_eq!(rig.textures.resolve_all(), 0);
    let loaded = log
        .borrow()
        .iter()
        .filter(|name| **name == ModelEvent::TEXTURE_LOADED)
        .count();
    assert_eq!(loaded, 1);
}

#[test]
fn already_valid_textures_report_before_model_loaded() {
    let mut rig = Rig::with_textures(ManualTextureSource::instant());
    let model = Model::new();
    let log = record(&model);

    rig.build(&model, HARU).unwrap();

    assert_eq!(
        *log.borrow(),
        vec![
            ModelEvent::SETTINGS_JSON_LOADED,
            ModelEvent::SETTINGS_LOADED,
            ModelEvent::TEXTURE_ADDED,
            ModelEvent::TEXTURE_ADDED,
            ModelEvent::TEXTURE_LOADED,
            ModelEvent::MODEL_LOADED,
        ]
    );
}

#[test]
fn json_and_settings_sources_skip_earlier_notifications() {
    let mut rig = Rig::with_textures(ManualTextureSource::instant());

    let mut json = models::json("haru-minimal").unwrap();
    json["url"] = json!(HARU_MINIMAL);
    let model = Model::new();
    let log = record(&model);
    rig.build(&model, json.clone()).unwrap();
    assert_eq!(log.borrow().first(), Some(&ModelEvent::SETTINGS_LOADED));

    let settings: Rc<dyn ModelSettings> = Rc::new(PuppetSettings::from_json(&json).unwrap());
    let model = Model::new();
    let log = record(&model);
    rig.build(&model, settings).unwrap();
    assert_eq!(log.borrow().first(), Some(&ModelEvent::TEXTURE_ADDED));
    assert_eq!(log.borrow().last(), Some(&ModelEvent::MODEL_LOADED));
}

#[test]
fn model_without_pose_or_physics_still_builds() {
    let mut rig = Rig::new();
    let model = Model::new();
    rig.build(&model, HARU_MINIMAL).unwrap();

    let internal = internal(&model);
    assert!(!internal.has_pose());
    assert!(!internal.has_physics());
    assert_eq!(internal.settings().name(), "haru-minimal");
    assert_eq!(rig.loader.calls(POSE) + rig.loader.calls(PHYSICS), 0);
}

#[test]
fn optional_resources_attach_in_the_background() {
    let mut rig = Rig::new();
    let model = Model::new();
    rig.build(&model, HARU).unwrap();

    let internal = internal(&model);
    assert!(internal.has_pose());
    assert!(internal.has_physics());
}

#[test]
fn optional_resource_failures_never_reject() {
    let mut rig = Rig::new();
    rig.loader.fail(POSE);
    rig.loader.json(PHYSICS, json!({ "rules": "not a list" }));

    let model = Model::new();
    rig.build(&model, HARU).unwrap();

    let internal = internal(&model);
    assert!(!internal.has_pose());
    assert!(!internal.has_physics());
    assert_eq!(rig.loader.calls(POSE), 1);
}

#[test]
fn unrecognised_settings_are_a_structural_error() {
    let mut rig = Rig::new();
    let model = Model::new();
    let log = record(&model);

    let err = rig.build(&model, json!({ "hello": "world" })).unwrap_err();
    assert_eq!(err, FactoryError::UnknownSettingsFormat);
    assert_eq!(err.category(), "structure");
    assert!(log.borrow().is_empty());
    assert!(!model.is_ready());
}

#[test]
fn missing_settings_document_is_a_load_error() {
    let mut rig = Rig::new();
    let err = rig.build(&Model::new(), "models/nobody.model.json").unwrap_err();
    assert!(matches!(err, FactoryError::Load(LoadError::NotFound { .. })));
    assert_eq!(err.category(), "io");
}

#[test]
fn missing_core_model_rejects() {
    let mut rig = Rig::new();
    rig.loader.fail(MOC);
    let model = Model::new();
    let err = rig.build(&model, HARU).unwrap_err();
    assert!(matches!(err, FactoryError::Load(LoadError::Network { .. })));
    assert!(!model.is_ready());
}

#[derive(Debug)]
struct Foreign;

impl ModelSettings for Foreign {
    fn name(&self) -> &str {
        "foreign"
    }
    fn url(&self) -> &str {
        ""
    }
    fn moc(&self) -> &str {
        "foreign.bin"
    }
    fn textures(&self) -> &[String] {
        &[]
    }
    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[test]
fn settings_without_a_matching_platform_are_rejected() {
    let mut rig = Rig::new();
    let settings: Rc<dyn ModelSettings> = Rc::new(Foreign);
    let err = rig.build(&Model::new(), settings).unwrap_err();
    assert_eq!(
        err,
        FactoryError::UnknownModelSettings {
            name: "foreign".to_string()
        }
    );
}

#[test]
fn chain_without_internal_model_stage_fails_at_finalisation() {
    let mut rig = Rig::new();
    let chain: [Middleware<FactoryContext>; 3] = [
        stages::url_to_json,
        stages::json_to_settings,
        stages::setup_model,
    ];
    *rig.factory.middlewares_mut() = chain.to_vec();

    let model = Model::new();
    let log = record(&model);
    let err = rig.build(&model, HARU).unwrap_err();

    assert_eq!(err, FactoryError::MissingInternalModel);
    assert!(!log.borrow().contains(&ModelEvent::MODEL_LOADED));
    assert_eq!(model.textures().len(), 2);
    assert_eq!(rig.loader.calls(MOC), 0);
}

fn haru_alias<'a>(
    ctx: &'a mut FactoryContext,
    next: Next<'a, FactoryContext>,
) -> LocalBoxFuture<'a, Result<(), FactoryError>> {
    async move {
        if matches!(&ctx.source, ModelSource::Url(url) if url == "haru") {
            ctx.source = ModelSource::Url(HARU.to_string());
        }
        next.run(ctx).await
    }
    .boxed_local()
}

#[test]
fn custom_stages_run_ahead_of_the_defaults() {
    let mut rig = Rig::new();
    rig.factory.middlewares_mut().insert(0, haru_alias);
    assert_eq!(rig.factory.middlewares().len(), 6);

    let model = Model::new();
    rig.build(&model, "haru").unwrap();
    assert_eq!(internal(&model).settings().url(), HARU);
}

#[test]
fn concurrent_builds_share_one_core_model_fetch() {
    let mut rig = Rig::new();
    rig.loader.gate(MOC);

    let results = Rc::new(RefCell::new(Vec::new()));
    let models: Vec<Model> = (0..2).map(|_| Model::new()).collect();
    for model in &models {
        let build = rig
            .factory
            .build_into(model, HARU, FactoryOptions::default());
        let results = Rc::clone(&results);
        rig.pool
            .spawner()
            .spawn_local(async move {
                let value = build.await;
                results.borrow_mut().push(value)
            })
            .unwrap();
    }

    rig.pool.run_until_stalled();
    assert_eq!(rig.loader.calls(MOC), 1);
    assert_eq!(rig.factory.pending_core_loads(), 1);
    assert!(results.borrow().is_empty());

    rig.loader.release(MOC);
    rig.pool.run_until_stalled();
    assert_eq!(results.borrow().len(), 2);
    assert!(results.borrow().iter().all(Result::is_ok));
    assert!(models.iter().all(Model::is_ready));
    assert_eq!(rig.factory.pending_core_loads(), 0);

    // Settled loads are not cached.
    rig.build(&Model::new(), HARU).unwrap();
    assert_eq!(rig.loader.calls(MOC), 2);
}

struct StandIn {
    name: &'static str,
    version: u32,
    log: Rc<RefCell<Vec<&'static str>>>,
}

impl Platform for StandIn {
    fn name(&self) -> &str {
        self.name
    }

    fn version(&self) -> u32 {
        self.version
    }

    fn create_model_settings(&self, _json: &JsonValue) -> Option<Rc<dyn ModelSettings>> {
        self.log.borrow_mut().push(self.name);
        None
    }

    fn test(&self, _settings: &dyn ModelSettings) -> bool {
        false
    }

    fn create_core_model(&self, _data: &[u8]) -> Result<Box<dyn Any>, FactoryError> {
        Err(FactoryError::platform("stand-in platform"))
    }

    fn create_internal_model(
        &self,
        _core: Box<dyn Any>,
        _settings: Rc<dyn ModelSettings>,
        _options: &FactoryOptions,
        _services: &FactoryServices,
    ) -> Result<SharedInternalModel, FactoryError> {
        Err(FactoryError::platform("stand-in platform"))
    }

    fn create_pose(
        &self,
        _model: &dyn InternalModel,
        _data: &JsonValue,
    ) -> Result<Box<dyn Any>, FactoryError> {
        Err(FactoryError::platform("stand-in platform"))
    }

    fn create_physics(
        &self,
        _model: &dyn InternalModel,
        _data: &JsonValue,
    ) -> Result<Box<dyn Any>, FactoryError> {
        Err(FactoryError::platform("stand-in platform"))
    }
}

#[test]
fn platforms_are_tried_highest_version_first() {
    init_tracing();
    let loader = MockLoader::with_fixtures().unwrap();
    let mut pool = LocalPool::new();
    let mut factory = ModelFactory::new(FactoryServices {
        loader: Rc::new(loader),
        textures: Rc::new(ManualTextureSource::new()),
        spawner: Rc::new(pool.spawner()),
    });

    let log = Rc::new(RefCell::new(Vec::new()));
    for (name, version) in [("v1", 1), ("v3", 3), ("v2", 2)] {
        factory.register_platform(Rc::new(StandIn {
            name,
            version,
            log: Rc::clone(&log),
        }));
    }
    factory.register_platform(Rc::new(PuppetPlatform));

    let order: Vec<&str> = factory.platforms().iter().map(|p| p.name()).collect();
    assert_eq!(order, vec!["v3", "v2", "v1", "puppet"]);

    let model = Model::new();
    let build = factory.build_into(&model, HARU, FactoryOptions::default());
    pool.run_until(build).unwrap();
    assert_eq!(*log.borrow(), vec!["v3", "v2", "v1"]);
    assert!(model.is_ready());
}

#[test]
fn options_reach_textures_and_are_validated() {
    let mut rig = Rig::new();
    let options = FactoryOptions {
        cross_origin: Some("anonymous".to_string()),
        ..FactoryOptions::default()
    };
    rig.build_with(&Model::new(), HARU, options).unwrap();
    assert!(rig
        .textures
        .cross_origins()
        .iter()
        .all(|c| c.as_deref() == Some("anonymous")));

    let invalid = FactoryOptions {
        motion: MotionManagerOptions {
            lanes: 0,
            ..MotionManagerOptions::default()
        },
        ..FactoryOptions::default()
    };
    let err = rig.build_with(&Model::new(), HARU, invalid).unwrap_err();
    assert_eq!(err.category(), "config");
}

#[test]
fn destroy_tears_down_the_internal_model() {
    let mut rig = Rig::new();
    let model = Model::new();
    let log = record(&model);
    rig.build(&model, HARU).unwrap();
    let internal = internal(&model);

    model.destroy();
    model.destroy();

    assert_eq!(log.borrow().last(), Some(&ModelEvent::DESTROY));
    assert_eq!(
        log.borrow().iter().filter(|n| **n == ModelEvent::DESTROY).count(),
        1
    );
    assert!(internal.is_destroyed());
    assert!(model.internal_model().is_none());
    assert!(!model.update(16.0, 16.0));
}

#[test]
fn model_destroyed_mid_build_never_becomes_ready() {
    let mut rig = Rig::new();
    rig.loader.gate(MOC);
    let model = Model::new();
    let log = record(&model);

    let build = rig
        .factory
        .build_into(&model, HARU, FactoryOptions::default());
    let result = Rc::new(RefCell::new(None));
    let r = Rc::clone(&result);
    rig.pool
        .spawner()
        .spawn_local(async move { *r.borrow_mut() = Some(build.await) })
        .unwrap();
    rig.pool.run_until_stalled();

    model.destroy();
    rig.loader.release(MOC);
    rig.pool.run_until_stalled();

    assert!(matches!(*result.borrow(), Some(Ok(()))));
    assert!(!model.is_ready());
    assert!(!log.borrow().contains(&ModelEvent::MODEL_LOADED));
}
