use std::any::Any;
use std::cell::RefCell;
use std::rc::Rc;

use futures::executor::LocalPool;
use futures::task::LocalSpawnExt;
use futures::FutureExt;
use marionette_api_core::{CoreModel, ModelSettings, ParameterTable};
use marionette_motion_core::{CurveCodec, CurveExpressionSpec, ExpressionEvent, ExpressionManager};
use marionette_test_fixtures::MockLoader;

const SMILE: &str = "models/haru/expressions/smile.exp.json";
const ANGRY: &str = "models/haru/expressions/angry.exp.json";

#[derive(Debug)]
struct Haru;

impl ModelSettings for Haru {
    fn name(&self) -> &str {
        "haru"
    }
    fn url(&self) -> &str {
        "models/haru/haru.model.json"
    }
    fn moc(&self) -> &str {
        "haru.moc"
    }
    fn textures(&self) -> &[String] {
        &[]
    }
    fn as_any(&self) -> &dyn Any {
        self
    }
}

fn manager(loader: &MockLoader) -> ExpressionManager<CurveCodec> {
    let defs = vec![
        CurveExpressionSpec {
            name: "smile".into(),
            file: "expressions/smile.exp.json".into(),
        },
        CurveExpressionSpec {
            name: "angry".into(),
            file: "expressions/angry.exp.json".into(),
        },
        CurveExpressionSpec {
            name: "sleepy".into(),
            file: "expressions/sleepy.exp.json".into(),
        },
    ];
    ExpressionManager::new(CurveCodec, Rc::new(Haru), Rc::new(loader.clone()), defs)
}

fn record(manager: &ExpressionManager<CurveCodec>) -> Rc<RefCell<Vec<ExpressionEvent>>> {
    let log = Rc::new(RefCell::new(Vec::new()));
    for name in [ExpressionEvent::SET, ExpressionEvent::RESET, ExpressionEvent::DESTROY] {
        let log = Rc::clone(&log);
        manager
            .events()
            .on(name, move |e| log.borrow_mut().push(e.clone()));
    }
    log
}

fn face() -> ParameterTable {
    ParameterTable::new()
        .with("ParamEyeLSmile", 0.0)
        .with("ParamBrowLY", 0.0)
}

#[test]
fn set_by_name_applies_and_holds() {
    let loader = MockLoader::with_fixtures().unwrap();
    let exprs = manager(&loader);
    let log = record(&exprs);
    let mut pool = LocalPool::new();

    assert!(pool.run_until(exprs.set_expression("smile")));
    assert_eq!(exprs.current(), Some(0));
    assert_eq!(*log.borrow(), vec![ExpressionEvent::Set { index: 0 }]);

    let mut table = face();
    assert!(exprs.update(&mut table, 0.0));
    assert!(exprs.update(&mut table, 60_000.0), "expressions never finish");
    assert_eq!(table.parameter("ParamEyeLSmile"), Some(1.0));

    assert!(!pool.run_until(exprs.set_expression(0usize)), "already current");
    assert!(!pool.run_until(exprs.set_expression("unknown")));
    assert!(!pool.run_until(exprs.set_expression(9usize)));
}

#[test]
fn later_request_supersedes_pending_one() {
    let loader = MockLoader::with_fixtures().unwrap();
    loader.gate(SMILE);
    let exprs = manager(&loader);
    let mut pool = LocalPool::new();
    let spawner = pool.spawner();

    let first = Rc::new(RefCell::new(None));
    let f = Rc::clone(&first);
    spawner
        .spawn_local(exprs.set_expression("smile").map(move |ok| *f.borrow_mut() = Some(ok)))
        .unwrap();
    let second = exprs.set_expression("angry");
    assert!(pool.run_until(second));

    loader.release(SMILE);
    pool.run_until_stalled();
    assert_eq!(*first.borrow(), Some(false));
    assert_eq!(exprs.current(), exprs.expression_index("angry"));
}

#[test]
fn concurrent_loads_of_one_expression_share_a_fetch() {
    let loader = MockLoader::with_fixtures().unwrap();
    loader.gate(ANGRY);
    let exprs = manager(&loader);
    let mut pool = LocalPool::new();

    let a = exprs.load_expression(1);
    let b = exprs.load_expression(1);
    assert_eq!(loader.calls(ANGRY), 1);
    loader.release(ANGRY);
    let (a, b) = pool.run_until(futures::future::join(a, b));
    assert!(Rc::ptr_eq(&a.unwrap(), &b.unwrap()));

    // Cached from here on.
    pool.run_until(exprs.load_expression(1)).unwrap();
    assert_eq!(loader.calls(ANGRY), 1);
}

#[test]
fn missing_file_resolves_false() {
    let loader = MockLoader::with_fixtures().unwrap();
    let exprs = manager(&loader);
    let mut pool = LocalPool::new();
    assert!(!pool.run_until(exprs.set_expression("sleepy")));
    assert_eq!(exprs.current(), None);
}

#[test]
fn reset_and_random() {
    let loader = MockLoader::with_fixtures().unwrap();
    let exprs = manager(&loader);
    let log = record(&exprs);
    let mut pool = LocalPool::new();

    assert!(pool.run_until(exprs.set_expression("angry")));
    exprs.reset_expression();
    assert_eq!(exprs.current(), None);
    assert_eq!(
        exprs.runtime().current().map(|clip| clip.curves.len()),
        Some(0),
        "reset plays the blank default expression"
    );
    let mut table = face();
    assert!(!exprs.update(&mut table, 0.0), "the blank expression writes nothing");

    // Candidates are "smile" (loads) and "sleepy" (missing file).
    assert!(pool.run_until(exprs.set_expression("angry")));
    let switched = pool.run_until(exprs.set_random_expression());
    assert_eq!(switched, exprs.current() == Some(0));
    assert_ne!(exprs.current(), Some(2));
    assert!(log.borrow().contains(&ExpressionEvent::Reset));
}

#[test]
fn destroy_discards_pending_loads() {
    let loader = MockLoader::with_fixtures().unwrap();
    loader.gate(SMILE);
    let exprs = manager(&loader);
    let log = record(&exprs);
    let mut pool = LocalPool::new();

    let pending = exprs.set_expression("smile");
    exprs.destroy();
    loader.release(SMILE);
    assert!(!pool.run_until(pending));
    assert_eq!(*log.borrow(), vec![ExpressionEvent::Destroy]);
    assert_eq!(exprs.current(), None);
}
