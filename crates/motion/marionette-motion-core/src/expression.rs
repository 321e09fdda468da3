//! Expression scheduling.
//!
//! Expressions have no priorities. The latest request wins: an earlier
//! [`ExpressionManager::set_expression`] still waiting on its load resolves
//! to `false` and changes nothing.

use std::cell::{Cell, Ref, RefCell};
use std::fmt;
use std::rc::Rc;

use futures::future::{self, FutureExt, LocalBoxFuture};
use hashbrown::HashMap;
use marionette_api_core::{Emitter, LoadRequest, ModelSettings, ResourceLoader, TaskMap};
use rand::Rng;
use tracing::{debug, warn};

use crate::runtime::{ExpressionCodec, MotionRuntime};
use crate::ExpressionEvent;

type ExprOf<C> = <<C as ExpressionCodec>::Runtime as MotionRuntime>::Motion;
type ExprModel<C> = <<C as ExpressionCodec>::Runtime as MotionRuntime>::Model;

/// Selects an expression by position or by name.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ExpressionRef<'a> {
    Index(usize),
    Name(&'a str),
}

impl From<usize> for ExpressionRef<'_> {
    fn from(index: usize) -> Self {
        Self::Index(index)
    }
}

impl<'a> From<&'a str> for ExpressionRef<'a> {
    fn from(name: &'a str) -> Self {
        Self::Name(name)
    }
}

struct Inner<C: ExpressionCodec> {
    tag: String,
    codec: C,
    settings: Rc<dyn ModelSettings>,
    loader: Rc<dyn ResourceLoader>,
    definitions: Vec<C::Spec>,
    loaded: RefCell<HashMap<usize, Rc<ExprOf<C>>>>,
    tasks: TaskMap<usize, Option<Rc<ExprOf<C>>>>,
    runtime: RefCell<C::Runtime>,
    blank: Rc<ExprOf<C>>,
    current: Cell<Option<usize>>,
    reserved: Cell<Option<usize>>,
    destroyed: Cell<bool>,
    events: Emitter<ExpressionEvent>,
}

pub struct ExpressionManager<C: ExpressionCodec> {
    inner: Rc<Inner<C>>,
}

impl<C: ExpressionCodec> Clone for ExpressionManager<C> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<C: ExpressionCodec> fmt::Debug for ExpressionManager<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExpressionManager")
            .field("tag", &self.inner.tag)
            .field("definitions", &self.inner.definitions.len())
            .field("current", &self.inner.current.get())
            .field("reserved", &self.inner.reserved.get())
            .field("destroyed", &self.inner.destroyed.get())
            .finish()
    }
}

impl<C: ExpressionCodec> ExpressionManager<C> {
    pub fn new(
        codec: C,
        settings: Rc<dyn ModelSettings>,
        loader: Rc<dyn ResourceLoader>,
        definitions: Vec<C::Spec>,
    ) -> Self {
        let tag = format!("ExpressionManager({})", settings.name());
        let runtime = codec.expression_runtime();
        let blank = Rc::new(codec.default_expression());
        Self {
            inner: Rc::new(Inner {
                tag,
                codec,
                settings,
                loader,
                definitions,
                loaded: RefCell::new(HashMap::new()),
                tasks: TaskMap::new(),
                runtime: RefCell::new(runtime),
                blank,
                current: Cell::new(None),
                reserved: Cell::new(None),
                destroyed: Cell::new(false),
                events: Emitter::new(),
            }),
        }
    }

    #[inline]
    pub fn tag(&self) -> &str {
        &self.inner.tag
    }

    #[inline]
    pub fn events(&self) -> &Emitter<ExpressionEvent> {
        &self.inner.events
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.inner.definitions.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.inner.definitions.is_empty()
    }

    #[inline]
    pub fn current(&self) -> Option<usize> {
        self.inner.current.get()
    }

    pub fn runtime(&self) -> Ref<'_, C::Runtime> {
        self.inner.runtime.borrow()
    }

    pub fn expression_index(&self, name: &str) -> Option<usize> {
        self.inner
            .definitions
            .iter()
            .position(|spec| self.inner.codec.expression_name(spec) == name)
    }

    fn resolve(&self, which: ExpressionRef<'_>) -> Option<usize> {
        match which {
            ExpressionRef::Index(i) if i < self.inner.definitions.len() => Some(i),
            ExpressionRef::Index(_) => None,
            ExpressionRef::Name(name) => self.expression_index(name),
        }
    }

    /// Load (or join the load of) expression `index`.
    pub fn load_expression(&self, index: usize) -> LocalBoxFuture<'static, Option<Rc<ExprOf<C>>>> {
        if let Some(expr) = self.inner.loaded.borrow().get(&index) {
            return future::ready(Some(Rc::clone(expr))).boxed_local();
        }
        let Some(spec) = self.inner.definitions.get(index) else {
            return future::ready(None).boxed_local();
        };
        if self.inner.destroyed.get() {
            return future::ready(None).boxed_local();
        }

        let url = self
            .inner
            .settings
            .resolve_url(self.inner.codec.expression_file(spec));
        let inner = Rc::clone(&self.inner);
        self.inner
            .tasks
            .request(index, move || {
                let request = LoadRequest::new(url.clone(), inner.codec.resource_type())
                    .with_target(inner.tag.clone());
                let fetch = inner.loader.load(request);
                async move {
                    let decoded = match fetch.await {
                        Ok(payload) => inner
                            .codec
                            .create_expression(&payload, &inner.definitions[index])
                            .map_err(|err| err.to_string()),
                        Err(err) => Err(err.to_string()),
                    };
                    match decoded {
                        Ok(expr) => {
                            let expr = Rc::new(expr);
                            if !inner.destroyed.get() {
                                inner.loaded.borrow_mut().insert(index, Rc::clone(&expr));
                            }
                            Some(expr)
                        }
                        Err(error) => {
                            warn!(tag = %inner.tag, %url, %error, "failed to load expression");
                            None
                        }
                    }
                }
            })
            .boxed_local()
    }

    /// Switch to an expression. Resolves to false when it does not exist,
    /// is already current, fails to load, or was overtaken by a later call.
    pub fn set_expression<'a>(
        &self,
        which: impl Into<ExpressionRef<'a>>,
    ) -> LocalBoxFuture<'static, bool> {
        let which = which.into();
        let Some(index) = self.resolve(which) else {
            debug!(tag = %self.inner.tag, ?which, "expression not found");
            return future::ready(false).boxed_local();
        };
        if self.inner.destroyed.get() || self.inner.current.get() == Some(index) {
            return future::ready(false).boxed_local();
        }

        self.inner.reserved.set(Some(index));
        let load = self.load_expression(index);
        let this = self.clone();
        async move {
            let expr = load.await;
            this.finish_set(expr, index)
        }
        .boxed_local()
    }

    fn finish_set(&self, expr: Option<Rc<ExprOf<C>>>, index: usize) -> bool {
        let inner = &self.inner;
        if inner.destroyed.get() || inner.reserved.get() != Some(index) {
            return false;
        }
        inner.reserved.set(None);
        let Some(expr) = expr else {
            return false;
        };

        inner.current.set(Some(index));
        inner.runtime.borrow_mut().start_concrete(expr);
        inner.events.emit(ExpressionEvent::Set { index });
        true
    }

    /// Switch to a random expression other than the current one.
    pub fn set_random_expression(&self) -> LocalBoxFuture<'static, bool> {
        let current = self.inner.current.get();
        let candidates: Vec<usize> = (0..self.len()).filter(|i| Some(*i) != current).collect();
        if candidates.is_empty() {
            return future::ready(false).boxed_local();
        }
        let index = candidates[rand::rng().random_range(0..candidates.len())];
        self.set_expression(index)
    }

    /// Switch to the codec's default expression and drop any pending set.
    pub fn reset_expression(&self) {
        let inner = &self.inner;
        if inner.destroyed.get() {
            return;
        }
        inner
            .runtime
            .borrow_mut()
            .start_concrete(Rc::clone(&inner.blank));
        inner.current.set(None);
        inner.reserved.set(None);
        inner.events.emit(ExpressionEvent::Reset);
    }

    /// Advance the current expression until the runtime reports it done.
    pub fn update(&self, model: &mut ExprModel<C>, now: f64) -> bool {
        let mut runtime = self.inner.runtime.borrow_mut();
        if runtime.is_concrete_finished() {
            return false;
        }
        runtime.advance_concrete(model, now)
    }

    pub fn destroy(&self) {
        let inner = &self.inner;
        if inner.destroyed.replace(true) {
            return;
        }
        inner.events.emit(ExpressionEvent::Destroy);
        inner.runtime.borrow_mut().stop_all_concrete();
        inner.current.set(None);
        inner.reserved.set(None);
        inner.tasks.clear();
        inner.loaded.borrow_mut().clear();
    }
}
