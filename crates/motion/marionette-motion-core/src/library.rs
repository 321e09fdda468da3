//! Motion definitions plus everything loaded from them.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use futures::future::{self, FutureExt, LocalBoxFuture};
use hashbrown::HashMap;
use indexmap::IndexMap;
use marionette_api_core::{LoadRequest, ModelSettings, ResourceLoader, TaskMap};
use tracing::{debug, warn};

use crate::runtime::{MotionCodec, MotionOf, SpecOf};

/// Cache state of one definition.
pub enum MotionEntry<M> {
    Unloaded,
    Ready(Rc<M>),
    /// The last load failed. Random selection skips it; an explicit request
    /// still retries.
    Unavailable,
}

impl<M> Clone for MotionEntry<M> {
    fn clone(&self) -> Self {
        match self {
            Self::Unloaded => Self::Unloaded,
            Self::Ready(m) => Self::Ready(Rc::clone(m)),
            Self::Unavailable => Self::Unavailable,
        }
    }
}

impl<M> fmt::Debug for MotionEntry<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unloaded => f.write_str("Unloaded"),
            Self::Ready(_) => f.write_str("Ready"),
            Self::Unavailable => f.write_str("Unavailable"),
        }
    }
}

type SlotKey = (String, usize);

struct LibraryInner<C: MotionCodec> {
    tag: String,
    codec: C,
    settings: Rc<dyn ModelSettings>,
    loader: Rc<dyn ResourceLoader>,
    definitions: IndexMap<String, Vec<SpecOf<C>>>,
    entries: RefCell<HashMap<SlotKey, MotionEntry<MotionOf<C>>>>,
    tasks: TaskMap<SlotKey, Option<Rc<MotionOf<C>>>>,
    released: Cell<bool>,
}

impl<C: MotionCodec> LibraryInner<C> {
    fn definition(&self, group: &str, index: usize) -> Option<&SpecOf<C>> {
        self.definitions.get(group)?.get(index)
    }

    fn record(&self, key: SlotKey, motion: Option<&Rc<MotionOf<C>>>) {
        if self.released.get() {
            return;
        }
        let entry = match motion {
            Some(m) => MotionEntry::Ready(Rc::clone(m)),
            None => MotionEntry::Unavailable,
        };
        self.entries.borrow_mut().insert(key, entry);
    }
}

/// Shared by every lane of a [`crate::MotionManager`]. Cloning is cheap.
pub struct MotionLibrary<C: MotionCodec> {
    inner: Rc<LibraryInner<C>>,
}

impl<C: MotionCodec> Clone for MotionLibrary<C> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<C: MotionCodec> fmt::Debug for MotionLibrary<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MotionLibrary")
            .field("tag", &self.inner.tag)
            .field("groups", &self.inner.definitions.keys().collect::<Vec<_>>())
            .field("pending", &self.inner.tasks.len())
            .field("released", &self.inner.released.get())
            .finish()
    }
}

impl<C: MotionCodec> MotionLibrary<C> {
    pub fn new(
        tag: impl Into<String>,
        codec: C,
        settings: Rc<dyn ModelSettings>,
        loader: Rc<dyn ResourceLoader>,
        definitions: IndexMap<String, Vec<SpecOf<C>>>,
    ) -> Self {
        Self {
            inner: Rc::new(LibraryInner {
                tag: tag.into(),
                codec,
                settings,
                loader,
                definitions,
                entries: RefCell::new(HashMap::new()),
                tasks: TaskMap::new(),
                released: Cell::new(false),
            }),
        }
    }

    #[inline]
    pub fn tag(&self) -> &str {
        &self.inner.tag
    }

    #[inline]
    pub fn codec(&self) -> &C {
        &self.inner.codec
    }

    #[inline]
    pub fn settings(&self) -> &Rc<dyn ModelSettings> {
        &self.inner.settings
    }

    pub fn definitions(&self) -> &IndexMap<String, Vec<SpecOf<C>>> {
        &self.inner.definitions
    }

    pub fn definition(&self, group: &str, index: usize) -> Option<&SpecOf<C>> {
        self.inner.definition(group, index)
    }

    pub fn group_len(&self, group: &str) -> usize {
        self.inner.definitions.get(group).map_or(0, Vec::len)
    }

    pub fn entry(&self, group: &str, index: usize) -> MotionEntry<MotionOf<C>> {
        self.inner
            .entries
            .borrow()
            .get(&(group.to_string(), index))
            .cloned()
            .unwrap_or(MotionEntry::Unloaded)
    }

    pub fn cached(&self, group: &str, index: usize) -> Option<Rc<MotionOf<C>>> {
        match self.entry(group, index) {
            MotionEntry::Ready(m) => Some(m),
            _ => None,
        }
    }

    #[inline]
    pub fn is_unavailable(&self, group: &str, index: usize) -> bool {
        matches!(self.entry(group, index), MotionEntry::Unavailable)
    }

    #[inline]
    pub fn is_loading(&self, group: &str, index: usize) -> bool {
        self.inner.tasks.is_pending(&(group.to_string(), index))
    }

    #[inline]
    pub fn pending_loads(&self) -> usize {
        self.inner.tasks.len()
    }

    #[inline]
    pub fn is_released(&self) -> bool {
        self.inner.released.get()
    }

    /// Resolve to the decoded motion for `(group, index)`, or `None` when it
    /// is undefined or could not be loaded.
    ///
    /// The fetch is issued before this returns. Callers asking for a slot
    /// that is already loading join that load.
    pub fn load_motion(
        &self,
        group: &str,
        index: usize,
    ) -> LocalBoxFuture<'static, Option<Rc<MotionOf<C>>>> {
        if let Some(motion) = self.cached(group, index) {
            return future::ready(Some(motion)).boxed_local();
        }
        let Some(spec) = self.definition(group, index) else {
            debug!(tag = %self.inner.tag, group, index, "motion is not defined");
            return future::ready(None).boxed_local();
        };
        if self.inner.released.get() {
            return future::ready(None).boxed_local();
        }

        let codec = &self.inner.codec;
        let url = self.inner.settings.resolve_url(codec.motion_file(spec));
        let key: SlotKey = (group.to_string(), index);
        let inner = Rc::clone(&self.inner);

        self.inner
            .tasks
            .request(key.clone(), move || {
                let request = LoadRequest::new(url.clone(), inner.codec.resource_type())
                    .with_target(inner.tag.clone());
                let fetch = inner.loader.load(request);
                async move {
                    let motion = match fetch.await {
                        Ok(payload) => inner
                            .definition(&key.0, key.1)
                            .map(|spec| inner.codec.create_motion(&payload, spec))
                            .and_then(|decoded| match decoded {
                                Ok(motion) => Some(Rc::new(motion)),
                                Err(err) => {
                                    warn!(tag = %inner.tag, %url, error = %err, "failed to decode motion");
                                    None
                                }
                            }),
                        Err(err) => {
                            warn!(tag = %inner.tag, %url, error = %err, "failed to load motion");
                            None
                        }
                    };
                    inner.record(key, motion.as_ref());
                    motion
                }
            })
            .boxed_local()
    }

    /// Drop every decoded motion and abandon pending loads. Loads that
    /// resolve afterwards still answer their callers but are not cached.
    pub fn release(&self) {
        self.inner.released.set(true);
        self.inner.tasks.clear();
        self.inner.entries.borrow_mut().clear();
    }
}
