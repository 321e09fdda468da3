//! Synchronous publish/subscribe channel.
//!
//! Every manager and model owns an [`Emitter`] for its own event type.
//! Listeners are keyed by the event's name and delivered in subscription
//! order on the emitting thread. There is no queue and no replay.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use hashbrown::HashMap;

/// A notification that can be routed by name.
pub trait Event {
    /// Stable name listeners subscribe to (e.g. `"motionStart"`).
    fn name(&self) -> &'static str;
}

/// Handle returned by [`Emitter::on`], used to unsubscribe.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct ListenerId(u64);

type Callback<E> = Rc<RefCell<dyn FnMut(&E)>>;

struct Listener<E> {
    id: ListenerId,
    once: bool,
    callback: Callback<E>,
}

impl<E> Clone for Listener<E> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            once: self.once,
            callback: Rc::clone(&self.callback),
        }
    }
}

struct Registry<E> {
    next_id: u64,
    listeners: HashMap<&'static str, Vec<Listener<E>>>,
}

/// Cloneable handle to a shared listener registry.
pub struct Emitter<E> {
    registry: Rc<RefCell<Registry<E>>>,
}

impl<E> Clone for Emitter<E> {
    fn clone(&self) -> Self {
        Self {
            registry: Rc::clone(&self.registry),
        }
    }
}

impl<E> Default for Emitter<E> {
    fn default() -> Self {
        Self {
            registry: Rc::new(RefCell::new(Registry {
                next_id: 0,
                listeners: HashMap::new(),
            })),
        }
    }
}

impl<E> fmt::Debug for Emitter<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let registry = self.registry.borrow();
        let mut names: Vec<_> = registry
            .listeners
            .iter()
            .map(|(name, list)| (*name, list.len()))
            .collect();
        names.sort_unstable();
        f.debug_struct("Emitter").field("listeners", &names).finish()
    }
}

impl<E: Event> Emitter<E> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe to every event named `name`.
    pub fn on(&self, name: &'static str, callback: impl FnMut(&E) + 'static) -> ListenerId {
        self.subscribe(name, false, Rc::new(RefCell::new(callback)))
    }

    /// Subscribe to the next event named `name` only.
    pub fn once(&self, name: &'static str, callback: impl FnMut(&E) + 'static) -> ListenerId {
        self.subscribe(name, true, Rc::new(RefCell::new(callback)))
    }

    fn subscribe(&self, name: &'static str, once: bool, callback: Callback<E>) -> ListenerId {
        let mut registry = self.registry.borrow_mut();
        let id = ListenerId(registry.next_id);
        registry.next_id = registry.next_id.wrapping_add(1);
        registry
            .listeners
            .entry(name)
            .or_default()
            .push(Listener { id, once, callback });
        id
    }

    /// Remove a listener. Returns false if it was already gone.
    pub fn off(&self, id: ListenerId) -> bool {
        let mut registry = self.registry.borrow_mut();
        for list in registry.listeners.values_mut() {
            if let Some(pos) = list.iter().position(|l| l.id == id) {
                list.remove(pos);
                return true;
            }
        }
        false
    }

    pub fn listener_count(&self, name: &str) -> usize {
        self.registry
            .borrow()
            .listeners
            .get(name)
            .map_or(0, Vec::len)
    }

    pub fn clear(&self) {
        self.registry.borrow_mut().listeners.clear();
    }

    /// Deliver `event` to its listeners and return how many were called.
    ///
    /// The listener list is snapshotted first, so callbacks may subscribe,
    /// unsubscribe or emit again. A callback that is already running further
    /// up the stack is skipped rather than re-entered.
    pub fn emit(&self, event: E) -> usize {
        let snapshot: Vec<Listener<E>> = {
            let mut registry = self.registry.borrow_mut();
            let Some(list) = registry.listeners.get_mut(event.name()) else {
                return 0;
            };
            let snapshot = list.clone();
            list.retain(|l| !l.once);
            snapshot
        };

        let mut delivered = 0;
        for listener in snapshot {
            if let Ok(mut callback) = listener.callback.try_borrow_mut() {
                callback(&event);
                delivered += 1;
            }
        }
        delivered
    }
}
