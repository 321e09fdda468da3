//! Per-slot deduplication of in-flight loads.
//!
//! A [`TaskMap`] holds at most one pending future per key. Asking for a key
//! that is already loading hands back a clone of the same shared future, so
//! any number of concurrent callers cost one fetch. The entry is removed as
//! soon as the future resolves (success or failure), which means the next
//! request for that key fetches again. [`TaskMap::clear`] abandons every
//! pending entry without cancelling it; whoever still awaits a clone will
//! get its result, but the map forgets it.

use std::cell::RefCell;
use std::fmt;
use std::future::Future;
use std::hash::Hash;
use std::rc::Rc;

use futures::future::{FutureExt, LocalBoxFuture, Shared};
use hashbrown::HashMap;

/// A pending load that several callers may await.
pub type SharedTask<T> = Shared<LocalBoxFuture<'static, T>>;

struct Entry<T> {
    generation: u64,
    task: SharedTask<T>,
}

struct Slots<K, T> {
    next_generation: u64,
    entries: HashMap<K, Entry<T>>,
}

/// Cloning shares the map.
pub struct TaskMap<K, T> {
    slots: Rc<RefCell<Slots<K, T>>>,
}

impl<K, T> Default for TaskMap<K, T> {
    fn default() -> Self {
        Self {
            slots: Rc::new(RefCell::new(Slots {
                next_generation: 0,
                entries: HashMap::new(),
            })),
        }
    }
}

impl<K, T> Clone for TaskMap<K, T> {
    fn clone(&self) -> Self {
        Self {
            slots: Rc::clone(&self.slots),
        }
    }
}

impl<K, T> fmt::Debug for TaskMap<K, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskMap")
            .field("pending", &self.slots.borrow().entries.len())
            .finish()
    }
}

impl<K, T> TaskMap<K, T>
where
    K: Eq + Hash + Clone + 'static,
    T: Clone + 'static,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Join the in-flight load for `key`, or start one with `start`.
    ///
    /// `start` is only invoked when no load for `key` is pending.
    pub fn request<F, Fut>(&self, key: K, start: F) -> SharedTask<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T> + 'static,
    {
        if let Some(entry) = self.slots.borrow().entries.get(&key) {
            return entry.task.clone();
        }

        let generation = {
            let mut slots = self.slots.borrow_mut();
            let g = slots.next_generation;
            slots.next_generation = g.wrapping_add(1);
            g
        };

        let pending = start();
        let weak = Rc::downgrade(&self.slots);
        let slot_key = key.clone();
        let task = async move {
            let output = pending.await;
            if let Some(slots) = weak.upgrade() {
                let mut slots = slots.borrow_mut();
                // A clear() followed by a fresh request may have replaced us.
                if slots
                    .entries
                    .get(&slot_key)
                    .is_some_and(|e| e.generation == generation)
                {
                    slots.entries.remove(&slot_key);
                }
            }
            output
        }
        .boxed_local()
        .shared();

        self.slots
            .borrow_mut()
            .entries
            .insert(key, Entry {
                generation,
                task: task.clone(),
            });
        task
    }

    #[inline]
    pub fn is_pending(&self, key: &K) -> bool {
        self.slots.borrow().entries.contains_key(key)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.slots.borrow().entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Forget every pending load.
    pub fn clear(&self) {
        self.slots.borrow_mut().entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::channel::oneshot;
    use futures::executor::LocalPool;
    use futures::task::LocalSpawnExt;
    use std::cell::Cell;

    #[test]
    fn concurrent_requests_share_one_start() {
        let map: TaskMap<u32, Option<u32>> = TaskMap::new();
        let starts = Rc::new(Cell::new(0));
        let (tx, rx) = oneshot::channel::<u32>();
        let rx = Rc::new(RefCell::new(Some(rx)));

        let mut pool = LocalPool::new();
        let spawner = pool.spawner();
        let results = Rc::new(RefCell::new(Vec::new()));

        for _ in 0..3 {
            let starts = Rc::clone(&starts);
            let rx = Rc::clone(&rx);
            let task = map.request(7, move || {
                starts.set(starts.get() + 1);
                let rx = rx.borrow_mut().take().expect("started twice");
                async move { rx.await.ok() }
            });
            let results = Rc::clone(&results);
            spawner
                .spawn_local(async move {
                    let value = task.await;
                    results.borrow_mut().push(value)
                })
                .unwrap();
        }

        pool.run_until_stalled();
        assert_eq!(starts.get(), 1);
        assert!(map.is_pending(&7));

        tx.send(42).unwrap();
        pool.run_until_stalled();
        assert_eq!(*results.borrow(), vec![Some(42); 3]);
        assert!(map.is_empty(), "resolved entries are removed");
    }

    #[test]
    fn resolved_slot_is_fetched_again() {
        let map: TaskMap<&'static str, u32> = TaskMap::new();
        let starts = Rc::new(Cell::new(0));
        let mut pool = LocalPool::new();

        for expected in 1..=2 {
            let s = Rc::clone(&starts);
            let task = map.request("a", move || {
                s.set(s.get() + 1);
                futures::future::ready(s.get())
            });
            assert_eq!(pool.run_until(task), expected);
        }
        assert_eq!(starts.get(), 2);
    }

    #[test]
    fn clear_abandons_without_disturbing_new_requests() {
        let map: TaskMap<u8, u8> = TaskMap::new();
        let (tx_old, rx_old) = oneshot::channel::<u8>();
        let old = map.request(1, move || async move { rx_old.await.unwrap_or(0) });

        map.clear();
        assert!(!map.is_pending(&1));

        let (tx_new, rx_new) = oneshot::channel::<u8>();
        let new = map.request(1, move || async move { rx_new.await.unwrap_or(0) });

        let mut pool = LocalPool::new();
        tx_old.send(5).unwrap();
        assert_eq!(pool.run_until(old), 5);
        assert!(map.is_pending(&1), "stale completion must not evict the newer entry");

        tx_new.send(6).unwrap();
        assert_eq!(pool.run_until(new), 6);
        assert!(map.is_empty());
    }
}
