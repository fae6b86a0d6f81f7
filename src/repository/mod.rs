//! Keyed flyweight repositories.
//!
//! A [`KeyedRepository`] maps each key to exactly one canonical instance and
//! hands it out as an `Arc`. The retention policy decides whether the table
//! owns its instances ([`Strong`]) or only observes them ([`Weak`]).
//!
//! ## Locking
//!
//! - Fast path (`get`, `all_values`): sharded concurrent map, never waits on
//!   the slow-path mutex.
//! - Slow path (`purge`, `get_by_predicate`): one mutex per repository,
//!   serializing those calls against each other.

mod predicate;
mod retention;

pub use retention::{Retention, Strong, Weak};

use std::hash::Hash;
use std::marker::PhantomData;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use parking_lot::Mutex;

use crate::config::RepositoryConfig;
use crate::debug_log;
use crate::error::Result;
use crate::flyweight::{Detach, Flyweight, FlyweightFactory, Keyed};

/// Repository that keeps every instance for the life of the table.
pub type StrongKeyedRepository<K, T> = KeyedRepository<K, T, Strong>;

/// Repository whose instances are reclaimed once no caller holds them.
pub type WeakKeyedRepository<K, T> = KeyedRepository<K, T, Weak>;

/// Snapshot of table occupancy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RepositoryStats {
    /// Physical slots, dead ones included.
    pub slots: usize,
    pub live: usize,
    pub dead: usize,
}

/// Concurrent key → canonical instance table.
pub struct KeyedRepository<K, T, R: Retention<T>> {
    entries: DashMap<K, R::Handle>,
    /// Guards `purge` and `get_by_predicate`.
    slow_path: Mutex<()>,
    /// Insertions and revivals since the last purge.
    pending_inserts: AtomicUsize,
    auto_purge_threshold: usize,
    _policy: PhantomData<fn() -> (T, R)>,
}

impl<K, T, R> Default for KeyedRepository<K, T, R>
where
    K: Eq + Hash + Clone,
    R: Retention<T>,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, T, R> KeyedRepository<K, T, R>
where
    K: Eq + Hash + Clone,
    R: Retention<T>,
{
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
            slow_path: Mutex::new(()),
            pending_inserts: AtomicUsize::new(0),
            auto_purge_threshold: 0,
            _policy: PhantomData,
        }
    }

    /// Build a repository sized and tuned by `config`.
    pub fn with_config(config: &RepositoryConfig) -> Result<Self> {
        config.validate()?;
        let entries = if config.shard_amount == 0 {
            DashMap::with_capacity(config.initial_capacity)
        } else {
            DashMap::with_capacity_and_shard_amount(config.initial_capacity, config.shard_amount)
        };
        Ok(Self {
            entries,
            slow_path: Mutex::new(()),
            pending_inserts: AtomicUsize::new(0),
            auto_purge_threshold: config.auto_purge_threshold,
            _policy: PhantomData,
        })
    }

    /// Return the canonical instance for `key`, building it with `factory` if
    /// there is none (or the previous one has been reclaimed).
    ///
    /// Racing callers may each run `factory`; exactly one result is kept and
    /// every caller receives that one.
    pub fn get<F>(&self, key: K, factory: F) -> Arc<T>
    where
        F: FnOnce(&K) -> T,
    {
        if let Some(live) = self.lookup(&key) {
            return live;
        }

        let candidate = Arc::new(factory(&key));
        let (winner, discarded) = self.insert_or_revive(key, candidate);
        // Dropped outside the shard lock in case T's destructor touches the table.
        drop(discarded);
        self.maybe_auto_purge();
        winner
    }

    /// [`get`](Self::get) using the type's own constructor.
    pub fn get_or_create(&self, key: K) -> Arc<T>
    where
        T: FlyweightFactory<Key = K>,
    {
        self.get(key, T::create)
    }

    /// [`get_or_create`](Self::get_or_create) wrapped as a [`Flyweight`].
    pub fn flyweight(&self, key: K) -> Flyweight<T>
    where
        T: FlyweightFactory<Key = K>,
    {
        Flyweight::new(self.get_or_create(key))
    }

    /// The live instance for `key`, if any. Never constructs.
    #[inline]
    pub fn lookup(&self, key: &K) -> Option<Arc<T>> {
        self.entries.get(key).and_then(|handle| R::resolve(handle.value()))
    }

    pub fn contains_key(&self, key: &K) -> bool {
        self.entries
            .get(key)
            .is_some_and(|handle| R::is_alive(handle.value()))
    }

    /// Every live instance, in no particular order. Dead slots are skipped
    /// but left in place.
    pub fn all_values(&self) -> Vec<Arc<T>> {
        self.entries
            .iter()
            .filter_map(|entry| R::resolve(entry.value()))
            .collect()
    }

    /// Keys whose instance is still alive.
    pub fn keys(&self) -> Vec<K> {
        self.entries
            .iter()
            .filter(|entry| R::is_alive(entry.value()))
            .map(|entry| entry.key().clone())
            .collect()
    }

    /// Physical slot count, dead slots included.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn stats(&self) -> RepositoryStats {
        let mut stats = RepositoryStats::default();
        for entry in self.entries.iter() {
            stats.slots += 1;
            if R::is_alive(entry.value()) {
                stats.live += 1;
            } else {
                stats.dead += 1;
            }
        }
        stats
    }

    /// Remove the entry for `key` only if it still refers to `instance`.
    ///
    /// Callers keep their handles; the next `get` builds a fresh instance.
    pub fn detach(&self, key: &K, instance: &Arc<T>) -> bool {
        self.entries
            .remove_if(key, |_, handle| R::refers_to(handle, instance))
            .is_some()
    }

    /// Unconditionally remove the entry for `key`, returning its instance if
    /// it was still alive.
    pub fn purge_key(&self, key: &K) -> Option<Arc<T>> {
        self.entries
            .remove(key)
            .and_then(|(_, handle)| R::resolve(&handle))
    }

    /// Atomic insert-or-revive under the key's shard lock.
    ///
    /// Returns the canonical instance and, when another live instance won,
    /// the discarded candidate.
    fn insert_or_revive(&self, key: K, candidate: Arc<T>) -> (Arc<T>, Option<Arc<T>>) {
        match self.entries.entry(key) {
            Entry::Occupied(mut occupied) => {
                if let Some(live) = R::resolve(occupied.get()) {
                    return (live, Some(candidate));
                }
                occupied.insert(R::hold(&candidate));
                self.pending_inserts.fetch_add(1, Ordering::Relaxed);
                if debug_log::is_enabled() {
                    debug_log::log("REPOSITORY", "REVIVE", std::any::type_name::<T>());
                }
                (candidate, None)
            }
            Entry::Vacant(vacant) => {
                vacant.insert(R::hold(&candidate));
                self.pending_inserts.fetch_add(1, Ordering::Relaxed);
                (candidate, None)
            }
        }
    }

    /// Opportunistic sweep once enough slots have been written. Never blocks:
    /// if a slow-path call holds the mutex, the sweep is skipped.
    fn maybe_auto_purge(&self) {
        if !R::COLLECTIBLE || self.auto_purge_threshold == 0 {
            return;
        }
        if self.pending_inserts.load(Ordering::Relaxed) < self.auto_purge_threshold {
            return;
        }
        if let Some(_guard) = self.slow_path.try_lock() {
            self.sweep_dead();
        }
    }

    /// Remove every dead slot. Caller holds `slow_path`.
    fn sweep_dead(&self) -> usize {
        let mut removed = 0;
        // Liveness is re-checked under the shard write lock, so a slot revived
        // by a racing `get` is kept.
        self.entries.retain(|_, handle| {
            let alive = R::is_alive(handle);
            if !alive {
                removed += 1;
            }
            alive
        });
        self.pending_inserts.store(0, Ordering::Relaxed);
        if debug_log::is_enabled() {
            debug_log::log(
                "REPOSITORY",
                "PURGE",
                &format!("{} removed {removed} dead slot(s)", std::any::type_name::<T>()),
            );
        }
        removed
    }

    /// Acquire the slow-path mutex, logging contention when debug logging is on.
    fn lock_slow_path(&self, operation: &'static str) -> SlowPathGuard<'_> {
        debug_log::lock_acquiring("SLOW_PATH", operation);
        let guard = self.slow_path.lock();
        debug_log::lock_acquired("SLOW_PATH", operation);
        SlowPathGuard {
            _log: debug_log::LogOnDrop::new("SLOW_PATH", operation),
            _guard: guard,
        }
    }
}

impl<K, T> KeyedRepository<K, T, Weak>
where
    K: Eq + Hash + Clone,
    T: Send + Sync + 'static,
{
    /// Drop every entry whose instance has been reclaimed.
    ///
    /// Live entries are untouched. Safe to call alongside `get`: an entry
    /// revived concurrently is never removed. Returns the number of slots
    /// freed.
    pub fn purge(&self) -> usize {
        let _guard = self.lock_slow_path("purge");
        self.sweep_dead()
    }
}

impl<K, T, R> Detach<T> for KeyedRepository<K, T, R>
where
    K: Eq + Hash + Clone,
    T: Keyed<Key = K>,
    R: Retention<T>,
{
    fn detach_instance(&self, instance: &Arc<T>) -> bool {
        self.detach(instance.key(), instance)
    }
}

/// Held for the duration of a slow-path call. Field order matters: the mutex
/// is released before the release is logged.
struct SlowPathGuard<'a> {
    _guard: parking_lot::MutexGuard<'a, ()>,
    _log: debug_log::LogOnDrop,
}

#[cfg(test)]
mod tests;
