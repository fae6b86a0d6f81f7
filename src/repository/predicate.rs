//! Lookup by predicate for callers that cannot name the key up front.
//!
//! This is a linear scan under the repository's slow-path mutex, so it is
//! strictly more expensive than [`KeyedRepository::get`]. Reserve it for
//! instances whose key is only known once the factory has built them.

use std::convert::Infallible;
use std::hash::Hash;
use std::sync::Arc;

use super::{KeyedRepository, Retention};
use crate::error::Result;
use crate::flyweight::Keyed;

impl<K, T, R> KeyedRepository<K, T, R>
where
    K: Eq + Hash + Clone,
    T: Keyed<Key = K>,
    R: Retention<T>,
{
    /// Return the live instance whose key satisfies `predicate`, or build one
    /// with `factory` and register it under the key it reports.
    ///
    /// Calls are serialized with each other and with `purge`, so repeated
    /// calls with the same predicate register at most one instance. A key that
    /// matches but whose instance has been reclaimed counts as no match.
    ///
    /// `predicate` runs with no shard lock held and may read or write this
    /// repository through the fast path. `factory` may call
    /// [`get`](Self::get) too, but neither may re-enter `get_by_predicate` or
    /// `purge` on this repository.
    pub fn get_by_predicate<P, F>(&self, predicate: P, factory: F) -> Arc<T>
    where
        P: Fn(&K) -> bool,
        F: FnOnce() -> T,
    {
        let Ok(instance) =
            self.try_get_by_predicate(predicate, factory, |_| Ok::<(), Infallible>(()));
        instance
    }

    /// [`get_by_predicate`](Self::get_by_predicate) with a `check` that can
    /// refuse the key the factory produced. A refused instance is dropped and
    /// nothing is registered.
    pub fn try_get_by_predicate<P, F, C, E>(
        &self,
        predicate: P,
        factory: F,
        check: C,
    ) -> Result<Arc<T>, E>
    where
        P: Fn(&K) -> bool,
        F: FnOnce() -> T,
        C: FnOnce(&K) -> Result<(), E>,
    {
        let _guard = self.lock_slow_path("get_by_predicate");

        if let Some(existing) = self.scan(&predicate) {
            return Ok(existing);
        }

        let candidate = Arc::new(factory());
        check(candidate.key())?;
        let key = candidate.key().clone();
        // A fast-path `get` may have registered this key meanwhile; it stays canonical.
        let (winner, discarded) = self.insert_or_revive(key, candidate);
        drop(discarded);
        Ok(winner)
    }

    /// The first live instance whose key satisfies `predicate`. Never
    /// constructs and does not take the slow-path mutex.
    pub fn find<P>(&self, predicate: P) -> Option<Arc<T>>
    where
        P: Fn(&K) -> bool,
    {
        self.scan(&predicate)
    }

    fn scan<P>(&self, predicate: &P) -> Option<Arc<T>>
    where
        P: Fn(&K) -> bool,
    {
        // Snapshot the keys so no shard guard is held while `predicate` runs.
        let keys: Vec<K> = self.entries.iter().map(|entry| entry.key().clone()).collect();
        keys.iter()
            .filter(|key| predicate(*key))
            .find_map(|key| self.lookup(key))
    }
}
