//! The flyweight value type handed out to callers.
//!
//! A [`Flyweight`] is a shared pointer to the canonical instance for a key.
//! Because the repository guarantees one live instance per key, equality is
//! pointer identity, while hashing and ordering follow the key so that
//! collections behave the same as they would for the key itself.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::ops::Deref;
use std::sync::Arc;

/// An instance that exposes the key it was registered under.
pub trait Keyed {
    type Key;

    fn key(&self) -> &Self::Key;
}

/// A type that can build its canonical instance from a key.
///
/// `create` must be a pure function of the key: under contention it may run
/// more than once, and only one result is kept.
pub trait FlyweightFactory: Keyed + Sized {
    fn create(key: &Self::Key) -> Self;
}

/// Repositories that can drop the entry for a specific instance.
pub trait Detach<T> {
    /// Remove `instance`'s entry if it is still the registered one.
    fn detach_instance(&self, instance: &Arc<T>) -> bool;
}

/// Shared handle to a canonical instance.
///
/// `Eq` compares pointers while `Ord` compares keys. The two agree as long as
/// each key has one instance, which stops being true once an entry is
/// detached or reclaimed and rebuilt: the old and new handles are unequal but
/// `cmp` returns `Equal`. Don't mix instances from before and after such a
/// replacement in a `BTreeSet` or `BTreeMap`, which would treat them as one.
pub struct Flyweight<T>(Arc<T>);

impl<T> Flyweight<T> {
    #[inline]
    pub fn new(instance: Arc<T>) -> Self {
        Self(instance)
    }

    #[inline]
    pub fn as_arc(&self) -> &Arc<T> {
        &self.0
    }

    #[inline]
    pub fn into_inner(self) -> Arc<T> {
        self.0
    }

    /// Whether both handles point at the same instance.
    #[inline]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    /// Remove this instance from `repository`.
    ///
    /// Existing handles stay valid; the next lookup for the same key builds a
    /// new instance. Returns `false` if the entry had already been replaced.
    pub fn detach<D: Detach<T> + ?Sized>(&self, repository: &D) -> bool {
        repository.detach_instance(&self.0)
    }
}

impl<T: Keyed> Flyweight<T> {
    #[inline]
    pub fn key(&self) -> &T::Key {
        self.0.key()
    }
}

impl<T> From<Arc<T>> for Flyweight<T> {
    fn from(instance: Arc<T>) -> Self {
        Self(instance)
    }
}

impl<T> Clone for Flyweight<T> {
    fn clone(&self) -> Self {
        Self(Arc::clone(&self.0))
    }
}

impl<T> Deref for Flyweight<T> {
    type Target = T;

    #[inline]
    fn deref(&self) -> &T {
        &self.0
    }
}

impl<T> AsRef<T> for Flyweight<T> {
    fn as_ref(&self) -> &T {
        &self.0
    }
}

impl<T> PartialEq for Flyweight<T> {
    #[inline]
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl<T> Eq for Flyweight<T> {}

impl<T> Hash for Flyweight<T>
where
    T: Keyed,
    T::Key: Hash,
{
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key().hash(state);
    }
}

impl<T> PartialOrd for Flyweight<T>
where
    T: Keyed,
    T::Key: Ord,
{
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T> Ord for Flyweight<T>
where
    T: Keyed,
    T::Key: Ord,
{
    /// Key order. See the type docs for how this relates to `eq`.
    fn cmp(&self, other: &Self) -> Ordering {
        if self.ptr_eq(other) {
            return Ordering::Equal;
        }
        self.key().cmp(other.key())
    }
}

impl<T> fmt::Display for Flyweight<T>
where
    T: Keyed,
    T::Key: fmt::Display,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self.key(), f)
    }
}

impl<T: fmt::Debug> fmt::Debug for Flyweight<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Flyweight").field(&self.0).finish()
    }
}
