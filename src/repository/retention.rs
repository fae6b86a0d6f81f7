//! Ownership policies for repository entries.

use std::sync::Arc;

/// How a repository holds on to the instances it hands out.
pub trait Retention<T>: Send + Sync + 'static {
    /// What the table stores per key.
    type Handle: Send + Sync;

    /// Whether dead handles can accumulate and need purging.
    const COLLECTIBLE: bool;

    fn hold(instance: &Arc<T>) -> Self::Handle;

    /// Resolve a handle to its instance, or `None` once it has been reclaimed.
    fn resolve(handle: &Self::Handle) -> Option<Arc<T>>;

    fn is_alive(handle: &Self::Handle) -> bool;

    /// Whether `handle` refers to exactly `instance`.
    fn refers_to(handle: &Self::Handle, instance: &Arc<T>) -> bool;
}

/// Entries live until explicitly detached.
#[derive(Debug, Clone, Copy, Default)]
pub struct Strong;

/// Entries are held weakly; they die when the last external `Arc` is dropped
/// and linger as dead slots until purged or revived.
#[derive(Debug, Clone, Copy, Default)]
pub struct Weak;

impl<T: Send + Sync + 'static> Retention<T> for Strong {
    type Handle = Arc<T>;

    const COLLECTIBLE: bool = false;

    #[inline]
    fn hold(instance: &Arc<T>) -> Arc<T> {
        Arc::clone(instance)
    }

    #[inline]
    fn resolve(handle: &Arc<T>) -> Option<Arc<T>> {
        Some(Arc::clone(handle))
    }

    #[inline]
    fn is_alive(_handle: &Arc<T>) -> bool {
        true
    }

    #[inline]
    fn refers_to(handle: &Arc<T>, instance: &Arc<T>) -> bool {
        Arc::ptr_eq(handle, instance)
    }
}

impl<T: Send + Sync + 'static> Retention<T> for Weak {
    type Handle = std::sync::Weak<T>;

    const COLLECTIBLE: bool = true;

    #[inline]
    fn hold(instance: &Arc<T>) -> std::sync::Weak<T> {
        Arc::downgrade(instance)
    }

    #[inline]
    fn resolve(handle: &std::sync::Weak<T>) -> Option<Arc<T>> {
        handle.upgrade()
    }

    #[inline]
    fn is_alive(handle: &std::sync::Weak<T>) -> bool {
        handle.strong_count() > 0
    }

    #[inline]
    fn refers_to(handle: &std::sync::Weak<T>, instance: &Arc<T>) -> bool {
        std::ptr::eq(handle.as_ptr(), Arc::as_ptr(instance))
    }
}
