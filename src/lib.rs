//! Thread-safe flyweight repositories.
//!
//! A repository guarantees at most one live, shared instance per distinct
//! key, so value-equal keys always resolve to pointer-equal `Arc`s.
//!
//! - [`StringInterner`]: canonical `&str` representatives for string keys.
//! - [`StrongKeyedRepository`]: instances live as long as the repository.
//! - [`WeakKeyedRepository`]: instances are reclaimed once callers drop them;
//!   [`purge`](WeakKeyedRepository::purge) frees the dead slots.
//! - [`get_by_predicate`](KeyedRepository::get_by_predicate): find-or-build
//!   when the key is only known after construction.
//! - [`StringRepository`]: string-keyed flavor that interns keys first.
//!
//! Repositories are ordinary values. Share one per wrapper type however the
//! program prefers (a `LazyLock` static, an `Arc` handed to constructors);
//! tests can build fresh ones.
//!
//! ```
//! use std::sync::Arc;
//! use flyweight::WeakKeyedRepository;
//!
//! let repo: WeakKeyedRepository<u32, String> = WeakKeyedRepository::new();
//! let a = repo.get(1, |k| format!("item-{k}"));
//! let b = repo.get(1, |_| unreachable!());
//! assert!(Arc::ptr_eq(&a, &b));
//!
//! drop((a, b));
//! assert_eq!(repo.purge(), 1);
//! ```

pub mod config;
pub mod debug_log;
pub mod error;
pub mod flyweight;
pub mod interner;
pub mod repository;
pub mod string_repository;

pub use config::{Config, RepositoryConfig};
pub use error::{Error, Result};
pub use flyweight::{Detach, Flyweight, FlyweightFactory, Keyed};
pub use interner::{StringInterner, Symbol};
pub use repository::{
    KeyedRepository, RepositoryStats, Retention, Strong, StrongKeyedRepository, Weak,
    WeakKeyedRepository,
};
pub use string_repository::{
    StrKey, StringRepository, StrongStringRepository, WeakStringRepository,
};
