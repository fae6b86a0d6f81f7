//! String-keyed repositories.
//!
//! Keys pass through a [`StringInterner`] before they reach the table, so the
//! key stored in each entry (and handed to factories) is the interner's
//! canonical `&'static str`.

use std::sync::Arc;

use crate::config::RepositoryConfig;
use crate::error::{Error, Result};
use crate::flyweight::{Detach, Flyweight, FlyweightFactory, Keyed};
use crate::interner::StringInterner;
use crate::repository::{KeyedRepository, RepositoryStats, Retention, Strong, Weak};

/// Canonical string key handed out by a repository's interner.
pub type StrKey = &'static str;

pub struct StringRepository<T, R: Retention<T> = Strong> {
    interner: &'static StringInterner,
    table: KeyedRepository<StrKey, T, R>,
}

/// String-keyed repository that keeps instances alive.
pub type StrongStringRepository<T> = StringRepository<T, Strong>;

/// String-keyed repository whose instances can be reclaimed.
pub type WeakStringRepository<T> = StringRepository<T, Weak>;

impl<T, R: Retention<T>> Default for StringRepository<T, R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, R: Retention<T>> StringRepository<T, R> {
    /// Repository backed by the process-wide interner.
    pub fn new() -> Self {
        Self::with_interner(StringInterner::global())
    }

    pub fn with_interner(interner: &'static StringInterner) -> Self {
        Self {
            interner,
            table: KeyedRepository::new(),
        }
    }

    pub fn with_config(
        interner: &'static StringInterner,
        config: &RepositoryConfig,
    ) -> Result<Self> {
        Ok(Self {
            interner,
            table: KeyedRepository::with_config(config)?,
        })
    }

    pub fn interner(&self) -> &'static StringInterner {
        self.interner
    }

    /// The underlying keyed table.
    pub fn table(&self) -> &KeyedRepository<StrKey, T, R> {
        &self.table
    }

    /// Return the canonical instance for `key`, building it with `factory`
    /// from the interned key if needed.
    pub fn get<F>(&self, key: &str, factory: F) -> Result<Arc<T>>
    where
        F: FnOnce(StrKey) -> T,
    {
        let key = self.canonical(key)?;
        Ok(self.table.get(key, |&key| factory(key)))
    }

    pub fn get_or_create(&self, key: &str) -> Result<Arc<T>>
    where
        T: FlyweightFactory<Key = StrKey>,
    {
        self.get(key, |key| T::create(&key))
    }

    pub fn flyweight(&self, key: &str) -> Result<Flyweight<T>>
    where
        T: FlyweightFactory<Key = StrKey>,
    {
        self.get_or_create(key).map(Flyweight::new)
    }

    /// Live instance for `key`, without interning it.
    pub fn lookup(&self, key: &str) -> Option<Arc<T>> {
        if !self.interner.contains(key) {
            return None;
        }
        self.table.lookup(&self.interner.get(key))
    }

    /// See [`KeyedRepository::get_by_predicate`].
    ///
    /// The factory must key its instance with a string from this
    /// repository's [`interner`](Self::interner). An empty key fails with
    /// [`Error::EmptyKey`], any other key with [`Error::NonCanonicalKey`];
    /// either way nothing is registered.
    pub fn get_by_predicate<P, F>(&self, predicate: P, factory: F) -> Result<Arc<T>>
    where
        T: Keyed<Key = StrKey>,
        P: Fn(&str) -> bool,
        F: FnOnce() -> T,
    {
        self.table.try_get_by_predicate(
            |key| predicate(*key),
            factory,
            |&key| self.ensure_canonical(key),
        )
    }

    pub fn all_values(&self) -> Vec<Arc<T>> {
        self.table.all_values()
    }

    pub fn keys(&self) -> Vec<StrKey> {
        self.table.keys()
    }

    pub fn stats(&self) -> RepositoryStats {
        self.table.stats()
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    /// Remove `key`'s entry if it still refers to `instance`.
    pub fn detach(&self, key: &str, instance: &Arc<T>) -> bool {
        if !self.interner.contains(key) {
            return false;
        }
        self.table.detach(&self.interner.get(key), instance)
    }

    fn canonical(&self, key: &str) -> Result<StrKey> {
        if key.is_empty() {
            return Err(Error::EmptyKey);
        }
        Ok(self.interner.get(key))
    }

    fn ensure_canonical(&self, key: StrKey) -> Result<()> {
        if key.is_empty() {
            return Err(Error::EmptyKey);
        }
        // Checked before `get` so a rejected key is never interned.
        if !self.interner.contains(key) || !std::ptr::eq(key, self.interner.get(key)) {
            return Err(Error::NonCanonicalKey(key.to_owned()));
        }
        Ok(())
    }
}

impl<T: Send + Sync + 'static> StringRepository<T, Weak> {
    /// See [`KeyedRepository::purge`].
    pub fn purge(&self) -> usize {
        self.table.purge()
    }
}

impl<T, R> Detach<T> for StringRepository<T, R>
where
    T: Keyed<Key = StrKey>,
    R: Retention<T>,
{
    fn detach_instance(&self, instance: &Arc<T>) -> bool {
        self.table.detach_instance(instance)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Tag {
        name: StrKey,
    }

    impl Keyed for Tag {
        type Key = StrKey;

        fn key(&self) -> &StrKey {
            &self.name
        }
    }

    impl FlyweightFactory for Tag {
        fn create(key: &StrKey) -> Self {
            Tag { name: key }
        }
    }

    fn fresh_interner() -> &'static StringInterner {
        Box::leak(Box::new(StringInterner::new()))
    }

    #[test]
    fn same_key_same_instance() {
        let repo: StrongStringRepository<Tag> = StringRepository::with_interner(fresh_interner());
        let first = repo.get_or_create("release").unwrap();
        let second = repo.get_or_create(&String::from("release")).unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(first.name, "release");
    }

    #[test]
    fn factory_receives_canonical_key() {
        let interner = fresh_interner();
        let repo: StrongStringRepository<Tag> = StringRepository::with_interner(interner);
        let tag = repo.get("hotfix", |name| Tag { name }).unwrap();

        assert!(std::ptr::eq(tag.name, interner.get("hotfix")));
    }

    #[test]
    fn empty_key_is_rejected() {
        let repo: StrongStringRepository<Tag> = StringRepository::with_interner(fresh_interner());
        let err = repo.get_or_create("").unwrap_err();

        assert_eq!(err, Error::EmptyKey);
        assert!(repo.is_empty());
        assert!(repo.interner().is_empty());
    }

    #[test]
    fn lookup_does_not_intern() {
        let repo: StrongStringRepository<Tag> = StringRepository::with_interner(fresh_interner());
        assert!(repo.lookup("missing").is_none());
        assert!(!repo.interner().contains("missing"));

        let tag = repo.get_or_create("present").unwrap();
        assert!(Arc::ptr_eq(&tag, &repo.lookup("present").unwrap()));
    }

    #[test]
    fn predicate_matches_on_string_keys() {
        let repo: StrongStringRepository<Tag> = StringRepository::with_interner(fresh_interner());
        let beta = repo.get_or_create("feature/beta").unwrap();

        let found = repo
            .get_by_predicate(
                |key| key.starts_with("feature/"),
                || panic!("feature tag already registered"),
            )
            .unwrap();
        assert!(Arc::ptr_eq(&beta, &found));

        let built = repo
            .get_by_predicate(
                |key| key.starts_with("bugfix/"),
                || Tag::create(&repo.interner().get("bugfix/1")),
            )
            .unwrap();
        assert_eq!(built.name, "bugfix/1");
        assert_eq!(repo.len(), 2);
    }

    #[test]
    fn predicate_factory_empty_key_is_rejected() {
        let repo: StrongStringRepository<Tag> = StringRepository::with_interner(fresh_interner());
        let err = repo.get_by_predicate(|_| false, || Tag { name: "" }).unwrap_err();

        assert_eq!(err, Error::EmptyKey);
        assert!(repo.is_empty());
    }

    #[test]
    fn predicate_factory_key_must_come_from_interner() {
        let interner = fresh_interner();
        let repo: StrongStringRepository<Tag> = StringRepository::with_interner(interner);

        // Same text, but not the interner's allocation.
        let stray: StrKey = Box::leak(String::from("abc").into_boxed_str());
        let err = repo.get_by_predicate(|_| false, || Tag { name: stray }).unwrap_err();
        assert_eq!(err, Error::NonCanonicalKey("abc".to_string()));
        assert!(repo.is_empty());
        assert!(!interner.contains("abc"));

        // Still refused once the text is interned, since the pointer differs.
        let canonical = interner.get("abc");
        assert!(matches!(
            repo.get_by_predicate(|_| false, || Tag { name: stray }),
            Err(Error::NonCanonicalKey(_))
        ));

        let built = repo.get_by_predicate(|_| false, || Tag { name: canonical }).unwrap();
        let via_get = repo.get_or_create("abc").unwrap();
        assert!(Arc::ptr_eq(&built, &via_get));
        assert!(std::ptr::eq(via_get.name, canonical));
    }

    #[test]
    fn weak_string_repository_reclaims() {
        let repo: WeakStringRepository<Tag> = StringRepository::with_interner(fresh_interner());
        let original = repo.flyweight("transient").unwrap();
        // Keeps the allocation around so the address cannot be reused.
        let original_weak = Arc::downgrade(original.as_arc());
        drop(original);

        assert_eq!(repo.purge(), 1);
        assert!(repo.is_empty());

        let replacement = repo.flyweight("transient").unwrap();
        assert!(!std::ptr::eq(
            Arc::as_ptr(replacement.as_arc()),
            original_weak.as_ptr()
        ));
        // The interner still remembers the key; only the table slot is freed.
        assert!(repo.interner().contains("transient"));
    }

    #[test]
    fn flyweight_detach_through_string_repository() {
        let repo: StrongStringRepository<Tag> = StringRepository::with_interner(fresh_interner());
        let first = repo.flyweight("detached").unwrap();

        assert!(first.detach(&repo));
        assert!(!first.detach(&repo));

        let second = repo.flyweight("detached").unwrap();
        assert_ne!(first, second);
        assert_eq!(first.to_string(), second.to_string());
    }

    #[test]
    fn config_rejects_bad_shard_amount() {
        let config = RepositoryConfig {
            shard_amount: 3,
            ..Default::default()
        };
        let result = StrongStringRepository::<Tag>::with_config(fresh_interner(), &config);
        assert!(matches!(result, Err(Error::Config(_))));
    }
}
