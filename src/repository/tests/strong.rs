//! Strong retention tests

use std::sync::Arc;

use super::{Country, CountingFactory, key};
use crate::flyweight::{Flyweight, FlyweightFactory};
use crate::repository::{RepositoryStats, StrongKeyedRepository};

#[test]
fn test_same_key_returns_same_instance() {
    let repo: StrongKeyedRepository<String, Country> = StrongKeyedRepository::new();
    let factory = CountingFactory::new();

    let first = repo.get(key("NO"), |k| factory.make(k));
    let second = repo.get(key("NO"), |k| factory.make(k));

    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(factory.calls(), 1);
}

#[test]
fn test_different_keys_return_distinct_instances() {
    let repo: StrongKeyedRepository<String, Country> = StrongKeyedRepository::new();

    let norway = repo.get_or_create(key("NO"));
    let sweden = repo.get_or_create(key("SE"));

    assert!(!Arc::ptr_eq(&norway, &sweden));
    assert_eq!(norway.code, "NO");
    assert_eq!(sweden.code, "SE");
}

#[test]
fn test_instances_survive_caller_drop() {
    let repo: StrongKeyedRepository<String, Country> = StrongKeyedRepository::new();
    let weak = Arc::downgrade(&repo.get_or_create(key("DK")));

    assert!(weak.upgrade().is_some());
    assert!(repo.contains_key(&key("DK")));
    let again = repo.get(key("DK"), |_| panic!("strong entries never die"));
    assert!(Arc::ptr_eq(&again, &weak.upgrade().unwrap()));
}

#[test]
fn test_all_values_lists_every_instance() {
    let repo: StrongKeyedRepository<String, Country> = StrongKeyedRepository::new();
    for code in ["FI", "IS", "EE"] {
        repo.get_or_create(key(code));
    }

    let mut codes: Vec<_> = repo.all_values().iter().map(|c| c.code.clone()).collect();
    codes.sort();
    assert_eq!(codes, vec!["EE", "FI", "IS"]);

    let mut keys = repo.keys();
    keys.sort();
    assert_eq!(keys, vec!["EE", "FI", "IS"]);
}

#[test]
fn test_detach_replaces_on_next_get() {
    let repo: StrongKeyedRepository<String, Country> = StrongKeyedRepository::new();
    let original = repo.flyweight(key("LV"));

    assert!(original.detach(&repo));
    assert!(repo.is_empty());

    let replacement = repo.flyweight(key("LV"));
    assert_ne!(original, replacement);
    assert_eq!(original.key(), replacement.key());
}

#[test]
fn test_detach_ignores_stale_instance() {
    let repo: StrongKeyedRepository<String, Country> = StrongKeyedRepository::new();
    let stale = Arc::new(Country::create(&key("LT")));
    let current = repo.get_or_create(key("LT"));

    assert!(!repo.detach(&key("LT"), &stale));
    assert!(Arc::ptr_eq(&current, &repo.lookup(&key("LT")).unwrap()));
}

#[test]
fn test_purge_key_returns_removed_instance() {
    let repo: StrongKeyedRepository<String, Country> = StrongKeyedRepository::new();
    let current = repo.get_or_create(key("PL"));

    let removed = repo.purge_key(&key("PL")).expect("entry was present");
    assert!(Arc::ptr_eq(&current, &removed));
    assert!(repo.purge_key(&key("PL")).is_none());
}

#[test]
fn test_stats_counts_live_slots() {
    let repo: StrongKeyedRepository<String, Country> = StrongKeyedRepository::new();
    assert_eq!(repo.stats(), RepositoryStats::default());

    repo.get_or_create(key("DE"));
    repo.get_or_create(key("AT"));

    assert_eq!(
        repo.stats(),
        RepositoryStats {
            slots: 2,
            live: 2,
            dead: 0,
        }
    );
}

#[test]
fn test_flyweights_compare_by_identity_and_order_by_key() {
    let repo: StrongKeyedRepository<String, Country> = StrongKeyedRepository::new();
    let b: Flyweight<Country> = repo.flyweight(key("BE"));
    let a = repo.flyweight(key("AD"));

    assert_eq!(b, repo.flyweight(key("BE")));
    assert!(a < b);
    assert_eq!(a.to_string(), "AD");
}
