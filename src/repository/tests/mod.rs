//! Behavioural tests for keyed repositories.
//!
//! - strong: permanent retention, detach
//! - weak: reclamation, purge, revive, auto-purge
//! - concurrency: racing `get`, purge alongside `get`
//! - end_to_end: the A/B walkthrough across both policies

mod strong;

use std::sync::atomic::{AtomicUsize, Ordering};

use crate::flyweight::{FlyweightFactory, Keyed};

// ============================================================================
// Test Helpers
// ============================================================================

/// Keyed instance type used across the repository tests.
#[derive(Debug)]
pub struct Country {
    pub code: String,
}

impl Keyed for Country {
    type Key = String;

    fn key(&self) -> &String {
        &self.code
    }
}

impl FlyweightFactory for Country {
    fn create(key: &String) -> Self {
        Country { code: key.clone() }
    }
}

/// Factory that counts how often it runs.
pub struct CountingFactory {
    calls: AtomicUsize,
}

impl CountingFactory {
    pub fn new() -> Self {
        Self {
            calls: AtomicUsize::new(0),
        }
    }

    pub fn make(&self, key: &String) -> Country {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Country::create(key)
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

pub fn key(code: &str) -> String {
    code.to_string()
}
