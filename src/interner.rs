//! String canonicalization for flyweight keys.
//!
//! Equal strings interned through the same [`StringInterner`] resolve to the
//! same backing allocation, so downstream tables can hash and compare keys
//! that are already deduplicated.

use lasso::{Spur, ThreadedRodeo};
use std::sync::LazyLock;

/// Process-wide interner, created on first use and never torn down.
static GLOBAL_INTERNER: LazyLock<StringInterner> = LazyLock::new(StringInterner::new);

/// Interned key for a canonical string.
///
/// Cheap to copy and compare; resolve it back through the interner that
/// produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct Symbol(Spur);

/// Thread-safe string interner.
///
/// Insertion is idempotent (first writer wins) and there is no removal, so it
/// is meant for long-lived, low-cardinality keys. Callers own the key space.
pub struct StringInterner {
    rodeo: ThreadedRodeo<Spur>,
}

impl Default for StringInterner {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for StringInterner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StringInterner")
            .field("len", &self.len())
            .finish()
    }
}

impl StringInterner {
    pub fn new() -> Self {
        Self {
            rodeo: ThreadedRodeo::new(),
        }
    }

    /// The lazily initialized process-wide interner.
    pub fn global() -> &'static StringInterner {
        &GLOBAL_INTERNER
    }

    /// Return the canonical representative of `value`.
    ///
    /// Two calls with equal strings return pointer-identical slices.
    #[inline]
    pub fn get(&self, value: &str) -> &str {
        let spur = self.rodeo.get_or_intern(value);
        self.rodeo.resolve(&spur)
    }

    /// Intern `value`, returning a 4-byte key.
    #[inline]
    pub fn intern(&self, value: &str) -> Symbol {
        Symbol(self.rodeo.get_or_intern(value))
    }

    /// Resolve a symbol produced by this interner.
    ///
    /// # Panics
    /// Panics if `symbol` came from a different interner.
    #[inline]
    pub fn resolve(&self, symbol: Symbol) -> &str {
        self.rodeo.resolve(&symbol.0)
    }

    pub fn try_resolve(&self, symbol: Symbol) -> Option<&str> {
        self.rodeo.try_resolve(&symbol.0)
    }

    /// Whether `value` has been interned, without interning it.
    pub fn contains(&self, value: &str) -> bool {
        self.rodeo.contains(value)
    }

    /// Number of distinct strings interned so far.
    pub fn len(&self) -> usize {
        self.rodeo.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rodeo.is_empty()
    }
}
