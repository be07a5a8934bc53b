//! Limiter lists
//!
//! A limiter is a named filter deciding whether an address range may be
//! mutated. Units reference limiters by list name; the registry resolves
//! names to filter implementations.

use std::sync::Arc;

use indexmap::IndexMap;

/// Filter gating whether `[start, end)` in `domain` may be mutated
pub trait ListFilter: Send + Sync {
    /// Byte width the filter was built for
    fn precision(&self) -> usize;

    /// Whether the range is permitted
    fn matches(&self, start: u64, end: u64, domain: &str) -> bool;
}

/// Registry mapping limiter list names to filters
///
/// Insertion order is preserved so hosts can enumerate lists for display.
#[derive(Default)]
pub struct FilterRegistry {
    filters: IndexMap<String, Arc<dyn ListFilter>>,
}

impl FilterRegistry {
    /// Create an empty registry
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a filter under `name`, replacing any previous entry
    pub fn register(&mut self, name: impl Into<String>, filter: Arc<dyn ListFilter>) {
        self.filters.insert(name.into(), filter);
    }

    /// Look up a filter by list name
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Arc<dyn ListFilter>> {
        self.filters.get(name)
    }

    /// Registered list names, in insertion order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.filters.keys().map(String::as_str)
    }
}

impl std::fmt::Debug for FilterRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FilterRegistry")
            .field("lists", &self.filters.keys().collect::<Vec<_>>())
            .finish()
    }
}
