//! Per-`(target, phase)` memoization of computed hashes.
//!
//! Entries are invalidated only by process restart — the engine is a single
//! build session, so there is no TTL or eviction policy here.

use std::collections::HashMap;
use std::sync::Mutex;

/// Which hash was computed for a target, used as the memoization key's
/// second component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    /// The target's input hash.
    Input,
    /// A named output's hash.
    Output(&'static str),
}

/// Memoizes `hash_input`/`hash_output` results for the lifetime of the
/// `Engine` that owns it.
#[derive(Debug, Default)]
pub struct HashCache {
    entries: Mutex<HashMap<(String, String, Option<String>), String>>,
}

impl HashCache {
    /// Create an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Fetch a memoized hash for `fqn`/`phase`, if present.
    #[must_use]
    pub fn get(&self, fqn: &str, phase: &str, output: Option<&str>) -> Option<String> {
        let entries = self.entries.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        entries
            .get(&(fqn.to_string(), phase.to_string(), output.map(str::to_string)))
            .cloned()
    }

    /// Record a computed hash for `fqn`/`phase`.
    pub fn put(&self, fqn: &str, phase: &str, output: Option<&str>, hash: String) {
        let mut entries = self.entries.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        entries.insert((fqn.to_string(), phase.to_string(), output.map(str::to_string)), hash);
    }

    /// Number of memoized entries. Exposed for tests and diagnostics.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(std::sync::PoisonError::into_inner).len()
    }

    /// Whether the cache currently holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
