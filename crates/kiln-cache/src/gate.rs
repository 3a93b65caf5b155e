//! At-most-one-build gate: serializes concurrent attempts to build the same
//! `(target FQN, input hash)` pair within one process.
//!
//! `dashmap` has no precedent in the teacher's own workspace (see
//! `DESIGN.md`); it's used the way `vercel-turborepo` uses a
//! `DashMap<TaskId, Mutex<()>>` to gate concurrent task execution in its
//! scheduler, which is the closest precedent in the retrieval pack for a
//! sharded concurrent map keyed by task identity.

use crate::error::{Error, Result};
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

fn gate_key(fqn: &str, input_hash: &str) -> String {
    format!("{fqn}@{input_hash}")
}

/// A held gate. Dropping it without calling [`BuildGate::unlock`] leaves the
/// entry locked for the lifetime of the owning `BuildGate` (the spec
/// distinguishes "forgot to unlock" from "the gate was released"); callers
/// that want release-on-drop should call `unlock` explicitly in a `finally`
/// style block.
pub struct Held {
    key: String,
    _guard: OwnedMutexGuard<()>,
}

/// Process-local, per-`(target, input hash)` mutual exclusion so two
/// concurrent requests for the same cache entry don't both rebuild it.
#[derive(Debug, Default)]
pub struct BuildGate {
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl BuildGate {
    /// A fresh gate with no entries held.
    #[must_use]
    pub fn new() -> Self {
        Self {
            locks: DashMap::new(),
        }
    }

    fn entry_for(&self, key: &str) -> Arc<Mutex<()>> {
        self.locks
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Attempt to acquire the gate without waiting.
    ///
    /// # Errors
    /// Returns [`Error::LockContention`] if another build already holds it.
    pub fn try_lock(&self, fqn: &str, input_hash: &str) -> Result<Held> {
        let key = gate_key(fqn, input_hash);
        let mutex = self.entry_for(&key);
        let guard = mutex.try_lock_owned().map_err(|_| Error::LockContention {
            key: key.clone(),
        })?;
        Ok(Held { key, _guard: guard })
    }

    /// Acquire the gate, waiting for any in-progress build of the same
    /// `(fqn, input_hash)` to finish first.
    pub async fn lock(&self, fqn: &str, input_hash: &str) -> Held {
        let key = gate_key(fqn, input_hash);
        let mutex = self.entry_for(&key);
        let guard = mutex.lock_owned().await;
        Held { key, _guard: guard }
    }

    /// Release a held gate, dropping the map entry if no one else is
    /// waiting on it. This is mostly documentation: dropping `held` has the
    /// same effect, but callers that model "build finished" as an explicit
    /// step can call this instead.
    pub fn unlock(&self, held: Held) {
        let key = held.key.clone();
        drop(held);
        if let Some(entry) = self.locks.get(&key) {
            if Arc::strong_count(entry.value()) == 1 {
                drop(entry);
                self.locks.remove(&key);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc as StdArc;
    use std::time::Duration;

    #[test]
    fn try_lock_fails_while_another_holder_is_active() {
        let gate = BuildGate::new();
        let held = gate.try_lock("//pkg:build", "hash1").unwrap();
        let err = gate.try_lock("//pkg:build", "hash1").unwrap_err();
        assert!(matches!(err, Error::LockContention { .. }));
        drop(held);
        assert!(gate.try_lock("//pkg:build", "hash1").is_ok());
    }

    #[test]
    fn distinct_input_hashes_do_not_contend() {
        let gate = BuildGate::new();
        let _a = gate.try_lock("//pkg:build", "hash1").unwrap();
        assert!(gate.try_lock("//pkg:build", "hash2").is_ok());
    }

    #[tokio::test]
    async fn lock_waits_for_the_prior_holder_to_release() {
        let gate = StdArc::new(BuildGate::new());
        let held = gate.try_lock("//pkg:build", "hash1").unwrap();

        let waiter_gate = gate.clone();
        let waiter = tokio::spawn(async move {
            waiter_gate.lock("//pkg:build", "hash1").await;
        });

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        drop(held);
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap();
    }
}
