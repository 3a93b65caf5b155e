//! The cache entry manifest: stable JSON keys describing a completed
//! target's cached artifacts.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// `{ git_commit, git_ref, input_hash, deps_hashes, out_hashes, timestamp }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    /// Git commit SHA at build time, best-effort (`None` on failure).
    pub git_commit: Option<String>,
    /// Git ref (branch/tag) at build time, best-effort.
    pub git_ref: Option<String>,
    /// Input hash this entry was built from.
    pub input_hash: String,
    /// Per-dep output hashes, only for deps whose referenced output exists:
    /// `dep FQN -> (output name -> hash)`.
    pub deps_hashes: BTreeMap<String, BTreeMap<String, String>>,
    /// This target's own output hashes, by output name.
    pub out_hashes: BTreeMap<String, String>,
    /// Unix timestamp (seconds) the entry was written.
    pub timestamp: i64,
}

impl Manifest {
    /// Serialize to the canonical on-disk JSON form.
    ///
    /// # Errors
    /// Returns an error if serialization fails (infallible in practice for
    /// this type, but `serde_json` returns `Result`).
    pub fn to_json_bytes(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec_pretty(self)
    }

    /// Parse from the on-disk JSON form.
    ///
    /// # Errors
    /// Returns an error if `bytes` is not a valid manifest.
    pub fn from_json_bytes(bytes: &[u8]) -> serde_json::Result<Self> {
        serde_json::from_slice(bytes)
    }
}

/// The on-disk file name for a cache entry's manifest. Readers treat its
/// absence as "no entry" — the write protocol always writes this file last.
pub const MANIFEST_FILE: &str = "manifest.json";

/// The on-disk file name for a target's input hash.
pub const HASH_INPUT_FILE: &str = "hash_input";

/// The on-disk file name for a named output's hash.
#[must_use]
pub fn hash_output_file(output: &str) -> String {
    format!("hash_out_{output}")
}

/// The on-disk file name for a named output's tarball.
#[must_use]
pub fn output_tar_file(output: &str) -> String {
    format!("out_{output}.tar")
}

/// The on-disk file name for the execution log tarball.
pub const LOG_TAR_FILE: &str = "log.tar";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_json() {
        let mut deps_hashes = BTreeMap::new();
        deps_hashes
            .entry("//pkg:dep".to_string())
            .or_insert_with(BTreeMap::new)
            .insert("out".to_string(), "abc".to_string());

        let manifest = Manifest {
            git_commit: Some("deadbeef".into()),
            git_ref: Some("main".into()),
            input_hash: "input123".into(),
            deps_hashes,
            out_hashes: BTreeMap::from([("out".to_string(), "hash456".to_string())]),
            timestamp: 1_700_000_000,
        };

        let bytes = manifest.to_json_bytes().unwrap();
        let parsed = Manifest::from_json_bytes(&bytes).unwrap();
        assert_eq!(manifest, parsed);
    }
}
