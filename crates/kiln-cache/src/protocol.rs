//! Read and write protocols tying the local tier, external tiers, and the
//! at-most-one-build gate together into one cache client.
//!
//! External tiers are blob-addressed (see [`crate::tier::CacheTier`]), but
//! cache entries are keyed by `(target FQN, input hash)`, not by a content
//! digest known in advance. The bridge is an *entry index*: a small JSON
//! blob, itself content-addressed by `sha256(fqn + "@" + input_hash)`, that
//! points at the manifest blob and each output blob by their own hashes --
//! the same indirection REAPI's `ActionResult` uses to let a fixed action
//! digest name a set of output digests it doesn't itself contain.

use crate::error::{Error, Result};
use crate::gate::{BuildGate, Held};
use crate::local::{LocalCache, StagedOutput};
use crate::manifest::Manifest;
use crate::tier::CacheTier;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{debug, warn};

/// Upper bound on concurrent blob uploads across all external tiers at once,
/// so replicating a large build doesn't open unbounded connections.
const MAX_CONCURRENT_UPLOADS: usize = 8;

#[derive(Debug, Serialize, Deserialize)]
struct EntryIndex {
    manifest_digest: String,
    /// output name -> content hash (the digest used to address the blob on
    /// external tiers; equal to the output's `kiln-hash` value).
    out_digests: BTreeMap<String, String>,
}

fn entry_index_digest(fqn: &str, input_hash: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(fqn.as_bytes());
    hasher.update(b"@");
    hasher.update(input_hash.as_bytes());
    hex::encode(hasher.finalize())
}

fn content_digest(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// Combines the authoritative local tier with an ordered list of external
/// tiers behind a read-through / write-behind protocol.
pub struct CacheClient {
    local: LocalCache,
    /// Ranked fastest-first; see [`crate::order::rank_tiers`].
    tiers: Vec<Arc<dyn CacheTier>>,
    /// Process-local at-most-one-build gate, keyed by `(fqn, input hash)`.
    gate: BuildGate,
    /// Bounds concurrent `tier.put` calls across every tier's replication,
    /// shared so a build with many targets and many tiers still caps total
    /// upload fan-out rather than multiplying per-tier limits together.
    upload_permits: Arc<Semaphore>,
}

impl CacheClient {
    /// Build a client from the local tier and an already-ranked tier list.
    #[must_use]
    pub fn new(local: LocalCache, ranked_tiers: Vec<Arc<dyn CacheTier>>) -> Self {
        Self {
            local,
            tiers: ranked_tiers,
            gate: BuildGate::new(),
            upload_permits: Arc::new(Semaphore::new(MAX_CONCURRENT_UPLOADS)),
        }
    }

    /// The on-disk directory for a `(fqn, input hash)` local cache entry,
    /// whether or not it's present yet.
    #[must_use]
    pub fn entry_dir(&self, fqn: &str, input_hash: &str) -> PathBuf {
        self.local.entry_dir(fqn, input_hash)
    }

    /// Whether `(fqn, input_hash)` is already present in the local tier,
    /// for callers that want to distinguish a local hit from one promoted
    /// down from an external tier (e.g. for event reporting).
    #[must_use]
    pub fn is_local_hit(&self, fqn: &str, input_hash: &str) -> bool {
        self.local.is_present(fqn, input_hash)
    }

    /// Acquire this process's at-most-one-build gate for `(fqn,
    /// input_hash)`, waiting out any in-progress build of the same entry.
    /// Callers re-check [`CacheClient::read`] after acquiring: the prior
    /// holder may have just finished and populated the entry.
    pub async fn lock_gate(&self, fqn: &str, input_hash: &str) -> Held {
        self.gate.lock(fqn, input_hash).await
    }

    /// Release a gate acquired via [`CacheClient::lock_gate`].
    pub fn unlock_gate(&self, held: Held) {
        self.gate.unlock(held);
    }

    /// Read protocol: local fast path, then manifest-then-tarballs-per-tier
    /// against each external tier in rank order, promoting to local on the
    /// first hit.
    ///
    /// Returns `Ok(None)` on a full cache miss -- not an error.
    ///
    /// # Errors
    /// Returns [`Error::Io`] if staging a fetched entry into the local
    /// cache fails.
    pub async fn read(&self, fqn: &str, input_hash: &str) -> Result<Option<Manifest>> {
        if self.local.is_present(fqn, input_hash) {
            return Ok(Some(self.local.read_manifest(fqn, input_hash)?));
        }

        let index_digest = entry_index_digest(fqn, input_hash);

        for tier in &self.tiers {
            match self.try_read_from_tier(tier.as_ref(), fqn, input_hash, &index_digest).await {
                Ok(Some(manifest)) => return Ok(Some(manifest)),
                Ok(None) => continue,
                Err(e) => {
                    warn!(tier = tier.name(), error = %e, "cache tier read failed, trying next tier");
                    continue;
                }
            }
        }

        debug!(fqn, input_hash, "cache miss across all tiers");
        Ok(None)
    }

    async fn try_read_from_tier(
        &self,
        tier: &dyn CacheTier,
        fqn: &str,
        input_hash: &str,
        index_digest: &str,
    ) -> Result<Option<Manifest>> {
        let Some(index_bytes) = tier.get(index_digest).await? else {
            return Ok(None);
        };
        let index: EntryIndex = serde_json::from_slice(&index_bytes)
            .map_err(|e| Error::serialization(format!("invalid entry index: {e}")))?;

        let Some(manifest_bytes) = tier.get(&index.manifest_digest).await? else {
            return Err(Error::CacheCorrupt {
                fqn: fqn.to_string(),
                input_hash: input_hash.to_string(),
                reason: format!("tier {} has an index but no manifest blob", tier.name()),
            });
        };
        let manifest = Manifest::from_json_bytes(&manifest_bytes)
            .map_err(|e| Error::serialization(format!("invalid manifest blob: {e}")))?;

        let staging = std::env::temp_dir().join(format!(
            "kiln-cache-fetch-{}-{}",
            input_hash,
            std::process::id()
        ));
        std::fs::create_dir_all(&staging).map_err(|e| Error::io(e, &staging, "create_dir_all"))?;

        for (name, hash) in &index.out_digests {
            let Some(data) = tier.get(hash).await? else {
                return Err(Error::CacheCorrupt {
                    fqn: fqn.to_string(),
                    input_hash: input_hash.to_string(),
                    reason: format!("tier {} is missing output blob {name}", tier.name()),
                });
            };
            let dest = staging.join(crate::manifest::output_tar_file(name));
            std::fs::write(&dest, &data).map_err(|e| Error::io(e, &dest, "write"))?;
            let hash_dest = staging.join(crate::manifest::hash_output_file(name));
            std::fs::write(&hash_dest, hash).map_err(|e| Error::io(e, &hash_dest, "write"))?;
        }
        let input_hash_dest = staging.join(crate::manifest::HASH_INPUT_FILE);
        std::fs::write(&input_hash_dest, input_hash)
            .map_err(|e| Error::io(e, &input_hash_dest, "write"))?;
        let manifest_dest = staging.join(crate::manifest::MANIFEST_FILE);
        std::fs::write(&manifest_dest, &manifest_bytes)
            .map_err(|e| Error::io(e, &manifest_dest, "write"))?;

        self.local.promote(&staging, fqn, input_hash)?;
        Ok(Some(manifest))
    }

    /// Write protocol: given a just-written local entry, push it to every
    /// external tier in parallel, outputs before the manifest before the
    /// index (so the index -- the only thing `read` looks up first -- only
    /// becomes visible once everything it names is already present).
    ///
    /// Tier failures are logged, never fatal: the entry is already safe in
    /// the local tier.
    pub async fn replicate(&self, fqn: &str, input_hash: &str, local_entry_dir: &Path) -> Result<()> {
        if self.tiers.is_empty() {
            return Ok(());
        }

        let manifest_bytes = std::fs::read(local_entry_dir.join(crate::manifest::MANIFEST_FILE))
            .map_err(|e| Error::io(e, local_entry_dir, "read"))?;
        let manifest = Manifest::from_json_bytes(&manifest_bytes)
            .map_err(|e| Error::serialization(e.to_string()))?;
        let manifest_digest = content_digest(&manifest_bytes);

        let mut out_digests = BTreeMap::new();
        for name in manifest.out_hashes.keys() {
            out_digests.insert(name.clone(), manifest.out_hashes[name].clone());
        }

        let pushes = self.tiers.iter().map(|tier| {
            let tier = tier.as_ref();
            async {
                if let Err(e) = self
                    .replicate_to_tier(tier, local_entry_dir, &manifest_bytes, &manifest_digest, &out_digests, fqn, input_hash)
                    .await
                {
                    warn!(tier = tier.name(), error = %e, "cache tier replication failed");
                }
            }
        });
        futures::future::join_all(pushes).await;

        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    async fn replicate_to_tier(
        &self,
        tier: &dyn CacheTier,
        local_entry_dir: &Path,
        manifest_bytes: &[u8],
        manifest_digest: &str,
        out_digests: &BTreeMap<String, String>,
        fqn: &str,
        input_hash: &str,
    ) -> Result<()> {
        for (name, hash) in out_digests {
            let tar_path = local_entry_dir.join(crate::manifest::output_tar_file(name));
            let data = std::fs::read(&tar_path).map_err(|e| Error::io(e, &tar_path, "read"))?;
            let _permit = self.upload_permits.acquire().await.expect("semaphore never closed");
            tier.put(hash, &data).await?;
        }

        {
            let _permit = self.upload_permits.acquire().await.expect("semaphore never closed");
            tier.put(manifest_digest, manifest_bytes).await?;
        }

        let index = EntryIndex {
            manifest_digest: manifest_digest.to_string(),
            out_digests: out_digests.clone(),
        };
        let index_bytes =
            serde_json::to_vec(&index).map_err(|e| Error::serialization(e.to_string()))?;
        let index_digest = entry_index_digest(fqn, input_hash);
        {
            let _permit = self.upload_permits.acquire().await.expect("semaphore never closed");
            tier.put(&index_digest, &index_bytes).await?;
        }

        Ok(())
    }

    /// Stage a completed local cache write then replicate it out.
    ///
    /// # Errors
    /// Propagates [`LocalCache::write_entry`]'s errors; replication
    /// failures are swallowed (logged) per the write protocol.
    pub async fn write_through(
        &self,
        fqn: &str,
        input_hash: &str,
        outputs: &[StagedOutput<'_>],
        log_tar_path: Option<&Path>,
        manifest: &Manifest,
    ) -> Result<()> {
        self.local
            .write_entry(fqn, input_hash, outputs, log_tar_path, manifest)?;
        let entry_dir = self.local.entry_dir(fqn, input_hash);
        self.replicate(fqn, input_hash, &entry_dir).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tier::{FsCacheTier, TierRole};
    use std::collections::BTreeMap as Map;
    use std::io::Write;

    fn manifest(out_name: &str, out_hash: &str) -> Manifest {
        Manifest {
            git_commit: None,
            git_ref: None,
            input_hash: "inputhash".into(),
            deps_hashes: Map::new(),
            out_hashes: Map::from([(out_name.to_string(), out_hash.to_string())]),
            timestamp: 0,
        }
    }

    #[tokio::test]
    async fn write_through_then_read_from_a_fresh_local_cache_round_trips_via_external_tier() {
        let local_root_a = tempfile::tempdir().unwrap();
        let tier_root = tempfile::tempdir().unwrap();
        let local_a = LocalCache::new(local_root_a.path().to_path_buf());

        let tar_src = tempfile::NamedTempFile::new().unwrap();
        tar_src.as_file().write_all(b"tarbytes").unwrap();
        let out_hash = content_digest(b"tarbytes");

        let tier: Arc<dyn CacheTier> = Arc::new(FsCacheTier::new(
            "shared".into(),
            TierRole::Primary,
            tier_root.path().to_path_buf(),
        ));
        let client_a = CacheClient::new(local_a, vec![tier.clone()]);

        let m = manifest("bin", &out_hash);
        client_a
            .write_through(
                "//pkg:build",
                "inputhash",
                &[StagedOutput {
                    name: "bin",
                    hash: &out_hash,
                    tar_path: tar_src.path(),
                }],
                None,
                &m,
            )
            .await
            .unwrap();

        // A second, empty local cache should recover the entry purely from
        // the shared external tier.
        let local_root_b = tempfile::tempdir().unwrap();
        let local_b = LocalCache::new(local_root_b.path().to_path_buf());
        let client_b = CacheClient::new(local_b, vec![tier]);

        assert!(!client_b.local.is_present("//pkg:build", "inputhash"));
        let fetched = client_b.read("//pkg:build", "inputhash").await.unwrap();
        assert_eq!(fetched, Some(m));
        assert!(client_b.local.is_present("//pkg:build", "inputhash"));
    }

    #[tokio::test]
    async fn read_returns_none_on_full_miss() {
        let local_root = tempfile::tempdir().unwrap();
        let client = CacheClient::new(LocalCache::new(local_root.path().to_path_buf()), vec![]);
        assert_eq!(client.read("//pkg:build", "missing").await.unwrap(), None);
    }

    struct SlowTier {
        name: String,
        concurrent: Arc<std::sync::atomic::AtomicUsize>,
        max_seen: Arc<std::sync::atomic::AtomicUsize>,
    }

    #[async_trait::async_trait]
    impl CacheTier for SlowTier {
        fn name(&self) -> &str {
            &self.name
        }
        fn uri(&self) -> &str {
            &self.name
        }
        fn role(&self) -> TierRole {
            TierRole::Primary
        }
        async fn get(&self, _digest: &str) -> Result<Option<Vec<u8>>> {
            Ok(None)
        }
        async fn put(&self, _digest: &str, _data: &[u8]) -> Result<()> {
            use std::sync::atomic::Ordering;
            let now = self.concurrent.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_seen.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
            self.concurrent.fetch_sub(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[tokio::test]
    async fn replicate_never_exceeds_the_shared_upload_concurrency_bound() {
        use std::sync::atomic::AtomicUsize;

        let local_root = tempfile::tempdir().unwrap();
        let concurrent = Arc::new(AtomicUsize::new(0));
        let max_seen = Arc::new(AtomicUsize::new(0));

        let tiers: Vec<Arc<dyn CacheTier>> = (0..(MAX_CONCURRENT_UPLOADS * 2))
            .map(|i| {
                Arc::new(SlowTier {
                    name: format!("tier-{i}"),
                    concurrent: concurrent.clone(),
                    max_seen: max_seen.clone(),
                }) as Arc<dyn CacheTier>
            })
            .collect();

        let client = CacheClient::new(LocalCache::new(local_root.path().to_path_buf()), tiers);

        let out_hash = content_digest(b"tarbytes");
        let tar_src = tempfile::NamedTempFile::new().unwrap();
        std::io::Write::write_all(tar_src.as_file(), b"tarbytes").unwrap();
        let m = manifest("bin", &out_hash);
        client
            .write_through(
                "//pkg:build",
                "inputhash",
                &[StagedOutput {
                    name: "bin",
                    hash: &out_hash,
                    tar_path: tar_src.path(),
                }],
                None,
                &m,
            )
            .await
            .unwrap();

        assert!(
            max_seen.load(std::sync::atomic::Ordering::SeqCst) <= MAX_CONCURRENT_UPLOADS,
            "observed {} concurrent uploads, bound is {}",
            max_seen.load(std::sync::atomic::Ordering::SeqCst),
            MAX_CONCURRENT_UPLOADS
        );
    }
}
