//! Cache tiers: the local tier plus an ordered list of external tiers.
//!
//! Grounded on `cuenv-remote`'s `CasClient` (gRPC blob transport wrapped in
//! a typed client) and `remote/src/retry.rs`'s `retry_with_backoff`
//! (`backoff::ExponentialBackoff`). Tiers are tagged primary/secondary: at
//! most one secondary tier may be configured, matching the spec's
//! read-through/write-behind split between a team-shared primary and an
//! individual's private secondary.

use crate::error::{Error, Result};
use crate::proto::object_cache::object_cache_client::ObjectCacheClient;
use crate::proto::object_cache::{BatchReadBlobsRequest, BatchUpdateBlobsRequest, BlobUpdate};
use crate::retry::retry_with_backoff;
use tonic::transport::Channel;

/// Whether a configured external tier is the shared primary or an
/// individual's secondary. At most one secondary may be configured; the
/// caller enforces that when building a tier list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TierRole {
    /// The shared, team-wide tier.
    Primary,
    /// An individual's private tier, consulted after the primary.
    Secondary,
}

/// A blob-level external cache tier: read and write whole artifact blobs by
/// content hash, independent of the per-target manifest layout the local
/// tier uses.
#[async_trait::async_trait]
pub trait CacheTier: Send + Sync {
    /// Human-readable tier name, used in logs and `TierFailed` errors.
    fn name(&self) -> &str;

    /// The tier's connection endpoint (a filesystem path or a gRPC URI).
    /// Distinct from `name()`: two tiers can share a display name while
    /// pointing at different locations, and the disk-memoized ranking key
    /// must not collide them.
    fn uri(&self) -> &str;

    /// Whether this tier is the primary or a secondary.
    fn role(&self) -> TierRole;

    /// Whether this tier is local (filesystem) rather than networked.
    /// Local tiers always rank ahead of networked ones regardless of
    /// measured latency.
    fn is_local(&self) -> bool {
        false
    }

    /// Fetch a blob by its hex digest, if present.
    ///
    /// # Errors
    /// Returns [`Error::TierFailed`] on any transport error. Absence is
    /// `Ok(None)`, not an error.
    async fn get(&self, digest: &str) -> Result<Option<Vec<u8>>>;

    /// Upload a blob under its hex digest.
    ///
    /// # Errors
    /// Returns [`Error::TierFailed`] on any transport error.
    async fn put(&self, digest: &str, data: &[u8]) -> Result<()>;

    /// Measure one round trip's latency, for ranking. The default probes
    /// with a fixed, almost-certainly-absent digest: a HEAD-style check
    /// that exercises the transport without moving real payload bytes.
    async fn probe(&self) -> Result<std::time::Duration> {
        const PROBE_DIGEST: &str =
            "00000000000000000000000000000000000000000000000000000000000000aa";
        let start = std::time::Instant::now();
        self.get(PROBE_DIGEST).await?;
        Ok(start.elapsed())
    }
}

/// A filesystem-backed external tier: a shared directory (e.g. an NFS
/// mount), addressed the same way as the local CAS.
pub struct FsCacheTier {
    name: String,
    uri: String,
    role: TierRole,
    store: crate::cas::CasStore,
}

impl FsCacheTier {
    /// Open a filesystem tier rooted at `root`, under display name `name`.
    #[must_use]
    pub fn new(name: String, role: TierRole, root: std::path::PathBuf) -> Self {
        let uri = root.display().to_string();
        Self {
            name,
            uri,
            role,
            store: crate::cas::CasStore::new(root),
        }
    }
}

#[async_trait::async_trait]
impl CacheTier for FsCacheTier {
    fn name(&self) -> &str {
        &self.name
    }

    fn uri(&self) -> &str {
        &self.uri
    }

    fn role(&self) -> TierRole {
        self.role
    }

    fn is_local(&self) -> bool {
        true
    }

    async fn get(&self, digest: &str) -> Result<Option<Vec<u8>>> {
        let id = crate::cas::BlobId::from_hex(digest)?;
        if !self.store.exists(&id) {
            return Ok(None);
        }
        self.store
            .load(&id)
            .map(Some)
            .map_err(|e| Error::TierFailed {
                tier: self.name.clone(),
                message: e.to_string(),
            })
    }

    async fn put(&self, digest: &str, data: &[u8]) -> Result<()> {
        let stored = self.store.store(data).map_err(|e| Error::TierFailed {
            tier: self.name.clone(),
            message: e.to_string(),
        })?;
        if stored.as_hex() != digest {
            return Err(Error::TierFailed {
                tier: self.name.clone(),
                message: format!("computed digest {} does not match expected {digest}", stored.as_hex()),
            });
        }
        Ok(())
    }
}

/// A gRPC-backed external tier, speaking the crate's own minimal
/// content-addressable object service (see `proto/object_cache.proto`).
pub struct ObjectCacheTier {
    name: String,
    uri: String,
    role: TierRole,
    client: ObjectCacheClient<Channel>,
}

impl ObjectCacheTier {
    /// Connect to an object-cache endpoint at `uri`.
    ///
    /// # Errors
    /// Returns [`Error::TierFailed`] if the channel can't be established.
    pub async fn connect(name: String, role: TierRole, uri: String) -> Result<Self> {
        let channel = Channel::from_shared(uri.clone())
            .map_err(|e| Error::TierFailed {
                tier: name.clone(),
                message: format!("invalid endpoint uri: {e}"),
            })?
            .connect()
            .await
            .map_err(|e| Error::TierFailed {
                tier: name.clone(),
                message: format!("connect failed: {e}"),
            })?;
        Ok(Self {
            name,
            uri,
            role,
            client: ObjectCacheClient::new(channel),
        })
    }
}

#[async_trait::async_trait]
impl CacheTier for ObjectCacheTier {
    fn name(&self) -> &str {
        &self.name
    }

    fn uri(&self) -> &str {
        &self.uri
    }

    fn role(&self) -> TierRole {
        self.role
    }

    async fn get(&self, digest: &str) -> Result<Option<Vec<u8>>> {
        let client = self.client.clone();
        let result = retry_with_backoff("object_cache.batch_read_blobs", || {
            let mut client = client.clone();
            let digest = digest.to_string();
            async move {
                client
                    .batch_read_blobs(BatchReadBlobsRequest {
                        digests: vec![digest],
                    })
                    .await
            }
        })
        .await
        .map_err(|e| Error::TierFailed {
            tier: self.name.clone(),
            message: e.to_string(),
        })?;

        let results = result.into_inner().results;
        match results.into_iter().next() {
            Some(r) if r.found => Ok(Some(r.data)),
            _ => Ok(None),
        }
    }

    async fn put(&self, digest: &str, data: &[u8]) -> Result<()> {
        let client = self.client.clone();
        let response = retry_with_backoff("object_cache.batch_update_blobs", || {
            let mut client = client.clone();
            let digest = digest.to_string();
            let data = data.to_vec();
            async move {
                client
                    .batch_update_blobs(BatchUpdateBlobsRequest {
                        updates: vec![BlobUpdate { digest, data }],
                    })
                    .await
            }
        })
        .await
        .map_err(|e| Error::TierFailed {
            tier: self.name.clone(),
            message: e.to_string(),
        })?;

        match response.into_inner().results.into_iter().next() {
            Some(r) if r.ok => Ok(()),
            Some(r) => Err(Error::TierFailed {
                tier: self.name.clone(),
                message: r.error,
            }),
            None => Err(Error::TierFailed {
                tier: self.name.clone(),
                message: "empty response".to_string(),
            }),
        }
    }
}
