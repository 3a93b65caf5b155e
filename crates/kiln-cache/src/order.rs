//! Latency-based ordering of external cache tiers, memoized to disk so
//! every build doesn't re-probe.
//!
//! Filesystem tiers always sort ahead of networked ones. Among networked
//! tiers, rank by the mean of 10 probe round trips. The ranking is cached
//! under a key derived from a schema version plus the sorted set of tier
//! names/URIs, so adding or removing a tier invalidates the cache but
//! reordering the config list (which shouldn't change anything) does not.

use crate::error::{Error, Result};
use crate::tier::CacheTier;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

const SCHEMA_VERSION: &str = "1";
const PROBE_COUNT: u32 = 10;

#[derive(Debug, Serialize, Deserialize)]
struct RankingCache {
    schema_version: String,
    /// Tier identities (`name\0uri`) in ranked order, fastest first.
    order: Vec<String>,
}

/// One tier's ranking identity: name plus URI, so two same-named tiers
/// pointing at different endpoints (or a renamed tier at the same
/// endpoint) are never treated as the same cache-key entry.
fn tier_identity(tier: &dyn CacheTier) -> String {
    format!("{}\u{0}{}", tier.name(), tier.uri())
}

fn ranking_key(tier_identities: &[String]) -> String {
    let mut sorted: Vec<&str> = tier_identities.iter().map(String::as_str).collect();
    sorted.sort_unstable();
    let mut hasher = Sha256::new();
    hasher.update(SCHEMA_VERSION.as_bytes());
    for identity in sorted {
        hasher.update(b"\0");
        hasher.update(identity.as_bytes());
    }
    hex::encode(hasher.finalize())
}

fn ranking_cache_path(cache_root: &Path, tier_identities: &[String]) -> PathBuf {
    cache_root
        .join("tier-ranking")
        .join(format!("{}.json", ranking_key(tier_identities)))
}

/// Probe every networked tier `PROBE_COUNT` times and average, then return
/// tier indices ordered local-first, then fastest-networked-first.
///
/// # Errors
/// Returns [`Error::Io`] if the ranking cache can't be written (probing
/// itself never fails the whole operation; a tier that errors on every
/// probe just ranks last).
pub async fn rank_tiers(cache_root: &Path, tiers: &[Arc<dyn CacheTier>]) -> Result<Vec<usize>> {
    let identities: Vec<String> = tiers.iter().map(|t| tier_identity(t.as_ref())).collect();
    let cache_path = ranking_cache_path(cache_root, &identities);

    if let Ok(bytes) = std::fs::read(&cache_path) {
        if let Ok(cached) = serde_json::from_slice::<RankingCache>(&bytes) {
            if cached.schema_version == SCHEMA_VERSION {
                if let Some(order) = resolve_cached_order(&cached.order, &identities) {
                    return Ok(order);
                }
            }
        }
    }

    let mut local_indices = Vec::new();
    let mut networked = Vec::new();

    for (idx, tier) in tiers.iter().enumerate() {
        if tier.is_local() {
            local_indices.push(idx);
        } else {
            let latency = average_latency(tier.as_ref()).await;
            networked.push((idx, latency));
        }
    }

    networked.sort_by(|a, b| a.1.cmp(&b.1));

    let mut order = local_indices;
    order.extend(networked.iter().map(|(idx, _)| *idx));

    let ranking = RankingCache {
        schema_version: SCHEMA_VERSION.to_string(),
        order: order.iter().map(|&i| identities[i].clone()).collect(),
    };
    if let Some(parent) = cache_path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| Error::io(e, parent, "create_dir_all"))?;
    }
    let bytes = serde_json::to_vec(&ranking).map_err(|e| Error::serialization(e.to_string()))?;
    std::fs::write(&cache_path, bytes).map_err(|e| Error::io(e, &cache_path, "write"))?;

    Ok(order)
}

async fn average_latency(tier: &dyn CacheTier) -> Duration {
    let mut total = Duration::ZERO;
    let mut successes = 0u32;
    for _ in 0..PROBE_COUNT {
        match tier.probe().await {
            Ok(d) => {
                total += d;
                successes += 1;
            }
            Err(_) => continue,
        }
    }
    if successes == 0 {
        Duration::MAX
    } else {
        total / successes
    }
}

/// Map a cached identity-order back onto current indices. Returns `None`
/// (cache miss) if the tier set doesn't match exactly.
fn resolve_cached_order(cached_order: &[String], current_identities: &[String]) -> Option<Vec<usize>> {
    if cached_order.len() != current_identities.len() {
        return None;
    }
    cached_order
        .iter()
        .map(|identity| current_identities.iter().position(|i| i == identity))
        .collect()
}
