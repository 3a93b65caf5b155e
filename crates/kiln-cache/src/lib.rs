//! Local and ordered external cache tiers for kiln.
//!
//! A build's cache entry lives first in the local tier
//! (`<cache root>/<pkg-path>/<name>/<input-hash>/`), which is authoritative
//! for the running session. Configured external tiers -- at most one of
//! them a "secondary", the rest "primary" -- are read through on a local
//! miss and written behind on a local hit, ranked by measured latency with
//! local tiers always ahead of networked ones.
//!
//! # Overview
//!
//! - [`root`] resolves the local cache root from the environment.
//! - [`manifest`] is the on-disk entry schema.
//! - [`local`] is the local filesystem tier.
//! - [`cas`] is an optional content-addressed blob store, used both
//!   standalone and as the storage layer under [`tier::FsCacheTier`].
//! - [`tier`] defines the [`tier::CacheTier`] trait and its filesystem and
//!   gRPC implementations.
//! - [`order`] ranks configured external tiers by latency, memoized to
//!   disk.
//! - [`gate`] serializes concurrent builds of the same `(target, input
//!   hash)` pair within one process.
//! - [`protocol`] is the read/write protocol gluing all of the above into
//!   one [`protocol::CacheClient`].

mod cas;
mod error;
mod gate;
mod local;
mod manifest;
mod order;
mod protocol;
mod retry;
mod root;
mod tier;

#[expect(clippy::all, reason = "generated protobuf code")]
pub mod proto {
    pub mod object_cache {
        tonic::include_proto!("kiln.cache.v1");
    }
}

pub use cas::{BlobId, CasStore};
pub use error::{Error, Result};
pub use gate::{BuildGate, Held};
pub use local::{LocalCache, StagedOutput};
pub use manifest::{
    HASH_INPUT_FILE, LOG_TAR_FILE, MANIFEST_FILE, Manifest, hash_output_file, output_tar_file,
};
pub use order::rank_tiers;
pub use protocol::CacheClient;
pub use root::{RootInputs, root, root_from_inputs};
pub use tier::{CacheTier, FsCacheTier, ObjectCacheTier, TierRole};
