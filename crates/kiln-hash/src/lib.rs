//! Deterministic input/output fingerprints for kiln targets.
//!
//! Canonicalization follows `cuenv-cache`'s `CacheKeyEnvelope`/
//! `compute_cache_key` pattern: a `BTreeMap`-backed envelope, serialized to
//! canonical JSON, SHA-256'd, hex-encoded. See [`envelope`] for the shared
//! mechanism and [`hash`] for the two public operations.

mod cache;
mod envelope;
mod error;
mod hash;
mod resolve;

pub use cache::{HashCache, Phase};
pub use envelope::{DigestEnvelope, ENVELOPE_VERSION, dep_output_key, digest_envelope};
pub use error::{Error, Result};
pub use hash::{hash_input, hash_output};
pub use resolve::{digest_input_files, effective_hash_deps, resolve_tools};
