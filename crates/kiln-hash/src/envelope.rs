//! The canonical, `BTreeMap`-backed envelope folded into SHA-256 to produce
//! a stable digest.
//!
//! Mirrors `cuenv-cache`'s `CacheKeyEnvelope`/`compute_cache_key`: build a
//! `BTreeMap`-backed, serde-serializable envelope so key ordering is
//! deterministic independent of insertion order, serialize to
//! `serde_json::Value` then to bytes, and `Sha256` the bytes, `hex::encode`
//! the digest. The fields differ (kiln folds in spec canonical form and
//! sorted dep-output hashes rather than cuenv's task-cache-specific fields)
//! but the mechanism is unchanged.

use crate::error::{Error, Result};
use kiln_spec::{CachePolicy, Deps, Executor, Recipe, TargetSpec, ToolRef};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

/// The kiln digest-envelope schema version, bumped whenever a field is added
/// or its meaning changes, so that stale hashes never collide with new ones.
pub const ENVELOPE_VERSION: &str = "1";

/// Canonical, provenance-stripped form of a `TargetSpec` — everything that
/// should affect a target's input hash, nothing that shouldn't (`source` is
/// excluded, matching `TargetSpec`'s hand-written `PartialEq`).
#[derive(Debug, Serialize)]
struct CanonicalSpec<'a> {
    fqn: &'a str,
    recipe: &'a Recipe,
    executor: Executor,
    deps: &'a Deps,
    hash_deps: &'a Option<Vec<String>>,
    tools: &'a [ToolRef],
    outputs: &'a BTreeMap<String, Vec<String>>,
    cache: &'a CachePolicy,
    labels: Vec<&'a str>,
    env: &'a BTreeMap<String, String>,
    pass_env: Vec<&'a str>,
    gen: bool,
}

impl<'a> From<&'a TargetSpec> for CanonicalSpec<'a> {
    fn from(spec: &'a TargetSpec) -> Self {
        let mut pass_env: Vec<&str> = spec.pass_env.iter().map(String::as_str).collect();
        pass_env.sort_unstable();
        Self {
            fqn: &spec.fqn,
            recipe: &spec.recipe,
            executor: spec.executor,
            deps: &spec.deps,
            hash_deps: &spec.hash_deps,
            tools: &spec.tools,
            outputs: &spec.outputs,
            cache: &spec.cache,
            labels: spec.labels.iter().map(String::as_str).collect(),
            env: &spec.env,
            pass_env,
            gen: spec.gen,
        }
    }
}

/// The envelope folded into a target's input hash.
#[derive(Debug, Serialize)]
pub struct DigestEnvelope<'a> {
    version: &'static str,
    spec: CanonicalSpec<'a>,
    /// `(dep FQN, output name) -> output hash`, already ordered by the
    /// caller per the spec's lexicographic-then-`@support_files`-first rule.
    dep_output_hashes: &'a BTreeMap<String, String>,
    /// File path -> content digest (or mod-time token, per `hash_file` policy).
    file_digests: &'a BTreeMap<String, String>,
    /// Resolved tool path or version per tool reference.
    tool_resolutions: &'a BTreeMap<String, String>,
}

impl<'a> DigestEnvelope<'a> {
    /// Construct an envelope for `spec`'s input hash.
    #[must_use]
    pub fn new(
        spec: &'a TargetSpec,
        dep_output_hashes: &'a BTreeMap<String, String>,
        file_digests: &'a BTreeMap<String, String>,
        tool_resolutions: &'a BTreeMap<String, String>,
    ) -> Self {
        Self {
            version: ENVELOPE_VERSION,
            spec: CanonicalSpec::from(spec),
            dep_output_hashes,
            file_digests,
            tool_resolutions,
        }
    }
}

/// Sort dependency-output keys as `(dep FQN, output name)` pairs, with
/// `@support_files` sorting first among output names for a given dep.
#[must_use]
pub fn dep_output_key(dep_fqn: &str, output: &str) -> String {
    format!("{dep_fqn}\u{1}{output}")
}

/// Fold an envelope into a stable hex digest: canonical JSON, then SHA-256.
///
/// # Errors
/// Returns [`Error::Configuration`] if the envelope cannot be serialized.
pub fn digest_envelope<T: Serialize>(envelope: &T) -> Result<String> {
    let json = serde_json::to_value(envelope)
        .map_err(|e| Error::Configuration {
            message: format!("failed to encode digest envelope: {e}"),
        })?;
    let bytes = serde_json::to_vec(&json).map_err(|e| Error::Configuration {
        message: format!("failed to serialize digest envelope: {e}"),
    })?;
    let digest = Sha256::digest(&bytes);
    Ok(hex::encode(digest))
}
