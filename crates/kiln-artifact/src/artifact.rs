//! The four artifact kinds, as a tagged enum with a common `generate`
//! contract.
//!
//! Grounded on `cuenv-core`'s `sync::SyncProvider` trait shape ("one
//! capability, several implementations") generalized per this crate's own
//! design note to a tagged enum rather than trait objects: every kind
//! implements the same [`Artifact::generate`] contract but the match arms
//! live in one place instead of scattered across `impl` blocks.

use crate::context::GenContext;
use crate::error::{Error, Result};
use crate::git_facts;
use crate::tarball;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;

/// Result of generating one artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenOutcome {
    /// The artifact's bytes were written to `ctx.artifact_path`.
    Written,
    /// Nothing was written; the caller should omit this artifact rather
    /// than treat its absence as an error. Only the `Log` kind produces
    /// this, when no log file was captured.
    Skipped,
}

/// One staged output file: its path relative to the archive root, and its
/// absolute path on disk.
#[derive(Debug, Clone)]
pub struct StagedFile {
    /// Path the file should appear at inside the tarball.
    pub archive_path: String,
    /// Absolute path to the file's current location on disk.
    pub abs_path: std::path::PathBuf,
}

/// Manifest fields other than the ones [`git_facts`] and the timestamp
/// supply.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ManifestInputs {
    /// This target's input hash.
    pub input_hash: String,
    /// Per-dep output hashes, only for deps whose referenced output
    /// actually exists: `dep FQN -> (output name -> hash)`.
    pub deps_hashes: BTreeMap<String, BTreeMap<String, String>>,
    /// This target's own output hashes, by output name.
    pub out_hashes: BTreeMap<String, String>,
}

/// On-disk shape of `manifest.json`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ManifestData {
    /// Best-effort git commit SHA, `None` if unavailable.
    pub git_commit: Option<String>,
    /// Best-effort git ref, `None` if unavailable.
    pub git_ref: Option<String>,
    /// This target's input hash.
    pub input_hash: String,
    /// Per-dep output hashes.
    pub deps_hashes: BTreeMap<String, BTreeMap<String, String>>,
    /// This target's own output hashes.
    pub out_hashes: BTreeMap<String, String>,
    /// Unix timestamp (seconds) the manifest was generated.
    pub timestamp: i64,
}

/// One of the four artifact kinds a completed target can produce.
pub enum Artifact {
    /// A tarball of one output's staged files.
    OutTar {
        /// FQN of the owning target, used only for error messages.
        fqn: String,
        /// Name of the output this tarball is for.
        output: String,
        /// Files to include, with their declared archive-relative paths.
        files: Vec<StagedFile>,
    },
    /// The hash of one output, written as UTF-8 text.
    HashOutput {
        /// Already-computed output hash.
        hash: String,
    },
    /// The target's input hash, written as UTF-8 text.
    HashInput {
        /// Already-computed input hash.
        hash: String,
    },
    /// The target's execution log, tarred as `log.txt`. Produces
    /// [`GenOutcome::Skipped`] when no log file was captured.
    Log,
    /// Manifest metadata: git facts, input hash, dep/own output hashes,
    /// timestamp.
    Manifest {
        /// Already-computed hash fields.
        inputs: ManifestInputs,
        /// Unix timestamp to stamp the manifest with.
        timestamp: i64,
    },
}

impl Artifact {
    /// Generate this artifact's bytes at `ctx.artifact_path`.
    ///
    /// # Errors
    /// Returns [`Error::Io`] on any filesystem failure, [`Error::MissingOutput`]
    /// if an `OutTar` output file listed in `files` does not exist on disk,
    /// and [`Error::Serialization`] if a manifest fails to serialize.
    pub fn generate(&self, ctx: &GenContext) -> Result<GenOutcome> {
        match self {
            Artifact::OutTar { fqn, output, files } => {
                for f in files {
                    if !f.abs_path.exists() {
                        return Err(Error::MissingOutput {
                            fqn: fqn.clone(),
                            output: output.clone(),
                        });
                    }
                }
                let pairs: Vec<(String, std::path::PathBuf)> = files
                    .iter()
                    .map(|f| (f.archive_path.clone(), f.abs_path.clone()))
                    .collect();
                tarball::write_deterministic_tar(&ctx.artifact_path, &pairs)?;
                Ok(GenOutcome::Written)
            }
            Artifact::HashOutput { hash } | Artifact::HashInput { hash } => {
                fs::write(&ctx.artifact_path, hash.as_bytes())
                    .map_err(|e| Error::io(e, &ctx.artifact_path, "write"))?;
                Ok(GenOutcome::Written)
            }
            Artifact::Log => {
                let Some(log_path) = &ctx.log_file_path else {
                    return Ok(GenOutcome::Skipped);
                };
                if !log_path.exists() {
                    return Ok(GenOutcome::Skipped);
                }
                tarball::write_deterministic_tar(
                    &ctx.artifact_path,
                    &[("log.txt".to_string(), log_path.clone())],
                )?;
                Ok(GenOutcome::Written)
            }
            Artifact::Manifest { inputs, timestamp } => {
                let data = ManifestData {
                    git_commit: git_facts::git_commit(),
                    git_ref: git_facts::git_ref(),
                    input_hash: inputs.input_hash.clone(),
                    deps_hashes: inputs.deps_hashes.clone(),
                    out_hashes: inputs.out_hashes.clone(),
                    timestamp: *timestamp,
                };
                let bytes = serde_json::to_vec_pretty(&data)
                    .map_err(|e| Error::serialization(e.to_string()))?;
                fs::write(&ctx.artifact_path, bytes)
                    .map_err(|e| Error::io(e, &ctx.artifact_path, "write"))?;
                Ok(GenOutcome::Written)
            }
        }
    }
}
