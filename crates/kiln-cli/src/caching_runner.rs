//! Wraps a [`TargetRunner`] to write a completed run's outputs into the
//! cache, closing the loop `kiln-scheduler`'s `plan::run_one_target`
//! leaves open (it hashes outputs but has no hook to persist them — see
//! its doc comment). Staying a decorator here, rather than adding that
//! hook to `kiln-scheduler` itself, keeps the scheduler's already-tested
//! plan/gen-pass logic untouched.

use async_trait::async_trait;
use kiln_artifact::{Artifact, GenContext, StagedFile};
use kiln_cache::{CacheClient, Manifest};
use kiln_scheduler::{RunContext, RunOutcome, TargetRunner};
use kiln_spec::TargetSpec;
use std::sync::Arc;

/// Decorates `inner` with a write-through to `cache` on every successful,
/// cache-eligible run.
pub struct CachingRunner {
    inner: Arc<dyn TargetRunner>,
    cache: Arc<CacheClient>,
}

impl CachingRunner {
    /// Wrap `inner`, writing completed runs through to `cache`.
    #[must_use]
    pub fn new(inner: Arc<dyn TargetRunner>, cache: Arc<CacheClient>) -> Self {
        Self { inner, cache }
    }

    async fn write_cache_entry(&self, target: &TargetSpec, ctx: &RunContext, outcome: &RunOutcome) -> kiln_cache::Result<()> {
        let file_digests = kiln_hash::digest_input_files(&ctx.package_root, kiln_hash::effective_hash_deps(target))
            .map_err(|e| kiln_cache::Error::configuration(e.to_string()))?;
        let tool_resolutions = kiln_hash::resolve_tools(&target.tools, &ctx.dep_output_hashes);
        let input_hash = kiln_hash::hash_input(target, &ctx.dep_output_hashes, &file_digests, &tool_resolutions)
            .map_err(|e| kiln_cache::Error::configuration(e.to_string()))?;

        let staging = std::env::temp_dir().join(format!(
            "kiln-write-{}-{}",
            std::process::id(),
            crate::selector::sanitize_for_path(&target.fqn)
        ));
        std::fs::create_dir_all(&staging).map_err(|e| kiln_cache::Error::io(e, &staging, "create_dir_all"))?;

        let mut out_hashes = std::collections::BTreeMap::new();
        let mut tar_paths = std::collections::BTreeMap::new();
        for (name, files) in &outcome.staged_outputs {
            let hash = kiln_hash::hash_output(&target.fqn, name, files).map_err(|e| kiln_cache::Error::configuration(e.to_string()))?;
            let tar_path = staging.join(format!("{name}.tar"));
            let gen_ctx = GenContext {
                out_root: ctx.out_root.clone(),
                log_file_path: None,
                artifact_path: tar_path.clone(),
            };
            let staged_files: Vec<StagedFile> = files
                .iter()
                .map(|(archive_path, abs_path)| StagedFile {
                    archive_path: archive_path.clone(),
                    abs_path: abs_path.clone(),
                })
                .collect();
            Artifact::OutTar {
                fqn: target.fqn.clone(),
                output: name.clone(),
                files: staged_files,
            }
            .generate(&gen_ctx)
            .map_err(|e| kiln_cache::Error::configuration(e.to_string()))?;
            out_hashes.insert(name.clone(), hash);
            tar_paths.insert(name.clone(), tar_path);
        }

        let log_tar_path = if outcome.log_file_path.is_some() {
            let log_tar = staging.join("log.tar");
            let gen_ctx = GenContext {
                out_root: ctx.out_root.clone(),
                log_file_path: outcome.log_file_path.clone(),
                artifact_path: log_tar.clone(),
            };
            match Artifact::Log.generate(&gen_ctx).map_err(|e| kiln_cache::Error::configuration(e.to_string()))? {
                kiln_artifact::GenOutcome::Written => Some(log_tar),
                kiln_artifact::GenOutcome::Skipped => None,
            }
        } else {
            None
        };

        let staged_outputs: Vec<kiln_cache::StagedOutput<'_>> = out_hashes
            .iter()
            .map(|(name, hash)| kiln_cache::StagedOutput {
                name: name.as_str(),
                hash: hash.as_str(),
                tar_path: tar_paths[name].as_path(),
            })
            .collect();

        let manifest = Manifest {
            git_commit: kiln_artifact::git_commit(),
            git_ref: kiln_artifact::git_ref(),
            input_hash: input_hash.clone(),
            deps_hashes: ctx.dep_output_hashes.clone(),
            out_hashes,
            timestamp: now_unix(),
        };

        let result = self
            .cache
            .write_through(&target.fqn, &input_hash, &staged_outputs, log_tar_path.as_deref(), &manifest)
            .await;
        let _ = std::fs::remove_dir_all(&staging);
        result
    }
}

fn now_unix() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

#[async_trait]
impl TargetRunner for CachingRunner {
    async fn run(&self, target: &TargetSpec, ctx: &RunContext) -> kiln_scheduler::Result<RunOutcome> {
        let outcome = self.inner.run(target, ctx).await?;

        if target.is_group() || !target.cache.enabled {
            return Ok(outcome);
        }

        if let Err(e) = self.write_cache_entry(target, ctx, &outcome).await {
            tracing::warn!(fqn = %target.fqn, error = %e, "failed to write cache entry, run result is unaffected");
        }

        Ok(outcome)
    }

    fn name(&self) -> &'static str {
        self.inner.name()
    }
}
