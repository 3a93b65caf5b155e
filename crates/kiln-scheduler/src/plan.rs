//! Lowers a linked set of targets to a job chain and runs it level by
//! level: deps-scheduled, then cache-warm, then run.
//!
//! Grounded on `cuenv-core`'s `tasks::executor::execute_graph`: it
//! processes one dependency level fully (via a `JoinSet`) before starting
//! the next, rather than pipelining across levels, because a level's jobs
//! may depend on the previous level's outputs. [`Dag::parallel_groups`]
//! supplies the same per-level grouping; this module replaces the
//! teacher's direct `JoinSet` use with [`kiln_worker::WorkerPool`] so
//! cancellation and the first-error slot are shared with the rest of the
//! scheduler.

use crate::error::{Error, Result};
use crate::traits::{RunContext, RunOutcome, TargetRunner};
use kiln_cache::CacheClient;
use kiln_dag::Dag;
use kiln_hash::hash_output;
use kiln_spec::TargetSpec;
use kiln_worker::{Job, WorkerPool};
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

/// Per-target hash/output bookkeeping accumulated as a plan runs, so later
/// targets can build their input hash from already-computed dependency
/// output hashes and stage their dependencies' actual output files.
#[derive(Default)]
pub struct RunLedger {
    /// `fqn -> (output name -> hash)` for every target run or cache-warmed
    /// so far.
    pub output_hashes: BTreeMap<String, BTreeMap<String, String>>,
    /// `fqn -> (output name -> staged files)` for every target run or
    /// cache-warmed so far. A cache hit populates this by expanding its
    /// output tarballs into `<out_root>/.deps/<sanitized fqn>/<output>/`.
    pub output_files: BTreeMap<String, BTreeMap<String, Vec<(String, PathBuf)>>>,
}

/// A short, human-readable description of what a target's recipe does,
/// for the `command` field of `emit_target_started!`.
fn command_summary(target: &TargetSpec) -> String {
    match &target.recipe {
        kiln_spec::Recipe::Run(argv) => argv.join(" "),
        kiln_spec::Recipe::Group => "(group)".to_string(),
        kiln_spec::Recipe::Tool => "(tool resolution)".to_string(),
        kiln_spec::Recipe::TextFile(_) => "(text file)".to_string(),
    }
}

fn sanitize_fqn(fqn: &str) -> String {
    fqn.chars()
        .map(|c| if c.is_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect()
}

/// Runs every target in `dag`, in dependency order, skipping targets
/// already present in `ledger`. Group targets ([`TargetSpec::is_group`])
/// are transparent: they contribute no job, only their deps' presence in
/// the ledger.
///
/// # Errors
/// Returns the first error recorded by the underlying [`WorkerPool`], or a
/// cache/hash error encountered while warming or writing an entry.
#[allow(clippy::too_many_arguments)]
pub async fn run_plan(
    dag: &Dag,
    out_root: &std::path::Path,
    package_root: &std::path::Path,
    cache: &Arc<CacheClient>,
    runner: &Arc<dyn TargetRunner>,
    pool: &WorkerPool,
    ledger: &mut RunLedger,
) -> Result<()> {
    let fqns: Vec<String> = dag.iter().map(|t| t.fqn.clone()).collect();
    run_targets(dag, &fqns, out_root, package_root, cache, runner, pool, ledger).await
}

/// Runs exactly the named targets (plus nothing else), still honoring
/// `dag`'s dependency levels for ordering among them. Used by the gen-pass
/// alternation to run only newly discovered gen targets.
///
/// A target whose dependency failed (or was itself skipped for the same
/// reason) is never scheduled: it's recorded as skipped and the failure
/// propagates to its own dependents in turn. Every target *not* downstream
/// of a failure still runs to completion -- one bad leaf does not abort
/// unrelated siblings. Once every level has been processed, the first
/// failure recorded (by encounter order) is returned, if any.
///
/// # Errors
/// Returns the first target or job failure encountered, once every
/// unaffected target has finished running.
#[allow(clippy::too_many_arguments)]
pub async fn run_targets(
    dag: &Dag,
    only: &[String],
    out_root: &std::path::Path,
    package_root: &std::path::Path,
    cache: &Arc<CacheClient>,
    runner: &Arc<dyn TargetRunner>,
    pool: &WorkerPool,
    ledger: &mut RunLedger,
) -> Result<()> {
    let only: HashSet<&str> = only.iter().map(String::as_str).collect();
    let mut failed: BTreeMap<String, String> = BTreeMap::new();
    let mut first_failure: Option<Error> = None;

    for level in dag.parallel_groups()? {
        let mut receivers = Vec::new();
        for target in level {
            if !only.contains(target.fqn.as_str()) || ledger.output_hashes.contains_key(&target.fqn) {
                continue;
            }

            if let Some(bad_dep) = target.deps.targets.iter().find(|d| failed.contains_key(*d)) {
                let reason = format!("upstream dependency {bad_dep} failed");
                kiln_events::emit_target_skipped!(target.fqn, reason);
                failed.insert(target.fqn.clone(), reason);
                continue;
            }

            if target.is_group() {
                let (hashes, files) = merge_dep_outputs(&target, ledger);
                kiln_events::emit_target_skipped!(target.fqn, "group target, transparent alias for its deps");
                ledger.output_hashes.insert(target.fqn.clone(), hashes);
                ledger.output_files.insert(target.fqn.clone(), files);
                continue;
            }

            let dep_output_hashes = collect_dep_hashes(&target, ledger);
            let dep_output_files = collect_dep_files(&target, ledger);
            let out_root = out_root.to_path_buf();
            let package_root = package_root.to_path_buf();
            let cache = cache.clone();
            let runner = runner.clone();
            let fqn = target.fqn.clone();

            let rx = pool
                .schedule(Job::new(target.fqn.clone(), target.deps.targets.clone(), move |handle| {
                    run_one_target(target, dep_output_hashes, dep_output_files, out_root, package_root, cache, runner, handle)
                }))
                .await;
            receivers.push((fqn, rx));
        }
        for (fqn, rx) in receivers {
            match rx.await {
                Ok(Ok((fqn, out_hashes, out_files))) => {
                    ledger.output_hashes.insert(fqn.clone(), out_hashes);
                    ledger.output_files.insert(fqn, out_files);
                }
                Ok(Err(worker_err)) => {
                    failed.insert(fqn, worker_err.to_string());
                    first_failure.get_or_insert(Error::Worker(worker_err));
                }
                Err(_) => {
                    let message = "job result channel dropped".to_string();
                    first_failure.get_or_insert(Error::RunFailed { fqn: fqn.clone(), message: message.clone() });
                    failed.insert(fqn, message);
                }
            }
        }
    }

    match first_failure {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

/// Flattens the already-recorded ledger entries of `target.deps.targets`
/// into one `(output hashes, output files)` pair, the outputs a group
/// target re-exposes to whatever depends on it. Collisions between two
/// deps that declare the same output name are resolved by later-dep-wins,
/// per `target.deps.targets`'s declared order -- there's no precedent for
/// this merge in the grounding source, since `heph` never lets a target
/// depend on more than the group's own single wrapped target; this is an
/// invented, deterministic rule documented in `DESIGN.md`.
fn merge_dep_outputs(
    target: &TargetSpec,
    ledger: &RunLedger,
) -> (BTreeMap<String, String>, BTreeMap<String, Vec<(String, PathBuf)>>) {
    let mut hashes = BTreeMap::new();
    let mut files = BTreeMap::new();
    for dep_fqn in &target.deps.targets {
        if let Some(dep_hashes) = ledger.output_hashes.get(dep_fqn) {
            hashes.extend(dep_hashes.clone());
        }
        if let Some(dep_files) = ledger.output_files.get(dep_fqn) {
            files.extend(dep_files.clone());
        }
    }
    (hashes, files)
}

fn collect_dep_hashes(
    target: &TargetSpec,
    ledger: &RunLedger,
) -> BTreeMap<String, BTreeMap<String, String>> {
    target
        .deps
        .targets
        .iter()
        .filter_map(|dep_fqn| {
            ledger
                .output_hashes
                .get(dep_fqn)
                .map(|hashes| (dep_fqn.clone(), hashes.clone()))
        })
        .collect()
}

fn collect_dep_files(
    target: &TargetSpec,
    ledger: &RunLedger,
) -> BTreeMap<String, BTreeMap<String, Vec<(String, PathBuf)>>> {
    target
        .deps
        .targets
        .iter()
        .filter_map(|dep_fqn| {
            ledger
                .output_files
                .get(dep_fqn)
                .map(|files| (dep_fqn.clone(), files.clone()))
        })
        .collect()
}

/// Expand every output tarball a cached manifest names into
/// `<out_root>/.deps/<sanitized fqn>/<output>/`, for staging into
/// downstream sandboxes exactly as a fresh run's outputs would be.
fn expand_cached_outputs(
    cache: &CacheClient,
    fqn: &str,
    input_hash: &str,
    out_root: &Path,
    manifest: &kiln_cache::Manifest,
) -> std::result::Result<BTreeMap<String, Vec<(String, PathBuf)>>, kiln_worker::Error> {
    let entry_dir = cache.entry_dir(fqn, input_hash);
    let mut files = BTreeMap::new();
    for name in manifest.out_hashes.keys() {
        let tar_path = entry_dir.join(kiln_cache::output_tar_file(name));
        let dest = out_root.join(".deps").join(sanitize_fqn(fqn)).join(name);
        let entries = kiln_artifact::expand_tar(&tar_path, &dest).map_err(|e| kiln_worker::Error::JobFailed {
            job_id: fqn.to_string(),
            message: e.to_string(),
        })?;
        files.insert(name.clone(), entries);
    }
    Ok(files)
}

#[allow(clippy::too_many_arguments)]
async fn run_one_target(
    target: TargetSpec,
    dep_output_hashes: BTreeMap<String, BTreeMap<String, String>>,
    dep_output_files: BTreeMap<String, BTreeMap<String, Vec<(String, PathBuf)>>>,
    out_root: PathBuf,
    package_root: PathBuf,
    cache: Arc<CacheClient>,
    runner: Arc<dyn TargetRunner>,
    handle: kiln_worker::WorkerHandle,
) -> std::result::Result<(String, BTreeMap<String, String>, BTreeMap<String, Vec<(String, PathBuf)>>), kiln_worker::Error> {
    let fqn = target.fqn.clone();

    handle.status("hashing inputs");
    let file_digests = kiln_hash::digest_input_files(&package_root, kiln_hash::effective_hash_deps(&target))
        .map_err(|e| kiln_worker::Error::JobFailed {
            job_id: fqn.clone(),
            message: e.to_string(),
        })?;
    let tool_resolutions = kiln_hash::resolve_tools(&target.tools, &dep_output_hashes);
    let input_hash = kiln_hash::hash_input(&target, &dep_output_hashes, &file_digests, &tool_resolutions)
        .map_err(|e| kiln_worker::Error::JobFailed {
            job_id: fqn.clone(),
            message: e.to_string(),
        })?;

    // At most one build of this (fqn, input_hash) proceeds past this point
    // at a time. Re-check the cache once the gate is held: a concurrent
    // holder may have just finished and written the entry we're about to
    // rebuild.
    handle.status("acquiring build gate");
    let held = cache.lock_gate(&fqn, &input_hash).await;

    handle.status("checking cache");
    let was_local = cache.is_local_hit(&fqn, &input_hash);
    if let Ok(Some(manifest)) = cache.read(&fqn, &input_hash).await {
        debug!(fqn, input_hash, "cache hit");
        kiln_events::emit_target_cache_hit!(fqn, input_hash, if was_local { "local" } else { "remote" });
        let out_files = expand_cached_outputs(&cache, &fqn, &input_hash, &out_root, &manifest)?;
        cache.unlock_gate(held);
        return Ok((fqn, manifest.out_hashes, out_files));
    }
    kiln_events::emit_target_cache_miss!(fqn);

    let started_at = std::time::Instant::now();
    kiln_events::emit_target_started!(fqn, command_summary(&target), true);
    handle.status("running");
    let ctx = RunContext {
        out_root: out_root.clone(),
        package_root,
        dep_output_hashes: dep_output_hashes.clone(),
        dep_output_files,
        status: Some(handle.clone()),
    };
    let outcome = runner.run(&target, &ctx).await;
    let outcome: RunOutcome = match outcome {
        Ok(outcome) => outcome,
        Err(e) => {
            kiln_events::emit_target_completed!(fqn, false, None::<i32>, started_at.elapsed().as_millis() as u64);
            return Err(kiln_worker::Error::JobFailed {
                job_id: fqn.clone(),
                message: e.to_string(),
            });
        }
    };

    let mut out_hashes = BTreeMap::new();
    for (name, files) in &outcome.staged_outputs {
        let hash = hash_output(&fqn, name, files).map_err(|e| kiln_worker::Error::JobFailed {
            job_id: fqn.clone(),
            message: e.to_string(),
        })?;
        out_hashes.insert(name.clone(), hash);
    }

    kiln_events::emit_target_completed!(fqn, true, Some(0), started_at.elapsed().as_millis() as u64);
    handle.status("writing cache entry");
    debug!(fqn, input_hash, outputs = out_hashes.len(), "target run completed");
    // Staging the run's artifacts (tarballs, hash files, manifest) into the
    // local cache directory is `kiln-artifact`'s job; `kiln-cli` wires
    // `cache.write_through(...)` once those artifacts are on disk, passing
    // `input_hash` and `out_hashes` computed here (see `CachingRunner`,
    // invoked as part of `runner.run` above).
    cache.unlock_gate(held);

    Ok((fqn, out_hashes, outcome.staged_outputs))
}
