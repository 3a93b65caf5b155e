//! Generation-pass fixed point: run `gen` targets, evaluate the build files
//! they produce, link the newly declared targets in, and recurse on
//! whichever of those are themselves `gen` targets.
//!
//! Grounded on `heph`'s `engine/gen_run.go`: `ScheduleGenPass` is a no-op
//! when there are no gen targets; otherwise `ScheduleGeneratedPipeline`
//! schedules the current round of gen targets, collects the target specs
//! their generated files declared, and recurses on the subset of those
//! that are themselves `gen`. `scheduleRunGeneratedFiles`'s
//! `registerTarget` closure is this module's `register` function: a
//! redeclaration of an existing `gen` target is always rejected, a
//! redeclaration of a plain target must be structurally equal
//! ([`TargetSpec`]'s `PartialEq` already excludes `source` provenance), and
//! a first-time declaration is accepted outright.

use crate::error::{Error, Result};
use crate::plan::{RunLedger, run_targets};
use crate::traits::{GenRunner, TargetRunner};
use kiln_cache::CacheClient;
use kiln_dag::Dag;
use kiln_spec::TargetSpec;
use kiln_worker::WorkerPool;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

/// Registers `spec` into `registry`, enforcing the redefinition rule.
///
/// # Errors
/// Returns [`kiln_spec::Error::ConflictingRedefinition`] if `spec.fqn` is
/// already registered as a `gen` target, or as a plain target that is not
/// structurally equal to `spec`.
fn register(registry: &mut HashMap<String, TargetSpec>, spec: TargetSpec) -> Result<bool> {
    match registry.get(&spec.fqn) {
        Some(existing) if existing.gen => Err(Error::Spec(kiln_spec::Error::ConflictingRedefinition {
            fqn: spec.fqn.clone(),
        })),
        Some(existing) if *existing != spec => Err(Error::Spec(kiln_spec::Error::ConflictingRedefinition {
            fqn: spec.fqn.clone(),
        })),
        Some(_) => Ok(false),
        None => {
            registry.insert(spec.fqn.clone(), spec);
            Ok(true)
        }
    }
}

/// Run the full generation-pass fixed point starting from `registry`
/// (every target known so far, keyed by FQN). Mutates `registry` in place
/// with every newly discovered target and returns the final linked `Dag`.
///
/// If `registry` contains no `gen` targets this is a no-op link, matching
/// `ScheduleGenPass`'s fast path.
///
/// # Errors
/// Returns [`Error::Dag`] if linking fails, or a propagated run/redefinition
/// error from a gen target's execution.
#[allow(clippy::too_many_arguments)]
pub async fn run_gen_pass(
    registry: &mut HashMap<String, TargetSpec>,
    out_root: &Path,
    package_root: &Path,
    cache: &Arc<CacheClient>,
    target_runner: &Arc<dyn TargetRunner>,
    gen_runner: &Arc<dyn GenRunner>,
    pool: &WorkerPool,
    ledger: &mut RunLedger,
) -> Result<Dag> {
    let mut dag = Dag::link(registry.values().cloned())?;

    let mut pending_gen: Vec<String> = registry
        .values()
        .filter(|t| t.gen)
        .map(|t| t.fqn.clone())
        .collect();

    let mut pass: u64 = 0;
    while !pending_gen.is_empty() {
        pass += 1;
        let pass_started = std::time::Instant::now();
        info!(count = pending_gen.len(), "running generation pass");
        kiln_events::emit_genpass_started!(pass);

        run_targets(&dag, &pending_gen, out_root, package_root, cache, target_runner, pool, ledger).await?;

        let mut new_fqns = Vec::new();
        for fqn in &pending_gen {
            let target = registry
                .get(fqn)
                .expect("gen target must still be registered")
                .clone();
            let ctx = crate::traits::RunContext {
                out_root: out_root.to_path_buf(),
                package_root: package_root.to_path_buf(),
                dep_output_hashes: ledger.output_hashes.clone(),
                dep_output_files: ledger.output_files.clone(),
                status: None,
            };
            let produced = gen_runner.run_gen(&target, &ctx).await?;
            for spec in produced {
                if register(registry, spec.clone())? {
                    new_fqns.push(spec.fqn);
                }
            }
        }

        dag = Dag::link(registry.values().cloned())?;
        kiln_events::emit_genpass_targets_discovered!(pass, new_fqns.len());
        pending_gen = new_fqns
            .into_iter()
            .filter(|fqn| registry.get(fqn).is_some_and(|t| t.gen))
            .collect();
        kiln_events::emit_genpass_completed!(pass, pass_started.elapsed().as_millis() as u64);
    }

    Ok(dag)
}
