//! The top-level entry point: link a target set, run its generation-pass
//! fixed point, then run everything else level by level.

use crate::error::Result;
use crate::gen_pass::run_gen_pass;
use crate::plan::{RunLedger, run_plan};
use crate::traits::{GenRunner, TargetRunner};
use kiln_cache::CacheClient;
use kiln_dag::Dag;
use kiln_spec::TargetSpec;
use kiln_worker::WorkerPool;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

/// Ties a cache client, worker pool, and pluggable runners together into
/// one entry point for running a target set end to end.
pub struct Scheduler {
    out_root: PathBuf,
    package_root: PathBuf,
    cache: Arc<CacheClient>,
    target_runner: Arc<dyn TargetRunner>,
    gen_runner: Arc<dyn GenRunner>,
    pool: WorkerPool,
}

impl Scheduler {
    /// Build a scheduler over the given cache, runners, and output root.
    /// `max_parallel` bounds concurrent target runs (`0` = unbounded).
    #[must_use]
    pub fn new(
        out_root: PathBuf,
        package_root: PathBuf,
        cache: Arc<CacheClient>,
        target_runner: Arc<dyn TargetRunner>,
        gen_runner: Arc<dyn GenRunner>,
        max_parallel: usize,
    ) -> Self {
        Self {
            out_root,
            package_root,
            cache,
            target_runner,
            gen_runner,
            pool: WorkerPool::new(max_parallel),
        }
    }

    /// The pool's cancellation token, for wiring to e.g. a signal handler.
    #[must_use]
    pub fn cancellation_token(&self) -> tokio_util::sync::CancellationToken {
        self.pool.cancellation_token()
    }

    /// Run every target reachable from `initial_specs`: first the
    /// generation-pass fixed point (if any are `gen` targets), then every
    /// remaining target in dependency order.
    ///
    /// # Errors
    /// Returns the first error encountered linking, generating, or running
    /// any target.
    pub async fn run_all(&self, initial_specs: Vec<TargetSpec>) -> Result<RunLedger> {
        let mut registry: HashMap<String, TargetSpec> =
            initial_specs.into_iter().map(|s| (s.fqn.clone(), s)).collect();
        let mut ledger = RunLedger::default();

        let dag = run_gen_pass(
            &mut registry,
            &self.out_root,
            &self.package_root,
            &self.cache,
            &self.target_runner,
            &self.gen_runner,
            &self.pool,
            &mut ledger,
        )
        .await?;

        run_plan(&dag, &self.out_root, &self.package_root, &self.cache, &self.target_runner, &self.pool, &mut ledger).await?;
        self.pool.done().await;

        if let Some(err) = self.pool.first_error() {
            return Err(crate::error::Error::Worker(err));
        }

        Ok(ledger)
    }

    /// Run just the transitive build order for one target, skipping
    /// anything the gen pass would otherwise discover unrelated to it.
    /// Prefer [`Self::run_all`] unless the caller has already linked a
    /// `Dag` that does not need a gen pass (e.g. `query`-only workflows).
    ///
    /// # Errors
    /// Returns the first error encountered running any target in the
    /// subgraph.
    pub async fn run_target(&self, dag: &Dag, fqn: &str) -> Result<RunLedger> {
        let mut ledger = RunLedger::default();
        let subgraph = dag.build_order(fqn)?;
        let fqns: Vec<String> = subgraph.into_iter().map(|t| t.fqn).collect();
        crate::plan::run_targets(
            dag,
            &fqns,
            &self.out_root,
            &self.package_root,
            &self.cache,
            &self.target_runner,
            &self.pool,
            &mut ledger,
        )
        .await?;
        self.pool.done().await;
        if let Some(err) = self.pool.first_error() {
            return Err(crate::error::Error::Worker(err));
        }
        Ok(ledger)
    }
}
