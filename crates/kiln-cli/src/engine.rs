//! Wires a [`kiln_cache::CacheClient`] and the runner pair every command
//! needs, and runs the generation-pass fixed point shared by every `query`
//! subcommand and `run`.

use crate::caching_runner::CachingRunner;
use crate::config::{CacheOrderMode, Config, TierKind};
use crate::error::Result;
use crate::gen::FileGenRunner;
use kiln_cache::{CacheClient, CacheTier, FsCacheTier, LocalCache, ObjectCacheTier};
use kiln_dag::Dag;
use kiln_sandbox::{HostRunner, SandboxConfig};
use kiln_scheduler::{GenRunner, RunLedger, TargetRunner};
use kiln_spec::TargetSpec;
use kiln_worker::WorkerPool;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::warn;

/// Resolve the repo root: `KILN_ROOT`, then `ROOT`, then the current
/// directory.
#[must_use]
pub fn workspace_root() -> PathBuf {
    std::env::var("KILN_ROOT")
        .or_else(|_| std::env::var("ROOT"))
        .map(PathBuf::from)
        .unwrap_or_else(|_| std::env::current_dir().unwrap_or_default())
}

/// Where sandboxed runs stage their outputs and logs, under the workspace
/// root.
#[must_use]
pub fn out_root(root: &Path) -> PathBuf {
    root.join(".kiln-out")
}

/// The cache client, target runner, and gen runner every command shares.
pub struct Engine {
    /// Workspace root declared file paths (`deps.files`/`hash_deps`) resolve
    /// relative to.
    pub root: PathBuf,
    /// Root sandboxed runs stage their outputs under.
    pub out_root: PathBuf,
    /// The local + external cache tiers.
    pub cache: Arc<CacheClient>,
    /// Runs an ordinary target's recipe, writing completed runs through to
    /// the cache.
    pub target_runner: Arc<dyn TargetRunner>,
    /// Runs a `gen` target and evaluates the build files it produces.
    pub gen_runner: Arc<dyn GenRunner>,
    /// Resolved `kiln.toml` / `KILN_*` configuration this engine was built
    /// from.
    pub config: Config,
}

impl Engine {
    /// Build the shared engine state for one invocation: load `kiln.toml`,
    /// connect configured external cache tiers, rank them, and wire the
    /// host sandbox runner through the cache write-through decorator.
    ///
    /// # Errors
    /// Returns [`crate::error::CliError`] if the cache root can't be
    /// resolved, `kiln.toml` is invalid, or an `object` tier can't connect.
    pub async fn new(root: &Path) -> Result<Self> {
        let config = Config::load(root)?;
        let cache_root = kiln_cache::root()?;
        let tiers = build_tiers(&config).await?;
        let ranked = rank_tiers(&config, tiers).await?;
        let cache = Arc::new(CacheClient::new(LocalCache::new(cache_root), ranked));
        let out_root = out_root(root);

        let host_runner: Arc<dyn TargetRunner> = Arc::new(HostRunner::new(SandboxConfig {
            package_root: root.to_path_buf(),
            staging_mode: config.sandbox_mode,
            timeout: None,
        }));
        let target_runner: Arc<dyn TargetRunner> = Arc::new(CachingRunner::new(host_runner.clone(), cache.clone()));
        let gen_runner: Arc<dyn GenRunner> = Arc::new(FileGenRunner::new(host_runner));

        Ok(Self {
            root: root.to_path_buf(),
            out_root,
            cache,
            target_runner,
            gen_runner,
            config,
        })
    }

    /// Run the generation-pass fixed point over `specs`, returning the
    /// final linked [`Dag`]. Used by every `query` subcommand and by
    /// `run` before its own run phase.
    ///
    /// # Errors
    /// Returns the first error linking, generating, or running any gen
    /// target.
    pub async fn link(&self, specs: Vec<TargetSpec>, workers: usize) -> Result<Dag> {
        let mut registry: HashMap<String, TargetSpec> = specs.into_iter().map(|s| (s.fqn.clone(), s)).collect();
        let pool = WorkerPool::new(workers);
        let mut ledger = RunLedger::default();
        let dag = kiln_scheduler::run_gen_pass(
            &mut registry,
            &self.out_root,
            &self.root,
            &self.cache,
            &self.target_runner,
            &self.gen_runner,
            &pool,
            &mut ledger,
        )
        .await?;
        pool.done().await;
        Ok(dag)
    }
}

/// Connect every configured external tier. A tier that fails to connect is
/// logged and dropped rather than failing the whole engine: an
/// unreachable shared cache degrades to local-only, it doesn't block work.
async fn build_tiers(config: &Config) -> Result<Vec<Arc<dyn CacheTier>>> {
    let mut tiers: Vec<Arc<dyn CacheTier>> = Vec::new();
    for tier in &config.cache_tiers {
        let built: Arc<dyn CacheTier> = match &tier.kind {
            TierKind::Fs(root) => Arc::new(FsCacheTier::new(tier.name.clone(), tier.role, root.clone())),
            TierKind::Object(uri) => {
                match ObjectCacheTier::connect(tier.name.clone(), tier.role, uri.clone()).await {
                    Ok(connected) => Arc::new(connected),
                    Err(e) => {
                        warn!(tier = %tier.name, error = %e, "cache tier unreachable, skipping");
                        continue;
                    }
                }
            }
        };
        tiers.push(built);
    }
    Ok(tiers)
}

/// Order `tiers` per `config.cache_order`: latency-ranked (memoized to
/// disk under the cache root) or exactly as declared.
async fn rank_tiers(config: &Config, tiers: Vec<Arc<dyn CacheTier>>) -> Result<Vec<Arc<dyn CacheTier>>> {
    if tiers.is_empty() || config.cache_order == CacheOrderMode::Declared {
        return Ok(tiers);
    }
    let cache_root = kiln_cache::root()?;
    let order = kiln_cache::rank_tiers(&cache_root, &tiers).await?;
    Ok(order.into_iter().map(|idx| tiers[idx].clone()).collect())
}
