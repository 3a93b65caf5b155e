//! Pluggable execution backends.
//!
//! Grounded on `cuenv-core`'s `tasks::backend::TaskBackend` trait: the
//! scheduler depends only on this trait, never on a concrete sandbox
//! implementation, so `kiln-sandbox` stays a leaf crate wired in by
//! `kiln-cli` rather than a dependency of `kiln-scheduler` itself -- the
//! same inversion `cuenv-core` uses to keep Dagger execution out of its own
//! dependency graph.

use async_trait::async_trait;
use kiln_spec::TargetSpec;
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Where a run's produced files land and what it's allowed to read.
#[derive(Debug, Clone)]
pub struct RunContext {
    /// Root directory this target's outputs should be staged under.
    pub out_root: PathBuf,
    /// Root directory declared input files (`deps.files`/`hash_deps`) are
    /// resolved relative to -- the workspace root, since `TargetSpec`
    /// declares paths relative to it rather than per-package.
    pub package_root: PathBuf,
    /// Per-dep output hashes already computed, for building the input hash
    /// and for the runner to resolve dependency output paths.
    pub dep_output_hashes: BTreeMap<String, BTreeMap<String, String>>,
    /// Per-dep output files already materialized on disk (freshly run, or
    /// expanded from a cache hit): `dep FQN -> (output name -> (archive
    /// relative path, absolute path))`. The default runner stages all of a
    /// listed dependency's outputs into the sandbox (see `DESIGN.md`);
    /// there is no per-output selection syntax on [`kiln_spec::Deps`].
    pub dep_output_files: BTreeMap<String, BTreeMap<String, Vec<(String, PathBuf)>>>,
    /// Human-readable status sink (e.g. a [`kiln_worker::WorkerHandle`]).
    pub status: Option<kiln_worker::WorkerHandle>,
}

impl RunContext {
    /// Report progress through the attached worker handle, if any.
    pub fn status(&self, text: impl Into<String>) {
        if let Some(handle) = &self.status {
            handle.status(text);
        }
    }
}

/// What a target run produced.
#[derive(Debug, Clone, Default)]
pub struct RunOutcome {
    /// Per-declared-output staged files: `output name -> (archive-relative
    /// path, absolute path)` pairs.
    pub staged_outputs: BTreeMap<String, Vec<(String, PathBuf)>>,
    /// Path to the captured execution log, if the runner captured one.
    pub log_file_path: Option<PathBuf>,
}

/// Executes a single target's recipe. The default, host-process
/// implementation lives in `kiln-sandbox`; tests and alternate backends
/// (container execution, remote execution) can supply their own.
#[async_trait]
pub trait TargetRunner: Send + Sync {
    /// Run `target`'s recipe, returning what it staged.
    async fn run(&self, target: &TargetSpec, ctx: &RunContext) -> crate::error::Result<RunOutcome>;

    /// The backend's name, for logging.
    fn name(&self) -> &'static str;
}

/// Executes a `gen` target and evaluates the build files it produced,
/// returning the newly declared target specs.
#[async_trait]
pub trait GenRunner: Send + Sync {
    /// Run `target` (a `gen` target) and evaluate whatever build
    /// definition files its output tree contains.
    async fn run_gen(
        &self,
        target: &TargetSpec,
        ctx: &RunContext,
    ) -> crate::error::Result<Vec<TargetSpec>>;
}
