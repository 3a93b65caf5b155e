//! [`kiln_scheduler::GenRunner`]: runs a `gen` target, then evaluates the
//! build-definition files it produced.
//!
//! Build-file evaluation proper is the external front end's job (see
//! [`crate::loader`]); this just closes the loop for `gen` targets by
//! treating their staged outputs as more front-end documents to load,
//! mirroring `heph`'s `runBuildFile` call inside `scheduleRunGeneratedFiles`
//! (`examples/original_source/engine/gen_run.go`) but delegating the parse
//! step to the same JSON loader every other target spec goes through.

use crate::loader;
use async_trait::async_trait;
use kiln_scheduler::{GenRunner, RunContext, RunOutcome, TargetRunner};
use kiln_spec::TargetSpec;
use std::sync::Arc;

/// Runs a `gen` target through an inner [`TargetRunner`], then loads every
/// staged output file as a build-definition document.
pub struct FileGenRunner {
    inner: Arc<dyn TargetRunner>,
}

impl FileGenRunner {
    /// Wrap `inner`, the runner used to execute the gen target's own
    /// recipe (normally the same [`TargetRunner`] used for ordinary
    /// targets).
    #[must_use]
    pub fn new(inner: Arc<dyn TargetRunner>) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl GenRunner for FileGenRunner {
    async fn run_gen(&self, target: &TargetSpec, ctx: &RunContext) -> kiln_scheduler::Result<Vec<TargetSpec>> {
        let outcome: RunOutcome = self.inner.run(target, ctx).await?;

        let mut produced = Vec::new();
        for files in outcome.staged_outputs.values() {
            for (_, abs_path) in files {
                if !abs_path.to_string_lossy().ends_with(".kiln.json") {
                    continue;
                }
                let specs = loader::load(abs_path).map_err(|e| kiln_scheduler::Error::RunFailed {
                    fqn: target.fqn.clone(),
                    message: format!("evaluating generated file {}: {e}", abs_path.display()),
                })?;
                produced.extend(specs);
            }
        }
        Ok(produced)
    }
}
