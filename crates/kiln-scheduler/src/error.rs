//! Error types for scheduling and running targets.

use miette::Diagnostic;
use thiserror::Error;

/// Error type for scheduler operations.
#[derive(Error, Debug, Diagnostic)]
pub enum Error {
    /// Linking or re-linking the target graph failed.
    #[error(transparent)]
    Dag(#[from] kiln_dag::Error),

    /// Hashing a target's inputs or outputs failed.
    #[error(transparent)]
    Hash(#[from] kiln_hash::Error),

    /// A cache read or write failed.
    #[error(transparent)]
    #[diagnostic(transparent)]
    Cache(#[from] kiln_cache::Error),

    /// A worker pool job failed or the pool was cancelled.
    #[error(transparent)]
    Worker(#[from] kiln_worker::Error),

    /// A gen-produced target conflicted with an existing declaration. Thin
    /// wrapper: the underlying rule lives on `kiln_spec::TargetSpec`'s
    /// `PartialEq`, this just carries the error across the crate boundary.
    #[error(transparent)]
    Spec(#[from] kiln_spec::Error),

    /// The configured [`crate::TargetRunner`] or [`crate::GenRunner`]
    /// failed outside of a well-typed cache/dag/worker error.
    #[error("target {fqn} failed: {message}")]
    #[diagnostic(code(kiln::scheduler::run_failed))]
    RunFailed {
        /// FQN of the target that failed.
        fqn: String,
        /// Description of the failure.
        message: String,
    },

    /// A declared output was requested from a target whose run produced
    /// nothing of that name.
    #[error("target {fqn} did not produce its declared output {output}")]
    #[diagnostic(code(kiln::scheduler::missing_output))]
    MissingOutput {
        /// FQN of the target.
        fqn: String,
        /// Name of the missing output.
        output: String,
    },
}

/// Result type for scheduler operations.
pub type Result<T> = std::result::Result<T, Error>;
