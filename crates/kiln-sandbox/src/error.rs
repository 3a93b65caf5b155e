//! Error types for sandboxed target execution.

use miette::Diagnostic;
use std::path::PathBuf;
use thiserror::Error;

/// Error type for sandbox operations.
#[derive(Error, Debug, Diagnostic)]
pub enum Error {
    /// I/O error while staging inputs or collecting outputs.
    #[error("I/O {operation} failed{}", path.as_ref().map_or(String::new(), |p| format!(": {}", p.display())))]
    #[diagnostic(code(kiln::sandbox::io))]
    Io {
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
        /// Path that caused the error, if available.
        path: Option<PathBuf>,
        /// Operation that failed.
        operation: String,
    },

    /// Spawning or waiting on the recipe's process failed.
    #[error("failed to {operation} recipe for {fqn}: {source}")]
    #[diagnostic(code(kiln::sandbox::process))]
    Process {
        /// FQN of the target.
        fqn: String,
        /// What was being attempted.
        operation: String,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// A declared output pattern matched nothing in the sandbox tree after
    /// the recipe exited. Fatal.
    #[error("target {fqn} is missing declared output {output}")]
    #[diagnostic(code(kiln::sandbox::missing_output))]
    MissingOutput {
        /// FQN of the target.
        fqn: String,
        /// Name of the missing output.
        output: String,
    },

    /// The recipe exited with a non-zero status.
    #[error("target {fqn} exited with status {code}")]
    #[diagnostic(code(kiln::sandbox::recipe_failed))]
    RecipeFailed {
        /// FQN of the target.
        fqn: String,
        /// Process exit code, or `-1` if terminated by a signal.
        code: i32,
    },

    /// The recipe ran past its declared timeout and was terminated.
    #[error("target {fqn} timed out after {seconds}s")]
    #[diagnostic(code(kiln::sandbox::timeout))]
    Timeout {
        /// FQN of the target.
        fqn: String,
        /// The timeout that was exceeded.
        seconds: u64,
    },
}

impl Error {
    /// Create an I/O error with path context.
    #[must_use]
    pub fn io(source: std::io::Error, path: impl Into<PathBuf>, operation: impl Into<String>) -> Self {
        Self::Io {
            source,
            path: Some(path.into()),
            operation: operation.into(),
        }
    }
}

/// Result type for sandbox operations.
pub type Result<T> = std::result::Result<T, Error>;
