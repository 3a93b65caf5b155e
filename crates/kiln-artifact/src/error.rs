//! Error types for artifact generation.

use miette::Diagnostic;
use std::path::Path;
use thiserror::Error;

/// Error type for artifact generation.
#[derive(Error, Debug, Diagnostic)]
pub enum Error {
    /// I/O error while writing an artifact.
    #[error("I/O {operation} failed{}", path.as_ref().map_or(String::new(), |p| format!(": {}", p.display())))]
    #[diagnostic(code(kiln::artifact::io))]
    Io {
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
        /// Path that caused the error, if available.
        path: Option<Box<Path>>,
        /// Operation that failed.
        operation: String,
    },

    /// An `out` artifact's declared output path does not exist on disk
    /// after the target ran. Fatal: unlike a missing log, a missing
    /// declared output means the build itself failed to produce what it
    /// promised.
    #[error("target {fqn} is missing declared output {output}")]
    #[diagnostic(code(kiln::artifact::missing_output))]
    MissingOutput {
        /// FQN of the target.
        fqn: String,
        /// Name of the missing output.
        output: String,
    },

    /// Serialization error building a manifest artifact.
    #[error("serialization error: {message}")]
    #[diagnostic(code(kiln::artifact::serialization))]
    Serialization {
        /// Description of the failure.
        message: String,
    },
}

impl Error {
    /// Create an I/O error with path context.
    #[must_use]
    pub fn io(source: std::io::Error, path: impl AsRef<Path>, operation: impl Into<String>) -> Self {
        Self::Io {
            source,
            path: Some(path.as_ref().into()),
            operation: operation.into(),
        }
    }

    /// Create a serialization error.
    #[must_use]
    pub fn serialization(msg: impl Into<String>) -> Self {
        Self::Serialization {
            message: msg.into(),
        }
    }
}

/// Result type for artifact generation.
pub type Result<T> = std::result::Result<T, Error>;
