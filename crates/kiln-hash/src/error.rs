//! Error types for hashing operations.

use thiserror::Error;

/// Error type for hashing operations.
#[derive(Error, Debug)]
pub enum Error {
    /// I/O error while reading a file to be folded into a hash.
    #[error("I/O {operation} failed{}", path.as_deref().map_or(String::new(), |p| format!(": {p}")))]
    Io {
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
        /// Path that caused the error, if available.
        path: Option<String>,
        /// Operation that failed.
        operation: String,
    },

    /// The envelope could not be canonicalized to JSON.
    #[error("hash envelope configuration error: {message}")]
    Configuration {
        /// Human-readable description.
        message: String,
    },

    /// A declared output is missing from the on-disk output tree.
    #[error("missing output `{output}` for target {fqn}")]
    MissingOutput {
        /// FQN of the target.
        fqn: String,
        /// Name of the missing output.
        output: String,
    },
}

/// Result type for hashing operations.
pub type Result<T> = std::result::Result<T, Error>;
