//! Error types for the target data model.

use thiserror::Error;

/// Error type for spec/target operations.
#[derive(Error, Debug)]
pub enum Error {
    /// I/O error while reading a package or target definition.
    #[error("I/O {operation} failed{}", path.as_deref().map_or(String::new(), |p| format!(": {p}")))]
    Io {
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
        /// Path that caused the error, if available.
        path: Option<String>,
        /// Operation that failed (e.g. "read", "parse").
        operation: String,
    },

    /// Configuration or validation error not tied to a specific target.
    #[error("spec configuration error: {message}")]
    Configuration {
        /// Human-readable description.
        message: String,
    },

    /// A redeclaration of a `gen`-produced target was not structurally
    /// equal to its previous declaration.
    #[error("conflicting target redefinition: {fqn}")]
    ConflictingRedefinition {
        /// FQN of the target.
        fqn: String,
    },
}

/// Result type for spec/target operations.
pub type Result<T> = std::result::Result<T, Error>;
