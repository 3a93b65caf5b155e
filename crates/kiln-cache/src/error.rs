//! Error types for the cache crate.

use miette::Diagnostic;
use std::path::Path;
use thiserror::Error;

/// Error type for cache operations.
#[derive(Error, Debug, Diagnostic)]
pub enum Error {
    /// I/O error during cache operations.
    #[error("I/O {operation} failed{}", path.as_ref().map_or(String::new(), |p| format!(": {}", p.display())))]
    #[diagnostic(code(kiln::cache::io), help("check file permissions and that the path exists"))]
    Io {
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
        /// Path that caused the error, if available.
        path: Option<Box<Path>>,
        /// Operation that failed (e.g., "read", "write", "create").
        operation: String,
    },

    /// Configuration or validation error.
    #[error("cache configuration error: {message}")]
    #[diagnostic(code(kiln::cache::config))]
    Configuration {
        /// Error message describing the configuration issue.
        message: String,
    },

    /// A cache entry's manifest refers to artifacts that are absent. The
    /// entry is deleted locally and re-fetched or rebuilt; this is
    /// reported so the caller can log it, not treated as fatal.
    #[error("cache entry corrupt for {fqn} @ {input_hash}: {reason}")]
    #[diagnostic(code(kiln::cache::corrupt))]
    CacheCorrupt {
        /// FQN of the target whose entry is corrupt.
        fqn: String,
        /// Input hash of the corrupt entry.
        input_hash: String,
        /// What was missing or inconsistent.
        reason: String,
    },

    /// Unlocking a gate that isn't held.
    #[error("lock contention: attempted to unlock a gate not held for {key}")]
    #[diagnostic(code(kiln::cache::lock_contention))]
    LockContention {
        /// The gate key (target FQN + input hash fingerprint).
        key: String,
    },

    /// Serialization error.
    #[error("serialization error: {message}")]
    #[diagnostic(code(kiln::cache::serialization))]
    Serialization {
        /// Error message describing the serialization issue.
        message: String,
    },

    /// An external cache tier's transport failed. Never fatal on its own —
    /// callers retry on the next tier — but surfaced so it can be logged.
    #[error("cache tier `{tier}` failed: {message}")]
    #[diagnostic(code(kiln::cache::tier_failed))]
    TierFailed {
        /// Name or URI of the tier that failed.
        tier: String,
        /// Description of the failure.
        message: String,
    },
}

impl Error {
    /// Create a configuration error.
    #[must_use]
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration {
            message: msg.into(),
        }
    }

    /// Create an I/O error with path context.
    #[must_use]
    pub fn io(
        source: std::io::Error,
        path: impl AsRef<Path>,
        operation: impl Into<String>,
    ) -> Self {
        Self::Io {
            source,
            path: Some(path.as_ref().into()),
            operation: operation.into(),
        }
    }

    /// Create an I/O error without path context.
    #[must_use]
    pub fn io_no_path(source: std::io::Error, operation: impl Into<String>) -> Self {
        Self::Io {
            source,
            path: None,
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

/// Result type for cache operations.
pub type Result<T> = std::result::Result<T, Error>;
