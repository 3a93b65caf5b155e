//! Error types for dependency graph operations.

use thiserror::Error as ThisError;

/// Result type for dependency graph operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur during dependency graph operations.
#[derive(Debug, Clone, ThisError)]
pub enum Error {
    /// A dependency cycle was detected in the graph.
    #[error("cycle detected in target graph: {message}")]
    CycleDetected {
        /// Human-readable description of the cycle.
        message: String,
    },

    /// A target depends on another target that doesn't exist.
    #[error("target '{target}' depends on missing target '{dependency}'")]
    MissingDependency {
        /// The target that has the missing dependency.
        target: String,
        /// The name of the missing dependency.
        dependency: String,
    },

    /// Multiple missing dependencies were found.
    #[error("missing dependencies: {}", format_missing(.missing))]
    MissingDependencies {
        /// List of (target, missing_dependency) pairs.
        missing: Vec<(String, String)>,
    },

    /// Failed to perform topological sort.
    #[error("failed to sort targets topologically: {reason}")]
    TopologicalSortFailed {
        /// Reason for the failure.
        reason: String,
    },
}

fn format_missing(missing: &[(String, String)]) -> String {
    missing
        .iter()
        .map(|(target, dep)| format!("target '{target}' depends on missing target '{dep}'"))
        .collect::<Vec<_>>()
        .join(", ")
}
