//! Error types for the worker pool.

use thiserror::Error;

/// Error type for worker pool operations.
#[derive(Error, Debug, Clone)]
pub enum Error {
    /// A job's closure returned an error.
    #[error("job {job_id} failed: {message}")]
    JobFailed {
        /// The failing job's id.
        job_id: String,
        /// Description of the failure.
        message: String,
    },

    /// A job's closure panicked.
    #[error("job {job_id} panicked: {message}")]
    JobPanicked {
        /// The panicking job's id.
        job_id: String,
        /// The panic payload, stringified.
        message: String,
    },

    /// The pool's cancellation token was triggered before this job ran.
    #[error("cancelled")]
    Cancelled,
}

/// Result type for worker pool operations.
pub type Result<T> = std::result::Result<T, Error>;
