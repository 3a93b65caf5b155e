//! CLI error type, exit code mapping, and JSON/human rendering.
//!
//! Shaped on `cuenv`'s `cli::CliError`/`render_error`: a small set of
//! `miette::Diagnostic` variants, one per exit code, with errors from every
//! other crate folded in via `#[from]`.

use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use std::io::{self, Write};
use thiserror::Error;

/// Successful build/usage, per §6.
pub const EXIT_OK: i32 = 0;
/// A build or target failed.
pub const EXIT_TARGET_FAILED: i32 = 1;
/// Bad flags, selectors, or an unreadable build graph file.
pub const EXIT_USAGE: i32 = 2;
/// Cooperative cancellation (`SIGINT`).
pub const EXIT_CANCELLED: i32 = 130;

/// Top-level CLI error, wrapping every crate's error type behind one
/// `miette::Diagnostic`.
#[derive(Error, Debug, Diagnostic)]
pub enum CliError {
    /// Bad flags, an unparsable selector, or a malformed build graph file.
    #[error("usage error: {message}")]
    #[diagnostic(code(kiln::cli::usage), help("{help}"))]
    Usage {
        /// Description of the problem.
        message: String,
        /// Suggested fix, always present (empty string renders as no help).
        help: String,
    },

    /// Linking the target graph failed: unresolved reference or cycle.
    #[error(transparent)]
    Dag(#[from] kiln_dag::Error),

    /// Reading or parsing a declared target spec failed, or a gen target
    /// redeclared an existing one incompatibly.
    #[error(transparent)]
    Spec(#[from] kiln_spec::Error),

    /// Hashing a target's inputs or outputs failed.
    #[error(transparent)]
    Hash(#[from] kiln_hash::Error),

    /// A cache operation failed outside of the retry-next-tier policy.
    #[error(transparent)]
    #[diagnostic(transparent)]
    Cache(#[from] kiln_cache::Error),

    /// Scheduling, gen-pass evaluation, or running a target failed.
    #[error(transparent)]
    #[diagnostic(transparent)]
    Scheduler(#[from] kiln_scheduler::Error),

    /// The sandbox runner failed outside of a well-typed scheduler error.
    #[error(transparent)]
    #[diagnostic(transparent)]
    Sandbox(#[from] kiln_sandbox::Error),

    /// Writing a generated artifact failed.
    #[error(transparent)]
    Artifact(#[from] kiln_artifact::Error),

    /// The build was cancelled (`SIGINT`).
    #[error("cancelled")]
    #[diagnostic(code(kiln::cli::cancelled))]
    Cancelled,

    /// A plain I/O error not already wrapped by another crate's error type.
    #[error("I/O error: {0}")]
    #[diagnostic(code(kiln::cli::io))]
    Io(#[from] io::Error),
}

impl CliError {
    /// Build a usage error with a help string.
    #[must_use]
    pub fn usage(message: impl Into<String>, help: impl Into<String>) -> Self {
        Self::Usage {
            message: message.into(),
            help: help.into(),
        }
    }
}

/// Map a [`CliError`] to the process exit code §6 specifies.
#[must_use]
pub fn exit_code_for(err: &CliError) -> i32 {
    match err {
        CliError::Usage { .. } => EXIT_USAGE,
        CliError::Cancelled => EXIT_CANCELLED,
        CliError::Dag(_)
        | CliError::Spec(_)
        | CliError::Hash(_)
        | CliError::Cache(_)
        | CliError::Scheduler(_)
        | CliError::Sandbox(_)
        | CliError::Artifact(_)
        | CliError::Io(_) => EXIT_TARGET_FAILED,
    }
}

/// Render `err` to stderr: a `miette::Report` in human mode, an
/// [`ErrorEnvelope`] in json mode. Matches `cuenv::cli::render_error`.
pub fn render_error(err: &CliError, json_mode: bool) {
    if json_mode {
        let envelope = ErrorEnvelope::new(serde_json::json!({ "message": err.to_string() }));
        match serde_json::to_string(&envelope) {
            Ok(json) => println!("{json}"),
            Err(_) => eprintln!("error serializing error response"),
        }
    } else {
        let report = miette::Report::new(CliErrorRef(err));
        eprintln!("{report:?}");
    }
    let _ = io::stderr().flush();
}

// `miette::Report::new` takes ownership; errors are often borrowed at the
// call site (e.g. inside a `match &result`), so render through a thin ref
// wrapper rather than requiring every caller to clone first.
#[derive(Debug)]
struct CliErrorRef<'a>(&'a CliError);

impl std::fmt::Display for CliErrorRef<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
impl std::error::Error for CliErrorRef<'_> {}
impl Diagnostic for CliErrorRef<'_> {
    fn code<'a>(&'a self) -> Option<Box<dyn std::fmt::Display + 'a>> {
        self.0.code()
    }
    fn help<'a>(&'a self) -> Option<Box<dyn std::fmt::Display + 'a>> {
        self.0.help()
    }
    fn diagnostic_source(&self) -> Option<&dyn Diagnostic> {
        self.0.diagnostic_source()
    }
}

/// `{ "status": "ok", "data": T }`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OkEnvelope<T> {
    /// Always `"ok"`.
    pub status: &'static str,
    /// The command's result payload.
    pub data: T,
}

impl<T> OkEnvelope<T> {
    /// Wrap `data` in a success envelope.
    #[must_use]
    pub fn new(data: T) -> Self {
        Self { status: "ok", data }
    }
}

/// `{ "status": "error", "error": E }`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorEnvelope<E> {
    /// Always `"error"`.
    pub status: &'static str,
    /// The error payload.
    pub error: E,
}

impl<E> ErrorEnvelope<E> {
    /// Wrap `error` in an error envelope.
    #[must_use]
    pub fn new(error: E) -> Self {
        Self { status: "error", error }
    }
}

/// Result type for CLI command handlers.
pub type Result<T> = std::result::Result<T, CliError>;
