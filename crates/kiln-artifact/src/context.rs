//! The context an [`crate::Artifact`] is generated against.

use std::path::PathBuf;

/// Where a generated artifact's bytes land, and what inputs are available
/// while generating it. Mirrors `heph`'s `artifacts.GenContext`.
#[derive(Debug, Clone)]
pub struct GenContext {
    /// Root directory staged outputs are relative to.
    pub out_root: PathBuf,
    /// Path to the target's execution log, if one was captured.
    pub log_file_path: Option<PathBuf>,
    /// Where this artifact's bytes should be written.
    pub artifact_path: PathBuf,
}
