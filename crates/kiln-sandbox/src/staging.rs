//! Stages a target's declared inputs into an isolated tree before its
//! recipe runs.

use crate::error::{Error, Result};
use std::path::{Path, PathBuf};

/// How an input file is placed into the sandbox tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StagingMode {
    /// Hardlink the source file in (cheap, but the sandbox must not
    /// mutate it in place).
    Link,
    /// Copy the source file in (safe against in-place mutation, costs an
    /// extra read+write per input).
    Copy,
}

/// Stage `files` (pairs of `(source absolute path, sandbox-relative
/// path)`) under `sandbox_root`, creating parent directories as needed.
///
/// # Errors
/// Returns [`Error::Io`] if any source is missing or the link/copy fails.
pub fn stage_inputs(sandbox_root: &Path, files: &[(PathBuf, PathBuf)], mode: StagingMode) -> Result<()> {
    for (src, rel) in files {
        let dest = sandbox_root.join(rel);
        if let Some(parent) = dest.parent() {
            std::fs::create_dir_all(parent).map_err(|e| Error::io(e, parent, "create_dir_all"))?;
        }
        match mode {
            StagingMode::Link => match std::fs::hard_link(src, &dest) {
                Ok(()) => {}
                Err(_) => {
                    std::fs::copy(src, &dest).map_err(|e| Error::io(e, &dest, "copy (link fallback)"))?;
                }
            },
            StagingMode::Copy => {
                std::fs::copy(src, &dest).map_err(|e| Error::io(e, &dest, "copy"))?;
            }
        }
    }
    Ok(())
}

/// Resolve a declared output glob pattern against the sandbox tree,
/// returning `(sandbox-relative path, absolute path)` pairs for every
/// match, sorted by relative path.
///
/// # Errors
/// Returns [`Error::Io`] if `pattern` is not a valid glob.
pub fn resolve_output_pattern(sandbox_root: &Path, pattern: &str) -> Result<Vec<(String, PathBuf)>> {
    let full_pattern = sandbox_root.join(pattern);
    let full_pattern_str = full_pattern.to_string_lossy().into_owned();

    let mut matches: Vec<(String, PathBuf)> = glob::glob(&full_pattern_str)
        .map_err(|e| Error::io(std::io::Error::other(e.to_string()), sandbox_root, "glob"))?
        .filter_map(std::result::Result::ok)
        .filter(|p| p.is_file())
        .map(|abs| {
            let rel = abs
                .strip_prefix(sandbox_root)
                .unwrap_or(&abs)
                .to_string_lossy()
                .into_owned();
            (rel, abs)
        })
        .collect();
    matches.sort_by(|a, b| a.0.cmp(&b.0));
    Ok(matches)
}
