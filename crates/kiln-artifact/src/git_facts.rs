//! Best-effort git commit/ref lookup, memoized once per process.
//!
//! Grounded on `heph`'s `gitCommitOnce`/`gitRefOnce` (`utils.Once[string]`
//! guards around `git rev-parse HEAD` / `git rev-parse --abbrev-ref HEAD`):
//! the manifest artifact calls `git` at most once per process regardless of
//! how many manifests are generated, and treats a failing `git` invocation
//! as "no commit info" rather than an error.

use std::process::Command;
use std::sync::OnceLock;

static GIT_COMMIT: OnceLock<Option<String>> = OnceLock::new();
static GIT_REF: OnceLock<Option<String>> = OnceLock::new();

fn run_git(args: &[&str]) -> Option<String> {
    let output = Command::new("git").args(args).output().ok()?;
    if !output.status.success() {
        return None;
    }
    let text = String::from_utf8(output.stdout).ok()?;
    let trimmed = text.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// The current commit SHA, or `None` if `git` is unavailable or this isn't
/// a git checkout. Computed once per process.
pub fn git_commit() -> Option<String> {
    GIT_COMMIT
        .get_or_init(|| run_git(&["rev-parse", "HEAD"]))
        .clone()
}

/// The current ref (branch name, or `HEAD` when detached), or `None`.
/// Computed once per process.
pub fn git_ref() -> Option<String> {
    GIT_REF
        .get_or_init(|| run_git(&["rev-parse", "--abbrev-ref", "HEAD"]))
        .clone()
}
