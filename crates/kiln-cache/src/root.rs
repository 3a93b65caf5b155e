//! Cache root resolution: `KILN_CACHE_DIR` -> `XDG_CACHE_HOME/kiln` -> OS
//! cache dir -> `~/.kiln/cache` -> `TMPDIR` fallback.
//!
//! Mirrors `cuenv-cache`'s `cache_root_from_inputs`/`cache_root` override
//! chain unchanged in mechanism: candidates are tried in order, skipping
//! `/homeless-shelter`-style unwritable homes, probing writability via a
//! temp file for directories that already exist.

use crate::error::{Error, Result};
use std::path::{Path, PathBuf};

/// Inputs to cache-root resolution, split out from environment access so
/// the resolution logic itself is pure and testable.
#[derive(Debug, Default, Clone)]
pub struct RootInputs {
    /// `KILN_CACHE_DIR`, if set and non-empty.
    pub kiln_cache_dir: Option<PathBuf>,
    /// `XDG_CACHE_HOME`, if set and non-empty.
    pub xdg_cache_home: Option<PathBuf>,
    /// The OS-conventional cache directory (`dirs::cache_dir()`).
    pub os_cache_dir: Option<PathBuf>,
    /// The user's home directory.
    pub home_dir: Option<PathBuf>,
    /// The system temp directory, always present as the final fallback.
    pub temp_dir: PathBuf,
}

/// Resolve the cache root directory from explicit `inputs`, returning the
/// first writable candidate in the resolution order.
///
/// # Errors
/// Returns [`Error::Configuration`] if no candidate is writable.
pub fn root_from_inputs(inputs: RootInputs) -> Result<PathBuf> {
    let mut candidates: Vec<PathBuf> = Vec::new();

    if let Some(dir) = inputs.kiln_cache_dir.filter(|p| !p.as_os_str().is_empty()) {
        candidates.push(dir);
    }
    if let Some(xdg) = inputs.xdg_cache_home {
        candidates.push(xdg.join("kiln"));
    }
    if let Some(os_cache) = inputs.os_cache_dir {
        candidates.push(os_cache.join("kiln"));
    }
    if let Some(home) = inputs.home_dir {
        candidates.push(home.join(".kiln/cache"));
    }
    candidates.push(inputs.temp_dir.join("kiln/cache"));

    for path in candidates {
        if path.starts_with("/homeless-shelter") {
            continue;
        }
        if path.exists() {
            if is_writable(&path) {
                return Ok(path);
            }
            continue;
        }
        match std::fs::create_dir_all(&path) {
            Ok(()) => return Ok(path),
            Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => continue,
            Err(_) => continue,
        }
    }

    Err(Error::configuration(
        "failed to determine a writable kiln cache directory",
    ))
}

fn is_writable(path: &Path) -> bool {
    let probe = path.join(".write_probe");
    match std::fs::OpenOptions::new()
        .create(true)
        .truncate(true)
        .write(true)
        .open(&probe)
    {
        Ok(_) => {
            let _ = std::fs::remove_file(&probe);
            true
        }
        Err(_) => false,
    }
}

/// Resolve the cache root from the real process environment.
///
/// # Errors
/// Returns [`Error::Configuration`] if no candidate directory is writable.
pub fn root() -> Result<PathBuf> {
    let inputs = RootInputs {
        kiln_cache_dir: std::env::var("KILN_CACHE_DIR")
            .ok()
            .filter(|s| !s.trim().is_empty())
            .map(PathBuf::from),
        xdg_cache_home: std::env::var("XDG_CACHE_HOME")
            .ok()
            .filter(|s| !s.trim().is_empty())
            .map(PathBuf::from),
        os_cache_dir: dirs::cache_dir(),
        home_dir: dirs::home_dir(),
        temp_dir: std::env::temp_dir(),
    };
    root_from_inputs(inputs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_override_wins_over_everything_else() {
        let dir = tempfile::tempdir().unwrap();
        let inputs = RootInputs {
            kiln_cache_dir: Some(dir.path().to_path_buf()),
            xdg_cache_home: Some(PathBuf::from("/should-not-be-used")),
            os_cache_dir: None,
            home_dir: None,
            temp_dir: std::env::temp_dir(),
        };
        assert_eq!(root_from_inputs(inputs).unwrap(), dir.path());
    }

    #[test]
    fn falls_back_to_temp_dir_when_nothing_else_resolves() {
        let inputs = RootInputs {
            kiln_cache_dir: None,
            xdg_cache_home: None,
            os_cache_dir: None,
            home_dir: None,
            temp_dir: std::env::temp_dir(),
        };
        let resolved = root_from_inputs(inputs).unwrap();
        assert!(resolved.starts_with(std::env::temp_dir()));
        assert!(resolved.ends_with("kiln/cache"));
    }

    #[test]
    fn homeless_shelter_home_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let inputs = RootInputs {
            kiln_cache_dir: None,
            xdg_cache_home: None,
            os_cache_dir: None,
            home_dir: Some(PathBuf::from("/homeless-shelter")),
            temp_dir: dir.path().to_path_buf(),
        };
        let resolved = root_from_inputs(inputs).unwrap();
        assert!(resolved.starts_with(dir.path()));
    }
}
