//! The local cache tier: `<home>/cache/<pkg-path>/<name>/<input-hash>/`.
//!
//! The input-hash directory is the atomic unit of cache presence: an entry
//! exists only once its manifest artifact is written, and artifacts are
//! always written in the order outputs -> hashes -> log -> manifest *last*,
//! so a reader that sees a manifest can trust every other artifact is
//! present too. Atomic-write (stage in a temp dir, rename into place) and
//! verify-on-read mirror `cuenv-cache`'s `cas.rs` `CasStore`, applied here
//! to whole cache-entry directories rather than individual CAS blobs.

use crate::error::{Error, Result};
use crate::manifest::{HASH_INPUT_FILE, LOG_TAR_FILE, Manifest, MANIFEST_FILE, hash_output_file, output_tar_file};
use std::path::{Path, PathBuf};

/// The local, filesystem-backed cache tier, authoritative for the running
/// session.
#[derive(Debug, Clone)]
pub struct LocalCache {
    root: PathBuf,
}

/// One output to stage into a cache entry: its declared name, the hash of
/// its contents, and the path to its already-built tarball.
pub struct StagedOutput<'a> {
    /// Declared output name.
    pub name: &'a str,
    /// Output hash (see `kiln-hash`).
    pub hash: &'a str,
    /// Path to the tarball to copy in.
    pub tar_path: &'a Path,
}

impl LocalCache {
    /// Open the local cache rooted at `root` (see [`crate::root`] for how
    /// to resolve it from the environment).
    #[must_use]
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    /// Directory for a specific `(target FQN, input hash)` cache entry.
    #[must_use]
    pub fn entry_dir(&self, fqn: &str, input_hash: &str) -> PathBuf {
        let (pkg_path, name) = split_fqn(fqn);
        self.root.join(pkg_path).join(name).join(input_hash)
    }

    /// Whether an entry is present: its manifest exists and every output
    /// tarball the manifest names also exists.
    #[must_use]
    pub fn is_present(&self, fqn: &str, input_hash: &str) -> bool {
        let Ok(manifest) = self.read_manifest(fqn, input_hash) else {
            return false;
        };
        let dir = self.entry_dir(fqn, input_hash);
        manifest
            .out_hashes
            .keys()
            .all(|name| dir.join(output_tar_file(name)).exists())
    }

    /// Read and parse an entry's manifest.
    ///
    /// # Errors
    /// Returns [`Error::Io`] if the manifest can't be read, or
    /// [`Error::Serialization`] if it can't be parsed.
    pub fn read_manifest(&self, fqn: &str, input_hash: &str) -> Result<Manifest> {
        let path = self.entry_dir(fqn, input_hash).join(MANIFEST_FILE);
        let bytes = std::fs::read(&path).map_err(|e| Error::io(e, &path, "read"))?;
        Manifest::from_json_bytes(&bytes)
            .map_err(|e| Error::serialization(format!("invalid manifest at {}: {e}", path.display())))
    }

    /// Write a complete cache entry atomically: stage every artifact into a
    /// sibling temp directory in the spec's write order (outputs -> hashes
    /// -> log -> manifest last), then rename the temp directory into place.
    ///
    /// # Errors
    /// Returns [`Error::Io`] if any staging or rename step fails.
    pub fn write_entry(
        &self,
        fqn: &str,
        input_hash: &str,
        outputs: &[StagedOutput<'_>],
        log_tar_path: Option<&Path>,
        manifest: &Manifest,
    ) -> Result<()> {
        let final_dir = self.entry_dir(fqn, input_hash);
        let parent = final_dir.parent().ok_or_else(|| {
            Error::configuration(format!("entry dir {} has no parent", final_dir.display()))
        })?;
        std::fs::create_dir_all(parent).map_err(|e| Error::io(e, parent, "create_dir_all"))?;

        let staging = parent.join(format!(".{input_hash}.tmp-{}", std::process::id()));
        if staging.exists() {
            std::fs::remove_dir_all(&staging).map_err(|e| Error::io(e, &staging, "remove_dir_all"))?;
        }
        std::fs::create_dir_all(&staging).map_err(|e| Error::io(e, &staging, "create_dir_all"))?;

        // outputs, then their hashes
        for output in outputs {
            let dest = staging.join(output_tar_file(output.name));
            std::fs::copy(output.tar_path, &dest).map_err(|e| Error::io(e, &dest, "copy"))?;
            let hash_dest = staging.join(hash_output_file(output.name));
            std::fs::write(&hash_dest, output.hash).map_err(|e| Error::io(e, &hash_dest, "write"))?;
        }
        let input_hash_dest = staging.join(HASH_INPUT_FILE);
        std::fs::write(&input_hash_dest, input_hash)
            .map_err(|e| Error::io(e, &input_hash_dest, "write"))?;

        // log, if present
        if let Some(log_path) = log_tar_path {
            let dest = staging.join(LOG_TAR_FILE);
            std::fs::copy(log_path, &dest).map_err(|e| Error::io(e, &dest, "copy"))?;
        }

        // manifest last: its presence is what makes the entry "present"
        let manifest_bytes = manifest
            .to_json_bytes()
            .map_err(|e| Error::serialization(e.to_string()))?;
        let manifest_dest = staging.join(MANIFEST_FILE);
        std::fs::write(&manifest_dest, manifest_bytes)
            .map_err(|e| Error::io(e, &manifest_dest, "write"))?;

        if final_dir.exists() {
            std::fs::remove_dir_all(&final_dir).map_err(|e| Error::io(e, &final_dir, "remove_dir_all"))?;
        }
        std::fs::rename(&staging, &final_dir).map_err(|e| Error::io(e, &final_dir, "rename"))?;

        Ok(())
    }

    /// Promote an externally-fetched entry (already unpacked into
    /// `staged_dir`) into the local cache atomically.
    ///
    /// # Errors
    /// Returns [`Error::Io`] if the rename fails.
    pub fn promote(&self, staged_dir: &Path, fqn: &str, input_hash: &str) -> Result<()> {
        let final_dir = self.entry_dir(fqn, input_hash);
        if let Some(parent) = final_dir.parent() {
            std::fs::create_dir_all(parent).map_err(|e| Error::io(e, parent, "create_dir_all"))?;
        }
        if final_dir.exists() {
            std::fs::remove_dir_all(&final_dir).map_err(|e| Error::io(e, &final_dir, "remove_dir_all"))?;
        }
        std::fs::rename(staged_dir, &final_dir).map_err(|e| Error::io(e, &final_dir, "rename"))?;
        Ok(())
    }
}

fn split_fqn(fqn: &str) -> (&str, &str) {
    let rest = fqn.strip_prefix("//").unwrap_or(fqn);
    match rest.rsplit_once(':') {
        Some((pkg, name)) => (pkg, name),
        None => (rest, ""),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use std::io::Write;

    fn manifest(out_name: &str, out_hash: &str) -> Manifest {
        Manifest {
            git_commit: None,
            git_ref: None,
            input_hash: "inputhash".into(),
            deps_hashes: BTreeMap::new(),
            out_hashes: BTreeMap::from([(out_name.to_string(), out_hash.to_string())]),
            timestamp: 0,
        }
    }

    #[test]
    fn write_then_read_round_trips_and_reports_present() {
        let root = tempfile::tempdir().unwrap();
        let cache = LocalCache::new(root.path().to_path_buf());

        let tar_src = tempfile::NamedTempFile::new().unwrap();
        tar_src.as_file().write_all(b"tarbytes").unwrap();

        let m = manifest("bin", "outhash");
        cache
            .write_entry(
                "//pkg:build",
                "inputhash",
                &[StagedOutput {
                    name: "bin",
                    hash: "outhash",
                    tar_path: tar_src.path(),
                }],
                None,
                &m,
            )
            .unwrap();

        assert!(cache.is_present("//pkg:build", "inputhash"));
        let read = cache.read_manifest("//pkg:build", "inputhash").unwrap();
        assert_eq!(read, m);
    }

    #[test]
    fn entry_missing_output_tarball_is_not_present() {
        let root = tempfile::tempdir().unwrap();
        let cache = LocalCache::new(root.path().to_path_buf());
        let dir = cache.entry_dir("//pkg:build", "inputhash");
        std::fs::create_dir_all(&dir).unwrap();
        let m = manifest("bin", "outhash");
        std::fs::write(dir.join(MANIFEST_FILE), m.to_json_bytes().unwrap()).unwrap();
        // out_bin.tar deliberately not written
        assert!(!cache.is_present("//pkg:build", "inputhash"));
    }

    #[test]
    fn entry_dir_splits_fqn_into_package_path_and_name() {
        let cache = LocalCache::new(PathBuf::from("/cache"));
        let dir = cache.entry_dir("//services/api:build", "abc");
        assert_eq!(dir, PathBuf::from("/cache/services/api/build/abc"));
    }
}
