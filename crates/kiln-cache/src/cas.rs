//! Optional content-addressed blob store, underneath the per-target cache
//! entry layout.
//!
//! This is an addition beyond the literal cache-entry spec: large identical
//! outputs across targets are stored once, referenced by hash from the
//! per-target artifact directory, justified because `cuenv`'s own cache
//! design layers a CAS under task-level entries for exactly this reason.
//! Ported from `cuenv-cache`'s `cas.rs` `CasStore`/`BlobId`: two-level
//! hex-sharded directory layout, atomic tempfile-then-rename writes, and
//! integrity reverification on read.

use crate::error::{Error, Result};
use sha2::{Digest, Sha256};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

/// A content-addressed blob identifier: the hex-encoded SHA-256 of its data.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlobId(String);

impl BlobId {
    /// Compute the ID for `data`.
    #[must_use]
    pub fn from_data(data: &[u8]) -> Self {
        Self(hex::encode(Sha256::digest(data)))
    }

    /// Parse an existing hex digest.
    ///
    /// # Errors
    /// Returns [`Error::Configuration`] if `hex` isn't a 64-character
    /// lowercase hex string.
    pub fn from_hex(hex: &str) -> Result<Self> {
        if hex.len() == 64 && hex.bytes().all(|b| b.is_ascii_hexdigit()) {
            Ok(Self(hex.to_lowercase()))
        } else {
            Err(Error::configuration(format!("invalid blob id: {hex}")))
        }
    }

    /// The hex digest.
    #[must_use]
    pub fn as_hex(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BlobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Two-level hex-sharded content-addressed store: `root/{id[0..2]}/{id[2..4]}/{id}`.
#[derive(Debug, Clone)]
pub struct CasStore {
    root: PathBuf,
}

impl CasStore {
    /// Open (without creating) a CAS store rooted at `root`.
    #[must_use]
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    fn blob_path(&self, id: &BlobId) -> PathBuf {
        let hex = id.as_hex();
        self.root.join(&hex[0..2]).join(&hex[2..4]).join(hex)
    }

    /// Store `data`, returning its ID. Idempotent: storing the same bytes
    /// twice is a no-op the second time.
    ///
    /// # Errors
    /// Returns [`Error::Io`] if the write or rename fails.
    pub fn store(&self, data: &[u8]) -> Result<BlobId> {
        let id = BlobId::from_data(data);
        let path = self.blob_path(&id);

        if path.exists() {
            return Ok(id);
        }

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| Error::io(e, parent, "create_dir_all"))?;
        }

        let tmp_path = path.with_extension("tmp");
        fs::write(&tmp_path, data).map_err(|e| Error::io(e, &tmp_path, "write"))?;
        fs::rename(&tmp_path, &path).map_err(|e| Error::io(e, &path, "rename"))?;

        Ok(id)
    }

    /// Load a blob by ID, reverifying its digest against the stored bytes.
    ///
    /// # Errors
    /// Returns [`Error::Io`] if the read fails, or [`Error::CacheCorrupt`]
    /// if the stored bytes no longer hash to `id`.
    pub fn load(&self, id: &BlobId) -> Result<Vec<u8>> {
        let path = self.blob_path(id);
        let data = fs::read(&path).map_err(|e| Error::io(e, &path, "read"))?;

        let recomputed = BlobId::from_data(&data);
        if &recomputed != id {
            return Err(Error::CacheCorrupt {
                fqn: String::new(),
                input_hash: id.as_hex().to_string(),
                reason: "stored blob content does not match its digest".to_string(),
            });
        }

        Ok(data)
    }

    /// Whether a blob with `id` is present.
    #[must_use]
    pub fn exists(&self, id: &BlobId) -> bool {
        self.blob_path(id).exists()
    }

    /// Delete a blob by ID. Returns `Ok(())` even if it was already absent.
    ///
    /// # Errors
    /// Returns [`Error::Io`] if deletion fails for a reason other than
    /// not-found.
    pub fn delete(&self, id: &BlobId) -> Result<()> {
        let path = self.blob_path(id);
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Error::io(e, &path, "remove_file")),
        }
    }
}

fn walk_two_level_hex_dirs(root: &Path) -> Vec<PathBuf> {
    let mut out = Vec::new();
    let Ok(level1) = fs::read_dir(root) else {
        return out;
    };
    for entry in level1.flatten() {
        let Ok(level2) = fs::read_dir(entry.path()) else {
            continue;
        };
        for inner in level2.flatten() {
            let Ok(files) = fs::read_dir(inner.path()) else {
                continue;
            };
            for file in files.flatten() {
                out.push(file.path());
            }
        }
    }
    out
}

impl CasStore {
    /// List every blob currently stored.
    #[must_use]
    pub fn list(&self) -> Vec<BlobId> {
        walk_two_level_hex_dirs(&self.root)
            .into_iter()
            .filter_map(|p| p.file_name().and_then(|n| n.to_str()).map(str::to_string))
            .filter_map(|name| BlobId::from_hex(&name).ok())
            .collect()
    }

    /// Total size in bytes of every stored blob.
    #[must_use]
    pub fn total_size(&self) -> u64 {
        walk_two_level_hex_dirs(&self.root)
            .into_iter()
            .filter_map(|p| fs::metadata(p).ok())
            .map(|m| m.len())
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_is_idempotent_and_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let store = CasStore::new(dir.path().to_path_buf());

        let id1 = store.store(b"hello world").unwrap();
        let id2 = store.store(b"hello world").unwrap();
        assert_eq!(id1, id2);
        assert_eq!(store.load(&id1).unwrap(), b"hello world");
    }

    #[test]
    fn blob_id_matches_known_sha256() {
        let id = BlobId::from_data(b"hello world");
        assert_eq!(
            id.as_hex(),
            "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9"
        );
    }

    #[test]
    fn load_detects_corruption() {
        let dir = tempfile::tempdir().unwrap();
        let store = CasStore::new(dir.path().to_path_buf());
        let id = store.store(b"original").unwrap();

        let hex = id.as_hex().to_string();
        let path = dir.path().join(&hex[0..2]).join(&hex[2..4]).join(&hex);
        std::fs::write(&path, b"tampered").unwrap();

        let err = store.load(&id).unwrap_err();
        assert!(matches!(err, Error::CacheCorrupt { .. }));
    }

    #[test]
    fn list_and_total_size_reflect_stored_blobs() {
        let dir = tempfile::tempdir().unwrap();
        let store = CasStore::new(dir.path().to_path_buf());
        store.store(b"one").unwrap();
        store.store(b"two-longer").unwrap();

        assert_eq!(store.list().len(), 2);
        assert_eq!(store.total_size(), 3 + 10);
    }
}
