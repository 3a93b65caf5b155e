//! Deterministic tar construction: entries sorted by archive path, every
//! entry's mtime zeroed, so the same build output hashes identically
//! regardless of machine or wall-clock time.
//!
//! Grounded on `cuenv-release`'s `artifact.rs`: build a `tar::Header`
//! manually (`set_path`/`set_size`/`set_mode`/`set_cksum`), then
//! `Builder::append`, rather than `Builder::append_dir_all`, which here
//! would pull in real filesystem mtimes.

use crate::error::{Error, Result};
use std::fs::File;
use std::path::{Path, PathBuf};

/// Write a tar (uncompressed) at `dest` containing `files`, each a pair of
/// `(archive-relative path, source path on disk)`. Entries are written in
/// sorted archive-path order with mtime zeroed.
///
/// # Errors
/// Returns [`Error::Io`] if any source file can't be opened or the archive
/// can't be written.
pub fn write_deterministic_tar(dest: &Path, files: &[(String, PathBuf)]) -> Result<()> {
    let mut sorted: Vec<&(String, PathBuf)> = files.iter().collect();
    sorted.sort_by(|a, b| a.0.cmp(&b.0));

    let out = File::create(dest).map_err(|e| Error::io(e, dest, "create"))?;
    let mut builder = tar::Builder::new(out);

    for (archive_path, src_path) in sorted {
        let file = File::open(src_path).map_err(|e| Error::io(e, src_path, "open"))?;
        let metadata = file
            .metadata()
            .map_err(|e| Error::io(e, src_path, "metadata"))?;

        let mut header = tar::Header::new_gnu();
        header
            .set_path(archive_path)
            .map_err(|e| Error::io(e, dest, "set_path"))?;
        header.set_size(metadata.len());
        header.set_mode(0o644);
        header.set_mtime(0);
        header.set_cksum();

        builder
            .append(&header, &file)
            .map_err(|e| Error::io(e, dest, "append"))?;
    }

    builder.finish().map_err(|e| Error::io(e, dest, "finish"))?;
    Ok(())
}

/// Expand a tar written by [`write_deterministic_tar`] into `dest_dir`,
/// returning `(archive-relative path, absolute path)` for every entry,
/// sorted by archive path. `dest_dir` is created if absent.
///
/// # Errors
/// Returns [`Error::Io`] if `src` can't be read or an entry can't be
/// unpacked.
pub fn expand_tar(src: &Path, dest_dir: &Path) -> Result<Vec<(String, PathBuf)>> {
    std::fs::create_dir_all(dest_dir).map_err(|e| Error::io(e, dest_dir, "create_dir_all"))?;

    let file = File::open(src).map_err(|e| Error::io(e, src, "open"))?;
    let mut archive = tar::Archive::new(file);
    let mut out = Vec::new();

    for entry in archive.entries().map_err(|e| Error::io(e, src, "entries"))? {
        let mut entry = entry.map_err(|e| Error::io(e, src, "read entry"))?;
        let archive_path = entry
            .path()
            .map_err(|e| Error::io(e, src, "entry path"))?
            .to_string_lossy()
            .into_owned();
        let dest_path = dest_dir.join(&archive_path);
        if let Some(parent) = dest_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| Error::io(e, parent, "create_dir_all"))?;
        }
        entry.unpack(&dest_path).map_err(|e| Error::io(e, &dest_path, "unpack"))?;
        out.push((archive_path, dest_path));
    }

    out.sort_by(|a, b| a.0.cmp(&b.0));
    Ok(out)
}
