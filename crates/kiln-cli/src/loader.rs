//! Loads declared target specs from the build-definition front end.
//!
//! The front end itself (parser/evaluator for a scripted build-definition
//! language) is an explicit external collaborator, not part of this core:
//! it hands the engine a flat set of [`TargetSpec`] values and nothing
//! more. This module is that narrow interface's consumer side — reading a
//! JSON document (a single `TargetSpec`, or an array of them) from a file
//! or a directory of `*.kiln.json` files.

use crate::error::{CliError, Result};
use kiln_spec::TargetSpec;
use std::path::Path;

/// Load every target spec declared under `path`: a single JSON file (one
/// spec or an array of specs), or a directory walked for `*.kiln.json`
/// files.
///
/// # Errors
/// Returns [`CliError::Usage`] if `path` doesn't exist or a file's
/// contents aren't valid spec JSON.
pub fn load(path: &Path) -> Result<Vec<TargetSpec>> {
    if path.is_dir() {
        let mut specs = Vec::new();
        for entry in walk_kiln_json(path)? {
            specs.extend(load_file(&entry)?);
        }
        Ok(specs)
    } else {
        load_file(path)
    }
}

fn walk_kiln_json(dir: &Path) -> Result<Vec<std::path::PathBuf>> {
    let mut found = Vec::new();
    let mut stack = vec![dir.to_path_buf()];
    while let Some(current) = stack.pop() {
        let entries = std::fs::read_dir(&current)?;
        for entry in entries {
            let entry = entry?;
            let path = entry.path();
            if path.is_dir() {
                stack.push(path);
            } else if path.to_string_lossy().ends_with(".kiln.json") {
                found.push(path);
            }
        }
    }
    found.sort();
    Ok(found)
}

fn load_file(path: &Path) -> Result<Vec<TargetSpec>> {
    let bytes = std::fs::read(path).map_err(CliError::Io)?;
    parse_specs(&bytes).map_err(|e| {
        CliError::usage(
            format!("{}: {e}", path.display()),
            "expected a JSON target spec or an array of target specs",
        )
    })
}

fn parse_specs(bytes: &[u8]) -> serde_json::Result<Vec<TargetSpec>> {
    if let Ok(one) = serde_json::from_slice::<TargetSpec>(bytes) {
        return Ok(vec![one]);
    }
    serde_json::from_slice::<Vec<TargetSpec>>(bytes)
}
