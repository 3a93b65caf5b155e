//! Resolving the `file_digests`/`tool_resolutions` maps `hash_input` folds
//! into a target's input hash, and the `hash_deps` override that decides
//! which declared files are tracked in the first place.

use crate::error::{Error, Result};
use kiln_spec::{TargetSpec, ToolRef};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::path::Path;

/// The file list that actually feeds a target's input hash: `hash_deps`
/// when set overrides the tracked set entirely; otherwise every file in
/// `deps.files` is tracked.
#[must_use]
pub fn effective_hash_deps(spec: &TargetSpec) -> &[String] {
    spec.hash_deps.as_deref().unwrap_or(&spec.deps.files)
}

/// Digest each file in `files`, resolved relative to `package_root`, keyed
/// by the path as declared so the hash changes whenever any tracked file's
/// content does.
///
/// # Errors
/// Returns [`Error::Io`] if a declared file can't be read.
pub fn digest_input_files(package_root: &Path, files: &[String]) -> Result<BTreeMap<String, String>> {
    let mut out = BTreeMap::new();
    for rel in files {
        let path = package_root.join(rel);
        let bytes = std::fs::read(&path).map_err(|source| Error::Io {
            source,
            path: Some(path.display().to_string()),
            operation: "read".to_string(),
        })?;
        out.insert(rel.clone(), hex::encode(Sha256::digest(&bytes)));
    }
    Ok(out)
}

/// Resolve each tool reference to a value fed into the input hash: a
/// target tool resolves to a digest of its already-computed output hashes
/// (`dep_output_hashes`), a host tool resolves to its `PATH` location via
/// `which` (so a different toolchain on `PATH` invalidates the cache), and
/// a deferred expression is carried through as its own source text --
/// `kiln-hash` doesn't evaluate expressions, linking already has.
#[must_use]
pub fn resolve_tools(
    tools: &[ToolRef],
    dep_output_hashes: &BTreeMap<String, BTreeMap<String, String>>,
) -> BTreeMap<String, String> {
    let mut out = BTreeMap::new();
    for tool in tools {
        match tool {
            ToolRef::Target(fqn) => {
                out.insert(format!("target:{fqn}"), digest_outputs(dep_output_hashes.get(fqn)));
            }
            ToolRef::Host(name) => {
                let resolved = which::which(name)
                    .map(|p| p.display().to_string())
                    .unwrap_or_else(|_| "unresolved".to_string());
                out.insert(format!("host:{name}"), resolved);
            }
            ToolRef::Expr(expr) => {
                out.insert(format!("expr:{expr}"), expr.clone());
            }
        }
    }
    out
}

fn digest_outputs(outputs: Option<&BTreeMap<String, String>>) -> String {
    let Some(outputs) = outputs else {
        return "unresolved".to_string();
    };
    let mut hasher = Sha256::new();
    for name in TargetSpec::sort_output_names(outputs.keys().cloned().collect()) {
        hasher.update(name.as_bytes());
        hasher.update([0u8]);
        hasher.update(outputs[&name].as_bytes());
    }
    hex::encode(hasher.finalize())
}
