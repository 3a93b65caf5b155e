//! `hash_input`/`hash_output` operations.

use crate::envelope::{DigestEnvelope, dep_output_key, digest_envelope};
use crate::error::{Error, Result};
use kiln_spec::TargetSpec;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::path::Path;

/// Canonicalize `spec`, fold in dependency output hashes (already computed
/// by the caller, in `(dep FQN, output name)` order), input file digests,
/// tool resolutions, and produce the target's input hash.
///
/// `dep_output_hashes` is keyed by `dep_fqn -> (output_name -> hash)`; this
/// function flattens and orders it per the spec's rule before folding it
/// into the envelope.
///
/// # Errors
/// Returns [`Error::Configuration`] if the envelope cannot be canonicalized.
pub fn hash_input(
    spec: &TargetSpec,
    dep_output_hashes: &BTreeMap<String, BTreeMap<String, String>>,
    file_digests: &BTreeMap<String, String>,
    tool_resolutions: &BTreeMap<String, String>,
) -> Result<String> {
    let mut ordered: BTreeMap<String, String> = BTreeMap::new();
    let mut dep_fqns: Vec<&String> = dep_output_hashes.keys().collect();
    dep_fqns.sort();
    for dep_fqn in dep_fqns {
        let outputs = &dep_output_hashes[dep_fqn];
        let names = TargetSpec::sort_output_names(outputs.keys().cloned().collect());
        for name in names {
            let hash = &outputs[&name];
            ordered.insert(dep_output_key(dep_fqn, &name), hash.clone());
        }
    }

    let envelope = DigestEnvelope::new(spec, &ordered, file_digests, tool_resolutions);
    digest_envelope(&envelope)
}

/// Digest the file set for a completed named output, reading from the
/// on-disk staged files. `files` is `(root-relative path, absolute path)`
/// pairs; they are sorted by root-relative path before digesting so the
/// result is independent of directory-walk order.
///
/// # Errors
/// Returns [`Error::Io`] if a file cannot be read, or [`Error::MissingOutput`]
/// if `files` is empty (the output was declared but nothing staged).
pub fn hash_output(fqn: &str, output: &str, files: &[(String, std::path::PathBuf)]) -> Result<String> {
    if files.is_empty() {
        return Err(Error::MissingOutput {
            fqn: fqn.to_string(),
            output: output.to_string(),
        });
    }

    let mut sorted: Vec<&(String, std::path::PathBuf)> = files.iter().collect();
    sorted.sort_by(|a, b| a.0.cmp(&b.0));

    let mut hasher = Sha256::new();
    for (rel_path, abs_path) in sorted {
        hasher.update(rel_path.as_bytes());
        hasher.update([0u8]);
        let bytes = read_file(abs_path)?;
        hasher.update(&bytes);
    }
    Ok(hex::encode(hasher.finalize()))
}

fn read_file(path: &Path) -> Result<Vec<u8>> {
    std::fs::read(path).map_err(|source| Error::Io {
        source,
        path: Some(path.display().to_string()),
        operation: "read".to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use kiln_spec::{CachePolicy, Deps, Executor, Recipe, SourceLocation};
    use std::collections::BTreeSet;
    use std::io::Write;

    fn spec() -> TargetSpec {
        TargetSpec {
            fqn: "//pkg:build".into(),
            recipe: Recipe::Run(vec!["echo".into()]),
            executor: Executor::Bash,
            deps: Deps::default(),
            hash_deps: None,
            tools: vec![],
            outputs: BTreeMap::new(),
            cache: CachePolicy::default(),
            labels: BTreeSet::new(),
            env: BTreeMap::new(),
            pass_env: vec![],
            gen: false,
            source: SourceLocation::default(),
        }
    }

    #[test]
    fn dep_output_hash_ordering_does_not_depend_on_map_insertion() {
        let spec = spec();
        let mut a: BTreeMap<String, BTreeMap<String, String>> = BTreeMap::new();
        a.entry("//pkg:a".into())
            .or_default()
            .insert("out".into(), "h1".into());
        a.entry("//pkg:b".into())
            .or_default()
            .insert("out".into(), "h2".into());

        let mut b: BTreeMap<String, BTreeMap<String, String>> = BTreeMap::new();
        b.entry("//pkg:b".into())
            .or_default()
            .insert("out".into(), "h2".into());
        b.entry("//pkg:a".into())
            .or_default()
            .insert("out".into(), "h1".into());

        let empty = BTreeMap::new();
        let h1 = hash_input(&spec, &a, &empty, &empty).unwrap();
        let h2 = hash_input(&spec, &b, &empty, &empty).unwrap();
        assert_eq!(h1, h2);
    }

    #[test]
    fn hash_output_is_stable_across_file_order() {
        let dir = tempfile::tempdir().unwrap();
        let f1 = dir.path().join("a.txt");
        let f2 = dir.path().join("b.txt");
        std::fs::File::create(&f1).unwrap().write_all(b"one").unwrap();
        std::fs::File::create(&f2).unwrap().write_all(b"two").unwrap();

        let forward = vec![("a.txt".to_string(), f1.clone()), ("b.txt".to_string(), f2.clone())];
        let backward = vec![("b.txt".to_string(), f2), ("a.txt".to_string(), f1)];

        let h1 = hash_output("//pkg:build", "out", &forward).unwrap();
        let h2 = hash_output("//pkg:build", "out", &backward).unwrap();
        assert_eq!(h1, h2);
    }

    #[test]
    fn hash_output_with_no_files_is_missing_output() {
        let err = hash_output("//pkg:build", "out", &[]).unwrap_err();
        assert!(matches!(err, Error::MissingOutput { .. }));
    }
}
