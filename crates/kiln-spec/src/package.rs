//! `Package`: a namespace owning a set of target specs.

use crate::target::TargetSpec;
use std::collections::BTreeMap;

/// A namespace identified by a path relative to the repo root, owning a set
/// of target specs.
///
/// A package's transient script-evaluation state (not modeled here — that
/// belongs to the build-definition evaluator) is released once the final
/// gen pass completes; the package itself, and its targets, outlive that.
#[derive(Debug, Clone, Default)]
pub struct Package {
    /// Path relative to the repo root, e.g. `services/api`.
    pub path: String,
    /// Targets declared in this package, keyed by local name.
    targets: BTreeMap<String, TargetSpec>,
}

impl Package {
    /// Create an empty package at `path`.
    #[must_use]
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            targets: BTreeMap::new(),
        }
    }

    /// Declare a target in this package.
    ///
    /// Returns the previous spec at this name, if any, so the caller (the
    /// scheduler's gen-pass machinery) can apply the *conflicting target
    /// redefinition* check.
    pub fn declare(&mut self, spec: TargetSpec) -> Option<TargetSpec> {
        self.targets.insert(spec.name().to_string(), spec)
    }

    /// Look up a target by local name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&TargetSpec> {
        self.targets.get(name)
    }

    /// Iterate over all target specs in this package.
    pub fn iter(&self) -> impl Iterator<Item = &TargetSpec> {
        self.targets.values()
    }

    /// Number of targets declared in this package.
    #[must_use]
    pub fn len(&self) -> usize {
        self.targets.len()
    }

    /// Whether this package has no targets.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }
}
