//! `TargetSpec` and `Target`: the declared and linked forms of a build unit.

use std::collections::{BTreeMap, BTreeSet};
use serde::{Deserialize, Serialize};

/// How a target's recipe is executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Executor {
    /// Run the recipe through a shell.
    Bash,
    /// Exec the recipe's argv directly, no shell.
    Exec,
}

/// A target's run recipe, including the sentinel non-executing recipes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Recipe {
    /// Run this argv vector under the target's executor.
    Run(Vec<String>),
    /// A transparent alias for its deps' outputs; never executes.
    Group,
    /// A host tool resolution; never executes a recipe of its own.
    Tool,
    /// Emits `content` verbatim as its single declared output.
    TextFile(String),
}

impl Recipe {
    /// Whether this recipe kind actually runs a process.
    #[must_use]
    pub fn is_executable(&self) -> bool {
        matches!(self, Self::Run(_))
    }
}

/// Where a target was declared, for diagnostics. Not part of cache-key or
/// structural-equality comparisons.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SourceLocation {
    /// Build definition file the target was declared in.
    pub file: String,
    /// Line number within that file, if known.
    pub line: Option<u32>,
}

impl PartialEq for SourceLocation {
    fn eq(&self, _other: &Self) -> bool {
        // Provenance is transient; two specs differing only in where they
        // were declared are still structurally equal.
        true
    }
}
impl Eq for SourceLocation {}

/// Named sets of dependency references a target declares.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Deps {
    /// References to other targets, by selector string (resolved during linking).
    pub targets: Vec<String>,
    /// References to plain files, relative to the owning package.
    pub files: Vec<String>,
    /// Deferred expressions evaluated at link time, contributing whatever
    /// files or targets they resolve to. Opaque to `kiln-spec` itself;
    /// carried through to the input hash so a change in what an expression
    /// resolves to still invalidates the cache key.
    #[serde(default)]
    pub exprs: Vec<String>,
}

/// Cache policy for a target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachePolicy {
    /// Whether caching is enabled for this target at all.
    pub enabled: bool,
    /// Named outputs eligible for caching. Empty means "all declared outputs".
    pub allowed_outputs: BTreeSet<String>,
    /// Number of historical entries to retain locally.
    pub history: u32,
}

impl Default for CachePolicy {
    fn default() -> Self {
        Self {
            enabled: true,
            allowed_outputs: BTreeSet::new(),
            history: 1,
        }
    }
}

/// A host tool, target tool, or deferred-expression tool a target needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ToolRef {
    /// A FQN of another target that produces a tool binary.
    Target(String),
    /// A host binary resolved from `PATH` by name.
    Host(String),
    /// An expression evaluated at link time (e.g. a version-pinned lookup).
    Expr(String),
}

/// The immutable, serializable declaration of a build unit.
///
/// `PartialEq` is hand-written rather than derived: `source` is provenance
/// and ignored, while `labels`/`env` already live in order-insensitive
/// collections so they compare as sets.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetSpec {
    /// Fully-qualified name: `//pkg/path:name`.
    pub fqn: String,
    /// The run recipe, or a sentinel recipe.
    pub recipe: Recipe,
    /// How `recipe` is executed, when it is executable.
    pub executor: Executor,
    /// Declared dependency sets.
    pub deps: Deps,
    /// Optional override of which inputs feed the input hash.
    pub hash_deps: Option<Vec<String>>,
    /// Tools required to run the recipe.
    pub tools: Vec<ToolRef>,
    /// Named output file patterns.
    pub outputs: BTreeMap<String, Vec<String>>,
    /// Cache policy.
    pub cache: CachePolicy,
    /// Free-form labels, used by selectors and `--include`/`--exclude`.
    pub labels: BTreeSet<String>,
    /// Environment variables set for the recipe.
    pub env: BTreeMap<String, String>,
    /// Names of environment variables passed through from the invoking shell.
    pub pass_env: Vec<String>,
    /// Whether this target's outputs are themselves build definitions.
    pub gen: bool,
    /// Where this target was declared. Ignored for equality/hashing.
    pub source: SourceLocation,
}

impl TargetSpec {
    /// Package path portion of the FQN (`//pkg/path:name` -> `pkg/path`).
    #[must_use]
    pub fn package_path(&self) -> &str {
        self.fqn
            .strip_prefix("//")
            .and_then(|rest| rest.split(':').next())
            .unwrap_or_default()
    }

    /// Name portion of the FQN (`//pkg/path:name` -> `name`).
    #[must_use]
    pub fn name(&self) -> &str {
        self.fqn.rsplit(':').next().unwrap_or_default()
    }

    /// Whether this is a transparent group target.
    #[must_use]
    pub fn is_group(&self) -> bool {
        matches!(self.recipe, Recipe::Group)
    }

    /// Sorted dependency output hash input, `@support_files` first, then
    /// remaining names in natural lexicographic order. Only orders names;
    /// callers supply the values to order.
    #[must_use]
    pub fn sort_output_names(mut names: Vec<String>) -> Vec<String> {
        names.sort_by(|a, b| match (a.as_str(), b.as_str()) {
            ("@support_files", "@support_files") => std::cmp::Ordering::Equal,
            ("@support_files", _) => std::cmp::Ordering::Less,
            (_, "@support_files") => std::cmp::Ordering::Greater,
            _ => a.cmp(b),
        });
        names
    }
}

impl PartialEq for TargetSpec {
    fn eq(&self, other: &Self) -> bool {
        self.fqn == other.fqn
            && self.recipe == other.recipe
            && self.executor == other.executor
            && self.deps == other.deps
            && self.hash_deps == other.hash_deps
            && self.tools == other.tools
            && self.outputs == other.outputs
            && self.cache == other.cache
            && self.labels == other.labels
            && self.env == other.env
            && self.pass_env.iter().collect::<BTreeSet<_>>()
                == other.pass_env.iter().collect::<BTreeSet<_>>()
            && self.gen == other.gen
        // self.source is intentionally excluded: provenance is transient.
    }
}
impl Eq for TargetSpec {}

/// A resolved spec after linking: its dependencies are now pointers rather
/// than unresolved selector strings.
#[derive(Debug, Clone)]
pub struct Target {
    /// The declared spec this target was linked from.
    pub spec: TargetSpec,
    /// FQNs of dependency targets, in declaration order.
    pub dep_fqns: Vec<String>,
    /// Resolved input files after glob/selector expansion, sorted.
    pub actual_inputs: Vec<String>,
    /// Resolved output files per declared output name, sorted.
    pub actual_outputs: BTreeMap<String, Vec<String>>,
    /// Transitive environment: base + declared env + pass-env + deps' env.
    pub transitive_env: BTreeMap<String, String>,
}

impl Target {
    /// FQN of the underlying spec.
    #[must_use]
    pub fn fqn(&self) -> &str {
        &self.spec.fqn
    }
}
