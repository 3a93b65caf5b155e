//! Target selector parsing and matching.
//!
//! Four forms, per §6: `//pkg:name` (absolute), `:name` (package-relative,
//! resolved against the invoking package), `//pkg/...` (subtree, matches
//! every target whose package path starts with `pkg`), `label=foo` (label
//! match).

use kiln_spec::TargetSpec;

/// One parsed target selector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selector {
    /// `//pkg:name` — exactly one target.
    Absolute(String),
    /// `:name` — resolved against `current_package`.
    PackageRelative(String),
    /// `//pkg/...` — every target under `pkg` (inclusive).
    Subtree(String),
    /// `label=foo` — every target carrying label `foo`.
    Label(String),
}

/// Parse a selector string. Never fails: anything not matching a known
/// shape is treated as an absolute FQN, so a typo surfaces later as
/// "unresolved reference" rather than a selector-syntax error.
#[must_use]
pub fn parse(raw: &str) -> Selector {
    if let Some(label) = raw.strip_prefix("label=") {
        return Selector::Label(label.to_string());
    }
    if let Some(rest) = raw.strip_prefix("//") {
        if let Some(pkg) = rest.strip_suffix("/...") {
            return Selector::Subtree(pkg.to_string());
        }
        return Selector::Absolute(raw.to_string());
    }
    if let Some(name) = raw.strip_prefix(':') {
        return Selector::PackageRelative(name.to_string());
    }
    Selector::Absolute(raw.to_string())
}

/// Resolve one selector against the full set of declared specs, returning
/// the matching FQNs. Matching nothing is not an error here — callers
/// decide whether an empty match set is fatal.
#[must_use]
pub fn resolve<'a>(selector: &Selector, specs: &'a [TargetSpec], current_package: &str) -> Vec<&'a str> {
    match selector {
        Selector::Absolute(fqn) => specs
            .iter()
            .filter(|s| &s.fqn == fqn)
            .map(|s| s.fqn.as_str())
            .collect(),
        Selector::PackageRelative(name) => {
            let fqn = format!("//{current_package}:{name}");
            specs
                .iter()
                .filter(|s| s.fqn == fqn)
                .map(|s| s.fqn.as_str())
                .collect()
        }
        Selector::Subtree(pkg) => specs
            .iter()
            .filter(|s| {
                let p = s.package_path();
                p == pkg || p.starts_with(&format!("{pkg}/"))
            })
            .map(|s| s.fqn.as_str())
            .collect(),
        Selector::Label(label) => specs
            .iter()
            .filter(|s| s.labels.contains(label))
            .map(|s| s.fqn.as_str())
            .collect(),
    }
}

/// Turn an FQN into a filesystem-safe path component, matching the
/// convention `kiln-sandbox`'s `HostRunner` uses for its own sandbox and
/// log directories.
#[must_use]
pub fn sanitize_for_path(fqn: &str) -> String {
    fqn.chars().map(|c| if c.is_alphanumeric() { c } else { '_' }).collect()
}

/// Apply `--include`/`--exclude` label selectors to a candidate FQN set,
/// exclude winning over include per §6.
#[must_use]
pub fn apply_include_exclude(
    candidates: Vec<String>,
    specs: &[TargetSpec],
    include: &[String],
    exclude: &[String],
) -> Vec<String> {
    let exclude_fqns: std::collections::HashSet<&str> = exclude
        .iter()
        .map(|s| parse(s))
        .flat_map(|sel| resolve(&sel, specs, "").into_iter().collect::<Vec<_>>())
        .collect();

    let include_fqns: Option<std::collections::HashSet<&str>> = if include.is_empty() {
        None
    } else {
        Some(
            include
                .iter()
                .map(|s| parse(s))
                .flat_map(|sel| resolve(&sel, specs, "").into_iter().collect::<Vec<_>>())
                .collect(),
        )
    };

    candidates
        .into_iter()
        .filter(|fqn| !exclude_fqns.contains(fqn.as_str()))
        .filter(|fqn| include_fqns.as_ref().is_none_or(|set| set.contains(fqn.as_str())))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use kiln_spec::{CachePolicy, Deps, Executor, Recipe, SourceLocation};
    use std::collections::{BTreeMap, BTreeSet};

    fn spec(fqn: &str, labels: &[&str]) -> TargetSpec {
        TargetSpec {
            fqn: fqn.to_string(),
            recipe: Recipe::Group,
            executor: Executor::Bash,
            deps: Deps::default(),
            hash_deps: None,
            tools: vec![],
            outputs: BTreeMap::new(),
            cache: CachePolicy::default(),
            labels: labels.iter().map(|s| (*s).to_string()).collect(),
            env: BTreeMap::new(),
            pass_env: vec![],
            gen: false,
            source: SourceLocation::default(),
        }
    }

    #[test]
    fn parses_every_selector_shape() {
        assert_eq!(parse("//pkg:name"), Selector::Absolute("//pkg:name".into()));
        assert_eq!(parse(":name"), Selector::PackageRelative("name".into()));
        assert_eq!(parse("//pkg/..."), Selector::Subtree("pkg".into()));
        assert_eq!(parse("label=foo"), Selector::Label("foo".into()));
    }

    #[test]
    fn subtree_matches_the_package_and_its_children() {
        let specs = vec![spec("//a:x", &[]), spec("//a/b:y", &[]), spec("//c:z", &[])];
        let mut got = resolve(&Selector::Subtree("a".into()), &specs, "");
        got.sort_unstable();
        assert_eq!(got, vec!["//a:x", "//a/b:y"]);
    }

    #[test]
    fn exclude_wins_over_include() {
        let specs = vec![spec("//a:x", &["keep"]), spec("//a:y", &["keep"])];
        let candidates = vec!["//a:x".to_string(), "//a:y".to_string()];
        let filtered = apply_include_exclude(
            candidates,
            &specs,
            &["label=keep".to_string()],
            &["//a:y".to_string()],
        );
        assert_eq!(filtered, vec!["//a:x".to_string()]);
    }
}
