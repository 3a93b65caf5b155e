//! In-memory full-text target search.
//!
//! Matches `heph`'s `search.Search` shape: a query matches a target if it
//! fuzzy-matches (edit distance <= `max_distance`) or substring-matches any
//! of the target's indexed fields, results capped with a `+N more...`
//! summary when truncated. `TargetSpec` carries no doc-string field, so the
//! indexed fields are FQN, package path, target name, and labels (see
//! `DESIGN.md`).

use kiln_spec::TargetSpec;

const DEFAULT_MAX_DISTANCE: usize = 2;

/// One search hit: the matched FQN and which field matched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hit {
    /// FQN of the matching target.
    pub fqn: String,
    /// Which indexed field matched, for display (`"fqn"`, `"package"`,
    /// `"name"`, `"label"`).
    pub matched_field: &'static str,
}

/// The result of a search: the capped hit list plus how many more matched
/// beyond the cap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchResult {
    /// Hits, capped at the caller-supplied limit.
    pub hits: Vec<Hit>,
    /// How many additional matches were truncated, `0` if none.
    pub more: usize,
}

fn fields(spec: &TargetSpec) -> Vec<(&'static str, String)> {
    let mut fields = vec![
        ("fqn", spec.fqn.clone()),
        ("package", spec.package_path().to_string()),
        ("name", spec.name().to_string()),
    ];
    for label in &spec.labels {
        fields.push(("label", label.clone()));
    }
    fields
}

fn matches(query: &str, field: &str, max_distance: usize) -> bool {
    let query = query.to_lowercase();
    let field = field.to_lowercase();
    if field.contains(&query) {
        return true;
    }
    strsim::levenshtein(&query, &field) <= max_distance
}

/// Search `specs` for `query`, capping the result at `limit` hits.
///
/// `max_distance` is the fuzzy edit-distance threshold; `None` uses the
/// default of 2.
#[must_use]
pub fn search(specs: &[TargetSpec], query: &str, limit: usize, max_distance: Option<usize>) -> SearchResult {
    let max_distance = max_distance.unwrap_or(DEFAULT_MAX_DISTANCE);
    let mut hits = Vec::new();

    for spec in specs {
        for (field_name, value) in fields(spec) {
            if matches(query, &value, max_distance) {
                hits.push(Hit {
                    fqn: spec.fqn.clone(),
                    matched_field: field_name,
                });
                break;
            }
        }
    }

    hits.sort_by(|a, b| a.fqn.cmp(&b.fqn));
    let more = hits.len().saturating_sub(limit);
    hits.truncate(limit);
    SearchResult { hits, more }
}
