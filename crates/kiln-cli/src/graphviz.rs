//! `query graphdot` output: a Graphviz digraph of the linked target set.
//!
//! Styling matches `heph`'s `graphDotCmd`: left-to-right rank direction,
//! boxed nodes, a sans-serif label font at size 10.

use kiln_dag::Dag;
use std::fmt::Write as _;

/// Render `dag` as a Graphviz `digraph`, one node per non-group target and
/// one edge per declared dependency.
#[must_use]
pub fn render(dag: &Dag) -> String {
    let mut out = String::new();
    out.push_str("digraph kiln {\n");
    out.push_str("  rankdir=\"LR\";\n");
    out.push_str("  node [shape=box, fontname=\"Helvetica,Arial,sans-serif\", fontsize=10];\n");
    out.push_str("  edge [fontname=\"Helvetica,Arial,sans-serif\", fontsize=10];\n");

    let mut targets: Vec<_> = dag.iter().filter(|t| !t.is_group()).collect();
    targets.sort_by(|a, b| a.fqn.cmp(&b.fqn));

    for target in &targets {
        let _ = writeln!(out, "  {:?};", target.fqn);
        for dep in &target.deps.targets {
            if let Some(dep_spec) = dag.get(dep) {
                if dep_spec.is_group() {
                    for member in &dep_spec.deps.targets {
                        let _ = writeln!(out, "  {:?} -> {:?};", target.fqn, member);
                    }
                    continue;
                }
            }
            let _ = writeln!(out, "  {:?} -> {:?};", target.fqn, dep);
        }
    }

    out.push_str("}\n");
    out
}
