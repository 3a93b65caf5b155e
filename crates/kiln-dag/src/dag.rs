//! The concrete target DAG: `Dag`, linked from a set of `TargetSpec`s.
//!
//! Modeled as a sequence of immutable snapshots: each generation pass
//! produces a new `Dag` rather than mutating the last one (§9 "Dynamic
//! graph growth"). A `Dag` exposes no mutation methods once built — only
//! [`Dag::link`] constructs one.

use crate::{Error, GraphNode, Result, TaskGraph, TaskNodeData};
use kiln_spec::TargetSpec;

impl TaskNodeData for TargetSpec {
    fn dependency_names(&self) -> impl Iterator<Item = &str> {
        self.deps.targets.iter().map(String::as_str)
    }
}

/// A linked, acyclic graph of targets. Vertices are `TargetSpec`s, edges are
/// dep/hash-dep relationships. Never mutated after [`Dag::link`] returns —
/// a subsequent generation pass builds an entirely new `Dag`.
pub struct Dag {
    graph: TaskGraph<TargetSpec>,
}

impl Dag {
    /// Link a set of target specs into a `Dag`: pass one binds every
    /// target-ref to a concrete target or fails with every unresolved
    /// reference at once; pass two inserts edges and checks acyclicity.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingDependencies`] if any target-ref is
    /// unresolved, or [`Error::CycleDetected`] if linking produces a cycle.
    pub fn link(specs: impl IntoIterator<Item = TargetSpec>) -> Result<Self> {
        let mut graph = TaskGraph::new();
        for spec in specs {
            graph.add_task(&spec.fqn.clone(), spec)?;
        }
        graph.add_dependency_edges()?;
        Ok(Self { graph })
    }

    /// Look up a linked target by FQN.
    #[must_use]
    pub fn get(&self, fqn: &str) -> Option<&TargetSpec> {
        self.graph.get_node_by_name(fqn).map(|n| &n.task)
    }

    /// Whether `fqn` is present in this DAG.
    #[must_use]
    pub fn contains(&self, fqn: &str) -> bool {
        self.graph.contains_task(fqn)
    }

    /// Number of targets linked into this DAG.
    #[must_use]
    pub fn len(&self) -> usize {
        self.graph.task_count()
    }

    /// Whether this DAG has no targets.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// FQNs of every target that transitively depends on `fqn`. Backs
    /// `query graph <fqn>`'s "what would rebuild" subgraph.
    #[must_use]
    pub fn ancestors(&self, fqn: &str) -> Vec<String> {
        self.graph.ancestors(fqn)
    }

    /// FQNs of `fqn`'s immediate parents (direct dependents).
    #[must_use]
    pub fn parents(&self, fqn: &str) -> Vec<String> {
        self.graph.parents(fqn)
    }

    /// FQNs of every target `fqn` transitively depends on.
    #[must_use]
    pub fn descendants(&self, fqn: &str) -> Vec<String> {
        self.graph.descendants(fqn)
    }

    /// Targets reachable from `fqn` (including `fqn`), in topological
    /// (build) order: a target's dependencies always precede it.
    ///
    /// # Errors
    ///
    /// Returns [`Error::CycleDetected`] — unreachable in practice, since a
    /// `Dag` is only ever constructed via `link`, which already checks
    /// acyclicity, but kept `Result` for API stability.
    pub fn build_order(&self, fqn: &str) -> Result<Vec<TargetSpec>> {
        let mut order = Vec::new();
        self.graph.walk_post_order(fqn, |node: &GraphNode<TargetSpec>| {
            order.push(node.task.clone());
        });
        Ok(order)
    }

    /// Targets at each dependency level, suitable for level-by-level
    /// scheduling of the whole linked set.
    ///
    /// # Errors
    ///
    /// Returns [`Error::CycleDetected`] if the graph is cyclic (should not
    /// happen for a `Dag` built via `link`).
    pub fn parallel_groups(&self) -> Result<Vec<Vec<TargetSpec>>> {
        Ok(self
            .graph
            .get_parallel_groups()?
            .into_iter()
            .map(|level| level.into_iter().map(|n| n.task).collect())
            .collect())
    }

    /// Iterate over every target in the DAG, in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = &TargetSpec> {
        self.graph.iter_nodes().map(|(_, node)| &node.task)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kiln_spec::{CachePolicy, Deps, Executor, Recipe, SourceLocation};
    use std::collections::{BTreeMap, BTreeSet};

    fn spec(fqn: &str, deps: &[&str]) -> TargetSpec {
        TargetSpec {
            fqn: fqn.to_string(),
            recipe: Recipe::Run(vec!["true".into()]),
            executor: Executor::Bash,
            deps: Deps {
                targets: deps.iter().map(|s| (*s).to_string()).collect(),
                files: vec![],
                exprs: vec![],
            },
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
    fn link_succeeds_for_acyclic_specs() {
        let dag = Dag::link(vec![
            spec("//pkg:a", &[]),
            spec("//pkg:b", &["//pkg:a"]),
        ])
        .unwrap();
        assert_eq!(dag.len(), 2);
        assert!(dag.contains("//pkg:a"));
    }

    #[test]
    fn link_reports_every_unresolved_reference_at_once() {
        let err = Dag::link(vec![
            spec("//pkg:a", &["//pkg:missing1"]),
            spec("//pkg:b", &["//pkg:missing2"]),
        ])
        .unwrap_err();
        match err {
            Error::MissingDependencies { missing } => assert_eq!(missing.len(), 2),
            other => panic!("expected MissingDependencies, got {other:?}"),
        }
    }

    #[test]
    fn link_rejects_cycles() {
        let err = Dag::link(vec![
            spec("//pkg:a", &["//pkg:b"]),
            spec("//pkg:b", &["//pkg:a"]),
        ])
        .unwrap_err();
        assert!(matches!(err, Error::CycleDetected { .. }));
    }

    #[test]
    fn ancestors_and_build_order_reflect_the_linked_graph() {
        let dag = Dag::link(vec![
            spec("//pkg:a", &[]),
            spec("//pkg:b", &["//pkg:a"]),
            spec("//pkg:c", &["//pkg:b"]),
        ])
        .unwrap();

        let mut ancestors = dag.ancestors("//pkg:a");
        ancestors.sort();
        assert_eq!(ancestors, vec!["//pkg:b", "//pkg:c"]);

        let order: Vec<String> = dag
            .build_order("//pkg:c")
            .unwrap()
            .into_iter()
            .map(|t| t.fqn)
            .collect();
        assert_eq!(order, vec!["//pkg:a", "//pkg:b", "//pkg:c"]);
    }
}
