//! Target graph builder using petgraph.
//!
//! Builds directed acyclic graphs (DAGs) from target definitions, in two
//! passes: bind every declared dependency name to a node (or collect every
//! unresolved reference before failing), then insert edges and check
//! acyclicity. Grounded on `cuenv-task-graph`'s `TaskGraph<T>`:
//! `petgraph::graph::DiGraph` as the backing store, a
//! `HashMap<String, NodeIndex>` name index, and
//! `petgraph::algo::{is_cyclic_directed, toposort}` for cycle checks and
//! topological ordering.

use crate::{Error, Result, TaskNodeData};
use petgraph::Direction;
use petgraph::algo::{is_cyclic_directed, toposort};
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::IntoNodeReferences;
use std::collections::{HashMap, HashSet};
use tracing::debug;

/// A node in the target graph.
#[derive(Debug, Clone)]
pub struct GraphNode<T> {
    /// Name (FQN) of the target.
    pub name: String,
    /// The target's data.
    pub task: T,
}

/// Target graph for dependency resolution and execution ordering.
///
/// Generic over any type implementing [`TaskNodeData`]. Once constructed,
/// the graph is immutable for the lifetime of a generation pass: a new gen
/// pass produces a fresh `TaskGraph`, it never mutates an existing one in
/// place.
pub struct TaskGraph<T: TaskNodeData> {
    graph: DiGraph<GraphNode<T>, ()>,
    name_to_node: HashMap<String, NodeIndex>,
}

impl<T: TaskNodeData> TaskGraph<T> {
    /// Create a new empty target graph.
    #[must_use]
    pub fn new() -> Self {
        Self {
            graph: DiGraph::new(),
            name_to_node: HashMap::new(),
        }
    }

    /// Add a single target to the graph.
    ///
    /// If a target with the same name already exists, returns the existing
    /// node index.
    ///
    /// # Errors
    ///
    /// Currently infallible, but returns `Result` for API consistency.
    pub fn add_task(&mut self, name: &str, task: T) -> Result<NodeIndex> {
        if let Some(&node) = self.name_to_node.get(name) {
            return Ok(node);
        }

        let node = GraphNode {
            name: name.to_string(),
            task,
        };

        let node_index = self.graph.add_node(node);
        self.name_to_node.insert(name.to_string(), node_index);
        debug!("added target node '{}'", name);

        Ok(node_index)
    }

    /// Get a mutable reference to a target node by index.
    pub fn get_node_mut(&mut self, index: NodeIndex) -> Option<&mut GraphNode<T>> {
        self.graph.node_weight_mut(index)
    }

    /// Get a reference to a target node by name.
    #[must_use]
    pub fn get_node_by_name(&self, name: &str) -> Option<&GraphNode<T>> {
        self.name_to_node
            .get(name)
            .and_then(|&idx| self.graph.node_weight(idx))
    }

    /// Pass one of linking: verify that every declared dependency name
    /// refers to a target already added to the graph. Collects every
    /// unresolved reference before failing, so a single link pass reports
    /// all of them rather than just the first.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingDependencies`] listing every `(target,
    /// unresolved reference)` pair found.
    pub fn bind_target_refs(&self) -> Result<()> {
        let mut missing = Vec::new();
        for (_, node) in self.graph.node_references() {
            for dep_name in node.task.dependency_names() {
                if !self.name_to_node.contains_key(dep_name) {
                    missing.push((node.name.clone(), dep_name.to_string()));
                }
            }
        }
        if missing.is_empty() {
            Ok(())
        } else {
            Err(Error::MissingDependencies { missing })
        }
    }

    /// Pass two of linking: insert an edge for every target-ref, then check
    /// acyclicity. Callers must run [`Self::bind_target_refs`] first (or
    /// accept that this will fail the same way, less precisely — it panics
    /// on no such node only because binding didn't happen first).
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingDependencies`] if any reference is still
    /// unresolved, or [`Error::CycleDetected`] if inserting every edge
    /// produces a cycle.
    pub fn add_dependency_edges(&mut self) -> Result<()> {
        self.bind_target_refs()?;

        let mut edges_to_add = Vec::new();
        for (node_index, node) in self.graph.node_references() {
            for dep_name in node.task.dependency_names() {
                let dep_node_index = self.name_to_node[dep_name];
                edges_to_add.push((dep_node_index, node_index));
            }
        }

        for (from, to) in edges_to_add {
            self.graph.add_edge(from, to, ());
        }

        if self.has_cycles() {
            return Err(Error::CycleDetected {
                message: "target dependency graph contains a cycle after linking".to_string(),
            });
        }

        Ok(())
    }

    /// Add a direct edge between two targets, bypassing name-based linking.
    pub fn add_edge(&mut self, from: NodeIndex, to: NodeIndex) {
        self.graph.add_edge(from, to, ());
    }

    /// Check if the graph has cycles.
    #[must_use]
    pub fn has_cycles(&self) -> bool {
        is_cyclic_directed(&self.graph)
    }

    /// Get topologically sorted list of targets.
    ///
    /// # Errors
    ///
    /// Returns an error if the graph contains cycles.
    pub fn topological_sort(&self) -> Result<Vec<GraphNode<T>>> {
        if self.has_cycles() {
            return Err(Error::CycleDetected {
                message: "target dependency graph contains cycles".to_string(),
            });
        }

        match toposort(&self.graph, None) {
            Ok(sorted_indices) => Ok(sorted_indices
                .into_iter()
                .map(|idx| self.graph[idx].clone())
                .collect()),
            Err(_) => Err(Error::TopologicalSortFailed {
                reason: "petgraph toposort failed".to_string(),
            }),
        }
    }

    /// Get all targets that can run in parallel (no dependencies between
    /// them). Returns groups ordered by dependency level.
    ///
    /// # Errors
    ///
    /// Returns an error if the graph contains cycles.
    pub fn get_parallel_groups(&self) -> Result<Vec<Vec<GraphNode<T>>>> {
        let sorted = self.topological_sort()?;

        if sorted.is_empty() {
            return Ok(vec![]);
        }

        let mut groups: Vec<Vec<GraphNode<T>>> = vec![];
        let mut processed: HashMap<String, usize> = HashMap::new();

        for task in sorted {
            let mut level = 0;
            for dep in task.task.dependency_names() {
                if let Some(&dep_level) = processed.get(dep) {
                    level = level.max(dep_level + 1);
                }
            }

            if level >= groups.len() {
                groups.resize(level + 1, vec![]);
            }
            groups[level].push(task.clone());
            processed.insert(task.name.clone(), level);
        }

        Ok(groups)
    }

    /// Number of targets in the graph.
    #[must_use]
    pub fn task_count(&self) -> usize {
        self.graph.node_count()
    }

    /// Check if a target exists in the graph.
    #[must_use]
    pub fn contains_task(&self, name: &str) -> bool {
        self.name_to_node.contains_key(name)
    }

    /// Get the node index for a target by name.
    #[must_use]
    pub fn get_node_index(&self, name: &str) -> Option<NodeIndex> {
        self.name_to_node.get(name).copied()
    }

    /// Iterate over all nodes in the graph.
    pub fn iter_nodes(&self) -> impl Iterator<Item = (NodeIndex, &GraphNode<T>)> {
        self.graph.node_references()
    }

    /// Build a graph for a specific target and all its transitive
    /// dependencies, then link it (bind refs, insert edges, check
    /// acyclicity).
    ///
    /// # Errors
    ///
    /// Returns an error if dependencies cannot be resolved or linking finds
    /// a cycle.
    pub fn build_for_task<F>(&mut self, task_name: &str, mut get_task: F) -> Result<()>
    where
        F: FnMut(&str) -> Option<T>,
    {
        let mut to_process = vec![task_name.to_string()];
        let mut processed = HashSet::new();

        debug!("building graph for '{}'", task_name);

        while let Some(current_name) = to_process.pop() {
            if processed.contains(&current_name) {
                continue;
            }
            processed.insert(current_name.clone());

            if let Some(task) = get_task(&current_name) {
                let deps: Vec<String> = task.dependency_names().map(String::from).collect();

                self.add_task(&current_name, task)?;

                for dep in deps {
                    if !processed.contains(&dep) {
                        to_process.push(dep);
                    }
                }
            } else {
                debug!("target '{}' not found while building graph", current_name);
            }
        }

        self.add_dependency_edges()?;

        Ok(())
    }

    /// Names of every ancestor of `name` (targets that transitively depend
    /// on it), not including `name` itself. Used by `query graph` to return
    /// the subgraph of things affected by a target.
    #[must_use]
    pub fn ancestors(&self, name: &str) -> Vec<String> {
        self.reachable(name, Direction::Incoming)
    }

    /// Names of every immediate parent of `name` (targets with a direct
    /// edge to it).
    #[must_use]
    pub fn parents(&self, name: &str) -> Vec<String> {
        let Some(&idx) = self.name_to_node.get(name) else {
            return Vec::new();
        };
        self.graph
            .neighbors_directed(idx, Direction::Incoming)
            .map(|n| self.graph[n].name.clone())
            .collect()
    }

    /// Names of every descendant of `name` (its transitive dependencies),
    /// not including `name` itself.
    #[must_use]
    pub fn descendants(&self, name: &str) -> Vec<String> {
        self.reachable(name, Direction::Outgoing)
    }

    fn reachable(&self, name: &str, direction: Direction) -> Vec<String> {
        let Some(&start) = self.name_to_node.get(name) else {
            return Vec::new();
        };
        let mut seen = HashSet::new();
        let mut stack = vec![start];
        let mut out = Vec::new();
        while let Some(idx) = stack.pop() {
            for next in self.graph.neighbors_directed(idx, direction) {
                if seen.insert(next) {
                    out.push(self.graph[next].name.clone());
                    stack.push(next);
                }
            }
        }
        out
    }

    /// Walk the graph in post-order (every descendant visited before the
    /// vertex itself), invoking `visit` once per node reachable from `name`
    /// — including `name`.
    pub fn walk_post_order(&self, name: &str, mut visit: impl FnMut(&GraphNode<T>)) {
        let Some(&start) = self.name_to_node.get(name) else {
            return;
        };
        let mut visited = HashSet::new();
        self.post_order_visit(start, &mut visited, &mut visit);
    }

    fn post_order_visit(
        &self,
        idx: NodeIndex,
        visited: &mut HashSet<NodeIndex>,
        visit: &mut impl FnMut(&GraphNode<T>),
    ) {
        if !visited.insert(idx) {
            return;
        }
        for dep in self.graph.neighbors_directed(idx, Direction::Outgoing) {
            self.post_order_visit(dep, visited, visit);
        }
        visit(&self.graph[idx]);
    }

    /// Walk every node in the graph in post-order (roots last), useful for
    /// scheduling the whole graph rather than a single target's closure.
    pub fn walk_all_post_order(&self, mut visit: impl FnMut(&GraphNode<T>)) {
        let mut visited = HashSet::new();
        let roots: Vec<NodeIndex> = self.graph.node_indices().collect();
        for idx in roots {
            self.post_order_visit(idx, &mut visited, &mut visit);
        }
    }
}

impl<T: TaskNodeData> Default for TaskGraph<T> {
    fn default() -> Self {
        Self::new()
    }
}
