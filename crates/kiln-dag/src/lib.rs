//! Target dependency graph algorithms for kiln.
//!
//! This crate provides a directed acyclic graph (DAG) implementation for
//! target dependency resolution and execution ordering using petgraph.
//! Targets are identified by their fully-qualified name (`//pkg:name`); a
//! "group" target may stand in for a set of other targets (the zero-output
//! pass-through target), and depending on a group expands to depending on
//! every target it groups.
//!
//! # Key Types
//!
//! - [`TaskGraph`]: The main graph structure for building and querying target dependencies
//! - [`TaskNodeData`]: Trait that target types must implement to be stored in the graph
//! - [`GraphNode`]: A node in the graph containing the target name and data
//!
//! # Example
//!
//! ```ignore
//! use kiln_dag::{TaskGraph, TaskNodeData};
//!
//! // Define a simple target type
//! struct MyTarget {
//!     depends_on: Vec<String>,
//! }
//!
//! impl TaskNodeData for MyTarget {
//!     fn dependency_names(&self) -> impl Iterator<Item = &str> {
//!         self.depends_on.iter().map(String::as_str)
//!     }
//! }
//!
//! // Build a graph
//! let mut graph = TaskGraph::new();
//! graph.add_task("build", MyTarget { depends_on: vec![] })?;
//! graph.add_task("test", MyTarget { depends_on: vec!["build".to_string()] })?;
//! graph.add_dependency_edges()?;
//!
//! // Get execution order
//! let sorted = graph.topological_sort()?;
//! ```

mod dag;
mod error;
mod graph;
mod traversal;
mod validation;

pub use dag::Dag;
pub use error::{Error, Result};
pub use graph::{GraphNode, TaskGraph};
pub use traversal::{ParallelGroups, TopologicalOrder};
pub use validation::ValidationResult;

/// Trait for target data that can be stored in the dependency graph.
///
/// Implement this trait for your target type to enable it to be stored
/// in a [`TaskGraph`] and participate in dependency resolution.
pub trait TaskNodeData: Clone {
    /// Returns the names of targets this target depends on.
    fn dependency_names(&self) -> impl Iterator<Item = &str>;

    /// Adds a dependency to this target.
    ///
    /// Default implementation panics. Override this method if mutation is needed
    /// (e.g., for applying group-level dependencies to member targets).
    ///
    /// # Panics
    ///
    /// Panics if not overridden - implement for target types that need mutable dependency addition.
    #[allow(clippy::unimplemented)]
    fn add_dependency(&mut self, _dep: String) {
        unreachable!("add_dependency not supported for this task type - override in impl")
    }
}
