//! Target graph DAG algorithms and relevance resolution for pipewright.
//!
//! This crate provides a directed acyclic graph (DAG) of build targets backed
//! by petgraph. It answers two questions for the rest of the workspace:
//!
//! - in which order may targets run (dependencies before dependents, ties
//!   broken by declaration order), and
//! - which targets are relevant to an invocation (the transitive dependency
//!   closure of the invoked targets plus anything they chain via `triggers`).
//!
//! # Key Types
//!
//! - [`TargetGraph`]: The graph structure for building and querying target dependencies
//! - [`TargetNodeData`]: Trait that target types must implement to be stored in the graph
//! - [`GraphNode`]: A node in the graph containing the target name and data
//!
//! # Example
//!
//! ```ignore
//! use pipewright_target_graph::{TargetGraph, TargetNodeData};
//!
//! #[derive(Clone)]
//! struct MyTarget {
//!     depends_on: Vec<String>,
//! }
//!
//! impl TargetNodeData for MyTarget {
//!     fn dependency_names(&self) -> impl Iterator<Item = &str> {
//!         self.depends_on.iter().map(String::as_str)
//!     }
//! }
//!
//! let graph = TargetGraph::from_targets([
//!     ("compile", MyTarget { depends_on: vec![] }),
//!     ("test", MyTarget { depends_on: vec!["compile".to_string()] }),
//! ])?;
//!
//! let relevant = graph.resolve(["test"])?;
//! ```

mod error;
mod graph;
mod resolver;
mod traversal;
mod validation;

pub use error::{Error, Result};
pub use graph::{EdgeKind, GraphNode, TargetGraph};
pub use traversal::TopologicalOrder;
pub use validation::ValidationResult;

/// Trait for target data that can be stored in the target graph.
///
/// Implement this trait for your target type to enable it to be stored
/// in a [`TargetGraph`] and participate in relevance resolution.
pub trait TargetNodeData: Clone {
    /// Returns the names of targets this target depends on, in declaration order.
    fn dependency_names(&self) -> impl Iterator<Item = &str>;

    /// Returns the names of targets chained after this one.
    ///
    /// A triggered target joins the relevant set whenever the triggering
    /// target is relevant, and is ordered after it.
    fn triggered_names(&self) -> impl Iterator<Item = &str> {
        std::iter::empty()
    }
}
