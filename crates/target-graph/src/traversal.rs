//! Traversal types for target graphs.

use crate::GraphNode;

/// A topologically sorted sequence of target nodes.
///
/// All dependencies come before the targets that depend on them; targets
/// with no ordering constraint between them keep their declaration order.
pub type TopologicalOrder<T> = Vec<GraphNode<T>>;
