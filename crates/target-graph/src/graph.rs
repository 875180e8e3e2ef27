//! Target graph builder using petgraph.
//!
//! This module builds directed acyclic graphs (DAGs) from target declarations
//! to handle dependencies and determine execution order.

use crate::{Error, Result, TargetNodeData, TopologicalOrder};
use petgraph::Direction;
use petgraph::algo::{is_cyclic_directed, tarjan_scc};
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::{EdgeRef, IntoNodeReferences};
use std::collections::{BTreeSet, HashMap, HashSet};
use tracing::debug;

/// A node in the target graph.
#[derive(Debug, Clone)]
pub struct GraphNode<T> {
    /// Name of the target.
    pub name: String,
    /// The target data.
    pub target: T,
}

/// Why an edge exists between two targets.
///
/// Both kinds order the source before the destination. Only
/// [`EdgeKind::DependsOn`] pulls the source into the relevant set of the
/// destination; [`EdgeKind::Triggers`] pulls the destination in after the
/// source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeKind {
    /// Destination depends on source.
    DependsOn,
    /// Source triggers destination.
    Triggers,
}

/// Target graph for dependency resolution and execution ordering.
///
/// Node indices follow declaration order, which is what ties are broken by
/// when more than one target is ready to run.
#[derive(Debug)]
pub struct TargetGraph<T: TargetNodeData> {
    /// The directed graph of targets. Edges point from prerequisite to dependent.
    graph: DiGraph<GraphNode<T>, EdgeKind>,
    /// Map from target names to node indices.
    name_to_node: HashMap<String, NodeIndex>,
}

impl<T: TargetNodeData> TargetGraph<T> {
    /// Create a new empty target graph.
    #[must_use]
    pub fn new() -> Self {
        Self {
            graph: DiGraph::new(),
            name_to_node: HashMap::new(),
        }
    }

    /// Build a complete graph from declared targets.
    ///
    /// Targets are added in iteration order (which becomes the tie-break
    /// order), edges are wired, and the result is checked for cycles.
    ///
    /// # Errors
    ///
    /// Returns an error on duplicate names, missing dependencies, or cycles.
    pub fn from_targets<I, S>(targets: I) -> Result<Self>
    where
        I: IntoIterator<Item = (S, T)>,
        S: AsRef<str>,
    {
        let mut graph = Self::new();
        for (name, target) in targets {
            graph.add_target(name.as_ref(), target)?;
        }
        graph.add_dependency_edges()?;
        graph.ensure_acyclic()?;

        debug!(
            targets = graph.target_count(),
            edges = graph.graph.edge_count(),
            "Built target graph"
        );
        Ok(graph)
    }

    /// Add a single target to the graph.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DuplicateTarget`] if a target with the same name exists.
    pub fn add_target(&mut self, name: &str, target: T) -> Result<NodeIndex> {
        if self.name_to_node.contains_key(name) {
            return Err(Error::DuplicateTarget {
                name: name.to_string(),
            });
        }

        let node = GraphNode {
            name: name.to_string(),
            target,
        };

        let node_index = self.graph.add_node(node);
        self.name_to_node.insert(name.to_string(), node_index);
        debug!("Added target node '{}'", name);

        Ok(node_index)
    }

    /// Add dependency and trigger edges after all targets have been added.
    ///
    /// # Errors
    ///
    /// Returns an error if any target depends on or triggers a non-existent target.
    pub fn add_dependency_edges(&mut self) -> Result<()> {
        let mut missing = Vec::new();
        let mut edges_to_add = Vec::new();

        for (node_index, node) in self.graph.node_references() {
            for dep_name in node.target.dependency_names() {
                match self.name_to_node.get(dep_name) {
                    Some(&dep_index) => {
                        edges_to_add.push((dep_index, node_index, EdgeKind::DependsOn));
                    }
                    None => missing.push((node.name.clone(), dep_name.to_string())),
                }
            }
            for triggered in node.target.triggered_names() {
                match self.name_to_node.get(triggered) {
                    Some(&triggered_index) => {
                        edges_to_add.push((node_index, triggered_index, EdgeKind::Triggers));
                    }
                    None => missing.push((node.name.clone(), triggered.to_string())),
                }
            }
        }

        if missing.len() == 1
            && let Some((target, dependency)) = missing.pop()
        {
            return Err(Error::MissingDependency { target, dependency });
        }
        if !missing.is_empty() {
            return Err(Error::MissingDependencies { missing });
        }

        for (from, to, kind) in edges_to_add {
            let exists = self
                .graph
                .edges_connecting(from, to)
                .any(|edge| *edge.weight() == kind);
            if !exists {
                self.graph.add_edge(from, to, kind);
            }
        }

        Ok(())
    }

    /// Check if the graph has cycles.
    #[must_use]
    pub fn has_cycles(&self) -> bool {
        is_cyclic_directed(&self.graph)
    }

    /// Names of the targets forming the first cycle found, in declaration order.
    ///
    /// Empty when the graph is acyclic.
    #[must_use]
    pub fn cycle_members(&self) -> Vec<String> {
        let cyclic = tarjan_scc(&self.graph).into_iter().find(|component| {
            component.len() > 1
                || component
                    .first()
                    .is_some_and(|&node| self.graph.contains_edge(node, node))
        });

        let mut members = cyclic.unwrap_or_default();
        members.sort_unstable();
        members
            .into_iter()
            .map(|index| self.graph[index].name.clone())
            .collect()
    }

    fn ensure_acyclic(&self) -> Result<()> {
        if self.has_cycles() {
            return Err(Error::CycleDetected {
                targets: self.cycle_members(),
            });
        }
        Ok(())
    }

    /// Get all targets in topological order.
    ///
    /// # Errors
    ///
    /// Returns an error if the graph contains cycles.
    pub fn topological_sort(&self) -> Result<TopologicalOrder<T>> {
        let all: HashSet<NodeIndex> = self.graph.node_indices().collect();
        Ok(self
            .ordered_subset(&all)?
            .into_iter()
            .map(|index| self.graph[index].clone())
            .collect())
    }

    /// Order a subset of nodes topologically (Kahn's algorithm).
    ///
    /// Only edges between members of `include` constrain the order. Among
    /// ready nodes the one declared first is emitted first.
    pub(crate) fn ordered_subset(&self, include: &HashSet<NodeIndex>) -> Result<Vec<NodeIndex>> {
        let mut in_degree: HashMap<NodeIndex, usize> = include
            .iter()
            .map(|&node| {
                let degree = self
                    .graph
                    .edges_directed(node, Direction::Incoming)
                    .filter(|edge| include.contains(&edge.source()))
                    .count();
                (node, degree)
            })
            .collect();

        let mut ready: BTreeSet<NodeIndex> = in_degree
            .iter()
            .filter(|(_, degree)| **degree == 0)
            .map(|(&node, _)| node)
            .collect();

        let mut ordered = Vec::with_capacity(include.len());
        while let Some(node) = ready.pop_first() {
            ordered.push(node);
            for edge in self.graph.edges_directed(node, Direction::Outgoing) {
                if let Some(degree) = in_degree.get_mut(&edge.target()) {
                    *degree -= 1;
                    if *degree == 0 {
                        ready.insert(edge.target());
                    }
                }
            }
        }

        if ordered.len() != include.len() {
            return Err(Error::CycleDetected {
                targets: self.cycle_members(),
            });
        }

        Ok(ordered)
    }

    /// Get the number of targets in the graph.
    #[must_use]
    pub fn target_count(&self) -> usize {
        self.graph.node_count()
    }

    /// Check if a target exists in the graph.
    #[must_use]
    pub fn contains_target(&self, name: &str) -> bool {
        self.name_to_node.contains_key(name)
    }

    /// Get the node index for a target by name.
    #[must_use]
    pub fn get_node_index(&self, name: &str) -> Option<NodeIndex> {
        self.name_to_node.get(name).copied()
    }

    /// Get a reference to a target node by name.
    #[must_use]
    pub fn get_node_by_name(&self, name: &str) -> Option<&GraphNode<T>> {
        self.name_to_node
            .get(name)
            .and_then(|&idx| self.graph.node_weight(idx))
    }

    /// Iterate over all nodes in declaration order.
    pub fn iter_nodes(&self) -> impl Iterator<Item = (NodeIndex, &GraphNode<T>)> {
        self.graph.node_references()
    }

    /// Names of every target `name` transitively depends on (excluding itself).
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownTarget`] if `name` is not in the graph.
    pub fn transitive_dependencies(&self, name: &str) -> Result<HashSet<String>> {
        let start = self.index_of(name)?;
        let mut closure = self.dependency_closure([start]);
        closure.remove(&start);
        Ok(closure
            .into_iter()
            .map(|index| self.graph[index].name.clone())
            .collect())
    }

    pub(crate) fn index_of(&self, name: &str) -> Result<NodeIndex> {
        self.get_node_index(name).ok_or_else(|| Error::UnknownTarget {
            name: name.to_string(),
        })
    }

    pub(crate) fn node(&self, index: NodeIndex) -> &GraphNode<T> {
        &self.graph[index]
    }

    /// All nodes reachable from `initial` by walking dependency edges backward,
    /// including the initial nodes.
    pub(crate) fn dependency_closure(
        &self,
        initial: impl IntoIterator<Item = NodeIndex>,
    ) -> HashSet<NodeIndex> {
        let mut all = HashSet::new();
        let mut frontier = Vec::new();

        for node in initial {
            if all.insert(node) {
                frontier.push(node);
            }
        }

        while let Some(node) = frontier.pop() {
            for edge in self.graph.edges_directed(node, Direction::Incoming) {
                if *edge.weight() == EdgeKind::DependsOn && all.insert(edge.source()) {
                    frontier.push(edge.source());
                }
            }
        }

        all
    }

    /// Targets directly triggered by `node`.
    pub(crate) fn triggered_by(&self, node: NodeIndex) -> impl Iterator<Item = NodeIndex> + '_ {
        self.graph
            .edges_directed(node, Direction::Outgoing)
            .filter(|edge| *edge.weight() == EdgeKind::Triggers)
            .map(|edge| edge.target())
    }
}

impl<T: TargetNodeData> Default for TargetGraph<T> {
    fn default() -> Self {
        Self::new()
    }
}
