//! Relevance resolution.
//!
//! Computes the closed set of targets an invocation needs: every invoked
//! target, everything those transitively depend on, and every target chained
//! via `triggers` (together with its own dependencies), ordered so that
//! prerequisites come first.

use crate::{Result, TargetGraph, TargetNodeData, TopologicalOrder};
use petgraph::graph::NodeIndex;
use std::collections::HashSet;
use tracing::debug;

impl<T: TargetNodeData> TargetGraph<T> {
    /// Resolve the relevant targets for an invocation.
    ///
    /// The result is a valid topological order over the relevant set; ties
    /// are broken by declaration order. Duplicate invoked names are ignored.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::UnknownTarget`] for an invoked name that is not
    /// declared, and [`crate::Error::CycleDetected`] if no order exists.
    pub fn resolve<I, S>(&self, invoked: I) -> Result<TopologicalOrder<T>>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut roots = Vec::new();
        for name in invoked {
            roots.push(self.index_of(name.as_ref())?);
        }

        let relevant = self.relevant_set(roots);
        let ordered = self.ordered_subset(&relevant)?;

        debug!(
            relevant = ordered.len(),
            total = self.target_count(),
            "Resolved relevant targets"
        );

        Ok(ordered
            .into_iter()
            .map(|index| self.node(index).clone())
            .collect())
    }

    /// Resolve the relevant targets and return only their names.
    ///
    /// # Errors
    ///
    /// See [`TargetGraph::resolve`].
    pub fn resolve_names<I, S>(&self, invoked: I) -> Result<Vec<String>>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Ok(self
            .resolve(invoked)?
            .into_iter()
            .map(|node| node.name)
            .collect())
    }

    /// Dependency closure of the roots, grown with triggered targets until
    /// nothing new is added.
    fn relevant_set(&self, roots: Vec<NodeIndex>) -> HashSet<NodeIndex> {
        let mut relevant = self.dependency_closure(roots);

        loop {
            let triggered: Vec<NodeIndex> = relevant
                .iter()
                .flat_map(|&node| self.triggered_by(node))
                .filter(|node| !relevant.contains(node))
                .collect();

            if triggered.is_empty() {
                return relevant;
            }

            relevant.extend(self.dependency_closure(triggered));
        }
    }
}
