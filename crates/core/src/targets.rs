//! Target model.
//!
//! A [`Target`] is a named unit of work. Targets reference each other by
//! name; [`pipewright_target_graph::TargetGraph`] turns a set of them into a
//! DAG.

use pipewright_target_graph::TargetNodeData;
use serde::{Deserialize, Serialize};

/// Something a target needs before it can run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Requirement {
    /// A declared value that must be supplied
    Parameter(String),
    /// An opaque boolean condition, evaluated by the host
    Condition(String),
}

/// Artifacts a target pulls from one of its dependencies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtifactDependency {
    /// Upstream target; must be listed in `dependsOn`
    pub target: String,
    /// Override paths. Empty takes the upstream target's own products.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub paths: Vec<String>,
}

/// A named build target.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Target {
    /// Unique name
    pub name: String,
    /// Shown in listings
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Direct dependencies, in declaration order
    pub depends_on: Vec<String>,
    /// Targets chained to run after this one whenever it runs
    pub triggers: Vec<String>,
    /// Number of parallel slices the work is split into
    #[serde(skip_serializing_if = "Option::is_none")]
    pub partition_size: Option<u32>,
    /// Parameters and conditions the target needs
    pub requires: Vec<Requirement>,
    /// Path patterns of produced artifacts (globs allowed)
    pub artifact_products: Vec<String>,
    /// Artifacts pulled from dependencies
    pub artifact_dependencies: Vec<ArtifactDependency>,
}

impl Target {
    /// Target with no relations
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Set the description
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Append direct dependencies
    #[must_use]
    pub fn depends_on<I, S>(mut self, targets: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.depends_on.extend(targets.into_iter().map(Into::into));
        self
    }

    /// Append targets to run after this one
    #[must_use]
    pub fn triggers<I, S>(mut self, targets: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.triggers.extend(targets.into_iter().map(Into::into));
        self
    }

    /// Split the target into `size` parallel slices
    #[must_use]
    pub fn partitioned(mut self, size: u32) -> Self {
        self.partition_size = Some(size);
        self
    }

    /// Require a parameter
    #[must_use]
    pub fn requires_parameter(mut self, name: impl Into<String>) -> Self {
        self.requires.push(Requirement::Parameter(name.into()));
        self
    }

    /// Require an opaque condition
    #[must_use]
    pub fn requires_condition(mut self, description: impl Into<String>) -> Self {
        self.requires.push(Requirement::Condition(description.into()));
        self
    }

    /// Declare an artifact path pattern
    #[must_use]
    pub fn produces(mut self, pattern: impl Into<String>) -> Self {
        self.artifact_products.push(pattern.into());
        self
    }

    /// Consume artifacts of `target`, optionally overriding which paths.
    #[must_use]
    pub fn consumes<I, S>(mut self, target: impl Into<String>, paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.artifact_dependencies.push(ArtifactDependency {
            target: target.into(),
            paths: paths.into_iter().map(Into::into).collect(),
        });
        self
    }

    /// Names of declarations this target requires.
    pub fn required_parameters(&self) -> impl Iterator<Item = &str> {
        self.requires.iter().filter_map(|r| match r {
            Requirement::Parameter(name) => Some(name.as_str()),
            Requirement::Condition(_) => None,
        })
    }

    /// Partition count when the work is actually split (more than one slice).
    #[must_use]
    pub fn partitions(&self) -> Option<u32> {
        self.partition_size.filter(|&n| n > 1)
    }
}

impl TargetNodeData for Target {
    fn dependency_names(&self) -> impl Iterator<Item = &str> {
        self.depends_on.iter().map(String::as_str)
    }

    fn triggered_names(&self) -> impl Iterator<Item = &str> {
        self.triggers.iter().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pipewright_target_graph::TargetGraph;

    #[test]
    fn test_required_parameters_skip_conditions() {
        let target = Target::new("publish")
            .requires_parameter("apiKey")
            .requires_condition("on release branch")
            .requires_parameter("source");
        let names: Vec<_> = target.required_parameters().collect();
        assert_eq!(names, vec!["apiKey", "source"]);
    }

    #[test]
    fn test_partitions_ignores_single_slice() {
        assert_eq!(Target::new("t").partitions(), None);
        assert_eq!(Target::new("t").partitioned(1).partitions(), None);
        assert_eq!(Target::new("t").partitioned(4).partitions(), Some(4));
    }

    #[test]
    fn test_targets_form_a_graph() {
        let targets = [
            Target::new("compile"),
            Target::new("test").depends_on(["compile"]),
            Target::new("pack").depends_on(["compile"]).triggers(["test"]),
        ];
        let graph =
            TargetGraph::from_targets(targets.iter().map(|t| (t.name.clone(), t.clone()))).unwrap();
        let names = graph.resolve_names(["pack"]).unwrap();
        assert_eq!(names, vec!["compile", "pack", "test"]);
    }
}
