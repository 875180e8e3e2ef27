//! Validation utilities for target graphs.

use crate::{Error, TargetGraph, TargetNodeData};

/// Result of graph validation.
#[derive(Debug, Clone)]
pub struct ValidationResult {
    /// Whether the graph is valid (no cycles).
    pub is_valid: bool,
    /// List of validation errors, if any.
    pub errors: Vec<Error>,
}

impl ValidationResult {
    /// Create a valid result.
    #[must_use]
    pub fn valid() -> Self {
        Self {
            is_valid: true,
            errors: vec![],
        }
    }

    /// Create an invalid result with errors.
    #[must_use]
    pub fn invalid(errors: Vec<Error>) -> Self {
        Self {
            is_valid: false,
            errors,
        }
    }
}

impl<T: TargetNodeData> TargetGraph<T> {
    /// Validate the graph structure.
    ///
    /// Graphs built with [`TargetGraph::from_targets`] are already checked;
    /// this is for graphs assembled by hand with `add_target` and
    /// `add_dependency_edges`.
    #[must_use]
    pub fn validate(&self) -> ValidationResult {
        let mut errors = Vec::new();

        if self.has_cycles() {
            errors.push(Error::CycleDetected {
                targets: self.cycle_members(),
            });
        }

        if errors.is_empty() {
            ValidationResult::valid()
        } else {
            ValidationResult::invalid(errors)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Clone, Debug, Default)]
    struct TestTarget {
        depends_on: Vec<String>,
    }

    impl TargetNodeData for TestTarget {
        fn dependency_names(&self) -> impl Iterator<Item = &str> {
            self.depends_on.iter().map(String::as_str)
        }
    }

    #[test]
    fn test_validate_empty_graph() {
        let graph: TargetGraph<TestTarget> = TargetGraph::new();
        let result = graph.validate();
        assert!(result.is_valid);
        assert!(result.errors.is_empty());
    }

    #[test]
    fn test_validate_cyclic_graph() {
        let mut graph = TargetGraph::new();
        graph
            .add_target(
                "a",
                TestTarget {
                    depends_on: vec!["b".to_string()],
                },
            )
            .unwrap();
        graph
            .add_target(
                "b",
                TestTarget {
                    depends_on: vec!["a".to_string()],
                },
            )
            .unwrap();
        graph.add_dependency_edges().unwrap();

        let result = graph.validate();
        assert!(!result.is_valid);
        assert_eq!(
            result.errors,
            vec![Error::CycleDetected {
                targets: vec!["a".to_string(), "b".to_string()]
            }]
        );
    }
}
