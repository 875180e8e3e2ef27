//! Error types for target graph operations.

use std::fmt;

/// Result type for target graph operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur during target graph operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// A dependency cycle was detected in the graph.
    CycleDetected {
        /// Names of the targets participating in the cycle, in declaration order.
        targets: Vec<String>,
    },

    /// A target depends on (or triggers) another target that doesn't exist.
    MissingDependency {
        /// The target that has the missing dependency.
        target: String,
        /// The name of the missing dependency.
        dependency: String,
    },

    /// Multiple missing dependencies were found.
    MissingDependencies {
        /// List of (target, missing_dependency) pairs.
        missing: Vec<(String, String)>,
    },

    /// Two targets were declared with the same name.
    DuplicateTarget {
        /// The duplicated name.
        name: String,
    },

    /// An invocation referenced a target that is not in the graph.
    UnknownTarget {
        /// The requested name.
        name: String,
    },
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CycleDetected { targets } => {
                write!(
                    f,
                    "Cycle detected in target graph between: {}",
                    targets.join(", ")
                )
            }
            Self::MissingDependency { target, dependency } => {
                write!(f, "Target '{target}' depends on missing target '{dependency}'")
            }
            Self::MissingDependencies { missing } => {
                let list = missing
                    .iter()
                    .map(|(target, dep)| {
                        format!("Target '{target}' depends on missing target '{dep}'")
                    })
                    .collect::<Vec<_>>()
                    .join(", ");
                write!(f, "Missing dependencies: {list}")
            }
            Self::DuplicateTarget { name } => {
                write!(f, "Target '{name}' is declared more than once")
            }
            Self::UnknownTarget { name } => {
                write!(f, "Unknown target '{name}'")
            }
        }
    }
}

impl std::error::Error for Error {}
