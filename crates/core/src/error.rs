//! Error types for pipewright-core

use miette::Diagnostic;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Main error type for pipewright-core operations
#[derive(Error, Debug, Diagnostic)]
pub enum Error {
    /// Invalid declarations, targets or pipeline configuration
    #[error("Configuration error: {message}")]
    #[diagnostic(
        code(pipewright::config::invalid),
        help("Check the declared targets, parameters and pipeline settings")
    )]
    Configuration {
        /// The error message describing the configuration issue
        message: String,
    },

    /// Build manifest could not be parsed
    #[error("Failed to parse manifest{}: {message}", path.as_ref().map(|p| format!(" {}", p.display())).unwrap_or_default())]
    #[diagnostic(
        code(pipewright::manifest::parse),
        help("The manifest must be valid TOML with `targets`, `declarations` and `pipelines` tables")
    )]
    ManifestParse {
        /// Manifest file, when parsed from disk
        path: Option<PathBuf>,
        /// Parser message
        message: String,
    },

    /// I/O error with path context
    #[error("I/O error during {operation}: {source}")]
    #[diagnostic(code(pipewright::io::error))]
    Io {
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
        /// The path where the I/O error occurred, if applicable
        path: Option<Box<Path>>,
        /// Description of the operation that failed
        operation: String,
    },
}

impl Error {
    /// Create a configuration error with a message
    #[must_use]
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Create a manifest parse error
    #[must_use]
    pub fn manifest_parse(path: Option<&Path>, message: impl Into<String>) -> Self {
        Self::ManifestParse {
            path: path.map(Path::to_path_buf),
            message: message.into(),
        }
    }

    /// Create an I/O error with context
    #[must_use]
    pub fn io(source: std::io::Error, path: Option<&Path>, operation: impl Into<String>) -> Self {
        Self::Io {
            source,
            path: path.map(Into::into),
            operation: operation.into(),
        }
    }
}

/// Result type for pipewright-core operations
pub type Result<T> = std::result::Result<T, Error>;
