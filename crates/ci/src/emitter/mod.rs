//! CI Pipeline Emitter Trait
//!
//! Defines the interface for rendering the pipeline IR into a backend's
//! native configuration text. One implementation exists per CI backend;
//! each renders through the shared [`crate::writer::BlockWriter`].
//!
//! ## Emitter Registry
//!
//! The [`EmitterRegistry`] maps backend names (as used in a manifest's
//! `backend` field) to emitters.

mod registry;

pub use registry::{EmitterInfo, EmitterRegistry, EmitterRegistryBuilder};

use crate::ir::PipelineIr;
use miette::Diagnostic;
use thiserror::Error;

/// Error types for emitter operations
#[derive(Debug, Error, Diagnostic)]
pub enum EmitterError {
    /// Serialization of a value tree failed
    #[error("Serialization failed: {0}")]
    #[diagnostic(code(pipewright::emitter::serialization))]
    Serialization(String),

    /// Invalid IR structure for this emitter
    #[error("Invalid IR: {0}")]
    #[diagnostic(code(pipewright::emitter::invalid_ir))]
    InvalidIR(String),

    /// Unsupported feature in IR for this emitter
    #[error("Unsupported feature '{feature}' for {emitter} emitter")]
    #[diagnostic(
        code(pipewright::emitter::unsupported),
        help("Remove the feature from the pipeline configuration or pick another backend")
    )]
    UnsupportedFeature {
        /// Feature found in the IR
        feature: String,
        /// Emitter format name
        emitter: &'static str,
    },

    /// IO error during emission
    #[error("IO error: {0}")]
    #[diagnostic(code(pipewright::emitter::io))]
    Io(#[from] std::io::Error),
}

/// Result type for emitter operations
pub type EmitterResult<T> = std::result::Result<T, EmitterError>;

/// Trait for CI configuration emitters
///
/// # Example
///
/// ```ignore
/// use pipewright_ci::emitter::{Emitter, EmitterResult};
/// use pipewright_ci::ir::PipelineIr;
///
/// struct MyEmitter;
///
/// impl Emitter for MyEmitter {
///     fn emit(&self, ir: &PipelineIr) -> EmitterResult<String> {
///         Ok(format!("# {} stages", ir.stages.len()))
///     }
///
///     fn format_name(&self) -> &'static str {
///         "my-ci"
///     }
///
///     fn file_extension(&self) -> &'static str {
///         "yml"
///     }
/// }
/// ```
pub trait Emitter: Send + Sync {
    /// Render the IR to configuration text.
    ///
    /// Must be deterministic: the same IR always renders the same bytes.
    ///
    /// # Errors
    /// Returns `EmitterError` if the IR cannot be transformed or serialized
    fn emit(&self, ir: &PipelineIr) -> EmitterResult<String>;

    /// Get the format identifier for this emitter
    ///
    /// Used as the manifest `backend` value (e.g., "azure-pipelines")
    fn format_name(&self) -> &'static str;

    /// Get the file extension for output files
    fn file_extension(&self) -> &'static str;

    /// Output file name without suffix or extension
    fn file_stem(&self) -> &'static str {
        self.format_name()
    }

    /// Get a human-readable description of this emitter
    fn description(&self) -> &'static str {
        "CI configuration emitter"
    }

    /// Validate the IR before emission
    ///
    /// Override this to perform emitter-specific validation beyond
    /// the standard IR validation.
    ///
    /// # Errors
    /// Returns `EmitterError::InvalidIR` or `EmitterError::UnsupportedFeature`
    /// if validation fails
    fn validate(&self, ir: &PipelineIr) -> EmitterResult<()> {
        let _ = ir;
        Ok(())
    }
}
