//! Core types for pipewright.
//!
//! This crate holds the data a host build script hands to the pipeline
//! compiler:
//!
//! - [`Target`]: named units of work and how they relate
//! - [`DeclarationRegistry`]: parameters, secrets and exported variables
//! - [`PipelineConfig`]: settings for one generated CI file
//! - [`Manifest`]: all of the above, loadable from TOML

pub mod ci;
pub mod declarations;
pub mod error;
pub mod manifest;
pub mod targets;

pub use ci::{FilterConfig, GlobalToolConfig, PipelineConfig, PullRequestConfig, TriggerConfig};
pub use declarations::{Declaration, DeclarationKind, DeclarationRegistry, DeclarationScope};
pub use error::{Error, Result};
pub use manifest::{BackendEntry, Manifest};
pub use targets::{ArtifactDependency, Requirement, Target};
