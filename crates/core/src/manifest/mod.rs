//! Build manifest.
//!
//! The manifest is a TOML rendition of everything a host would otherwise
//! register in code: targets, declarations, and the backend instances to
//! generate.
//!
//! ```toml
//! [[targets]]
//! name = "compile"
//!
//! [[targets]]
//! name = "test"
//! dependsOn = ["compile"]
//!
//! [[declarations]]
//! name = "configuration"
//! type = "choice"
//! allowedValues = ["Debug", "Release"]
//!
//! [[pipelines]]
//! backend = "azure-pipelines"
//! images = ["ubuntu-latest"]
//! invokedTargets = ["test"]
//! ```

use crate::ci::PipelineConfig;
use crate::declarations::{Declaration, DeclarationRegistry};
use crate::targets::Target;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;

/// A backend instance: which emitter to use and how to configure it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct BackendEntry {
    /// Registered emitter format name (e.g. `azure-pipelines`)
    pub backend: String,
    /// Backend settings
    #[serde(flatten)]
    pub config: PipelineConfig,
}

/// Root manifest structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default, rename_all = "camelCase")]
pub struct Manifest {
    /// Targets, in declaration order
    pub targets: Vec<Target>,
    /// Parameters, secrets and variables
    pub declarations: Vec<Declaration>,
    /// One entry per generated CI file
    pub pipelines: Vec<BackendEntry>,
}

impl Manifest {
    /// Parse a manifest from TOML text.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ManifestParse`] on invalid TOML or unknown shapes.
    pub fn from_toml_str(source: &str) -> Result<Self> {
        toml::from_str(source).map_err(|e| Error::manifest_parse(None, e.to_string()))
    }

    /// Read and parse a manifest file.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the file cannot be read, or
    /// [`Error::ManifestParse`] if it is not a valid manifest.
    pub fn load(path: &Path) -> Result<Self> {
        let source = std::fs::read_to_string(path)
            .map_err(|e| Error::io(e, Some(path), "reading manifest"))?;
        let manifest: Self = toml::from_str(&source)
            .map_err(|e| Error::manifest_parse(Some(path), e.to_string()))?;

        debug!(
            path = %path.display(),
            targets = manifest.targets.len(),
            declarations = manifest.declarations.len(),
            pipelines = manifest.pipelines.len(),
            "Loaded manifest"
        );
        Ok(manifest)
    }

    /// Registry holding the framework defaults followed by the manifest's
    /// declarations.
    ///
    /// # Errors
    ///
    /// Returns a configuration error on duplicate declaration names.
    pub fn registry(&self) -> Result<DeclarationRegistry> {
        let mut registry = DeclarationRegistry::with_framework_defaults();
        for declaration in &self.declarations {
            registry.register(declaration.clone())?;
        }
        Ok(registry)
    }
}
