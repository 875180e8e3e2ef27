//! Generation of CI configuration files.
//!
//! Each configured backend instance is compiled, rendered and written on its
//! own. A failing instance is reported and skipped; the others still run.

use crate::compiler::{Compiler, CompilerError};
use crate::emitter::{Emitter, EmitterError, EmitterRegistry};
use miette::Diagnostic;
use pipewright_core::{Manifest, PipelineConfig};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

/// Errors for one backend instance
#[derive(Debug, Error, Diagnostic)]
pub enum GenerateError {
    /// Compilation failed
    #[error(transparent)]
    #[diagnostic(transparent)]
    Compiler(#[from] CompilerError),

    /// Rendering failed
    #[error(transparent)]
    #[diagnostic(transparent)]
    Emitter(#[from] EmitterError),

    /// No emitter is registered for a manifest's backend
    #[error("Unknown backend '{name}'. Available: {available}")]
    #[diagnostic(
        code(pipewright::generate::unknown_backend),
        help("Register an emitter for this backend or fix the manifest entry")
    )]
    UnknownBackend {
        /// Backend named in the manifest
        name: String,
        /// Registered formats, comma separated
        available: String,
    },

    /// Writing the output file failed
    #[error(transparent)]
    #[diagnostic(transparent)]
    Io(#[from] pipewright_core::Error),
}

/// An emitter paired with the configuration it renders.
#[derive(Clone)]
pub struct BackendInstance {
    /// Emitter rendering this instance
    pub emitter: Arc<dyn Emitter>,
    /// Configuration compiled for this instance
    pub config: PipelineConfig,
}

/// A file written for one backend instance
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedFile {
    /// Format name of the emitter
    pub backend: &'static str,
    /// Path written
    pub path: PathBuf,
}

/// Compiles the shared target graph once per backend instance.
pub struct Generator {
    compiler: Compiler,
    instances: Vec<BackendInstance>,
}

impl Generator {
    /// Generator with no backend instances
    #[must_use]
    pub const fn new(compiler: Compiler) -> Self {
        Self {
            compiler,
            instances: Vec::new(),
        }
    }

    /// Generator for every pipeline a manifest lists, resolved against the
    /// registry.
    ///
    /// # Errors
    ///
    /// Returns [`GenerateError::UnknownBackend`] for an unregistered backend.
    pub fn from_manifest(
        compiler: Compiler,
        manifest: &Manifest,
        registry: &EmitterRegistry,
    ) -> Result<Self, GenerateError> {
        let mut generator = Self::new(compiler);
        for entry in &manifest.pipelines {
            let emitter =
                registry
                    .get(&entry.backend)
                    .ok_or_else(|| GenerateError::UnknownBackend {
                        name: entry.backend.clone(),
                        available: registry.formats().join(", "),
                    })?;
            generator.add_backend(emitter, entry.config.clone());
        }
        Ok(generator)
    }

    /// Add a backend instance
    pub fn add_backend(&mut self, emitter: Arc<dyn Emitter>, config: PipelineConfig) {
        self.instances.push(BackendInstance { emitter, config });
    }

    /// Configured backend instances, in insertion order
    #[must_use]
    pub fn instances(&self) -> &[BackendInstance] {
        &self.instances
    }

    /// Compiler shared by every instance
    #[must_use]
    pub const fn compiler(&self) -> &Compiler {
        &self.compiler
    }

    /// `<root>/<stem>.<ext>` or `<root>/<stem>.<suffix>.<ext>`
    #[must_use]
    pub fn output_path(&self, instance: &BackendInstance) -> PathBuf {
        let emitter = &instance.emitter;
        let file_name = match &instance.config.suffix {
            Some(suffix) => format!(
                "{}.{suffix}.{}",
                emitter.file_stem(),
                emitter.file_extension()
            ),
            None => format!("{}.{}", emitter.file_stem(), emitter.file_extension()),
        };
        self.compiler.root().join(file_name)
    }

    /// Compile and render one instance without writing anything.
    ///
    /// # Errors
    ///
    /// Returns compiler or emitter errors.
    pub fn render(&self, instance: &BackendInstance) -> Result<String, GenerateError> {
        let ir = self.compiler.compile(&instance.config)?;
        instance.emitter.validate(&ir)?;
        Ok(instance.emitter.emit(&ir)?)
    }

    /// Generate every instance. Outcomes are returned in instance order.
    pub fn generate(&self) -> Vec<Result<GeneratedFile, GenerateError>> {
        self.instances
            .iter()
            .map(|instance| {
                let backend = instance.emitter.format_name();
                let outcome = self.generate_one(instance);
                match &outcome {
                    Ok(file) => info!(backend, path = %file.path.display(), "Generated CI configuration"),
                    Err(e) => warn!(backend, error = %e, "Skipping backend"),
                }
                outcome
            })
            .collect()
    }

    fn generate_one(&self, instance: &BackendInstance) -> Result<GeneratedFile, GenerateError> {
        let contents = self.render(instance)?;
        let path = self.output_path(instance);
        write_atomic(&path, &contents)?;
        Ok(GeneratedFile {
            backend: instance.emitter.format_name(),
            path,
        })
    }
}

/// Write `contents` to `path` through a synced sibling temp file and a
/// rename, so readers never observe a partial file.
///
/// # Errors
///
/// Returns an I/O error with the failing operation and path.
pub fn write_atomic(path: &Path, contents: &str) -> pipewright_core::Result<()> {
    use pipewright_core::Error;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| Error::io(e, Some(parent), "create_dir_all"))?;
    }

    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    let tmp_path = path.with_file_name(format!(".{file_name}.tmp"));

    let written = write_synced(&tmp_path, path, contents);
    if written.is_err() {
        let _ = fs::remove_file(&tmp_path);
    }
    written
}

fn write_synced(tmp_path: &Path, path: &Path, contents: &str) -> pipewright_core::Result<()> {
    use pipewright_core::Error;

    let mut file =
        fs::File::create(tmp_path).map_err(|e| Error::io(e, Some(tmp_path), "create"))?;
    file.write_all(contents.as_bytes())
        .map_err(|e| Error::io(e, Some(tmp_path), "write"))?;
    file.sync_all()
        .map_err(|e| Error::io(e, Some(tmp_path), "sync"))?;
    drop(file);

    fs::rename(tmp_path, path).map_err(|e| Error::io(e, Some(path), "rename"))
}
