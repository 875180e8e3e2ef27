//! Emitter Registry
//!
//! Maps backend names to emitters so a manifest can name its backends as
//! plain strings.

use std::collections::BTreeMap;
use std::sync::Arc;

use super::{Emitter, EmitterError, EmitterResult};
use crate::ir::PipelineIr;

/// Registry of available emitters, keyed by [`Emitter::format_name`].
///
/// ```ignore
/// let registry = EmitterRegistryBuilder::new()
///     .with_emitter(AzurePipelinesEmitter::new())
///     .build();
/// let emitter = registry.get("azure-pipelines").unwrap();
/// ```
#[derive(Default, Clone)]
pub struct EmitterRegistry {
    emitters: BTreeMap<&'static str, Arc<dyn Emitter>>,
}

impl EmitterRegistry {
    /// Empty registry
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an emitter, replacing any previous one with the same name.
    pub fn register(&mut self, emitter: impl Emitter + 'static) {
        self.register_arc(Arc::new(emitter));
    }

    /// Register an already shared emitter.
    pub fn register_arc(&mut self, emitter: Arc<dyn Emitter>) {
        self.emitters.insert(emitter.format_name(), emitter);
    }

    /// Emitter registered under `name`
    #[must_use]
    pub fn get(&self, name: &str) -> Option<Arc<dyn Emitter>> {
        self.emitters.get(name).cloned()
    }

    /// Whether `name` is registered
    #[must_use]
    pub fn has(&self, name: &str) -> bool {
        self.emitters.contains_key(name)
    }

    /// Registered format names, sorted.
    #[must_use]
    pub fn formats(&self) -> Vec<&'static str> {
        self.emitters.keys().copied().collect()
    }

    /// Number of registered emitters
    #[must_use]
    pub fn len(&self) -> usize {
        self.emitters.len()
    }

    /// Whether no emitter is registered
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.emitters.is_empty()
    }

    /// Render with the named emitter.
    ///
    /// # Errors
    /// Returns an error if the format is unknown or emission fails.
    pub fn emit(&self, format: &str, ir: &PipelineIr) -> EmitterResult<String> {
        let emitter = self.get(format).ok_or_else(|| {
            EmitterError::InvalidIR(format!(
                "Unknown format '{format}'. Available: {}",
                self.formats().join(", ")
            ))
        })?;
        emitter.validate(ir)?;
        emitter.emit(ir)
    }

    /// Descriptions of all registered emitters, sorted by format.
    #[must_use]
    pub fn info(&self) -> Vec<EmitterInfo> {
        self.emitters
            .values()
            .map(|e| EmitterInfo::from_emitter(e.as_ref()))
            .collect()
    }
}

/// Information about a registered emitter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmitterInfo {
    /// Format name used for lookup
    pub format: &'static str,
    /// Output file extension
    pub extension: &'static str,
    /// Human-readable description
    pub description: &'static str,
}

impl EmitterInfo {
    /// Describe `emitter`
    #[must_use]
    pub fn from_emitter(emitter: &dyn Emitter) -> Self {
        Self {
            format: emitter.format_name(),
            extension: emitter.file_extension(),
            description: emitter.description(),
        }
    }
}

/// Builder for an emitter registry.
#[derive(Default)]
pub struct EmitterRegistryBuilder {
    registry: EmitterRegistry,
}

impl EmitterRegistryBuilder {
    /// Builder over an empty registry
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `emitter`, replacing any with the same format name
    #[must_use]
    pub fn with_emitter(mut self, emitter: impl Emitter + 'static) -> Self {
        self.registry.register(emitter);
        self
    }

    /// Finish building
    #[must_use]
    pub fn build(self) -> EmitterRegistry {
        self.registry
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NamedEmitter(&'static str);

    impl Emitter for NamedEmitter {
        fn emit(&self, ir: &PipelineIr) -> EmitterResult<String> {
            Ok(format!("# {} with {} stages", self.0, ir.stages.len()))
        }

        fn format_name(&self) -> &'static str {
            self.0
        }

        fn file_extension(&self) -> &'static str {
            "yml"
        }

        fn description(&self) -> &'static str {
            "Named test emitter"
        }
    }

    #[test]
    fn test_builder_and_lookup() {
        let registry = EmitterRegistryBuilder::new()
            .with_emitter(NamedEmitter("azure-pipelines"))
            .build();

        assert_eq!(registry.len(), 1);
        assert!(registry.has("azure-pipelines"));
        assert!(registry.get("gitlab").is_none());
    }

    #[test]
    fn test_formats_sorted_and_replacement() {
        let mut registry = EmitterRegistry::new();
        registry.register(NamedEmitter("zeta"));
        registry.register(NamedEmitter("alpha"));
        registry.register(NamedEmitter("alpha"));

        assert_eq!(registry.formats(), vec!["alpha", "zeta"]);
        assert_eq!(registry.info()[0].description, "Named test emitter");
    }

    #[test]
    fn test_emit_by_name() {
        let registry = EmitterRegistryBuilder::new()
            .with_emitter(NamedEmitter("test"))
            .build();
        let ir = PipelineIr::default();

        assert_eq!(registry.emit("test", &ir).unwrap(), "# test with 0 stages");

        let err = registry.emit("unknown", &ir).unwrap_err();
        assert!(err.to_string().contains("Unknown format 'unknown'"));
        assert!(err.to_string().contains("Available: test"));
    }
}
