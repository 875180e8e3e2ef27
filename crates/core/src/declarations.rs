//! Declaration registry.
//!
//! A host registers every configurable value it exposes (parameters,
//! secrets, exported output variables) once, up front. The binder and the
//! output variable propagator only ever read from this table.

use crate::{Error, Result};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Semantic type of a declared value.
///
/// Any type name the host uses that is not one of the known kinds is kept
/// verbatim in [`DeclarationKind::Unrecognized`].
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum DeclarationKind {
    /// Free text
    #[default]
    String,
    /// Numeric value
    Number,
    /// `true` or `false`
    Boolean,
    /// One of a fixed set of allowed values
    Choice,
    /// Structured value
    Object,
    /// Any other type name, kept verbatim
    Unrecognized(String),
}

impl From<String> for DeclarationKind {
    fn from(value: String) -> Self {
        match value.to_ascii_lowercase().as_str() {
            "string" => Self::String,
            "number" => Self::Number,
            "boolean" | "bool" => Self::Boolean,
            "choice" => Self::Choice,
            "object" => Self::Object,
            _ => Self::Unrecognized(value),
        }
    }
}

impl From<DeclarationKind> for String {
    fn from(kind: DeclarationKind) -> Self {
        match kind {
            DeclarationKind::String => "string".to_string(),
            DeclarationKind::Number => "number".to_string(),
            DeclarationKind::Boolean => "boolean".to_string(),
            DeclarationKind::Choice => "choice".to_string(),
            DeclarationKind::Object => "object".to_string(),
            DeclarationKind::Unrecognized(name) => name,
        }
    }
}

/// Who owns a declaration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeclarationScope {
    /// Declared by the build script itself
    #[default]
    Host,
    /// Internal to the build framework; never exposed as a pipeline parameter
    Framework,
    /// Framework-provided but meaningful to every backend (e.g. verbosity)
    Global,
}

/// A named configurable value declared by the host.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default, rename_all = "camelCase")]
pub struct Declaration {
    /// Unique name
    pub name: String,
    /// Shown as the parameter's display name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Value type
    #[serde(rename = "type")]
    pub kind: DeclarationKind,
    /// Value used when nothing is set
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<serde_json::Value>,
    /// Never rendered unless explicitly imported
    pub secret: bool,
    /// Published as an output variable when a target completes
    pub variable: bool,
    /// Allowed values for a choice
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub allowed_values: Vec<String>,
    /// Who owns the declaration
    pub scope: DeclarationScope,
}

impl Declaration {
    /// Create a string declaration with host scope.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Set the value type
    #[must_use]
    pub fn with_kind(mut self, kind: DeclarationKind) -> Self {
        self.kind = kind;
        self
    }

    /// Set the description
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Set the default value
    #[must_use]
    pub fn with_default(mut self, default: impl Into<serde_json::Value>) -> Self {
        self.default = Some(default.into());
        self
    }

    /// Restrict to a fixed set of values; turns the declaration into a choice.
    #[must_use]
    pub fn with_allowed_values<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.kind = DeclarationKind::Choice;
        self.allowed_values = values.into_iter().map(Into::into).collect();
        self
    }

    /// Mark as secret
    #[must_use]
    pub fn secret(mut self) -> Self {
        self.secret = true;
        self
    }

    /// Mark as an output variable for downstream jobs
    #[must_use]
    pub fn exported(mut self) -> Self {
        self.variable = true;
        self
    }

    /// Set the scope
    #[must_use]
    pub fn with_scope(mut self, scope: DeclarationScope) -> Self {
        self.scope = scope;
        self
    }

    /// Default rendered as plain text, if there is one.
    #[must_use]
    pub fn default_text(&self) -> Option<String> {
        self.default.as_ref().map(value_text)
    }
}

fn value_text(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Ordered table of declarations plus the values set on them at run time.
#[derive(Debug, Clone, Default)]
pub struct DeclarationRegistry {
    declarations: IndexMap<String, Declaration>,
    values: HashMap<String, String>,
}

impl DeclarationRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry pre-populated with the framework's own declarations.
    #[must_use]
    pub fn with_framework_defaults() -> Self {
        let mut registry = Self::new();
        registry.declarations.insert(
            "verbosity".to_string(),
            Declaration::new("verbosity")
                .with_description("Logging verbosity during build execution")
                .with_allowed_values(["quiet", "minimal", "normal", "verbose"])
                .with_default("normal")
                .with_scope(DeclarationScope::Global),
        );
        registry
    }

    /// Build a registry from declarations, rejecting duplicates.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if two declarations share a name.
    pub fn from_declarations(declarations: impl IntoIterator<Item = Declaration>) -> Result<Self> {
        let mut registry = Self::new();
        for declaration in declarations {
            registry.register(declaration)?;
        }
        Ok(registry)
    }

    /// Register a declaration.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the name is empty or already taken.
    pub fn register(&mut self, declaration: Declaration) -> Result<()> {
        if declaration.name.is_empty() {
            return Err(Error::configuration("Declaration name must not be empty"));
        }
        if self.declarations.contains_key(&declaration.name) {
            return Err(Error::configuration(format!(
                "Declaration '{}' is registered more than once",
                declaration.name
            )));
        }
        self.declarations
            .insert(declaration.name.clone(), declaration);
        Ok(())
    }

    /// Declaration named `name`
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Declaration> {
        self.declarations.get(name)
    }

    /// Declarations in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &Declaration> {
        self.declarations.values()
    }

    /// Number of declarations
    #[must_use]
    pub fn len(&self) -> usize {
        self.declarations.len()
    }

    /// Whether the registry is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.declarations.is_empty()
    }

    /// Declarations flagged as exported output variables.
    pub fn exported_variables(&self) -> impl Iterator<Item = &Declaration> {
        self.iter().filter(|d| d.variable)
    }

    /// Record the current value of a declaration.
    ///
    /// # Errors
    ///
    /// Returns a configuration error for an undeclared name.
    pub fn set_value(&mut self, name: &str, value: impl Into<String>) -> Result<()> {
        if !self.declarations.contains_key(name) {
            return Err(Error::configuration(format!(
                "Cannot set value of undeclared '{name}'"
            )));
        }
        self.values.insert(name.to_string(), value.into());
        Ok(())
    }

    /// Current value: the value set at run time, else the declared default.
    #[must_use]
    pub fn value(&self, name: &str) -> Option<String> {
        self.values
            .get(name)
            .cloned()
            .or_else(|| self.get(name).and_then(Declaration::default_text))
    }
}
