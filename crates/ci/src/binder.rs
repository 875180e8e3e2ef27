//! Parameter/secret binding.
//!
//! Decides which host declarations surface in a generated pipeline and in
//! what form. Rules run in this order:
//!
//! 1. a secret is dropped entirely unless the backend imports it
//! 2. an exported variable is recorded for downstream jobs
//! 3. a declaration required by a relevant target is passed on the command
//!    line instead of as a parameter, unless it is globally scoped
//! 4. framework-internal declarations never become parameters
//! 5. of what is left, only names the backend lists become parameters
//!
//! Every accepted parameter also gets a shadow variable referencing it.

use crate::ir::{InputValue, Parameter, ParameterKind, Variable};
use pipewright_core::{
    Declaration, DeclarationKind, DeclarationRegistry, DeclarationScope, PipelineConfig, Target,
};
use std::collections::HashSet;
use tracing::{debug, warn};

/// Parameters and variables accepted for one backend instance.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BoundValues {
    /// Pipeline parameters, in declaration order
    pub parameters: Vec<Parameter>,
    /// Parameter shadows first, then exported variables
    pub variables: Vec<Variable>,
    /// Names of exported variables, read by downstream jobs
    pub exported: Vec<String>,
}

/// Bind host declarations against the relevant targets and backend config.
#[must_use]
pub fn bind(
    declarations: &DeclarationRegistry,
    relevant: &[&Target],
    config: &PipelineConfig,
) -> BoundValues {
    let required: HashSet<&str> = relevant
        .iter()
        .flat_map(|target| target.required_parameters())
        .collect();
    let listed: HashSet<&str> = config
        .pipeline_parameters
        .iter()
        .map(String::as_str)
        .collect();

    let mut bound = BoundValues::default();

    for declaration in declarations.iter() {
        if declaration.secret && !config.imports_secret(&declaration.name) {
            debug!(name = %declaration.name, "Secret not imported; leaving it out");
            continue;
        }

        if declaration.variable {
            bound.exported.push(declaration.name.clone());
        }

        if required.contains(declaration.name.as_str())
            && declaration.scope != DeclarationScope::Global
        {
            continue;
        }
        if declaration.scope == DeclarationScope::Framework {
            continue;
        }
        if !listed.contains(declaration.name.as_str()) {
            continue;
        }

        bound.parameters.push(to_parameter(declaration));
    }

    let mut seen = HashSet::new();
    let shadows = bound
        .parameters
        .iter()
        .map(|p| Variable::parameter_shadow(&p.name));
    let exported = declarations
        .exported_variables()
        .filter(|d| bound.exported.contains(&d.name))
        .map(|d| Variable::literal(&d.name, d.default_text()));
    bound.variables = shadows
        .chain(exported)
        .filter(|v| seen.insert(v.name.clone()))
        .collect();

    debug!(
        parameters = bound.parameters.len(),
        variables = bound.variables.len(),
        "Bound declarations"
    );
    bound
}

fn to_parameter(declaration: &Declaration) -> Parameter {
    Parameter {
        name: declaration.name.clone(),
        display_name: declaration.description.clone(),
        kind: parameter_kind(declaration),
        default: declaration.default.as_ref().map(InputValue::from),
        values: declaration.allowed_values.clone(),
    }
}

/// Map a declaration kind onto the four IR parameter kinds.
///
/// Unrecognized kinds fall back to `object`.
fn parameter_kind(declaration: &Declaration) -> ParameterKind {
    match &declaration.kind {
        DeclarationKind::String | DeclarationKind::Choice => ParameterKind::String,
        DeclarationKind::Number => ParameterKind::Number,
        DeclarationKind::Boolean => ParameterKind::Boolean,
        DeclarationKind::Object => ParameterKind::Object,
        DeclarationKind::Unrecognized(kind) => {
            warn!(
                name = %declaration.name,
                kind = %kind,
                "Unrecognized parameter type; using object"
            );
            ParameterKind::Object
        }
    }
}
