//! Azure Pipelines agent integration.
//!
//! The agent reads logging commands (`##vso[...]`) from a step's standard
//! output. Setting an output variable is one such command.

use pipewright_ci::context::ExecutionContext;
use std::io::{self, Write};
use std::sync::Mutex;
use tracing::info;

/// Execution context that talks to the Azure Pipelines agent through
/// logging commands written to `W`.
pub struct AzurePipelinesHost<W: Write + Send> {
    out: Mutex<W>,
}

impl<W: Write + Send> AzurePipelinesHost<W> {
    /// Host writing logging commands to `out`
    pub const fn new(out: W) -> Self {
        Self {
            out: Mutex::new(out),
        }
    }

    /// Recover the underlying writer.
    ///
    /// # Errors
    ///
    /// Returns an error if a previous writer panicked mid-command.
    pub fn into_inner(self) -> io::Result<W> {
        self.out
            .into_inner()
            .map_err(|_| io::Error::other("agent output lock poisoned"))
    }

    /// Emit `##vso[task.setvariable variable=<name>;isOutput=<bool>]<value>`.
    ///
    /// # Errors
    ///
    /// Returns an error if writing to the agent output fails.
    pub fn set_variable(&self, name: &str, value: &str, is_output: bool) -> io::Result<()> {
        let command = format!(
            "##vso[task.setvariable variable={};isOutput={is_output}]{}",
            escape_property(name),
            escape_data(value)
        );
        let mut out = self
            .out
            .lock()
            .map_err(|_| io::Error::other("agent output lock poisoned"))?;
        writeln!(out, "{command}")?;
        out.flush()
    }
}

impl AzurePipelinesHost<io::Stdout> {
    /// Host writing to standard output, when running on an Azure agent.
    ///
    /// The agent sets `TF_BUILD=True` for every job.
    #[must_use]
    pub fn detect() -> Option<Self> {
        let on_agent = std::env::var("TF_BUILD")
            .ok()
            .is_some_and(|value| value.eq_ignore_ascii_case("true"));
        if !on_agent {
            return None;
        }

        info!("Detected Azure Pipelines agent");
        Some(Self::new(io::stdout()))
    }
}

impl<W: Write + Send> ExecutionContext for AzurePipelinesHost<W> {
    fn publish(&self, name: &str, value: &str, is_output: bool) -> io::Result<()> {
        self.set_variable(name, value, is_output)
    }
}

/// Escape a logging command's message data.
#[must_use]
pub fn escape_data(value: &str) -> String {
    value
        .replace('%', "%AZP25")
        .replace('\r', "%0D")
        .replace('\n', "%0A")
}

/// Escape a logging command's property value.
#[must_use]
pub fn escape_property(value: &str) -> String {
    escape_data(value).replace(';', "%3B").replace(']', "%5D")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pipewright_ci::{OutputVariablePropagator, TargetLifecycle};
    use pipewright_core::{Declaration, DeclarationRegistry, Target};
    use std::sync::Arc;

    #[test]
    fn test_set_output_variable_command() {
        let host = AzurePipelinesHost::new(Vec::new());
        host.set_variable("Version", "1.2.3", true).unwrap();
        host.set_variable("Note", "50%\nof it", false).unwrap();

        let text = String::from_utf8(host.into_inner().unwrap()).unwrap();
        assert_eq!(
            text,
            "##vso[task.setvariable variable=Version;isOutput=true]1.2.3\n\
             ##vso[task.setvariable variable=Note;isOutput=false]50%AZP25%0Aof it\n"
        );
    }

    #[test]
    fn test_escaping() {
        assert_eq!(escape_data("a\r\nb"), "a%0D%0Ab");
        assert_eq!(escape_property("a;b]c%"), "a%3Bb%5Dc%AZP25");
        assert_eq!(escape_data("a;b]"), "a;b]");
    }

    #[test]
    fn test_propagator_through_host() {
        let host = Arc::new(AzurePipelinesHost::new(Vec::new()));
        let propagator = OutputVariablePropagator::new(host.clone());
        let mut registry =
            DeclarationRegistry::from_declarations([Declaration::new("Version").exported()])
                .unwrap();
        registry.set_value("Version", "2.0.0").unwrap();

        propagator.on_failed(&Target::new("Publish"), &registry).unwrap();
        drop(propagator);

        let host = Arc::try_unwrap(host).ok().unwrap();
        let text = String::from_utf8(host.into_inner().unwrap()).unwrap();
        assert_eq!(
            text,
            "##vso[task.setvariable variable=Version;isOutput=true]2.0.0\n"
        );
    }

    #[test]
    fn test_detect() {
        temp_env::with_var_unset("TF_BUILD", || {
            assert!(AzurePipelinesHost::detect().is_none());
        });
        temp_env::with_var("TF_BUILD", Some("True"), || {
            assert!(AzurePipelinesHost::detect().is_some());
        });
        temp_env::with_var("TF_BUILD", Some("false"), || {
            assert!(AzurePipelinesHost::detect().is_none());
        });
    }
}
