//! Runtime side of a generated pipeline.
//!
//! While targets run on a CI agent, values flagged as exported variables are
//! handed to the agent so downstream jobs can read them. The agent-specific
//! mechanism sits behind [`ExecutionContext`].

use pipewright_core::{DeclarationRegistry, Target};
use std::io;
use std::sync::Arc;
use tracing::debug;

/// Capability to publish a named value to the hosting CI agent.
pub trait ExecutionContext: Send + Sync {
    /// Publish `value` under `name`. `is_output` makes it readable by
    /// dependent jobs.
    ///
    /// # Errors
    ///
    /// Returns an error if the value cannot be handed to the agent.
    fn publish(&self, name: &str, value: &str, is_output: bool) -> io::Result<()>;
}

/// Hooks called once per target instance when it finishes.
pub trait TargetLifecycle {
    /// # Errors
    ///
    /// Returns an error if a hook action fails.
    fn on_succeeded(&self, target: &Target, declarations: &DeclarationRegistry) -> io::Result<()>;

    /// # Errors
    ///
    /// Returns an error if a hook action fails.
    fn on_failed(&self, target: &Target, declarations: &DeclarationRegistry) -> io::Result<()>;
}

/// Publishes every exported variable when a target finishes, whether it
/// succeeded or failed.
#[derive(Clone)]
pub struct OutputVariablePropagator {
    context: Arc<dyn ExecutionContext>,
}

impl OutputVariablePropagator {
    /// Propagator publishing through `context`
    #[must_use]
    pub fn new(context: Arc<dyn ExecutionContext>) -> Self {
        Self { context }
    }

    /// Publish all exported variables. Every variable is attempted; the
    /// first failure is returned.
    ///
    /// # Errors
    ///
    /// Returns the first publish error.
    pub fn propagate(&self, target: &Target, declarations: &DeclarationRegistry) -> io::Result<()> {
        let mut first_error = None;

        for declaration in declarations.exported_variables() {
            let value = declarations.value(&declaration.name).unwrap_or_default();
            debug!(target = %target.name, variable = %declaration.name, "Publishing output variable");
            if let Err(e) = self.context.publish(&declaration.name, &value, true) {
                first_error.get_or_insert(e);
            }
        }

        first_error.map_or(Ok(()), Err)
    }
}

impl TargetLifecycle for OutputVariablePropagator {
    fn on_succeeded(&self, target: &Target, declarations: &DeclarationRegistry) -> io::Result<()> {
        self.propagate(target, declarations)
    }

    fn on_failed(&self, target: &Target, declarations: &DeclarationRegistry) -> io::Result<()> {
        self.propagate(target, declarations)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pipewright_core::Declaration;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingContext {
        published: Mutex<Vec<(String, String, bool)>>,
        fail_on: Option<&'static str>,
    }

    impl ExecutionContext for RecordingContext {
        fn publish(&self, name: &str, value: &str, is_output: bool) -> io::Result<()> {
            if self.fail_on == Some(name) {
                return Err(io::Error::other("agent unavailable"));
            }
            self.published
                .lock()
                .unwrap()
                .push((name.to_string(), value.to_string(), is_output));
            Ok(())
        }
    }

    fn declarations() -> DeclarationRegistry {
        let mut registry = DeclarationRegistry::from_declarations([
            Declaration::new("BuildId").exported(),
            Declaration::new("Channel").exported().with_default("stable"),
            Declaration::new("Configuration"),
        ])
        .unwrap();
        registry.set_value("BuildId", "42").unwrap();
        registry
    }

    #[test]
    fn test_publishes_on_success_and_failure() {
        let context = Arc::new(RecordingContext::default());
        let propagator = OutputVariablePropagator::new(context.clone());
        let target = Target::new("Pack");
        let registry = declarations();

        propagator.on_succeeded(&target, &registry).unwrap();
        propagator.on_failed(&target, &registry).unwrap();

        let published = context.published.lock().unwrap();
        let expected = vec![
            ("BuildId".to_string(), "42".to_string(), true),
            ("Channel".to_string(), "stable".to_string(), true),
        ];
        assert_eq!(published[..2], expected[..]);
        assert_eq!(published[2..], expected[..]);
    }

    #[test]
    fn test_unset_value_publishes_empty() {
        let context = Arc::new(RecordingContext::default());
        let propagator = OutputVariablePropagator::new(context.clone());
        let registry =
            DeclarationRegistry::from_declarations([Declaration::new("Version").exported()])
                .unwrap();

        propagator.on_succeeded(&Target::new("A"), &registry).unwrap();
        assert_eq!(
            context.published.lock().unwrap()[0],
            ("Version".to_string(), String::new(), true)
        );
    }

    #[test]
    fn test_failure_does_not_stop_remaining_variables() {
        let context = Arc::new(RecordingContext {
            fail_on: Some("BuildId"),
            ..RecordingContext::default()
        });
        let propagator = OutputVariablePropagator::new(context.clone());

        let err = propagator
            .on_failed(&Target::new("A"), &declarations())
            .unwrap_err();
        assert_eq!(err.to_string(), "agent unavailable");
        assert_eq!(context.published.lock().unwrap().len(), 1);
    }
}
