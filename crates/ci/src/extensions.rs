//! Steps injected around a target's run-command step by other components.

use crate::ir::Step;
use std::collections::HashMap;

/// Pre- and post-steps keyed by target name, spliced verbatim into the job.
#[derive(Debug, Clone, Default)]
pub struct StepExtensions {
    pre: HashMap<String, Vec<Step>>,
    post: HashMap<String, Vec<Step>>,
}

impl StepExtensions {
    /// No extensions
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a step to run before `target`'s run-command step.
    pub fn add_pre_step(&mut self, target: impl Into<String>, step: Step) {
        self.pre.entry(target.into()).or_default().push(step);
    }

    /// Add a step to run after `target`'s run-command step.
    pub fn add_post_step(&mut self, target: impl Into<String>, step: Step) {
        self.post.entry(target.into()).or_default().push(step);
    }

    /// Steps placed before `target`'s run-command step
    #[must_use]
    pub fn pre_steps(&self, target: &str) -> &[Step] {
        self.pre.get(target).map_or(&[], Vec::as_slice)
    }

    /// Steps placed after `target`'s run-command step
    #[must_use]
    pub fn post_steps(&self, target: &str) -> &[Step] {
        self.post.get(target).map_or(&[], Vec::as_slice)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::InputMap;

    #[test]
    fn test_steps_keep_insertion_order() {
        let mut extensions = StepExtensions::new();
        extensions.add_pre_step("Pack", Step::task("NuGetAuthenticate@1", InputMap::new()));
        extensions.add_pre_step("Pack", Step::task("UseDotNet@2", InputMap::new()));
        extensions.add_post_step("Pack", Step::template("sign.yml@tools", InputMap::new()));

        assert_eq!(extensions.pre_steps("Pack").len(), 2);
        assert!(matches!(
            &extensions.pre_steps("Pack")[1],
            Step::Task { task, .. } if task == "UseDotNet@2"
        ));
        assert_eq!(extensions.post_steps("Pack").len(), 1);
        assert!(extensions.pre_steps("Test").is_empty());
    }
}
