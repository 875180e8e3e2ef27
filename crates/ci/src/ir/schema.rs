//! Pipeline IR schema types
//!
//! Backend-agnostic model of a generated pipeline: parameters, variables,
//! triggers and Stages → Jobs → Steps. Built fresh for every backend
//! instance and discarded after rendering.

use super::value::{InputMap, InputValue};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Root IR document
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct PipelineIr {
    /// Runtime parameters the pipeline accepts
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub parameters: Vec<Parameter>,

    /// Variable groups imported from the CI host's library
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub variable_groups: Vec<String>,

    /// Pipeline-level variables; parameter shadows first
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub variables: Vec<Variable>,

    /// Push trigger; `None` keeps the backend's default behavior
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trigger: Option<Trigger>,

    /// Pull request trigger; `None` keeps the backend's default behavior
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pull_request_trigger: Option<PullRequestTrigger>,

    /// One stage per image
    pub stages: Vec<Stage>,
}

impl PipelineIr {
    /// External repositories referenced by template steps.
    ///
    /// One entry per distinct repository, in first-seen order.
    #[must_use]
    pub fn resources(&self) -> Vec<Resource> {
        let mut seen = HashSet::new();
        self.steps()
            .filter_map(Step::repository)
            .filter(|repo| seen.insert(*repo))
            .map(|repo| Resource {
                repository: repo.to_string(),
                name: repo.to_string(),
            })
            .collect()
    }

    /// Every step of every job, in document order.
    pub fn steps(&self) -> impl Iterator<Item = &Step> {
        self.stages
            .iter()
            .flat_map(|stage| stage.jobs.iter())
            .flat_map(|job| job.steps.iter())
    }
}

/// IR parameter kinds
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ParameterKind {
    /// Free text
    #[default]
    String,
    /// Numeric value
    Number,
    /// `true` or `false`
    Boolean,
    /// Anything else
    Object,
}

impl ParameterKind {
    /// Lowercase name used in pipeline files
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Number => "number",
            Self::Boolean => "boolean",
            Self::Object => "object",
        }
    }
}

/// Pipeline parameter
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Parameter {
    /// Parameter name
    pub name: String,
    /// Label shown when queueing a run
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    /// Value kind
    pub kind: ParameterKind,
    /// Default value
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<InputValue>,
    /// Allowed values; empty means unrestricted
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub values: Vec<String>,
}

/// Where a variable's value comes from
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum VariableValue {
    /// Fixed text (absent when the declaration has no default)
    Literal(Option<String>),
    /// Shadow of the named pipeline parameter
    Parameter(String),
}

/// Pipeline variable
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Variable {
    /// Variable name
    pub name: String,
    /// Value source
    pub value: VariableValue,
}

impl Variable {
    /// Variable exposing parameter `name` under the same name
    #[must_use]
    pub fn parameter_shadow(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            value: VariableValue::Parameter(name.clone()),
            name,
        }
    }

    /// Variable with fixed text
    #[must_use]
    pub fn literal(name: impl Into<String>, value: Option<String>) -> Self {
        Self {
            name: name.into(),
            value: VariableValue::Literal(value),
        }
    }

    /// Whether this shadows a pipeline parameter
    #[must_use]
    pub const fn is_parameter_variable(&self) -> bool {
        matches!(self.value, VariableValue::Parameter(_))
    }
}

/// External repository resource
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Resource {
    /// Alias used in `template@alias` references
    pub repository: String,
    /// Repository name on the CI host
    pub name: String,
}

/// Include/exclude filter list; empty means no restriction
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct Filter {
    /// Patterns to include
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub include: Vec<String>,
    /// Patterns to exclude
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub exclude: Vec<String>,
}

impl Filter {
    /// Whether neither list has entries
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.include.is_empty() && self.exclude.is_empty()
    }
}

/// Push trigger
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct Trigger {
    /// Turn the push trigger off
    pub disabled: bool,
    /// Batch changes while a run is in progress
    pub batch: bool,
    /// Branch filter
    #[serde(default)]
    pub branches: Filter,
    /// Tag filter
    #[serde(default)]
    pub tags: Filter,
    /// Path filter
    #[serde(default)]
    pub paths: Filter,
}

/// Pull request trigger
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct PullRequestTrigger {
    /// Turn pull request builds off
    pub disabled: bool,
    /// Cancel superseded runs
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auto_cancel: Option<bool>,
    /// Target branch filter
    #[serde(default)]
    pub branches: Filter,
    /// Path filter
    #[serde(default)]
    pub paths: Filter,
}

/// One stage per execution image
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Stage {
    /// Stage identifier
    pub name: String,
    /// Label shown in the CI UI
    pub display_name: String,
    /// Agent image the stage runs on
    pub image: String,
    /// Stages that must finish first
    #[serde(default)]
    pub dependencies: Vec<String>,
    /// Jobs in relevance order
    pub jobs: Vec<Job>,
}

/// One job per relevant target
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    /// Job identifier, the target name
    pub name: String,
    /// Label shown in the CI UI
    pub display_name: String,
    /// Jobs of the target's direct dependencies, then of relevant targets
    /// that trigger it
    #[serde(default)]
    pub dependencies: Vec<String>,
    /// Parallel slices; 1 means no fan-out
    pub parallel: u32,
    /// Steps in execution order
    pub steps: Vec<Step>,
    /// Output variables read from the upstream job
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub variables: Vec<String>,
}

impl Job {
    /// The job's run-command step, if any
    #[must_use]
    pub fn run_command(&self) -> Option<&RunCommand> {
        self.steps.iter().find_map(|step| match step {
            Step::RunCommand(run) => Some(run),
            _ => None,
        })
    }
}

/// What to check out
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CheckoutKind {
    /// The repository being built
    #[serde(rename = "self")]
    SelfRepo,
    /// Skip checkout
    None,
}

/// Where an imported environment variable gets its value
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum ImportSource {
    /// The CI system's access token
    SystemAccessToken,
    /// A secret variable of the given name
    Secret(String),
}

/// Environment variable bound for the run-command step
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EnvImport {
    /// Environment variable name
    pub name: String,
    /// Where the value comes from
    pub source: ImportSource,
}

/// How the build is launched on the agent
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", tag = "kind")]
pub enum EntryPoint {
    /// A checked-in script, as a root-relative unix path
    Script { path: String },
    /// A globally installed tool
    #[serde(rename_all = "camelCase")]
    GlobalTool {
        /// Command installing the tool, if any
        #[serde(skip_serializing_if = "Option::is_none")]
        install_command: Option<String>,
        /// Command name once installed
        executable: String,
    },
}

/// The step that runs a target chain
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RunCommand {
    /// Targets to run, dependencies first, ending with the job's own target
    pub invoked_targets: Vec<String>,
    /// Total slices when the target is partitioned
    #[serde(skip_serializing_if = "Option::is_none")]
    pub partition_size: Option<u32>,
    /// Environment bindings
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub imports: Vec<EnvImport>,
    /// Directory the command runs in
    #[serde(skip_serializing_if = "Option::is_none")]
    pub working_directory: Option<String>,
    /// How the build is launched
    pub entry_point: EntryPoint,
}

impl RunCommand {
    /// Command-line arguments. `slot` is the backend's expression for the
    /// current parallel slot.
    #[must_use]
    pub fn arguments(&self, slot: &str) -> Vec<String> {
        let mut args = self.invoked_targets.clone();
        args.push("--skip".to_string());
        if let Some(total) = self.partition_size {
            args.push("--partition".to_string());
            args.push(format!("{slot}/{total}"));
        }
        args
    }
}

/// A step in a job
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", tag = "type")]
pub enum Step {
    /// Check out a repository
    #[serde(rename_all = "camelCase")]
    Checkout {
        /// What to check out
        kind: CheckoutKind,
        /// Also fetch submodules
        #[serde(default)]
        submodules: bool,
    },
    /// Restore and save a cache directory
    #[serde(rename_all = "camelCase")]
    Cache {
        /// Files hashed into the cache key
        key_files: Vec<String>,
        /// Directory restored and saved
        path: String,
    },
    /// Fetch an artifact published by an upstream job
    #[serde(rename_all = "camelCase")]
    DownloadArtifact {
        /// Artifact to fetch
        artifact_name: String,
        /// Where to put it
        download_path: String,
    },
    /// Run the target chain
    RunCommand(RunCommand),
    /// Publish a directory as an artifact
    #[serde(rename_all = "camelCase")]
    PublishArtifact {
        /// Artifact name
        artifact_name: String,
        /// Directory to publish
        path_to_publish: String,
    },
    /// Invoke a backend task by reference (e.g. `DotNetCoreCLI@2`)
    Task {
        /// Task reference
        task: String,
        /// Task inputs
        #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
        inputs: InputMap,
        /// Environment for the task
        #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
        env: IndexMap<String, String>,
    },
    /// Include a template, optionally from another repository (`path@repo`)
    Template {
        /// Template path, with an optional `@repo` suffix
        template: String,
        /// Template parameters
        #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
        parameters: InputMap,
        /// Environment for the template's steps
        #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
        env: IndexMap<String, String>,
    },
}

impl Step {
    /// Task step with inputs
    #[must_use]
    pub fn task(task: impl Into<String>, inputs: InputMap) -> Self {
        Self::Task {
            task: task.into(),
            inputs,
            env: IndexMap::new(),
        }
    }

    /// Template step with parameters
    #[must_use]
    pub fn template(template: impl Into<String>, parameters: InputMap) -> Self {
        Self::Template {
            template: template.into(),
            parameters,
            env: IndexMap::new(),
        }
    }

    /// Repository a template step pulls from, if external.
    #[must_use]
    pub fn repository(&self) -> Option<&str> {
        match self {
            Self::Template { template, .. } => template
                .rsplit_once('@')
                .map(|(_, repo)| repo)
                .filter(|repo| !repo.is_empty()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job_with(steps: Vec<Step>) -> Job {
        Job {
            name: "job".to_string(),
            display_name: "job".to_string(),
            dependencies: vec![],
            parallel: 1,
            steps,
            variables: vec![],
        }
    }

    #[test]
    fn test_run_command_arguments() {
        let mut run = RunCommand {
            invoked_targets: vec!["A".to_string(), "B".to_string()],
            partition_size: None,
            imports: vec![],
            working_directory: None,
            entry_point: EntryPoint::Script {
                path: "build.sh".to_string(),
            },
        };
        assert_eq!(run.arguments("$(slot)"), vec!["A", "B", "--skip"]);

        run.partition_size = Some(4);
        assert_eq!(
            run.arguments("$(slot)"),
            vec!["A", "B", "--skip", "--partition", "$(slot)/4"]
        );
    }

    #[test]
    fn test_template_repository() {
        assert_eq!(
            Step::template("steps/sign.yml@tools", InputMap::new()).repository(),
            Some("tools")
        );
        assert_eq!(
            Step::template("steps/local.yml", InputMap::new()).repository(),
            None
        );
        assert_eq!(Step::task("Bash@3", InputMap::new()).repository(), None);
    }

    #[test]
    fn test_resources_deduplicate_first_seen() {
        let ir = PipelineIr {
            stages: vec![Stage {
                name: "s".to_string(),
                display_name: "s".to_string(),
                image: "s".to_string(),
                dependencies: vec![],
                jobs: vec![
                    job_with(vec![
                        Step::template("a.yml@templates", InputMap::new()),
                        Step::template("b.yml@other", InputMap::new()),
                    ]),
                    job_with(vec![Step::template("c.yml@templates", InputMap::new())]),
                ],
            }],
            ..PipelineIr::default()
        };

        let repos: Vec<_> = ir.resources().into_iter().map(|r| r.repository).collect();
        assert_eq!(repos, vec!["templates", "other"]);
    }

    #[test]
    fn test_step_serializes_tagged() {
        let step = Step::DownloadArtifact {
            artifact_name: "output".to_string(),
            download_path: "./".to_string(),
        };
        let json = serde_json::to_value(&step).unwrap();
        assert_eq!(json["type"], "downloadArtifact");
        assert_eq!(json["artifactName"], "output");
    }
}
