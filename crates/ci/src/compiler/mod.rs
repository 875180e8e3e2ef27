//! Compiler from the target graph to the pipeline IR
//!
//! One stage per configured image; within each stage one job per relevant
//! target, in relevance order. Each job's steps run in a fixed order:
//! cache, artifact downloads, pre-steps, the run-command step, post-steps,
//! artifact publishes.

pub mod artifacts;

use crate::binder::{self, BoundValues};
use crate::extensions::StepExtensions;
use crate::ir::{
    EntryPoint, EnvImport, Filter, ImportSource, IrValidator, Job, PipelineIr,
    PullRequestTrigger, RunCommand, Stage, Step, Trigger,
};
use artifacts::{artifact_name, artifact_paths, root_relative};
use miette::Diagnostic;
use pipewright_core::{
    DeclarationRegistry, FilterConfig, Manifest, PipelineConfig, PullRequestConfig, Target,
    TriggerConfig,
};
use pipewright_target_graph::TargetGraph;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

/// Script locations searched, relative to the root, when no global tool is
/// configured.
const SCRIPT_PATTERNS: [&str; 2] = ["build.sh", "*/build.sh"];

/// Compiler errors
#[derive(Debug, Error, Diagnostic)]
pub enum CompilerError {
    /// The target graph has no topological order
    #[error("Cyclic dependency between targets: {}", targets.join(", "))]
    #[diagnostic(
        code(pipewright::compiler::cycle),
        help("Remove one of the dependsOn or triggers edges between these targets")
    )]
    CyclicDependency {
        /// Targets on the cycle
        targets: Vec<String>,
    },

    /// An artifact rule names a target outside `dependsOn`
    #[error("Target '{target}' consumes artifacts of '{dependency}', which it does not depend on")]
    #[diagnostic(
        code(pipewright::compiler::artifact_rule),
        help("Add '{dependency}' to the dependsOn list of '{target}'")
    )]
    UnresolvedArtifactRule {
        /// Target declaring the rule
        target: String,
        /// Target the rule names
        dependency: String,
    },

    /// No build script and no global tool
    #[error("No build script found (searched {searched})")]
    #[diagnostic(
        code(pipewright::compiler::missing_path),
        help("Add a build.sh to the repository or configure a globalTool")
    )]
    MissingRequiredPath {
        /// Patterns that were tried
        searched: String,
    },

    /// An invoked target is not declared
    #[error("Unknown target '{name}'")]
    #[diagnostic(code(pipewright::compiler::unknown_target))]
    UnknownTarget {
        /// Name as invoked
        name: String,
    },

    /// The backend instance has no images
    #[error("Pipeline configuration lists no images")]
    #[diagnostic(
        code(pipewright::compiler::no_images),
        help("Set at least one entry in 'images'")
    )]
    NoImages,

    /// The built IR failed structural validation
    #[error("Pipeline validation failed: {0}")]
    #[diagnostic(code(pipewright::compiler::validation))]
    Validation(String),

    /// Any other graph construction error
    #[error("{0}")]
    #[diagnostic(code(pipewright::compiler::graph))]
    Graph(pipewright_target_graph::Error),

    /// Error from the core crate
    #[error(transparent)]
    #[diagnostic(transparent)]
    Core(#[from] pipewright_core::Error),
}

impl From<pipewright_target_graph::Error> for CompilerError {
    fn from(error: pipewright_target_graph::Error) -> Self {
        match error {
            pipewright_target_graph::Error::CycleDetected { targets } => {
                Self::CyclicDependency { targets }
            }
            pipewright_target_graph::Error::UnknownTarget { name } => Self::UnknownTarget { name },
            other => Self::Graph(other),
        }
    }
}

/// Build the target graph, rejecting cycles and dangling references.
///
/// # Errors
///
/// Returns [`CompilerError::CyclicDependency`] for cycles and
/// [`CompilerError::Graph`] for duplicates or missing targets.
pub fn build_graph(
    targets: impl IntoIterator<Item = Target>,
) -> Result<TargetGraph<Target>, CompilerError> {
    let graph = TargetGraph::from_targets(targets.into_iter().map(|t| (t.name.clone(), t)))?;
    Ok(graph)
}

/// Compiles the target graph into pipeline IR, once per backend instance.
#[derive(Debug)]
pub struct Compiler {
    graph: TargetGraph<Target>,
    declarations: DeclarationRegistry,
    extensions: StepExtensions,
    root: PathBuf,
}

impl Compiler {
    /// Create a compiler over `targets`, with paths resolved against `root`.
    ///
    /// # Errors
    ///
    /// Returns an error if the targets do not form a valid graph.
    pub fn new(
        targets: impl IntoIterator<Item = Target>,
        declarations: DeclarationRegistry,
        root: impl Into<PathBuf>,
    ) -> Result<Self, CompilerError> {
        Ok(Self {
            graph: build_graph(targets)?,
            declarations,
            extensions: StepExtensions::default(),
            root: root.into(),
        })
    }

    /// Create a compiler from a loaded manifest.
    ///
    /// # Errors
    ///
    /// Returns an error for invalid declarations or an invalid graph.
    pub fn from_manifest(manifest: &Manifest, root: impl Into<PathBuf>) -> Result<Self, CompilerError> {
        Self::new(manifest.targets.clone(), manifest.registry()?, root)
    }

    /// Splice pre- and post-steps into the jobs of matching targets
    #[must_use]
    pub fn with_extensions(mut self, extensions: StepExtensions) -> Self {
        self.extensions = extensions;
        self
    }

    /// Repository root artifact and script paths are relative to
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Declarations the binder reads
    #[must_use]
    pub const fn declarations(&self) -> &DeclarationRegistry {
        &self.declarations
    }

    /// Local run order for an invocation: the same targets, in the same
    /// order, as every generated job set.
    ///
    /// # Errors
    ///
    /// Returns [`CompilerError::UnknownTarget`] for undeclared names.
    pub fn execution_plan<I, S>(&self, invoked: I) -> Result<Vec<String>, CompilerError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Ok(self.graph.resolve_names(invoked)?)
    }

    /// Compile one backend instance's configuration to IR.
    ///
    /// # Errors
    ///
    /// Fails on unknown invoked targets, artifact rules against
    /// non-dependencies, a missing build script, or an invalid result.
    pub fn compile(&self, config: &PipelineConfig) -> Result<PipelineIr, CompilerError> {
        if config.images.is_empty() {
            return Err(CompilerError::NoImages);
        }

        let relevant = self.graph.resolve(&config.invoked_targets)?;
        let targets: Vec<&Target> = relevant.iter().map(|node| &node.target).collect();
        let names: Vec<&str> = relevant.iter().map(|node| node.name.as_str()).collect();
        debug!(invoked = ?config.invoked_targets, relevant = ?names, "Compiling pipeline");

        let bound = binder::bind(&self.declarations, &targets, config);
        let entry_point = self.entry_point(config)?;

        let jobs = targets
            .iter()
            .map(|target| self.job(target, &names, &bound, &entry_point, config))
            .collect::<Result<Vec<_>, _>>()?;

        let stages = config
            .images
            .iter()
            .map(|image| Stage {
                name: stage_name(image),
                display_name: image.clone(),
                image: image.clone(),
                dependencies: Vec::new(),
                jobs: jobs.clone(),
            })
            .collect();

        let ir = PipelineIr {
            parameters: bound.parameters,
            variable_groups: config.import_variable_groups.clone(),
            variables: bound.variables,
            trigger: push_trigger(&config.trigger),
            pull_request_trigger: pull_request_trigger(&config.pull_requests),
            stages,
        };

        IrValidator::new(&ir).validate().map_err(|errors| {
            let messages: Vec<String> = errors.iter().map(ToString::to_string).collect();
            CompilerError::Validation(messages.join(", "))
        })?;

        info!(
            stages = ir.stages.len(),
            jobs = jobs.len(),
            "Compiled pipeline"
        );
        Ok(ir)
    }

    fn job(
        &self,
        target: &Target,
        relevant: &[&str],
        bound: &BoundValues,
        entry_point: &EntryPoint,
        config: &PipelineConfig,
    ) -> Result<Job, CompilerError> {
        let mut steps = Vec::new();

        if !config.cache_key_files.is_empty() {
            steps.push(Step::Cache {
                key_files: config.cache_key_files.clone(),
                path: config.cache_path.clone(),
            });
        }

        steps.extend(self.downloads(target)?);
        steps.extend(self.extensions.pre_steps(&target.name).iter().cloned());
        steps.push(Step::RunCommand(RunCommand {
            invoked_targets: self.chain(target, relevant)?,
            partition_size: target.partitions(),
            imports: imports(config),
            working_directory: config.working_directory.clone(),
            entry_point: entry_point.clone(),
        }));
        steps.extend(self.extensions.post_steps(&target.name).iter().cloned());
        steps.extend(self.publishes(target));

        Ok(Job {
            name: target.name.clone(),
            display_name: target.name.clone(),
            dependencies: self.job_dependencies(target, relevant),
            parallel: target.partitions().unwrap_or(1),
            steps,
            variables: bound.exported.clone(),
        })
    }

    /// Relevant direct dependencies, then relevant targets that trigger this
    /// one, each in declaration order.
    fn job_dependencies(&self, target: &Target, relevant: &[&str]) -> Vec<String> {
        let mut dependencies: Vec<String> = target
            .depends_on
            .iter()
            .filter(|dep| relevant.contains(&dep.as_str()))
            .cloned()
            .collect();

        let triggered_by = self.graph.iter_nodes().map(|(_, node)| node).filter(|node| {
            node.target.triggers.contains(&target.name) && relevant.contains(&node.name.as_str())
        });
        for node in triggered_by {
            if !dependencies.contains(&node.name) {
                dependencies.push(node.name.clone());
            }
        }
        dependencies
    }

    /// Transitive dependencies within the relevant set, in relevance order,
    /// followed by the target itself.
    fn chain(&self, target: &Target, relevant: &[&str]) -> Result<Vec<String>, CompilerError> {
        let dependencies = self.graph.transitive_dependencies(&target.name)?;
        Ok(relevant
            .iter()
            .filter(|name| dependencies.contains(**name))
            .map(|name| (*name).to_string())
            .chain(std::iter::once(target.name.clone()))
            .collect())
    }

    fn downloads(&self, target: &Target) -> Result<Vec<Step>, CompilerError> {
        let mut names = HashSet::new();
        let mut steps = Vec::new();

        for rule in &target.artifact_dependencies {
            let upstream = target
                .depends_on
                .contains(&rule.target)
                .then(|| self.graph.get_node_by_name(&rule.target))
                .flatten()
                .ok_or_else(|| CompilerError::UnresolvedArtifactRule {
                    target: target.name.clone(),
                    dependency: rule.target.clone(),
                })?;

            let patterns = if rule.paths.is_empty() {
                &upstream.target.artifact_products
            } else {
                &rule.paths
            };

            for path in artifact_paths(&self.root, patterns) {
                let name = artifact_name(&path);
                if names.insert(name.clone()) {
                    steps.push(Step::DownloadArtifact {
                        artifact_name: name,
                        download_path: "./".to_string(),
                    });
                }
            }
        }
        Ok(steps)
    }

    fn publishes(&self, target: &Target) -> Vec<Step> {
        artifact_paths(&self.root, &target.artifact_products)
            .into_iter()
            .map(|path| Step::PublishArtifact {
                artifact_name: artifact_name(&path),
                path_to_publish: path,
            })
            .collect()
    }

    fn entry_point(&self, config: &PipelineConfig) -> Result<EntryPoint, CompilerError> {
        if let Some(tool) = &config.global_tool {
            return Ok(EntryPoint::GlobalTool {
                install_command: Some(tool.install_command()),
                executable: tool.executable().to_string(),
            });
        }

        let escaped_root = glob::Pattern::escape(&self.root.to_string_lossy());
        for pattern in SCRIPT_PATTERNS {
            let Ok(paths) = glob::glob(&format!("{escaped_root}/{pattern}")) else {
                continue;
            };
            if let Some(found) = paths.filter_map(Result::ok).find(|p| p.is_file()) {
                let path = root_relative(&self.root, &found.to_string_lossy());
                debug!(%path, "Found build script");
                return Ok(EntryPoint::Script { path });
            }
        }

        Err(CompilerError::MissingRequiredPath {
            searched: SCRIPT_PATTERNS.join(", "),
        })
    }
}

/// Stage identifier derived from an image name.
fn stage_name(image: &str) -> String {
    image.replace(['-', '.'], "_")
}

fn imports(config: &PipelineConfig) -> Vec<EnvImport> {
    let token = config
        .import_system_access_token_as
        .iter()
        .map(|alias| EnvImport {
            name: alias.clone(),
            source: ImportSource::SystemAccessToken,
        });
    let secrets = config.import_secrets.iter().map(|secret| EnvImport {
        name: secret.clone(),
        source: ImportSource::Secret(secret.clone()),
    });
    token.chain(secrets).collect()
}

fn filter(config: &FilterConfig) -> Filter {
    Filter {
        include: config.include.clone(),
        exclude: config.exclude.clone(),
    }
}

fn push_trigger(config: &TriggerConfig) -> Option<Trigger> {
    (!config.is_default()).then(|| Trigger {
        disabled: config.disabled,
        batch: config.batch,
        branches: filter(&config.branches),
        tags: filter(&config.tags),
        paths: filter(&config.paths),
    })
}

fn pull_request_trigger(config: &PullRequestConfig) -> Option<PullRequestTrigger> {
    (!config.is_default()).then(|| PullRequestTrigger {
        disabled: config.disabled,
        auto_cancel: config.auto_cancel,
        branches: filter(&config.branches),
        paths: filter(&config.paths),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::InputMap;
    use pipewright_core::GlobalToolConfig;

    fn tool_config(invoked: &[&str]) -> PipelineConfig {
        let mut config = PipelineConfig::new(["ubuntu-latest"], invoked);
        config.global_tool = Some(GlobalToolConfig {
            package: "pipewright-host".to_string(),
            ..GlobalToolConfig::default()
        });
        config
    }

    fn compiler(targets: Vec<Target>) -> Compiler {
        Compiler::new(targets, DeclarationRegistry::new(), "/repo").unwrap()
    }

    fn step_kinds(job: &Job) -> Vec<&'static str> {
        job.steps
            .iter()
            .map(|step| match step {
                Step::Checkout { .. } => "checkout",
                Step::Cache { .. } => "cache",
                Step::DownloadArtifact { .. } => "download",
                Step::RunCommand(_) => "run",
                Step::PublishArtifact { .. } => "publish",
                Step::Task { .. } => "task",
                Step::Template { .. } => "template",
            })
            .collect()
    }

    #[test]
    fn test_dependency_chain_per_job() {
        let compiler = compiler(vec![
            Target::new("A"),
            Target::new("B").depends_on(["A"]),
        ]);
        let ir = compiler.compile(&tool_config(&["B"])).unwrap();

        let jobs = &ir.stages[0].jobs;
        assert_eq!(jobs.len(), 2);
        assert_eq!(jobs[0].name, "A");
        assert_eq!(jobs[1].dependencies, vec!["A"]);
        assert_eq!(jobs[0].run_command().unwrap().invoked_targets, vec!["A"]);
        assert_eq!(jobs[1].run_command().unwrap().invoked_targets, vec!["A", "B"]);
    }

    #[test]
    fn test_triggered_job_waits_for_trigger() {
        let compiler = compiler(vec![
            Target::new("Pack").triggers(["Announce"]),
            Target::new("Announce"),
            Target::new("Mirror").triggers(["Announce"]),
        ]);
        let ir = compiler.compile(&tool_config(&["Pack"])).unwrap();

        let names: Vec<_> = ir.stages[0].jobs.iter().map(|j| j.name.as_str()).collect();
        assert_eq!(names, vec!["Pack", "Announce"]);
        let announce = &ir.stages[0].jobs[1];
        // Mirror is not relevant, so only Pack is waited on.
        assert_eq!(announce.dependencies, vec!["Pack"]);
        assert_eq!(compiler.execution_plan(["Pack"]).unwrap(), vec!["Pack", "Announce"]);
    }

    #[test]
    fn test_stage_per_image() {
        let compiler = compiler(vec![Target::new("A")]);
        let mut config = tool_config(&["A"]);
        config.images = vec!["ubuntu-22.04".to_string(), "windows-latest".to_string()];
        let ir = compiler.compile(&config).unwrap();

        let names: Vec<_> = ir.stages.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["ubuntu_22_04", "windows_latest"]);
        assert_eq!(ir.stages[0].display_name, "ubuntu-22.04");
        assert!(ir.stages.iter().all(|s| s.dependencies.is_empty()));
    }

    #[test]
    fn test_step_order() {
        let mut extensions = StepExtensions::new();
        extensions.add_pre_step("Pack", Step::task("UseDotNet@2", InputMap::new()));
        extensions.add_post_step("Pack", Step::template("sign.yml@tools", InputMap::new()));

        let compiler = compiler(vec![
            Target::new("Compile").produces("/repo/bin/*.dll"),
            Target::new("Pack")
                .depends_on(["Compile"])
                .consumes("Compile", Vec::<String>::new())
                .produces("/repo/output/**/*.nupkg"),
        ])
        .with_extensions(extensions);

        let mut config = tool_config(&["Pack"]);
        config.cache_key_files = vec!["**/Cargo.lock".to_string()];
        let ir = compiler.compile(&config).unwrap();

        let pack = &ir.stages[0].jobs[1];
        assert_eq!(
            step_kinds(pack),
            vec!["cache", "download", "task", "run", "template", "publish"]
        );
        assert!(matches!(
            &pack.steps[1],
            Step::DownloadArtifact { artifact_name, .. } if artifact_name == "bin"
        ));
        assert!(matches!(
            &pack.steps[5],
            Step::PublishArtifact { artifact_name, path_to_publish }
                if artifact_name == "output" && path_to_publish == "output"
        ));
    }

    #[test]
    fn test_artifact_rule_requires_dependency() {
        let compiler = compiler(vec![
            Target::new("Compile"),
            Target::new("Pack").consumes("Compile", ["bin"]),
        ]);
        let err = compiler.compile(&tool_config(&["Compile", "Pack"])).unwrap_err();
        assert!(matches!(
            err,
            CompilerError::UnresolvedArtifactRule { ref target, ref dependency }
                if target == "Pack" && dependency == "Compile"
        ));
    }

    #[test]
    fn test_partitioned_target() {
        let compiler = compiler(vec![Target::new("Test").partitioned(4)]);
        let ir = compiler.compile(&tool_config(&["Test"])).unwrap();

        let job = &ir.stages[0].jobs[0];
        assert_eq!(job.parallel, 4);
        assert_eq!(job.run_command().unwrap().partition_size, Some(4));
    }

    #[test]
    fn test_triggers_absent_by_default() {
        let compiler = compiler(vec![Target::new("A")]);
        let mut config = tool_config(&["A"]);
        let ir = compiler.compile(&config).unwrap();
        assert!(ir.trigger.is_none());
        assert!(ir.pull_request_trigger.is_none());

        config.trigger.branches.include = vec!["main".to_string()];
        let ir = compiler.compile(&config).unwrap();
        assert_eq!(ir.trigger.unwrap().branches.include, vec!["main"]);
    }

    #[test]
    fn test_imports_token_then_secrets() {
        let compiler = compiler(vec![Target::new("A")]);
        let mut config = tool_config(&["A"]);
        config.import_system_access_token_as = Some("GITHUB_TOKEN".to_string());
        config.import_secrets = vec!["NUGET_KEY".to_string()];
        let ir = compiler.compile(&config).unwrap();

        let imports = &ir.stages[0].jobs[0].run_command().unwrap().imports;
        assert_eq!(imports[0].source, ImportSource::SystemAccessToken);
        assert_eq!(imports[1].source, ImportSource::Secret("NUGET_KEY".to_string()));
    }

    #[test]
    fn test_script_discovery() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("scripts")).unwrap();
        std::fs::write(dir.path().join("scripts/build.sh"), "#!/bin/sh\n").unwrap();

        let compiler =
            Compiler::new([Target::new("A")], DeclarationRegistry::new(), dir.path()).unwrap();
        let config = PipelineConfig::new(["ubuntu-latest"], &["A"]);
        let ir = compiler.compile(&config).unwrap();

        assert_eq!(
            ir.stages[0].jobs[0].run_command().unwrap().entry_point,
            EntryPoint::Script {
                path: "scripts/build.sh".to_string()
            }
        );
    }

    #[test]
    fn test_missing_script() {
        let dir = tempfile::tempdir().unwrap();
        let compiler =
            Compiler::new([Target::new("A")], DeclarationRegistry::new(), dir.path()).unwrap();
        let config = PipelineConfig::new(["ubuntu-latest"], &["A"]);

        assert!(matches!(
            compiler.compile(&config),
            Err(CompilerError::MissingRequiredPath { .. })
        ));
    }

    #[test]
    fn test_graph_errors_map() {
        let err = build_graph([
            Target::new("A").depends_on(["B"]),
            Target::new("B").depends_on(["A"]),
        ])
        .unwrap_err();
        assert!(matches!(err, CompilerError::CyclicDependency { ref targets } if targets.len() == 2));

        let compiler = compiler(vec![Target::new("A")]);
        assert!(matches!(
            compiler.compile(&tool_config(&["Missing"])),
            Err(CompilerError::UnknownTarget { .. })
        ));
        assert!(matches!(
            compiler.compile(&PipelineConfig::new(Vec::<String>::new(), &["A"])),
            Err(CompilerError::NoImages)
        ));
    }

    #[test]
    fn test_execution_plan_matches_jobs() {
        let compiler = compiler(vec![
            Target::new("Clean"),
            Target::new("Restore"),
            Target::new("Compile").depends_on(["Restore"]),
            Target::new("Test").depends_on(["Compile"]),
        ]);
        let plan = compiler.execution_plan(["Test"]).unwrap();
        let ir = compiler.compile(&tool_config(&["Test"])).unwrap();
        let jobs: Vec<_> = ir.stages[0].jobs.iter().map(|j| j.name.clone()).collect();

        assert_eq!(plan, vec!["Restore", "Compile", "Test"]);
        assert_eq!(plan, jobs);
    }
}
