//! Azure Pipelines Emitter
//!
//! Renders the pipeline IR as an `azure-pipelines.yml` file.

use pipewright_ci::emitter::{Emitter, EmitterError, EmitterResult};
use pipewright_ci::ir::{
    CheckoutKind, EntryPoint, EnvImport, Filter, ImportSource, InputMap, InputValue, Job,
    Parameter, PipelineIr, PullRequestTrigger, Resource, RunCommand, Stage, Step, Trigger,
    Variable, VariableValue,
};
use pipewright_ci::writer::{BlockWriter, single_quote};
use indexmap::IndexMap;

/// Azure's expression for the current slot of a parallel job.
pub const PARALLEL_SLOT: &str = "$(System.JobPositionInPhase)";

const BANNER: [&str; 9] = [
    "------------------------------------------------------------------------------",
    "<auto-generated>",
    "",
    "    This file was generated by pipewright.",
    "",
    "    Changes to this file may cause incorrect behavior and will be lost if",
    "    the code is regenerated.",
    "</auto-generated>",
    "------------------------------------------------------------------------------",
];

/// Azure Pipelines YAML emitter
///
/// | IR | Azure Pipelines |
/// |----|-----------------|
/// | `Stage` | `- stage:` with a `vmImage` pool |
/// | `Job` | `- job:` with `dependsOn`, `strategy.parallel` |
/// | `Step::RunCommand` | `CmdLine@2` task named `CmdLine` |
/// | `Step::Cache` | `Cache@2` |
/// | `Step::DownloadArtifact` | `DownloadBuildArtifacts@0` |
/// | `Step::PublishArtifact` | `PublishBuildArtifacts@1` |
#[derive(Debug, Clone, Copy, Default)]
pub struct AzurePipelinesEmitter;

impl AzurePipelinesEmitter {
    /// Emitter with the standard layout
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    fn write_parameters(writer: &mut BlockWriter, parameters: &[Parameter]) -> EmitterResult<()> {
        {
            let mut block = writer.block("parameters:");
            for parameter in parameters {
                let mut entry = block.block(format!("- name: {}", parameter.name));
                if let Some(display_name) = &parameter.display_name {
                    entry.line(format!("displayName: {}", single_quote(display_name)));
                }
                entry.line(format!("type: {}", parameter.kind.as_str()));
                if let Some(default) = &parameter.default {
                    entry.yaml_entry("default", default)?;
                }
                if !parameter.values.is_empty() {
                    entry.yaml_entry("values", &InputValue::from(parameter.values.clone()))?;
                }
            }
        }
        writer.blank();
        Ok(())
    }

    fn write_resources(writer: &mut BlockWriter, resources: &[Resource]) {
        {
            let mut block = writer.block("resources:");
            let mut repositories = block.block("repositories:");
            for resource in resources {
                let mut entry = repositories.block(format!("- repository: {}", resource.repository));
                entry.line("type: git");
                entry.line(format!("name: {}", resource.name));
            }
        }
        writer.blank();
    }

    fn write_variables(writer: &mut BlockWriter, groups: &[String], variables: &[Variable]) {
        {
            let mut block = writer.block("variables:");
            for group in groups {
                block.line(format!("- group: {group}"));
            }
            for variable in variables {
                let value = match &variable.value {
                    VariableValue::Parameter(name) => format!("${{{{ parameters.{name} }}}}"),
                    VariableValue::Literal(text) => single_quote(text.as_deref().unwrap_or_default()),
                };
                let mut entry = block.block(format!("- name: {}", variable.name));
                entry.line(format!("value: {value}"));
            }
        }
        writer.blank();
    }

    fn write_filter(writer: &mut BlockWriter, key: &str, filter: &Filter) {
        if filter.is_empty() {
            return;
        }
        let mut block = writer.block(format!("{key}:"));
        for (name, items) in [("include", &filter.include), ("exclude", &filter.exclude)] {
            if items.is_empty() {
                continue;
            }
            let mut list = block.block(format!("{name}:"));
            for item in items {
                list.line(format!("- {}", single_quote(item)));
            }
        }
    }

    fn write_trigger(writer: &mut BlockWriter, trigger: &Trigger) {
        if trigger.disabled {
            writer.line("trigger: none");
        } else {
            let mut block = writer.block("trigger:");
            if trigger.batch {
                block.line("batch: true");
            }
            Self::write_filter(&mut block, "branches", &trigger.branches);
            Self::write_filter(&mut block, "tags", &trigger.tags);
            Self::write_filter(&mut block, "paths", &trigger.paths);
        }
        writer.blank();
    }

    fn write_pull_request(writer: &mut BlockWriter, pr: &PullRequestTrigger) {
        if pr.disabled {
            writer.line("pr: none");
        } else {
            let mut block = writer.block("pr:");
            if let Some(auto_cancel) = pr.auto_cancel {
                block.line(format!("autoCancel: {auto_cancel}"));
            }
            Self::write_filter(&mut block, "branches", &pr.branches);
            Self::write_filter(&mut block, "paths", &pr.paths);
        }
        writer.blank();
    }

    fn write_stage(writer: &mut BlockWriter, stage: &Stage) -> EmitterResult<()> {
        let mut block = writer.block(format!("- stage: {}", stage.name));
        block.line(format!("displayName: {}", single_quote(&stage.display_name)));
        block.line(format!("dependsOn: {}", inline_list(&stage.dependencies)));
        {
            let mut pool = block.block("pool:");
            pool.line(format!("vmImage: {}", single_quote(&stage.image)));
        }
        let mut jobs = block.block("jobs:");
        for job in &stage.jobs {
            Self::write_job(&mut jobs, job)?;
        }
        Ok(())
    }

    fn write_job(writer: &mut BlockWriter, job: &Job) -> EmitterResult<()> {
        let mut block = writer.block(format!("- job: {}", job.name));
        block.line(format!("displayName: {}", single_quote(&job.display_name)));
        block.line(format!("dependsOn: {}", inline_list(&job.dependencies)));

        if job.parallel > 1 {
            let mut strategy = block.block("strategy:");
            strategy.line(format!("parallel: {}", job.parallel));
        }

        // Outputs are read from the last dependency only.
        if let Some(last) = job.dependencies.last()
            && !job.variables.is_empty()
        {
            let mut variables = block.block("variables:");
            for name in &job.variables {
                variables.line(format!(
                    "{name}: $[ dependencies.{last}.outputs['CmdLine.{name}'] ]"
                ));
            }
        }

        let mut steps = block.block("steps:");
        for step in &job.steps {
            Self::write_step(&mut steps, step)?;
        }
        Ok(())
    }

    fn write_step(writer: &mut BlockWriter, step: &Step) -> EmitterResult<()> {
        match step {
            Step::Checkout { kind, submodules } => {
                let kind = match kind {
                    CheckoutKind::SelfRepo => "self",
                    CheckoutKind::None => "none",
                };
                let mut block = writer.block(format!("- checkout: {kind}"));
                if *submodules {
                    block.line("submodules: true");
                }
            }
            Step::Cache { key_files, path } => {
                let mut block = writer.block("- task: Cache@2");
                block.line(format!(
                    "displayName: {}",
                    single_quote(&format!("Cache: {}", key_files.join(", ")))
                ));
                let mut inputs = block.block("inputs:");
                let key = std::iter::once("$(Agent.OS)")
                    .chain(std::iter::once("cache"))
                    .chain(key_files.iter().map(String::as_str))
                    .collect::<Vec<_>>()
                    .join(" | ");
                inputs.line(format!("key: {}", single_quote(&key)));
                inputs.line(format!("restoreKeys: {}", single_quote("$(Agent.OS) | cache")));
                inputs.line(format!("path: {}", single_quote(path)));
            }
            Step::DownloadArtifact {
                artifact_name,
                download_path,
            } => {
                let mut block = writer.block("- task: DownloadBuildArtifacts@0");
                block.line(format!(
                    "displayName: {}",
                    single_quote(&format!("Download: {artifact_name}"))
                ));
                let mut inputs = block.block("inputs:");
                inputs.line(format!("artifactName: {}", single_quote(artifact_name)));
                inputs.line(format!("downloadPath: {}", single_quote(download_path)));
            }
            Step::RunCommand(run) => Self::write_run_command(writer, run)?,
            Step::PublishArtifact {
                artifact_name,
                path_to_publish,
            } => {
                let mut block = writer.block("- task: PublishBuildArtifacts@1");
                block.line(format!(
                    "displayName: {}",
                    single_quote(&format!("Publish: {artifact_name}"))
                ));
                let mut inputs = block.block("inputs:");
                inputs.line(format!("artifactName: {}", single_quote(artifact_name)));
                inputs.line(format!("pathToPublish: {}", single_quote(path_to_publish)));
            }
            Step::Task { task, inputs, env } => {
                let mut block = writer.block(format!("- task: {task}"));
                Self::write_tree(&mut block, "inputs", inputs)?;
                Self::write_env(&mut block, env);
            }
            Step::Template {
                template,
                parameters,
                env,
            } => {
                let mut block = writer.block(format!("- template: {template}"));
                Self::write_tree(&mut block, "parameters", parameters)?;
                Self::write_env(&mut block, env);
            }
        }
        Ok(())
    }

    fn write_run_command(writer: &mut BlockWriter, run: &RunCommand) -> EmitterResult<()> {
        let mut block = writer.block("- task: CmdLine@2");
        block.line(format!(
            "displayName: {}",
            single_quote(&format!("Run: {}", run.invoked_targets.join(", ")))
        ));
        block.line("name: CmdLine");

        let arguments = run.arguments(PARALLEL_SLOT).join(" ");
        {
            let mut inputs = block.block("inputs:");
            match &run.entry_point {
                EntryPoint::Script { path } => {
                    inputs.line(format!(
                        "script: {}",
                        single_quote(&format!("chmod +x ./{path}; ./{path} {arguments}"))
                    ));
                }
                EntryPoint::GlobalTool {
                    install_command,
                    executable,
                } => {
                    let mut script = inputs.block("script: |");
                    if let Some(install) = install_command {
                        script.line(install);
                    }
                    script.line(format!("{executable} {arguments}"));
                }
            }
            if let Some(directory) = &run.working_directory {
                inputs.yaml_entry("workingDirectory", &InputValue::from(directory.as_str()))?;
            }
        }

        if !run.imports.is_empty() {
            let mut env = block.block("env:");
            for EnvImport { name, source } in &run.imports {
                let value = match source {
                    ImportSource::SystemAccessToken => "$(System.AccessToken)".to_string(),
                    ImportSource::Secret(secret) => format!("$({secret})"),
                };
                env.line(format!("{name}: {value}"));
            }
        }
        Ok(())
    }

    fn write_tree(writer: &mut BlockWriter, key: &str, tree: &InputMap) -> EmitterResult<()> {
        if tree.is_empty() {
            return Ok(());
        }
        writer.yaml_entry(key, &InputValue::Map(tree.clone()))
    }

    fn write_env(writer: &mut BlockWriter, env: &IndexMap<String, String>) {
        if env.is_empty() {
            return;
        }
        let mut block = writer.block("env:");
        for (name, value) in env {
            block.line(format!("{name}: {value}"));
        }
    }
}

/// `[ A, B ]`, or `[ ]` when empty
fn inline_list(items: &[String]) -> String {
    if items.is_empty() {
        "[ ]".to_string()
    } else {
        format!("[ {} ]", items.join(", "))
    }
}

/// Azure stage and job identifiers: letters, digits and underscores, not
/// starting with a digit.
fn is_identifier(name: &str) -> bool {
    !name.is_empty()
        && !name.starts_with(|c: char| c.is_ascii_digit())
        && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

impl Emitter for AzurePipelinesEmitter {
    fn emit(&self, ir: &PipelineIr) -> EmitterResult<String> {
        let mut writer = BlockWriter::new(2, "#");
        for line in BANNER {
            writer.comment(line);
        }
        writer.blank();

        if !ir.parameters.is_empty() {
            Self::write_parameters(&mut writer, &ir.parameters)?;
        }

        let resources = ir.resources();
        if !resources.is_empty() {
            Self::write_resources(&mut writer, &resources);
        }

        if !ir.variable_groups.is_empty() || !ir.variables.is_empty() {
            Self::write_variables(&mut writer, &ir.variable_groups, &ir.variables);
        }

        if let Some(trigger) = &ir.trigger {
            Self::write_trigger(&mut writer, trigger);
        }

        if let Some(pr) = &ir.pull_request_trigger {
            Self::write_pull_request(&mut writer, pr);
        }

        {
            let mut stages = writer.block("stages:");
            for stage in &ir.stages {
                Self::write_stage(&mut stages, stage)?;
            }
        }

        Ok(writer.finish())
    }

    fn format_name(&self) -> &'static str {
        "azure-pipelines"
    }

    fn file_extension(&self) -> &'static str {
        "yml"
    }

    fn description(&self) -> &'static str {
        "Azure Pipelines YAML emitter"
    }

    fn validate(&self, ir: &PipelineIr) -> EmitterResult<()> {
        let names = ir
            .stages
            .iter()
            .map(|stage| ("Stage", &stage.name))
            .chain(
                ir.stages
                    .iter()
                    .flat_map(|stage| stage.jobs.iter())
                    .map(|job| ("Job", &job.name)),
            );

        for (kind, name) in names {
            if !is_identifier(name) {
                return Err(EmitterError::InvalidIR(format!(
                    "{kind} name '{name}' is not a valid Azure Pipelines identifier"
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pipewright_ci::ir::ParameterKind;

    fn job(name: &str, dependencies: &[&str], steps: Vec<Step>) -> Job {
        Job {
            name: name.to_string(),
            display_name: name.to_string(),
            dependencies: dependencies.iter().map(|d| (*d).to_string()).collect(),
            parallel: 1,
            steps,
            variables: vec![],
        }
    }

    fn render_job(job: &Job) -> String {
        let mut writer = BlockWriter::new(2, "#");
        AzurePipelinesEmitter::write_job(&mut writer, job).unwrap();
        writer.finish()
    }

    fn render_step(step: &Step) -> String {
        let mut writer = BlockWriter::new(2, "#");
        AzurePipelinesEmitter::write_step(&mut writer, step).unwrap();
        writer.finish()
    }

    fn run(entry_point: EntryPoint) -> RunCommand {
        RunCommand {
            invoked_targets: vec!["Compile".to_string(), "Test".to_string()],
            partition_size: None,
            imports: vec![],
            working_directory: None,
            entry_point,
        }
    }

    #[test]
    fn test_script_run_command() {
        let mut run = run(EntryPoint::Script {
            path: "build.sh".to_string(),
        });
        run.partition_size = Some(4);
        run.imports = vec![
            EnvImport {
                name: "AZURE_TOKEN".to_string(),
                source: ImportSource::SystemAccessToken,
            },
            EnvImport {
                name: "NUGET_KEY".to_string(),
                source: ImportSource::Secret("NUGET_KEY".to_string()),
            },
        ];

        assert_eq!(
            render_step(&Step::RunCommand(run)),
            "- task: CmdLine@2\n\
             \x20 displayName: 'Run: Compile, Test'\n\
             \x20 name: CmdLine\n\
             \x20 inputs:\n\
             \x20   script: 'chmod +x ./build.sh; ./build.sh Compile Test --skip --partition $(System.JobPositionInPhase)/4'\n\
             \x20 env:\n\
             \x20   AZURE_TOKEN: $(System.AccessToken)\n\
             \x20   NUGET_KEY: $(NUGET_KEY)\n"
        );
    }

    #[test]
    fn test_global_tool_run_command() {
        let mut run = run(EntryPoint::GlobalTool {
            install_command: Some("cargo install build-host".to_string()),
            executable: "build-host".to_string(),
        });
        run.working_directory = Some("src".to_string());

        assert_eq!(
            render_step(&Step::RunCommand(run)),
            "- task: CmdLine@2\n\
             \x20 displayName: 'Run: Compile, Test'\n\
             \x20 name: CmdLine\n\
             \x20 inputs:\n\
             \x20   script: |\n\
             \x20     cargo install build-host\n\
             \x20     build-host Compile Test --skip\n\
             \x20   workingDirectory: src\n"
        );
    }

    #[test]
    fn test_job_variables_only_with_dependencies() {
        let mut root = job("Compile", &[], vec![]);
        root.variables = vec!["Version".to_string()];
        assert!(!render_job(&root).contains("variables:"));

        let mut pack = job("Pack", &["Compile", "Test"], vec![]);
        pack.variables = vec!["Version".to_string()];
        pack.parallel = 2;
        assert_eq!(
            render_job(&pack),
            "- job: Pack\n\
             \x20 displayName: 'Pack'\n\
             \x20 dependsOn: [ Compile, Test ]\n\
             \x20 strategy:\n\
             \x20   parallel: 2\n\
             \x20 variables:\n\
             \x20   Version: $[ dependencies.Test.outputs['CmdLine.Version'] ]\n\
             \x20 steps:\n"
        );
    }

    #[test]
    fn test_artifact_and_cache_steps() {
        let cache = Step::Cache {
            key_files: vec!["**/Cargo.lock".to_string()],
            path: "~/.cache".to_string(),
        };
        assert_eq!(
            render_step(&cache),
            "- task: Cache@2\n\
             \x20 displayName: 'Cache: **/Cargo.lock'\n\
             \x20 inputs:\n\
             \x20   key: '$(Agent.OS) | cache | **/Cargo.lock'\n\
             \x20   restoreKeys: '$(Agent.OS) | cache'\n\
             \x20   path: '~/.cache'\n"
        );

        let publish = Step::PublishArtifact {
            artifact_name: "packages".to_string(),
            path_to_publish: "output/packages".to_string(),
        };
        assert!(render_step(&publish).contains("    pathToPublish: 'output/packages'\n"));
    }

    #[test]
    fn test_task_and_template_steps() {
        let mut inputs = InputMap::new();
        inputs.insert("command".to_string(), InputValue::from("restore"));
        inputs.insert("feeds".to_string(), InputValue::from(vec!["main", "mirror"]));
        let mut env = IndexMap::new();
        env.insert("TOKEN".to_string(), "$(System.AccessToken)".to_string());
        let step = Step::Task {
            task: "NuGetCommand@2".to_string(),
            inputs,
            env,
        };

        assert_eq!(
            render_step(&step),
            "- task: NuGetCommand@2\n\
             \x20 inputs:\n\
             \x20   command: restore\n\
             \x20   feeds:\n\
             \x20   - main\n\
             \x20   - mirror\n\
             \x20 env:\n\
             \x20   TOKEN: $(System.AccessToken)\n"
        );

        assert_eq!(
            render_step(&Step::template("steps/sign.yml@tools", InputMap::new())),
            "- template: steps/sign.yml@tools\n"
        );
    }

    #[test]
    fn test_checkout_step() {
        let step = Step::Checkout {
            kind: CheckoutKind::SelfRepo,
            submodules: true,
        };
        assert_eq!(render_step(&step), "- checkout: self\n  submodules: true\n");
    }

    #[test]
    fn test_parameters_render_default_value() {
        let mut writer = BlockWriter::new(2, "#");
        AzurePipelinesEmitter::write_parameters(
            &mut writer,
            &[Parameter {
                name: "verbosity".to_string(),
                display_name: Some("Logging verbosity".to_string()),
                kind: ParameterKind::String,
                default: Some(InputValue::from("normal")),
                values: vec!["quiet".to_string(), "normal".to_string()],
            }],
        )
        .unwrap();

        assert_eq!(
            writer.finish(),
            "parameters:\n\
             \x20 - name: verbosity\n\
             \x20   displayName: 'Logging verbosity'\n\
             \x20   type: string\n\
             \x20   default: normal\n\
             \x20   values:\n\
             \x20     - quiet\n\
             \x20     - normal\n\
             \n"
        );
    }

    #[test]
    fn test_trigger_rendering() {
        let mut writer = BlockWriter::new(2, "#");
        AzurePipelinesEmitter::write_trigger(
            &mut writer,
            &Trigger {
                batch: true,
                branches: Filter {
                    include: vec!["main".to_string()],
                    exclude: vec![],
                },
                ..Trigger::default()
            },
        );
        AzurePipelinesEmitter::write_pull_request(
            &mut writer,
            &PullRequestTrigger {
                disabled: true,
                ..PullRequestTrigger::default()
            },
        );

        assert_eq!(
            writer.finish(),
            "trigger:\n  batch: true\n  branches:\n    include:\n      - 'main'\n\npr: none\n\n"
        );
    }

    #[test]
    fn test_validate_rejects_bad_identifiers() {
        let ir = PipelineIr {
            stages: vec![Stage {
                name: "ubuntu_latest".to_string(),
                display_name: "ubuntu-latest".to_string(),
                image: "ubuntu-latest".to_string(),
                dependencies: vec![],
                jobs: vec![job("run-tests", &[], vec![])],
            }],
            ..PipelineIr::default()
        };

        let err = AzurePipelinesEmitter::new().validate(&ir).unwrap_err();
        assert!(err.to_string().contains("Job name 'run-tests'"));
    }
}
