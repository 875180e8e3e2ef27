//! IR Validation
//!
//! Structural checks run on every compiled IR before it reaches an emitter.

use super::schema::{PipelineIr, Stage};
use std::collections::HashSet;
use thiserror::Error;

/// Validation errors for IR documents
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    /// The pipeline has no stages
    #[error("Pipeline has no stages")]
    NoStages,

    /// Two stages share a name
    #[error("Stage name '{0}' is used more than once")]
    DuplicateStage(String),

    /// Two jobs in a stage share a name
    #[error("Job '{job}' appears more than once in stage '{stage}'")]
    DuplicateJob {
        /// Stage holding the duplicate
        stage: String,
        /// Repeated job name
        job: String,
    },

    /// A job depends on a job that does not precede it
    #[error("Job '{job}' in stage '{stage}' depends on '{dependency}', which is not an earlier job")]
    DanglingJobDependency {
        /// Stage holding the job
        stage: String,
        /// Job with the dependency
        job: String,
        /// Missing or later job
        dependency: String,
    },

    /// A job has zero parallel slices
    #[error("Job '{job}' has parallelism 0")]
    ZeroParallelism {
        /// Offending job
        job: String,
    },

    /// A job never runs its target
    #[error("Job '{job}' has no run-command step")]
    MissingRunCommand {
        /// Offending job
        job: String,
    },
}

/// Validator for IR documents
pub struct IrValidator<'a> {
    ir: &'a PipelineIr,
}

impl<'a> IrValidator<'a> {
    /// Create a new validator for the given IR
    #[must_use]
    pub const fn new(ir: &'a PipelineIr) -> Self {
        Self { ir }
    }

    /// Validate the entire IR document
    ///
    /// # Errors
    ///
    /// Returns every violation found.
    pub fn validate(&self) -> Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();

        if self.ir.stages.is_empty() {
            errors.push(ValidationError::NoStages);
        }

        let mut stage_names = HashSet::new();
        for stage in &self.ir.stages {
            if !stage_names.insert(stage.name.as_str()) {
                errors.push(ValidationError::DuplicateStage(stage.name.clone()));
            }
            Self::validate_stage(stage, &mut errors);
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Jobs may only depend on jobs declared before them in the same stage
    fn validate_stage(stage: &Stage, errors: &mut Vec<ValidationError>) {
        let mut earlier: HashSet<&str> = HashSet::new();

        for job in &stage.jobs {
            for dependency in &job.dependencies {
                if !earlier.contains(dependency.as_str()) {
                    errors.push(ValidationError::DanglingJobDependency {
                        stage: stage.name.clone(),
                        job: job.name.clone(),
                        dependency: dependency.clone(),
                    });
                }
            }

            if job.parallel == 0 {
                errors.push(ValidationError::ZeroParallelism {
                    job: job.name.clone(),
                });
            }

            if job.run_command().is_none() {
                errors.push(ValidationError::MissingRunCommand {
                    job: job.name.clone(),
                });
            }

            if !earlier.insert(job.name.as_str()) {
                errors.push(ValidationError::DuplicateJob {
                    stage: stage.name.clone(),
                    job: job.name.clone(),
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{EntryPoint, Job, RunCommand, Step};

    fn job(name: &str, deps: &[&str]) -> Job {
        Job {
            name: name.to_string(),
            display_name: name.to_string(),
            dependencies: deps.iter().map(|d| (*d).to_string()).collect(),
            parallel: 1,
            steps: vec![Step::RunCommand(RunCommand {
                invoked_targets: vec![name.to_string()],
                partition_size: None,
                imports: vec![],
                working_directory: None,
                entry_point: EntryPoint::Script {
                    path: "build.sh".to_string(),
                },
            })],
            variables: vec![],
        }
    }

    fn ir_with(jobs: Vec<Job>) -> PipelineIr {
        PipelineIr {
            stages: vec![Stage {
                name: "ubuntu_latest".to_string(),
                display_name: "ubuntu-latest".to_string(),
                image: "ubuntu-latest".to_string(),
                dependencies: vec![],
                jobs,
            }],
            ..PipelineIr::default()
        }
    }

    #[test]
    fn test_valid_ir() {
        let ir = ir_with(vec![job("A", &[]), job("B", &["A"])]);
        assert!(IrValidator::new(&ir).validate().is_ok());
    }

    #[test]
    fn test_empty_ir_has_no_stages() {
        let ir = PipelineIr::default();
        assert_eq!(
            IrValidator::new(&ir).validate().unwrap_err(),
            vec![ValidationError::NoStages]
        );
    }

    #[test]
    fn test_dependency_must_come_first() {
        let ir = ir_with(vec![job("B", &["A"]), job("A", &[])]);
        let errors = IrValidator::new(&ir).validate().unwrap_err();
        assert_eq!(
            errors,
            vec![ValidationError::DanglingJobDependency {
                stage: "ubuntu_latest".to_string(),
                job: "B".to_string(),
                dependency: "A".to_string(),
            }]
        );
    }

    #[test]
    fn test_missing_run_command_and_zero_parallel() {
        let mut broken = job("A", &[]);
        broken.steps.clear();
        broken.parallel = 0;
        let errors = IrValidator::new(&ir_with(vec![broken]))
            .validate()
            .unwrap_err();
        assert_eq!(errors.len(), 2);
    }
}
