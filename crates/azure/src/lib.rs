//! Azure Pipelines backend for pipewright
//!
//! Two halves:
//!
//! - [`AzurePipelinesEmitter`] renders the pipeline IR into an
//!   `azure-pipelines.yml` file at generation time.
//! - [`AzurePipelinesHost`] is the [`ExecutionContext`] used while targets
//!   run on an Azure agent, publishing output variables through
//!   `##vso[task.setvariable]` logging commands.
//!
//! # Example
//!
//! ```ignore
//! use pipewright_azure::AzurePipelinesEmitter;
//! use pipewright_ci::{Compiler, Generator};
//!
//! let mut generator = Generator::new(compiler);
//! generator.add_backend(Arc::new(AzurePipelinesEmitter::new()), config);
//! for outcome in generator.generate() {
//!     outcome?;
//! }
//! ```
//!
//! [`ExecutionContext`]: pipewright_ci::ExecutionContext

pub mod emitter;
pub mod host;

pub use emitter::{AzurePipelinesEmitter, PARALLEL_SLOT};
pub use host::AzurePipelinesHost;
