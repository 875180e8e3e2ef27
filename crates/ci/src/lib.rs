//! Target graph to CI pipeline compiler.
//!
//! ```text
//! Target graph ─► relevance ─► compiler (+ binder) ─► PipelineIr ─► Emitter ─► file
//! ```
//!
//! Backends implement [`Emitter`] and are looked up by name through an
//! [`EmitterRegistry`]. The runtime half, [`OutputVariablePropagator`],
//! publishes exported values through an [`ExecutionContext`] while targets
//! run on an agent.

pub mod binder;
pub mod compiler;
pub mod context;
pub mod emitter;
pub mod extensions;
pub mod generator;
pub mod ir;
pub mod writer;

pub use binder::{BoundValues, bind};
pub use compiler::{Compiler, CompilerError, build_graph};
pub use context::{ExecutionContext, OutputVariablePropagator, TargetLifecycle};
pub use emitter::{Emitter, EmitterError, EmitterRegistry, EmitterRegistryBuilder, EmitterResult};
pub use extensions::StepExtensions;
pub use generator::{BackendInstance, GenerateError, GeneratedFile, Generator, write_atomic};
pub use writer::BlockWriter;
