//! Pipeline: tasks, the dependency graph and the runner.
//!
//! A [`PipelineDefinition`] declares agents and tasks. Building it yields a
//! [`TaskGraph`] with a deterministic execution order, which a
//! [`PipelineRunner`] executes once per run.

pub mod definition;
mod graph;
mod runner;
pub mod task;
pub mod template;

pub use definition::{PipelineDefinition, PipelineOutputs};
pub use graph::{ExecutionPlan, TaskGraph};
pub use runner::{PipelineResult, PipelineRunner, RunObserver, RunStatus, RunnerConfig};
pub use task::{CapabilityCall, FailurePolicy, TaskError, TaskResult, TaskSpec, TaskState};
