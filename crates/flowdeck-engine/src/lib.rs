//! Workflow execution engine for flowdeck.
//!
//! This crate provides:
//!
//! - **Data model**: [`Workflow`], [`CommandStep`] and the closed set of
//!   [`StepKind`]s, plus the per-step [`ExecutionResult`] and per-run
//!   [`RunResult`].
//! - **Command executor**: [`CommandExecutor`] runs one step against the OS
//!   capabilities from `flowdeck-adapters`.
//! - **Delay controller**: [`DelayController`] pauses between steps behind
//!   an injectable [`Sleeper`].
//! - **Workflow runner**: [`WorkflowRunner::run_workflow`], the entry point
//!   for every caller.
//! - **Progress**: the [`ProgressSink`] observer and the [`BusProgress`]
//!   adapter onto the kernel's progress bus.
//! - **Aggregation and credit**: [`aggregate`] and the [`StepCredit`] policy.

pub mod aggregate;
pub mod credit;
pub mod delay;
pub mod error;
pub mod executor;
pub mod progress;
pub mod runner;
pub mod storage;
pub mod workflow;

pub use aggregate::aggregate;
pub use credit::{FixedCredit, StepCredit};
pub use delay::{DelayController, Sleeper, TokioSleeper};
pub use error::{EngineError, Result};
pub use executor::{CommandExecutor, StepExecutor, SubCommandResult, is_ide_application};
pub use progress::{BusProgress, NoopProgress, ProgressSink};
pub use runner::WorkflowRunner;
pub use storage::{SqliteStorage, WorkflowStorage};
pub use workflow::{
    CommandStep, ContainerAction, ExecutionResult, RunResult, StepKind, Workflow, steps_to_json,
};
