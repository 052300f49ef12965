//! Workflow runner -- execute a stored workflow step by step.
//!
//! A run loads the workflow once, then walks its steps strictly in order:
//!
//! ```text
//! Idle -> Running(0) -> [Delaying(0)] -> Running(1) -> ... -> Idle
//! ```
//!
//! A failing step never aborts the run; it only makes the final verdict
//! `false`.  Nothing escapes [`WorkflowRunner::run_workflow`]: load errors
//! become a rejected [`RunResult`] with no step entries, and a step that
//! panics is recorded as failed.
//!
//! Only one run at a time is expected.  The runner holds no lock; callers
//! that expose several triggers must serialize them.

use std::sync::Arc;

use tracing::{error, info, warn};

use crate::aggregate::aggregate;
use crate::credit::{FixedCredit, StepCredit};
use crate::delay::DelayController;
use crate::executor::StepExecutor;
use crate::progress::ProgressSink;
use crate::storage::WorkflowStorage;
use crate::workflow::{CommandStep, ExecutionResult, RunResult, Workflow};

/// Message recorded for a step whose execution panicked.
pub const MSG_UNEXPECTED: &str = "Command execution failed unexpectedly";

/// Runs workflows through a [`StepExecutor`].
#[derive(Clone)]
pub struct WorkflowRunner {
    executor: Arc<dyn StepExecutor>,
    delays: DelayController,
    credit: Arc<dyn StepCredit>,
}

impl WorkflowRunner {
    pub fn new(executor: Arc<dyn StepExecutor>) -> Self {
        Self {
            executor,
            delays: DelayController::default(),
            credit: Arc::new(FixedCredit::default()),
        }
    }

    pub fn with_delays(mut self, delays: DelayController) -> Self {
        self.delays = delays;
        self
    }

    /// Policy for the time-saved credit of successful steps.
    pub fn with_credit(mut self, credit: Arc<dyn StepCredit>) -> Self {
        self.credit = credit;
        self
    }

    /// Run the workflow `workflow_id`.
    ///
    /// Fails fast, with zero step results, if the workflow does not exist,
    /// cannot be decoded, or has no steps.
    pub async fn run_workflow(
        &self,
        workflow_id: &str,
        storage: &dyn WorkflowStorage,
        progress: Option<&dyn ProgressSink>,
    ) -> RunResult {
        let workflow = match storage.get_workflow(workflow_id).await {
            Ok(Some(workflow)) => workflow,
            Ok(None) => {
                warn!(workflow_id, "workflow not found");
                return RunResult::rejected(workflow_id, format!("Workflow not found: {workflow_id}"));
            }
            Err(e) => {
                warn!(workflow_id, error = %e, "failed to load workflow");
                return RunResult::rejected(workflow_id, format!("Failed to load workflow: {e}"));
            }
        };

        if workflow.steps.is_empty() {
            warn!(workflow_id, "workflow has no steps");
            return RunResult::rejected(workflow_id, "Workflow has no steps");
        }

        self.run_steps(&workflow, storage, progress).await
    }

    async fn run_steps(
        &self,
        workflow: &Workflow,
        storage: &dyn WorkflowStorage,
        progress: Option<&dyn ProgressSink>,
    ) -> RunResult {
        info!(
            workflow_id = %workflow.id,
            name = %workflow.name,
            steps = workflow.steps.len(),
            "starting workflow run"
        );

        let mut results = Vec::with_capacity(workflow.steps.len());

        for (index, step) in workflow.steps.iter().enumerate() {
            notify(progress, Some(&step.id));

            if index > 0 {
                self.delays
                    .pause_between(&workflow.steps[index - 1], step, progress)
                    .await;
            }

            let result = self.execute_guarded(step).await;

            if result.succeeded {
                self.credit_step(step, &result, storage).await;
            }
            results.push(result);
        }

        notify(progress, None);

        let succeeded = aggregate(&results);
        info!(
            workflow_id = %workflow.id,
            succeeded,
            failed = results.iter().filter(|r| !r.succeeded).count(),
            "workflow run finished"
        );

        RunResult {
            workflow_id: workflow.id.clone(),
            succeeded,
            message: None,
            steps: results,
        }
    }

    /// Execute one step on its own task so a panic is contained.
    async fn execute_guarded(&self, step: &CommandStep) -> ExecutionResult {
        let executor = Arc::clone(&self.executor);
        let owned = step.clone();

        match tokio::spawn(async move { executor.execute(&owned).await }).await {
            Ok(mut result) => {
                result.step_id.clone_from(&step.id);
                result
            }
            Err(e) => {
                error!(step_id = %step.id, error = %e, "step execution aborted");
                ExecutionResult::failure(&step.id, MSG_UNEXPECTED)
            }
        }
    }

    async fn credit_step(
        &self,
        step: &CommandStep,
        result: &ExecutionResult,
        storage: &dyn WorkflowStorage,
    ) {
        let seconds = self.credit.credit(step, result);
        if seconds <= 0 {
            return;
        }
        if let Err(e) = storage.increment_time_saved(seconds).await {
            warn!(step_id = %step.id, error = %e, "failed to credit time saved");
        }
    }
}

fn notify(progress: Option<&dyn ProgressSink>, step_id: Option<&str>) {
    if let Some(sink) = progress {
        sink.notify(step_id);
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
