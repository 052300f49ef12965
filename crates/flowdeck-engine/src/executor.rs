//! Command executor -- run one step and normalize its outcome.
//!
//! Dispatch is a `match` on [`StepKind`]:
//!
//! - **application**: IDE-like programs are opened with the working
//!   directory first and retried once without it; anything else goes to the
//!   generic path opener.
//! - **terminal command**: either every command line runs captured, in
//!   order, with a short pacing pause between them and a stop at the first
//!   failure, or the whole list is handed to a detached terminal window.
//! - **url**: the generic URL opener.
//! - **container**: guarded start/stop through the container engine.
//!
//! Execution never fails: every error becomes a failed [`ExecutionResult`].

use std::path::Path;
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use async_trait::async_trait;
use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use flowdeck_adapters::{ContainerEngine, Launcher};

use crate::delay::{Sleeper, TokioSleeper};
use crate::workflow::{CommandStep, ContainerAction, ExecutionResult, StepKind};

/// Pause between the command lines of one captured terminal step.
pub const DEFAULT_COMMAND_PACING: Duration = Duration::from_secs(1);

/// Names of programs that take a directory argument to open a project.
pub const IDE_PATTERNS: &[&str] = &[
    "code",
    "visual studio code",
    "vscode",
    "intellij",
    "webstorm",
    "pycharm",
    "phpstorm",
    "atom",
    "sublime",
    "eclipse",
    "android studio",
];

pub const MSG_NO_DIRECTORY: &str = "Opened application without specified directory";
pub const MSG_TERMINAL_LAUNCHED: &str = "Commands launched in terminal window";
pub const MSG_MISSING_CONTAINER: &str = "Missing container or action";
pub const MSG_ENGINE_DOWN: &str = "Container engine is not running";

fn ide_regex() -> Option<&'static Regex> {
    static IDE: OnceLock<Option<Regex>> = OnceLock::new();
    IDE.get_or_init(|| {
        let alternation = IDE_PATTERNS
            .iter()
            .map(|p| regex::escape(p))
            .collect::<Vec<_>>()
            .join("|");
        RegexBuilder::new(&alternation)
            .case_insensitive(true)
            .build()
            .ok()
    })
    .as_ref()
}

/// Whether `app` looks like an editor or IDE (substring match, any case).
pub fn is_ide_application(app: &str) -> bool {
    ide_regex().is_some_and(|re| re.is_match(app))
}

// ---------------------------------------------------------------------------
// Executor trait
// ---------------------------------------------------------------------------

/// Executes a single step.  Implementations must not fail; errors are
/// reported through [`ExecutionResult::succeeded`].
#[async_trait]
pub trait StepExecutor: Send + Sync {
    async fn execute(&self, step: &CommandStep) -> ExecutionResult;
}

/// Outcome of one command line inside a captured terminal step.  A list of
/// these is the step's `raw_output`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubCommandResult {
    pub command: String,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

// ---------------------------------------------------------------------------
// Command executor
// ---------------------------------------------------------------------------

/// The [`StepExecutor`] backed by OS capabilities.
#[derive(Clone)]
pub struct CommandExecutor {
    launcher: Arc<dyn Launcher>,
    containers: Arc<dyn ContainerEngine>,
    sleeper: Arc<dyn Sleeper>,
    pacing: Duration,
}

impl CommandExecutor {
    pub fn new(launcher: Arc<dyn Launcher>, containers: Arc<dyn ContainerEngine>) -> Self {
        Self {
            launcher,
            containers,
            sleeper: Arc::new(TokioSleeper),
            pacing: DEFAULT_COMMAND_PACING,
        }
    }

    /// Clock used for the pause between command lines.
    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    pub fn with_pacing(mut self, pacing: Duration) -> Self {
        self.pacing = pacing;
        self
    }

    async fn run_application(&self, step: &CommandStep) -> ExecutionResult {
        let app = step.payload.trim();
        if app.is_empty() {
            return ExecutionResult::failure(&step.id, "Missing application path");
        }

        if !is_ide_application(app) {
            return match self.launcher.open_path(app).await {
                Ok(()) => ExecutionResult::success(&step.id),
                Err(e) => ExecutionResult::failure(&step.id, e.to_string()),
            };
        }

        let cwd = step.working_directory.as_deref();
        let first = match self.launcher.open_application(app, cwd).await {
            Ok(()) => return ExecutionResult::success(&step.id),
            Err(e) => e,
        };
        warn!(app, error = %first, "opening with directory failed, retrying without");

        match self.launcher.open_application(app, None).await {
            Ok(()) => ExecutionResult::success(&step.id).with_message(MSG_NO_DIRECTORY),
            Err(e) => {
                ExecutionResult::failure(&step.id, format!("Failed to open application: {e}"))
            }
        }
    }

    async fn run_captured(
        &self,
        step: &CommandStep,
        commands: &[String],
        cwd: Option<&Path>,
    ) -> ExecutionResult {
        let mut results: Vec<SubCommandResult> = Vec::with_capacity(commands.len());

        for (index, command) in commands.iter().enumerate() {
            if index > 0 && !self.pacing.is_zero() {
                self.sleeper.sleep(self.pacing).await;
            }
            debug!(step_id = %step.id, index, command = %command, "running command line");

            match self.launcher.run_command_line(command, cwd).await {
                Ok(out) => results.push(SubCommandResult {
                    command: command.clone(),
                    success: true,
                    output: Some(out.stdout),
                    error: Some(out.stderr).filter(|s| !s.is_empty()),
                }),
                Err(e) => {
                    results.push(SubCommandResult {
                        command: command.clone(),
                        success: false,
                        output: None,
                        error: Some(e.to_string()),
                    });
                    let mut result =
                        ExecutionResult::failure(&step.id, format!("Command failed: {e}"));
                    result.raw_output = serde_json::to_value(&results).ok();
                    return result;
                }
            }
        }

        let mut result = ExecutionResult::success(&step.id);
        result.raw_output = serde_json::to_value(&results).ok();
        result
    }

    async fn run_detached(
        &self,
        step: &CommandStep,
        commands: &[String],
        cwd: Option<&Path>,
    ) -> ExecutionResult {
        // Resolves once the window is spawned; the window's lifetime is not
        // awaited.
        match self.launcher.spawn_detached_terminal(commands, cwd).await {
            Ok(()) => ExecutionResult::success(&step.id).with_message(MSG_TERMINAL_LAUNCHED),
            Err(e) => {
                ExecutionResult::failure(&step.id, format!("Failed to launch terminal: {e}"))
            }
        }
    }

    async fn run_url(&self, step: &CommandStep) -> ExecutionResult {
        let url = step.payload.trim();
        if url.is_empty() {
            return ExecutionResult::failure(&step.id, "Missing URL");
        }
        match self.launcher.open_url(url).await {
            Ok(()) => ExecutionResult::success(&step.id),
            Err(e) => ExecutionResult::failure(&step.id, e.to_string()),
        }
    }

    async fn run_container(
        &self,
        step: &CommandStep,
        container_id: Option<&str>,
        action: Option<ContainerAction>,
    ) -> ExecutionResult {
        let (Some(container_id), Some(action)) =
            (container_id.filter(|id| !id.trim().is_empty()), action)
        else {
            return ExecutionResult::failure(&step.id, MSG_MISSING_CONTAINER);
        };

        if !self.containers.is_available().await {
            return ExecutionResult::failure(&step.id, MSG_ENGINE_DOWN);
        }

        let outcome = match action {
            ContainerAction::Start => self.containers.start(container_id).await,
            ContainerAction::Stop => self.containers.stop(container_id).await,
        };
        ExecutionResult {
            step_id: step.id.clone(),
            succeeded: outcome.success,
            message: outcome.message,
            raw_output: None,
        }
    }
}

#[async_trait]
impl StepExecutor for CommandExecutor {
    async fn execute(&self, step: &CommandStep) -> ExecutionResult {
        info!(step_id = %step.id, kind = step.kind.label(), "executing step");

        let result = match &step.kind {
            StepKind::Application => self.run_application(step).await,
            StepKind::TerminalCommand {
                commands,
                run_in_own_terminal_window,
            } => {
                let commands = command_lines(commands, &step.payload);
                let cwd = step.working_directory.as_deref();
                if commands.is_empty() {
                    ExecutionResult::failure(&step.id, "No commands to run")
                } else if *run_in_own_terminal_window {
                    self.run_detached(step, &commands, cwd).await
                } else {
                    self.run_captured(step, &commands, cwd).await
                }
            }
            StepKind::Url => self.run_url(step).await,
            StepKind::Container {
                container_id,
                action,
            } => {
                self.run_container(step, container_id.as_deref(), *action)
                    .await
            }
            StepKind::Invalid { reason, .. } => ExecutionResult::failure(&step.id, reason.as_str()),
        };

        if result.succeeded {
            debug!(step_id = %step.id, "step succeeded");
        } else {
            warn!(
                step_id = %step.id,
                message = result.message.as_deref().unwrap_or(""),
                "step failed"
            );
        }
        result
    }
}

/// The command lines of a terminal step: `commands` when non-empty, else the
/// payload as a single line.  Blank lines are dropped.
pub fn command_lines(commands: &[String], payload: &str) -> Vec<String> {
    let source: Vec<&str> = if commands.is_empty() {
        vec![payload]
    } else {
        commands.iter().map(String::as_str).collect()
    };
    source
        .into_iter()
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .map(String::from)
        .collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
