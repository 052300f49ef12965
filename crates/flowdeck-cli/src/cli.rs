//! CLI argument definitions for flowdeck.
//!
//! All `clap` structures live here so that `main.rs` stays focused on
//! dispatching subcommands.

use std::path::PathBuf;

use anyhow::{Result, bail};
use clap::{Args, Parser, Subcommand, ValueEnum};

use flowdeck_engine::{CommandStep, ContainerAction, StepKind};

use crate::helpers::normalize_url;

/// flowdeck -- run named workflows of apps, commands, URLs and containers.
#[derive(Parser)]
#[command(
    name = "flowdeck",
    version,
    about = "flowdeck -- desktop workflow runner",
    long_about = "Define named workflows (launch an application, run terminal commands, open a \
                  URL, start or stop a container) and run them in order with optional delays."
)]
pub struct Cli {
    /// Path to the configuration file.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run a workflow by id or name.
    Run {
        /// Workflow id, or its exact name (case-insensitive).
        workflow: String,
        /// Print the full result as JSON.
        #[arg(long)]
        json: bool,
    },

    /// List workflows (favourites first).
    List,

    /// Show a workflow's steps.
    Show {
        workflow: String,
    },

    /// Create an empty workflow.
    Create {
        name: String,
    },

    /// Append a step to a workflow.
    AddStep {
        workflow: String,
        #[command(flatten)]
        step: StepArgs,
    },

    /// Remove a step from a workflow.
    RemoveStep {
        workflow: String,
        step_id: String,
    },

    /// Rename a workflow.
    Rename {
        workflow: String,
        name: String,
    },

    /// Mark (or with `--off`, unmark) a workflow as favourite.
    Favorite {
        workflow: String,
        #[arg(long)]
        off: bool,
    },

    /// Persist a custom order; unnamed workflows follow in their current order.
    Reorder {
        #[arg(required = true)]
        workflows: Vec<String>,
    },

    /// Delete a workflow.
    Delete {
        workflow: String,
    },

    /// Execute one ad-hoc step without storing it.
    Exec {
        #[command(flatten)]
        step: StepArgs,
    },

    /// List containers known to the container engine.
    Containers {
        /// Include stopped containers.
        #[arg(long, short)]
        all: bool,
    },

    /// Show storage, container engine and time-saved status.
    Status,
}

/// Kind of step to build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum StepKindArg {
    #[value(alias = "app")]
    Application,
    #[value(alias = "term")]
    Terminal,
    Url,
    #[value(alias = "docker")]
    Container,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ActionArg {
    Start,
    Stop,
}

impl From<ActionArg> for ContainerAction {
    fn from(action: ActionArg) -> Self {
        match action {
            ActionArg::Start => Self::Start,
            ActionArg::Stop => Self::Stop,
        }
    }
}

/// Step definition shared by `add-step` and `exec`.
#[derive(Debug, Clone, Args)]
pub struct StepArgs {
    #[arg(value_enum)]
    pub kind: StepKindArg,

    /// Application path, command line(s), URL, or container label.
    pub payload: Option<String>,

    /// A terminal command line; repeat for a sequence.
    #[arg(long = "command", short = 'c')]
    pub commands: Vec<String>,

    /// Working directory (application and terminal steps).
    #[arg(long)]
    pub cwd: Option<PathBuf>,

    /// Run terminal commands in their own window.
    #[arg(long)]
    pub own_window: bool,

    /// Container id or name.
    #[arg(long)]
    pub container: Option<String>,

    /// Container action.
    #[arg(long, value_enum)]
    pub action: Option<ActionArg>,

    /// Seconds to wait after this step before the next one.
    #[arg(long)]
    pub delay: Option<f64>,

    /// Human label for the step.
    #[arg(long)]
    pub description: Option<String>,
}

impl StepArgs {
    /// Build a step with the given id.
    ///
    /// URLs without a scheme get `https://`; a multi-line terminal payload
    /// becomes one command per line.
    pub fn into_step(self, id: String) -> Result<CommandStep> {
        let payload = self.payload.unwrap_or_default();

        let (kind, payload) = match self.kind {
            StepKindArg::Application => {
                if payload.trim().is_empty() {
                    bail!("an application step needs a path or name");
                }
                (StepKind::Application, payload)
            }
            StepKindArg::Terminal => {
                let mut commands = self.commands;
                if commands.is_empty() && payload.contains('\n') {
                    commands = payload
                        .lines()
                        .map(str::trim)
                        .filter(|l| !l.is_empty())
                        .map(String::from)
                        .collect();
                }
                if commands.is_empty() && payload.trim().is_empty() {
                    bail!("a terminal step needs a command");
                }
                let payload = if payload.is_empty() {
                    commands.first().cloned().unwrap_or_default()
                } else {
                    payload
                };
                (
                    StepKind::TerminalCommand {
                        commands,
                        run_in_own_terminal_window: self.own_window,
                    },
                    payload,
                )
            }
            StepKindArg::Url => {
                if payload.trim().is_empty() {
                    bail!("a url step needs a URL");
                }
                (StepKind::Url, normalize_url(&payload)?)
            }
            StepKindArg::Container => {
                let label = if payload.is_empty() {
                    self.container.clone().unwrap_or_default()
                } else {
                    payload
                };
                (
                    StepKind::Container {
                        container_id: self.container,
                        action: self.action.map(ContainerAction::from),
                    },
                    label,
                )
            }
        };

        let mut step = CommandStep::new(id, kind, payload);
        step.working_directory = self.cwd;
        step.delay_after_seconds = self.delay;
        step.description = self.description;

        if let Some(delay) = step.delay_after_seconds {
            if !delay.is_finite() || delay < 0.0 {
                bail!("delay must be a non-negative number of seconds");
            }
        }
        Ok(step)
    }
}
