//! Application wiring.
//!
//! Builds the store, OS adapters, executor and runner from configuration,
//! and exposes them to callers through named channels on a
//! [`HandlerRegistry`].  Every entry point (CLI subcommand today; a tray,
//! menu or shortcut would be the same) dispatches through these channels
//! rather than calling the engine directly.

use std::sync::Arc;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{debug, info};

use flowdeck_adapters::{ContainerEngine, DockerCli, SystemLauncher};
use flowdeck_engine::{
    BusProgress, CommandExecutor, CommandStep, DelayController, FixedCredit, RunResult,
    SqliteStorage, StepExecutor, TokioSleeper, WorkflowRunner,
};
use flowdeck_kernel::{HandlerRegistry, ProgressBus, ProgressEvent, handler_fn};
use flowdeck_store::Database;

use crate::config::FlowdeckConfig;

pub const CHANNEL_RUN_WORKFLOW: &str = "run-workflow";
pub const CHANNEL_EXECUTE_STEP: &str = "execute-step";
pub const CHANNEL_CONTAINER_STATUS: &str = "container-status";

/// Capacity of the progress broadcast channel.
const PROGRESS_CAPACITY: usize = 64;

#[derive(Debug, Serialize, Deserialize)]
pub struct RunWorkflowRequest {
    pub workflow_id: String,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct ContainerStatusRequest {
    #[serde(default)]
    pub list: bool,
    #[serde(default)]
    pub all: bool,
}

/// Everything a subcommand needs.
pub struct App {
    pub config: FlowdeckConfig,
    pub storage: SqliteStorage,
    pub containers: Arc<dyn ContainerEngine>,
    pub executor: Arc<dyn StepExecutor>,
    pub runner: WorkflowRunner,
    pub bus: ProgressBus,
    pub registry: HandlerRegistry,
}

impl App {
    /// Open the database under the configured data directory and wire up
    /// the engine.
    pub async fn init(config: FlowdeckConfig) -> Result<Self> {
        let data_dir = config.storage.data_dir.clone();
        if !data_dir.exists() {
            std::fs::create_dir_all(&data_dir).with_context(|| {
                format!("failed to create data directory {}", data_dir.display())
            })?;
        }

        let db_path = config.database_path();
        let db = Database::open_and_migrate(db_path.clone())
            .await
            .with_context(|| format!("failed to open database {}", db_path.display()))?;
        debug!(path = %db_path.display(), "store initialized");

        Ok(Self::with_database(config, db))
    }

    /// Wire the engine over an already-migrated database.
    pub fn with_database(config: FlowdeckConfig, db: Database) -> Self {
        let launcher = Arc::new(SystemLauncher::new().with_terminals(&config.terminal.emulators));
        let containers: Arc<dyn ContainerEngine> =
            Arc::new(DockerCli::new().with_binary(config.containers.binary.clone()));
        Self::assemble(config, db, launcher, containers)
    }

    /// Wire the engine with explicit capabilities.
    pub fn assemble(
        config: FlowdeckConfig,
        db: Database,
        launcher: Arc<dyn flowdeck_adapters::Launcher>,
        containers: Arc<dyn ContainerEngine>,
    ) -> Self {
        let sleeper = Arc::new(TokioSleeper);
        let executor: Arc<dyn StepExecutor> = Arc::new(
            CommandExecutor::new(launcher, Arc::clone(&containers))
                .with_sleeper(sleeper.clone())
                .with_pacing(config.command_pacing()),
        );
        let runner = WorkflowRunner::new(Arc::clone(&executor))
            .with_delays(DelayController::new(sleeper))
            .with_credit(Arc::new(FixedCredit(config.engine.time_saved_per_step_secs)));

        let app = Self {
            storage: SqliteStorage::new(db),
            containers,
            executor,
            runner,
            bus: ProgressBus::new(PROGRESS_CAPACITY),
            registry: HandlerRegistry::new(),
            config,
        };
        app.register_handlers();
        app
    }

    fn register_handlers(&self) {
        let runner = self.runner.clone();
        let storage = self.storage.clone();
        let bus = self.bus.clone();
        self.registry.register(
            CHANNEL_RUN_WORKFLOW,
            handler_fn(move |payload| {
                let runner = runner.clone();
                let storage = storage.clone();
                let bus = bus.clone();
                async move {
                    let req: RunWorkflowRequest =
                        serde_json::from_value(payload).map_err(|e| e.to_string())?;
                    let sink = BusProgress::new(bus.clone(), req.workflow_id.clone());
                    let run = runner
                        .run_workflow(&req.workflow_id, &storage, Some(&sink))
                        .await;
                    bus.publish(ProgressEvent::run_completed(&req.workflow_id, run.succeeded));
                    serde_json::to_value(run).map_err(|e| e.to_string())
                }
            }),
        );

        let executor = Arc::clone(&self.executor);
        self.registry.register(
            CHANNEL_EXECUTE_STEP,
            handler_fn(move |payload| {
                let executor = Arc::clone(&executor);
                async move {
                    let step: CommandStep =
                        serde_json::from_value(payload).map_err(|e| e.to_string())?;
                    let result = executor.execute(&step).await;
                    serde_json::to_value(result).map_err(|e| e.to_string())
                }
            }),
        );

        let containers = Arc::clone(&self.containers);
        self.registry.register(
            CHANNEL_CONTAINER_STATUS,
            handler_fn(move |payload| {
                let containers = Arc::clone(&containers);
                async move {
                    let req: ContainerStatusRequest = if payload.is_null() {
                        ContainerStatusRequest::default()
                    } else {
                        serde_json::from_value(payload).map_err(|e| e.to_string())?
                    };
                    let available = containers.is_available().await;
                    if !available || !req.list {
                        return Ok(json!({ "available": available, "containers": [] }));
                    }
                    let listed = containers
                        .list_containers(req.all)
                        .await
                        .map_err(|e| format!("Failed to list containers: {e}"))?;
                    Ok(json!({ "available": true, "containers": listed }))
                }
            }),
        );

        info!(channels = self.registry.count(), "handlers registered");
    }

    /// Run a workflow through the `run-workflow` channel.
    pub async fn run_workflow(&self, workflow_id: &str) -> Result<RunResult> {
        let reply = self
            .dispatch(
                CHANNEL_RUN_WORKFLOW,
                serde_json::to_value(RunWorkflowRequest {
                    workflow_id: workflow_id.to_string(),
                })?,
            )
            .await?;
        Ok(serde_json::from_value(reply)?)
    }

    pub async fn dispatch(&self, channel: &str, payload: Value) -> Result<Value> {
        self.registry
            .dispatch(channel, payload)
            .await
            .with_context(|| format!("`{channel}` failed"))
    }

    /// Drop all channel handlers.
    pub fn shutdown(&self) {
        self.registry.clear();
        debug!("handlers cleared");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    use async_trait::async_trait;
    use flowdeck_adapters::{
        CommandOutput, ContainerOutcome, ContainerSummary, Launcher, Result as AdapterResult,
    };
    use flowdeck_engine::steps_to_json;

    struct NullLauncher;

    #[async_trait]
    impl Launcher for NullLauncher {
        async fn run_command_line(&self, command: &str, _cwd: Option<&Path>) -> AdapterResult<CommandOutput> {
            Ok(CommandOutput {
                command: command.into(),
                stdout: String::new(),
                stderr: String::new(),
                truncated: false,
            })
        }
        async fn spawn_detached_terminal(&self, _c: &[String], _cwd: Option<&Path>) -> AdapterResult<()> {
            Ok(())
        }
        async fn open_path(&self, _path: &str) -> AdapterResult<()> {
            Ok(())
        }
        async fn open_url(&self, _url: &str) -> AdapterResult<()> {
            Ok(())
        }
        async fn open_application(&self, _app: &str, _cwd: Option<&Path>) -> AdapterResult<()> {
            Ok(())
        }
    }

    struct OneContainer;

    #[async_trait]
    impl ContainerEngine for OneContainer {
        async fn is_available(&self) -> bool {
            true
        }
        async fn start(&self, _id: &str) -> ContainerOutcome {
            ContainerOutcome::ok()
        }
        async fn stop(&self, _id: &str) -> ContainerOutcome {
            ContainerOutcome::ok()
        }
        async fn list_containers(&self, _all: bool) -> AdapterResult<Vec<ContainerSummary>> {
            Ok(vec![ContainerSummary {
                id: "abc".into(),
                names: vec!["db".into()],
                image: "postgres".into(),
                state: "running".into(),
                status: "Up".into(),
            }])
        }
    }

    async fn app() -> App {
        let db = Database::open_in_memory().unwrap();
        db.run_migrations().await.unwrap();
        App::assemble(
            FlowdeckConfig::default(),
            db,
            Arc::new(NullLauncher),
            Arc::new(OneContainer),
        )
    }

    #[tokio::test]
    async fn channels_registered() {
        let app = app().await;
        assert_eq!(
            app.registry.channels(),
            vec![CHANNEL_CONTAINER_STATUS, CHANNEL_EXECUTE_STEP, CHANNEL_RUN_WORKFLOW]
        );
        app.shutdown();
        assert_eq!(app.registry.count(), 0);
    }

    #[tokio::test]
    async fn run_through_channel_publishes_completion() {
        let app = app().await;
        let wf = app.storage.workflows().create("wf").await.unwrap();
        app.storage
            .workflows()
            .update_steps(
                &wf.id,
                steps_to_json(&[CommandStep::url("u", "https://a.example")]).unwrap(),
            )
            .await
            .unwrap();

        let mut rx = app.bus.subscribe();
        let run = app.run_workflow(&wf.id).await.unwrap();
        assert!(run.succeeded);

        let mut completed = false;
        while let Ok(event) = rx.try_recv() {
            if let ProgressEvent::RunCompleted { success, .. } = event.as_ref() {
                completed = *success;
            }
        }
        assert!(completed);
        assert_eq!(app.storage.state().time_saved_seconds().await.unwrap(), 10);
    }

    #[tokio::test]
    async fn missing_workflow_is_a_failed_run_not_an_error() {
        let app = app().await;
        let run = app.run_workflow("missing").await.unwrap();
        assert!(!run.succeeded);
        assert_eq!(run.message.as_deref(), Some("Workflow not found: missing"));
    }

    #[tokio::test]
    async fn execute_step_channel() {
        let app = app().await;
        let reply = app
            .dispatch(CHANNEL_EXECUTE_STEP, json!({"id": "x", "kind": "url", "payload": "https://a.b"}))
            .await
            .unwrap();
        assert_eq!(reply["succeeded"], true);

        let err = app
            .dispatch(CHANNEL_EXECUTE_STEP, json!({"kind": "nonsense"}))
            .await;
        assert!(err.is_err());
    }

    #[tokio::test]
    async fn container_status_channel() {
        let app = app().await;
        let reply = app.dispatch(CHANNEL_CONTAINER_STATUS, Value::Null).await.unwrap();
        assert_eq!(reply["available"], true);
        assert_eq!(reply["containers"].as_array().map(Vec::len), Some(0));

        let reply = app
            .dispatch(CHANNEL_CONTAINER_STATUS, json!({"list": true, "all": true}))
            .await
            .unwrap();
        assert_eq!(reply["containers"][0]["names"][0], "db");
    }
}
