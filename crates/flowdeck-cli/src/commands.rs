//! Subcommand implementations.
//!
//! Workflow management goes straight to the store; running and executing go
//! through the [`App`] channels.

use anyhow::{Context, Result, bail};
use serde_json::json;
use tracing::{info, warn};

use flowdeck_adapters::ContainerSummary;
use flowdeck_engine::{ExecutionResult, RunResult, Workflow, steps_to_json};
use flowdeck_kernel::ProgressEvent;
use flowdeck_store::StoredWorkflow;

use crate::app::{App, CHANNEL_CONTAINER_STATUS, CHANNEL_EXECUTE_STEP};
use crate::cli::StepArgs;
use crate::helpers::{describe_step, format_seconds};

// ═══════════════════════════════════════════════════════════════════════
//  Lookup
// ═══════════════════════════════════════════════════════════════════════

/// Find a workflow by id, or by exact case-insensitive name.
pub async fn resolve_workflow(app: &App, key: &str) -> Result<StoredWorkflow> {
    let store = app.storage.workflows();
    if let Some(wf) = store.get(key).await? {
        return Ok(wf);
    }

    let matches: Vec<StoredWorkflow> = store
        .list()
        .await?
        .into_iter()
        .filter(|wf| wf.name.eq_ignore_ascii_case(key))
        .collect();

    match matches.len() {
        0 => bail!("no workflow with id or name `{key}`"),
        1 => Ok(matches.into_iter().next().context("workflow vanished")?),
        n => bail!("{n} workflows are named `{key}`; use the id instead"),
    }
}

async fn load(app: &App, key: &str) -> Result<Workflow> {
    let stored = resolve_workflow(app, key).await?;
    Workflow::from_stored(stored).context("stored workflow has invalid steps")
}

// ═══════════════════════════════════════════════════════════════════════
//  Running
// ═══════════════════════════════════════════════════════════════════════

/// `flowdeck run`: run a workflow, printing each step as it becomes active.
pub async fn cmd_run(app: &App, key: &str, as_json: bool) -> Result<bool> {
    let workflow = load(app, key).await?;
    let names: Vec<(String, String)> = workflow
        .steps
        .iter()
        .map(|s| (s.id.clone(), describe_step(s)))
        .collect();

    let mut rx = app.bus.subscribe();
    let printer = tokio::spawn(async move {
        let mut last: Option<String> = None;
        loop {
            let event = match rx.recv().await {
                Ok(event) => event,
                Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                    warn!(skipped = n, "progress printer lagged");
                    continue;
                }
                Err(_) => break,
            };
            match event.as_ref() {
                ProgressEvent::StepActive {
                    step_id: Some(id), ..
                } if last.as_deref() != Some(id.as_str()) => {
                    let label = names
                        .iter()
                        .find(|(step_id, _)| step_id == id)
                        .map(|(_, label)| label.as_str())
                        .unwrap_or(id.as_str());
                    if !as_json {
                        println!("  > {label}");
                    }
                    last = Some(id.clone());
                }
                ProgressEvent::RunCompleted { .. } => break,
                _ => {}
            }
        }
    });

    if !as_json {
        println!("Running \"{}\" ({} steps)", workflow.name, workflow.steps.len());
    }
    let run = match app.run_workflow(&workflow.id).await {
        Ok(run) => run,
        Err(e) => {
            printer.abort();
            return Err(e);
        }
    };
    if let Err(e) = printer.await {
        warn!(error = %e, "progress printer failed");
    }

    if as_json {
        println!("{}", serde_json::to_string_pretty(&run)?);
    } else {
        print_run(&run);
    }
    Ok(run.succeeded)
}

fn print_run(run: &RunResult) {
    if let Some(message) = &run.message {
        println!("Failed: {message}");
        return;
    }
    for result in &run.steps {
        print_step_result(result);
    }
    let failed = run.failed_steps().count();
    if failed == 0 {
        println!("Done: all {} steps succeeded", run.steps.len());
    } else {
        println!("Done: {failed} of {} steps failed", run.steps.len());
    }
}

fn print_step_result(result: &ExecutionResult) {
    let mark = if result.succeeded { "ok" } else { "FAILED" };
    match &result.message {
        Some(msg) => println!("  [{mark}] {}: {msg}", result.step_id),
        None => println!("  [{mark}] {}", result.step_id),
    }
}

/// `flowdeck exec`: run one ad-hoc step through `execute-step`.
pub async fn cmd_exec(app: &App, step: StepArgs) -> Result<bool> {
    let step = step.into_step(new_step_id())?;
    let reply = app
        .dispatch(CHANNEL_EXECUTE_STEP, serde_json::to_value(&step)?)
        .await?;
    let result: ExecutionResult = serde_json::from_value(reply)?;

    print_step_result(&result);
    if let Some(raw) = &result.raw_output {
        println!("{}", serde_json::to_string_pretty(raw)?);
    }
    Ok(result.succeeded)
}

// ═══════════════════════════════════════════════════════════════════════
//  Workflow management
// ═══════════════════════════════════════════════════════════════════════

pub async fn cmd_list(app: &App) -> Result<()> {
    let workflows = app.storage.workflows().list().await?;
    if workflows.is_empty() {
        println!("No workflows yet. Create one with `flowdeck create <name>`.");
        return Ok(());
    }
    for stored in workflows {
        let star = if stored.is_favorite { "*" } else { " " };
        let steps = stored.steps.as_array().map(Vec::len).unwrap_or(0);
        println!("{star} {:<30} {:>3} steps  {}", stored.name, steps, stored.id);
    }
    Ok(())
}

pub async fn cmd_show(app: &App, key: &str) -> Result<()> {
    let workflow = load(app, key).await?;
    println!("{} ({})", workflow.name, workflow.id);
    if workflow.steps.is_empty() {
        println!("  (no steps)");
    }
    for (index, step) in workflow.steps.iter().enumerate() {
        let delay = step
            .delay_after()
            .map(|d| format!("  then wait {}s", d.as_secs_f64()))
            .unwrap_or_default();
        let cwd = step
            .working_directory
            .as_ref()
            .map(|d| format!("  in {}", d.display()))
            .unwrap_or_default();
        println!("  {}. [{}] {}{cwd}{delay}", index + 1, step.id, describe_step(step));
    }
    Ok(())
}

pub async fn cmd_create(app: &App, name: &str) -> Result<()> {
    let wf = app.storage.workflows().create(name).await?;
    info!(workflow_id = %wf.id, "workflow created");
    println!("{}", wf.id);
    Ok(())
}

pub async fn cmd_add_step(app: &App, key: &str, args: StepArgs) -> Result<()> {
    let mut workflow = load(app, key).await?;
    let step = args.into_step(new_step_id())?;
    let step_id = step.id.clone();
    workflow.steps.push(step);

    app.storage
        .workflows()
        .update_steps(&workflow.id, steps_to_json(&workflow.steps)?)
        .await?;
    println!("{step_id}");
    Ok(())
}

pub async fn cmd_remove_step(app: &App, key: &str, step_id: &str) -> Result<()> {
    let mut workflow = load(app, key).await?;
    let before = workflow.steps.len();
    workflow.steps.retain(|s| s.id != step_id);
    if workflow.steps.len() == before {
        bail!("workflow `{}` has no step `{step_id}`", workflow.name);
    }

    app.storage
        .workflows()
        .update_steps(&workflow.id, steps_to_json(&workflow.steps)?)
        .await?;
    Ok(())
}

pub async fn cmd_rename(app: &App, key: &str, name: &str) -> Result<()> {
    let wf = resolve_workflow(app, key).await?;
    app.storage.workflows().rename(&wf.id, name).await?;
    Ok(())
}

pub async fn cmd_favorite(app: &App, key: &str, favorite: bool) -> Result<()> {
    let wf = resolve_workflow(app, key).await?;
    app.storage.workflows().set_favorite(&wf.id, favorite).await?;
    Ok(())
}

pub async fn cmd_reorder(app: &App, keys: &[String]) -> Result<()> {
    let mut ids = Vec::with_capacity(keys.len());
    for key in keys {
        ids.push(resolve_workflow(app, key).await?.id);
    }
    let written = app.storage.workflows().reorder(&ids).await?;
    info!(written, "workflows reordered");
    Ok(())
}

pub async fn cmd_delete(app: &App, key: &str) -> Result<()> {
    let wf = resolve_workflow(app, key).await?;
    app.storage.workflows().delete(&wf.id).await?;
    println!("Deleted \"{}\"", wf.name);
    Ok(())
}

// ═══════════════════════════════════════════════════════════════════════
//  Status
// ═══════════════════════════════════════════════════════════════════════

pub async fn cmd_containers(app: &App, all: bool) -> Result<()> {
    let reply = app
        .dispatch(CHANNEL_CONTAINER_STATUS, json!({"list": true, "all": all}))
        .await?;
    if reply["available"] != true {
        println!("Container engine is not running");
        return Ok(());
    }

    let containers: Vec<ContainerSummary> = serde_json::from_value(reply["containers"].clone())?;
    if containers.is_empty() {
        println!("No containers");
    }
    for c in containers {
        let id: String = c.id.chars().take(12).collect();
        println!(
            "{id}  {:<24} {:<10} {:<24} {}",
            c.names.join(","),
            c.state,
            c.image,
            c.status
        );
    }
    Ok(())
}

pub async fn cmd_status(app: &App) -> Result<()> {
    let workflows = app.storage.workflows().count().await?;
    let saved = app.storage.state().time_saved_seconds().await?;
    let reply = app.dispatch(CHANNEL_CONTAINER_STATUS, json!({})).await?;
    let engine = if reply["available"] == true {
        "running"
    } else {
        "not running"
    };

    println!("flowdeck v{}", env!("CARGO_PKG_VERSION"));
    println!("  Database:         {}", app.config.database_path().display());
    println!("  Workflows:        {workflows}");
    println!("  Time saved:       {}", format_seconds(saved));
    println!("  Container engine: {engine}");
    Ok(())
}

fn new_step_id() -> String {
    uuid::Uuid::now_v7().to_string()
}
