//! CLI entry point for flowdeck.
//!
//! This binary provides the `flowdeck` command for managing and running
//! workflows.

mod app;
mod cli;
mod commands;
mod config;
mod helpers;

use anyhow::Result;
use clap::Parser;
use tracing::{debug, info};

use crate::app::App;
use crate::cli::{Cli, Commands};
use crate::config::FlowdeckConfig;

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let config = FlowdeckConfig::load(cli.config.as_deref())?;
    helpers::init_tracing(&config.logging.level);
    debug!(data_dir = %config.storage.data_dir.display(), "configuration loaded");

    let app = App::init(config).await?;
    let outcome = dispatch(&app, cli.command).await;
    app.shutdown();

    match outcome {
        Ok(true) => Ok(()),
        Ok(false) => {
            info!("finished with failures");
            std::process::exit(1);
        }
        Err(e) => Err(e),
    }
}

/// Run a subcommand. `Ok(false)` means it ran but reported a failure.
async fn dispatch(app: &App, command: Commands) -> Result<bool> {
    match command {
        Commands::Run { workflow, json } => commands::cmd_run(app, &workflow, json).await,
        Commands::Exec { step } => commands::cmd_exec(app, step).await,
        Commands::List => commands::cmd_list(app).await.map(|()| true),
        Commands::Show { workflow } => commands::cmd_show(app, &workflow).await.map(|()| true),
        Commands::Create { name } => commands::cmd_create(app, &name).await.map(|()| true),
        Commands::AddStep { workflow, step } => commands::cmd_add_step(app, &workflow, step)
            .await
            .map(|()| true),
        Commands::RemoveStep { workflow, step_id } => {
            commands::cmd_remove_step(app, &workflow, &step_id)
                .await
                .map(|()| true)
        }
        Commands::Rename { workflow, name } => commands::cmd_rename(app, &workflow, &name)
            .await
            .map(|()| true),
        Commands::Favorite { workflow, off } => commands::cmd_favorite(app, &workflow, !off)
            .await
            .map(|()| true),
        Commands::Reorder { workflows } => commands::cmd_reorder(app, &workflows)
            .await
            .map(|()| true),
        Commands::Delete { workflow } => commands::cmd_delete(app, &workflow).await.map(|()| true),
        Commands::Containers { all } => commands::cmd_containers(app, all).await.map(|()| true),
        Commands::Status => commands::cmd_status(app).await.map(|()| true),
    }
}
