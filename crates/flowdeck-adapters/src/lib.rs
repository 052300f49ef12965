//! OS capabilities for flowdeck: shell command lines, desktop openers,
//! detached terminal windows and containers.
//!
//! The engine depends only on the [`Launcher`] and [`ContainerEngine`]
//! traits defined in [`traits`]; [`SystemLauncher`] and [`DockerCli`] are
//! the implementations wired up by the CLI.

pub mod docker;
pub mod error;
pub mod shell;
pub mod terminal;
pub mod traits;

pub use docker::DockerCli;
pub use error::{AdapterError, Result};
pub use shell::SystemLauncher;
pub use terminal::{TerminalEmulator, TerminalSpawner};
pub use traits::{
    CommandOutput, ContainerEngine, ContainerOutcome, ContainerSummary, Launcher, Platform,
};
