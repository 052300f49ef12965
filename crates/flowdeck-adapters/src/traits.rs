//! Capability traits and supporting types.
//!
//! The workflow engine never touches processes or sockets directly.  It
//! talks to two narrow capabilities:
//!
//! - [`Launcher`] -- run shell command lines, spawn a detached terminal
//!   window, and open paths, URLs and applications.
//! - [`ContainerEngine`] -- check the engine is up and start/stop
//!   containers.
//!
//! [`SystemLauncher`](crate::SystemLauncher) and
//! [`DockerCli`](crate::DockerCli) are the real implementations; tests
//! substitute recording fakes.

use std::path::Path;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

// ---------------------------------------------------------------------------
// Supporting types
// ---------------------------------------------------------------------------

/// The desktop platform a command line is built for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Platform {
    Windows,
    MacOs,
    /// Linux and other freedesktop-style systems.
    Linux,
}

impl Platform {
    /// The platform this binary was compiled for.
    pub fn current() -> Self {
        if cfg!(target_os = "windows") {
            Self::Windows
        } else if cfg!(target_os = "macos") {
            Self::MacOs
        } else {
            Self::Linux
        }
    }
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Windows => write!(f, "windows"),
            Self::MacOs => write!(f, "macos"),
            Self::Linux => write!(f, "linux"),
        }
    }
}

/// Captured output of one shell invocation that exited successfully.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandOutput {
    /// The command line as given (before any working-directory handling).
    pub command: String,
    pub stdout: String,
    pub stderr: String,
    /// True if either stream was cut at the output limit.
    pub truncated: bool,
}

/// Result of a container start/stop request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContainerOutcome {
    pub success: bool,
    pub message: Option<String>,
}

impl ContainerOutcome {
    pub fn ok() -> Self {
        Self {
            success: true,
            message: None,
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: Some(message.into()),
        }
    }
}

/// One row of a container listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContainerSummary {
    pub id: String,
    pub names: Vec<String>,
    pub image: String,
    /// Machine state (`running`, `exited`, ...).
    pub state: String,
    /// Human status (`Up 3 hours`, ...).
    pub status: String,
}

// ---------------------------------------------------------------------------
// Capability traits
// ---------------------------------------------------------------------------

/// Process and desktop launching capability.
///
/// Every method returns `Err` on failure; none of them panic.
#[async_trait]
pub trait Launcher: Send + Sync {
    /// Run one command line through the platform shell and wait for it.
    ///
    /// A non-zero exit status is an error.
    async fn run_command_line(&self, command: &str, cwd: Option<&Path>) -> Result<CommandOutput>;

    /// Open a visible terminal window that runs `commands` in order.
    ///
    /// Resolves as soon as the window process has been *spawned*; it never
    /// waits for the window to close.  The only failure is failing to spawn.
    async fn spawn_detached_terminal(&self, commands: &[String], cwd: Option<&Path>)
    -> Result<()>;

    /// Hand a file or program path to the platform's generic opener.
    async fn open_path(&self, path: &str) -> Result<()>;

    /// Hand a URL to the platform's generic opener.
    async fn open_url(&self, url: &str) -> Result<()>;

    /// Launch an application, passing `cwd` as the directory to open when
    /// given.
    async fn open_application(&self, app: &str, cwd: Option<&Path>) -> Result<()>;
}

/// Container runtime capability.
#[async_trait]
pub trait ContainerEngine: Send + Sync {
    /// Whether the engine daemon is reachable.
    async fn is_available(&self) -> bool;

    /// Start the container with the given ID or name.
    async fn start(&self, container_id: &str) -> ContainerOutcome;

    /// Stop the container with the given ID or name.
    async fn stop(&self, container_id: &str) -> ContainerOutcome;

    /// List containers; `all` includes stopped ones.
    async fn list_containers(&self, all: bool) -> Result<Vec<ContainerSummary>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn platform_display() {
        assert_eq!(Platform::Windows.to_string(), "windows");
        assert_eq!(Platform::MacOs.to_string(), "macos");
        assert_eq!(Platform::Linux.to_string(), "linux");
    }

    #[test]
    fn container_outcome_constructors() {
        assert!(ContainerOutcome::ok().success);
        let failed = ContainerOutcome::failed("nope");
        assert!(!failed.success);
        assert_eq!(failed.message.as_deref(), Some("nope"));
    }
}
