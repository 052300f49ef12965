//! Docker via its command-line client.
//!
//! Every request is one `docker` invocation.  Availability is `docker
//! version` succeeding, which needs both the client and a reachable daemon.

use std::process::Stdio;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::error::{AdapterError, Result};
use crate::traits::{ContainerEngine, ContainerOutcome, ContainerSummary};

/// [`ContainerEngine`] backed by the `docker` binary.
#[derive(Debug, Clone)]
pub struct DockerCli {
    binary: String,
}

impl Default for DockerCli {
    fn default() -> Self {
        Self::new()
    }
}

impl DockerCli {
    pub fn new() -> Self {
        Self {
            binary: "docker".into(),
        }
    }

    /// Use a different client binary (e.g. `podman`, or an absolute path).
    pub fn with_binary(mut self, binary: impl Into<String>) -> Self {
        self.binary = binary.into();
        self
    }

    pub fn binary(&self) -> &str {
        &self.binary
    }

    async fn docker(&self, args: &[&str]) -> Result<String> {
        let output = tokio::process::Command::new(&self.binary)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| AdapterError::SpawnFailed {
                program: self.binary.clone(),
                reason: e.to_string(),
            })?;

        if output.status.success() {
            Ok(String::from_utf8_lossy(&output.stdout).into_owned())
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            Err(AdapterError::Container(if stderr.is_empty() {
                format!("`{} {}` failed", self.binary, args.join(" "))
            } else {
                stderr
            }))
        }
    }

    async fn lifecycle(&self, action: &str, container_id: &str) -> ContainerOutcome {
        match self.docker(&[action, container_id]).await {
            Ok(_) => {
                info!(container = container_id, action, "container request succeeded");
                ContainerOutcome::ok()
            }
            Err(e) => {
                warn!(container = container_id, action, error = %e, "container request failed");
                ContainerOutcome::failed(error_message(e))
            }
        }
    }
}

#[async_trait]
impl ContainerEngine for DockerCli {
    async fn is_available(&self) -> bool {
        match self.docker(&["version", "--format", "{{.Server.Version}}"]).await {
            Ok(version) => {
                debug!(version = version.trim(), "docker daemon reachable");
                true
            }
            Err(e) => {
                debug!(error = %e, "docker check failed");
                false
            }
        }
    }

    async fn start(&self, container_id: &str) -> ContainerOutcome {
        self.lifecycle("start", container_id).await
    }

    async fn stop(&self, container_id: &str) -> ContainerOutcome {
        self.lifecycle("stop", container_id).await
    }

    async fn list_containers(&self, all: bool) -> Result<Vec<ContainerSummary>> {
        let mut args = vec!["ps", "--no-trunc", "--format", "{{json .}}"];
        if all {
            args.insert(1, "-a");
        }
        let stdout = self.docker(&args).await?;
        parse_ps_output(&stdout)
    }
}

/// One line of `docker ps --format '{{json .}}'`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct PsLine {
    #[serde(rename = "ID")]
    id: String,
    #[serde(default)]
    names: String,
    #[serde(default)]
    image: String,
    #[serde(default)]
    state: String,
    #[serde(default)]
    status: String,
}

impl From<PsLine> for ContainerSummary {
    fn from(line: PsLine) -> Self {
        Self {
            id: line.id,
            names: line
                .names
                .split(',')
                .map(str::trim)
                .filter(|n| !n.is_empty())
                .map(String::from)
                .collect(),
            image: line.image,
            state: line.state,
            status: line.status,
        }
    }
}

/// Parse newline-delimited JSON from `docker ps`.
pub fn parse_ps_output(stdout: &str) -> Result<Vec<ContainerSummary>> {
    stdout
        .lines()
        .filter(|l| !l.trim().is_empty())
        .map(|l| {
            serde_json::from_str::<PsLine>(l)
                .map(ContainerSummary::from)
                .map_err(AdapterError::from)
        })
        .collect()
}

/// The bare message carried by a container error.
fn error_message(e: AdapterError) -> String {
    match e {
        AdapterError::Container(msg) => msg,
        other => other.to_string(),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
