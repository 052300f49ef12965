//! Configuration loading.
//!
//! Settings come from `config/default.toml` (or the file given with
//! `--config`), then environment overrides.  A missing file means all
//! defaults; a malformed one is an error.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

/// Default config file location, relative to the working directory.
pub const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

/// Database file name inside the data directory.
pub const DATABASE_FILE: &str = "flowdeck.db";

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(default)]
pub struct FlowdeckConfig {
    pub storage: StorageConfig,
    pub engine: EngineConfig,
    pub terminal: TerminalConfig,
    pub containers: ContainerConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub data_dir: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub time_saved_per_step_secs: i64,
    pub command_pacing_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct TerminalConfig {
    pub emulators: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ContainerConfig {
    pub binary: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            time_saved_per_step_secs: flowdeck_engine::credit::DEFAULT_SECONDS_PER_STEP,
            command_pacing_ms: flowdeck_engine::executor::DEFAULT_COMMAND_PACING.as_millis() as u64,
        }
    }
}

impl Default for TerminalConfig {
    fn default() -> Self {
        Self {
            emulators: flowdeck_adapters::terminal::DEFAULT_EMULATORS
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

impl Default for ContainerConfig {
    fn default() -> Self {
        Self {
            binary: "docker".into(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
        }
    }
}

impl FlowdeckConfig {
    /// Load from `path` (or [`DEFAULT_CONFIG_PATH`]) and apply process
    /// environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = path.unwrap_or_else(|| Path::new(DEFAULT_CONFIG_PATH));
        let mut config = match std::fs::read_to_string(path) {
            Ok(content) => Self::parse(&content)
                .with_context(|| format!("invalid config file {}", path.display()))?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Self::default(),
            Err(e) => {
                return Err(e).with_context(|| format!("failed to read {}", path.display()));
            }
        };
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    pub fn parse(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Apply `FLOWDECK_DATA_DIR` / `FLOWDECK_LOG` from `lookup`.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(dir) = lookup("FLOWDECK_DATA_DIR").filter(|v| !v.is_empty()) {
            self.storage.data_dir = PathBuf::from(dir);
        }
        if let Some(level) = lookup("FLOWDECK_LOG").filter(|v| !v.is_empty()) {
            self.logging.level = level;
        }
    }

    pub fn database_path(&self) -> PathBuf {
        self.storage.data_dir.join(DATABASE_FILE)
    }

    pub fn command_pacing(&self) -> Duration {
        Duration::from_millis(self.engine.command_pacing_ms)
    }
}
