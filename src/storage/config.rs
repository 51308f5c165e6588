//! Configuration handling
//!
//! Configuration is stored in `.trellis/config.toml` (workspace) with a
//! global fallback in the platform config directory.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to parse configuration: {0}")]
    Parse(String),
}

/// Storage and retry tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Milliseconds a writer waits on a locked database before failing
    pub busy_timeout_ms: u64,

    /// Bounded retries for transient write conflicts
    pub max_write_retries: u32,

    /// Base delay between retries; grows linearly per attempt
    pub retry_delay_ms: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            busy_timeout_ms: 5000,
            max_write_retries: 3,
            retry_delay_ms: 25,
        }
    }
}

/// Defaults applied when the caller leaves a field out
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DefaultsConfig {
    /// Dependency tag used when none is given
    pub dependency_type: String,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            dependency_type: "blocks".to_string(),
        }
    }
}

/// Trellis configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub storage: StorageConfig,
    pub defaults: DefaultsConfig,
}

impl Config {
    /// Loads configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config: {}", path.display()))?;

        let config: Config =
            toml::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string()))?;

        Ok(config)
    }

    /// Loads the workspace config, falling back to defaults when absent
    pub fn for_workspace(root: &Path) -> Result<Self> {
        let path = root.join(".trellis").join("config.toml");
        if path.is_file() {
            Self::load(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Saves configuration to a TOML file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(path, content)
            .with_context(|| format!("Failed to write config: {}", path.display()))?;
        Ok(())
    }

    /// Walks up from the current directory looking for a `.trellis` dir
    pub fn find_workspace_root() -> Option<PathBuf> {
        let mut dir = std::env::current_dir().ok()?;

        loop {
            if dir.join(".trellis").is_dir() {
                return Some(dir);
            }
            if !dir.pop() {
                return None;
            }
        }
    }

    /// Returns the global config path, if the platform provides one
    pub fn global_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", "trellis").map(|dirs| dirs.config_dir().join("config.toml"))
    }

    /// Busy timeout as a duration
    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.storage.busy_timeout_ms)
    }

    /// Retry base delay as a duration
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.storage.retry_delay_ms)
    }
}
