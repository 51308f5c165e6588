//! Workspace management
//!
//! A workspace is a directory with a `.trellis/` folder holding the
//! database and configuration. Handles initialization and provides access
//! to the database.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use thiserror::Error;

use super::config::Config;
use super::db::Database;

#[derive(Debug, Error)]
pub enum WorkspaceError {
    #[error("Not in a trellis workspace. Run 'trellis init' first.")]
    NotInWorkspace,
}

/// A trellis workspace
pub struct Workspace {
    root: PathBuf,
    config: Config,
}

impl Workspace {
    /// Opens an existing workspace at the given path
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        let trellis_dir = root.join(".trellis");

        if !trellis_dir.is_dir() {
            return Err(WorkspaceError::NotInWorkspace.into());
        }

        let config = Config::for_workspace(&root)?;

        Ok(Self { root, config })
    }

    /// Opens the workspace at the current directory or a parent
    pub fn open_current() -> Result<Self> {
        let root = Config::find_workspace_root().ok_or(WorkspaceError::NotInWorkspace)?;
        Self::open(root)
    }

    /// Initializes a new workspace at the given path
    pub fn init(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        let trellis_dir = root.join(".trellis");

        fs::create_dir_all(&trellis_dir).with_context(|| {
            format!(
                "Failed to create .trellis directory: {}",
                trellis_dir.display()
            )
        })?;

        let config_path = trellis_dir.join("config.toml");
        if !config_path.exists() {
            let default_config = r#"# Trellis configuration

[storage]
# Milliseconds a writer waits on a locked database before failing
busy_timeout_ms = 5000

# Bounded retries for transient write conflicts
max_write_retries = 3

# Base delay between retries (milliseconds, grows per attempt)
retry_delay_ms = 25

[defaults]
# Dependency tag used when none is given
dependency_type = "blocks"
"#;
            fs::write(&config_path, default_config)
                .with_context(|| format!("Failed to write config: {}", config_path.display()))?;
        }

        let gitignore_path = trellis_dir.join(".gitignore");
        if !gitignore_path.exists() {
            let gitignore = r#"# The database is runtime state, not source
trellis.db
trellis.db-wal
trellis.db-shm
"#;
            fs::write(&gitignore_path, gitignore).with_context(|| {
                format!("Failed to write .gitignore: {}", gitignore_path.display())
            })?;
        }

        Self::open(root)
    }

    /// Returns the workspace root path
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Returns the .trellis directory path
    pub fn trellis_dir(&self) -> PathBuf {
        self.root.join(".trellis")
    }

    /// Returns the database file path
    pub fn db_path(&self) -> PathBuf {
        self.trellis_dir().join("trellis.db")
    }

    /// Returns the configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Opens the workspace database with the configured busy timeout
    pub fn database(&self) -> Result<Database> {
        Database::open_with_timeout(self.db_path(), self.config.busy_timeout())
            .with_context(|| format!("Failed to open database: {}", self.db_path().display()))
    }
}
