//! # Command-Line Interface
//!
//! Thin admin surface over the dependency service.
//!
//! ## Command Groups
//!
//! | Group | Purpose | Examples |
//! |-------|---------|----------|
//! | Core | Workspace management | `init`, `check` |
//! | Project | Registry | `project add`, `project list` |
//! | Task | Work items | `task add`, `task done`, `task delete` |
//! | Dep | Ordering constraints | `dep add`, `dep rm`, `dep list` |
//! | Query | Graph state | `ready`, `blocked` |
//!
//! All commands support `--format text|json`. Call [`run()`] to parse
//! arguments and execute.

mod app;
mod dep_cmd;
mod output;
mod project_cmd;
mod query;
mod task_cmd;

pub use app::{run, Cli, Commands};
pub use output::{Output, OutputFormat};

use anyhow::Result;

use crate::service::DependencyService;
use crate::storage::Workspace;

/// Opens the current workspace
fn open_workspace() -> Result<Workspace> {
    Workspace::open_current()
}

/// Builds a service over the given workspace's database
fn service_for(workspace: &Workspace) -> Result<DependencyService> {
    let db = workspace.database()?;
    Ok(DependencyService::with_config(db, workspace.config()))
}

/// Opens the current workspace and builds a service over it
fn open_service() -> Result<DependencyService> {
    let workspace = open_workspace()?;
    service_for(&workspace)
}
