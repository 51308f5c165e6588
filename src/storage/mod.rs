//! # Storage Layer
//!
//! SQLite persistence for tasks, projects, and dependency edges.
//!
//! ## Persisted Layout
//!
//! | Data | Table | Key |
//! |------|-------|-----|
//! | Projects | `projects` | `id` |
//! | Number allocator | `task_counters` | `project_id` |
//! | Tasks | `tasks` | `(project_id, task_number)` |
//! | Edges | `task_dependencies` | the four endpoint columns |
//!
//! ## Concurrency Safety
//!
//! Every handle is one connection; concurrent callers open their own
//! handle on the same file. WAL mode keeps readers unblocked; writers are
//! serialized through immediate-mode transactions with a busy timeout.
//! Query functions in [`tasks`], [`edges`] and [`projects`] take a plain
//! `&Connection`, so they compose inside whatever transaction the caller
//! holds — the service layer owns transaction scope.
//!
//! ## Workspace Structure
//!
//! ```text
//! .trellis/
//! ├── config.toml           # Workspace configuration
//! ├── trellis.db            # SQLite database (gitignored)
//! └── .gitignore
//! ```

mod config;
mod db;
pub mod edges;
pub mod projects;
pub mod tasks;
mod workspace;

pub use config::{Config, ConfigError, DefaultsConfig, StorageConfig};
pub use db::{is_busy, Database, StoreError};
pub use edges::{EdgeOrder, EdgeSort};
pub use projects::Project;
pub use workspace::{Workspace, WorkspaceError};
