//! Trellis - collaborative task backend with dependency ordering
//!
//! Collaborators create tasks inside projects and declare ordering
//! constraints between them: a task is unblocked only once every
//! predecessor reaches a terminal status. The crate guarantees two
//! invariants under concurrent use: a task's number is issued exactly
//! once per project, and no sequence of edge insertions ever produces a
//! cycle in the dependency graph.
//!
//! [`service::DependencyService`] is the entry point callers use; the
//! `trellis` binary is a thin admin surface over it.

pub mod cli;
pub mod domain;
pub mod service;
pub mod storage;

pub use domain::{DependencyType, NewTask, ProjectId, Task, TaskDependency, TaskRef, TaskStatus};
pub use service::{DependencyService, Direction, ServiceError};
pub use storage::{Database, Workspace};
