//! Task and dependency domain models
//!
//! A task is identified by its composite key (project, number). Dependency
//! edges state that the predecessor must reach a terminal status before the
//! successor counts as unblocked. Edges may span projects.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use super::id::{ProjectId, TaskRef};

#[derive(Debug, Error, PartialEq)]
pub enum TaskError {
    #[error("Unknown task status: '{0}'")]
    InvalidStatus(String),

    #[error("Dependency type must not be empty")]
    EmptyDependencyType,
}

/// Status of a task
///
/// The core has no state machine: any status can be set to any other. What
/// matters to the dependency graph is terminality — a successor is
/// unblocked once every predecessor is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    #[default]
    Open,
    InProgress,
    Done,
    Archived,
}

impl TaskStatus {
    /// Returns true if this status unblocks successors
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Done | TaskStatus::Archived)
    }

    /// Returns the storage representation
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Open => "open",
            TaskStatus::InProgress => "in_progress",
            TaskStatus::Done => "done",
            TaskStatus::Archived => "archived",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskStatus {
    type Err = TaskError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "open" => Ok(TaskStatus::Open),
            "in_progress" => Ok(TaskStatus::InProgress),
            "done" => Ok(TaskStatus::Done),
            "archived" => Ok(TaskStatus::Archived),
            other => Err(TaskError::InvalidStatus(other.to_string())),
        }
    }
}

/// Free-form dependency tag
///
/// The core does not interpret the tag; it only rejects empty ones. The
/// conventional default is `blocks`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DependencyType(String);

impl DependencyType {
    /// Creates a dependency type, rejecting empty tags
    pub fn new(tag: impl Into<String>) -> Result<Self, TaskError> {
        let tag = tag.into();
        if tag.trim().is_empty() {
            return Err(TaskError::EmptyDependencyType);
        }
        Ok(Self(tag))
    }

    /// The conventional blocking dependency
    pub fn blocks() -> Self {
        Self("blocks".to_string())
    }

    /// Returns the tag as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for DependencyType {
    fn default() -> Self {
        Self::blocks()
    }
}

impl fmt::Display for DependencyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for DependencyType {
    type Err = TaskError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for DependencyType {
    type Error = TaskError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<DependencyType> for String {
    fn from(tag: DependencyType) -> Self {
        tag.0
    }
}

/// A task within a project
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    /// Composite key: project plus task number
    pub key: TaskRef,

    /// Human-readable title
    pub title: String,

    /// Current status
    pub status: TaskStatus,

    /// Optional description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// When the task was created
    pub created_at: DateTime<Utc>,

    /// When the task was last updated
    pub updated_at: DateTime<Utc>,
}

impl Task {
    /// Returns the project this task belongs to
    pub fn project(&self) -> &ProjectId {
        &self.key.project
    }

    /// Returns the task number within its project
    pub fn number(&self) -> i64 {
        self.key.number
    }
}

/// Fields for creating a task; the key is assigned by the sequencer
#[derive(Debug, Clone, Default)]
pub struct NewTask {
    pub title: String,
    pub description: Option<String>,
    pub status: TaskStatus,
}

impl NewTask {
    /// Creates a task template with the given title
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }

    /// Sets the description
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// A directed dependency edge between two tasks
///
/// Reads as "predecessor must finish before successor". The endpoint pair
/// is unique; re-adding an existing pair returns the stored edge unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskDependency {
    /// The task that must reach a terminal status first
    pub predecessor: TaskRef,

    /// The task that is blocked until then
    pub successor: TaskRef,

    /// Free-form tag, not interpreted by the core
    #[serde(rename = "type")]
    pub dep_type: DependencyType,

    /// When the edge was created
    pub created_at: DateTime<Utc>,
}

impl TaskDependency {
    /// Returns true if the edge touches the given task on either side
    pub fn touches(&self, task: &TaskRef) -> bool {
        &self.predecessor == task || &self.successor == task
    }

    /// Returns the endpoint opposite to the given task, if the edge touches it
    pub fn other_endpoint(&self, task: &TaskRef) -> Option<&TaskRef> {
        if &self.predecessor == task {
            Some(&self.successor)
        } else if &self.successor == task {
            Some(&self.predecessor)
        } else {
            None
        }
    }
}
