//! Identifiers for projects and tasks
//!
//! ID Format:
//! - Project IDs: opaque strings, owned by whoever registers the project.
//!   Generated IDs use `p-{7-char-hash}` (e.g., `p-7f2b4c1`).
//! - Task refs: `{project-id}.{number}` (e.g., `p-7f2b4c1.12`). The number
//!   is the last dot-separated segment, so project IDs may themselves
//!   contain dots.
//!
//! Generated hashes are derived from name + creation timestamp, so the same
//! name registered at different times produces different IDs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum IdError {
    #[error("Invalid project ID: must be non-empty without whitespace, got '{0}'")]
    InvalidProjectId(String),

    #[error("Invalid task reference: expected '{{project-id}}.{{number}}', got '{0}'")]
    InvalidTaskRef(String),

    #[error("Invalid task number: must be a positive integer, got '{0}'")]
    InvalidTaskNumber(String),
}

/// Generates a 7-character hash from a name and timestamp
fn generate_hash(name: &str, timestamp: DateTime<Utc>) -> String {
    let input = format!("{}{}", name, timestamp.timestamp_nanos_opt().unwrap_or(0));
    let hash = blake3::hash(input.as_bytes());
    let hex = hash.to_hex();
    hex[..7].to_string()
}

/// Opaque project identifier
///
/// Projects are owned by the surrounding system; only existence matters
/// here. Any non-empty string without whitespace is accepted, so callers
/// can bring their own identifiers. [`ProjectId::generate`] produces the
/// `p-{hash}` form used when this crate registers the project itself.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ProjectId(String);

impl ProjectId {
    /// Creates a project ID from an opaque string, validating its shape
    pub fn new(id: impl Into<String>) -> Result<Self, IdError> {
        let id = id.into();
        if id.is_empty() || id.chars().any(char::is_whitespace) {
            return Err(IdError::InvalidProjectId(id));
        }
        Ok(Self(id))
    }

    /// Generates a new project ID from a name and timestamp
    pub fn generate(name: &str, timestamp: DateTime<Utc>) -> Self {
        Self(format!("p-{}", generate_hash(name, timestamp)))
    }

    /// Returns the ID as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Creates a task reference within this project
    pub fn task(&self, number: i64) -> TaskRef {
        TaskRef {
            project: self.clone(),
            number,
        }
    }
}

impl fmt::Display for ProjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for ProjectId {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s.trim())
    }
}

impl TryFrom<String> for ProjectId {
    type Error = IdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ProjectId> for String {
    fn from(id: ProjectId) -> Self {
        id.0
    }
}

/// Composite task key: project plus per-project task number
///
/// The number is assigned once from a strictly increasing per-project
/// sequence and never changes or gets reused, so a `TaskRef` identifies
/// the same task forever.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TaskRef {
    /// The project the task belongs to
    pub project: ProjectId,

    /// Task number, unique and immutable within the project
    pub number: i64,
}

impl TaskRef {
    /// Creates a task reference
    pub fn new(project: ProjectId, number: i64) -> Self {
        Self { project, number }
    }
}

impl fmt::Display for TaskRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.project, self.number)
    }
}

impl FromStr for TaskRef {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();

        // The number is the last segment; the project part keeps any dots.
        let (project_part, number_part) = s
            .rsplit_once('.')
            .ok_or_else(|| IdError::InvalidTaskRef(s.to_string()))?;

        let number: i64 = number_part
            .parse()
            .map_err(|_| IdError::InvalidTaskNumber(number_part.to_string()))?;
        if number < 1 {
            return Err(IdError::InvalidTaskNumber(number_part.to_string()));
        }

        let project = project_part
            .parse::<ProjectId>()
            .map_err(|_| IdError::InvalidTaskRef(s.to_string()))?;

        Ok(Self { project, number })
    }
}

impl TryFrom<String> for TaskRef {
    type Error = IdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<TaskRef> for String {
    fn from(task: TaskRef) -> Self {
        task.to_string()
    }
}
