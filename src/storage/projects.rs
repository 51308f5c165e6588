//! Project registry rows
//!
//! The dependency core only needs existence checks; registration lives here
//! so that standalone deployments (and tests) have somewhere to put
//! projects. Each project row is paired with its task-number counter row.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};

use super::db::{parse_timestamp, StoreError};
use crate::domain::ProjectId;

/// A registered project
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    pub id: ProjectId,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

/// Registers a project under a generated ID
pub fn create_project(conn: &Connection, name: &str) -> Result<Project, StoreError> {
    let now = Utc::now();
    let id = ProjectId::generate(name, now);
    register_project(conn, &id, name, now)
}

/// Registers a project under a caller-supplied ID
pub fn register_project(
    conn: &Connection,
    id: &ProjectId,
    name: &str,
    created_at: DateTime<Utc>,
) -> Result<Project, StoreError> {
    conn.execute(
        "INSERT INTO projects (id, name, created_at) VALUES (?1, ?2, ?3)",
        params![id.as_str(), name, created_at.to_rfc3339()],
    )?;
    conn.execute(
        "INSERT OR IGNORE INTO task_counters (project_id, last_number) VALUES (?1, 0)",
        params![id.as_str()],
    )?;

    Ok(Project {
        id: id.clone(),
        name: name.to_string(),
        created_at,
    })
}

/// Existence check used by the dependency service
pub fn project_exists(conn: &Connection, id: &ProjectId) -> Result<bool, StoreError> {
    let exists: Option<i64> = conn
        .query_row(
            "SELECT 1 FROM projects WHERE id = ?1",
            params![id.as_str()],
            |row| row.get(0),
        )
        .optional()?;

    Ok(exists.is_some())
}

/// Fetches a project by ID
pub fn get_project(conn: &Connection, id: &ProjectId) -> Result<Option<Project>, StoreError> {
    conn.query_row(
        "SELECT id, name, created_at FROM projects WHERE id = ?1",
        params![id.as_str()],
        |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
            ))
        },
    )
    .optional()?
    .map(|(id, name, created_at)| {
        Ok(Project {
            id: parse_project_id(&id)?,
            name,
            created_at: parse_timestamp(&created_at)?,
        })
    })
    .transpose()
}

/// Lists all projects in registration order
pub fn list_projects(conn: &Connection) -> Result<Vec<Project>, StoreError> {
    let mut stmt =
        conn.prepare("SELECT id, name, created_at FROM projects ORDER BY created_at, id")?;

    let rows = stmt.query_map([], |row| {
        Ok((
            row.get::<_, String>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, String>(2)?,
        ))
    })?;

    let mut projects = Vec::new();
    for row in rows {
        let (id, name, created_at) = row?;
        projects.push(Project {
            id: parse_project_id(&id)?,
            name,
            created_at: parse_timestamp(&created_at)?,
        });
    }

    Ok(projects)
}

pub(crate) fn parse_project_id(text: &str) -> Result<ProjectId, StoreError> {
    ProjectId::new(text).map_err(|e| StoreError::CorruptRow(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::Database;

    #[test]
    fn create_and_fetch_project() {
        let db = Database::open_in_memory().unwrap();
        let created = create_project(db.conn(), "Billing").unwrap();

        assert!(project_exists(db.conn(), &created.id).unwrap());

        let fetched = get_project(db.conn(), &created.id).unwrap().unwrap();
        assert_eq!(fetched, created);
    }

    #[test]
    fn missing_project_does_not_exist() {
        let db = Database::open_in_memory().unwrap();
        let id = ProjectId::new("p-nothere").unwrap();

        assert!(!project_exists(db.conn(), &id).unwrap());
        assert!(get_project(db.conn(), &id).unwrap().is_none());
    }

    #[test]
    fn registration_creates_counter_row() {
        let db = Database::open_in_memory().unwrap();
        let project = create_project(db.conn(), "Billing").unwrap();

        let counter: i64 = db
            .conn()
            .query_row(
                "SELECT last_number FROM task_counters WHERE project_id = ?1",
                params![project.id.as_str()],
                |row| row.get(0),
            )
            .unwrap();

        assert_eq!(counter, 0);
    }

    #[test]
    fn duplicate_registration_is_an_error() {
        let db = Database::open_in_memory().unwrap();
        let id = ProjectId::new("p-fixed").unwrap();

        register_project(db.conn(), &id, "First", Utc::now()).unwrap();
        let result = register_project(db.conn(), &id, "Second", Utc::now());

        assert!(result.is_err());
    }

    #[test]
    fn list_projects_returns_all() {
        let db = Database::open_in_memory().unwrap();
        create_project(db.conn(), "One").unwrap();
        create_project(db.conn(), "Two").unwrap();

        let projects = list_projects(db.conn()).unwrap();
        assert_eq!(projects.len(), 2);
    }
}
