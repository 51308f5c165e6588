//! Task rows and the per-project task-number sequencer
//!
//! Numbers come from the `task_counters` high-water row, bumped inside the
//! same immediate transaction that inserts the task. The counter survives
//! task deletion, so a number is issued exactly once and never reused —
//! gaps from rolled-back transactions are fine, duplicates are not.

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row};

use super::db::{parse_timestamp, StoreError};
use super::projects::parse_project_id;
use crate::domain::{NewTask, ProjectId, Task, TaskRef, TaskStatus};

const TASK_COLUMNS: &str =
    "project_id, task_number, title, status, description, created_at, updated_at";

/// Allocates the next task number for a project
///
/// Must run inside the immediate transaction that inserts the task row; the
/// writer lock taken at BEGIN serializes concurrent allocators. Projects
/// registered out-of-band get a counter row seeded from the current maximum.
pub fn next_task_number(conn: &Connection, project: &ProjectId) -> Result<i64, StoreError> {
    let bumped: Option<i64> = conn
        .query_row(
            "UPDATE task_counters SET last_number = last_number + 1
             WHERE project_id = ?1
             RETURNING last_number",
            params![project.as_str()],
            |row| row.get(0),
        )
        .optional()?;

    if let Some(number) = bumped {
        return Ok(number);
    }

    let seed: i64 = conn.query_row(
        "SELECT COALESCE(MAX(task_number), 0) + 1 FROM tasks WHERE project_id = ?1",
        params![project.as_str()],
        |row| row.get(0),
    )?;
    conn.execute(
        "INSERT INTO task_counters (project_id, last_number) VALUES (?1, ?2)",
        params![project.as_str(), seed],
    )?;

    Ok(seed)
}

/// Inserts a task, allocating its number from the sequencer
///
/// The caller has already verified the project exists, inside the same
/// transaction.
pub fn insert_task(
    conn: &Connection,
    project: &ProjectId,
    new_task: &NewTask,
) -> Result<Task, StoreError> {
    let number = next_task_number(conn, project)?;
    let now = Utc::now();

    conn.execute(
        "INSERT INTO tasks (project_id, task_number, title, status, description, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            project.as_str(),
            number,
            new_task.title,
            new_task.status.as_str(),
            new_task.description,
            now.to_rfc3339(),
            now.to_rfc3339(),
        ],
    )?;

    Ok(Task {
        key: project.task(number),
        title: new_task.title.clone(),
        status: new_task.status,
        description: new_task.description.clone(),
        created_at: now,
        updated_at: now,
    })
}

/// Fetches a task by its composite key
pub fn get_task(conn: &Connection, task: &TaskRef) -> Result<Option<Task>, StoreError> {
    conn.query_row(
        &format!("SELECT {TASK_COLUMNS} FROM tasks WHERE project_id = ?1 AND task_number = ?2"),
        params![task.project.as_str(), task.number],
        raw_task,
    )
    .optional()?
    .map(task_from_raw)
    .transpose()
}

/// Existence check used before linking edges
pub fn task_exists(conn: &Connection, task: &TaskRef) -> Result<bool, StoreError> {
    let exists: Option<i64> = conn
        .query_row(
            "SELECT 1 FROM tasks WHERE project_id = ?1 AND task_number = ?2",
            params![task.project.as_str(), task.number],
            |row| row.get(0),
        )
        .optional()?;

    Ok(exists.is_some())
}

/// Lists a project's tasks in creation (number) order
pub fn list_tasks(conn: &Connection, project: &ProjectId) -> Result<Vec<Task>, StoreError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {TASK_COLUMNS} FROM tasks WHERE project_id = ?1 ORDER BY task_number"
    ))?;

    let rows = stmt.query_map(params![project.as_str()], raw_task)?;
    collect_tasks(rows)
}

/// Updates a task's status; returns false if the task does not exist
pub fn set_status(
    conn: &Connection,
    task: &TaskRef,
    status: TaskStatus,
) -> Result<bool, StoreError> {
    let changed = conn.execute(
        "UPDATE tasks SET status = ?1, updated_at = ?2 WHERE project_id = ?3 AND task_number = ?4",
        params![
            status.as_str(),
            Utc::now().to_rfc3339(),
            task.project.as_str(),
            task.number,
        ],
    )?;

    Ok(changed > 0)
}

/// Deletes a task row; returns false if it was absent
///
/// Edge cleanup is the caller's job (`edges::delete_edges_for`), inside the
/// same transaction.
pub fn delete_task(conn: &Connection, task: &TaskRef) -> Result<bool, StoreError> {
    let deleted = conn.execute(
        "DELETE FROM tasks WHERE project_id = ?1 AND task_number = ?2",
        params![task.project.as_str(), task.number],
    )?;

    Ok(deleted > 0)
}

/// Tasks in a project that are not terminal and have no non-terminal predecessor
pub fn ready_tasks(conn: &Connection, project: &ProjectId) -> Result<Vec<Task>, StoreError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {TASK_COLUMNS} FROM tasks t
         WHERE t.project_id = ?1
           AND t.status NOT IN ('done', 'archived')
           AND NOT EXISTS (
               SELECT 1 FROM task_dependencies d
               JOIN tasks p ON p.project_id = d.pred_project_id
                           AND p.task_number = d.pred_task_number
               WHERE d.succ_project_id = t.project_id
                 AND d.succ_task_number = t.task_number
                 AND p.status NOT IN ('done', 'archived')
           )
         ORDER BY t.task_number"
    ))?;

    let rows = stmt.query_map(params![project.as_str()], raw_task)?;
    collect_tasks(rows)
}

/// Tasks in a project held back by at least one non-terminal predecessor
pub fn blocked_tasks(conn: &Connection, project: &ProjectId) -> Result<Vec<Task>, StoreError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {TASK_COLUMNS} FROM tasks t
         WHERE t.project_id = ?1
           AND t.status NOT IN ('done', 'archived')
           AND EXISTS (
               SELECT 1 FROM task_dependencies d
               JOIN tasks p ON p.project_id = d.pred_project_id
                           AND p.task_number = d.pred_task_number
               WHERE d.succ_project_id = t.project_id
                 AND d.succ_task_number = t.task_number
                 AND p.status NOT IN ('done', 'archived')
           )
         ORDER BY t.task_number"
    ))?;

    let rows = stmt.query_map(params![project.as_str()], raw_task)?;
    collect_tasks(rows)
}

type RawTask = (String, i64, String, String, Option<String>, String, String);

fn raw_task(row: &Row<'_>) -> rusqlite::Result<RawTask> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
        row.get(6)?,
    ))
}

fn task_from_raw(raw: RawTask) -> Result<Task, StoreError> {
    let (project_id, number, title, status, description, created_at, updated_at) = raw;

    Ok(Task {
        key: TaskRef::new(parse_project_id(&project_id)?, number),
        title,
        status: status
            .parse::<TaskStatus>()
            .map_err(|e| StoreError::CorruptRow(e.to_string()))?,
        description,
        created_at: parse_timestamp(&created_at)?,
        updated_at: parse_timestamp(&updated_at)?,
    })
}

fn collect_tasks(
    rows: impl Iterator<Item = rusqlite::Result<RawTask>>,
) -> Result<Vec<Task>, StoreError> {
    let mut tasks = Vec::new();
    for row in rows {
        tasks.push(task_from_raw(row?)?);
    }
    Ok(tasks)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{projects, Database};

    fn setup() -> (Database, ProjectId) {
        let db = Database::open_in_memory().unwrap();
        let project = projects::create_project(db.conn(), "Test").unwrap();
        (db, project.id)
    }

    #[test]
    fn numbers_are_sequential_from_one() {
        let (db, project) = setup();

        for expected in 1..=3 {
            let task = insert_task(db.conn(), &project, &NewTask::new("T")).unwrap();
            assert_eq!(task.number(), expected);
        }
    }

    #[test]
    fn numbers_are_independent_per_project() {
        let db = Database::open_in_memory().unwrap();
        let p1 = projects::create_project(db.conn(), "One").unwrap().id;
        let p2 = projects::create_project(db.conn(), "Two").unwrap().id;

        insert_task(db.conn(), &p1, &NewTask::new("A")).unwrap();
        insert_task(db.conn(), &p1, &NewTask::new("B")).unwrap();
        let t = insert_task(db.conn(), &p2, &NewTask::new("C")).unwrap();

        assert_eq!(t.number(), 1);
    }

    #[test]
    fn deleted_numbers_are_not_reused() {
        let (db, project) = setup();

        let t1 = insert_task(db.conn(), &project, &NewTask::new("A")).unwrap();
        let t2 = insert_task(db.conn(), &project, &NewTask::new("B")).unwrap();
        assert_eq!(t2.number(), 2);

        // Delete the highest-numbered task; the counter must not move back.
        assert!(delete_task(db.conn(), &t2.key).unwrap());
        let t3 = insert_task(db.conn(), &project, &NewTask::new("C")).unwrap();

        assert_eq!(t3.number(), 3);
        assert_eq!(t1.number(), 1);
    }

    #[test]
    fn counter_is_seeded_for_unregistered_projects() {
        let db = Database::open_in_memory().unwrap();
        let project = ProjectId::new("external").unwrap();

        // Simulate rows created by an external system without a counter.
        db.conn()
            .execute(
                "INSERT INTO tasks (project_id, task_number, title, status, description, created_at, updated_at)
                 VALUES ('external', 7, 'Legacy', 'open', NULL, '2026-01-01T00:00:00Z', '2026-01-01T00:00:00Z')",
                [],
            )
            .unwrap();

        assert_eq!(next_task_number(db.conn(), &project).unwrap(), 8);
        assert_eq!(next_task_number(db.conn(), &project).unwrap(), 9);
    }

    #[test]
    fn get_task_round_trips() {
        let (db, project) = setup();
        let created = insert_task(
            db.conn(),
            &project,
            &NewTask::new("Ship").with_description("All of it"),
        )
        .unwrap();

        let fetched = get_task(db.conn(), &created.key).unwrap().unwrap();
        assert_eq!(fetched, created);

        let missing = get_task(db.conn(), &project.task(99)).unwrap();
        assert!(missing.is_none());
    }

    #[test]
    fn set_status_updates_row() {
        let (db, project) = setup();
        let task = insert_task(db.conn(), &project, &NewTask::new("T")).unwrap();

        assert!(set_status(db.conn(), &task.key, TaskStatus::Done).unwrap());

        let fetched = get_task(db.conn(), &task.key).unwrap().unwrap();
        assert_eq!(fetched.status, TaskStatus::Done);
        assert!(!set_status(db.conn(), &project.task(99), TaskStatus::Done).unwrap());
    }

    #[test]
    fn ready_and_blocked_follow_predecessor_status() {
        let (db, project) = setup();
        let t1 = insert_task(db.conn(), &project, &NewTask::new("First")).unwrap();
        let t2 = insert_task(db.conn(), &project, &NewTask::new("Second")).unwrap();

        db.conn()
            .execute(
                "INSERT INTO task_dependencies
                 (pred_project_id, pred_task_number, succ_project_id, succ_task_number, dependency_type, created_at)
                 VALUES (?1, ?2, ?3, ?4, 'blocks', ?5)",
                params![
                    t1.project().as_str(),
                    t1.number(),
                    t2.project().as_str(),
                    t2.number(),
                    Utc::now().to_rfc3339(),
                ],
            )
            .unwrap();

        let ready = ready_tasks(db.conn(), &project).unwrap();
        assert_eq!(ready.len(), 1);
        assert_eq!(ready[0].key, t1.key);

        let blocked = blocked_tasks(db.conn(), &project).unwrap();
        assert_eq!(blocked.len(), 1);
        assert_eq!(blocked[0].key, t2.key);

        // Completing the predecessor unblocks the successor.
        set_status(db.conn(), &t1.key, TaskStatus::Done).unwrap();

        let ready = ready_tasks(db.conn(), &project).unwrap();
        assert_eq!(ready.len(), 1);
        assert_eq!(ready[0].key, t2.key);
        assert!(blocked_tasks(db.conn(), &project).unwrap().is_empty());
    }

    #[test]
    fn list_tasks_is_in_number_order() {
        let (db, project) = setup();
        insert_task(db.conn(), &project, &NewTask::new("A")).unwrap();
        insert_task(db.conn(), &project, &NewTask::new("B")).unwrap();

        let tasks = list_tasks(db.conn(), &project).unwrap();
        let numbers: Vec<i64> = tasks.iter().map(Task::number).collect();

        assert_eq!(numbers, vec![1, 2]);
    }
}
