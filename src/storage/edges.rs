//! Dependency edge rows
//!
//! Directed edges keyed by their composite endpoints. Callers validate
//! acyclicity and self-loops before inserting, inside the same transaction;
//! this module only stores and queries.

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row};

use super::db::{parse_timestamp, StoreError};
use super::projects::parse_project_id;
use crate::domain::{DependencyGraph, DependencyType, TaskDependency, TaskRef};

const EDGE_COLUMNS: &str =
    "pred_project_id, pred_task_number, succ_project_id, succ_task_number, dependency_type, created_at";

/// Sort order for edge listings
///
/// `TaskNumber` sorts by the far endpoint of the listing (the predecessor
/// when listing predecessors, the successor when listing successors).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EdgeOrder {
    #[default]
    CreatedAt,
    DependencyType,
    TaskNumber,
}

/// Sort specification: field plus direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EdgeSort {
    pub order_by: EdgeOrder,
    pub descending: bool,
}

impl EdgeSort {
    fn clause(&self, far_endpoint: &str) -> String {
        let direction = if self.descending { "DESC" } else { "ASC" };
        match self.order_by {
            EdgeOrder::CreatedAt => format!("created_at {direction}"),
            EdgeOrder::DependencyType => {
                format!("dependency_type {direction}, created_at {direction}")
            }
            EdgeOrder::TaskNumber => format!(
                "{far_endpoint}_project_id {direction}, {far_endpoint}_task_number {direction}"
            ),
        }
    }
}

/// Exact lookup, used for idempotent inserts
pub fn get_edge(
    conn: &Connection,
    pred: &TaskRef,
    succ: &TaskRef,
) -> Result<Option<TaskDependency>, StoreError> {
    conn.query_row(
        &format!(
            "SELECT {EDGE_COLUMNS} FROM task_dependencies
             WHERE pred_project_id = ?1 AND pred_task_number = ?2
               AND succ_project_id = ?3 AND succ_task_number = ?4"
        ),
        params![
            pred.project.as_str(),
            pred.number,
            succ.project.as_str(),
            succ.number,
        ],
        raw_edge,
    )
    .optional()?
    .map(edge_from_raw)
    .transpose()
}

/// Inserts an edge; the caller has already validated it in this transaction
pub fn insert_edge(
    conn: &Connection,
    pred: &TaskRef,
    succ: &TaskRef,
    dep_type: &DependencyType,
) -> Result<TaskDependency, StoreError> {
    let now = Utc::now();

    conn.execute(
        "INSERT INTO task_dependencies
         (pred_project_id, pred_task_number, succ_project_id, succ_task_number, dependency_type, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            pred.project.as_str(),
            pred.number,
            succ.project.as_str(),
            succ.number,
            dep_type.as_str(),
            now.to_rfc3339(),
        ],
    )?;

    Ok(TaskDependency {
        predecessor: pred.clone(),
        successor: succ.clone(),
        dep_type: dep_type.clone(),
        created_at: now,
    })
}

/// Deletes an edge; returns false (not an error) if it was absent
pub fn delete_edge(
    conn: &Connection,
    pred: &TaskRef,
    succ: &TaskRef,
) -> Result<bool, StoreError> {
    let deleted = conn.execute(
        "DELETE FROM task_dependencies
         WHERE pred_project_id = ?1 AND pred_task_number = ?2
           AND succ_project_id = ?3 AND succ_task_number = ?4",
        params![
            pred.project.as_str(),
            pred.number,
            succ.project.as_str(),
            succ.number,
        ],
    )?;

    Ok(deleted > 0)
}

/// Edges whose successor is the given task
pub fn list_predecessors(
    conn: &Connection,
    task: &TaskRef,
    sort: EdgeSort,
    filter_type: Option<&DependencyType>,
) -> Result<Vec<TaskDependency>, StoreError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {EDGE_COLUMNS} FROM task_dependencies
         WHERE succ_project_id = ?1 AND succ_task_number = ?2
           AND (?3 IS NULL OR dependency_type = ?3)
         ORDER BY {}",
        sort.clause("pred")
    ))?;

    let rows = stmt.query_map(
        params![
            task.project.as_str(),
            task.number,
            filter_type.map(DependencyType::as_str),
        ],
        raw_edge,
    )?;
    collect_edges(rows)
}

/// Edges whose predecessor is the given task
pub fn list_successors(
    conn: &Connection,
    task: &TaskRef,
    sort: EdgeSort,
    filter_type: Option<&DependencyType>,
) -> Result<Vec<TaskDependency>, StoreError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {EDGE_COLUMNS} FROM task_dependencies
         WHERE pred_project_id = ?1 AND pred_task_number = ?2
           AND (?3 IS NULL OR dependency_type = ?3)
         ORDER BY {}",
        sort.clause("succ")
    ))?;

    let rows = stmt.query_map(
        params![
            task.project.as_str(),
            task.number,
            filter_type.map(DependencyType::as_str),
        ],
        raw_edge,
    )?;
    collect_edges(rows)
}

/// Every edge referencing the task on either side
pub fn list_edges_touching(
    conn: &Connection,
    task: &TaskRef,
) -> Result<Vec<TaskDependency>, StoreError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {EDGE_COLUMNS} FROM task_dependencies
         WHERE (pred_project_id = ?1 AND pred_task_number = ?2)
            OR (succ_project_id = ?1 AND succ_task_number = ?2)
         ORDER BY created_at"
    ))?;

    let rows = stmt.query_map(params![task.project.as_str(), task.number], raw_edge)?;
    collect_edges(rows)
}

/// Removes every edge referencing the task; used by cascade deletion
pub fn delete_edges_for(conn: &Connection, task: &TaskRef) -> Result<usize, StoreError> {
    let deleted = conn.execute(
        "DELETE FROM task_dependencies
         WHERE (pred_project_id = ?1 AND pred_task_number = ?2)
            OR (succ_project_id = ?1 AND succ_task_number = ?2)",
        params![task.project.as_str(), task.number],
    )?;

    Ok(deleted)
}

/// Direct successor keys of a task; the reachability step of the cycle check
pub fn successor_refs(conn: &Connection, task: &TaskRef) -> Result<Vec<TaskRef>, StoreError> {
    let mut stmt = conn.prepare(
        "SELECT succ_project_id, succ_task_number FROM task_dependencies
         WHERE pred_project_id = ?1 AND pred_task_number = ?2",
    )?;

    let rows = stmt.query_map(params![task.project.as_str(), task.number], |row| {
        Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
    })?;

    let mut refs = Vec::new();
    for row in rows {
        let (project, number) = row?;
        refs.push(TaskRef::new(parse_project_id(&project)?, number));
    }

    Ok(refs)
}

/// Total number of stored edges
pub fn count_edges(conn: &Connection) -> Result<i64, StoreError> {
    Ok(conn.query_row("SELECT COUNT(*) FROM task_dependencies", [], |row| {
        row.get(0)
    })?)
}

/// Materializes the whole graph: every task as a node, every edge
///
/// The snapshot spans all projects, because edges do.
pub fn load_graph(conn: &Connection) -> Result<DependencyGraph, StoreError> {
    let mut graph = DependencyGraph::new();

    let mut stmt = conn.prepare("SELECT project_id, task_number FROM tasks")?;
    let rows = stmt.query_map([], |row| {
        Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
    })?;
    for row in rows {
        let (project, number) = row?;
        graph.add_task(TaskRef::new(parse_project_id(&project)?, number));
    }

    let mut stmt = conn.prepare(
        "SELECT pred_project_id, pred_task_number, succ_project_id, succ_task_number
         FROM task_dependencies",
    )?;
    let rows = stmt.query_map([], |row| {
        Ok((
            row.get::<_, String>(0)?,
            row.get::<_, i64>(1)?,
            row.get::<_, String>(2)?,
            row.get::<_, i64>(3)?,
        ))
    })?;
    for row in rows {
        let (pred_project, pred_number, succ_project, succ_number) = row?;
        graph.add_edge(
            TaskRef::new(parse_project_id(&pred_project)?, pred_number),
            TaskRef::new(parse_project_id(&succ_project)?, succ_number),
        );
    }

    Ok(graph)
}

type RawEdge = (String, i64, String, i64, String, String);

fn raw_edge(row: &Row<'_>) -> rusqlite::Result<RawEdge> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
    ))
}

fn edge_from_raw(raw: RawEdge) -> Result<TaskDependency, StoreError> {
    let (pred_project, pred_number, succ_project, succ_number, dep_type, created_at) = raw;

    Ok(TaskDependency {
        predecessor: TaskRef::new(parse_project_id(&pred_project)?, pred_number),
        successor: TaskRef::new(parse_project_id(&succ_project)?, succ_number),
        dep_type: DependencyType::new(dep_type)
            .map_err(|e| StoreError::CorruptRow(e.to_string()))?,
        created_at: parse_timestamp(&created_at)?,
    })
}

fn collect_edges(
    rows: impl Iterator<Item = rusqlite::Result<RawEdge>>,
) -> Result<Vec<TaskDependency>, StoreError> {
    let mut edges = Vec::new();
    for row in rows {
        edges.push(edge_from_raw(row?)?);
    }
    Ok(edges)
}
