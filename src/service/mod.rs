//! # Dependency Service
//!
//! The sole entry point for mutating tasks and dependency edges. Every
//! operation runs in one immediate-mode transaction: validation and
//! mutation see the same snapshot, and a rejected operation leaves no
//! trace. Transient lock contention is retried a bounded number of times
//! before surfacing as [`ServiceError::Conflict`].
//!
//! Violations map to a small taxonomy:
//! - [`ServiceError::NotFound`] — referenced project or task absent
//! - [`ServiceError::Validation`] — self-dependency or would-be cycle
//! - [`ServiceError::Conflict`] — write contention after retries
//! - [`ServiceError::Storage`] — everything else, propagated as-is

pub mod cycle;

use std::fmt;
use std::thread;
use std::time::Duration;

use rusqlite::Transaction;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, warn};

use crate::domain::{
    DependencyType, NewTask, ProjectId, Task, TaskDependency, TaskRef, TaskStatus,
};
use crate::storage::{
    edges, is_busy, projects, tasks, Config, Database, EdgeOrder, EdgeSort, Project, StoreError,
};
use cycle::TxEdges;

/// Which side of a task the listing follows
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Edges pointing at the task (what it waits for)
    Predecessors,
    /// Edges leaving the task (what waits for it)
    Successors,
    /// Every edge touching the task on either side
    Either,
}

/// The kind of entity a lookup failed on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Project,
    Task,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityKind::Project => f.write_str("project"),
            EntityKind::Task => f.write_str("task"),
        }
    }
}

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("{kind} not found: {id}")]
    NotFound { kind: EntityKind, id: String },

    #[error("{0}")]
    Validation(String),

    #[error("storage is busy: gave up after {attempts} attempts")]
    Conflict { attempts: u32 },

    #[error(transparent)]
    Storage(#[from] StoreError),
}

impl ServiceError {
    fn project_not_found(id: &ProjectId) -> Self {
        Self::NotFound {
            kind: EntityKind::Project,
            id: id.to_string(),
        }
    }

    fn task_not_found(task: &TaskRef) -> Self {
        Self::NotFound {
            kind: EntityKind::Task,
            id: task.to_string(),
        }
    }

    /// Returns true for client errors about missing entities
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Returns true for rejected-input errors
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }
}

fn is_transient(err: &ServiceError) -> bool {
    matches!(err, ServiceError::Storage(StoreError::Sqlite(e)) if is_busy(e))
}

/// Result of a whole-graph acyclicity audit
#[derive(Debug, Serialize)]
pub struct GraphAudit {
    pub tasks: usize,
    pub edges: usize,
    /// One offending cycle, if the stored graph ever violates the invariant
    pub cycle: Option<Vec<TaskRef>>,
}

impl GraphAudit {
    pub fn is_healthy(&self) -> bool {
        self.cycle.is_none()
    }
}

/// Entry point for task and dependency operations
///
/// Owns one database handle; concurrent callers each construct their own
/// service over the same database file.
pub struct DependencyService {
    db: Database,
    max_retries: u32,
    retry_delay: Duration,
}

impl DependencyService {
    /// Creates a service with default retry tuning
    pub fn new(db: Database) -> Self {
        Self {
            db,
            max_retries: 3,
            retry_delay: Duration::from_millis(25),
        }
    }

    /// Creates a service tuned from configuration
    pub fn with_config(db: Database, config: &Config) -> Self {
        Self {
            db,
            max_retries: config.storage.max_write_retries,
            retry_delay: config.retry_delay(),
        }
    }

    // ------------------------------------------------------------------
    // Projects
    // ------------------------------------------------------------------

    /// Registers a project under a generated ID
    pub fn create_project(&mut self, name: &str) -> Result<Project, ServiceError> {
        let project = self.write_tx("create_project", |tx| {
            Ok(projects::create_project(tx, name)?)
        })?;
        debug!(project = %project.id, "registered project");
        Ok(project)
    }

    /// Fetches a project, failing if it is absent
    pub fn get_project(&self, id: &ProjectId) -> Result<Project, ServiceError> {
        projects::get_project(self.db.conn(), id)?
            .ok_or_else(|| ServiceError::project_not_found(id))
    }

    /// Lists all registered projects
    pub fn list_projects(&self) -> Result<Vec<Project>, ServiceError> {
        Ok(projects::list_projects(self.db.conn())?)
    }

    // ------------------------------------------------------------------
    // Tasks
    // ------------------------------------------------------------------

    /// Creates a task, allocating its number atomically
    ///
    /// The existence check, number allocation, and insert share one
    /// transaction; concurrent creators for the same project serialize on
    /// the writer lock and therefore never observe the same "next" value.
    pub fn create_task(
        &mut self,
        project: &ProjectId,
        new_task: &NewTask,
    ) -> Result<Task, ServiceError> {
        let task = self.write_tx("create_task", |tx| {
            if !projects::project_exists(tx, project)? {
                return Err(ServiceError::project_not_found(project));
            }
            Ok(tasks::insert_task(tx, project, new_task)?)
        })?;
        debug!(task = %task.key, "created task");
        Ok(task)
    }

    /// Fetches a task, failing if it is absent
    pub fn get_task(&self, task: &TaskRef) -> Result<Task, ServiceError> {
        tasks::get_task(self.db.conn(), task)?.ok_or_else(|| ServiceError::task_not_found(task))
    }

    /// Lists a project's tasks in creation order
    pub fn list_tasks(&self, project: &ProjectId) -> Result<Vec<Task>, ServiceError> {
        if !projects::project_exists(self.db.conn(), project)? {
            return Err(ServiceError::project_not_found(project));
        }
        Ok(tasks::list_tasks(self.db.conn(), project)?)
    }

    /// Sets a task's status (any status to any other; no state machine)
    pub fn set_task_status(
        &mut self,
        task: &TaskRef,
        status: TaskStatus,
    ) -> Result<(), ServiceError> {
        self.write_tx("set_task_status", |tx| {
            if !tasks::set_status(tx, task, status)? {
                return Err(ServiceError::task_not_found(task));
            }
            Ok(())
        })
    }

    /// Deletes a task and every edge referencing it, atomically
    ///
    /// Returns false (not an error) if the task was already gone. The
    /// task's number is never reissued.
    pub fn delete_task(&mut self, task: &TaskRef) -> Result<bool, ServiceError> {
        let deleted = self.write_tx("delete_task", |tx| {
            if !tasks::delete_task(tx, task)? {
                return Ok(false);
            }
            let cascaded = edges::delete_edges_for(tx, task)?;
            debug!(task = %task, cascaded, "deleted task with edge cascade");
            Ok(true)
        })?;
        Ok(deleted)
    }

    /// Tasks with no non-terminal predecessor
    pub fn ready_tasks(&self, project: &ProjectId) -> Result<Vec<Task>, ServiceError> {
        if !projects::project_exists(self.db.conn(), project)? {
            return Err(ServiceError::project_not_found(project));
        }
        Ok(tasks::ready_tasks(self.db.conn(), project)?)
    }

    /// Tasks held back by at least one non-terminal predecessor
    pub fn blocked_tasks(&self, project: &ProjectId) -> Result<Vec<Task>, ServiceError> {
        if !projects::project_exists(self.db.conn(), project)? {
            return Err(ServiceError::project_not_found(project));
        }
        Ok(tasks::blocked_tasks(self.db.conn(), project)?)
    }

    // ------------------------------------------------------------------
    // Dependencies
    // ------------------------------------------------------------------

    /// Adds a dependency edge pred -> succ
    ///
    /// Rejects self-dependencies and cycle-closing edges without touching
    /// storage; re-adding an existing pair returns the stored edge
    /// unchanged (the stored tag wins over the incoming one). Validation
    /// and insert share one transaction, so two concurrent calls adding
    /// A -> B and B -> A cannot both pass the check.
    pub fn add_dependency(
        &mut self,
        pred: &TaskRef,
        succ: &TaskRef,
        dep_type: &DependencyType,
    ) -> Result<TaskDependency, ServiceError> {
        if pred == succ {
            return Err(ServiceError::Validation("self-dependency".to_string()));
        }

        let edge = self.write_tx("add_dependency", |tx| {
            for task in [pred, succ] {
                if !tasks::task_exists(tx, task)? {
                    return Err(ServiceError::task_not_found(task));
                }
            }

            if let Some(existing) = edges::get_edge(tx, pred, succ)? {
                return Ok(existing);
            }

            if cycle::would_create_cycle(&TxEdges(tx), pred, succ)? {
                return Err(ServiceError::Validation(
                    "circular dependency detected".to_string(),
                ));
            }

            Ok(edges::insert_edge(tx, pred, succ, dep_type)?)
        })?;
        debug!(pred = %pred, succ = %succ, "dependency in place");
        Ok(edge)
    }

    /// Removes a dependency edge; false (not an error) when absent
    pub fn remove_dependency(
        &mut self,
        pred: &TaskRef,
        succ: &TaskRef,
    ) -> Result<bool, ServiceError> {
        self.write_tx("remove_dependency", |tx| {
            Ok(edges::delete_edge(tx, pred, succ)?)
        })
    }

    /// Lists edges around a task
    ///
    /// `sort_field` accepts `created`, `type`, or `number`; anything else
    /// falls back to creation order. For [`Direction::Either`] the listing
    /// is always creation-ordered; the type filter still applies.
    pub fn list_dependencies(
        &self,
        task: &TaskRef,
        direction: Direction,
        sort_field: Option<&str>,
        descending: bool,
        filter_type: Option<&DependencyType>,
    ) -> Result<Vec<TaskDependency>, ServiceError> {
        let conn = self.db.conn();
        if !tasks::task_exists(conn, task)? {
            return Err(ServiceError::task_not_found(task));
        }

        let sort = resolve_sort(sort_field, descending);
        let listed = match direction {
            Direction::Predecessors => edges::list_predecessors(conn, task, sort, filter_type)?,
            Direction::Successors => edges::list_successors(conn, task, sort, filter_type)?,
            Direction::Either => {
                let mut all = edges::list_edges_touching(conn, task)?;
                if let Some(tag) = filter_type {
                    all.retain(|e| &e.dep_type == tag);
                }
                all
            }
        };

        Ok(listed)
    }

    // ------------------------------------------------------------------
    // Diagnostics
    // ------------------------------------------------------------------

    /// Audits the whole stored graph against the acyclicity invariant
    ///
    /// Spans every project, since edges do. A populated `cycle` means the
    /// invariant has been violated out-of-band (e.g. by direct writes).
    pub fn check_integrity(&self) -> Result<GraphAudit, ServiceError> {
        let graph = edges::load_graph(self.db.conn())?;
        let audit = GraphAudit {
            tasks: graph.task_count(),
            edges: graph.edge_count(),
            cycle: graph.find_cycle(),
        };

        if let Some(cycle) = &audit.cycle {
            warn!(?cycle, "stored dependency graph contains a cycle");
        }

        Ok(audit)
    }

    // ------------------------------------------------------------------
    // Transaction plumbing
    // ------------------------------------------------------------------

    /// Runs a mutation in one immediate transaction, retrying on contention
    ///
    /// The closure may run more than once; it must not capture side
    /// effects. A non-transient error aborts immediately and the
    /// transaction rolls back on drop — no partial writes survive.
    fn write_tx<T, F>(&mut self, op: &'static str, body: F) -> Result<T, ServiceError>
    where
        F: Fn(&Transaction<'_>) -> Result<T, ServiceError>,
    {
        let mut attempt: u32 = 0;

        loop {
            attempt += 1;

            match self.try_write(&body) {
                Err(err) if is_transient(&err) => {
                    if attempt > self.max_retries {
                        warn!(op, attempt, "write contention exhausted retries");
                        return Err(ServiceError::Conflict { attempts: attempt });
                    }
                    debug!(op, attempt, "write contention, retrying");
                    thread::sleep(self.retry_delay * attempt);
                }
                other => return other,
            }
        }
    }

    fn try_write<T, F>(&mut self, body: &F) -> Result<T, ServiceError>
    where
        F: Fn(&Transaction<'_>) -> Result<T, ServiceError>,
    {
        let tx = self.db.transaction()?;
        let value = body(&tx)?;
        tx.commit().map_err(StoreError::from)?;
        Ok(value)
    }
}

/// Maps a sort hint to a concrete order, defaulting to creation order
fn resolve_sort(field: Option<&str>, descending: bool) -> EdgeSort {
    let order_by = match field {
        Some("created") | Some("created_at") | None => EdgeOrder::CreatedAt,
        Some("type") | Some("dependency_type") => EdgeOrder::DependencyType,
        Some("number") | Some("task_number") => EdgeOrder::TaskNumber,
        Some(other) => {
            debug!(field = other, "unknown sort field, using creation order");
            EdgeOrder::CreatedAt
        }
    };

    EdgeSort {
        order_by,
        descending,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service() -> DependencyService {
        DependencyService::new(Database::open_in_memory().unwrap())
    }

    fn setup_tasks(svc: &mut DependencyService, count: usize) -> Vec<TaskRef> {
        let project = svc.create_project("Test").unwrap().id;
        (0..count)
            .map(|i| {
                svc.create_task(&project, &NewTask::new(format!("Task {i}")))
                    .unwrap()
                    .key
            })
            .collect()
    }

    #[test]
    fn create_task_requires_existing_project() {
        let mut svc = service();
        let missing = ProjectId::new("p-missing").unwrap();

        let err = svc.create_task(&missing, &NewTask::new("T")).unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn task_numbers_increase_per_project() {
        let mut svc = service();
        let refs = setup_tasks(&mut svc, 3);

        let numbers: Vec<i64> = refs.iter().map(|r| r.number).collect();
        assert_eq!(numbers, vec![1, 2, 3]);
    }

    #[test]
    fn self_dependency_is_rejected() {
        let mut svc = service();
        let refs = setup_tasks(&mut svc, 1);

        let err = svc
            .add_dependency(&refs[0], &refs[0], &DependencyType::blocks())
            .unwrap_err();

        assert!(err.is_validation());
        assert!(err.to_string().contains("self-dependency"));
    }

    #[test]
    fn missing_endpoint_is_not_found() {
        let mut svc = service();
        let refs = setup_tasks(&mut svc, 1);
        let ghost = refs[0].project.task(99);

        let err = svc
            .add_dependency(&refs[0], &ghost, &DependencyType::blocks())
            .unwrap_err();

        assert!(err.is_not_found());
    }

    #[test]
    fn duplicate_add_returns_the_stored_edge() {
        let mut svc = service();
        let refs = setup_tasks(&mut svc, 2);

        let first = svc
            .add_dependency(&refs[0], &refs[1], &DependencyType::blocks())
            .unwrap();
        // Different tag on the re-add; the stored edge wins.
        let second = svc
            .add_dependency(
                &refs[0],
                &refs[1],
                &DependencyType::new("relates").unwrap(),
            )
            .unwrap();

        assert_eq!(first, second);
        assert_eq!(second.dep_type.as_str(), "blocks");

        let listed = svc
            .list_dependencies(&refs[1], Direction::Predecessors, None, false, None)
            .unwrap();
        assert_eq!(listed.len(), 1);
    }

    #[test]
    fn cycle_is_rejected_without_mutation() {
        let mut svc = service();
        let refs = setup_tasks(&mut svc, 3);

        svc.add_dependency(&refs[0], &refs[1], &DependencyType::blocks())
            .unwrap();
        svc.add_dependency(&refs[1], &refs[2], &DependencyType::blocks())
            .unwrap();

        let before = svc
            .list_dependencies(&refs[0], Direction::Either, None, false, None)
            .unwrap();

        let err = svc
            .add_dependency(&refs[2], &refs[0], &DependencyType::blocks())
            .unwrap_err();
        assert!(err.is_validation());
        assert!(err.to_string().contains("circular dependency detected"));

        let after = svc
            .list_dependencies(&refs[0], Direction::Either, None, false, None)
            .unwrap();
        assert_eq!(before, after);

        let audit = svc.check_integrity().unwrap();
        assert!(audit.is_healthy());
    }

    #[test]
    fn round_trip_listing() {
        let mut svc = service();
        let refs = setup_tasks(&mut svc, 2);

        svc.add_dependency(&refs[0], &refs[1], &DependencyType::blocks())
            .unwrap();

        let succs = svc
            .list_dependencies(&refs[0], Direction::Successors, None, false, None)
            .unwrap();
        assert_eq!(succs.len(), 1);
        assert_eq!(succs[0].successor, refs[1]);

        let preds = svc
            .list_dependencies(&refs[1], Direction::Predecessors, None, false, None)
            .unwrap();
        assert_eq!(preds.len(), 1);
        assert_eq!(preds[0].predecessor, refs[0]);

        assert!(svc.remove_dependency(&refs[0], &refs[1]).unwrap());

        let succs = svc
            .list_dependencies(&refs[0], Direction::Successors, None, false, None)
            .unwrap();
        assert!(succs.is_empty());
        let preds = svc
            .list_dependencies(&refs[1], Direction::Predecessors, None, false, None)
            .unwrap();
        assert!(preds.is_empty());
    }

    #[test]
    fn remove_absent_edge_is_false_not_error() {
        let mut svc = service();
        let refs = setup_tasks(&mut svc, 2);

        assert!(!svc.remove_dependency(&refs[0], &refs[1]).unwrap());
    }

    #[test]
    fn delete_task_cascades_to_edges() {
        let mut svc = service();
        let refs = setup_tasks(&mut svc, 3);

        svc.add_dependency(&refs[0], &refs[1], &DependencyType::blocks())
            .unwrap();
        svc.add_dependency(&refs[1], &refs[2], &DependencyType::blocks())
            .unwrap();

        assert!(svc.delete_task(&refs[1]).unwrap());
        assert!(!svc.delete_task(&refs[1]).unwrap());

        let around_a = svc
            .list_dependencies(&refs[0], Direction::Either, None, false, None)
            .unwrap();
        assert!(around_a.is_empty());
        let around_c = svc
            .list_dependencies(&refs[2], Direction::Either, None, false, None)
            .unwrap();
        assert!(around_c.is_empty());

        let audit = svc.check_integrity().unwrap();
        assert_eq!(audit.edges, 0);
        assert_eq!(audit.tasks, 2);
    }

    #[test]
    fn deleted_task_number_is_not_reissued() {
        let mut svc = service();
        let refs = setup_tasks(&mut svc, 2);
        let project = refs[0].project.clone();

        svc.delete_task(&refs[1]).unwrap();
        let next = svc.create_task(&project, &NewTask::new("Next")).unwrap();

        assert_eq!(next.key.number, 3);
    }

    #[test]
    fn cross_project_cycle_is_rejected() {
        let mut svc = service();
        let p1 = svc.create_project("One").unwrap().id;
        let p2 = svc.create_project("Two").unwrap().id;
        let a = svc.create_task(&p1, &NewTask::new("A")).unwrap().key;
        let b = svc.create_task(&p2, &NewTask::new("B")).unwrap().key;

        svc.add_dependency(&a, &b, &DependencyType::blocks()).unwrap();

        let err = svc
            .add_dependency(&b, &a, &DependencyType::blocks())
            .unwrap_err();
        assert!(err.to_string().contains("circular dependency detected"));
    }

    #[test]
    fn invalid_sort_field_falls_back_to_creation_order() {
        let mut svc = service();
        let refs = setup_tasks(&mut svc, 3);

        svc.add_dependency(&refs[1], &refs[2], &DependencyType::blocks())
            .unwrap();
        svc.add_dependency(&refs[0], &refs[2], &DependencyType::blocks())
            .unwrap();

        let bogus = svc
            .list_dependencies(
                &refs[2],
                Direction::Predecessors,
                Some("no-such-field"),
                false,
                None,
            )
            .unwrap();
        let default = svc
            .list_dependencies(&refs[2], Direction::Predecessors, None, false, None)
            .unwrap();

        assert_eq!(bogus, default);

        // A recognized field changes the order.
        let by_number = svc
            .list_dependencies(
                &refs[2],
                Direction::Predecessors,
                Some("number"),
                false,
                None,
            )
            .unwrap();
        let numbers: Vec<i64> = by_number.iter().map(|e| e.predecessor.number).collect();
        assert_eq!(numbers, vec![1, 2]);
    }

    #[test]
    fn type_filter_applies_in_every_direction() {
        let mut svc = service();
        let refs = setup_tasks(&mut svc, 3);
        let relates = DependencyType::new("relates").unwrap();

        svc.add_dependency(&refs[0], &refs[1], &DependencyType::blocks())
            .unwrap();
        svc.add_dependency(&refs[1], &refs[2], &relates).unwrap();

        let filtered = svc
            .list_dependencies(&refs[1], Direction::Either, None, false, Some(&relates))
            .unwrap();

        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].successor, refs[2]);
    }

    #[test]
    fn status_updates_flow_into_ready_queries() {
        let mut svc = service();
        let refs = setup_tasks(&mut svc, 2);
        let project = refs[0].project.clone();

        svc.add_dependency(&refs[0], &refs[1], &DependencyType::blocks())
            .unwrap();

        let blocked = svc.blocked_tasks(&project).unwrap();
        assert_eq!(blocked.len(), 1);
        assert_eq!(blocked[0].key, refs[1]);

        svc.set_task_status(&refs[0], TaskStatus::Done).unwrap();

        let ready = svc.ready_tasks(&project).unwrap();
        assert_eq!(ready.len(), 1);
        assert_eq!(ready[0].key, refs[1]);
    }

    #[test]
    fn get_task_reports_missing_key() {
        let mut svc = service();
        let refs = setup_tasks(&mut svc, 1);

        assert!(svc.get_task(&refs[0]).is_ok());
        let err = svc.get_task(&refs[0].project.task(42)).unwrap_err();
        assert!(err.is_not_found());
    }
}
