//! SQLite database handle and schema management
//!
//! One `Database` owns one connection. Concurrent callers each open their
//! own handle on the same file; WAL mode keeps readers unblocked while
//! immediate-mode transactions serialize writers. The schema is versioned
//! through `PRAGMA user_version`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use rusqlite::{Connection, ErrorCode, Transaction, TransactionBehavior};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Unsupported schema version {found} in {} (supported: {supported})", path.display())]
    SchemaVersion {
        found: i32,
        supported: i32,
        path: PathBuf,
    },

    #[error("Corrupt row: {0}")]
    CorruptRow(String),
}

/// Parses an RFC 3339 timestamp column
pub(crate) fn parse_timestamp(text: &str) -> Result<chrono::DateTime<chrono::Utc>, StoreError> {
    chrono::DateTime::parse_from_rfc3339(text)
        .map(|dt| dt.with_timezone(&chrono::Utc))
        .map_err(|e| StoreError::CorruptRow(format!("bad timestamp '{}': {}", text, e)))
}

/// Returns true for transient lock contention that is worth retrying
pub fn is_busy(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _)
            if e.code == ErrorCode::DatabaseBusy || e.code == ErrorCode::DatabaseLocked
    )
}

/// Handle to the trellis database
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Schema version - bump on schema changes and add a migration step
    pub const SCHEMA_VERSION: i32 = 1;

    /// Default time a writer waits on a locked database before giving up
    pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_millis(5000);

    /// Opens (creating if needed) the database at the given path
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        Self::open_with_timeout(path, Self::DEFAULT_BUSY_TIMEOUT)
    }

    /// Opens the database with an explicit busy timeout
    pub fn open_with_timeout(
        path: impl AsRef<Path>,
        busy_timeout: Duration,
    ) -> Result<Self, StoreError> {
        let path = path.as_ref();
        let conn = Connection::open(path)?;
        Self::from_connection(conn, busy_timeout, path.to_path_buf())
    }

    /// Opens a private in-memory database (used by unit tests)
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        Self::from_connection(conn, Self::DEFAULT_BUSY_TIMEOUT, PathBuf::from(":memory:"))
    }

    fn from_connection(
        conn: Connection,
        busy_timeout: Duration,
        path: PathBuf,
    ) -> Result<Self, StoreError> {
        // WAL keeps readers off the writer's back; NORMAL sync is safe in WAL
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;
        conn.busy_timeout(busy_timeout)?;

        let db = Self { conn };
        db.ensure_schema(&path)?;

        Ok(db)
    }

    fn ensure_schema(&self, path: &Path) -> Result<(), StoreError> {
        let found: i32 = self
            .conn
            .query_row("PRAGMA user_version", [], |row| row.get(0))?;

        match found {
            0 => self.create_schema(),
            v if v == Self::SCHEMA_VERSION => Ok(()),
            v => Err(StoreError::SchemaVersion {
                found: v,
                supported: Self::SCHEMA_VERSION,
                path: path.to_path_buf(),
            }),
        }
    }

    fn create_schema(&self) -> Result<(), StoreError> {
        self.conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS projects (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                created_at TEXT NOT NULL
            );

            -- High-water mark per project; survives task deletion so
            -- numbers are never reused.
            CREATE TABLE IF NOT EXISTS task_counters (
                project_id TEXT PRIMARY KEY,
                last_number INTEGER NOT NULL
            );

            CREATE TABLE IF NOT EXISTS tasks (
                project_id TEXT NOT NULL,
                task_number INTEGER NOT NULL,
                title TEXT NOT NULL,
                status TEXT NOT NULL,
                description TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                PRIMARY KEY (project_id, task_number)
            );

            CREATE TABLE IF NOT EXISTS task_dependencies (
                pred_project_id TEXT NOT NULL,
                pred_task_number INTEGER NOT NULL,
                succ_project_id TEXT NOT NULL,
                succ_task_number INTEGER NOT NULL,
                dependency_type TEXT NOT NULL,
                created_at TEXT NOT NULL,
                PRIMARY KEY (
                    pred_project_id, pred_task_number,
                    succ_project_id, succ_task_number
                )
            );

            CREATE INDEX IF NOT EXISTS idx_deps_succ
                ON task_dependencies(succ_project_id, succ_task_number);
            CREATE INDEX IF NOT EXISTS idx_tasks_status
                ON tasks(project_id, status);
            ",
        )?;

        self.conn.execute(
            &format!("PRAGMA user_version = {}", Self::SCHEMA_VERSION),
            [],
        )?;

        Ok(())
    }

    /// Returns the underlying connection for read queries
    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Starts an immediate-mode transaction
    ///
    /// The writer lock is taken at BEGIN, so every mutation sequence inside
    /// is serialized against other writers; a contended BEGIN waits up to
    /// the busy timeout and then fails with a busy error.
    pub fn transaction(&mut self) -> Result<Transaction<'_>, StoreError> {
        Ok(self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?)
    }
}
