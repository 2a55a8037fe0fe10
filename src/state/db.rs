// SQLite database setup and migrations
use rusqlite::Connection;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("Database connection lock poisoned")]
    LockPoisoned,
    #[error("Corrupt row: {0}")]
    CorruptRow(String),
}

pub type DbResult<T> = Result<T, DbError>;

// Shared connection; writers take the lock for the duration of a statement or transaction
pub struct DbConnection {
    conn: Arc<Mutex<Connection>>,
}

impl DbConnection {
    pub fn new(conn: Connection) -> Self {
        Self {
            conn: Arc::new(Mutex::new(conn)),
        }
    }

    pub fn lock(&self) -> DbResult<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| DbError::LockPoisoned)
    }
}

impl Clone for DbConnection {
    fn clone(&self) -> Self {
        Self {
            conn: Arc::clone(&self.conn),
        }
    }
}

/// Open (or create) the run database at `db_path` and apply migrations
pub fn init_db(db_path: &Path) -> DbResult<DbConnection> {
    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let conn = Connection::open(db_path)?;
    prepare(conn)
}

/// In-memory database with the full schema
pub fn init_in_memory() -> DbResult<DbConnection> {
    prepare(Connection::open_in_memory()?)
}

fn prepare(conn: Connection) -> DbResult<DbConnection> {
    conn.execute("PRAGMA foreign_keys = ON", [])?;
    run_migrations(&conn)?;
    Ok(DbConnection::new(conn))
}

fn run_migrations(conn: &Connection) -> DbResult<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )?;

    let current_version: i32 = conn
        .query_row(
            "SELECT COALESCE(MAX(version), 0) FROM schema_migrations",
            [],
            |row| row.get(0),
        )
        .unwrap_or(0);

    if current_version < 1 {
        migration_v1(conn)?;
        conn.execute("INSERT INTO schema_migrations (version) VALUES (?1)", [1])?;
    }

    Ok(())
}

fn migration_v1(conn: &Connection) -> DbResult<()> {
    // One row per extraction run, with the parameters it ran under
    conn.execute(
        "CREATE TABLE IF NOT EXISTS extraction_runs (
            id TEXT PRIMARY KEY,
            created_at TEXT NOT NULL,
            pipeline_version TEXT NOT NULL,
            gap_threshold_ms REAL NOT NULL,
            min_segment_samples INTEGER NOT NULL,
            noise_floor REAL NOT NULL,
            score_columns TEXT NOT NULL,
            status TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_extraction_runs_created_at ON extraction_runs(created_at DESC)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS subjects (
            run_id TEXT NOT NULL,
            subject_id TEXT NOT NULL,
            source_path TEXT NOT NULL,
            source_sha256 TEXT,
            status TEXT NOT NULL,
            reason TEXT,
            swing_count INTEGER NOT NULL,
            PRIMARY KEY (run_id, source_path),
            FOREIGN KEY (run_id) REFERENCES extraction_runs(id) ON DELETE CASCADE
        )",
        [],
    )?;

    // Score values are stored as a JSON array aligned with the run's score_columns
    conn.execute(
        "CREATE TABLE IF NOT EXISTS examples (
            run_id TEXT NOT NULL,
            row_index INTEGER NOT NULL,
            subject_id TEXT NOT NULL,
            swing_id INTEGER NOT NULL,
            max_v REAL NOT NULL,
            mean_v REAL NOT NULL,
            max_w REAL NOT NULL,
            accel_time REAL NOT NULL,
            decel_time REAL NOT NULL,
            v_peak_time REAL NOT NULL,
            w_integral REAL NOT NULL,
            scores TEXT NOT NULL,
            PRIMARY KEY (run_id, row_index),
            FOREIGN KEY (run_id) REFERENCES extraction_runs(id) ON DELETE CASCADE
        )",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_examples_subject ON examples(run_id, subject_id)",
        [],
    )?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_db_init() {
        let conn = Connection::open_in_memory().unwrap();
        run_migrations(&conn).unwrap();

        let table_count: i32 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name IN ('extraction_runs', 'subjects', 'examples')",
                [],
                |row| row.get(0),
            )
            .unwrap();

        assert_eq!(table_count, 3);
    }

    #[test]
    fn test_migrations_are_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        run_migrations(&conn).unwrap();
        run_migrations(&conn).unwrap();

        let versions: i32 = conn
            .query_row("SELECT COUNT(*) FROM schema_migrations", [], |row| row.get(0))
            .unwrap();
        assert_eq!(versions, 1);
    }

    #[test]
    fn test_init_db_creates_parent_dir() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("state").join("runs.db");

        let db = init_db(&path).unwrap();
        assert!(path.exists());
        assert!(db.lock().is_ok());
    }
}
