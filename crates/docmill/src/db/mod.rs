//! Database module for persistent storage.
//!
//! Uses rusqlite (SQLite) with a thread-safe `Database` handle.
//! All access is serialized through a `Mutex<Connection>`.
//!
//! The store is the single source of truth for pipeline progress: document
//! lineage, per-step actions and run summaries all live here, so a restart
//! resumes exactly where the previous run stopped.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use rusqlite::Connection;

pub mod action_repo;
pub mod content_repo;
pub mod document_repo;
pub mod error;
pub mod migrations;
pub mod run_repo;
pub mod stats_repo;

pub use error::DatabaseError;

/// Thread-safe database handle wrapping a single rusqlite connection.
///
/// Cloning is cheap (inner `Arc`). All access is serialized through
/// a `Mutex`, which is fine for SQLite (which serializes writes anyway).
/// WAL mode is enabled for concurrent read performance.
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Opens (or creates) the database at the given path, runs all pending
    /// migrations and verifies the version marker.
    pub fn open(path: &Path) -> Result<Self, DatabaseError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| DatabaseError::Io {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;

        migrations::run_all(&conn)?;
        verify_version(&conn)?;

        log::info!("Database opened at {}", path.display());

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Opens an in-memory database for testing. Runs all migrations.
    pub fn open_in_memory() -> Result<Self, DatabaseError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;

        migrations::run_all(&conn)?;
        verify_version(&conn)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Provides locked access to the underlying connection.
    pub fn with_conn<F, T>(&self, f: F) -> Result<T, DatabaseError>
    where
        F: FnOnce(&Connection) -> Result<T, DatabaseError>,
    {
        let conn = self.conn.lock().map_err(|_| DatabaseError::LockPoisoned)?;
        f(&conn)
    }

    /// Runs the closure inside a transaction. Commits on `Ok`, rolls back
    /// on `Err`. Deferred foreign keys are checked at commit, which allows
    /// the insert-then-point-at-self dance for root documents.
    pub fn with_tx<F, T>(&self, f: F) -> Result<T, DatabaseError>
    where
        F: FnOnce(&Connection) -> Result<T, DatabaseError>,
    {
        let conn = self.conn.lock().map_err(|_| DatabaseError::LockPoisoned)?;
        let tx = conn.unchecked_transaction()?;
        let out = f(&tx)?;
        tx.commit()?;
        Ok(out)
    }
}

/// Checks the version marker table: exactly one row, anything else is
/// a corrupted store and refuses to open.
fn verify_version(conn: &Connection) -> Result<(), DatabaseError> {
    let rows: u32 = conn.query_row("SELECT COUNT(*) FROM version", [], |r| r.get(0))?;
    if rows != 1 {
        return Err(DatabaseError::VersionIntegrity { rows });
    }
    Ok(())
}

/// Returns the canonical database path: `~/.docmill/data/docmill.db`.
pub fn default_database_path() -> Option<PathBuf> {
    dirs::home_dir().map(|h| h.join(".docmill").join("data").join("docmill.db"))
}

/// Current UTC timestamp in RFC 3339, the format used for all
/// `*_at` columns.
pub(crate) fn now() -> String {
    chrono::Utc::now().to_rfc3339()
}

/// Current UTC date (`YYYY-MM-DD`), used for daily statistics buckets.
pub(crate) fn today() -> String {
    chrono::Utc::now().format("%Y-%m-%d").to_string()
}
