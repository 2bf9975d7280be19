//! Database error types.

use std::path::PathBuf;
use thiserror::Error;

/// Errors from database operations.
#[derive(Error, Debug)]
pub enum DatabaseError {
    /// SQLite error from rusqlite.
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// IO error when creating directories or files.
    #[error("IO error for path '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A migration failed to apply.
    #[error("Migration failed at version {version}: {reason}")]
    Migration { version: u32, reason: String },

    /// The version marker table is corrupt (must contain exactly one row).
    #[error("Version table integrity check failed: expected 1 row, found {rows}")]
    VersionIntegrity { rows: u32 },

    /// A guarded status transition matched no row (already finalized or missing).
    #[error("Stale status transition for {entity} id {id}")]
    StaleTransition { entity: &'static str, id: i64 },

    /// A document points at a parent or base outside its own lineage.
    #[error("Lineage violation: {reason}")]
    Lineage { reason: String },

    /// The database lock was poisoned.
    #[error("Database lock poisoned")]
    LockPoisoned,
}
