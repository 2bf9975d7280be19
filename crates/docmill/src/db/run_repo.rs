//! Run repository — one row per pipeline invocation with aggregate counters.

use rusqlite::{params, Connection, Row};

use super::error::DatabaseError;

/// A raw run row from the database.
#[derive(Debug, Clone)]
pub struct RunRow {
    pub id: i64,
    pub selection: String,
    pub status: String,
    pub no_selected: i64,
    pub no_ok: i64,
    pub no_errors: i64,
    pub no_children: i64,
    pub no_ready: i64,
    pub started_at: String,
    pub finished_at: Option<String>,
}

impl RunRow {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            selection: row.get("selection")?,
            status: row.get("status")?,
            no_selected: row.get("no_selected")?,
            no_ok: row.get("no_ok")?,
            no_errors: row.get("no_errors")?,
            no_children: row.get("no_children")?,
            no_ready: row.get("no_ready")?,
            started_at: row.get("started_at")?,
            finished_at: row.get("finished_at")?,
        })
    }
}

/// Opens a new run for the given step selection and returns its id.
pub fn start(conn: &Connection, selection: &str) -> Result<i64, DatabaseError> {
    conn.execute(
        "INSERT INTO run (selection, status, started_at) VALUES (?1, 'start', ?2)",
        params![selection, super::now()],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Adds documents picked up for processing to the selected counter.
pub fn add_selected(conn: &Connection, id: i64, n: i64) -> Result<(), DatabaseError> {
    conn.execute(
        "UPDATE run SET no_selected = no_selected + ?2 WHERE id = ?1",
        params![id, n],
    )?;
    Ok(())
}

/// Records one successfully processed document and any children it spawned.
pub fn add_ok(conn: &Connection, id: i64, children: i64) -> Result<(), DatabaseError> {
    conn.execute(
        "UPDATE run SET no_ok = no_ok + 1, no_children = no_children + ?2 WHERE id = ?1",
        params![id, children],
    )?;
    Ok(())
}

/// Records one failed document.
pub fn add_error(conn: &Connection, id: i64) -> Result<(), DatabaseError> {
    conn.execute(
        "UPDATE run SET no_errors = no_errors + 1 WHERE id = ?1",
        params![id],
    )?;
    Ok(())
}

/// Closes the run, recording how many documents are still waiting.
/// Guarded: closing an already-closed run is a stale transition.
pub fn finish(conn: &Connection, id: i64, no_ready: i64) -> Result<(), DatabaseError> {
    let updated = conn.execute(
        "UPDATE run SET status = 'end', no_ready = ?2, finished_at = ?3
         WHERE id = ?1 AND status = 'start'",
        params![id, no_ready, super::now()],
    )?;
    if updated != 1 {
        return Err(DatabaseError::StaleTransition { entity: "run", id });
    }
    Ok(())
}

/// Finds a run by its id.
pub fn find_by_id(conn: &Connection, id: i64) -> Result<Option<RunRow>, DatabaseError> {
    let mut stmt = conn.prepare("SELECT * FROM run WHERE id = ?1")?;
    let mut rows = stmt.query_map(params![id], RunRow::from_row)?;
    match rows.next() {
        Some(Ok(row)) => Ok(Some(row)),
        Some(Err(e)) => Err(DatabaseError::Sqlite(e)),
        None => Ok(None),
    }
}

/// The most recent runs, newest first.
pub fn recent(conn: &Connection, limit: u32) -> Result<Vec<RunRow>, DatabaseError> {
    let mut stmt = conn.prepare("SELECT * FROM run ORDER BY id DESC LIMIT ?1")?;
    let rows: Vec<RunRow> = stmt
        .query_map(params![limit], RunRow::from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}
