//! Action repository — the audit trail of step executions.
//!
//! Every attempt to process a document creates exactly one action row.
//! Status transitions are monotonic: an action starts in `start` and is
//! finalized once to `end` or `error`. Both finalizers are guarded
//! updates; a second finalization hits zero rows and is reported as a
//! stale transition instead of silently rewriting history.

use rusqlite::{params, Connection, Row};

use super::error::DatabaseError;

/// A raw action row from the database.
#[derive(Debug, Clone)]
pub struct ActionRow {
    pub id: i64,
    pub run_id: i64,
    pub document_id: i64,
    pub parent_action_id: Option<i64>,
    pub code: String,
    pub status: String,
    pub directory: Option<String>,
    pub file_name: Option<String>,
    pub file_size: i64,
    pub no_pages: i64,
    pub no_children: i64,
    pub error_code: Option<String>,
    pub error_message: Option<String>,
    pub started_at: String,
    pub finished_at: Option<String>,
}

impl ActionRow {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            run_id: row.get("run_id")?,
            document_id: row.get("document_id")?,
            parent_action_id: row.get("parent_action_id")?,
            code: row.get("code")?,
            status: row.get("status")?,
            directory: row.get("directory")?,
            file_name: row.get("file_name")?,
            file_size: row.get("file_size")?,
            no_pages: row.get("no_pages")?,
            no_children: row.get("no_children")?,
            error_code: row.get("error_code")?,
            error_message: row.get("error_message")?,
            started_at: row.get("started_at")?,
            finished_at: row.get("finished_at")?,
        })
    }
}

/// Output facts recorded on a successfully finished action.
#[derive(Debug, Clone, Default)]
pub struct ActionOutput {
    pub directory: Option<String>,
    pub file_name: Option<String>,
    pub file_size: i64,
    pub no_pages: i64,
    pub no_children: i64,
}

/// Opens a new action in `start` status and returns its id.
pub fn start(
    conn: &Connection,
    run_id: i64,
    document_id: i64,
    code: &str,
    parent_action_id: Option<i64>,
) -> Result<i64, DatabaseError> {
    conn.execute(
        "INSERT INTO action (run_id, document_id, parent_action_id, code, status, started_at)
         VALUES (?1, ?2, ?3, ?4, 'start', ?5)",
        params![run_id, document_id, parent_action_id, code, super::now()],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Finalizes an action as succeeded, recording what it produced.
pub fn finish_ok(
    conn: &Connection,
    id: i64,
    output: &ActionOutput,
) -> Result<(), DatabaseError> {
    let updated = conn.execute(
        "UPDATE action SET status = 'end', directory = ?2, file_name = ?3, file_size = ?4,
         no_pages = ?5, no_children = ?6, finished_at = ?7
         WHERE id = ?1 AND status = 'start'",
        params![
            id,
            output.directory,
            output.file_name,
            output.file_size,
            output.no_pages,
            output.no_children,
            super::now(),
        ],
    )?;
    if updated != 1 {
        return Err(DatabaseError::StaleTransition {
            entity: "action",
            id,
        });
    }
    Ok(())
}

/// Finalizes an action as failed with a stable error code and message.
pub fn finish_error(
    conn: &Connection,
    id: i64,
    error_code: &str,
    error_message: &str,
) -> Result<(), DatabaseError> {
    let updated = conn.execute(
        "UPDATE action SET status = 'error', error_code = ?2, error_message = ?3,
         finished_at = ?4
         WHERE id = ?1 AND status = 'start'",
        params![id, error_code, error_message, super::now()],
    )?;
    if updated != 1 {
        return Err(DatabaseError::StaleTransition {
            entity: "action",
            id,
        });
    }
    Ok(())
}

/// Finds an action by its id.
pub fn find_by_id(conn: &Connection, id: i64) -> Result<Option<ActionRow>, DatabaseError> {
    let mut stmt = conn.prepare("SELECT * FROM action WHERE id = ?1")?;
    let mut rows = stmt.query_map(params![id], ActionRow::from_row)?;
    match rows.next() {
        Some(Ok(row)) => Ok(Some(row)),
        Some(Err(e)) => Err(DatabaseError::Sqlite(e)),
        None => Ok(None),
    }
}

/// Id of the most recent action recorded for a document, if any. Used to
/// chain a child document's first action to the action that produced it.
pub fn last_for_document(
    conn: &Connection,
    document_id: i64,
) -> Result<Option<i64>, DatabaseError> {
    let id: Option<i64> = conn.query_row(
        "SELECT MAX(id) FROM action WHERE document_id = ?1",
        params![document_id],
        |r| r.get(0),
    )?;
    Ok(id)
}

/// All actions recorded for one document, in execution order.
pub fn list_for_document(
    conn: &Connection,
    document_id: i64,
) -> Result<Vec<ActionRow>, DatabaseError> {
    let mut stmt =
        conn.prepare("SELECT * FROM action WHERE document_id = ?1 ORDER BY id ASC")?;
    let rows: Vec<ActionRow> = stmt
        .query_map(params![document_id], ActionRow::from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}
