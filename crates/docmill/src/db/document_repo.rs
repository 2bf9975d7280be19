//! Document repository — lineage tree operations on the `document` table.
//!
//! Every document row belongs to a lineage: `base_id` points at the root
//! the file was originally ingested as, `parent_id` at the document it was
//! derived from. Root documents point at themselves on both columns.
//!
//! All functions take a `&Connection` so the runner can compose several
//! mutations into one transaction via [`Database::with_tx`](super::Database::with_tx).
//! Root creation *requires* an enclosing transaction: the self-referencing
//! foreign keys are deferred and only satisfied once the row has been
//! updated to point at its own id.

use rusqlite::{params, Connection, Row};

use super::error::DatabaseError;

/// Placeholder id used between insert and self-update of a root document.
const UNRESOLVED: i64 = 0;

/// A raw document row from the database.
#[derive(Debug, Clone)]
pub struct DocumentRow {
    pub id: i64,
    pub base_id: i64,
    pub parent_id: i64,
    pub step: String,
    pub status: String,
    pub directory: String,
    pub file_name: String,
    pub language: String,
    pub no_pages: i64,
    pub no_lines_header: i64,
    pub no_lines_footer: i64,
    pub no_lines_toc: i64,
    pub no_lists: i64,
    pub no_tables: i64,
    pub created_at: String,
    pub updated_at: String,
}

impl DocumentRow {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            base_id: row.get("base_id")?,
            parent_id: row.get("parent_id")?,
            step: row.get("step")?,
            status: row.get("status")?,
            directory: row.get("directory")?,
            file_name: row.get("file_name")?,
            language: row.get("language")?,
            no_pages: row.get("no_pages")?,
            no_lines_header: row.get("no_lines_header")?,
            no_lines_footer: row.get("no_lines_footer")?,
            no_lines_toc: row.get("no_lines_toc")?,
            no_lists: row.get("no_lists")?,
            no_tables: row.get("no_tables")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
        })
    }

    /// Whether this row is the root of its lineage.
    pub fn is_root(&self) -> bool {
        self.base_id == self.id && self.parent_id == self.id
    }
}

/// Fields for a derived (non-root) document.
#[derive(Debug, Clone)]
pub struct NewDocument {
    pub parent_id: i64,
    pub base_id: i64,
    pub step: String,
    pub status: String,
    pub directory: String,
    pub file_name: String,
    pub language: String,
}

/// Per-document line statistics written by the structural parser.
#[derive(Debug, Clone, Copy, Default)]
pub struct DocumentCounts {
    pub pages: i64,
    pub lines_header: i64,
    pub lines_footer: i64,
    pub lines_toc: i64,
    pub lists: i64,
    pub tables: i64,
}

impl DocumentCounts {
    /// True if the classifier matched at least one line. The page count
    /// does not participate, a page total alone classifies nothing.
    pub fn any_classified(&self) -> bool {
        self.lines_header != 0
            || self.lines_footer != 0
            || self.lines_toc != 0
            || self.lists != 0
            || self.tables != 0
    }
}

/// Creates a root document pointing at itself. Must run inside a
/// transaction (deferred foreign keys are satisfied by the self-update
/// before commit). Returns the new id.
pub fn create_root(
    conn: &Connection,
    step: &str,
    status: &str,
    directory: &str,
    file_name: &str,
    language: &str,
) -> Result<i64, DatabaseError> {
    let now = super::now();
    conn.execute(
        "INSERT INTO document (base_id, parent_id, step, status, directory, file_name,
         language, created_at, updated_at)
         VALUES (?1, ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)",
        params![UNRESOLVED, step, status, directory, file_name, language, now],
    )?;
    let id = conn.last_insert_rowid();
    conn.execute(
        "UPDATE document SET base_id = ?1, parent_id = ?1 WHERE id = ?1",
        params![id],
    )?;
    Ok(id)
}

/// Creates a document derived from an existing one. The parent must exist
/// and must belong to the lineage named by `base_id`.
pub fn create_child(conn: &Connection, doc: &NewDocument) -> Result<i64, DatabaseError> {
    let parent = find_by_id(conn, doc.parent_id)?.ok_or_else(|| DatabaseError::Lineage {
        reason: format!("parent document {} does not exist", doc.parent_id),
    })?;
    if parent.base_id != doc.base_id {
        return Err(DatabaseError::Lineage {
            reason: format!(
                "parent {} belongs to lineage {}, not {}",
                parent.id, parent.base_id, doc.base_id
            ),
        });
    }

    let now = super::now();
    conn.execute(
        "INSERT INTO document (base_id, parent_id, step, status, directory, file_name,
         language, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?8)",
        params![
            doc.base_id,
            doc.parent_id,
            doc.step,
            doc.status,
            doc.directory,
            doc.file_name,
            doc.language,
            now,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Finds a document by its id.
pub fn find_by_id(conn: &Connection, id: i64) -> Result<Option<DocumentRow>, DatabaseError> {
    let mut stmt = conn.prepare("SELECT * FROM document WHERE id = ?1")?;
    let mut rows = stmt.query_map(params![id], DocumentRow::from_row)?;
    match rows.next() {
        Some(Ok(row)) => Ok(Some(row)),
        Some(Err(e)) => Err(DatabaseError::Sqlite(e)),
        None => Ok(None),
    }
}

/// Selects the documents waiting at the given step, oldest first.
/// Insertion order makes reprocessing after a restart deterministic.
pub fn select_eligible(conn: &Connection, step: &str) -> Result<Vec<DocumentRow>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT * FROM document WHERE step = ?1 AND status = 'ready' ORDER BY id ASC",
    )?;
    let rows: Vec<DocumentRow> = stmt
        .query_map(params![step], DocumentRow::from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Updates only the status of a document.
pub fn set_status(conn: &Connection, id: i64, status: &str) -> Result<(), DatabaseError> {
    conn.execute(
        "UPDATE document SET status = ?2, updated_at = ?3 WHERE id = ?1",
        params![id, status, super::now()],
    )?;
    Ok(())
}

/// Moves a document to another step with the given status. Used by steps
/// that transform a document in place instead of deriving a new file.
pub fn advance_step(
    conn: &Connection,
    id: i64,
    step: &str,
    status: &str,
) -> Result<(), DatabaseError> {
    conn.execute(
        "UPDATE document SET step = ?2, status = ?3, updated_at = ?4 WHERE id = ?1",
        params![id, step, status, super::now()],
    )?;
    Ok(())
}

/// Writes parser line statistics onto a document (normally the lineage base).
pub fn update_counts(
    conn: &Connection,
    id: i64,
    counts: &DocumentCounts,
) -> Result<(), DatabaseError> {
    conn.execute(
        "UPDATE document SET no_pages = ?2, no_lines_header = ?3, no_lines_footer = ?4,
         no_lines_toc = ?5, no_lists = ?6, no_tables = ?7, updated_at = ?8
         WHERE id = ?1",
        params![
            id,
            counts.pages,
            counts.lines_header,
            counts.lines_footer,
            counts.lines_toc,
            counts.lists,
            counts.tables,
            super::now(),
        ],
    )?;
    Ok(())
}

/// Whether a document is already registered for this directory/file pair.
/// Keeps inbox scans idempotent across runs.
pub fn exists_at(
    conn: &Connection,
    directory: &str,
    file_name: &str,
) -> Result<bool, DatabaseError> {
    let count: u32 = conn.query_row(
        "SELECT COUNT(*) FROM document WHERE directory = ?1 AND file_name = ?2",
        params![directory, file_name],
        |r| r.get(0),
    )?;
    Ok(count > 0)
}

/// Counts documents sharing the given parent. A fan-out step checks this
/// to decide whether its output still needs merging.
pub fn count_children(conn: &Connection, parent_id: i64) -> Result<i64, DatabaseError> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM document WHERE parent_id = ?1 AND id != parent_id",
        params![parent_id],
        |r| r.get(0),
    )?;
    Ok(count)
}

/// Lineages with more than one document waiting to be merged. Single
/// leftovers are not picked up; a lone page cannot be reunited.
pub fn reunite_groups(conn: &Connection, step: &str) -> Result<Vec<i64>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT base_id FROM document WHERE step = ?1 AND status = 'ready'
         GROUP BY base_id HAVING COUNT(*) > 1 ORDER BY base_id ASC",
    )?;
    let ids: Vec<i64> = stmt
        .query_map(params![step], |r| r.get(0))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(ids)
}

/// The documents of one lineage waiting at the given step, ordered by
/// ascending id. Creation order equals page order for fanned-out pages,
/// so this is also the merge order.
pub fn pending_siblings(
    conn: &Connection,
    base_id: i64,
    step: &str,
) -> Result<Vec<DocumentRow>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT * FROM document WHERE base_id = ?1 AND step = ?2 AND status = 'ready'
         ORDER BY id ASC",
    )?;
    let rows: Vec<DocumentRow> = stmt
        .query_map(params![base_id, step], DocumentRow::from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Counts all documents currently in `ready` status across all steps.
pub fn count_ready(conn: &Connection) -> Result<i64, DatabaseError> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM document WHERE status = 'ready'",
        [],
        |r| r.get(0),
    )?;
    Ok(count)
}

/// Document counts grouped by (step, status), for status reporting.
pub fn status_counts(conn: &Connection) -> Result<Vec<(String, String, i64)>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT step, status, COUNT(*) FROM document GROUP BY step, status
         ORDER BY step, status",
    )?;
    let rows: Vec<(String, String, i64)> = stmt
        .query_map([], |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?)))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Number of edges from the document up to its lineage root. The walk is
/// bounded so a corrupted parent chain cannot loop forever.
pub fn lineage_depth(conn: &Connection, id: i64) -> Result<u32, DatabaseError> {
    const MAX_DEPTH: u32 = 64;

    let mut depth = 0;
    let mut current = id;
    loop {
        let row = find_by_id(conn, current)?.ok_or_else(|| DatabaseError::Lineage {
            reason: format!("document {} does not exist", current),
        })?;
        if row.parent_id == row.id {
            return Ok(depth);
        }
        depth += 1;
        if depth > MAX_DEPTH {
            return Err(DatabaseError::Lineage {
                reason: format!("parent chain of document {} exceeds {} levels", id, MAX_DEPTH),
            });
        }
        current = row.parent_id;
    }
}
