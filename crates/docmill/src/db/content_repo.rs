//! Content repository — extracted page text and tokenizer output.
//!
//! Page text rows are keyed by the lineage *base* document, so the text of
//! a document survives intermediate derivations. Token rows are keyed by
//! the document the TOKENIZE step actually ran on. Both use upserts: a
//! reprocessed page simply overwrites its previous content.

use rusqlite::{params, Connection};

use super::error::DatabaseError;

/// Inserts or replaces the extracted text of one page.
pub fn upsert_page_text(
    conn: &Connection,
    document_id: i64,
    page_no: u32,
    text: &str,
) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO content_tetml_page (document_id, page_no, text, created_at)
         VALUES (?1, ?2, ?3, ?4)
         ON CONFLICT(document_id, page_no) DO UPDATE SET
           text = excluded.text,
           created_at = excluded.created_at",
        params![document_id, page_no, text, super::now()],
    )?;
    Ok(())
}

/// All extracted page texts for a document, ordered by page number.
pub fn page_texts(
    conn: &Connection,
    document_id: i64,
) -> Result<Vec<(u32, String)>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT page_no, text FROM content_tetml_page WHERE document_id = ?1
         ORDER BY page_no ASC",
    )?;
    let rows: Vec<(u32, String)> = stmt
        .query_map(params![document_id], |r| Ok((r.get(0)?, r.get(1)?)))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Inserts or replaces the serialized token records of one page.
pub fn upsert_tokens(
    conn: &Connection,
    document_id: i64,
    page_no: u32,
    tokens_json: &str,
) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO content_token (document_id, page_no, tokens, created_at)
         VALUES (?1, ?2, ?3, ?4)
         ON CONFLICT(document_id, page_no) DO UPDATE SET
           tokens = excluded.tokens,
           created_at = excluded.created_at",
        params![document_id, page_no, tokens_json, super::now()],
    )?;
    Ok(())
}

/// All token payloads for a document, ordered by page number.
pub fn tokens(conn: &Connection, document_id: i64) -> Result<Vec<(u32, String)>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT page_no, tokens FROM content_token WHERE document_id = ?1
         ORDER BY page_no ASC",
    )?;
    let rows: Vec<(u32, String)> = stmt
        .query_map(params![document_id], |r| Ok((r.get(0)?, r.get(1)?)))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}
