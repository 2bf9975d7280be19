//! Step statistics repository — daily aggregates per pipeline step.

use rusqlite::{params, Connection};
use serde::Serialize;

use super::error::DatabaseError;

/// Records one processed document into the daily statistics.
///
/// Uses UPSERT to increment counters for the matching `(date, step)`
/// combination.
pub fn record_step(
    conn: &Connection,
    date: &str,
    step: &str,
    succeeded: bool,
    duration_ms: i64,
) -> Result<(), DatabaseError> {
    let success_val: i64 = if succeeded { 1 } else { 0 };
    let failure_val: i64 = if succeeded { 0 } else { 1 };

    // Running-average formula: In SQLite's ON CONFLICT DO UPDATE, column
    // references on the right side resolve to the *pre-update* (old) values.
    // With old count N and old avg A, the correct update is:
    //   new_avg = (A * N + new_value) / (N + 1)
    conn.execute(
        "INSERT INTO step_stats (date, step, total_processed, total_succeeded,
         total_failed, avg_duration_ms)
         VALUES (?1, ?2, 1, ?3, ?4, ?5)
         ON CONFLICT(date, step) DO UPDATE SET
           total_processed = total_processed + 1,
           total_succeeded = total_succeeded + ?3,
           total_failed = total_failed + ?4,
           avg_duration_ms = (avg_duration_ms * total_processed + ?5) / (total_processed + 1)",
        params![date, step, success_val, failure_val, duration_ms],
    )?;
    Ok(())
}

/// A single statistics row.
#[derive(Debug, Clone, Serialize)]
pub struct StepStatRow {
    pub date: String,
    pub step: String,
    pub total_processed: i64,
    pub total_succeeded: i64,
    pub total_failed: i64,
    pub avg_duration_ms: i64,
}

/// Queries statistics rows, newest date first, optionally for one step.
pub fn query(conn: &Connection, step: Option<&str>) -> Result<Vec<StepStatRow>, DatabaseError> {
    let (sql, params_vec): (&str, Vec<Box<dyn rusqlite::types::ToSql>>) = match step {
        Some(s) => (
            "SELECT date, step, total_processed, total_succeeded, total_failed, avg_duration_ms
             FROM step_stats WHERE step = ?1 ORDER BY date DESC, step ASC",
            vec![Box::new(s.to_string())],
        ),
        None => (
            "SELECT date, step, total_processed, total_succeeded, total_failed, avg_duration_ms
             FROM step_stats ORDER BY date DESC, step ASC",
            vec![],
        ),
    };

    let params_ref: Vec<&dyn rusqlite::types::ToSql> =
        params_vec.iter().map(|p| p.as_ref()).collect();
    let mut stmt = conn.prepare(sql)?;
    let rows: Vec<StepStatRow> = stmt
        .query_map(params_ref.as_slice(), |row| {
            Ok(StepStatRow {
                date: row.get(0)?,
                step: row.get(1)?,
                total_processed: row.get(2)?,
                total_succeeded: row.get(3)?,
                total_failed: row.get(4)?,
                avg_duration_ms: row.get(5)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;

    fn test_db() -> Database {
        Database::open_in_memory().expect("Failed to create test database")
    }

    #[test]
    fn test_record_and_query() {
        let db = test_db();

        db.with_conn(|conn| {
            record_step(conn, "2026-01-01", "parser", true, 1500)?;
            record_step(conn, "2026-01-01", "parser", true, 2000)?;
            record_step(conn, "2026-01-01", "parser", false, 500)?;
            Ok(())
        })
        .unwrap();

        let rows = db.with_conn(|conn| query(conn, Some("parser"))).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].total_processed, 3);
        assert_eq!(rows[0].total_succeeded, 2);
        assert_eq!(rows[0].total_failed, 1);
    }

    #[test]
    fn test_running_average_correctness() {
        let db = test_db();

        // Record 100ms then 200ms — average should be 150.
        db.with_conn(|conn| {
            record_step(conn, "2026-02-01", "tesseract", true, 100)?;
            record_step(conn, "2026-02-01", "tesseract", true, 200)?;
            Ok(())
        })
        .unwrap();

        let rows = db.with_conn(|conn| query(conn, Some("tesseract"))).unwrap();
        assert_eq!(rows[0].total_processed, 2);
        assert_eq!(rows[0].avg_duration_ms, 150);

        // A third value of 300ms — average should be (100+200+300)/3 = 200.
        db.with_conn(|conn| record_step(conn, "2026-02-01", "tesseract", true, 300))
            .unwrap();

        let rows = db.with_conn(|conn| query(conn, Some("tesseract"))).unwrap();
        assert_eq!(rows[0].total_processed, 3);
        assert_eq!(rows[0].avg_duration_ms, 200);
    }

    #[test]
    fn test_steps_bucketed_separately() {
        let db = test_db();

        db.with_conn(|conn| {
            record_step(conn, "2026-01-01", "pandoc", true, 100)?;
            record_step(conn, "2026-01-01", "pdflib", true, 200)?;
            Ok(())
        })
        .unwrap();

        let rows = db.with_conn(|conn| query(conn, None)).unwrap();
        assert_eq!(rows.len(), 2);
    }
}
