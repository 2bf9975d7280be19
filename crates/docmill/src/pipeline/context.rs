//! Per-document processing context.

use std::time::Instant;

use crate::db::document_repo::DocumentRow;
use crate::pipeline::Step;

/// Everything a step handler needs to process one document. Built after
/// the document has been claimed and its action row opened, so a crash
/// mid-step leaves an audit trail in the database.
pub struct StepContext {
    /// Run this document is processed under.
    pub run_id: i64,
    /// Step being executed.
    pub step: Step,
    /// Claimed document row, as selected (status was `ready`).
    pub document: DocumentRow,
    /// Open action row; finalized exactly once, ok or error.
    pub action_id: i64,
    /// Start of processing, for the step duration statistic.
    pub started: Instant,
}

impl StepContext {
    pub fn new(run_id: i64, step: Step, document: DocumentRow, action_id: i64) -> Self {
        Self {
            run_id,
            step,
            document,
            action_id,
            started: Instant::now(),
        }
    }
}
