//! Step-level errors.

use std::path::PathBuf;

use thiserror::Error;

use crate::collab::CollabError;
use crate::db::DatabaseError;
use crate::parse::ParseError;
use crate::pdf::PdfError;
use crate::pipeline::Step;
use crate::tokenize::TokenizeError;

/// Error raised while processing a single document. Recorded on the
/// document's action and the document set to `error`; the batch moves
/// on. Two exceptions escalate to run-fatal instead: database errors
/// (the recording channel itself is broken) and missing collaborator
/// binaries (every later document would fail the same way).
#[derive(Error, Debug)]
pub enum StepError {
    #[error("Collaborator failed: {0}")]
    Collaborator(#[from] CollabError),

    #[error("PDF handling failed: {0}")]
    Pdf(#[from] PdfError),

    #[error("Layout parsing failed: {0}")]
    Parse(#[from] ParseError),

    #[error("Tokenization failed: {0}")]
    Tokenize(#[from] TokenizeError),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("Output '{0}' already exists")]
    Duplicate(String),

    #[error("IO error on '{path}': {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

impl StepError {
    /// Error code recorded on the failed action.
    pub fn code(&self, step: Step) -> &'static str {
        match self {
            Self::Duplicate(_) => "FILE_DUPLICATE",
            Self::Io { .. } => "IO_ERROR",
            _ => step.error_code(),
        }
    }
}
