//! Step orchestration: selection, claiming, dispatch and bookkeeping.

pub mod collaborators;
pub mod context;
pub mod error;
pub mod runner;
pub mod step;

pub use collaborators::Collaborators;
pub use context::StepContext;
pub use error::StepError;
pub use runner::{RunSummary, Runner};
pub use step::{parse_selection, Step, PIPELINE};
