pub mod classify;
pub mod collab;
pub mod config;
pub mod db;
pub mod error;
pub mod inbox;
pub mod parse;
pub mod pdf;
pub mod pipeline;
pub mod tokenize;

pub use classify::{Classifier, LineType, RuleTable};
pub use collab::{ExtractOptions, Granularity};
pub use config::{load_config, Config};
pub use db::Database;
pub use error::{ConfigError, DocmillError, Result};
pub use pipeline::{Collaborators, RunSummary, Runner, Step, StepError};
