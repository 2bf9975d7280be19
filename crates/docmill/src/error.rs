use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DocmillError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Database error: {0}")]
    Database(#[from] crate::db::DatabaseError),

    #[error("Collaborator check failed: {0}")]
    Collaborator(#[from] crate::collab::CollabError),

    #[error("Classification rules error: {0}")]
    Rules(#[from] crate::classify::RuleError),

    #[error("Required directory does not exist: {0}")]
    MissingDirectory(PathBuf),

    #[error("Failed to create directory '{path}': {source}")]
    CreateDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config JSON: {0}")]
    ParseJson(#[from] serde_json::Error),

    #[error("Config validation failed: {message}")]
    Validation { message: String },

    #[error("Schema validation failed: {errors}")]
    SchemaValidation { errors: String },

    #[error("Unknown pipeline step '{0}'")]
    UnknownStep(String),
}

pub type Result<T> = std::result::Result<T, DocmillError>;
