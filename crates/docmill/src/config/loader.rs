use std::path::{Path, PathBuf};

use crate::config::schema::Config;
use crate::error::ConfigError;

const SCHEMA_JSON: &str = include_str!("../../../../schema/config-v1.json");

pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
        path: path.to_path_buf(),
        source: e,
    })?;

    load_config_from_str(&content)
}

pub fn load_config_from_str(content: &str) -> Result<Config, ConfigError> {
    let json_value: serde_json::Value = serde_json::from_str(content)?;

    validate_schema(&json_value)?;

    let config: Config = serde_json::from_value(json_value)?;

    validate_config(&config)?;

    Ok(config)
}

/// Returns the canonical config path: `~/.docmill/config.json`.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|h| h.join(".docmill").join("config.json"))
}

/// Loads the config from the canonical path when that file exists,
/// otherwise falls back to defaults rooted at `~/.docmill`.
pub fn load_or_default() -> Result<Config, ConfigError> {
    if let Some(path) = default_config_path() {
        if path.is_file() {
            return load_config(&path);
        }
    }

    let home = dirs::home_dir().ok_or_else(|| ConfigError::Validation {
        message: "cannot determine home directory for default configuration".to_string(),
    })?;
    let base = home.join(".docmill");
    Ok(Config::with_directories(
        &base.join("inbox").display().to_string(),
        &base.join("work").display().to_string(),
    ))
}

fn validate_schema(json_value: &serde_json::Value) -> Result<(), ConfigError> {
    let schema: serde_json::Value =
        serde_json::from_str(SCHEMA_JSON).map_err(|e| ConfigError::Validation {
            message: format!("Invalid embedded schema JSON: {}", e),
        })?;

    let validator = jsonschema::validator_for(&schema).map_err(|e| ConfigError::Validation {
        message: format!("Failed to compile JSON schema: {}", e),
    })?;

    let error_messages: Vec<String> = validator
        .iter_errors(json_value)
        .map(|e| format!("{} at {}", e, e.instance_path()))
        .collect();
    if !error_messages.is_empty() {
        return Err(ConfigError::SchemaValidation {
            errors: error_messages.join("; "),
        });
    }

    Ok(())
}

fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.version != "1.0" {
        return Err(ConfigError::Validation {
            message: format!("Unsupported config version: {}", config.version),
        });
    }

    if config.inbox_directory == config.work_directory {
        return Err(ConfigError::Validation {
            message: "inbox_directory and work_directory must differ".to_string(),
        });
    }

    let c = &config.classify;
    if !(0.0..=1.0).contains(&c.band_page_fraction) || c.band_page_fraction == 0.0 {
        return Err(ConfigError::Validation {
            message: format!(
                "classify.band_page_fraction must be in (0, 1], got {}",
                c.band_page_fraction
            ),
        });
    }
    if !(0.0..=1.0).contains(&c.toc_line_fraction) || c.toc_line_fraction == 0.0 {
        return Err(ConfigError::Validation {
            message: format!(
                "classify.toc_line_fraction must be in (0, 1], got {}",
                c.toc_line_fraction
            ),
        });
    }
    if c.band_tolerance <= 0.0 {
        return Err(ConfigError::Validation {
            message: format!("classify.band_tolerance must be positive, got {}", c.band_tolerance),
        });
    }
    if c.heading_max_len_ratio <= 0.0 {
        return Err(ConfigError::Validation {
            message: format!(
                "classify.heading_max_len_ratio must be positive, got {}",
                c.heading_max_len_ratio
            ),
        });
    }

    if config.tokenize.pipeline.trim().is_empty() {
        return Err(ConfigError::Validation {
            message: "tokenize.pipeline must not be empty".to_string(),
        });
    }

    Ok(())
}
