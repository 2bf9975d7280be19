//! List and TOC detection rules, loadable from and exportable to JSON so
//! deployments can tune them without a rebuild.

use std::path::{Path, PathBuf};

use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RuleError {
    #[error("Failed to read rules file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to write rules file '{path}': {source}")]
    WriteFile {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid rules JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid pattern in rule '{id}': {source}")]
    InvalidPattern { id: String, source: regex::Error },
}

/// One numbering style, e.g. `1.` or `(3)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NumberingRule {
    pub id: String,
    pub pattern: String,
}

/// Serializable rule set: bullet glyphs, numbering patterns and the
/// trailing dot-leader pattern marking TOC entries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleTable {
    pub bullets: Vec<String>,
    pub numbering: Vec<NumberingRule>,
    pub toc_leader: String,
}

impl Default for RuleTable {
    fn default() -> Self {
        Self::builtin()
    }
}

impl RuleTable {
    /// The built-in rule set used when no rules file is configured.
    pub fn builtin() -> Self {
        Self {
            bullets: ["•", "◦", "▪", "‣", "·", "-", "–", "*"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            numbering: vec![
                NumberingRule {
                    id: "decimal".to_string(),
                    pattern: r"^\d{1,3}[.)](\s|$)".to_string(),
                },
                NumberingRule {
                    id: "alpha".to_string(),
                    pattern: r"^[a-zA-Z][.)](\s|$)".to_string(),
                },
                NumberingRule {
                    id: "roman".to_string(),
                    pattern: r"(?i)^[ivxlcdm]{1,6}[.)](\s|$)".to_string(),
                },
                NumberingRule {
                    id: "parenthesized".to_string(),
                    pattern: r"^\(\d{1,3}\)(\s|$)".to_string(),
                },
            ],
            toc_leader: r"\.{2,}\s*\d{1,4}$".to_string(),
        }
    }

    pub fn load(path: &Path) -> Result<Self, RuleError> {
        let raw = std::fs::read_to_string(path).map_err(|e| RuleError::ReadFile {
            path: path.to_path_buf(),
            source: e,
        })?;
        Ok(serde_json::from_str(&raw)?)
    }

    pub fn export(&self, path: &Path) -> Result<(), RuleError> {
        let raw = serde_json::to_string_pretty(self)?;
        std::fs::write(path, raw).map_err(|e| RuleError::WriteFile {
            path: path.to_path_buf(),
            source: e,
        })
    }

    /// Compiles the patterns once; classification reuses the compiled set
    /// for every line.
    pub fn compile(&self) -> Result<CompiledRules, RuleError> {
        let numbering = self
            .numbering
            .iter()
            .map(|rule| {
                Regex::new(&rule.pattern)
                    .map(|re| (rule.id.clone(), re))
                    .map_err(|e| RuleError::InvalidPattern {
                        id: rule.id.clone(),
                        source: e,
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;
        let toc_leader =
            Regex::new(&self.toc_leader).map_err(|e| RuleError::InvalidPattern {
                id: "toc_leader".to_string(),
                source: e,
            })?;
        Ok(CompiledRules {
            bullets: self.bullets.clone(),
            numbering,
            toc_leader,
        })
    }
}

#[derive(Debug, Clone)]
pub struct CompiledRules {
    bullets: Vec<String>,
    numbering: Vec<(String, Regex)>,
    toc_leader: Regex,
}

impl CompiledRules {
    /// A bullet only counts when the glyph stands alone, so "-5 degrees"
    /// is not a list item.
    pub fn matches_bullet(&self, text: &str) -> bool {
        let trimmed = text.trim_start();
        self.bullets.iter().any(|bullet| {
            trimmed
                .strip_prefix(bullet.as_str())
                .map(|rest| rest.is_empty() || rest.starts_with(char::is_whitespace))
                .unwrap_or(false)
        })
    }

    pub fn matching_numbering(&self, text: &str) -> Option<&str> {
        let trimmed = text.trim_start();
        self.numbering
            .iter()
            .find(|(_, re)| re.is_match(trimmed))
            .map(|(id, _)| id.as_str())
    }

    pub fn matches_toc_leader(&self, text: &str) -> bool {
        self.toc_leader.is_match(text.trim_end())
    }
}
