//! Tokenization bridge: turns page text into sentence records ready for
//! downstream NLP consumers.
//!
//! Pipelines are named `family-language` (e.g. `basic-eng`). One
//! instance stays cached; switching names reloads, so batching documents
//! by language keeps reloads rare.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::classify::LineType;

pub mod basic;

pub use basic::BasicPipeline;

#[derive(Error, Debug)]
pub enum TokenizeError {
    #[error("Unknown token pipeline '{0}'")]
    UnknownPipeline(String),

    #[error("Token serialization failed: {0}")]
    Json(#[from] serde_json::Error),
}

/// One token with spaCy-style annotations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Token {
    pub text: String,
    /// 1-based position within the sentence.
    pub index: u32,
    pub lemma: String,
    pub pos: String,
    pub dep: String,
    pub shape: String,
    pub is_alpha: bool,
    pub is_punct: bool,
    pub like_num: bool,
    pub is_stop: bool,
}

/// One sentence with its position in the page. Table coordinates and
/// line type default to "no table, body text" so records written before
/// those fields existed still load.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SentenceRecord {
    pub paragraph_no: u32,
    pub sentence_no: u32,
    #[serde(default)]
    pub col: u32,
    #[serde(default)]
    pub row: u32,
    #[serde(default)]
    pub span: u32,
    #[serde(default)]
    pub line_type: LineType,
    pub tokens: Vec<Token>,
}

/// A loaded token pipeline. Tokenization itself never fails; input that
/// cannot be analyzed simply yields fewer annotations.
pub trait TokenPipeline {
    fn name(&self) -> &str;

    /// Sentences of tokens, in input order.
    fn tokenize(&self, text: &str) -> Vec<Vec<Token>>;
}

/// Holds the single cached pipeline instance.
#[derive(Default)]
pub struct Tokenizer {
    current: Option<Box<dyn TokenPipeline>>,
}

impl Tokenizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Tokenizes one page of text into sentence records. Paragraphs are
    /// separated by blank lines; paragraph and sentence numbers are
    /// 1-based.
    pub fn tokenize_page(
        &mut self,
        text: &str,
        pipeline_name: &str,
    ) -> Result<Vec<SentenceRecord>, TokenizeError> {
        let pipeline = self.pipeline(pipeline_name)?;

        let mut records = Vec::new();
        let mut paragraph_no = 0u32;
        for paragraph in text.split("\n\n") {
            let trimmed = paragraph.trim();
            if trimmed.is_empty() {
                continue;
            }
            paragraph_no += 1;
            for (i, tokens) in pipeline.tokenize(trimmed).into_iter().enumerate() {
                records.push(SentenceRecord {
                    paragraph_no,
                    sentence_no: i as u32 + 1,
                    col: 0,
                    row: 0,
                    span: 0,
                    line_type: LineType::Body,
                    tokens,
                });
            }
        }
        Ok(records)
    }

    pub fn current_pipeline(&self) -> Option<&str> {
        self.current.as_deref().map(|p| p.name())
    }

    /// Returns the cached pipeline, reloading when the name changed.
    /// Reloads are logged because they are the expensive path.
    fn pipeline(&mut self, name: &str) -> Result<&dyn TokenPipeline, TokenizeError> {
        let cached = matches!(self.current.as_deref(), Some(p) if p.name() == name);
        if !cached {
            log::info!("Loading token pipeline '{}'", name);
            self.current = Some(load_pipeline(name)?);
        }
        match self.current.as_deref() {
            Some(pipeline) => Ok(pipeline),
            None => Err(TokenizeError::UnknownPipeline(name.to_string())),
        }
    }
}

/// Instantiates a pipeline from its `family-language` name.
pub fn load_pipeline(name: &str) -> Result<Box<dyn TokenPipeline>, TokenizeError> {
    match name.split('-').next() {
        Some("basic") => Ok(Box::new(BasicPipeline::new(name))),
        _ => Err(TokenizeError::UnknownPipeline(name.to_string())),
    }
}

pub fn to_json(records: &[SentenceRecord]) -> Result<String, TokenizeError> {
    Ok(serde_json::to_string(records)?)
}

pub fn from_json(raw: &str) -> Result<Vec<SentenceRecord>, TokenizeError> {
    Ok(serde_json::from_str(raw)?)
}
