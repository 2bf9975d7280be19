//! Step codes and pipeline ordering.

use std::str::FromStr;

use crate::error::ConfigError;

/// Processing steps in pipeline order. `Done` is the terminal marker and
/// is never selected for processing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Step {
    Inbox,
    Pandoc,
    Pdf2Image,
    Tesseract,
    Reunite,
    Pdflib,
    Parser,
    Tokenize,
    Done,
}

/// Every selectable step, in execution order.
pub const PIPELINE: [Step; 8] = [
    Step::Inbox,
    Step::Pandoc,
    Step::Pdf2Image,
    Step::Tesseract,
    Step::Reunite,
    Step::Pdflib,
    Step::Parser,
    Step::Tokenize,
];

impl Step {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Inbox => "inbox",
            Self::Pandoc => "pandoc",
            Self::Pdf2Image => "pdf2image",
            Self::Tesseract => "tesseract",
            Self::Reunite => "reunite",
            Self::Pdflib => "pdflib",
            Self::Parser => "parser",
            Self::Tokenize => "tokenize",
            Self::Done => "done",
        }
    }

    /// Error code recorded on a failed action, unless the failure is a
    /// duplicate output or plain IO (those carry their own codes).
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Pandoc => "CONVERT_FAILED",
            Self::Pdf2Image => "RASTERIZE_FAILED",
            Self::Tesseract => "OCR_FAILED",
            Self::Reunite => "MERGE_FAILED",
            Self::Pdflib => "EXTRACT_FAILED",
            Self::Parser => "PARSE_FAILED",
            Self::Tokenize => "TOKENIZE_FAILED",
            Self::Inbox | Self::Done => "IO_ERROR",
        }
    }
}

impl std::fmt::Display for Step {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Step {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "inbox" => Ok(Self::Inbox),
            "pandoc" => Ok(Self::Pandoc),
            "pdf2image" => Ok(Self::Pdf2Image),
            "tesseract" => Ok(Self::Tesseract),
            "reunite" => Ok(Self::Reunite),
            "pdflib" => Ok(Self::Pdflib),
            "parser" => Ok(Self::Parser),
            "tokenize" => Ok(Self::Tokenize),
            // "done" is a terminal marker, not a runnable step.
            _ => Err(ConfigError::UnknownStep(s.to_string())),
        }
    }
}

/// Parses a CLI step selection. Empty or "all" selects the whole
/// pipeline; explicit steps are deduplicated and reordered to pipeline
/// order, so execution never depends on argument order.
pub fn parse_selection(args: &[String]) -> Result<Vec<Step>, ConfigError> {
    if args.is_empty() || (args.len() == 1 && args[0].eq_ignore_ascii_case("all")) {
        return Ok(PIPELINE.to_vec());
    }

    let mut requested = Vec::new();
    for arg in args {
        let step: Step = arg.parse()?;
        if !requested.contains(&step) {
            requested.push(step);
        }
    }
    Ok(PIPELINE
        .iter()
        .copied()
        .filter(|step| requested.contains(step))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_step_codes_round_trip() {
        for step in PIPELINE {
            let parsed: Step = step.as_str().parse().expect("Failed to parse step code");
            assert_eq!(parsed, step);
        }
    }

    #[test]
    fn test_done_is_not_selectable() {
        let result: Result<Step, _> = "done".parse();
        assert!(matches!(result, Err(ConfigError::UnknownStep(_))));
    }

    #[test]
    fn test_unknown_step_is_rejected() {
        let result: Result<Step, _> = "shred".parse();
        assert!(matches!(result, Err(ConfigError::UnknownStep(_))));
    }

    #[test]
    fn test_selection_defaults_to_full_pipeline() {
        assert_eq!(parse_selection(&[]).unwrap(), PIPELINE.to_vec());
        assert_eq!(
            parse_selection(&["all".to_string()]).unwrap(),
            PIPELINE.to_vec()
        );
    }

    #[test]
    fn test_selection_reorders_and_deduplicates() {
        let args = vec![
            "tokenize".to_string(),
            "inbox".to_string(),
            "tokenize".to_string(),
            "pdflib".to_string(),
        ];
        let steps = parse_selection(&args).unwrap();
        assert_eq!(steps, vec![Step::Inbox, Step::Pdflib, Step::Tokenize]);
    }
}
