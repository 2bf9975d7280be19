//! Structural parsing of the extractor's XML output into a
//! page / paragraph / line hierarchy.

use thiserror::Error;

use crate::classify::LineType;

pub mod tetml;

pub use tetml::{parse_layout, parse_page_texts};

#[derive(Error, Debug)]
pub enum ParseError {
    #[error("Malformed extraction XML: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("Unexpected extraction XML structure: {0}")]
    Structure(String),

    #[error("Extraction XML contains no pages")]
    NoPages,
}

/// One page of extracted layout, paragraphs in reading order.
#[derive(Debug, Clone)]
pub struct Page {
    pub number: u32,
    pub width: f64,
    pub height: f64,
    pub paragraphs: Vec<Paragraph>,
}

impl Page {
    /// Page text: lines joined with newlines, a blank line between
    /// paragraphs.
    pub fn text(&self) -> String {
        self.paragraphs
            .iter()
            .map(|p| {
                p.lines
                    .iter()
                    .map(|l| l.text.as_str())
                    .collect::<Vec<_>>()
                    .join("\n")
            })
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    /// Every line on the page in reading order.
    pub fn lines(&self) -> impl Iterator<Item = &Line> {
        self.paragraphs.iter().flat_map(|p| p.lines.iter())
    }

    pub fn lines_mut(&mut self) -> impl Iterator<Item = &mut Line> {
        self.paragraphs.iter_mut().flat_map(|p| p.lines.iter_mut())
    }
}

#[derive(Debug, Clone, Default)]
pub struct Paragraph {
    pub lines: Vec<Line>,
}

/// One extracted line with geometry and font annotations.
///
/// Table coordinates are 1-based; zero in all three fields means the
/// line sits outside any table.
#[derive(Debug, Clone)]
pub struct Line {
    pub text: String,
    pub llx: f64,
    pub lly: f64,
    pub urx: f64,
    pub ury: f64,
    pub font_size: f64,
    pub bold: bool,
    pub table_row: u32,
    pub table_col: u32,
    pub col_span: u32,
    pub kind: LineType,
    pub word_count: u32,
}

impl Line {
    pub fn new(text: impl Into<String>) -> Self {
        let text = text.into();
        let word_count = text.split_whitespace().count() as u32;
        Self {
            text,
            llx: 0.0,
            lly: 0.0,
            urx: 0.0,
            ury: 0.0,
            font_size: 0.0,
            bold: false,
            table_row: 0,
            table_col: 0,
            col_span: 0,
            kind: LineType::Body,
            word_count,
        }
    }
}
