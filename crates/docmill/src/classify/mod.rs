//! Line classification: every extracted line gets exactly one type,
//! decided in a fixed precedence order with the first match winning.

use serde::{Deserialize, Serialize};

use crate::config::ClassifyConfig;
use crate::db::document_repo::DocumentCounts;
use crate::parse::{Line, Page};

pub mod profile;
pub mod rules;

pub use profile::{DocumentProfile, PageStats};
pub use rules::{CompiledRules, NumberingRule, RuleError, RuleTable};

/// The structural role of one line. Variants are declared in precedence
/// order; classification walks them top to bottom and keeps the first
/// match, so a page-number line inside the footer band stays
/// `HeaderFooter` even when it also looks numbered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LineType {
    HeaderFooter,
    Toc,
    Table,
    ListBullet,
    ListNumber,
    Heading,
    #[default]
    Body,
}

impl LineType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::HeaderFooter => "header_footer",
            Self::Toc => "toc",
            Self::Table => "table",
            Self::ListBullet => "list_bullet",
            Self::ListNumber => "list_number",
            Self::Heading => "heading",
            Self::Body => "body",
        }
    }
}

impl std::fmt::Display for LineType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classifies lines against a learned document profile.
pub struct Classifier {
    rules: CompiledRules,
    config: ClassifyConfig,
}

impl Classifier {
    pub fn new(table: &RuleTable, config: ClassifyConfig) -> Result<Self, RuleError> {
        Ok(Self {
            rules: table.compile()?,
            config,
        })
    }

    /// Learns the document profile, stamps a type on every line and
    /// returns the accumulated per-document counters.
    pub fn annotate(&self, pages: &mut [Page]) -> DocumentCounts {
        let profile = DocumentProfile::learn(pages, &self.rules, &self.config);

        let mut counts = DocumentCounts {
            pages: pages.len() as i64,
            ..Default::default()
        };

        for page in pages.iter_mut() {
            let number = page.number;
            for line in page.lines_mut() {
                let kind = self.classify(line, number, &profile);
                line.kind = kind;
                match kind {
                    LineType::HeaderFooter => {
                        if profile.in_header_band(line.ury) {
                            counts.lines_header += 1;
                        } else {
                            counts.lines_footer += 1;
                        }
                    }
                    LineType::Toc => counts.lines_toc += 1,
                    LineType::Table => counts.tables += 1,
                    LineType::ListBullet | LineType::ListNumber => counts.lists += 1,
                    LineType::Heading | LineType::Body => {}
                }
            }
        }

        counts
    }

    pub fn classify(&self, line: &Line, page_no: u32, profile: &DocumentProfile) -> LineType {
        if profile.in_header_band(line.ury) || profile.in_footer_band(line.lly) {
            return LineType::HeaderFooter;
        }
        if profile.is_toc_page(page_no) || self.rules.matches_toc_leader(&line.text) {
            return LineType::Toc;
        }
        if line.col_span > 0 {
            return LineType::Table;
        }
        if self.rules.matches_bullet(&line.text) {
            return LineType::ListBullet;
        }
        if self.rules.matching_numbering(&line.text).is_some() {
            return LineType::ListNumber;
        }
        if self.is_heading(line, profile.page_stats(page_no)) {
            return LineType::Heading;
        }
        LineType::Body
    }

    fn is_heading(&self, line: &Line, stats: &PageStats) -> bool {
        if stats.body_lines == 0 {
            return false;
        }
        let trimmed = line.text.trim();
        if trimmed.is_empty() {
            return false;
        }
        let size_jump = line.font_size - stats.dominant_size >= self.config.heading_size_delta;
        let bold_jump = line.bold && !stats.dominant_bold;
        let short = (trimmed.chars().count() as f64)
            <= stats.avg_line_len * self.config.heading_max_len_ratio;
        (size_jump || bold_jump) && short
    }
}
