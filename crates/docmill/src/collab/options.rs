use serde::{Deserialize, Serialize};

/// Extraction granularity requested from the text extractor.
///
/// `Line` is the only mode that yields full layout geometry; `Page` and
/// `Word` run a lighter pass that carries text but no line structure.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Granularity {
    Word,
    #[default]
    Line,
    Page,
}

impl Granularity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Word => "word",
            Self::Line => "line",
            Self::Page => "page",
        }
    }
}

impl std::fmt::Display for Granularity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structured extraction settings. These are translated into the extractor's
/// native option strings only at the process boundary, so everything above
/// the collaborator layer works with typed fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractOptions {
    #[serde(default)]
    pub granularity: Granularity,
    #[serde(default)]
    pub include_annotations: bool,
    #[serde(default = "default_line_separator")]
    pub line_separator: char,
}

fn default_line_separator() -> char {
    '\n'
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            granularity: Granularity::Line,
            include_annotations: false,
            line_separator: '\n',
        }
    }
}

impl ExtractOptions {
    /// Document-level option string passed to the extractor binary.
    pub fn document_options(&self) -> String {
        format!("tetml={{granularity={}}}", self.granularity)
    }

    /// Page-level option string passed to the extractor binary.
    pub fn page_options(&self) -> String {
        let mut opts = format!(
            "contentanalysis={{lineseparator=U+{:04X}}}",
            self.line_separator as u32
        );
        if self.include_annotations {
            opts.push_str(" includeannotations");
        }
        opts
    }
}
