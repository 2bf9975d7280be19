use serde::{Deserialize, Serialize};

use crate::collab::ExtractOptions;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub version: String,
    pub inbox_directory: String,
    pub work_directory: String,
    #[serde(default)]
    pub database_path: Option<String>,
    #[serde(default = "default_language")]
    pub language: String,
    #[serde(default)]
    pub rules_file: Option<String>,
    #[serde(default)]
    pub extract: ExtractOptions,
    #[serde(default)]
    pub classify: ClassifyConfig,
    #[serde(default)]
    pub tokenize: TokenizeConfig,
    #[serde(default)]
    pub collaborators: CollaboratorsConfig,
}

fn default_language() -> String {
    "eng".to_string()
}

impl Config {
    /// Minimal config for the given directories, everything else defaulted.
    pub fn with_directories(inbox: &str, work: &str) -> Self {
        Self {
            version: "1.0".to_string(),
            inbox_directory: inbox.to_string(),
            work_directory: work.to_string(),
            database_path: None,
            language: default_language(),
            rules_file: None,
            extract: ExtractOptions::default(),
            classify: ClassifyConfig::default(),
            tokenize: TokenizeConfig::default(),
            collaborators: CollaboratorsConfig::default(),
        }
    }
}

/// Thresholds driving the line classification engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifyConfig {
    /// Vertical distance (points) a line may sit from the page-extreme
    /// median and still count as part of a header or footer band.
    #[serde(default = "default_band_tolerance")]
    pub band_tolerance: f64,
    /// Fraction of pages whose extreme line must fall inside the band
    /// before the band is accepted.
    #[serde(default = "default_band_page_fraction")]
    pub band_page_fraction: f64,
    /// Bands are never derived from documents shorter than this.
    #[serde(default = "default_min_pages_for_bands")]
    pub min_pages_for_bands: u32,
    /// Fraction of a page's lines that must look like TOC entries for the
    /// whole page to be treated as a table of contents.
    #[serde(default = "default_toc_line_fraction")]
    pub toc_line_fraction: f64,
    /// A page additionally needs at least this many TOC-looking lines.
    #[serde(default = "default_toc_min_matches")]
    pub toc_min_matches: u32,
    /// Font size points above the page-dominant size that marks a heading.
    #[serde(default = "default_heading_size_delta")]
    pub heading_size_delta: f64,
    /// Headings must be shorter than this ratio of the average body line.
    #[serde(default = "default_heading_max_len_ratio")]
    pub heading_max_len_ratio: f64,
}

fn default_band_tolerance() -> f64 {
    6.0
}

fn default_band_page_fraction() -> f64 {
    0.5
}

fn default_min_pages_for_bands() -> u32 {
    2
}

fn default_toc_line_fraction() -> f64 {
    0.4
}

fn default_toc_min_matches() -> u32 {
    2
}

fn default_heading_size_delta() -> f64 {
    1.5
}

fn default_heading_max_len_ratio() -> f64 {
    0.6
}

impl Default for ClassifyConfig {
    fn default() -> Self {
        Self {
            band_tolerance: default_band_tolerance(),
            band_page_fraction: default_band_page_fraction(),
            min_pages_for_bands: default_min_pages_for_bands(),
            toc_line_fraction: default_toc_line_fraction(),
            toc_min_matches: default_toc_min_matches(),
            heading_size_delta: default_heading_size_delta(),
            heading_max_len_ratio: default_heading_max_len_ratio(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenizeConfig {
    /// Pipeline family; the effective pipeline name is suffixed with the
    /// document language, e.g. "basic" + "eng" -> "basic-eng".
    #[serde(default = "default_pipeline")]
    pub pipeline: String,
}

fn default_pipeline() -> String {
    "basic".to_string()
}

impl Default for TokenizeConfig {
    fn default() -> Self {
        Self {
            pipeline: default_pipeline(),
        }
    }
}

impl TokenizeConfig {
    pub fn pipeline_for(&self, language: &str) -> String {
        format!("{}-{}", self.pipeline, language)
    }
}

/// External binaries the pipeline shells out to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollaboratorsConfig {
    #[serde(default = "default_pandoc")]
    pub pandoc: String,
    #[serde(default = "default_pdftoppm")]
    pub pdftoppm: String,
    #[serde(default = "default_tesseract")]
    pub tesseract: String,
    #[serde(default = "default_tet")]
    pub tet: String,
    #[serde(default = "default_dpi")]
    pub dpi: u32,
}

fn default_pandoc() -> String {
    "pandoc".to_string()
}

fn default_pdftoppm() -> String {
    "pdftoppm".to_string()
}

fn default_tesseract() -> String {
    "tesseract".to_string()
}

fn default_tet() -> String {
    "tet".to_string()
}

fn default_dpi() -> u32 {
    300
}

impl Default for CollaboratorsConfig {
    fn default() -> Self {
        Self {
            pandoc: default_pandoc(),
            pdftoppm: default_pdftoppm(),
            tesseract: default_tesseract(),
            tet: default_tet(),
            dpi: default_dpi(),
        }
    }
}
