//! External tool bundle used by the pipeline.

use crate::collab::{
    ExtractText, Ocr, PandocConverter, PdfConvert, PdftoppmRasterizer, Rasterize, TesseractOcr,
    TetExtractor,
};
use crate::config::CollaboratorsConfig;

/// The four external tools the pipeline shells out to. Trait objects so
/// tests can substitute fakes without spawning processes.
pub struct Collaborators {
    pub convert: Box<dyn PdfConvert>,
    pub rasterize: Box<dyn Rasterize>,
    pub ocr: Box<dyn Ocr>,
    pub extract: Box<dyn ExtractText>,
}

impl Collaborators {
    /// Builds the production bundle from configured binary names.
    pub fn from_config(config: &CollaboratorsConfig) -> Self {
        Self {
            convert: Box::new(PandocConverter::new(config.pandoc.clone())),
            rasterize: Box::new(PdftoppmRasterizer::new(config.pdftoppm.clone(), config.dpi)),
            ocr: Box::new(TesseractOcr::new(config.tesseract.clone())),
            extract: Box::new(TetExtractor::new(config.tet.clone())),
        }
    }
}
