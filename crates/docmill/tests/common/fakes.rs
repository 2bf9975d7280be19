//! In-process stand-ins for the external tools. Each fake produces real
//! artifacts (PDFs, PNGs, TETML) so the code under test runs against
//! files it can actually open.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use docmill::collab::{
    CollabError, ExtractOptions, ExtractText, Ocr, PageImage, PdfConvert, Rasterize,
};
use docmill::pipeline::Collaborators;

use super::builders;

/// Conversion fake that writes a PDF with the configured page texts,
/// ignoring the input file entirely.
pub struct FakeConvert {
    pub pages: Vec<String>,
}

impl FakeConvert {
    /// Single-page conversion with the given text layer.
    pub fn with_text(text: &str) -> Self {
        Self {
            pages: vec![text.to_string()],
        }
    }
}

impl PdfConvert for FakeConvert {
    fn convert_to_pdf(
        &self,
        _input: &Path,
        output: &Path,
        _language: &str,
    ) -> Result<(), CollabError> {
        let pages: Vec<&str> = self.pages.iter().map(|s| s.as_str()).collect();
        builders::save_pdf(builders::pdf_with_pages(&pages), output);
        Ok(())
    }
}

/// Conversion fake whose invocation fails like a crashing binary.
pub struct FailingConvert;

impl PdfConvert for FailingConvert {
    fn convert_to_pdf(
        &self,
        _input: &Path,
        _output: &Path,
        _language: &str,
    ) -> Result<(), CollabError> {
        Err(CollabError::CommandFailed {
            tool: "pandoc".to_string(),
            status: "exit status: 43".to_string(),
            stderr: "cannot parse input document".to_string(),
        })
    }
}

/// Conversion fake whose environment check already fails, as if the
/// binary were not installed.
pub struct UnavailableConvert;

impl PdfConvert for UnavailableConvert {
    fn convert_to_pdf(
        &self,
        _input: &Path,
        _output: &Path,
        _language: &str,
    ) -> Result<(), CollabError> {
        Err(missing_pandoc())
    }

    fn check(&self) -> Result<(), CollabError> {
        Err(missing_pandoc())
    }
}

/// Conversion fake that passes the environment check but reports the
/// binary missing on first use, as if it vanished mid-batch.
pub struct VanishingConvert;

impl PdfConvert for VanishingConvert {
    fn convert_to_pdf(
        &self,
        _input: &Path,
        _output: &Path,
        _language: &str,
    ) -> Result<(), CollabError> {
        Err(missing_pandoc())
    }
}

fn missing_pandoc() -> CollabError {
    CollabError::Unavailable {
        tool: "pandoc".to_string(),
        reason: "binary not found on PATH".to_string(),
    }
}

/// Conversion fake that raises a shutdown flag before delegating, so a
/// test can interrupt a batch between documents.
pub struct InterruptingConvert {
    pub inner: FakeConvert,
    pub flag: Arc<AtomicBool>,
}

impl PdfConvert for InterruptingConvert {
    fn convert_to_pdf(
        &self,
        input: &Path,
        output: &Path,
        language: &str,
    ) -> Result<(), CollabError> {
        self.flag.store(true, Ordering::SeqCst);
        self.inner.convert_to_pdf(input, output, language)
    }
}

/// Rasterization fake producing the configured number of 1x1 PNG pages
/// under the requested prefix.
pub struct FakeRasterize {
    pub pages: u32,
}

impl Rasterize for FakeRasterize {
    fn rasterize(
        &self,
        _input: &Path,
        output_prefix: &Path,
    ) -> Result<Vec<PageImage>, CollabError> {
        let mut pages = Vec::new();
        for page_no in 1..=self.pages {
            let mut name = output_prefix.as_os_str().to_os_string();
            name.push(format!("-{}.png", page_no));
            let path = PathBuf::from(name);
            image::RgbImage::new(1, 1)
                .save(&path)
                .expect("Failed to write fake page image");
            pages.push(PageImage { page_no, path });
        }
        Ok(pages)
    }
}

/// OCR fake that writes a searchable single-page PDF whose text names
/// the page it came from, so merge order stays observable downstream.
/// The page number is read off the `-N` suffix rasterization put on the
/// image file name.
pub struct FakeOcr;

impl Ocr for FakeOcr {
    fn ocr_to_pdf(
        &self,
        input_pattern: &str,
        output: &Path,
        _language: &str,
    ) -> Result<Vec<PathBuf>, CollabError> {
        let mut inputs: Vec<PathBuf> = glob::glob(input_pattern)
            .expect("Failed to expand fake OCR pattern")
            .filter_map(|entry| entry.ok())
            .collect();
        inputs.sort();
        if inputs.is_empty() {
            return Err(CollabError::NoInputs {
                pattern: input_pattern.to_string(),
            });
        }

        let page_no = trailing_page_number(&inputs[0]);
        let text = format!("Scanned page {}", page_no);
        builders::save_pdf(builders::pdf_with_pages(&[text.as_str()]), output);
        Ok(inputs)
    }
}

fn trailing_page_number(path: &Path) -> u32 {
    path.file_stem()
        .and_then(|s| s.to_str())
        .and_then(|s| s.rsplit('-').next())
        .and_then(|s| s.parse().ok())
        .unwrap_or(1)
}

/// Extraction fake that reads the input PDF's text layer and writes
/// line-granularity TETML: one page per PDF page, one `Line` per text
/// line, stacked downwards from the top of the page.
pub struct FakeExtract;

impl ExtractText for FakeExtract {
    fn extract(
        &self,
        input: &Path,
        output: &Path,
        _options: &ExtractOptions,
    ) -> Result<(), CollabError> {
        let doc = lopdf::Document::load(input).expect("Failed to load PDF in fake extractor");

        let mut pages = Vec::new();
        for page_no in doc.get_pages().keys() {
            let text = doc.extract_text(&[*page_no]).unwrap_or_default();
            let mut lines = Vec::new();
            let mut ury = 742.0;
            for raw in text.lines() {
                let trimmed = raw.trim();
                if trimmed.is_empty() {
                    continue;
                }
                lines.push(builders::tetml_line(trimmed, ury - 11.0, ury));
                ury -= 14.0;
            }
            pages.push(builders::tetml_para(&lines));
        }

        let xml = builders::tetml_document(&pages);
        std::fs::write(output, xml).map_err(|e| CollabError::Io {
            path: output.to_path_buf(),
            source: e,
        })
    }
}

/// The standard fake set: conversion producing one page with the given
/// text, rasterization with the given page count, OCR and extraction.
pub fn standard_collaborators(convert_text: &str, raster_pages: u32) -> Collaborators {
    Collaborators {
        convert: Box::new(FakeConvert::with_text(convert_text)),
        rasterize: Box::new(FakeRasterize {
            pages: raster_pages,
        }),
        ocr: Box::new(FakeOcr),
        extract: Box::new(FakeExtract),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trailing_page_number() {
        assert_eq!(trailing_page_number(Path::new("/w/1/scan-3.png")), 3);
        assert_eq!(trailing_page_number(Path::new("/w/1/scan-12.png")), 12);
        assert_eq!(trailing_page_number(Path::new("/w/1/photo.png")), 1);
    }
}
