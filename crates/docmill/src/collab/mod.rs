//! Collaborators — the external tools the pipeline shells out to.
//!
//! Every tool sits behind a small trait so the pipeline can run against
//! in-process fakes. The real implementations are blocking
//! `std::process::Command` invocations; batching, status tracking and
//! retry policy all live in the runner, never here.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use thiserror::Error;

pub mod options;

pub use options::{ExtractOptions, Granularity};

#[derive(Error, Debug)]
pub enum CollabError {
    /// The tool cannot be invoked at all. The runner treats this as an
    /// environment problem and aborts the batch.
    #[error("{tool} is not available: {reason}")]
    Unavailable { tool: String, reason: String },

    #[error("Failed to launch {tool}: {source}")]
    Launch {
        tool: String,
        source: std::io::Error,
    },

    #[error("{tool} failed ({status}): {stderr}")]
    CommandFailed {
        tool: String,
        status: String,
        stderr: String,
    },

    #[error("IO error on '{path}': {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Image error on '{path}': {source}")]
    Image {
        path: PathBuf,
        source: image::ImageError,
    },

    #[error("{tool} produced no output matching '{expected}'")]
    MissingOutput { tool: String, expected: String },

    #[error("No inputs match '{pattern}'")]
    NoInputs { pattern: String },

    #[error("Invalid glob pattern '{pattern}': {source}")]
    Pattern {
        pattern: String,
        source: glob::PatternError,
    },
}

/// One page image produced by rasterization, in page order.
#[derive(Debug, Clone)]
pub struct PageImage {
    pub page_no: u32,
    pub path: PathBuf,
}

/// Converts an office-format file into a normalized PDF.
pub trait PdfConvert {
    fn convert_to_pdf(&self, input: &Path, output: &Path, language: &str)
        -> Result<(), CollabError>;

    /// Verifies the backing tool is usable. The runner calls this before
    /// a batch so a missing binary aborts the run instead of failing
    /// every document one by one.
    fn check(&self) -> Result<(), CollabError> {
        Ok(())
    }
}

/// Renders PDF pages into page image files. Inputs that already are
/// raster images pass through as a single page.
pub trait Rasterize {
    fn rasterize(&self, input: &Path, output_prefix: &Path)
        -> Result<Vec<PageImage>, CollabError>;

    fn check(&self) -> Result<(), CollabError> {
        Ok(())
    }
}

/// Runs OCR over page images, producing one searchable PDF. Returns the
/// input paths it consumed, expanded from the glob in stable order.
pub trait Ocr {
    fn ocr_to_pdf(
        &self,
        input_pattern: &str,
        output: &Path,
        language: &str,
    ) -> Result<Vec<PathBuf>, CollabError>;

    fn check(&self) -> Result<(), CollabError> {
        Ok(())
    }
}

/// Extracts text, and at line granularity full layout, from a PDF.
pub trait ExtractText {
    fn extract(
        &self,
        input: &Path,
        output: &Path,
        options: &ExtractOptions,
    ) -> Result<(), CollabError>;

    fn check(&self) -> Result<(), CollabError> {
        Ok(())
    }
}

/// Office-to-PDF conversion via pandoc.
pub struct PandocConverter {
    binary: String,
}

impl PandocConverter {
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }
}

impl PdfConvert for PandocConverter {
    fn convert_to_pdf(
        &self,
        input: &Path,
        output: &Path,
        language: &str,
    ) -> Result<(), CollabError> {
        let mut cmd = Command::new(&self.binary);
        cmd.arg(input)
            .arg("--metadata")
            .arg(format!("lang={}", language))
            .arg("-o")
            .arg(output);
        run(&self.binary, &mut cmd)?;
        require_output(&self.binary, output)
    }

    fn check(&self) -> Result<(), CollabError> {
        version_check(&self.binary, "--version")
    }
}

/// Page rasterization via pdftoppm.
pub struct PdftoppmRasterizer {
    binary: String,
    dpi: u32,
}

impl PdftoppmRasterizer {
    pub fn new(binary: impl Into<String>, dpi: u32) -> Self {
        Self {
            binary: binary.into(),
            dpi,
        }
    }
}

impl Rasterize for PdftoppmRasterizer {
    fn rasterize(
        &self,
        input: &Path,
        output_prefix: &Path,
    ) -> Result<Vec<PageImage>, CollabError> {
        if is_raster_image(input) {
            return normalize_image(input, output_prefix);
        }

        let mut cmd = Command::new(&self.binary);
        cmd.arg("-png")
            .arg("-r")
            .arg(self.dpi.to_string())
            .arg(input)
            .arg(output_prefix);
        run(&self.binary, &mut cmd)?;

        collect_pages(&self.binary, output_prefix)
    }

    fn check(&self) -> Result<(), CollabError> {
        version_check(&self.binary, "-v")
    }
}

/// OCR via tesseract, images in, searchable PDF out.
pub struct TesseractOcr {
    binary: String,
}

impl TesseractOcr {
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }
}

impl Ocr for TesseractOcr {
    fn ocr_to_pdf(
        &self,
        input_pattern: &str,
        output: &Path,
        language: &str,
    ) -> Result<Vec<PathBuf>, CollabError> {
        let mut inputs: Vec<PathBuf> = glob::glob(input_pattern)
            .map_err(|e| CollabError::Pattern {
                pattern: input_pattern.to_string(),
                source: e,
            })?
            .filter_map(|entry| entry.ok())
            .collect();
        inputs.sort();
        if inputs.is_empty() {
            return Err(CollabError::NoInputs {
                pattern: input_pattern.to_string(),
            });
        }

        // Tesseract appends ".pdf" to the output base itself.
        let base = output.with_extension("");

        if let [single] = inputs.as_slice() {
            let mut cmd = Command::new(&self.binary);
            cmd.arg(single).arg(&base).arg("-l").arg(language).arg("pdf");
            run(&self.binary, &mut cmd)?;
        } else {
            // Several images go through a list file, one path per line.
            let mut list_name = base.clone().into_os_string();
            list_name.push(".lst");
            let list = PathBuf::from(list_name);
            let body = inputs
                .iter()
                .map(|p| p.display().to_string())
                .collect::<Vec<_>>()
                .join("\n");
            std::fs::write(&list, body).map_err(|e| CollabError::Io {
                path: list.clone(),
                source: e,
            })?;

            let mut cmd = Command::new(&self.binary);
            cmd.arg(&list).arg(&base).arg("-l").arg(language).arg("pdf");
            let result = run(&self.binary, &mut cmd);
            let _ = std::fs::remove_file(&list);
            result?;
        }

        require_output(&self.binary, output)?;
        Ok(inputs)
    }

    fn check(&self) -> Result<(), CollabError> {
        version_check(&self.binary, "--version")
    }
}

/// Text and layout extraction via the TET command line tool.
pub struct TetExtractor {
    binary: String,
}

impl TetExtractor {
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }
}

impl ExtractText for TetExtractor {
    fn extract(
        &self,
        input: &Path,
        output: &Path,
        options: &ExtractOptions,
    ) -> Result<(), CollabError> {
        let mut cmd = Command::new(&self.binary);
        cmd.arg("--tetml")
            .arg(options.granularity.as_str())
            .arg("--docopt")
            .arg(options.document_options())
            .arg("--pageopt")
            .arg(options.page_options())
            .arg("--outfile")
            .arg(output)
            .arg(input);
        run(&self.binary, &mut cmd)?;
        require_output(&self.binary, output)
    }

    fn check(&self) -> Result<(), CollabError> {
        // TET has no version flag; a bare invocation printing usage is
        // enough to prove the binary exists.
        match Command::new(&self.binary).output() {
            Ok(_) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(unavailable(&self.binary)),
            Err(e) => Err(CollabError::Launch {
                tool: self.binary.clone(),
                source: e,
            }),
        }
    }
}

fn run(tool: &str, cmd: &mut Command) -> Result<Output, CollabError> {
    log::debug!("Invoking {}: {:?}", tool, cmd);
    let output = cmd.output().map_err(|e| {
        if e.kind() == ErrorKind::NotFound {
            unavailable(tool)
        } else {
            CollabError::Launch {
                tool: tool.to_string(),
                source: e,
            }
        }
    })?;
    if !output.status.success() {
        return Err(CollabError::CommandFailed {
            tool: tool.to_string(),
            status: output.status.to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }
    Ok(output)
}

fn version_check(binary: &str, flag: &str) -> Result<(), CollabError> {
    run(binary, Command::new(binary).arg(flag))?;
    Ok(())
}

fn unavailable(tool: &str) -> CollabError {
    CollabError::Unavailable {
        tool: tool.to_string(),
        reason: "binary not found on PATH".to_string(),
    }
}

fn require_output(tool: &str, path: &Path) -> Result<(), CollabError> {
    if !path.exists() {
        return Err(CollabError::MissingOutput {
            tool: tool.to_string(),
            expected: path.display().to_string(),
        });
    }
    Ok(())
}

fn is_raster_image(path: &Path) -> bool {
    matches!(
        path.extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .as_deref(),
        Some("png" | "jpg" | "jpeg" | "tif" | "tiff" | "bmp" | "gif" | "webp")
    )
}

/// A standalone image becomes its own single page: decoded and
/// re-encoded as PNG so OCR always sees one consistent format.
fn normalize_image(input: &Path, output_prefix: &Path) -> Result<Vec<PageImage>, CollabError> {
    let decoded = image::open(input).map_err(|e| CollabError::Image {
        path: input.to_path_buf(),
        source: e,
    })?;
    let target = page_path(output_prefix, 1);
    decoded.save(&target).map_err(|e| CollabError::Image {
        path: target.clone(),
        source: e,
    })?;
    Ok(vec![PageImage {
        page_no: 1,
        path: target,
    }])
}

fn page_path(prefix: &Path, page_no: u32) -> PathBuf {
    let mut name = prefix.as_os_str().to_os_string();
    name.push(format!("-{}.png", page_no));
    PathBuf::from(name)
}

/// Gathers the page images a rasterizer run produced. pdftoppm pads page
/// numbers to a fixed width, so lexical file-name order is page order.
fn collect_pages(tool: &str, output_prefix: &Path) -> Result<Vec<PageImage>, CollabError> {
    let pattern = format!(
        "{}-*.png",
        glob::Pattern::escape(&output_prefix.display().to_string())
    );
    let mut paths: Vec<PathBuf> = glob::glob(&pattern)
        .map_err(|e| CollabError::Pattern {
            pattern: pattern.clone(),
            source: e,
        })?
        .filter_map(|entry| entry.ok())
        .collect();
    paths.sort();

    if paths.is_empty() {
        return Err(CollabError::MissingOutput {
            tool: tool.to_string(),
            expected: pattern,
        });
    }

    Ok(paths
        .into_iter()
        .enumerate()
        .map(|(i, path)| PageImage {
            page_no: i as u32 + 1,
            path,
        })
        .collect())
}
