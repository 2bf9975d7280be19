//! Inbox scanning: discovers files dropped into the intake directory and
//! registers each one as a root document ready for processing.

use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::db::{document_repo, Database};
use crate::error::{DocmillError, Result};
use crate::pipeline::Step;

/// File classes the intake accepts. The class decides the first
/// processing step after intake.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputKind {
    /// Office and markup formats that need conversion to PDF.
    Office,
    Pdf,
    /// Standalone raster images, treated as single-page scans.
    Image,
}

impl InputKind {
    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|e| e.to_str())
            .and_then(Self::from_extension)
    }

    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "pdf" => Some(Self::Pdf),
            "doc" | "docx" | "odt" | "rtf" | "html" | "htm" | "md" | "markdown" | "txt"
            | "epub" => Some(Self::Office),
            "png" | "jpg" | "jpeg" | "tif" | "tiff" | "bmp" | "gif" | "webp" => Some(Self::Image),
            _ => None,
        }
    }
}

/// Scans one directory, non-recursively, in file-name order.
pub struct InboxScanner {
    directory: PathBuf,
    language: String,
}

impl InboxScanner {
    pub fn new(directory: impl Into<PathBuf>, language: impl Into<String>) -> Self {
        Self {
            directory: directory.into(),
            language: language.into(),
        }
    }

    /// Registers every supported file that is not already known. Returns
    /// the ids of the documents created by this scan; files registered
    /// by earlier scans are silently skipped, so rescanning is safe.
    pub fn scan(&self, db: &Database) -> Result<Vec<i64>> {
        if !self.directory.is_dir() {
            return Err(DocmillError::MissingDirectory(self.directory.clone()));
        }

        let directory = self.directory.to_string_lossy().to_string();
        let mut created = Vec::new();

        for entry in WalkDir::new(&self.directory)
            .min_depth(1)
            .max_depth(1)
            .sort_by_file_name()
        {
            let entry = match entry {
                Ok(e) => e,
                Err(e) => {
                    log::warn!("Skipping unreadable inbox entry: {}", e);
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }

            let path = entry.path();
            if InputKind::from_path(path).is_none() {
                log::debug!("Ignoring unsupported file '{}'", path.display());
                continue;
            }
            let file_name = match path.file_name().and_then(|n| n.to_str()) {
                Some(name) => name.to_string(),
                None => {
                    log::warn!("Ignoring non-UTF-8 file name '{}'", path.display());
                    continue;
                }
            };

            let language = self.language.clone();
            let new_id = db.with_tx(|conn| {
                if document_repo::exists_at(conn, &directory, &file_name)? {
                    return Ok(None);
                }
                document_repo::create_root(
                    conn,
                    Step::Inbox.as_str(),
                    "ready",
                    &directory,
                    &file_name,
                    &language,
                )
                .map(Some)
            })?;

            if let Some(id) = new_id {
                log::info!("Registered '{}' as document {}", file_name, id);
                created.push(id);
            }
        }

        Ok(created)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scanner_for(dir: &Path) -> InboxScanner {
        InboxScanner::new(dir, "eng")
    }

    #[test]
    fn test_input_kind_from_extension() {
        assert_eq!(InputKind::from_extension("PDF"), Some(InputKind::Pdf));
        assert_eq!(InputKind::from_extension("docx"), Some(InputKind::Office));
        assert_eq!(InputKind::from_extension("md"), Some(InputKind::Office));
        assert_eq!(InputKind::from_extension("jpeg"), Some(InputKind::Image));
        assert_eq!(InputKind::from_extension("exe"), None);
    }

    #[test]
    fn test_input_kind_from_path() {
        assert_eq!(
            InputKind::from_path(Path::new("/in/report.PDF")),
            Some(InputKind::Pdf)
        );
        assert_eq!(InputKind::from_path(Path::new("/in/noext")), None);
    }

    #[test]
    fn test_scan_registers_supported_files_in_name_order() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["b.pdf", "a.docx", "notes.txt", "skip.exe"] {
            std::fs::write(dir.path().join(name), b"content").unwrap();
        }

        let db = Database::open_in_memory().expect("Failed to open database");
        let created = scanner_for(dir.path())
            .scan(&db)
            .expect("Failed to scan inbox");

        assert_eq!(created.len(), 3);

        let rows = db
            .with_conn(|conn| document_repo::select_eligible(conn, Step::Inbox.as_str()))
            .expect("Failed to query documents");
        let names: Vec<&str> = rows.iter().map(|r| r.file_name.as_str()).collect();
        assert_eq!(names, vec!["a.docx", "b.pdf", "notes.txt"]);
        assert!(rows.iter().all(|r| r.status == "ready"));
        assert!(rows.iter().all(|r| r.is_root()));
        assert!(rows.iter().all(|r| r.language == "eng"));
    }

    #[test]
    fn test_rescan_skips_known_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("one.pdf"), b"content").unwrap();

        let db = Database::open_in_memory().expect("Failed to open database");
        let scanner = scanner_for(dir.path());

        let first = scanner.scan(&db).expect("Failed first scan");
        assert_eq!(first.len(), 1);

        let second = scanner.scan(&db).expect("Failed second scan");
        assert!(second.is_empty());
    }

    #[test]
    fn test_scan_ignores_subdirectories() {
        let dir = tempfile::tempdir().unwrap();
        let sub = dir.path().join("nested");
        std::fs::create_dir(&sub).unwrap();
        std::fs::write(sub.join("inner.pdf"), b"content").unwrap();

        let db = Database::open_in_memory().expect("Failed to open database");
        let created = scanner_for(dir.path())
            .scan(&db)
            .expect("Failed to scan inbox");
        assert!(created.is_empty());
    }

    #[test]
    fn test_scan_missing_directory_fails() {
        let db = Database::open_in_memory().expect("Failed to open database");
        let result = scanner_for(Path::new("/definitely/not/here")).scan(&db);
        assert!(matches!(result, Err(DocmillError::MissingDirectory(_))));
    }
}
