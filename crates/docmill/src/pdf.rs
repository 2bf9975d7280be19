//! PDF inspection and assembly built on lopdf.
//!
//! Three jobs live here: probing whether a PDF carries an extractable
//! text layer (which decides the route at intake), counting pages, and
//! merging the per-page PDFs a fan-out produced back into one document.

use std::path::{Path, PathBuf};

use lopdf::{dictionary, Document, Object, ObjectId};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PdfError {
    #[error("Failed to load PDF '{path}': {source}")]
    Load {
        path: PathBuf,
        source: lopdf::Error,
    },

    #[error("Failed to save PDF '{path}': {source}")]
    Save {
        path: PathBuf,
        source: lopdf::Error,
    },

    #[error("Malformed PDF '{path}': {reason}")]
    Structure { path: PathBuf, reason: String },

    #[error("Nothing to merge: input list is empty")]
    NothingToMerge,
}

/// Whether any page of the PDF carries extractable text.
///
/// Pages without text operators make `extract_text` fail; that is not an
/// error here, just a page with nothing to say.
pub fn has_text_layer(path: &Path) -> Result<bool, PdfError> {
    let doc = load(path)?;
    for page_no in doc.get_pages().keys() {
        if let Ok(text) = doc.extract_text(&[*page_no]) {
            if text.chars().any(char::is_alphanumeric) {
                return Ok(true);
            }
        }
    }
    Ok(false)
}

/// Number of pages in the PDF.
pub fn page_count(path: &Path) -> Result<usize, PdfError> {
    Ok(load(path)?.get_pages().len())
}

/// Merges the input PDFs into one document at `output`. Pages keep the
/// order of `inputs`; within one input they keep their own page order.
/// Returns the merged page count.
pub fn merge_ordered(inputs: &[PathBuf], output: &Path) -> Result<usize, PdfError> {
    if inputs.is_empty() {
        return Err(PdfError::NothingToMerge);
    }

    let mut merged = Document::with_version("1.5");
    let mut page_ids: Vec<ObjectId> = Vec::new();
    let mut next_id: u32 = 1;

    for path in inputs {
        let mut doc = load(path)?;
        doc.renumber_objects_with(next_id);
        next_id = doc.max_id + 1;

        // The originals' catalog and page-tree nodes are replaced by one
        // rebuilt tree, so find them and leave them behind when copying.
        let catalog_id = doc
            .trailer
            .get(b"Root")
            .and_then(Object::as_reference)
            .map_err(|e| structure(path, "trailer has no Root reference", e))?;
        let pages_id = doc
            .get_object(catalog_id)
            .and_then(Object::as_dict)
            .and_then(|catalog| catalog.get(b"Pages"))
            .and_then(Object::as_reference)
            .map_err(|e| structure(path, "catalog has no Pages reference", e))?;

        // get_pages is keyed by page number, so iteration is page order.
        for (_, page_id) in doc.get_pages() {
            page_ids.push(page_id);
        }

        for (id, object) in std::mem::take(&mut doc.objects) {
            if id == catalog_id || id == pages_id {
                continue;
            }
            merged.objects.insert(id, object);
        }
    }

    merged.max_id = next_id - 1;

    let pages_id = merged.new_object_id();
    for &page_id in &page_ids {
        let page = merged
            .get_object_mut(page_id)
            .and_then(Object::as_dict_mut)
            .map_err(|e| structure(output, "copied page is not a dictionary", e))?;
        page.set("Parent", pages_id);
    }

    let kids: Vec<Object> = page_ids.iter().map(|id| (*id).into()).collect();
    merged.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => page_ids.len() as i64,
        }),
    );

    let catalog_id = merged.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    merged.trailer.set("Root", catalog_id);
    merged.compress();

    merged.save(output).map_err(|e| PdfError::Save {
        path: output.to_path_buf(),
        source: lopdf::Error::IO(e),
    })?;

    Ok(page_ids.len())
}

fn load(path: &Path) -> Result<Document, PdfError> {
    Document::load(path).map_err(|e| PdfError::Load {
        path: path.to_path_buf(),
        source: e,
    })
}

fn structure(path: &Path, reason: &str, source: lopdf::Error) -> PdfError {
    PdfError::Structure {
        path: path.to_path_buf(),
        reason: format!("{}: {}", reason, source),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::Stream;

    /// Builds a single-page PDF whose text layer shows the given lines.
    fn text_pdf(lines: &[&str]) -> Document {
        let mut doc = Document::with_version("1.5");

        let pages_id = doc.new_object_id();
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
        });
        let resources_id = doc.add_object(dictionary! {
            "Font" => dictionary! { "F1" => font_id },
        });

        let mut content = String::from("BT\n/F1 11 Tf\n50 742 Td\n14 TL\n");
        for line in lines {
            content.push_str(&format!("({}) Tj T*\n", line));
        }
        content.push_str("ET\n");

        let content_id = doc.add_object(Object::Stream(Stream::new(
            dictionary! {},
            content.into_bytes(),
        )));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
            "Resources" => resources_id,
            "Contents" => content_id,
        });

        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => vec![page_id.into()],
                "Count" => 1,
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);
        doc
    }

    fn save(doc: &mut Document, dir: &Path, name: &str) -> PathBuf {
        let path = dir.join(name);
        doc.save(&path).expect("Failed to save test PDF");
        path
    }

    #[test]
    fn test_has_text_layer_detects_text() {
        let dir = tempfile::tempdir().unwrap();
        let path = save(&mut text_pdf(&["hello world"]), dir.path(), "text.pdf");

        assert!(has_text_layer(&path).unwrap());
    }

    #[test]
    fn test_has_text_layer_false_for_empty_page() {
        let dir = tempfile::tempdir().unwrap();
        let path = save(&mut text_pdf(&[]), dir.path(), "empty.pdf");

        assert!(!has_text_layer(&path).unwrap());
    }

    #[test]
    fn test_page_count() {
        let dir = tempfile::tempdir().unwrap();
        let path = save(&mut text_pdf(&["one page"]), dir.path(), "count.pdf");

        assert_eq!(page_count(&path).unwrap(), 1);
    }

    #[test]
    fn test_load_fails_on_missing_file() {
        let result = page_count(Path::new("/nonexistent/missing.pdf"));
        assert!(matches!(result, Err(PdfError::Load { .. })));
    }

    #[test]
    fn test_merge_preserves_input_order() {
        let dir = tempfile::tempdir().unwrap();
        let inputs = vec![
            save(&mut text_pdf(&["five"]), dir.path(), "a.pdf"),
            save(&mut text_pdf(&["seven"]), dir.path(), "b.pdf"),
            save(&mut text_pdf(&["nine"]), dir.path(), "c.pdf"),
        ];
        let output = dir.path().join("merged.pdf");

        let pages = merge_ordered(&inputs, &output).unwrap();
        assert_eq!(pages, 3);

        let merged = Document::load(&output).unwrap();
        assert_eq!(merged.get_pages().len(), 3);
        assert!(merged.extract_text(&[1]).unwrap().contains("five"));
        assert!(merged.extract_text(&[2]).unwrap().contains("seven"));
        assert!(merged.extract_text(&[3]).unwrap().contains("nine"));
    }

    #[test]
    fn test_merge_single_input_is_valid() {
        let dir = tempfile::tempdir().unwrap();
        let inputs = vec![save(&mut text_pdf(&["lonely"]), dir.path(), "only.pdf")];
        let output = dir.path().join("merged.pdf");

        assert_eq!(merge_ordered(&inputs, &output).unwrap(), 1);
        assert!(has_text_layer(&output).unwrap());
    }

    #[test]
    fn test_merge_rejects_empty_input() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("merged.pdf");

        let result = merge_ordered(&[], &output);
        assert!(matches!(result, Err(PdfError::NothingToMerge)));
    }
}
