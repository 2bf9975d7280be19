//! Builders for test fixtures: real PDFs with controllable text layers
//! and TETML documents with controllable layout.

#![allow(dead_code)]

use std::path::{Path, PathBuf};

use lopdf::{dictionary, Document, Object, Stream};

/// Builds a PDF with one page per entry. Each entry becomes the page's
/// text layer, one `Tj` per line; an empty entry yields a page without
/// text operators, which is how a scanned page looks to the probe.
pub fn pdf_with_pages(pages: &[&str]) -> Document {
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

    let mut kids: Vec<Object> = Vec::new();
    for text in pages {
        let mut content = String::from("BT\n/F1 11 Tf\n50 742 Td\n14 TL\n");
        for line in text.lines() {
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
        kids.push(page_id.into());
    }

    let count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);
    doc
}

/// Saves a built PDF under the given path and returns the path.
pub fn save_pdf(mut doc: Document, path: &Path) -> PathBuf {
    doc.save(path).expect("Failed to save test PDF");
    path.to_path_buf()
}

pub fn xml_escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

/// One TETML `Line` element in regular body style (Helvetica 11pt).
pub fn tetml_line(text: &str, lly: f64, ury: f64) -> String {
    tetml_styled_line(text, lly, ury, "Helvetica", 11.0)
}

/// One TETML `Line` element with explicit font name and size. Bold is
/// signalled the way the extractor does it, through the font name.
pub fn tetml_styled_line(text: &str, lly: f64, ury: f64, font: &str, size: f64) -> String {
    format!(
        "<Line llx=\"50.00\" lly=\"{:.2}\" urx=\"545.00\" ury=\"{:.2}\">\
         <Glyph font=\"{}\" size=\"{:.1}\"/>\
         <Text>{}</Text></Line>",
        lly,
        ury,
        font,
        size,
        xml_escape(text)
    )
}

/// Wraps lines into a `Para` element.
pub fn tetml_para(lines: &[String]) -> String {
    format!("<Para>{}</Para>", lines.concat())
}

/// A table cell holding one line. `col_span` of `None` emits no attribute,
/// which the parser reads as a span of one.
pub fn tetml_cell(line: &str, col_span: Option<u32>) -> String {
    match col_span {
        Some(span) => format!("<Cell colSpan=\"{}\">{}</Cell>", span, line),
        None => format!("<Cell>{}</Cell>", line),
    }
}

pub fn tetml_row(cells: &[String]) -> String {
    format!("<Row>{}</Row>", cells.concat())
}

pub fn tetml_table(rows: &[String]) -> String {
    format!("<Table>{}</Table>", rows.concat())
}

/// Assembles a line-granularity TETML document. Each entry is the inner
/// XML of one page's `Content`; pages are numbered from one.
pub fn tetml_document(pages: &[String]) -> String {
    let mut xml = String::from(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n\
         <TET xmlns=\"http://www.pdflib.com/XML/TET5/TET-5.0\">\n\
         <Document filename=\"fixture.pdf\">\n<Pages>\n",
    );
    for (i, body) in pages.iter().enumerate() {
        xml.push_str(&format!(
            "<Page number=\"{}\" width=\"595.28\" height=\"841.89\">\
             <Content granularity=\"line\">{}</Content></Page>\n",
            i + 1,
            body
        ));
    }
    xml.push_str("</Pages>\n</Document>\n</TET>\n");
    xml
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pdf_with_pages_counts_and_text() {
        let dir = tempfile::tempdir().unwrap();
        let path = save_pdf(
            pdf_with_pages(&["alpha", "", "gamma"]),
            &dir.path().join("three.pdf"),
        );

        let doc = Document::load(&path).expect("Failed to load built PDF");
        assert_eq!(doc.get_pages().len(), 3);
        assert!(doc.extract_text(&[1]).unwrap().contains("alpha"));
        assert!(doc.extract_text(&[3]).unwrap().contains("gamma"));
    }

    #[test]
    fn test_xml_escape() {
        assert_eq!(xml_escape("a < b & c > d"), "a &lt; b &amp; c &gt; d");
    }

    #[test]
    fn test_tetml_document_shape() {
        let page = tetml_para(&[tetml_line("hello", 731.0, 742.0)]);
        let xml = tetml_document(&[page]);

        assert!(xml.contains("<Page number=\"1\""));
        assert!(xml.contains("granularity=\"line\""));
        assert!(xml.contains("<Text>hello</Text>"));
    }
}
