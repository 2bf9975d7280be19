//! Event-driven reader for the extractor's TETML output.
//!
//! Line granularity yields the full layout hierarchy; page and word
//! granularity run a lighter pass that only recovers per-page text.

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::collab::Granularity;

use super::{Line, Page, Paragraph, ParseError};

/// Column cursor while the reader walks Row/Cell elements of a table.
#[derive(Debug, Default)]
struct TableCursor {
    row: u32,
    col: u32,
    span: u32,
}

impl TableCursor {
    fn next_row(&mut self) {
        self.row += 1;
        self.col = 0;
        self.span = 0;
    }

    /// Advances past the previous cell's span, so columns stay aligned
    /// across rows with merged cells.
    fn next_cell(&mut self, span: u32) {
        if self.col == 0 {
            self.col = 1;
        } else {
            self.col += self.span.max(1);
        }
        self.span = span.max(1);
    }
}

/// Parses line-granularity TETML into pages with full layout.
pub fn parse_layout(xml: &str) -> Result<Vec<Page>, ParseError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut pages: Vec<Page> = Vec::new();
    let mut page: Option<Page> = None;
    let mut paragraph: Option<Paragraph> = None;
    let mut line: Option<Line> = None;
    let mut table: Option<TableCursor> = None;
    let mut in_text = false;
    let mut line_sized = false;

    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) => {
                let local_name = e.local_name();
                match local_name.as_ref() {
                    b"Page" => {
                        page = Some(Page {
                            number: page_number(e)?,
                            width: f64_attr(e, b"width")?,
                            height: f64_attr(e, b"height")?,
                            paragraphs: Vec::new(),
                        });
                    }
                    b"Para" => {
                        flush_paragraph(&mut paragraph, page.as_mut());
                        paragraph = Some(Paragraph::default());
                    }
                    b"Table" => table = Some(TableCursor::default()),
                    b"Row" => {
                        if let Some(cursor) = table.as_mut() {
                            cursor.next_row();
                        }
                    }
                    b"Cell" => enter_cell(e, table.as_mut())?,
                    b"Line" => {
                        let mut open = Line::new("");
                        open.llx = f64_attr(e, b"llx")?;
                        open.lly = f64_attr(e, b"lly")?;
                        open.urx = f64_attr(e, b"urx")?;
                        open.ury = f64_attr(e, b"ury")?;
                        if let Some(cursor) = table.as_ref() {
                            open.table_row = cursor.row;
                            open.table_col = cursor.col;
                            open.col_span = cursor.span;
                        }
                        line = Some(open);
                        line_sized = false;
                    }
                    b"Text" => in_text = true,
                    b"Glyph" => record_glyph(e, line.as_mut(), &mut line_sized)?,
                    _ => {}
                }
            }
            Ok(Event::Empty(ref e)) => {
                let local_name = e.local_name();
                match local_name.as_ref() {
                    b"Cell" => enter_cell(e, table.as_mut())?,
                    b"Glyph" => record_glyph(e, line.as_mut(), &mut line_sized)?,
                    _ => {}
                }
            }
            Ok(Event::End(ref e)) => {
                let local_name = e.local_name();
                match local_name.as_ref() {
                    b"Page" => {
                        flush_paragraph(&mut paragraph, page.as_mut());
                        if let Some(done) = page.take() {
                            pages.push(done);
                        }
                    }
                    b"Para" => flush_paragraph(&mut paragraph, page.as_mut()),
                    b"Table" => table = None,
                    b"Line" => {
                        if let Some(mut done) = line.take() {
                            done.word_count = done.text.split_whitespace().count() as u32;
                            match paragraph.as_mut() {
                                Some(p) => p.lines.push(done),
                                // A line sitting directly in a table cell
                                // becomes its own single-line paragraph.
                                None => {
                                    if let Some(pg) = page.as_mut() {
                                        pg.paragraphs.push(Paragraph { lines: vec![done] });
                                    }
                                }
                            }
                        }
                    }
                    b"Text" => in_text = false,
                    _ => {}
                }
            }
            Ok(Event::Text(e)) => {
                if in_text {
                    if let Some(open) = line.as_mut() {
                        let decoded = e.unescape().unwrap_or_default();
                        open.text.push_str(&decoded);
                    }
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(ParseError::Xml(e)),
            _ => {}
        }
    }

    if pages.is_empty() {
        return Err(ParseError::NoPages);
    }
    Ok(pages)
}

/// Recovers per-page text from page- or word-granularity TETML.
pub fn parse_page_texts(
    xml: &str,
    granularity: Granularity,
) -> Result<Vec<(u32, String)>, ParseError> {
    let separator = match granularity {
        Granularity::Word => ' ',
        _ => '\n',
    };

    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut pages: Vec<(u32, String)> = Vec::new();
    let mut current: Option<(u32, String)> = None;
    let mut in_text = false;

    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) => {
                let local_name = e.local_name();
                match local_name.as_ref() {
                    b"Page" => current = Some((page_number(e)?, String::new())),
                    b"Text" => in_text = true,
                    _ => {}
                }
            }
            Ok(Event::End(ref e)) => {
                let local_name = e.local_name();
                match local_name.as_ref() {
                    b"Page" => {
                        if let Some((number, text)) = current.take() {
                            pages.push((number, text.trim_end().to_string()));
                        }
                    }
                    b"Text" => in_text = false,
                    _ => {}
                }
            }
            Ok(Event::Text(e)) => {
                if in_text {
                    if let Some((_, text)) = current.as_mut() {
                        let decoded = e.unescape().unwrap_or_default();
                        if !decoded.is_empty() {
                            text.push_str(&decoded);
                            text.push(separator);
                        }
                    }
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(ParseError::Xml(e)),
            _ => {}
        }
    }

    if pages.is_empty() {
        return Err(ParseError::NoPages);
    }
    Ok(pages)
}

fn flush_paragraph(paragraph: &mut Option<Paragraph>, page: Option<&mut Page>) {
    if let Some(done) = paragraph.take() {
        if !done.lines.is_empty() {
            if let Some(pg) = page {
                pg.paragraphs.push(done);
            }
        }
    }
}

fn enter_cell(e: &BytesStart, table: Option<&mut TableCursor>) -> Result<(), ParseError> {
    if let Some(cursor) = table {
        let span = match attr_value(e, b"colSpan") {
            Some(raw) => raw.trim().parse::<u32>().map_err(|_| {
                ParseError::Structure(format!("invalid colSpan attribute \"{}\"", raw))
            })?,
            None => 1,
        };
        cursor.next_cell(span);
    }
    Ok(())
}

/// The first glyph of a line fixes its font annotations.
fn record_glyph(
    e: &BytesStart,
    line: Option<&mut Line>,
    sized: &mut bool,
) -> Result<(), ParseError> {
    if let Some(open) = line {
        if !*sized {
            open.font_size = f64_attr(e, b"size")?;
            open.bold = attr_value(e, b"font")
                .map(|f| f.to_ascii_lowercase().contains("bold"))
                .unwrap_or(false);
            *sized = true;
        }
    }
    Ok(())
}

fn attr_value(e: &BytesStart, name: &[u8]) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|a| a.key.local_name().as_ref() == name)
        .map(|a| String::from_utf8_lossy(&a.value).into_owned())
}

fn f64_attr(e: &BytesStart, name: &[u8]) -> Result<f64, ParseError> {
    match attr_value(e, name) {
        Some(raw) => raw.trim().parse::<f64>().map_err(|_| {
            ParseError::Structure(format!(
                "invalid numeric attribute {}=\"{}\"",
                String::from_utf8_lossy(name),
                raw
            ))
        }),
        None => Ok(0.0),
    }
}

fn page_number(e: &BytesStart) -> Result<u32, ParseError> {
    attr_value(e, b"number")
        .and_then(|raw| raw.trim().parse::<u32>().ok())
        .ok_or_else(|| {
            ParseError::Structure("Page element without a numeric number attribute".to_string())
        })
}
