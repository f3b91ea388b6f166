//! Office Open XML documents (DOCX, XLSX).

use std::collections::HashMap;
use std::io::{Cursor, Read};

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use zip::ZipArchive;

use super::ExtractionError;
use crate::models::{DocumentFormat, ExtractedText};

type Archive<'a> = ZipArchive<Cursor<&'a [u8]>>;

fn open(bytes: &[u8]) -> Result<Archive<'_>, ExtractionError> {
    Ok(ZipArchive::new(Cursor::new(bytes))?)
}

fn read_part(archive: &mut Archive<'_>, name: &str) -> Result<String, ExtractionError> {
    let mut part = archive.by_name(name)?;
    let mut xml = String::new();
    part.read_to_string(&mut xml)?;
    Ok(xml)
}

fn attr(e: &BytesStart, name: &[u8]) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|a| a.key.local_name().as_ref() == name)
        .and_then(|a| a.unescape_value().ok().map(|v| v.into_owned()))
}

pub fn extract_docx(bytes: &[u8]) -> ExtractedText {
    let mut out = ExtractedText::new(DocumentFormat::Docx);
    let result = open(bytes)
        .and_then(|mut archive| read_part(&mut archive, "word/document.xml"))
        .and_then(|xml| docx_text(&xml));

    match result {
        Ok((text, paragraphs)) => {
            out.paragraph_count = Some(paragraphs);
            out.with_text(text)
        }
        Err(e) => {
            out.warn(e.into_warning());
            out
        }
    }
}

/// Paragraphs and tables of `word/document.xml` in document order.
/// Returns the text and the number of non-empty body paragraphs.
fn docx_text(xml: &str) -> Result<(String, u32), ExtractionError> {
    let mut reader = Reader::from_str(xml);

    let mut blocks: Vec<String> = Vec::new();
    let mut paragraphs = 0u32;
    let mut para = String::new();
    let mut in_text = false;
    let mut table_depth = 0usize;
    let mut rows: Vec<Vec<String>> = Vec::new();
    let mut cells: Vec<String> = Vec::new();

    loop {
        match reader.read_event()? {
            Event::Start(e) => match e.local_name().as_ref() {
                b"p" => para.clear(),
                b"t" => in_text = true,
                b"tbl" => {
                    if table_depth == 0 {
                        blocks.push("[Table]".to_string());
                    }
                    table_depth += 1;
                }
                b"tr" => rows.push(Vec::new()),
                b"tc" => cells.push(String::new()),
                _ => {}
            },
            Event::Empty(e) => match e.local_name().as_ref() {
                b"tab" => para.push('\t'),
                b"br" | b"cr" => para.push('\n'),
                _ => {}
            },
            Event::Text(t) if in_text => para.push_str(&t.unescape()?),
            Event::End(e) => match e.local_name().as_ref() {
                b"t" => in_text = false,
                b"p" => {
                    let text = para.trim();
                    if text.is_empty() {
                        continue;
                    }
                    if let Some(cell) = cells.last_mut() {
                        if !cell.is_empty() {
                            cell.push(' ');
                        }
                        cell.push_str(text);
                    } else {
                        blocks.push(text.to_string());
                        paragraphs += 1;
                    }
                }
                b"tc" => {
                    if let (Some(cell), Some(row)) = (cells.pop(), rows.last_mut()) {
                        row.push(cell.trim().to_string());
                    }
                }
                b"tr" => {
                    let Some(row) = rows.pop() else { continue };
                    if row.iter().all(|c| c.is_empty()) {
                        continue;
                    }
                    let line = row.join(" | ");
                    // nested table rows stay inside the enclosing cell
                    match cells.last_mut() {
                        Some(cell) if table_depth > 1 => {
                            if !cell.is_empty() {
                                cell.push(' ');
                            }
                            cell.push_str(&line);
                        }
                        _ => blocks.push(line),
                    }
                }
                b"tbl" => {
                    table_depth = table_depth.saturating_sub(1);
                    if table_depth == 0 {
                        blocks.push("[End Table]".to_string());
                    }
                }
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
    }

    Ok((blocks.join("\n"), paragraphs))
}

pub fn extract_xlsx(bytes: &[u8]) -> ExtractedText {
    let mut out = ExtractedText::new(DocumentFormat::Xlsx);
    match xlsx_text(bytes) {
        Ok((text, sheets)) => {
            out.sheet_count = Some(sheets);
            out.with_text(text)
        }
        Err(e) => {
            out.warn(e.into_warning());
            out
        }
    }
}

/// Every sheet as `Sheet: <name>`, a rule, then its non-empty rows.
fn xlsx_text(bytes: &[u8]) -> Result<(String, u32), ExtractionError> {
    let mut archive = open(bytes)?;

    let sheets = workbook_sheets(&read_part(&mut archive, "xl/workbook.xml")?)?;
    let targets = match read_part(&mut archive, "xl/_rels/workbook.xml.rels") {
        Ok(xml) => relationship_targets(&xml)?,
        Err(_) => HashMap::new(),
    };
    let shared = match read_part(&mut archive, "xl/sharedStrings.xml") {
        Ok(xml) => shared_strings(&xml)?,
        Err(_) => Vec::new(),
    };

    let mut rendered = Vec::with_capacity(sheets.len());
    for (index, (name, rel_id)) in sheets.iter().enumerate() {
        let path = rel_id
            .as_ref()
            .and_then(|id| targets.get(id))
            .map(|target| resolve_target(target))
            .unwrap_or_else(|| format!("xl/worksheets/sheet{}.xml", index + 1));

        let rows = sheet_rows(&read_part(&mut archive, &path)?, &shared)?;

        let mut block = format!("Sheet: {}\n{}", name, "=".repeat(50));
        for row in rows {
            block.push('\n');
            block.push_str(&row.join(" | "));
        }
        rendered.push(block);
    }

    Ok((rendered.join("\n\n"), sheets.len() as u32))
}

fn resolve_target(target: &str) -> String {
    match target.strip_prefix('/') {
        Some(absolute) => absolute.to_string(),
        None => format!("xl/{}", target),
    }
}

/// `(name, relationship id)` for each sheet, in workbook order.
fn workbook_sheets(xml: &str) -> Result<Vec<(String, Option<String>)>, ExtractionError> {
    let mut reader = Reader::from_str(xml);
    let mut sheets = Vec::new();
    loop {
        match reader.read_event()? {
            Event::Start(e) | Event::Empty(e) if e.local_name().as_ref() == b"sheet" => {
                let name = attr(&e, b"name").unwrap_or_else(|| format!("Sheet{}", sheets.len() + 1));
                sheets.push((name, attr(&e, b"id")));
            }
            Event::Eof => break,
            _ => {}
        }
    }
    Ok(sheets)
}

fn relationship_targets(xml: &str) -> Result<HashMap<String, String>, ExtractionError> {
    let mut reader = Reader::from_str(xml);
    let mut targets = HashMap::new();
    loop {
        match reader.read_event()? {
            Event::Start(e) | Event::Empty(e) if e.local_name().as_ref() == b"Relationship" => {
                if let (Some(id), Some(target)) = (attr(&e, b"Id"), attr(&e, b"Target")) {
                    targets.insert(id, target);
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }
    Ok(targets)
}

fn shared_strings(xml: &str) -> Result<Vec<String>, ExtractionError> {
    let mut reader = Reader::from_str(xml);
    let mut strings = Vec::new();
    let mut current = String::new();
    let mut in_text = false;
    loop {
        match reader.read_event()? {
            Event::Start(e) => match e.local_name().as_ref() {
                b"si" => current.clear(),
                b"t" => in_text = true,
                _ => {}
            },
            Event::Text(t) if in_text => current.push_str(&t.unescape()?),
            Event::End(e) => match e.local_name().as_ref() {
                b"t" => in_text = false,
                b"si" => strings.push(std::mem::take(&mut current)),
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
    }
    Ok(strings)
}

#[derive(Default)]
struct Cell {
    kind: Option<String>,
    value: String,
}

impl Cell {
    fn render(&self, shared: &[String]) -> String {
        let value = match self.kind.as_deref() {
            Some("s") => self
                .value
                .trim()
                .parse::<usize>()
                .ok()
                .and_then(|i| shared.get(i).cloned())
                .unwrap_or_default(),
            Some("b") => match self.value.trim() {
                "1" => "TRUE".to_string(),
                "0" => "FALSE".to_string(),
                other => other.to_string(),
            },
            _ => self.value.clone(),
        };
        value.trim().to_string()
    }
}

/// Non-empty rows of one worksheet, cells in column order.
fn sheet_rows(xml: &str, shared: &[String]) -> Result<Vec<Vec<String>>, ExtractionError> {
    let mut reader = Reader::from_str(xml);
    let mut rows = Vec::new();
    let mut row: Vec<String> = Vec::new();
    let mut cell: Option<Cell> = None;
    let mut in_value = false;

    loop {
        match reader.read_event()? {
            Event::Start(e) => match e.local_name().as_ref() {
                b"row" => row.clear(),
                b"c" => {
                    cell = Some(Cell {
                        kind: attr(&e, b"t"),
                        value: String::new(),
                    })
                }
                b"v" | b"t" => in_value = true,
                _ => {}
            },
            Event::Text(t) if in_value => {
                if let Some(cell) = cell.as_mut() {
                    cell.value.push_str(&t.unescape()?);
                }
            }
            Event::End(e) => match e.local_name().as_ref() {
                b"v" | b"t" => in_value = false,
                b"c" => {
                    if let Some(cell) = cell.take() {
                        row.push(cell.render(shared));
                    }
                }
                b"row" => {
                    while row.last().is_some_and(|c| c.is_empty()) {
                        row.pop();
                    }
                    if !row.is_empty() {
                        rows.push(std::mem::take(&mut row));
                    }
                }
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
    }
    Ok(rows)
}
