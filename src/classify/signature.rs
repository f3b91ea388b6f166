//! Magic-byte sniffing.

use std::io::Cursor;

use zip::ZipArchive;

use crate::models::DocumentFormat;
use crate::utils::format_from_mime;

const PDF_MAGIC: &[u8] = b"%PDF";
const OLE_MAGIC: &[u8] = &[0xD0, 0xCF, 0x11, 0xE0, 0xA1, 0xB1, 0x1A, 0xE1];
const ZIP_MAGIC: &[u8] = b"PK\x03\x04";
const ZIP_EMPTY_MAGIC: &[u8] = b"PK\x05\x06";

/// PDF readers accept a header anywhere in the first kilobyte.
const PDF_HEADER_WINDOW: usize = 1024;

/// Identify a binary document from its leading bytes.
///
/// Returns `None` for anything that is not a known binary signature,
/// including HTML and plain text.
pub fn sniff_format(bytes: &[u8]) -> Option<DocumentFormat> {
    let trimmed = trim_leading_whitespace(bytes);

    if trimmed.starts_with(PDF_MAGIC) || has_pdf_header(bytes) {
        return Some(DocumentFormat::Pdf);
    }
    if bytes.starts_with(OLE_MAGIC) {
        return Some(ole_format(bytes));
    }
    if bytes.starts_with(ZIP_MAGIC) || bytes.starts_with(ZIP_EMPTY_MAGIC) {
        return Some(zip_format(bytes));
    }

    infer::get(bytes)
        .and_then(|kind| format_from_mime(kind.mime_type()))
        .filter(|format| format.is_binary_document())
}

/// True when `bytes` starts with the PDF signature, ignoring leading whitespace.
pub fn bytes_look_like_pdf(bytes: &[u8]) -> bool {
    sniff_format(bytes) == Some(DocumentFormat::Pdf)
}

fn trim_leading_whitespace(bytes: &[u8]) -> &[u8] {
    let start = bytes
        .iter()
        .position(|b| !b.is_ascii_whitespace())
        .unwrap_or(bytes.len());
    &bytes[start..]
}

fn has_pdf_header(bytes: &[u8]) -> bool {
    let window = &bytes[..bytes.len().min(PDF_HEADER_WINDOW)];
    window.windows(5).any(|w| w == b"%PDF-")
}

/// Distinguish Word from Excel inside an OLE compound file by the
/// UTF-16 stream names in its directory.
fn ole_format(bytes: &[u8]) -> DocumentFormat {
    if contains_utf16(bytes, "WordDocument") {
        DocumentFormat::LegacyDoc
    } else if contains_utf16(bytes, "Workbook") || contains_utf16(bytes, "Book") {
        DocumentFormat::LegacyXls
    } else {
        DocumentFormat::LegacyDoc
    }
}

fn contains_utf16(haystack: &[u8], needle: &str) -> bool {
    let encoded: Vec<u8> = needle.encode_utf16().flat_map(|u| u.to_le_bytes()).collect();
    haystack.windows(encoded.len()).any(|w| w == encoded.as_slice())
}

/// Office Open XML files are ZIP containers with a known part layout.
fn zip_format(bytes: &[u8]) -> DocumentFormat {
    let Ok(archive) = ZipArchive::new(Cursor::new(bytes)) else {
        return DocumentFormat::Zip;
    };

    let format = archive
        .file_names()
        .find_map(|name| match name {
            "word/document.xml" => Some(DocumentFormat::Docx),
            "xl/workbook.xml" => Some(DocumentFormat::Xlsx),
            _ => None,
        })
        .unwrap_or(DocumentFormat::Zip);
    format
}

/// Heuristic check that bytes are human-readable text.
pub fn looks_like_text(bytes: &[u8]) -> bool {
    if bytes.is_empty() {
        return false;
    }
    let sample = &bytes[..bytes.len().min(4096)];
    if sample.contains(&0) {
        return false;
    }
    let text = String::from_utf8_lossy(sample);
    let total = text.chars().count();
    let suspicious = text
        .chars()
        .filter(|c| *c == '\u{FFFD}' || (c.is_control() && !c.is_whitespace()))
        .count();
    suspicious * 10 < total
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn zip_with(entries: &[&str]) -> Vec<u8> {
        let mut buf = Cursor::new(Vec::new());
        {
            let mut writer = zip::ZipWriter::new(&mut buf);
            let options = zip::write::SimpleFileOptions::default();
            for name in entries {
                writer.start_file(*name, options).unwrap();
                writer.write_all(b"<x/>").unwrap();
            }
            writer.finish().unwrap();
        }
        buf.into_inner()
    }

    #[test]
    fn test_pdf_with_leading_whitespace() {
        assert_eq!(sniff_format(b"\r\n  %PDF-1.4\n..."), Some(DocumentFormat::Pdf));
    }

    #[test]
    fn test_pdf_header_after_junk() {
        let mut body = b"garbage prefix ".to_vec();
        body.extend_from_slice(b"%PDF-1.7\n");
        assert!(bytes_look_like_pdf(&body));
    }

    #[test]
    fn test_ole_word() {
        let mut body = OLE_MAGIC.to_vec();
        body.extend(vec![0u8; 64]);
        body.extend("WordDocument".encode_utf16().flat_map(|u| u.to_le_bytes()));
        assert_eq!(sniff_format(&body), Some(DocumentFormat::LegacyDoc));
    }

    #[test]
    fn test_ole_excel() {
        let mut body = OLE_MAGIC.to_vec();
        body.extend(vec![0u8; 64]);
        body.extend("Workbook".encode_utf16().flat_map(|u| u.to_le_bytes()));
        assert_eq!(sniff_format(&body), Some(DocumentFormat::LegacyXls));
    }

    #[test]
    fn test_zip_containers() {
        assert_eq!(
            sniff_format(&zip_with(&["[Content_Types].xml", "word/document.xml"])),
            Some(DocumentFormat::Docx)
        );
        assert_eq!(
            sniff_format(&zip_with(&["xl/workbook.xml", "xl/worksheets/sheet1.xml"])),
            Some(DocumentFormat::Xlsx)
        );
        assert_eq!(
            sniff_format(&zip_with(&["filing.pdf"])),
            Some(DocumentFormat::Zip)
        );
    }

    #[test]
    fn test_html_is_not_binary() {
        assert_eq!(sniff_format(b"<!DOCTYPE html><html></html>"), None);
        assert_eq!(sniff_format(b"plain words"), None);
    }

    #[test]
    fn test_looks_like_text() {
        assert!(looks_like_text("Comments of the Utility Reform Network\n".as_bytes()));
        assert!(!looks_like_text(&[0x00, 0x01, 0x02, 0xFF]));
        assert!(!looks_like_text(b""));
    }
}
