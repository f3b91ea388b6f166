//! MIME type and file suffix helpers for document formats.

use url::Url;

use crate::models::DocumentFormat;

/// Strip parameters and lowercase a Content-Type value.
pub fn normalize_mime(content_type: &str) -> String {
    content_type
        .split(';')
        .next()
        .unwrap_or("")
        .trim()
        .to_lowercase()
}

/// Map a declared MIME type to a document format.
pub fn format_from_mime(content_type: &str) -> Option<DocumentFormat> {
    let mime = normalize_mime(content_type);
    let format = match mime.as_str() {
        "application/pdf" | "application/x-pdf" => DocumentFormat::Pdf,
        "application/msword" => DocumentFormat::LegacyDoc,
        "application/vnd.openxmlformats-officedocument.wordprocessingml.document" => {
            DocumentFormat::Docx
        }
        "application/vnd.ms-excel" => DocumentFormat::LegacyXls,
        "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet" => {
            DocumentFormat::Xlsx
        }
        "application/zip" | "application/x-zip" | "application/x-zip-compressed" => {
            DocumentFormat::Zip
        }
        "text/html" | "application/xhtml+xml" => DocumentFormat::Html,
        "text/plain" | "text/csv" => DocumentFormat::PlainText,
        _ => return None,
    };
    Some(format)
}

/// Canonical MIME type for a format.
pub fn mime_for_format(format: DocumentFormat) -> &'static str {
    match format {
        DocumentFormat::Pdf => "application/pdf",
        DocumentFormat::Docx => {
            "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
        }
        DocumentFormat::LegacyDoc => "application/msword",
        DocumentFormat::Xlsx => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        DocumentFormat::LegacyXls => "application/vnd.ms-excel",
        DocumentFormat::Zip => "application/zip",
        DocumentFormat::PlainText => "text/plain",
        DocumentFormat::Html => "text/html",
        DocumentFormat::Unknown => "application/octet-stream",
    }
}

/// True when a declared type strongly indicates a raw document stream.
pub fn is_document_stream_mime(content_type: &str) -> bool {
    let mime = normalize_mime(content_type);
    mime == "application/octet-stream"
        || format_from_mime(&mime).is_some_and(|f| f.is_binary_document())
}

/// Format implied by a filename suffix.
pub fn format_from_filename(name: &str) -> Option<DocumentFormat> {
    let (_, ext) = name.rsplit_once('.')?;
    DocumentFormat::from_str(ext)
}

/// Format implied by the last path segment of a URL.
pub fn format_from_url(url: &Url) -> Option<DocumentFormat> {
    let segment = url.path_segments()?.next_back()?;
    let decoded = urlencoding::decode(segment).ok()?;
    format_from_filename(&decoded)
}
