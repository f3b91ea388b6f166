//! Content classification from bytes, headers and URL.
//!
//! Decision priority, least ambiguous first:
//! 1. binary magic bytes (override any declared type)
//! 2. HTML markup, then split into challenge, error, viewer wrapper or page
//! 3. filename suffix from `Content-Disposition` or the URL
//! 4. declared `Content-Type`, then a plain-text check

mod markers;
mod signature;
mod viewer;

use std::collections::HashMap;

use tracing::debug;
use url::Url;

use crate::challenge::detect_site_key;
use crate::http_client::parse_content_disposition_filename;
use crate::models::{ClassifiedContent, ContentKind, DocumentFormat};
use crate::utils::{format_from_filename, format_from_mime, format_from_url, normalize_mime};

pub use markers::{has_challenge_marker, is_error_page, looks_like_html};
pub use signature::{bytes_look_like_pdf, looks_like_text, sniff_format};
pub use viewer::find_viewer_frame;

/// Case-insensitive header lookup.
pub fn header<'a>(headers: &'a HashMap<String, String>, name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(key, _)| key.eq_ignore_ascii_case(name))
        .map(|(_, value)| value.as_str())
}

/// Classify a response body.
pub fn classify(
    bytes: &[u8],
    headers: &HashMap<String, String>,
    url_hint: Option<&Url>,
) -> ClassifiedContent {
    let declared_mime = header(headers, "content-type").map(normalize_mime);
    let kind = decide(bytes, headers, declared_mime.as_deref(), url_hint);
    debug!(
        "Classified {} bytes (declared {:?}) as {:?}",
        bytes.len(),
        declared_mime,
        kind
    );
    ClassifiedContent::new(bytes, declared_mime, kind)
}

fn decide(
    bytes: &[u8],
    headers: &HashMap<String, String>,
    declared_mime: Option<&str>,
    url_hint: Option<&Url>,
) -> ContentKind {
    if let Some(format) = sniff_format(bytes) {
        return ContentKind::Document(format);
    }

    if bytes.iter().all(|b| b.is_ascii_whitespace()) {
        return ContentKind::ErrorPage;
    }

    let text = String::from_utf8_lossy(bytes);
    let declared_html = declared_mime.and_then(format_from_mime) == Some(DocumentFormat::Html);
    if looks_like_html(&text) || (declared_html && !looks_like_text_document(&text)) {
        return classify_html(&text, url_hint);
    }

    let disposition_format = header(headers, "content-disposition")
        .and_then(parse_content_disposition_filename)
        .and_then(|name| format_from_filename(&name));
    if let Some(format) = disposition_format.or_else(|| url_hint.and_then(format_from_url)) {
        return ContentKind::Document(format);
    }

    if let Some(format) = declared_mime.and_then(format_from_mime) {
        return ContentKind::Document(format);
    }

    if looks_like_text(bytes) {
        ContentKind::Document(DocumentFormat::PlainText)
    } else {
        ContentKind::Document(DocumentFormat::Unknown)
    }
}

/// Declared-HTML bodies with no markup are only treated as pages when
/// they are short; long markup-free bodies are text documents.
fn looks_like_text_document(text: &str) -> bool {
    text.len() > 4096
}

fn classify_html(html: &str, url_hint: Option<&Url>) -> ContentKind {
    if has_challenge_marker(html) || detect_site_key(html).is_some() {
        return ContentKind::ChallengePage;
    }
    if is_error_page(html) {
        return ContentKind::ErrorPage;
    }
    if let Some(embedded) = find_viewer_frame(html, url_hint) {
        return ContentKind::Redirectable(embedded.to_string());
    }
    ContentKind::Document(DocumentFormat::Html)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_pdf_magic_beats_html_header() {
        let classified = classify(
            b"%PDF-1.5\n%\xE2\xE3\xCF\xD3\n1 0 obj",
            &headers(&[("Content-Type", "text/html; charset=utf-8")]),
            None,
        );
        assert_eq!(classified.kind, ContentKind::Document(DocumentFormat::Pdf));
        assert_eq!(classified.declared_mime.as_deref(), Some("text/html"));
        assert_eq!(classified.signature, b"%PDF-1.5");
    }

    #[test]
    fn test_challenge_page() {
        let html = br#"<!DOCTYPE html><html><head><title>Just a moment...</title></head><body><div class="cf-turnstile" data-sitekey="0x4AAA"></div></body></html>"#;
        let classified = classify(html, &headers(&[("content-type", "text/html")]), None);
        assert_eq!(classified.kind, ContentKind::ChallengePage);
    }

    #[test]
    fn test_long_page_mentioning_challenge_phrases_is_html() {
        let prose = "<p>Passengers must pass a security check before boarding.</p>".repeat(50);
        let html = format!(
            "<html><head><title>Decision 24-11-002</title></head><body>{}<p>Just a moment of history.</p></body></html>",
            prose
        );
        let classified = classify(html.as_bytes(), &headers(&[("content-type", "text/html")]), None);
        assert_eq!(classified.kind, ContentKind::Document(DocumentFormat::Html));
    }

    #[test]
    fn test_error_page() {
        let html = b"<html><head><title>404 Not Found</title></head><body></body></html>";
        let classified = classify(html, &HashMap::new(), None);
        assert_eq!(classified.kind, ContentKind::ErrorPage);
    }

    #[test]
    fn test_viewer_wrapper_redirectable() {
        let url = Url::parse("https://edocket.example.gov/view/123").unwrap();
        let html = b"<html><body><iframe src=\"/files/123.pdf\"></iframe></body></html>";
        let classified = classify(html, &HashMap::new(), Some(&url));
        assert_eq!(
            classified.kind,
            ContentKind::Redirectable("https://edocket.example.gov/files/123.pdf".into())
        );
    }

    #[test]
    fn test_plain_html_document() {
        let html = b"<html><body><h1>Docket 21-450</h1><p>Filings list</p></body></html>";
        let classified = classify(html, &HashMap::new(), None);
        assert_eq!(classified.kind, ContentKind::Document(DocumentFormat::Html));
    }

    #[test]
    fn test_url_suffix_fallback() {
        let url = Url::parse("https://portal.example.gov/data/rates.csv.txt").unwrap();
        let classified = classify(b"rate,value\n1,2\n", &HashMap::new(), Some(&url));
        assert_eq!(
            classified.kind,
            ContentKind::Document(DocumentFormat::PlainText)
        );
    }

    #[test]
    fn test_content_disposition_hint() {
        let classified = classify(
            b"Plain body text",
            &headers(&[("Content-Disposition", "attachment; filename=\"notes.txt\"")]),
            None,
        );
        assert_eq!(
            classified.kind,
            ContentKind::Document(DocumentFormat::PlainText)
        );
    }

    #[test]
    fn test_empty_body_is_error() {
        let classified = classify(b"  \n", &headers(&[("content-type", "application/pdf")]), None);
        assert_eq!(classified.kind, ContentKind::ErrorPage);
    }

    #[test]
    fn test_reclassify_is_pure() {
        let body = b"<html><body>Security check</body></html>";
        let a = classify(body, &HashMap::new(), None);
        let b = classify(body, &HashMap::new(), None);
        assert_eq!(a, b);
    }
}
