//! Embedded document viewer resolution.

use std::sync::LazyLock;

use scraper::{Html, Selector};
use url::Url;

use crate::challenge::is_challenge_frame;
use crate::utils::format_from_url;

static FRAME_SELECTOR: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse("iframe[src], frame[src], embed[src], object[data]").expect("static selector")
});

static BODY_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("body").expect("static selector"));

/// Substrings in a frame source that suggest it serves a document.
const VIEWER_HINTS: &[&str] = &[
    "pdf",
    "viewer",
    "download",
    "getfile",
    "document",
    "filing",
    "attachment",
];

/// Pages with less visible text than this are treated as pure wrappers.
const WRAPPER_MAX_TEXT: usize = 500;

/// Find the embedded document URL in a viewer wrapper page.
///
/// Challenge widget frames are never returned. Relative sources need
/// `base`; without it only absolute sources resolve.
pub fn find_viewer_frame(html: &str, base: Option<&Url>) -> Option<Url> {
    let document = Html::parse_document(html);
    let wrapper = is_wrapper_page(&document);

    document
        .select(&FRAME_SELECTOR)
        .filter_map(|el| el.value().attr("src").or_else(|| el.value().attr("data")))
        .map(str::trim)
        .filter(|src| !src.is_empty() && !is_inert_source(src) && !is_challenge_frame(src))
        .filter_map(|src| resolve(src, base))
        .find(|url| wrapper || is_document_like(url))
}

fn resolve(src: &str, base: Option<&Url>) -> Option<Url> {
    let url = match base {
        Some(base) => base.join(src).ok()?,
        None => Url::parse(src).ok()?,
    };
    matches!(url.scheme(), "http" | "https").then_some(url)
}

fn is_inert_source(src: &str) -> bool {
    let lower = src.to_ascii_lowercase();
    lower.starts_with("about:") || lower.starts_with("javascript:") || lower.starts_with("data:")
}

fn is_document_like(url: &Url) -> bool {
    if format_from_url(url).is_some_and(|f| f.is_binary_document()) {
        return true;
    }
    let lower = url.as_str().to_ascii_lowercase();
    VIEWER_HINTS.iter().any(|hint| lower.contains(hint))
}

fn is_wrapper_page(document: &Html) -> bool {
    document
        .select(&BODY_SELECTOR)
        .next()
        .map(|body| body.text().map(str::trim).collect::<String>().len() < WRAPPER_MAX_TEXT)
        .unwrap_or(true)
}
