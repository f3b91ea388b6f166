//! Textual markers for HTML, challenge pages and error pages.

use std::sync::LazyLock;

use scraper::{Html, Selector};

/// Phrases shown on bot-challenge interstitials.
pub const CHALLENGE_MARKERS: &[&str] = &[
    "verify your browser",
    "checking your browser",
    "just a moment",
    "security check",
    "attention required",
    "enable javascript and cookies to continue",
];

/// Hosts and class names that only appear in challenge markup.
pub const CHALLENGE_MARKUP: &[&str] = &["challenges.cloudflare.com", "cf-turnstile", "cf-challenge"];

/// Phrases that mark a server or gateway error page.
pub const ERROR_MARKERS: &[&str] = &[
    "access denied",
    "403 forbidden",
    "404 not found",
    "page not found",
    "file not found",
    "internal server error",
    "service unavailable",
    "502 bad gateway",
    "504 gateway time-out",
    "the requested url was rejected",
    "request blocked",
];

/// Markup roots and script markers that identify an HTML body.
const HTML_MARKERS: &[&str] = &[
    "<!doctype html",
    "<html",
    "<head",
    "<body",
    "<script",
    "<iframe",
    "<meta",
];

/// Challenge and error phrases in body text only count on pages this
/// short; longer pages are real content that happens to mention them.
const PAGE_MARKER_MAX_TEXT: usize = 2000;

static TITLE_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("title, h1").expect("static selector"));

static BODY_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("body").expect("static selector"));

/// True when decoded text looks like HTML markup.
pub fn looks_like_html(text: &str) -> bool {
    let head: String = text.chars().take(2048).collect::<String>().to_lowercase();
    HTML_MARKERS.iter().any(|marker| head.contains(marker))
}

/// Title and top heading text, and the trimmed body text.
struct PageText {
    heading: String,
    body: String,
}

impl PageText {
    fn parse(html: &str) -> Self {
        let document = Html::parse_document(html);
        let heading = document
            .select(&TITLE_SELECTOR)
            .map(|el| el.text().collect::<String>())
            .collect::<Vec<_>>()
            .join(" ")
            .to_lowercase();
        let body = document
            .select(&BODY_SELECTOR)
            .next()
            .map(|body| body.text().collect::<Vec<_>>().join(" "))
            .unwrap_or_default();
        Self {
            heading,
            body: body.trim().to_lowercase(),
        }
    }

    /// Phrase appears in the heading, or anywhere in a short body.
    fn mentions(&self, phrases: &[&str]) -> bool {
        phrases.iter().any(|phrase| self.heading.contains(phrase))
            || (self.body.len() <= PAGE_MARKER_MAX_TEXT
                && phrases.iter().any(|phrase| self.body.contains(phrase)))
    }
}

/// True when the page looks like a bot-challenge interstitial.
///
/// Challenge markup anywhere counts. Challenge phrases count in the
/// title and top heading, and in the body text when the page is short.
pub fn has_challenge_marker(html: &str) -> bool {
    let lower = html.to_lowercase();
    if CHALLENGE_MARKUP.iter().any(|marker| lower.contains(marker)) {
        return true;
    }
    PageText::parse(html).mentions(CHALLENGE_MARKERS)
}

/// True when the page is a server or gateway error page.
///
/// Markers are checked in the title and top heading, and in the body
/// text when the page is short.
pub fn is_error_page(html: &str) -> bool {
    PageText::parse(html).mentions(ERROR_MARKERS)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_looks_like_html() {
        assert!(looks_like_html("  <!DOCTYPE HTML><html><body></body></html>"));
        assert!(looks_like_html("<script>window.location='/x'</script>"));
        assert!(!looks_like_html("Docket No. 21-450\nComments"));
    }

    #[test]
    fn test_challenge_markers() {
        assert!(has_challenge_marker(
            "<html><title>Just a moment...</title></html>"
        ));
        assert!(has_challenge_marker(r#"<div class="cf-turnstile"></div>"#));
        assert!(!has_challenge_marker("<html><body>Filing list</body></html>"));
    }

    #[test]
    fn test_short_interstitial_body_is_challenge() {
        assert!(has_challenge_marker(
            "<html><body><p>Checking your browser before accessing the docket.</p></body></html>"
        ));
    }

    #[test]
    fn test_long_content_mentioning_security_check_is_not_challenge() {
        let filler = "Passengers must clear a security check before boarding. ".repeat(60);
        let html = format!(
            "<html><head><title>Decision 24-11-002</title></head><body><h1>Decision 24-11-002</h1><p>{}</p><p>Attention required: comments are due Friday.</p></body></html>",
            filler
        );
        assert!(!has_challenge_marker(&html));
    }

    #[test]
    fn test_error_page_by_title() {
        assert!(is_error_page(
            "<html><head><title>403 Forbidden</title></head><body>nginx</body></html>"
        ));
    }

    #[test]
    fn test_error_page_short_body() {
        assert!(is_error_page(
            "<html><body><p>The requested URL was rejected. Please consult with your administrator.</p></body></html>"
        ));
    }

    #[test]
    fn test_long_content_mentioning_error_is_not_error_page() {
        let filler = "The commission reviewed the record in detail. ".repeat(80);
        let html = format!(
            "<html><head><title>Order 24-117</title></head><body><p>{}</p><p>Page not found errors were reported by commenters.</p></body></html>",
            filler
        );
        assert!(!is_error_page(&html));
    }
}
