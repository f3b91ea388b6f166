//! Challenge widget detection in rendered markup.
//!
//! Three embedding patterns are checked, in order:
//! 1. a challenge iframe carrying the site key as a `sitekey` query parameter
//! 2. a hidden form field whose value is the site key
//! 3. a container element with a `data-sitekey` attribute

use std::sync::LazyLock;

use scraper::{Html, Selector};
use url::Url;

static IFRAME_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("iframe[src]").expect("static selector"));

static HIDDEN_FIELD_SELECTOR: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse(r#"input[name="cf-turnstile-sitekey"], input[name="sitekey"]"#)
        .expect("static selector")
});

static DATA_ATTR_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("[data-sitekey]").expect("static selector"));

/// Relative iframe sources are resolved against this so query parsing works.
const PLACEHOLDER_BASE: &str = "https://challenge.invalid/";

/// Query parameter names that carry a site key in widget iframe URLs.
const SITEKEY_PARAMS: &[&str] = &["sitekey", "k"];

/// Find the challenge site key in `markup`, or `None` if the page is not gated.
///
/// Returns the first match only.
pub fn detect_site_key(markup: &str) -> Option<String> {
    let document = Html::parse_document(markup);

    site_key_from_iframe(&document)
        .or_else(|| site_key_from_hidden_field(&document))
        .or_else(|| site_key_from_data_attribute(&document))
}

fn site_key_from_iframe(document: &Html) -> Option<String> {
    let base = Url::parse(PLACEHOLDER_BASE).ok()?;

    document
        .select(&IFRAME_SELECTOR)
        .filter_map(|frame| frame.value().attr("src"))
        .filter(|src| src.contains("sitekey=") || is_challenge_frame(src))
        .filter_map(|src| base.join(src.trim()).ok())
        .find_map(|url| {
            url.query_pairs()
                .find(|(name, _)| SITEKEY_PARAMS.contains(&name.as_ref()))
                .map(|(_, value)| value.trim().to_string())
                .filter(|value| !value.is_empty())
        })
}

fn site_key_from_hidden_field(document: &Html) -> Option<String> {
    document
        .select(&HIDDEN_FIELD_SELECTOR)
        .filter_map(|input| input.value().attr("value"))
        .map(str::trim)
        .find(|value| !value.is_empty())
        .map(String::from)
}

fn site_key_from_data_attribute(document: &Html) -> Option<String> {
    document
        .select(&DATA_ATTR_SELECTOR)
        .filter_map(|el| el.value().attr("data-sitekey"))
        .map(str::trim)
        .find(|value| !value.is_empty())
        .map(String::from)
}

/// Iframe sources served by known challenge providers.
pub fn is_challenge_frame(src: &str) -> bool {
    let src = src.to_ascii_lowercase();
    src.contains("challenges.cloudflare.com")
        || src.contains("/cdn-cgi/challenge-platform")
        || src.contains("hcaptcha.com")
        || src.contains("google.com/recaptcha")
}
