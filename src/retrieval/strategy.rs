//! Strategy ordering rules.

use std::collections::HashMap;

use url::Url;

use super::transport::WaitUntil;
use crate::classify::header;
use crate::http_client::parse_content_disposition_filename;
use crate::utils::{format_from_filename, format_from_url, is_document_stream_mime};

/// Navigation strategies, most lenient first.
pub const NAVIGATION_ORDER: [WaitUntil; 3] =
    [WaitUntil::Commit, WaitUntil::DomContentLoaded, WaitUntil::Load];

/// URL suffix names a binary document (`.pdf`, `.docx`, ...).
pub fn is_document_url(url: &Url) -> bool {
    format_from_url(url).is_some_and(|f| f.is_binary_document())
}

/// Response headers announce a document stream rather than a page.
pub fn is_document_response(headers: &HashMap<String, String>) -> bool {
    if header(headers, "content-type").is_some_and(is_document_stream_mime) {
        return true;
    }
    header(headers, "content-disposition")
        .and_then(parse_content_disposition_filename)
        .and_then(|name| format_from_filename(&name))
        .is_some_and(|f| f.is_binary_document())
}

/// Interstitial URLs that should never be requested directly.
pub fn is_challenge_url(url: &Url) -> bool {
    let s = url.as_str().to_ascii_lowercase();
    s.contains("/cdn-cgi/") || s.contains("__cf_chl") || s.contains("challenges.cloudflare.com")
}

/// URLs to try with the direct transport: the target first, then the
/// page's current URL when it is different and not an interstitial.
pub fn direct_candidates(target: &Url, current: Option<&Url>) -> Vec<Url> {
    let mut candidates = vec![target.clone()];
    if let Some(current) = current {
        let usable = matches!(current.scheme(), "http" | "https") && !is_challenge_url(current);
        if usable && current != target {
            candidates.push(current.clone());
        }
    }
    candidates
}
