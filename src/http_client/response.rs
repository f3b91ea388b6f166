//! Response header helpers.

use std::collections::HashMap;

use reqwest::header::HeaderMap;

/// Collect response headers into a map keyed by lowercased name.
///
/// Repeated headers are joined with `", "`.
pub fn collect_headers(headers: &HeaderMap) -> HashMap<String, String> {
    let mut map: HashMap<String, String> = HashMap::new();
    for (name, value) in headers {
        let Ok(value) = value.to_str() else {
            continue;
        };
        map.entry(name.as_str().to_ascii_lowercase())
            .and_modify(|existing| {
                existing.push_str(", ");
                existing.push_str(value);
            })
            .or_insert_with(|| value.to_string());
    }
    map
}

/// Parse filename from Content-Disposition header value.
/// Parses both `filename="name.pdf"` and `filename*=UTF-8''name.pdf` formats.
pub fn parse_content_disposition_filename(header: &str) -> Option<String> {
    // RFC 5987 encoded form wins when both are present
    if let Some(start) = header.find("filename*=") {
        let rest = &header[start + "filename*=".len()..];
        if let Some(charset_end) = rest.find("''") {
            let encoded = rest[charset_end + 2..].split([';', ' ']).next()?;
            if let Ok(decoded) = urlencoding::decode(encoded.trim_matches('"')) {
                let filename = decoded.trim().to_string();
                if !filename.is_empty() {
                    return Some(filename);
                }
            }
        }
    }

    let start = header.find("filename=")?;
    let rest = &header[start + "filename=".len()..];
    let name = match rest.strip_prefix('"') {
        Some(quoted) => quoted.split('"').next(),
        None => rest.split([';', ' ']).next(),
    }?;

    let name = name.trim();
    (!name.is_empty()).then(|| name.to_string())
}
