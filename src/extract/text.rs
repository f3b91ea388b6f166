//! Plain text and best-effort decoding.

use crate::classify::looks_like_text;
use crate::models::{DocumentFormat, ExtractedText, ExtractionWarning};

/// Shortest run of printable bytes kept when scavenging binary data.
const MIN_RUN: usize = 4;

/// Decode bytes as UTF-8, dropping a BOM and replacing invalid sequences.
pub fn decode(bytes: &[u8]) -> String {
    let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
    String::from_utf8_lossy(bytes).into_owned()
}

/// Normalize line endings and trim trailing whitespace on every line.
pub fn normalize(text: &str) -> String {
    text.replace("\r\n", "\n")
        .replace('\r', "\n")
        .lines()
        .map(str::trim_end)
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}

pub fn extract(bytes: &[u8]) -> ExtractedText {
    ExtractedText::new(DocumentFormat::PlainText).with_text(normalize(&decode(bytes)))
}

/// Recover whatever text can be found in bytes no parser accepted.
pub fn best_effort(bytes: &[u8], detail: String) -> ExtractedText {
    let mut out = ExtractedText::new(DocumentFormat::Unknown);
    out.warn(ExtractionWarning::UnrecognizedFormat { detail });

    let text = if looks_like_text(bytes) {
        normalize(&decode(bytes))
    } else {
        printable_runs(bytes).join("\n")
    };
    out.with_text(text)
}

/// Runs of printable ASCII at least `MIN_RUN` bytes long.
pub fn printable_runs(bytes: &[u8]) -> Vec<String> {
    bytes
        .split(|b| !(b.is_ascii_graphic() || *b == b' ' || *b == b'\t'))
        .filter(|run| run.len() >= MIN_RUN)
        .map(|run| String::from_utf8_lossy(run).trim().to_string())
        .filter(|run| !run.is_empty())
        .collect()
}
