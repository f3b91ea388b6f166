//! Pre-2007 binary Office formats.
//!
//! Word documents go through an external converter: antiword, or
//! textutil where antiword is missing (macOS ships textutil).

use tracing::{debug, warn};

use super::text::{normalize, printable_runs};
use super::{run_tool, ExtractionError, INPUT};
use crate::models::{DocumentFormat, ExtractedText, ExtractionWarning};

pub fn extract_doc(bytes: &[u8]) -> ExtractedText {
    let mut out = ExtractedText::new(DocumentFormat::LegacyDoc);

    let result = match run_tool("antiword", &[INPUT], bytes, ".doc") {
        Err(ExtractionError::ToolNotFound(_)) => {
            debug!("antiword not installed, trying textutil");
            match run_tool("textutil", &["-convert", "txt", "-stdout", INPUT], bytes, ".doc") {
                // report the primary converter, not the platform fallback
                Err(ExtractionError::ToolNotFound(_)) => {
                    Err(ExtractionError::ToolNotFound("antiword".to_string()))
                }
                other => other,
            }
        }
        other => other,
    };

    match result {
        Ok(raw) => {
            let text = normalize(&raw);
            let paragraphs = text
                .split("\n\n")
                .filter(|block| !block.trim().is_empty())
                .count();
            out.paragraph_count = Some(paragraphs as u32);
            out.with_text(text)
        }
        Err(e) => {
            warn!("Legacy Word conversion failed: {}", e);
            out.warn(e.into_warning());
            out
        }
    }
}

/// Binary Excel workbooks have no converter here; keep whatever cell
/// strings are stored as plain bytes.
pub fn extract_xls(bytes: &[u8]) -> ExtractedText {
    let mut out = ExtractedText::new(DocumentFormat::LegacyXls);
    out.warn(ExtractionWarning::UnrecognizedFormat {
        detail: "legacy Excel workbook; text is a best-effort decode".to_string(),
    });
    out.with_text(printable_runs(bytes).join("\n"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_xls_is_best_effort() {
        let out = extract_xls(b"\xd0\xcf\x11\xe0\x00Rate Schedule\x00\x01");
        assert_eq!(out.text.as_deref(), Some("Rate Schedule"));
        assert!(matches!(
            out.warnings.as_slice(),
            [ExtractionWarning::UnrecognizedFormat { .. }]
        ));
    }

    #[test]
    fn test_doc_never_errors() {
        let out = extract_doc(b"\xd0\xcf\x11\xe0\xa1\xb1\x1a\xe1not a real document");
        assert_eq!(out.source_kind, Some(DocumentFormat::LegacyDoc));
        if which::which("antiword").is_err() && which::which("textutil").is_err() {
            assert!(out.has_tool_unavailable());
            assert!(out.text.is_none());
        }
    }
}
