//! Text extraction from retrieved documents.
//!
//! Supported formats:
//! - PDF, page by page with lopdf (pdftotext when the file will not parse)
//! - DOCX and XLSX by reading the Office Open XML parts directly
//! - legacy Word `.doc` through antiword (textutil on macOS)
//! - ZIP archives, one level deep
//! - HTML and plain text
//!
//! Extraction never fails: problems are reported as `ExtractionWarning`s
//! next to whatever text could be recovered.

mod archive;
mod html;
mod legacy;
mod office;
mod pdf;
mod text;

use std::ffi::OsStr;
use std::io::Write;
use std::process::Command;

use thiserror::Error;
use tracing::debug;

use crate::classify::{looks_like_html, looks_like_text, sniff_format};
use crate::models::{DocumentFormat, ExtractedText, ExtractionWarning};

pub use html::html_to_text;
pub use pdf::{extract_pages, PageSource};

/// Placeholder replaced by the temporary input path in tool arguments.
const INPUT: &str = "{input}";

/// Errors from a single extraction step. Converted into warnings before
/// they leave this module.
#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("Unsupported file type: {0}")]
    UnsupportedFileType(String),

    #[error("External tool not found: {0}")]
    ToolNotFound(String),

    #[error("Extraction failed: {0}")]
    ExtractionFailed(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Zip error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),
}

impl ExtractionError {
    /// Warning to attach to the result.
    pub fn into_warning(self) -> ExtractionWarning {
        match self {
            Self::ToolNotFound(tool) => ExtractionWarning::ToolUnavailable { tool },
            Self::UnsupportedFileType(detail) => ExtractionWarning::UnrecognizedFormat { detail },
            other => ExtractionWarning::ParseFailed {
                detail: other.to_string(),
            },
        }
    }
}

/// Handle command output, extracting stdout on success or returning appropriate error.
fn handle_cmd_output(
    result: std::io::Result<std::process::Output>,
    tool_name: &str,
) -> Result<String, ExtractionError> {
    match result {
        Ok(output) => {
            if output.status.success() {
                Ok(String::from_utf8_lossy(&output.stdout).to_string())
            } else {
                let stderr = String::from_utf8_lossy(&output.stderr);
                Err(ExtractionError::ExtractionFailed(format!(
                    "{} exited with {}: {}",
                    tool_name,
                    output.status,
                    stderr.trim()
                )))
            }
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(ExtractionError::ToolNotFound(tool_name.to_string()))
        }
        Err(e) => Err(ExtractionError::Io(e)),
    }
}

/// Run an external converter on `bytes` written to a temporary file.
/// The file is removed when this returns, whatever the outcome.
fn run_tool(
    tool: &str,
    args: &[&str],
    bytes: &[u8],
    suffix: &str,
) -> Result<String, ExtractionError> {
    let mut input = tempfile::Builder::new()
        .prefix("regacq-")
        .suffix(suffix)
        .tempfile()?;
    input.write_all(bytes)?;
    input.flush()?;

    let path = input.path().as_os_str();
    let args = args
        .iter()
        .map(|arg| if *arg == INPUT { path } else { OsStr::new(arg) });

    debug!("Running {} on {} bytes", tool, bytes.len());
    handle_cmd_output(Command::new(tool).args(args).output(), tool)
}

/// Format-aware text extractor.
#[derive(Debug, Clone, Copy)]
pub struct TextExtractor {
    /// How many levels of nested archives are expanded.
    max_archive_depth: u32,
    /// Archive members larger than this are skipped.
    max_entry_bytes: u64,
}

impl Default for TextExtractor {
    fn default() -> Self {
        Self {
            max_archive_depth: 1,
            max_entry_bytes: 256 * 1024 * 1024,
        }
    }
}

impl TextExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_entry_bytes(mut self, max: u64) -> Self {
        self.max_entry_bytes = max;
        self
    }

    /// Check which external extraction tools are on PATH.
    pub fn check_tools() -> Vec<(&'static str, bool)> {
        ["pdftotext", "antiword", "textutil"]
            .into_iter()
            .map(|tool| (tool, which::which(tool).is_ok()))
            .collect()
    }

    /// Extract text from `bytes`. A recognized byte signature wins over
    /// `hint`; the hint decides only between textual formats.
    pub fn extract(&self, bytes: &[u8], hint: Option<DocumentFormat>) -> ExtractedText {
        self.extract_at_depth(bytes, hint, 0)
    }

    fn extract_at_depth(&self, bytes: &[u8], hint: Option<DocumentFormat>, depth: u32) -> ExtractedText {
        let format = match resolve_format(bytes, hint) {
            Ok(format) => format,
            Err(detail) => return text::best_effort(bytes, detail),
        };
        debug!("Extracting {} bytes as {}", bytes.len(), format);

        match format {
            DocumentFormat::Pdf => pdf::extract(bytes),
            DocumentFormat::Docx => office::extract_docx(bytes),
            DocumentFormat::Xlsx => office::extract_xlsx(bytes),
            DocumentFormat::LegacyDoc => legacy::extract_doc(bytes),
            DocumentFormat::LegacyXls => legacy::extract_xls(bytes),
            DocumentFormat::Zip if depth < self.max_archive_depth => {
                archive::extract(self, bytes, depth)
            }
            DocumentFormat::Zip => {
                let mut out = ExtractedText::new(DocumentFormat::Zip);
                out.warn(ExtractionWarning::UnrecognizedFormat {
                    detail: "nested archive not expanded".to_string(),
                });
                out
            }
            DocumentFormat::Html => html::extract(bytes),
            DocumentFormat::PlainText => text::extract(bytes),
            DocumentFormat::Unknown => text::best_effort(bytes, "no known signature".to_string()),
        }
    }
}

/// Decide which parser runs. `Err` carries the reason for falling back
/// to a best-effort decode.
fn resolve_format(bytes: &[u8], hint: Option<DocumentFormat>) -> Result<DocumentFormat, String> {
    if let Some(format) = sniff_format(bytes) {
        if let Some(hint) = hint.filter(|h| *h != format) {
            debug!("Signature says {}, ignoring hint {}", format, hint);
        }
        return Ok(format);
    }

    match hint {
        Some(hint) if hint.is_binary_document() => Err(format!(
            "declared {} but the bytes carry no {} signature",
            hint, hint
        )),
        Some(DocumentFormat::Unknown) | None => {
            let head = String::from_utf8_lossy(&bytes[..bytes.len().min(4096)]);
            if looks_like_html(&head) {
                Ok(DocumentFormat::Html)
            } else if looks_like_text(bytes) {
                Ok(DocumentFormat::PlainText)
            } else {
                Ok(DocumentFormat::Unknown)
            }
        }
        Some(hint) => Ok(hint),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signature_overrides_hint() {
        assert_eq!(
            resolve_format(b"%PDF-1.4\n", Some(DocumentFormat::Html)),
            Ok(DocumentFormat::Pdf)
        );
    }

    #[test]
    fn test_binary_hint_without_signature() {
        let err = resolve_format(b"hello there", Some(DocumentFormat::Pdf)).unwrap_err();
        assert!(err.contains("pdf"));
    }

    #[test]
    fn test_guess_textual_formats() {
        assert_eq!(
            resolve_format(b"<!DOCTYPE html><html><body>x</body></html>", None),
            Ok(DocumentFormat::Html)
        );
        assert_eq!(
            resolve_format(b"Order instituting rulemaking", None),
            Ok(DocumentFormat::PlainText)
        );
        assert_eq!(
            resolve_format(&[0u8, 1, 2, 3, 0xff, 0xfe, 0, 0], None),
            Ok(DocumentFormat::Unknown)
        );
    }

    #[test]
    fn test_unknown_bytes_give_warning_not_error() {
        let out = TextExtractor::new().extract(&[0u8, 159, 146, 150, 0, 1, 2], None);
        assert_eq!(out.source_kind, Some(DocumentFormat::Unknown));
        assert!(out
            .warnings
            .iter()
            .any(|w| matches!(w, ExtractionWarning::UnrecognizedFormat { .. })));
        assert!(out.text.is_some());
    }

    #[test]
    fn test_plain_text() {
        let out = TextExtractor::new().extract(b"Decision 23-01-005\n", Some(DocumentFormat::PlainText));
        assert_eq!(out.text.as_deref(), Some("Decision 23-01-005"));
        assert!(out.warnings.is_empty());
    }

    #[test]
    fn test_missing_tool_maps_to_tool_unavailable() {
        let err = run_tool("regacq-no-such-converter", &[INPUT], b"x", ".bin").unwrap_err();
        assert!(matches!(
            err.into_warning(),
            ExtractionWarning::ToolUnavailable { ref tool } if tool == "regacq-no-such-converter"
        ));
    }
}
