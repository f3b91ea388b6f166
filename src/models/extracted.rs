//! Extracted text and non-fatal extraction warnings.

use serde::{Deserialize, Serialize};

use super::content::DocumentFormat;

/// Something that went wrong during extraction without aborting it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ExtractionWarning {
    /// One page could not be read; the rest of the document was.
    PageFailed { page: u32, detail: String },
    /// No parser recognized the bytes; text is a best-effort decode.
    UnrecognizedFormat { detail: String },
    /// An external conversion utility is not installed on this host.
    ToolUnavailable { tool: String },
    /// The parser failed on the whole input.
    ParseFailed { detail: String },
    /// The parser ran but produced no text.
    EmptyText { detail: String },
    /// Warning raised while extracting one member of an archive.
    ArchiveEntry {
        entry: String,
        warning: Box<ExtractionWarning>,
    },
}

impl std::fmt::Display for ExtractionWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::PageFailed { page, detail } => write!(f, "page {} failed: {}", page, detail),
            Self::UnrecognizedFormat { detail } => write!(f, "unrecognized format: {}", detail),
            Self::ToolUnavailable { tool } => write!(f, "extraction tool unavailable: {}", tool),
            Self::ParseFailed { detail } => write!(f, "parse failed: {}", detail),
            Self::EmptyText { detail } => write!(f, "no text extracted: {}", detail),
            Self::ArchiveEntry { entry, warning } => write!(f, "{}: {}", entry, warning),
        }
    }
}

/// Normalized text produced from a document.
///
/// `text == Some("")` means the parser ran and found nothing; `None`
/// means no parser ran for this type.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractedText {
    pub source_kind: Option<DocumentFormat>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_count: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sheet_count: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub paragraph_count: Option<u32>,
    pub text: Option<String>,
    #[serde(default)]
    pub warnings: Vec<ExtractionWarning>,
}

impl ExtractedText {
    pub fn new(source_kind: DocumentFormat) -> Self {
        Self {
            source_kind: Some(source_kind),
            ..Default::default()
        }
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn warn(&mut self, warning: ExtractionWarning) {
        self.warnings.push(warning);
    }

    pub fn text_len(&self) -> usize {
        self.text.as_ref().map(|t| t.len()).unwrap_or(0)
    }

    pub fn has_tool_unavailable(&self) -> bool {
        self.warnings
            .iter()
            .any(|w| matches!(w, ExtractionWarning::ToolUnavailable { .. }))
    }
}
