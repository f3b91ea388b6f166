//! Document formats and classified content.

use serde::{Deserialize, Serialize};

/// Document formats the pipeline knows how to recognize.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentFormat {
    Pdf,
    Docx,
    /// Pre-2007 binary Word document (OLE compound file).
    LegacyDoc,
    Xlsx,
    /// Pre-2007 binary Excel workbook (OLE compound file).
    LegacyXls,
    Zip,
    PlainText,
    Html,
    Unknown,
}

impl DocumentFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pdf => "pdf",
            Self::Docx => "docx",
            Self::LegacyDoc => "doc",
            Self::Xlsx => "xlsx",
            Self::LegacyXls => "xls",
            Self::Zip => "zip",
            Self::PlainText => "txt",
            Self::Html => "html",
            Self::Unknown => "unknown",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().trim_start_matches('.').to_lowercase().as_str() {
            "pdf" => Some(Self::Pdf),
            "docx" => Some(Self::Docx),
            "doc" => Some(Self::LegacyDoc),
            "xlsx" => Some(Self::Xlsx),
            "xls" => Some(Self::LegacyXls),
            "zip" => Some(Self::Zip),
            "txt" | "text" => Some(Self::PlainText),
            "html" | "htm" => Some(Self::Html),
            _ => None,
        }
    }

    /// True for formats that are served as binary document streams.
    pub fn is_binary_document(&self) -> bool {
        matches!(
            self,
            Self::Pdf | Self::Docx | Self::LegacyDoc | Self::Xlsx | Self::LegacyXls | Self::Zip
        )
    }
}

impl std::fmt::Display for DocumentFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Decision made by the classifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum ContentKind {
    /// Genuine content in the given format (an HTML page with no
    /// challenge markers counts as `Document(Html)`).
    Document(DocumentFormat),
    ChallengePage,
    ErrorPage,
    /// Viewer wrapper; the absolute URL of the embedded document.
    Redirectable(String),
}

/// Result of inspecting a response body. Re-derive on new bytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassifiedContent {
    /// Leading bytes of the body (at most 8).
    pub signature: Vec<u8>,
    pub declared_mime: Option<String>,
    pub kind: ContentKind,
}

impl ClassifiedContent {
    pub const SIGNATURE_LEN: usize = 8;

    pub fn new(bytes: &[u8], declared_mime: Option<String>, kind: ContentKind) -> Self {
        let len = bytes.len().min(Self::SIGNATURE_LEN);
        Self {
            signature: bytes[..len].to_vec(),
            declared_mime,
            kind,
        }
    }

    pub fn format(&self) -> Option<DocumentFormat> {
        match self.kind {
            ContentKind::Document(format) => Some(format),
            _ => None,
        }
    }

    pub fn is_binary_document(&self) -> bool {
        self.format().is_some_and(|f| f.is_binary_document())
    }

    pub fn is_challenge(&self) -> bool {
        self.kind == ContentKind::ChallengePage
    }
}
