//! A retrieved document together with its extracted text.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::content::DocumentFormat;
use super::extracted::ExtractedText;
use crate::utils::mime_for_format;

/// Final product of one acquisition. Content is identified by SHA-256 so
/// callers can detect when a portal republishes the same filing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AcquiredDocument {
    /// URL the caller asked for.
    pub url: String,
    pub format: DocumentFormat,
    pub mime_type: String,
    /// SHA-256 of the raw bytes, hex encoded.
    pub content_hash: String,
    pub size: u64,
    pub acquired_at: DateTime<Utc>,
    pub extracted: ExtractedText,
    /// Raw payload; rendered HTML is stored as UTF-8.
    #[serde(skip)]
    pub content: Vec<u8>,
}

impl AcquiredDocument {
    pub fn compute_hash(content: &[u8]) -> String {
        let mut hasher = Sha256::new();
        hasher.update(content);
        hex::encode(hasher.finalize())
    }

    pub fn new(url: impl Into<String>, format: DocumentFormat, content: Vec<u8>, extracted: ExtractedText) -> Self {
        Self {
            url: url.into(),
            format,
            mime_type: mime_for_format(format).to_string(),
            content_hash: Self::compute_hash(&content),
            size: content.len() as u64,
            acquired_at: Utc::now(),
            extracted,
            content,
        }
    }

    pub fn is_html(&self) -> bool {
        self.format == DocumentFormat::Html
    }
}
