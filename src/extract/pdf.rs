//! PDF text extraction, one page at a time.

use std::panic::{catch_unwind, AssertUnwindSafe};

use tracing::{debug, warn};

use super::{run_tool, ExtractionError, INPUT};
use crate::models::{DocumentFormat, ExtractedText, ExtractionWarning};

/// Pages of a parsed PDF.
pub trait PageSource {
    /// 1-based page numbers in document order.
    fn page_numbers(&self) -> Vec<u32>;

    fn page_text(&self, page: u32) -> Result<String, String>;
}

struct LopdfPages(lopdf::Document);

impl PageSource for LopdfPages {
    fn page_numbers(&self) -> Vec<u32> {
        self.0.get_pages().keys().copied().collect()
    }

    fn page_text(&self, page: u32) -> Result<String, String> {
        self.0.extract_text(&[page]).map_err(|e| e.to_string())
    }
}

pub fn extract(bytes: &[u8]) -> ExtractedText {
    extract_loaded(bytes, |bytes| {
        lopdf::Document::load_mem(bytes)
            .map(|doc| Box::new(LopdfPages(doc)) as Box<dyn PageSource>)
            .map_err(|e| e.to_string())
    })
}

/// Parse with `load`, falling back to pdftotext when it fails or panics.
fn extract_loaded<F>(bytes: &[u8], load: F) -> ExtractedText
where
    F: FnOnce(&[u8]) -> Result<Box<dyn PageSource>, String>,
{
    let detail = match catch_unwind(AssertUnwindSafe(|| load(bytes))) {
        Ok(Ok(source)) => return extract_pages(source.as_ref()),
        Ok(Err(detail)) => detail,
        Err(_) => "PDF parser panicked".to_string(),
    };
    warn!("PDF did not parse ({}), trying pdftotext", detail);
    extract_with_pdftotext(bytes, detail)
}

/// Extract every page, skipping the ones that fail.
pub fn extract_pages(source: &dyn PageSource) -> ExtractedText {
    let pages = source.page_numbers();
    let mut out = ExtractedText::new(DocumentFormat::Pdf);
    out.page_count = Some(pages.len() as u32);

    let mut texts = Vec::with_capacity(pages.len());
    for page in &pages {
        match catch_unwind(AssertUnwindSafe(|| source.page_text(*page))) {
            Ok(Ok(text)) => {
                let text = text.trim();
                if !text.is_empty() {
                    texts.push(text.to_string());
                }
            }
            Ok(Err(detail)) => {
                debug!("Page {} failed: {}", page, detail);
                out.warn(ExtractionWarning::PageFailed {
                    page: *page,
                    detail,
                });
            }
            Err(_) => {
                debug!("Page {} panicked in the parser", page);
                out.warn(ExtractionWarning::PageFailed {
                    page: *page,
                    detail: "parser panicked".to_string(),
                });
            }
        }
    }

    let text = texts.join("\n\n");
    if text.is_empty() {
        let detail = if pages.is_empty() {
            "PDF has no pages".to_string()
        } else {
            "PDF may be image-based or encrypted".to_string()
        };
        out.warn(ExtractionWarning::EmptyText { detail });
    }
    out.with_text(text)
}

/// Whole-document fallback through poppler's pdftotext.
fn extract_with_pdftotext(bytes: &[u8], parse_error: String) -> ExtractedText {
    let mut out = ExtractedText::new(DocumentFormat::Pdf);

    match run_tool("pdftotext", &["-layout", "-enc", "UTF-8", INPUT, "-"], bytes, ".pdf") {
        Ok(raw) => {
            // pdftotext ends every page with a form feed
            let pages = raw.matches('\x0c').count() as u32;
            if pages > 0 {
                out.page_count = Some(pages);
            }
            let text = raw
                .split('\x0c')
                .map(str::trim)
                .filter(|page| !page.is_empty())
                .collect::<Vec<_>>()
                .join("\n\n");
            if text.is_empty() {
                out.warn(ExtractionWarning::EmptyText {
                    detail: "PDF may be image-based or encrypted".to_string(),
                });
            }
            out.with_text(text)
        }
        Err(e) => {
            if matches!(e, ExtractionError::ToolNotFound(_)) {
                out.warn(e.into_warning());
            } else {
                warn!("pdftotext failed: {}", e);
            }
            out.warn(ExtractionWarning::ParseFailed {
                detail: parse_error,
            });
            out.with_text("")
        }
    }
}
