//! Data models for the acquisition pipeline.

mod acquired;
mod content;
mod extracted;
mod outcome;
mod request;

pub use acquired::AcquiredDocument;
pub use content::{ClassifiedContent, ContentKind, DocumentFormat};
pub use extracted::{ExtractedText, ExtractionWarning};
pub use outcome::{FailureKind, RetrievalFailure, RetrievalOutcome};
pub use request::{OutputMode, ProxyProfile, RetrievalRequest};
