//! Shared utility functions.
//!
//! - `mime`: mapping between MIME types, file suffixes and document formats

mod mime;

pub use mime::{
    format_from_filename, format_from_mime, format_from_url, is_document_stream_mime,
    mime_for_format, normalize_mime,
};
