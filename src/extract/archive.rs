//! ZIP archives that are not Office documents.

use std::io::{Cursor, Read};

use tracing::debug;
use zip::ZipArchive;

use super::{ExtractionError, TextExtractor};
use crate::models::{DocumentFormat, ExtractedText, ExtractionWarning};
use crate::utils::format_from_filename;

/// Extract every member; a bad member becomes a warning and the rest
/// are still read. Only an unreadable archive leaves `text` unset.
pub fn extract(extractor: &TextExtractor, bytes: &[u8], depth: u32) -> ExtractedText {
    let mut out = ExtractedText::new(DocumentFormat::Zip);
    let mut archive = match ZipArchive::new(Cursor::new(bytes)) {
        Ok(archive) => archive,
        Err(e) => {
            out.warn(ExtractionError::from(e).into_warning());
            return out;
        }
    };

    let mut sections = Vec::new();
    for i in 0..archive.len() {
        let (path, data) = match read_entry(&mut archive, i, extractor.max_entry_bytes) {
            Ok(Some(entry)) => entry,
            Ok(None) => continue,
            Err((entry, e)) => {
                debug!("Skipping archive entry {}: {}", entry, e);
                out.warn(ExtractionWarning::ArchiveEntry {
                    entry,
                    warning: Box::new(e.into_warning()),
                });
                continue;
            }
        };

        debug!("Extracting archive entry {} ({} bytes)", path, data.len());
        let filename = path.rsplit('/').next().unwrap_or(&path);
        let inner = extractor.extract_at_depth(&data, format_from_filename(filename), depth + 1);

        for warning in inner.warnings {
            out.warn(ExtractionWarning::ArchiveEntry {
                entry: path.clone(),
                warning: Box::new(warning),
            });
        }
        if let Some(text) = inner.text.filter(|t| !t.trim().is_empty()) {
            sections.push(format!("=== {} ===\n{}", path, text));
        }
    }

    out.with_text(sections.join("\n\n"))
}

/// Path and bytes of entry `index`, or `None` for entries that carry no
/// document. Errors are labelled with the entry path when it is known.
fn read_entry(
    archive: &mut ZipArchive<Cursor<&[u8]>>,
    index: usize,
    max_bytes: u64,
) -> Result<Option<(String, Vec<u8>)>, (String, ExtractionError)> {
    let mut entry = archive
        .by_index(index)
        .map_err(|e| (format!("#{}", index), ExtractionError::from(e)))?;
    let path = entry.name().to_string();

    // Skip directories and __MACOSX metadata
    if entry.is_dir() || path.starts_with("__MACOSX") {
        return Ok(None);
    }
    if path.rsplit('/').next().is_some_and(|name| name.starts_with('.')) {
        return Ok(None);
    }

    if entry.size() > max_bytes {
        let detail = format!("entry too large ({} bytes)", entry.size());
        return Err((path, ExtractionError::ExtractionFailed(detail)));
    }

    let mut data = Vec::with_capacity(entry.size() as usize);
    match entry.read_to_end(&mut data) {
        Ok(_) => Ok(Some((path, data))),
        Err(e) => Err((path, ExtractionError::from(e))),
    }
}
