//! Extract command.

use std::path::Path;

use console::style;

use crate::extract::TextExtractor;
use crate::models::DocumentFormat;
use crate::utils::format_from_filename;

/// Extract text from a local file.
pub async fn cmd_extract(file: &Path, format: Option<&str>, json: bool) -> anyhow::Result<()> {
    if !file.exists() {
        anyhow::bail!("File not found: {}", file.display());
    }

    let hint = match format {
        Some(raw) => Some(
            DocumentFormat::from_str(raw)
                .ok_or_else(|| anyhow::anyhow!("Unknown format '{}'", raw))?,
        ),
        None => file
            .file_name()
            .and_then(|name| name.to_str())
            .and_then(format_from_filename),
    };

    let bytes = tokio::fs::read(file).await?;
    let extracted = tokio::task::spawn_blocking(move || TextExtractor::new().extract(&bytes, hint)).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&extracted)?);
        return Ok(());
    }

    let kind = extracted
        .source_kind
        .map(|k| k.to_string())
        .unwrap_or_else(|| "unknown".to_string());
    eprintln!("{} {} ({})", style("✓").green(), file.display(), kind);
    if let Some(pages) = extracted.page_count {
        eprintln!("  {} {} pages", style("→").dim(), pages);
    }
    if let Some(sheets) = extracted.sheet_count {
        eprintln!("  {} {} sheets", style("→").dim(), sheets);
    }
    for warning in &extracted.warnings {
        eprintln!("  {} {}", style("!").yellow(), warning);
    }
    if let Some(text) = extracted.text.as_deref() {
        println!("{}", text);
    }

    Ok(())
}
