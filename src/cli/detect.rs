//! Detect command.

use std::collections::HashMap;
use std::path::Path;

use console::style;
use url::Url;

use crate::challenge::detect_site_key;
use crate::classify::classify;
use crate::models::ContentKind;

/// Classify a saved page and print any challenge site key.
pub fn cmd_detect(file: &Path, url: Option<&str>) -> anyhow::Result<()> {
    let bytes = std::fs::read(file)?;
    let base = url
        .map(Url::parse)
        .transpose()
        .map_err(|e| anyhow::anyhow!("Invalid URL: {}", e))?;

    let classified = classify(&bytes, &HashMap::new(), base.as_ref());
    let kind = match &classified.kind {
        ContentKind::Document(format) => format!("document ({})", format),
        ContentKind::ChallengePage => "challenge page".to_string(),
        ContentKind::ErrorPage => "error page".to_string(),
        ContentKind::Redirectable(target) => format!("viewer wrapper -> {}", target),
    };
    println!("{:<12} {}", "Kind:", kind);

    let markup = String::from_utf8_lossy(&bytes);
    match detect_site_key(&markup) {
        Some(site_key) => println!("{:<12} {}", "Site key:", style(site_key).cyan()),
        None => println!("{:<12} {}", "Site key:", style("none").dim()),
    }

    Ok(())
}
