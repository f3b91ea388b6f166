//! Fetch command.

use std::path::PathBuf;
use std::time::Duration;

use console::style;

use crate::config::Config;
use crate::models::{OutputMode, ProxyProfile, RetrievalRequest};
use crate::pipeline::DocumentPipeline;

pub struct FetchArgs {
    pub url: String,
    pub wait: Option<u64>,
    pub mode: OutputMode,
    pub proxy: Option<String>,
    pub output: Option<PathBuf>,
    pub json: bool,
    pub budget: Option<u64>,
}

/// Retrieve one URL and print its extracted text.
pub async fn cmd_fetch(config: &Config, args: FetchArgs) -> anyhow::Result<()> {
    let proxy = match args.proxy.as_deref() {
        Some(raw) => Some(
            ProxyProfile::parse(raw)
                .map_err(|e| anyhow::anyhow!("Invalid proxy URL '{}': {}", raw, e))?,
        ),
        None => config.proxy_profile()?,
    };

    let request = RetrievalRequest::parse(&args.url)
        .map_err(|e| anyhow::anyhow!("Invalid URL '{}': {}", args.url, e))?
        .with_wait(args.wait.map(Duration::from_secs).unwrap_or(config.retrieval.wait()))
        .with_budget(
            args.budget
                .map(Duration::from_secs)
                .unwrap_or(config.retrieval.request_budget()),
        )
        .with_proxy(proxy)
        .with_mode(args.mode);

    let pipeline = DocumentPipeline::from_config(config)?;
    let document = match pipeline.acquire(&request).await {
        Ok(document) => document,
        Err(failure) => {
            eprintln!("{} {} failed: {}", style("✗").red(), request.url, failure);
            anyhow::bail!("retrieval failed ({})", failure.kind);
        }
    };

    if let Some(ref path) = args.output {
        std::fs::write(path, &document.content)?;
        eprintln!(
            "{} Saved {} bytes to {}",
            style("✓").green(),
            document.size,
            path.display()
        );
    }

    if args.json {
        println!("{}", serde_json::to_string_pretty(&document)?);
        return Ok(());
    }

    eprintln!(
        "{} {} ({}, {} bytes, sha256 {})",
        style("✓").green(),
        document.url,
        document.format,
        document.size,
        &document.content_hash[..16]
    );
    for warning in &document.extracted.warnings {
        eprintln!("  {} {}", style("!").yellow(), warning);
    }
    match document.extracted.text.as_deref() {
        Some(text) => println!("{}", text),
        None => eprintln!("  {} No text could be extracted", style("!").yellow()),
    }

    Ok(())
}
