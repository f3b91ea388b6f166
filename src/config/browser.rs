//! Browser engine configuration types.
//!
//! These types live outside `#[cfg(feature = "browser")]` so config parsing
//! works in builds without the browser feature.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Browser engine types.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BrowserEngineType {
    /// Chromium with stealth patches (default).
    #[default]
    Stealth,

    /// No stealth patches (for debugging).
    Standard,
}

impl BrowserEngineType {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "stealth" => Some(Self::Stealth),
            "standard" => Some(Self::Standard),
            _ => None,
        }
    }
}

/// Browser engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BrowserEngineConfig {
    #[serde(default)]
    pub engine: BrowserEngineType,

    /// Run in headless mode (default: true).
    #[serde(default = "default_headless")]
    pub headless: bool,

    /// JSON cookie file loaded before navigation and updated after
    /// successful retrievals. `~` is expanded.
    #[serde(default)]
    pub cookies_file: Option<PathBuf>,

    /// Additional Chrome arguments.
    #[serde(default)]
    pub chrome_args: Vec<String>,

    /// Explicit Chrome/Chromium executable.
    #[serde(default)]
    pub chrome_path: Option<PathBuf>,

    /// Remote Chrome DevTools URL (e.g., "ws://localhost:9222").
    /// If set, connects to an existing browser instead of launching one.
    /// Can also be set via BROWSER_URL environment variable.
    #[serde(default)]
    pub remote_url: Option<String>,

    /// User agent override; resolved through the impersonation table.
    #[serde(default)]
    pub user_agent: Option<String>,
}

impl Default for BrowserEngineConfig {
    fn default() -> Self {
        Self {
            engine: BrowserEngineType::default(),
            headless: default_headless(),
            cookies_file: None,
            chrome_args: Vec::new(),
            chrome_path: None,
            remote_url: None,
            user_agent: None,
        }
    }
}

impl BrowserEngineConfig {
    /// Apply environment variable overrides.
    ///
    /// - `BROWSER_URL` - Remote Chrome DevTools URL
    /// - `BROWSER_ENGINE` - `stealth` or `standard`
    /// - `REGACQ_COOKIES_FILE` - cookie jar path
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(val) = std::env::var("BROWSER_URL") {
            if !val.trim().is_empty() {
                self.remote_url = Some(val.trim().to_string());
            }
        }

        if let Ok(val) = std::env::var("BROWSER_ENGINE") {
            if let Some(engine) = BrowserEngineType::from_str(&val) {
                self.engine = engine;
            }
        }

        if let Ok(val) = std::env::var("REGACQ_COOKIES_FILE") {
            if !val.is_empty() {
                self.cookies_file = Some(PathBuf::from(val));
            }
        }

        self
    }

    /// Cookie file path with `~` and environment variables expanded.
    pub fn resolved_cookies_file(&self) -> Option<PathBuf> {
        self.cookies_file.as_ref().map(|path| {
            let raw = path.to_string_lossy();
            match shellexpand::full(&raw) {
                Ok(expanded) => PathBuf::from(expanded.as_ref()),
                Err(_) => path.clone(),
            }
        })
    }
}

pub fn default_headless() -> bool {
    true
}
