//! Transport seams used by the retriever.
//!
//! `PageDriver` is one exclusively-owned browser page; `DirectTransport`
//! is the plain HTTP fallback that reuses the page's cookies and proxy.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use crate::models::{ProxyProfile, RetrievalRequest};

/// Errors from either transport.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Timed out after {0:?}")]
    Timeout(Duration),

    /// The stream was cut off mid-read (e.g. `net::ERR_ABORTED` on a download).
    #[error("Transfer aborted: {0}")]
    Aborted(String),

    #[error("Browser unavailable: {0}")]
    BrowserUnavailable(String),

    #[error("Navigation failed: {0}")]
    Navigation(String),

    #[error("Page script failed: {0}")]
    Script(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl TransportError {
    /// Wrap a driver error message, recognizing aborted transfers.
    pub fn navigation(message: impl Into<String>) -> Self {
        let message = message.into();
        if is_abort_message(&message) {
            Self::Aborted(message)
        } else {
            Self::Navigation(message)
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout(_))
    }

    pub fn is_abort(&self) -> bool {
        matches!(self, Self::Aborted(_))
    }
}

/// Browsers report cancelled document streams with these markers.
pub fn is_abort_message(message: &str) -> bool {
    let lower = message.to_ascii_lowercase();
    lower.contains("err_aborted") || lower.contains("aborted")
}

/// How long navigation waits before returning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitUntil {
    /// Response committed; first bytes available.
    Commit,
    DomContentLoaded,
    Load,
}

impl WaitUntil {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Commit => "commit",
            Self::DomContentLoaded => "domcontentloaded",
            Self::Load => "load",
        }
    }
}

/// Main-frame response metadata from a navigation.
#[derive(Debug, Clone, Default)]
pub struct Navigation {
    pub final_url: Option<Url>,
    pub status: Option<u16>,
    /// Response headers with lowercased names.
    pub headers: HashMap<String, String>,
}

/// Cookie shared between the browser and the direct transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrowserCookie {
    pub name: String,
    pub value: String,
    pub domain: String,
    #[serde(default = "default_cookie_path")]
    pub path: String,
    #[serde(default)]
    pub secure: bool,
    #[serde(default)]
    pub http_only: bool,
}

fn default_cookie_path() -> String {
    "/".to_string()
}

impl BrowserCookie {
    /// `Set-Cookie` style string for seeding a cookie jar. An empty
    /// domain yields a host-only cookie.
    pub fn to_set_cookie(&self) -> String {
        let mut cookie = format!("{}={}; Path={}", self.name, self.value, self.path);
        if !self.domain.is_empty() {
            cookie.push_str(&format!("; Domain={}", self.domain));
        }
        if self.secure {
            cookie.push_str("; Secure");
        }
        if self.http_only {
            cookie.push_str("; HttpOnly");
        }
        cookie
    }
}

/// What happened after a token was written into the page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InjectOutcome {
    FormSubmitted,
    /// No enclosing form existed; the page was reloaded.
    Reloaded,
}

/// One browser page, owned by a single retrieval.
#[async_trait]
pub trait PageDriver: Send {
    /// Navigate the page and wait until `wait` is reached or `timeout` elapses.
    async fn navigate(
        &mut self,
        url: &Url,
        wait: WaitUntil,
        timeout: Duration,
    ) -> Result<Navigation, TransportError>;

    /// Current serialized DOM (partial if navigation timed out).
    async fn content(&mut self) -> Result<String, TransportError>;

    async fn current_url(&mut self) -> Option<Url>;

    /// Raw body of the last main-frame response.
    async fn response_body(&mut self) -> Result<Vec<u8>, TransportError>;

    /// Bytes of a browser-triggered download, if one completes in time.
    async fn await_download(&mut self, timeout: Duration) -> Option<Vec<u8>>;

    /// Write a solver token into the challenge response field and submit.
    async fn inject_token(&mut self, token: &str) -> Result<InjectOutcome, TransportError>;

    /// Wait for network activity to settle; `false` if it never did.
    async fn wait_for_quiescence(&mut self, timeout: Duration) -> bool;

    /// Click a visible continue/verify control; `true` if one was clicked.
    async fn click_continue(&mut self) -> Result<bool, TransportError>;

    async fn reload(&mut self, timeout: Duration) -> Result<(), TransportError>;

    async fn cookies(&mut self) -> Vec<BrowserCookie>;

    /// Write the session's cookies to its persistent jar, if it has one.
    async fn persist_cookies(&mut self);

    /// Tear down the page and any browser process it owns.
    async fn close(&mut self);
}

/// Opens a fresh page per retrieval, configured with the request's proxy.
#[async_trait]
pub trait SessionFactory: Send + Sync {
    async fn open(&self, request: &RetrievalRequest) -> Result<Box<dyn PageDriver>, TransportError>;
}

/// One plain HTTP GET.
#[derive(Debug, Clone)]
pub struct DirectRequest<'a> {
    pub url: &'a Url,
    pub cookies: &'a [BrowserCookie],
    pub referer: Option<&'a Url>,
    pub proxy: Option<&'a ProxyProfile>,
}

/// Body fetched by the direct transport.
#[derive(Debug, Clone)]
pub struct FetchedBody {
    pub status: u16,
    /// Response headers with lowercased names.
    pub headers: HashMap<String, String>,
    pub final_url: Url,
    pub bytes: Vec<u8>,
}

impl FetchedBody {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Plain request transport sharing the browser's cookies and proxy.
#[async_trait]
pub trait DirectTransport: Send + Sync {
    async fn get(&self, request: DirectRequest<'_>) -> Result<FetchedBody, TransportError>;
}
