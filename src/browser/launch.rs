//! Browser process launch and remote connection.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::handler::HandlerConfig;
use chromiumoxide::{Browser, BrowserConfig};
use futures::StreamExt;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use super::find_chrome;
use super::session::ChromeSession;
use crate::config::{BrowserEngineConfig, RetrievalConfig};
use crate::http_client::resolve_user_agent;
use crate::models::{ProxyProfile, RetrievalRequest};
use crate::retrieval::{PageDriver, SessionFactory, TransportError};

/// Chrome arguments that hide the most obvious automation traits.
const STEALTH_ARGS: &[&str] = &[
    "--disable-blink-features=AutomationControlled",
    "--disable-infobars",
    "--disable-dev-shm-usage",
    "--no-first-run",
    "--no-default-browser-check",
    "--disable-background-networking",
    "--disable-sync",
    "--disable-translate",
    "--metrics-recording-only",
    "--no-sandbox",
    "--disable-gpu",
    "--disable-software-rasterizer",
];

/// A running or connected browser plus its CDP event loop.
pub(crate) struct Connected {
    pub browser: Browser,
    pub handler: JoinHandle<()>,
    /// False for a remote browser, which must outlive the session.
    pub owned: bool,
}

/// Opens one Chrome page per retrieval. A launched browser gets the
/// request's proxy on its command line; a remote browser gets it through
/// a dedicated browser context.
#[derive(Debug, Clone)]
pub struct ChromeSessionFactory {
    config: BrowserEngineConfig,
    retrieval: RetrievalConfig,
    user_agent: String,
}

impl ChromeSessionFactory {
    pub fn new(config: BrowserEngineConfig, retrieval: RetrievalConfig) -> Self {
        let user_agent = resolve_user_agent(config.user_agent.as_deref());
        Self {
            config,
            retrieval,
            user_agent,
        }
    }

    pub(crate) async fn connect(
        &self,
        proxy: Option<&ProxyProfile>,
        profile_dir: &Path,
    ) -> Result<Connected, TransportError> {
        match self.config.remote_url.as_deref() {
            Some(remote_url) => self.connect_remote(remote_url).await,
            None => self.launch(proxy, profile_dir).await,
        }
    }

    async fn launch(
        &self,
        proxy: Option<&ProxyProfile>,
        profile_dir: &Path,
    ) -> Result<Connected, TransportError> {
        let chrome_path = match &self.config.chrome_path {
            Some(path) => path.clone(),
            None => find_chrome().ok_or_else(|| {
                TransportError::BrowserUnavailable(
                    "Chrome/Chromium not found; install it or set browser.chrome_path".to_string(),
                )
            })?,
        };
        info!(
            "Launching browser {:?} (headless={})",
            chrome_path, self.config.headless
        );

        let mut builder = BrowserConfig::builder()
            .chrome_executable(chrome_path)
            .user_data_dir(profile_dir)
            .request_timeout(self.retrieval.navigation_timeout());

        // with_head means NOT headless
        if !self.config.headless {
            builder = builder.with_head();
        }

        if let Some(proxy) = proxy {
            debug!("Routing browser through {}", proxy.server_url());
            builder = builder.arg(format!("--proxy-server={}", proxy.server_url()));
        }

        for arg in STEALTH_ARGS {
            builder = builder.arg(*arg);
        }
        for arg in &self.config.chrome_args {
            builder = builder.arg(arg);
        }

        let config = builder.build().map_err(|e| {
            TransportError::BrowserUnavailable(format!("Failed to build browser config: {}", e))
        })?;

        let (browser, handler) = Browser::launch(config).await.map_err(|e| {
            TransportError::BrowserUnavailable(format!("Failed to launch browser: {}", e))
        })?;

        Ok(Connected {
            browser,
            handler: spawn_handler(handler),
            owned: true,
        })
    }

    async fn connect_remote(&self, url: &str) -> Result<Connected, TransportError> {
        info!("Connecting to remote browser at {}", url);

        // The WebSocket URL comes from the /json/version endpoint
        let http_url = url
            .replace("ws://", "http://")
            .replace("wss://", "https://");
        let version_url = format!("{}/json/version", http_url.trim_end_matches('/'));

        let unavailable = |e: &dyn std::fmt::Display| {
            TransportError::BrowserUnavailable(format!("remote browser at {}: {}", url, e))
        };

        let version: serde_json::Value = reqwest::Client::new()
            .get(&version_url)
            .timeout(Duration::from_secs(10))
            .send()
            .await
            .map_err(|e| unavailable(&e))?
            .json()
            .await
            .map_err(|e| unavailable(&e))?;

        let ws_url = version
            .get("webSocketDebuggerUrl")
            .and_then(|v| v.as_str())
            .ok_or_else(|| unavailable(&"no webSocketDebuggerUrl in /json/version"))?;
        debug!("Connecting to WebSocket: {}", ws_url);

        let handler_config = HandlerConfig {
            request_timeout: self.retrieval.navigation_timeout(),
            ..Default::default()
        };
        let (browser, handler) = Browser::connect_with_config(ws_url, handler_config)
            .await
            .map_err(|e| unavailable(&e))?;

        Ok(Connected {
            browser,
            handler: spawn_handler(handler),
            owned: false,
        })
    }
}

fn spawn_handler(mut handler: chromiumoxide::Handler) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(event) = handler.next().await {
            if event.is_err() {
                break;
            }
        }
    })
}

#[async_trait]
impl SessionFactory for ChromeSessionFactory {
    async fn open(&self, request: &RetrievalRequest) -> Result<Box<dyn PageDriver>, TransportError> {
        let session = ChromeSession::open(
            self,
            &self.config,
            &self.user_agent,
            request.proxy.as_ref(),
        )
        .await?;
        Ok(Box::new(session))
    }
}
