//! Direct HTTP transport that reuses browser cookies and the request proxy.

mod response;
mod user_agent;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::cookie::Jar;
use reqwest::header::{ACCEPT, ACCEPT_LANGUAGE, REFERER};
use tracing::{debug, warn};

use crate::retrieval::{DirectRequest, DirectTransport, FetchedBody, TransportError};

pub use response::{collect_headers, parse_content_disposition_filename};
pub use user_agent::{resolve_user_agent, BROWSER_USER_AGENT, IMPERSONATE_USER_AGENTS};

/// Accept header preferring document streams over markup.
const DOCUMENT_ACCEPT: &str =
    "application/pdf,application/octet-stream,text/html;q=0.9,application/xhtml+xml;q=0.9,*/*;q=0.8";

/// Plain reqwest transport. A client is built per call so each request
/// carries its own cookie jar and proxy profile.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    user_agent: String,
    timeout: Duration,
}

impl HttpTransport {
    pub fn new(user_agent: impl Into<String>, timeout: Duration) -> Self {
        Self {
            user_agent: user_agent.into(),
            timeout,
        }
    }

    fn build_client(&self, request: &DirectRequest<'_>) -> Result<reqwest::Client, TransportError> {
        let jar = Jar::default();
        for cookie in request.cookies {
            jar.add_cookie_str(&cookie.to_set_cookie(), request.url);
        }
        debug!("Seeded direct request with {} cookies", request.cookies.len());

        let mut builder = reqwest::Client::builder()
            .cookie_provider(Arc::new(jar))
            .user_agent(&self.user_agent)
            .timeout(self.timeout);

        if let Some(proxy) = request.proxy {
            builder = builder.proxy(proxy.to_reqwest()?);
        }

        Ok(builder.build()?)
    }
}

impl Default for HttpTransport {
    fn default() -> Self {
        Self::new(BROWSER_USER_AGENT, Duration::from_secs(60))
    }
}

#[async_trait]
impl DirectTransport for HttpTransport {
    async fn get(&self, request: DirectRequest<'_>) -> Result<FetchedBody, TransportError> {
        let client = self.build_client(&request)?;

        let mut builder = client
            .get(request.url.clone())
            .header(ACCEPT, DOCUMENT_ACCEPT)
            .header(ACCEPT_LANGUAGE, "en-US,en;q=0.9");
        if let Some(referer) = request.referer {
            builder = builder.header(REFERER, referer.as_str());
        }

        debug!("Direct GET {}", request.url);
        let response = builder.send().await.map_err(|e| map_send_error(e, self.timeout))?;

        let status = response.status().as_u16();
        let headers = collect_headers(response.headers());
        let final_url = response.url().clone();

        let bytes = response.bytes().await.map_err(|e| {
            warn!("Direct body read failed for {}: {}", final_url, e);
            if e.is_timeout() {
                TransportError::Timeout(self.timeout)
            } else {
                TransportError::Aborted(e.to_string())
            }
        })?;

        debug!(
            "Direct GET {} -> {} ({} bytes)",
            final_url,
            status,
            bytes.len()
        );

        Ok(FetchedBody {
            status,
            headers,
            final_url,
            bytes: bytes.to_vec(),
        })
    }
}

fn map_send_error(error: reqwest::Error, timeout: Duration) -> TransportError {
    if error.is_timeout() {
        TransportError::Timeout(timeout)
    } else {
        TransportError::Http(error)
    }
}
