//! Stand-in page used when no browser could be opened.
//!
//! Every browser operation fails with `BrowserUnavailable`, which sends the
//! retrieval straight to the direct transport.

use std::time::Duration;

use async_trait::async_trait;
use url::Url;

use super::transport::{BrowserCookie, InjectOutcome, Navigation, PageDriver, TransportError, WaitUntil};

pub struct DetachedPage {
    reason: String,
}

impl DetachedPage {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }

    fn unavailable(&self) -> TransportError {
        TransportError::BrowserUnavailable(self.reason.clone())
    }
}

#[async_trait]
impl PageDriver for DetachedPage {
    async fn navigate(
        &mut self,
        _url: &Url,
        _wait: WaitUntil,
        _timeout: Duration,
    ) -> Result<Navigation, TransportError> {
        Err(self.unavailable())
    }

    async fn content(&mut self) -> Result<String, TransportError> {
        Err(self.unavailable())
    }

    async fn current_url(&mut self) -> Option<Url> {
        None
    }

    async fn response_body(&mut self) -> Result<Vec<u8>, TransportError> {
        Err(self.unavailable())
    }

    async fn await_download(&mut self, _timeout: Duration) -> Option<Vec<u8>> {
        None
    }

    async fn inject_token(&mut self, _token: &str) -> Result<InjectOutcome, TransportError> {
        Err(self.unavailable())
    }

    async fn wait_for_quiescence(&mut self, _timeout: Duration) -> bool {
        false
    }

    async fn click_continue(&mut self) -> Result<bool, TransportError> {
        Ok(false)
    }

    async fn reload(&mut self, _timeout: Duration) -> Result<(), TransportError> {
        Err(self.unavailable())
    }

    async fn cookies(&mut self) -> Vec<BrowserCookie> {
        Vec::new()
    }

    async fn persist_cookies(&mut self) {}

    async fn close(&mut self) {}
}
