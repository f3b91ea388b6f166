//! Solving-service configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::challenge::PollPolicy;

/// Solving-service endpoint, credentials and polling bounds.
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SolverConfig {
    /// API key. Usually supplied through `CAPTCHA_API_KEY`.
    #[serde(default)]
    pub api_key: Option<String>,

    #[serde(default = "default_submit_url")]
    pub submit_url: String,

    #[serde(default = "default_result_url")]
    pub result_url: String,

    /// Task type sent as `method`.
    #[serde(default = "default_method")]
    pub method: String,

    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,

    #[serde(default = "default_max_polls")]
    pub max_polls: u32,

    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl std::fmt::Debug for SolverConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SolverConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "***"))
            .field("submit_url", &self.submit_url)
            .field("result_url", &self.result_url)
            .field("method", &self.method)
            .field("poll_interval_secs", &self.poll_interval_secs)
            .field("max_polls", &self.max_polls)
            .finish()
    }
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            submit_url: default_submit_url(),
            result_url: default_result_url(),
            method: default_method(),
            poll_interval_secs: default_poll_interval_secs(),
            max_polls: default_max_polls(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl SolverConfig {
    /// Apply environment variable overrides.
    ///
    /// - `CAPTCHA_API_KEY` - solving-service API key
    /// - `CAPTCHA_API_URL` - base URL; `in.php`/`res.php` are appended
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(val) = std::env::var("CAPTCHA_API_KEY") {
            if !val.trim().is_empty() {
                self.api_key = Some(val.trim().to_string());
            }
        }

        if let Ok(val) = std::env::var("CAPTCHA_API_URL") {
            let base = val.trim().trim_end_matches('/');
            if !base.is_empty() {
                self.submit_url = format!("{}/in.php", base);
                self.result_url = format!("{}/res.php", base);
            }
        }

        self
    }

    pub fn is_configured(&self) -> bool {
        self.api_key.as_ref().is_some_and(|k| !k.trim().is_empty())
    }

    pub fn poll_policy(&self) -> PollPolicy {
        PollPolicy {
            interval: Duration::from_secs(self.poll_interval_secs),
            max_polls: self.max_polls,
        }
    }
}

fn default_submit_url() -> String {
    "http://2captcha.com/in.php".to_string()
}

fn default_result_url() -> String {
    "http://2captcha.com/res.php".to_string()
}

fn default_method() -> String {
    "turnstile".to_string()
}

fn default_poll_interval_secs() -> u64 {
    5
}

fn default_max_polls() -> u32 {
    30
}

fn default_request_timeout_secs() -> u64 {
    30
}
