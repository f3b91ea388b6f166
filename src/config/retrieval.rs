//! Retrieval timing and retry bounds.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Timeouts and caps used by the retriever. One parameter set serves
/// every portal; override per deployment in the config file.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RetrievalConfig {
    /// Default post-navigation settle time when the caller gives none.
    #[serde(default = "default_wait_secs")]
    pub wait_secs: u64,

    /// Per-navigation timeout.
    #[serde(default = "default_navigation_timeout_secs")]
    pub navigation_timeout_secs: u64,

    /// How long to wait for network quiescence after token injection.
    #[serde(default = "default_quiescence_timeout_secs")]
    pub quiescence_timeout_secs: u64,

    /// Fixed extra delay when quiescence is never observed.
    #[serde(default = "default_settle_delay_secs")]
    pub settle_delay_secs: u64,

    /// Wait between security-check retries.
    #[serde(default = "default_security_retry_delay_secs")]
    pub security_retry_delay_secs: u64,

    /// Total security-check retries before giving up.
    #[serde(default = "default_max_security_retries")]
    pub max_security_retries: u32,

    /// Embedded viewer hops followed before giving up.
    #[serde(default = "default_max_viewer_hops")]
    pub max_viewer_hops: u32,

    /// Default overall wall-clock budget per request.
    #[serde(default = "default_request_budget_secs")]
    pub request_budget_secs: u64,

    /// Timeout for the plain HTTP transport.
    #[serde(default = "default_direct_timeout_secs")]
    pub direct_timeout_secs: u64,

    /// How long to wait for a browser-triggered download to finish.
    #[serde(default = "default_download_wait_secs")]
    pub download_wait_secs: u64,

    /// Bodies shorter than this are not accepted from the direct transport.
    #[serde(default = "default_min_direct_body_bytes")]
    pub min_direct_body_bytes: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            wait_secs: default_wait_secs(),
            navigation_timeout_secs: default_navigation_timeout_secs(),
            quiescence_timeout_secs: default_quiescence_timeout_secs(),
            settle_delay_secs: default_settle_delay_secs(),
            security_retry_delay_secs: default_security_retry_delay_secs(),
            max_security_retries: default_max_security_retries(),
            max_viewer_hops: default_max_viewer_hops(),
            request_budget_secs: default_request_budget_secs(),
            direct_timeout_secs: default_direct_timeout_secs(),
            download_wait_secs: default_download_wait_secs(),
            min_direct_body_bytes: default_min_direct_body_bytes(),
        }
    }
}

impl RetrievalConfig {
    pub fn wait(&self) -> Duration {
        Duration::from_secs(self.wait_secs)
    }

    pub fn navigation_timeout(&self) -> Duration {
        Duration::from_secs(self.navigation_timeout_secs)
    }

    pub fn quiescence_timeout(&self) -> Duration {
        Duration::from_secs(self.quiescence_timeout_secs)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_secs(self.settle_delay_secs)
    }

    pub fn security_retry_delay(&self) -> Duration {
        Duration::from_secs(self.security_retry_delay_secs)
    }

    pub fn request_budget(&self) -> Duration {
        Duration::from_secs(self.request_budget_secs)
    }

    pub fn direct_timeout(&self) -> Duration {
        Duration::from_secs(self.direct_timeout_secs)
    }

    pub fn download_wait(&self) -> Duration {
        Duration::from_secs(self.download_wait_secs)
    }
}

fn default_wait_secs() -> u64 {
    20
}

fn default_navigation_timeout_secs() -> u64 {
    120
}

fn default_quiescence_timeout_secs() -> u64 {
    50
}

fn default_settle_delay_secs() -> u64 {
    10
}

fn default_security_retry_delay_secs() -> u64 {
    15
}

fn default_max_security_retries() -> u32 {
    5
}

fn default_max_viewer_hops() -> u32 {
    1
}

fn default_request_budget_secs() -> u64 {
    600
}

fn default_direct_timeout_secs() -> u64 {
    60
}

fn default_download_wait_secs() -> u64 {
    60
}

fn default_min_direct_body_bytes() -> usize {
    1000
}
