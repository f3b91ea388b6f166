//! Chrome transport for challenge-gated portals.
//!
//! Uses chromiumoxide (CDP) with stealth patches. Each retrieval gets its
//! own browser (or its own context on a remote browser) so proxy
//! credentials and cookies never leak between concurrent requests.

#[cfg(feature = "browser")]
mod launch;
#[cfg(feature = "browser")]
mod scripts;
#[cfg(feature = "browser")]
mod session;
#[cfg(feature = "browser")]
mod stealth;

use std::path::PathBuf;

#[cfg(feature = "browser")]
pub use launch::ChromeSessionFactory;
#[cfg(feature = "browser")]
pub use session::ChromeSession;

/// Common Chrome executable paths to check.
const CHROME_PATHS: &[&str] = &[
    // Linux
    "/usr/bin/google-chrome",
    "/usr/bin/google-chrome-stable",
    "/usr/bin/chromium",
    "/usr/bin/chromium-browser",
    "/snap/bin/chromium",
    // macOS
    "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
    "/Applications/Chromium.app/Contents/MacOS/Chromium",
    "/opt/google/chrome/google-chrome",
];

const CHROME_COMMANDS: &[&str] = &[
    "google-chrome",
    "google-chrome-stable",
    "chromium",
    "chromium-browser",
];

/// Locate a Chrome/Chromium executable on this host.
pub fn find_chrome() -> Option<PathBuf> {
    CHROME_PATHS
        .iter()
        .map(PathBuf::from)
        .find(|p| p.exists())
        .or_else(|| CHROME_COMMANDS.iter().find_map(|cmd| which::which(cmd).ok()))
}

#[cfg(not(feature = "browser"))]
mod disabled {
    use async_trait::async_trait;

    use crate::config::{BrowserEngineConfig, RetrievalConfig};
    use crate::models::RetrievalRequest;
    use crate::retrieval::{PageDriver, SessionFactory, TransportError};

    /// Stand-in when browser support is not compiled in. Every retrieval
    /// goes straight to the direct transport.
    #[derive(Debug, Clone)]
    pub struct ChromeSessionFactory;

    impl ChromeSessionFactory {
        pub fn new(_config: BrowserEngineConfig, _retrieval: RetrievalConfig) -> Self {
            Self
        }
    }

    #[async_trait]
    impl SessionFactory for ChromeSessionFactory {
        async fn open(&self, _request: &RetrievalRequest) -> Result<Box<dyn PageDriver>, TransportError> {
            Err(TransportError::BrowserUnavailable(
                "Browser support not compiled. Rebuild with: cargo build --features browser".to_string(),
            ))
        }
    }
}

#[cfg(not(feature = "browser"))]
pub use disabled::ChromeSessionFactory;
