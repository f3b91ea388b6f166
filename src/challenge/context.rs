//! Per-attempt challenge state.

/// State of one challenge being solved. Owned by the retrieval that
/// created it and dropped once the token has been injected or the
/// attempt is abandoned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChallengeContext {
    pub site_key: String,
    /// Page URL at detection time, sent to the solving service.
    pub page_url: String,
    pub task_id: Option<String>,
    pub token: Option<String>,
}

impl ChallengeContext {
    pub fn new(site_key: impl Into<String>, page_url: impl Into<String>) -> Self {
        Self {
            site_key: site_key.into(),
            page_url: page_url.into(),
            task_id: None,
            token: None,
        }
    }

    pub fn is_solved(&self) -> bool {
        self.token.is_some()
    }

    /// A different widget appeared after a reload.
    pub fn is_stale_for(&self, site_key: &str) -> bool {
        self.site_key != site_key
    }
}

/// Shorten a token for logging.
pub(crate) fn token_preview(token: &str) -> String {
    let preview: String = token.chars().take(8).collect();
    format!("{}...", preview)
}
