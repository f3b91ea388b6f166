//! Retrieval outcomes and failure taxonomy.

use serde::{Deserialize, Serialize};

use super::content::DocumentFormat;

/// Terminal failure causes surfaced to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Navigation timed out and nothing usable was captured.
    NavigationTimeout,
    /// Solver exhausted its polls or returned an error, with no fallback left.
    ChallengeUnsolved,
    /// Stream aborted on the browser path and the alternate transport failed too.
    TransportAborted,
    /// Content still looked like a challenge after the retry cap.
    StillChallenged,
    ErrorPage,
    /// An embedded viewer pointed somewhere that could not be resolved.
    ViewerUnresolved,
    Transport,
    BrowserUnavailable,
    /// Overall per-request budget exceeded.
    Timeout,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NavigationTimeout => "navigation_timeout",
            Self::ChallengeUnsolved => "challenge_unsolved",
            Self::TransportAborted => "transport_aborted",
            Self::StillChallenged => "still_challenged",
            Self::ErrorPage => "error_page",
            Self::ViewerUnresolved => "viewer_unresolved",
            Self::Transport => "transport",
            Self::BrowserUnavailable => "browser_unavailable",
            Self::Timeout => "timeout",
        }
    }
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structured failure: kind plus a human-readable detail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[error("{kind}: {detail}")]
pub struct RetrievalFailure {
    pub kind: FailureKind,
    pub detail: String,
}

impl RetrievalFailure {
    pub fn new(kind: FailureKind, detail: impl Into<String>) -> Self {
        Self {
            kind,
            detail: detail.into(),
        }
    }
}

/// Exactly one of these is produced per retrieval.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetrievalOutcome {
    Html(String),
    Binary {
        bytes: Vec<u8>,
        content_type_hint: DocumentFormat,
    },
    Failure(RetrievalFailure),
}

impl RetrievalOutcome {
    pub fn failure(kind: FailureKind, detail: impl Into<String>) -> Self {
        Self::Failure(RetrievalFailure::new(kind, detail))
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failure(_))
    }

    pub fn variant_name(&self) -> &'static str {
        match self {
            Self::Html(_) => "html",
            Self::Binary { .. } => "binary",
            Self::Failure(_) => "failure",
        }
    }

    /// Convert into a `Result`, keeping the payload variants on the Ok side.
    pub fn into_result(self) -> Result<Self, RetrievalFailure> {
        match self {
            Self::Failure(failure) => Err(failure),
            other => Ok(other),
        }
    }
}
