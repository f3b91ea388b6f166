//! Retrieval states and per-attempt bookkeeping.

use std::collections::HashMap;

use url::Url;

use super::transport::Navigation;
use crate::models::{ClassifiedContent, FailureKind, RetrievalOutcome};

/// Which transport produced a body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Via {
    Browser,
    Download,
    Direct,
}

/// Bytes currently held by the retrieval, awaiting classification.
#[derive(Debug, Clone)]
pub struct Held {
    pub bytes: Vec<u8>,
    pub headers: HashMap<String, String>,
    pub url: Url,
    pub via: Via,
}

/// Why the direct transport is being tried, and what to return if it fails.
#[derive(Debug)]
pub struct Fallback {
    pub kind: FailureKind,
    pub detail: String,
    /// Returned instead of a failure when the direct transport finds nothing better.
    pub on_failure: Option<RetrievalOutcome>,
}

impl Fallback {
    pub fn new(kind: FailureKind, detail: impl Into<String>) -> Self {
        Self {
            kind,
            detail: detail.into(),
            on_failure: None,
        }
    }

    pub fn keeping(mut self, outcome: RetrievalOutcome) -> Self {
        self.on_failure = Some(outcome);
        self
    }

    pub fn into_outcome(self) -> RetrievalOutcome {
        self.on_failure
            .unwrap_or_else(|| RetrievalOutcome::failure(self.kind, self.detail))
    }
}

#[derive(Debug)]
pub enum RetrievalState {
    Init,
    Navigated(Navigation),
    ChallengeCheck,
    Solving { site_key: String },
    Injected,
    SecurityRetry,
    Resolved(Held),
    Classified(Held, ClassifiedContent),
    Direct(Fallback),
    Done(RetrievalOutcome),
}

impl RetrievalState {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Init => "init",
            Self::Navigated(_) => "navigated",
            Self::ChallengeCheck => "challenge_check",
            Self::Solving { .. } => "solving",
            Self::Injected => "injected",
            Self::SecurityRetry => "security_retry",
            Self::Resolved(_) => "resolved",
            Self::Classified(..) => "classified",
            Self::Direct(_) => "direct",
            Self::Done(_) => "done",
        }
    }
}

/// Mutable counters for one retrieval.
#[derive(Debug)]
pub struct Attempt {
    /// Current navigation target; changes when a viewer hop is followed.
    pub target: Url,
    pub headers: HashMap<String, String>,
    /// The last navigation timed out; held content may be partial.
    pub partial: bool,
    pub security_retries: u32,
    pub viewer_hops: u32,
    pub direct_tried: bool,
    /// Site key of the widget whose token was last injected.
    pub solved_site_key: Option<String>,
}

impl Attempt {
    pub fn new(target: Url) -> Self {
        Self {
            target,
            headers: HashMap::new(),
            partial: false,
            security_retries: 0,
            viewer_hops: 0,
            direct_tried: false,
            solved_site_key: None,
        }
    }

    /// Go to the direct transport unless it was already used.
    pub fn fall_back(&self, fallback: Fallback) -> RetrievalState {
        if self.direct_tried {
            RetrievalState::Done(fallback.into_outcome())
        } else {
            RetrievalState::Direct(fallback)
        }
    }
}
