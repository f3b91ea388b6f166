//! Solving-service client with bounded asynchronous polling.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::context::{token_preview, ChallengeContext};

/// Errors from the solving service or the polling loop.
#[derive(Debug, Error)]
pub enum SolverError {
    #[error("No solver API key configured")]
    MissingApiKey,

    #[error("Solver rejected task submission: {0}")]
    Submit(String),

    #[error("Solver returned error: {0}")]
    Service(String),

    #[error("Solver gave no token after {attempts} polls ({elapsed:?})")]
    Timeout { attempts: u32, elapsed: Duration },

    #[error("Unexpected solver response: {0}")]
    InvalidResponse(String),

    #[error("Solver HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Status reported by one poll of a submitted task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollStatus {
    /// Not ready yet; the only status that keeps the loop going.
    Pending,
    Solved(String),
    Failed(String),
}

/// Transport seam for a solving service.
#[async_trait]
pub trait SolverApi: Send + Sync {
    /// Submit a task and return its identifier.
    async fn submit(&self, site_key: &str, page_url: &str) -> Result<String, SolverError>;

    /// Ask for the result of a submitted task.
    async fn poll(&self, task_id: &str) -> Result<PollStatus, SolverError>;
}

/// Polling parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub interval: Duration,
    pub max_polls: u32,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(5),
            max_polls: 30,
        }
    }
}

impl PollPolicy {
    /// Upper bound on time spent polling.
    pub fn total(&self) -> Duration {
        self.interval * self.max_polls
    }
}

/// Submits a challenge and polls until solved, failed or out of attempts.
#[derive(Clone)]
pub struct ChallengeSolver {
    api: Arc<dyn SolverApi>,
    policy: PollPolicy,
}

impl ChallengeSolver {
    pub fn new(api: Arc<dyn SolverApi>, policy: PollPolicy) -> Self {
        Self { api, policy }
    }

    pub fn policy(&self) -> PollPolicy {
        self.policy
    }

    /// Solve a challenge and return the token.
    pub async fn solve(&self, site_key: &str, page_url: &str) -> Result<String, SolverError> {
        let mut ctx = ChallengeContext::new(site_key, page_url);
        self.solve_context(&mut ctx).await
    }

    /// Solve, recording the task id and token on `ctx` as they arrive.
    pub async fn solve_context(&self, ctx: &mut ChallengeContext) -> Result<String, SolverError> {
        info!(
            "Submitting challenge (sitekey={}) for {}",
            ctx.site_key, ctx.page_url
        );
        let task_id = self.api.submit(&ctx.site_key, &ctx.page_url).await?;
        debug!("Solver task id: {}", task_id);
        ctx.task_id = Some(task_id.clone());

        let started = Instant::now();
        for attempt in 1..=self.policy.max_polls {
            tokio::time::sleep(self.policy.interval).await;

            match self.api.poll(&task_id).await? {
                PollStatus::Pending => {
                    debug!(
                        "Task {} not ready ({}/{})",
                        task_id, attempt, self.policy.max_polls
                    );
                }
                PollStatus::Solved(token) => {
                    info!(
                        "Challenge solved after {} polls, token {}",
                        attempt,
                        token_preview(&token)
                    );
                    ctx.token = Some(token.clone());
                    return Ok(token);
                }
                PollStatus::Failed(reason) => {
                    warn!("Solver failed task {}: {}", task_id, reason);
                    return Err(SolverError::Service(reason));
                }
            }
        }

        let elapsed = started.elapsed();
        warn!(
            "Solver timed out on task {} after {:?}",
            task_id, elapsed
        );
        Err(SolverError::Timeout {
            attempts: self.policy.max_polls,
            elapsed,
        })
    }
}
