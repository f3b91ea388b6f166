//! 2Captcha-compatible HTTP solving service.
//!
//! Submit: `POST in.php` with `key, method, sitekey, pageurl, json=1`.
//! Poll: `GET res.php` with `key, action=get, id, json=1`.
//! Both answer `{"status": 0|1, "request": "..."}`.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use super::solver::{PollStatus, SolverApi, SolverError};
use crate::config::SolverConfig;

/// Response body returned by the service for submit and poll.
#[derive(Debug, Deserialize)]
struct ServiceResponse {
    status: i64,
    #[serde(default)]
    request: String,
    #[serde(default)]
    error_text: Option<String>,
}

impl ServiceResponse {
    fn error_message(&self) -> String {
        match &self.error_text {
            Some(text) if !text.is_empty() => format!("{} ({})", self.request, text),
            _ => self.request.clone(),
        }
    }
}

/// Marker the service returns while a task is still being worked on.
const NOT_READY: &str = "CAPCHA_NOT_READY";

/// HTTP client for a 2Captcha-style API.
pub struct TwoCaptchaApi {
    client: reqwest::Client,
    api_key: String,
    submit_url: String,
    result_url: String,
    method: String,
}

impl TwoCaptchaApi {
    pub fn new(config: &SolverConfig) -> Result<Self, SolverError> {
        let api_key = config
            .api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .ok_or(SolverError::MissingApiKey)?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;

        Ok(Self {
            client,
            api_key,
            submit_url: config.submit_url.clone(),
            result_url: config.result_url.clone(),
            method: config.method.clone(),
        })
    }
}

#[async_trait]
impl SolverApi for TwoCaptchaApi {
    async fn submit(&self, site_key: &str, page_url: &str) -> Result<String, SolverError> {
        let response: ServiceResponse = self
            .client
            .post(&self.submit_url)
            .form(&[
                ("key", self.api_key.as_str()),
                ("method", self.method.as_str()),
                ("sitekey", site_key),
                ("pageurl", page_url),
                ("json", "1"),
            ])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        debug!("Submit response status={}", response.status);

        if response.status != 1 {
            return Err(SolverError::Submit(response.error_message()));
        }
        if response.request.is_empty() {
            return Err(SolverError::InvalidResponse(
                "submit succeeded without a task id".to_string(),
            ));
        }
        Ok(response.request)
    }

    async fn poll(&self, task_id: &str) -> Result<PollStatus, SolverError> {
        let response: ServiceResponse = self
            .client
            .get(&self.result_url)
            .query(&[
                ("key", self.api_key.as_str()),
                ("action", "get"),
                ("id", task_id),
                ("json", "1"),
            ])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        Ok(interpret_poll(response))
    }
}

fn interpret_poll(response: ServiceResponse) -> PollStatus {
    if response.status == 1 && !response.request.is_empty() {
        PollStatus::Solved(response.request)
    } else if response.request == NOT_READY {
        PollStatus::Pending
    } else {
        PollStatus::Failed(response.error_message())
    }
}
