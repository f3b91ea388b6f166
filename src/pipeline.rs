//! Retrieval, classification and extraction composed into one call.

use std::sync::Arc;

use thiserror::Error;
use tracing::{info, warn};

use crate::browser::ChromeSessionFactory;
use crate::challenge::{ChallengeSolver, SolverError, TwoCaptchaApi};
use crate::config::{Config, ConfigError};
use crate::extract::TextExtractor;
use crate::http_client::{resolve_user_agent, HttpTransport};
use crate::models::{
    AcquiredDocument, DocumentFormat, ExtractedText, ExtractionWarning, RetrievalFailure,
    RetrievalOutcome, RetrievalRequest,
};
use crate::retrieval::Retriever;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Solver setup failed: {0}")]
    Solver(#[from] SolverError),
}

pub struct DocumentPipeline {
    retriever: Retriever,
    extractor: TextExtractor,
}

impl DocumentPipeline {
    pub fn new(retriever: Retriever, extractor: TextExtractor) -> Self {
        Self {
            retriever,
            extractor,
        }
    }

    /// Build the production pipeline: Chrome sessions, reqwest fallback,
    /// and the solving service when an API key is configured.
    pub fn from_config(config: &Config) -> Result<Self, PipelineError> {
        let sessions = Arc::new(ChromeSessionFactory::new(
            config.browser.clone(),
            config.retrieval.clone(),
        ));
        let direct = Arc::new(HttpTransport::new(
            resolve_user_agent(config.browser.user_agent.as_deref()),
            config.retrieval.direct_timeout(),
        ));

        let mut retriever = Retriever::new(sessions, direct, config.retrieval.clone());
        if config.solver.is_configured() {
            let api = TwoCaptchaApi::new(&config.solver)?;
            retriever = retriever.with_solver(ChallengeSolver::new(
                Arc::new(api),
                config.solver.poll_policy(),
            ));
        } else {
            warn!("No solver API key configured; challenge pages cannot be solved");
        }

        Ok(Self::new(retriever, TextExtractor::new()))
    }

    pub fn retriever(&self) -> &Retriever {
        &self.retriever
    }

    /// Retrieve `request.url` and extract its text.
    pub async fn acquire(&self, request: &RetrievalRequest) -> Result<AcquiredDocument, RetrievalFailure> {
        let (content, format) = match self.retriever.retrieve(request).await {
            RetrievalOutcome::Failure(failure) => return Err(failure),
            RetrievalOutcome::Html(html) => (html.into_bytes(), DocumentFormat::Html),
            RetrievalOutcome::Binary {
                bytes,
                content_type_hint,
            } => (bytes, content_type_hint),
        };

        let (content, extracted) = self.extract(content, format).await;
        info!(
            "Acquired {} ({}, {} bytes, {} chars of text, {} warnings)",
            request.url,
            format,
            content.len(),
            extracted.text_len(),
            extracted.warnings.len()
        );

        Ok(AcquiredDocument::new(request.url.as_str(), format, content, extracted))
    }

    /// Extraction parses and may shell out, so it runs off the async workers.
    async fn extract(&self, content: Vec<u8>, format: DocumentFormat) -> (Vec<u8>, ExtractedText) {
        let extractor = self.extractor;
        extract_blocking(content, format, move |bytes| extractor.extract(bytes, Some(format))).await
    }
}

/// Run `extract` on a blocking thread. The content comes back intact even
/// when the extraction task dies.
async fn extract_blocking<F>(content: Vec<u8>, format: DocumentFormat, extract: F) -> (Vec<u8>, ExtractedText)
where
    F: FnOnce(&[u8]) -> ExtractedText + Send + 'static,
{
    let content = Arc::new(content);
    let shared = content.clone();
    let result = tokio::task::spawn_blocking(move || extract(&shared)).await;

    let extracted = match result {
        Ok(extracted) => extracted,
        Err(e) => {
            warn!("Extraction task failed: {}", e);
            let mut extracted = ExtractedText::new(format);
            extracted.warn(ExtractionWarning::ParseFailed {
                detail: format!("extraction task failed: {}", e),
            });
            extracted
        }
    };
    let content = Arc::try_unwrap(content).unwrap_or_else(|shared| shared.as_ref().clone());
    (content, extracted)
}
