//! Multi-strategy retrieval.
//!
//! A retrieval drives one browser page through an explicit state machine:
//!
//! ```text
//! Init -> Navigated -> ChallengeCheck -> Solving -> Injected -> ChallengeCheck
//!                                     \-> Resolved -> Classified -> Done
//!                                                               \-> SecurityRetry | Init (viewer hop) | Direct
//! ```
//!
//! The direct transport (plain HTTP with the page's cookies) is tried at
//! most once per retrieval, except that a followed viewer hop may use it
//! again when no browser is available.

mod detached;
mod state;
mod strategy;
mod transport;

use std::sync::Arc;

use tokio::time::{sleep, timeout_at, Instant};
use tracing::{debug, info, info_span, warn, Instrument};
use url::Url;
use uuid::Uuid;

use crate::challenge::{detect_site_key, ChallengeContext, ChallengeSolver};
use crate::classify::classify;
use crate::config::RetrievalConfig;
use crate::models::{
    ContentKind, DocumentFormat, FailureKind, OutputMode, RetrievalOutcome, RetrievalRequest,
};

use state::{Attempt, Fallback, Held, RetrievalState, Via};
use strategy::{direct_candidates, is_document_response, is_document_url, NAVIGATION_ORDER};

pub use detached::DetachedPage;
pub use strategy::is_challenge_url;
pub use transport::{
    is_abort_message, BrowserCookie, DirectRequest, DirectTransport, FetchedBody, InjectOutcome,
    Navigation, PageDriver, SessionFactory, TransportError, WaitUntil,
};

/// Orchestrates browser navigation, challenge solving and direct-request
/// fallback for one request at a time per call.
pub struct Retriever {
    sessions: Arc<dyn SessionFactory>,
    direct: Arc<dyn DirectTransport>,
    solver: Option<ChallengeSolver>,
    config: RetrievalConfig,
}

impl Retriever {
    pub fn new(
        sessions: Arc<dyn SessionFactory>,
        direct: Arc<dyn DirectTransport>,
        config: RetrievalConfig,
    ) -> Self {
        Self {
            sessions,
            direct,
            solver: None,
            config,
        }
    }

    pub fn with_solver(mut self, solver: ChallengeSolver) -> Self {
        self.solver = Some(solver);
        self
    }

    pub fn config(&self) -> &RetrievalConfig {
        &self.config
    }

    /// Retrieve `request.url`. Never panics or errors; failures come back
    /// as `RetrievalOutcome::Failure`. The browser page is closed on every
    /// path, including budget expiry.
    pub async fn retrieve(&self, request: &RetrievalRequest) -> RetrievalOutcome {
        let request_id = Uuid::new_v4();
        let span = info_span!("retrieve", url = %request.url, %request_id, mode = request.mode.as_str());
        self.retrieve_within_budget(request).instrument(span).await
    }

    async fn retrieve_within_budget(&self, request: &RetrievalRequest) -> RetrievalOutcome {
        let deadline = Instant::now() + request.budget;

        let mut page: Box<dyn PageDriver> =
            match timeout_at(deadline, self.sessions.open(request)).await {
                Err(_) => return budget_exceeded(request),
                Ok(Ok(page)) => page,
                Ok(Err(e)) => {
                    warn!("Browser session unavailable, using direct requests only: {}", e);
                    Box::new(DetachedPage::new(e.to_string()))
                }
            };

        let outcome = match timeout_at(deadline, self.drive(page.as_mut(), request)).await {
            Ok(outcome) => outcome,
            Err(_) => {
                warn!("Retrieval exceeded its budget of {:?}", request.budget);
                budget_exceeded(request)
            }
        };

        if !outcome.is_failure() {
            page.persist_cookies().await;
        }
        page.close().await;
        info!("Retrieval finished: {}", outcome.variant_name());
        outcome
    }

    async fn drive(&self, page: &mut dyn PageDriver, request: &RetrievalRequest) -> RetrievalOutcome {
        let mut attempt = Attempt::new(request.url.clone());
        let mut state = RetrievalState::Init;

        loop {
            debug!("Retrieval state: {}", state.name());
            state = match state {
                RetrievalState::Init => self.navigate(page, &mut attempt).await,
                RetrievalState::Navigated(nav) => {
                    self.after_navigation(page, &mut attempt, request, nav).await
                }
                RetrievalState::ChallengeCheck => self.check_challenge(page, &attempt).await,
                RetrievalState::Solving { site_key } => {
                    self.solve(page, &mut attempt, site_key).await
                }
                RetrievalState::Injected => self.settle(page, &mut attempt).await,
                RetrievalState::SecurityRetry => self.security_retry(page, &mut attempt).await,
                RetrievalState::Resolved(held) => {
                    let classified = classify(&held.bytes, &held.headers, Some(&held.url));
                    RetrievalState::Classified(held, classified)
                }
                RetrievalState::Classified(held, classified) => {
                    self.decide(held, classified.kind, &mut attempt, request)
                }
                RetrievalState::Direct(fallback) => {
                    self.direct(page, &mut attempt, request, fallback).await
                }
                RetrievalState::Done(outcome) => return outcome,
            };
        }
    }

    /// Navigate to the current target, most lenient wait strategy first.
    async fn navigate(&self, page: &mut dyn PageDriver, attempt: &mut Attempt) -> RetrievalState {
        let target = attempt.target.clone();
        let timeout = self.config.navigation_timeout();
        attempt.partial = false;

        let mut last_error = None;
        for wait in NAVIGATION_ORDER {
            info!("Navigating to {} (wait_until={})", target, wait.as_str());
            match page.navigate(&target, wait, timeout).await {
                Ok(nav) => return RetrievalState::Navigated(nav),
                Err(e) if e.is_timeout() => {
                    warn!("Navigation timed out, keeping partial content: {}", e);
                    attempt.partial = true;
                    return RetrievalState::Navigated(Default::default());
                }
                Err(e) if e.is_abort() => {
                    warn!("Navigation aborted: {}", e);
                    return self.after_abort(page, attempt, e.to_string()).await;
                }
                Err(TransportError::BrowserUnavailable(reason)) => {
                    return RetrievalState::Direct(Fallback::new(
                        FailureKind::BrowserUnavailable,
                        reason,
                    ));
                }
                Err(e) => {
                    warn!("Navigation with wait_until={} failed: {}", wait.as_str(), e);
                    last_error = Some(e);
                }
            }
        }

        let detail = last_error
            .map(|e| e.to_string())
            .unwrap_or_else(|| "navigation failed".to_string());
        attempt.fall_back(Fallback::new(FailureKind::Transport, detail))
    }

    /// An aborted navigation usually means the browser turned the response
    /// into a download. Give the download listener a bounded chance, then
    /// hand off to the direct transport.
    async fn after_abort(
        &self,
        page: &mut dyn PageDriver,
        attempt: &mut Attempt,
        detail: String,
    ) -> RetrievalState {
        let wait = self.config.download_wait().min(self.config.navigation_timeout());
        if let Some(bytes) = page.await_download(wait).await {
            info!("Captured browser download ({} bytes)", bytes.len());
            return RetrievalState::Resolved(Held {
                bytes,
                headers: attempt.headers.clone(),
                url: attempt.target.clone(),
                via: Via::Download,
            });
        }
        attempt.fall_back(Fallback::new(FailureKind::TransportAborted, detail))
    }

    async fn after_navigation(
        &self,
        page: &mut dyn PageDriver,
        attempt: &mut Attempt,
        request: &RetrievalRequest,
        nav: Navigation,
    ) -> RetrievalState {
        if let Some(final_url) = nav.final_url.clone() {
            debug!("Landed on {} (status {:?})", final_url, nav.status);
        }
        attempt.headers = nav.headers.clone();

        if is_document_url(&attempt.target) || is_document_response(&nav.headers) {
            return self.capture_document(page, attempt, nav.final_url).await;
        }

        if !attempt.partial && !request.wait.is_zero() {
            debug!("Waiting {:?} for rendered content", request.wait);
            sleep(request.wait).await;
        }
        RetrievalState::ChallengeCheck
    }

    /// Binary fast path: read the response body directly.
    async fn capture_document(
        &self,
        page: &mut dyn PageDriver,
        attempt: &mut Attempt,
        final_url: Option<Url>,
    ) -> RetrievalState {
        let url = final_url.unwrap_or_else(|| attempt.target.clone());

        match page.response_body().await {
            Ok(bytes) if !bytes.is_empty() => {
                info!("Read document stream from browser ({} bytes)", bytes.len());
                return RetrievalState::Resolved(Held {
                    bytes,
                    headers: attempt.headers.clone(),
                    url,
                    via: Via::Browser,
                });
            }
            Ok(_) => debug!("Browser returned an empty document body"),
            Err(e) if e.is_abort() => {
                warn!("Document stream aborted in browser: {}", e);
                return self.after_abort(page, attempt, e.to_string()).await;
            }
            Err(e) => debug!("Could not read response body: {}", e),
        }

        self.after_abort(page, attempt, "browser could not read the document stream".to_string())
            .await
    }

    async fn check_challenge(&self, page: &mut dyn PageDriver, attempt: &Attempt) -> RetrievalState {
        let html = match page.content().await {
            Ok(html) => html,
            Err(e) => {
                let kind = if attempt.partial {
                    FailureKind::NavigationTimeout
                } else {
                    FailureKind::Transport
                };
                return attempt.fall_back(Fallback::new(kind, format!("could not read page: {}", e)));
            }
        };

        if html.trim().is_empty() && attempt.partial {
            return attempt.fall_back(Fallback::new(
                FailureKind::NavigationTimeout,
                "navigation timed out before any content arrived",
            ));
        }

        let url = page
            .current_url()
            .await
            .unwrap_or_else(|| attempt.target.clone());

        match detect_site_key(&html) {
            Some(site_key) if attempt.solved_site_key.as_deref() != Some(site_key.as_str()) => {
                info!("Challenge widget detected (sitekey={})", site_key);
                RetrievalState::Solving { site_key }
            }
            Some(_) => {
                debug!("Same challenge widget as the one already answered");
                RetrievalState::Resolved(self.hold_page(html, attempt, url))
            }
            None => RetrievalState::Resolved(self.hold_page(html, attempt, url)),
        }
    }

    fn hold_page(&self, html: String, attempt: &Attempt, url: Url) -> Held {
        Held {
            bytes: html.into_bytes(),
            headers: attempt.headers.clone(),
            url,
            via: Via::Browser,
        }
    }

    async fn solve(
        &self,
        page: &mut dyn PageDriver,
        attempt: &mut Attempt,
        site_key: String,
    ) -> RetrievalState {
        let Some(solver) = &self.solver else {
            return attempt.fall_back(Fallback::new(
                FailureKind::ChallengeUnsolved,
                "challenge widget present but no solver is configured",
            ));
        };

        let page_url = page
            .current_url()
            .await
            .unwrap_or_else(|| attempt.target.clone());
        let mut ctx = ChallengeContext::new(site_key, page_url.as_str());

        let token = match solver.solve_context(&mut ctx).await {
            Ok(token) => token,
            Err(e) => {
                warn!("Challenge not solved: {}", e);
                return attempt.fall_back(Fallback::new(FailureKind::ChallengeUnsolved, e.to_string()));
            }
        };

        match page.inject_token(&token).await {
            Ok(how) => {
                info!("Token injected ({:?})", how);
                attempt.solved_site_key = Some(ctx.site_key);
                RetrievalState::Injected
            }
            Err(e) => attempt.fall_back(Fallback::new(
                FailureKind::ChallengeUnsolved,
                format!("token injection failed: {}", e),
            )),
        }
    }

    /// Wait for the page to settle after token submission.
    async fn settle(&self, page: &mut dyn PageDriver, attempt: &mut Attempt) -> RetrievalState {
        let quiescence = self.config.quiescence_timeout();
        if !page.wait_for_quiescence(quiescence).await {
            info!(
                "No network quiescence within {:?}, waiting {:?} more",
                quiescence,
                self.config.settle_delay()
            );
            sleep(self.config.settle_delay()).await;
        }

        if let Some(current) = page.current_url().await {
            if is_document_url(&current) {
                attempt.target = current.clone();
                return self.capture_document(page, attempt, Some(current)).await;
            }
        }
        RetrievalState::ChallengeCheck
    }

    /// Page still shows a security check: wait, try a continue control or
    /// reload, then look for a new widget.
    async fn security_retry(&self, page: &mut dyn PageDriver, attempt: &mut Attempt) -> RetrievalState {
        attempt.security_retries += 1;
        info!(
            "Security check still present, retry {}/{}",
            attempt.security_retries, self.config.max_security_retries
        );
        sleep(self.config.security_retry_delay()).await;

        match page.click_continue().await {
            Ok(true) => {
                debug!("Clicked continue control");
                page.wait_for_quiescence(self.config.quiescence_timeout()).await;
            }
            Ok(false) | Err(_) => {
                if let Err(e) = page.reload(self.config.navigation_timeout()).await {
                    warn!("Reload failed during security retry: {}", e);
                }
            }
        }
        RetrievalState::ChallengeCheck
    }

    fn decide(
        &self,
        held: Held,
        kind: ContentKind,
        attempt: &mut Attempt,
        request: &RetrievalRequest,
    ) -> RetrievalState {
        debug!("Decision on {:?} content from {}: {:?}", held.via, held.url, kind);
        match kind {
            ContentKind::Document(DocumentFormat::Html) => {
                let html = String::from_utf8_lossy(&held.bytes).into_owned();
                if request.mode == OutputMode::Document && held.via != Via::Direct && !attempt.direct_tried {
                    info!("Expected a document but got a page, trying a direct request");
                    return RetrievalState::Direct(
                        Fallback::new(FailureKind::Transport, "page returned instead of document")
                            .keeping(RetrievalOutcome::Html(html)),
                    );
                }
                RetrievalState::Done(RetrievalOutcome::Html(html))
            }
            ContentKind::Document(format) => RetrievalState::Done(RetrievalOutcome::Binary {
                bytes: held.bytes,
                content_type_hint: format,
            }),
            ContentKind::ChallengePage => {
                if attempt.security_retries < self.config.max_security_retries {
                    RetrievalState::SecurityRetry
                } else {
                    attempt.fall_back(Fallback::new(
                        FailureKind::StillChallenged,
                        format!(
                            "still challenged after {} security-check retries",
                            attempt.security_retries
                        ),
                    ))
                }
            }
            ContentKind::ErrorPage => attempt.fall_back(Fallback::new(
                FailureKind::ErrorPage,
                format!("error page at {}", held.url),
            )),
            ContentKind::Redirectable(embedded) => {
                if request.mode == OutputMode::RenderedHtml {
                    let html = String::from_utf8_lossy(&held.bytes).into_owned();
                    return RetrievalState::Done(RetrievalOutcome::Html(html));
                }
                self.follow_viewer(embedded, attempt)
            }
        }
    }

    fn follow_viewer(&self, embedded: String, attempt: &mut Attempt) -> RetrievalState {
        if attempt.viewer_hops >= self.config.max_viewer_hops {
            return attempt.fall_back(Fallback::new(
                FailureKind::ViewerUnresolved,
                format!("viewer hop limit reached at {}", embedded),
            ));
        }
        match Url::parse(&embedded) {
            Ok(url) => {
                attempt.viewer_hops += 1;
                info!("Following embedded viewer to {}", url);
                attempt.target = url;
                RetrievalState::Init
            }
            Err(e) => attempt.fall_back(Fallback::new(
                FailureKind::ViewerUnresolved,
                format!("bad viewer URL {}: {}", embedded, e),
            )),
        }
    }

    /// Plain request with the page's cookies and the request's proxy.
    async fn direct(
        &self,
        page: &mut dyn PageDriver,
        attempt: &mut Attempt,
        request: &RetrievalRequest,
        fallback: Fallback,
    ) -> RetrievalState {
        attempt.direct_tried = true;
        info!(
            "Trying direct request after {}: {}",
            fallback.kind, fallback.detail
        );

        let cookies = page.cookies().await;
        let current = page.current_url().await;
        let wants_better = fallback.on_failure.is_some();

        let mut errors = Vec::new();
        for url in direct_candidates(&attempt.target, current.as_ref()) {
            let result = self
                .direct
                .get(DirectRequest {
                    url: &url,
                    cookies: &cookies,
                    referer: current.as_ref(),
                    proxy: request.proxy.as_ref(),
                })
                .await;

            match result {
                Ok(body) => match self.accept_direct(body, wants_better) {
                    Ok(state) => return state,
                    Err(reason) => {
                        debug!("Direct response from {} rejected: {}", url, reason);
                        errors.push(format!("{}: {}", url, reason));
                    }
                },
                Err(e) => {
                    warn!("Direct request to {} failed: {}", url, e);
                    errors.push(format!("{}: {}", url, e));
                }
            }
        }

        let mut fallback = fallback;
        fallback.detail = format!(
            "{}; direct request failed ({})",
            fallback.detail,
            errors.join("; ")
        );
        RetrievalState::Done(fallback.into_outcome())
    }

    /// Accept a direct response when it is real content.
    fn accept_direct(&self, body: FetchedBody, wants_document: bool) -> Result<RetrievalState, String> {
        if !body.is_success() {
            return Err(format!("HTTP {}", body.status));
        }

        let classified = classify(&body.bytes, &body.headers, Some(&body.final_url));
        match classified.kind {
            ContentKind::ChallengePage => return Err("still a challenge page".to_string()),
            ContentKind::ErrorPage => return Err("error page".to_string()),
            ContentKind::Document(format)
                if !format.is_binary_document()
                    && body.bytes.len() < self.config.min_direct_body_bytes =>
            {
                return Err(format!("body too short ({} bytes)", body.bytes.len()));
            }
            ContentKind::Document(DocumentFormat::Html) if wants_document => {
                return Err("page instead of document".to_string());
            }
            _ => {}
        }

        info!(
            "Direct request succeeded ({} bytes from {})",
            body.bytes.len(),
            body.final_url
        );
        Ok(RetrievalState::Classified(
            Held {
                bytes: body.bytes,
                headers: body.headers,
                url: body.final_url,
                via: Via::Direct,
            },
            classified,
        ))
    }
}

fn budget_exceeded(request: &RetrievalRequest) -> RetrievalOutcome {
    RetrievalOutcome::failure(
        FailureKind::Timeout,
        format!("exceeded request budget of {:?}", request.budget),
    )
}
