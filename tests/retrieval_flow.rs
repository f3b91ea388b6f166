//! End-to-end retrieval flows against scripted browser pages.
//!
//! Time is paused so settle waits, poll intervals and retry delays run
//! instantly.

mod common;

use std::sync::Arc;
use std::time::Duration;

use regacquire::challenge::{ChallengeSolver, PollPolicy};
use regacquire::config::RetrievalConfig;
use regacquire::models::{DocumentFormat, FailureKind, OutputMode, RetrievalOutcome, RetrievalRequest};
use regacquire::retrieval::{Navigation, Retriever};

use common::*;

const FILING_URL: &str = "https://apps.cpuc.example.gov/proceedings/A2411012";
const PDF_URL: &str = "https://docs.cpuc.example.gov/PublishedDocs/Efile/G000/M512/K345/512345678.PDF";

fn request(url: &str, mode: OutputMode) -> RetrievalRequest {
    RetrievalRequest::parse(url)
        .unwrap()
        .with_mode(mode)
        .with_wait(Duration::from_secs(2))
}

fn retriever(factory: Arc<FakeFactory>, direct: Arc<FakeDirect>) -> Retriever {
    Retriever::new(factory, direct, RetrievalConfig::default())
}

fn solver(api: Arc<CountingSolver>) -> ChallengeSolver {
    ChallengeSolver::new(api, PollPolicy::default())
}

#[tokio::test(start_paused = true)]
async fn test_page_without_widget_never_calls_solver() {
    let page = FakePage::new(&[ARTICLE_PAGE]);
    let log = page.log();
    let api = Arc::new(CountingSolver::default());

    let retriever = retriever(FakeFactory::with_page(page), Arc::new(FakeDirect::new()))
        .with_solver(solver(api.clone()));
    let outcome = retriever
        .retrieve(&request(FILING_URL, OutputMode::RenderedHtml))
        .await;

    match outcome {
        RetrievalOutcome::Html(html) => assert!(html.contains("Reply comments")),
        other => panic!("expected html, got {:?}", other),
    }
    assert_eq!(api.submits(), 0);
    assert!(log.lock().unwrap().closed);
}

#[tokio::test(start_paused = true)]
async fn test_long_page_mentioning_security_check_is_returned() {
    let page_html = long_decision_page();
    let page = FakePage::new(&[page_html.as_str()]);
    let log = page.log();

    let retriever = retriever(FakeFactory::with_page(page), Arc::new(FakeDirect::new()));
    let outcome = retriever
        .retrieve(&request(FILING_URL, OutputMode::RenderedHtml))
        .await;

    assert!(matches!(outcome, RetrievalOutcome::Html(ref html) if html.contains("Decision 24-11-002")));
    let log = log.lock().unwrap();
    assert_eq!(log.reloads, 0);
    assert!(log.persisted);
}

#[tokio::test(start_paused = true)]
async fn test_navigation_timeout_keeps_partial_content() {
    let page = FakePage::new(&[ARTICLE_PAGE]).with_nav(NavBehavior::Timeout);
    let log = page.log();
    let direct = Arc::new(FakeDirect::new());

    let retriever = retriever(FakeFactory::with_page(page), direct.clone());
    let outcome = retriever
        .retrieve(&request(FILING_URL, OutputMode::RenderedHtml))
        .await;

    assert!(matches!(outcome, RetrievalOutcome::Html(ref html) if html.contains("Reply comments")));
    assert_eq!(log.lock().unwrap().navigations, 1);
    assert!(direct.calls().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_navigation_timeout_without_content_is_reported() {
    let page = FakePage::new(&[""]).with_nav(NavBehavior::Timeout);

    let retriever = retriever(FakeFactory::with_page(page), Arc::new(FakeDirect::new()));
    let outcome = retriever
        .retrieve(&request(FILING_URL, OutputMode::RenderedHtml))
        .await;

    match outcome {
        RetrievalOutcome::Failure(failure) => assert_eq!(failure.kind, FailureKind::NavigationTimeout),
        other => panic!("expected navigation timeout, got {:?}", other),
    }
}

#[tokio::test(start_paused = true)]
async fn test_viewer_wrapper_is_followed_to_document() {
    let pdf = pdf_with_pages(&["Proposed Decision"]);
    let page = FakePage::new(&[VIEWER_WRAPPER_PAGE]).with_body(pdf.clone());
    let log = page.log();
    let direct = Arc::new(FakeDirect::new());

    let retriever = retriever(FakeFactory::with_page(page), direct.clone());
    let outcome = retriever.retrieve(&request(FILING_URL, OutputMode::Document)).await;

    assert_eq!(
        outcome,
        RetrievalOutcome::Binary {
            bytes: pdf,
            content_type_hint: DocumentFormat::Pdf,
        }
    );
    assert_eq!(log.lock().unwrap().navigations, 2);
    assert!(direct.calls().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_viewer_hop_limit_reports_unresolved() {
    let page = FakePage::new(&[VIEWER_WRAPPER_PAGE]);
    let log = page.log();
    let config = RetrievalConfig {
        max_viewer_hops: 0,
        ..Default::default()
    };

    let retriever = Retriever::new(FakeFactory::with_page(page), Arc::new(FakeDirect::new()), config);
    let outcome = retriever.retrieve(&request(FILING_URL, OutputMode::Document)).await;

    match outcome {
        RetrievalOutcome::Failure(failure) => {
            assert_eq!(failure.kind, FailureKind::ViewerUnresolved);
            assert!(failure.detail.contains("/files/123.pdf"));
        }
        other => panic!("expected unresolved viewer, got {:?}", other),
    }
    let log = log.lock().unwrap();
    assert_eq!(log.navigations, 1);
    assert!(!log.persisted);
}

#[tokio::test(start_paused = true)]
async fn test_solver_failure_recovers_through_direct_request() {
    let page = FakePage::new(&[WIDGET_PAGE]);
    let log = page.log();
    let article = long_decision_page();
    let direct = Arc::new(FakeDirect::new().serve(FILING_URL, 200, "text/html", article.as_bytes()));
    let api = Arc::new(FailingSolver::default());

    let retriever = retriever(FakeFactory::with_page(page), direct.clone())
        .with_solver(ChallengeSolver::new(api.clone(), PollPolicy::default()));
    let outcome = retriever
        .retrieve(&request(FILING_URL, OutputMode::RenderedHtml))
        .await;

    assert_eq!(outcome, RetrievalOutcome::Html(article));
    assert_eq!(api.submits.load(std::sync::atomic::Ordering::SeqCst), 1);
    assert_eq!(direct.calls().len(), 1);
    assert!(log.lock().unwrap().injected.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_new_site_key_after_retry_is_solved_again() {
    let page = FakePage::new(&[WIDGET_PAGE, INTERSTITIAL_PAGE, ROTATED_WIDGET_PAGE, ARTICLE_PAGE]);
    let log = page.log();
    let api = Arc::new(CountingSolver::default());

    let retriever = retriever(FakeFactory::with_page(page), Arc::new(FakeDirect::new()))
        .with_solver(solver(api.clone()));
    let outcome = retriever
        .retrieve(&request(FILING_URL, OutputMode::RenderedHtml))
        .await;

    assert!(matches!(outcome, RetrievalOutcome::Html(ref html) if html.contains("Reply comments")));
    assert_eq!(api.submits(), 2);
    let log = log.lock().unwrap();
    assert_eq!(log.injected.len(), 2);
    assert_eq!(log.reloads, 1);
}

#[tokio::test(start_paused = true)]
async fn test_widget_is_solved_once_and_token_injected() {
    let page = FakePage::new(&[WIDGET_PAGE, ARTICLE_PAGE]);
    let log = page.log();
    let api = Arc::new(CountingSolver::default());

    let retriever = retriever(FakeFactory::with_page(page), Arc::new(FakeDirect::new()))
        .with_solver(solver(api.clone()));
    let outcome = retriever
        .retrieve(&request(FILING_URL, OutputMode::RenderedHtml))
        .await;

    assert!(matches!(outcome, RetrievalOutcome::Html(ref html) if html.contains("Docket 24-112")));
    assert_eq!(api.submits(), 1);
    let log = log.lock().unwrap();
    assert_eq!(log.injected, vec!["0.solved-token-value".to_string()]);
    assert!(log.persisted);
    assert!(log.closed);
}

#[tokio::test(start_paused = true)]
async fn test_widget_without_solver_falls_back_then_fails() {
    let page = FakePage::new(&[WIDGET_PAGE]);
    let direct = Arc::new(FakeDirect::new());

    let retriever = retriever(FakeFactory::with_page(page), direct.clone());
    let outcome = retriever
        .retrieve(&request(FILING_URL, OutputMode::RenderedHtml))
        .await;

    match outcome {
        RetrievalOutcome::Failure(failure) => {
            assert_eq!(failure.kind, FailureKind::ChallengeUnsolved);
            assert!(failure.detail.contains("no solver"));
        }
        other => panic!("expected failure, got {:?}", other),
    }
    assert_eq!(direct.calls().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_aborted_pdf_navigation_uses_direct_transport() {
    let page = FakePage::new(&[""])
        .with_nav(NavBehavior::Abort)
        .with_cookie("cf_clearance", "abc123");
    let log = page.log();
    let pdf = pdf_with_pages(&["Decision 25-01-004"]);
    let direct = Arc::new(FakeDirect::new().serve(PDF_URL, 200, "application/pdf", &pdf));

    let retriever = retriever(FakeFactory::with_page(page), direct.clone());
    let outcome = retriever.retrieve(&request(PDF_URL, OutputMode::Document)).await;

    match outcome {
        RetrievalOutcome::Binary {
            bytes,
            content_type_hint,
        } => {
            assert_eq!(content_type_hint, DocumentFormat::Pdf);
            assert_eq!(bytes, pdf);
        }
        other => panic!("expected binary, got {:?}", other),
    }

    let calls = direct.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].cookie_names, vec!["cf_clearance".to_string()]);
    assert!(log.lock().unwrap().closed);
}

#[tokio::test(start_paused = true)]
async fn test_interstitial_gives_up_after_retry_cap() {
    let page = FakePage::new(&[INTERSTITIAL_PAGE]);
    let log = page.log();
    let direct = Arc::new(FakeDirect::new().serve(
        FILING_URL,
        200,
        "text/html",
        INTERSTITIAL_PAGE.as_bytes(),
    ));

    let retriever = retriever(FakeFactory::with_page(page), direct.clone());
    let outcome = retriever
        .retrieve(&request(FILING_URL, OutputMode::RenderedHtml))
        .await;

    match outcome {
        RetrievalOutcome::Failure(failure) => {
            assert_eq!(failure.kind, FailureKind::StillChallenged);
            assert!(failure.detail.contains("after 5 security-check retries"));
        }
        other => panic!("expected failure, got {:?}", other),
    }
    let log = log.lock().unwrap();
    assert_eq!(log.reloads, 5);
    assert!(!log.persisted);
    assert!(log.closed);
}

#[tokio::test(start_paused = true)]
async fn test_budget_expiry_closes_session() {
    let page = FakePage::new(&[ARTICLE_PAGE]).with_nav(NavBehavior::Hang);
    let log = page.log();

    let retriever = retriever(FakeFactory::with_page(page), Arc::new(FakeDirect::new()));
    let request = request(FILING_URL, OutputMode::RenderedHtml).with_budget(Duration::from_secs(30));
    let outcome = retriever.retrieve(&request).await;

    match outcome {
        RetrievalOutcome::Failure(failure) => assert_eq!(failure.kind, FailureKind::Timeout),
        other => panic!("expected timeout, got {:?}", other),
    }
    assert!(log.lock().unwrap().closed);
}

#[tokio::test(start_paused = true)]
async fn test_missing_browser_goes_straight_to_direct() {
    let pdf = pdf_with_pages(&["Resolution E-5300"]);
    let direct = Arc::new(FakeDirect::new().serve(PDF_URL, 200, "application/octet-stream", &pdf));

    let retriever = retriever(FakeFactory::unavailable(), direct.clone());
    let outcome = retriever.retrieve(&request(PDF_URL, OutputMode::Document)).await;

    assert!(matches!(
        outcome,
        RetrievalOutcome::Binary {
            content_type_hint: DocumentFormat::Pdf,
            ..
        }
    ));
    assert_eq!(direct.calls().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_missing_browser_and_failed_direct_reports_browser_unavailable() {
    let retriever = retriever(FakeFactory::unavailable(), Arc::new(FakeDirect::new()));
    let outcome = retriever.retrieve(&request(PDF_URL, OutputMode::Document)).await;

    match outcome {
        RetrievalOutcome::Failure(failure) => {
            assert_eq!(failure.kind, FailureKind::BrowserUnavailable);
            assert!(failure.detail.contains("connection refused"));
        }
        other => panic!("expected failure, got {:?}", other),
    }
}

#[tokio::test(start_paused = true)]
async fn test_document_mode_keeps_page_when_direct_finds_nothing() {
    let page = FakePage::new(&[ARTICLE_PAGE]);
    let direct = Arc::new(FakeDirect::new().serve(FILING_URL, 404, "text/html", b"<h1>404 Not Found</h1>"));

    let retriever = retriever(FakeFactory::with_page(page), direct.clone());
    let outcome = retriever.retrieve(&request(FILING_URL, OutputMode::Document)).await;

    assert!(matches!(outcome, RetrievalOutcome::Html(ref html) if html.contains("Docket 24-112")));
    assert_eq!(direct.calls().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_document_response_headers_read_body_from_browser() {
    let pdf = pdf_with_pages(&["Order Instituting Rulemaking"]);
    let mut headers = std::collections::HashMap::new();
    headers.insert("content-type".to_string(), "application/pdf".to_string());
    let page = FakePage::new(&[""]).with_nav(NavBehavior::Ok(Navigation {
        status: Some(200),
        headers,
        ..Default::default()
    }));
    let page = page.with_body(pdf.clone());
    let direct = Arc::new(FakeDirect::new());

    let retriever = retriever(FakeFactory::with_page(page), direct.clone());
    let outcome = retriever
        .retrieve(&request("https://docs.cpuc.example.gov/SearchRes.aspx?docid=512345678", OutputMode::Document))
        .await;

    assert_eq!(
        outcome,
        RetrievalOutcome::Binary {
            bytes: pdf,
            content_type_hint: DocumentFormat::Pdf,
        }
    );
    assert!(direct.calls().is_empty());
}
