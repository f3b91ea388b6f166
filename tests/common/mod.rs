//! Shared fixtures: scripted browser pages, a canned direct transport, a
//! counting solver and document builders.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::io::{Cursor, Write};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, Stream};
use url::Url;
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

use regacquire::challenge::{PollStatus, SolverApi, SolverError};
use regacquire::models::RetrievalRequest;
use regacquire::retrieval::{
    BrowserCookie, DirectRequest, DirectTransport, FetchedBody, InjectOutcome, Navigation,
    PageDriver, SessionFactory, TransportError, WaitUntil,
};

pub const ARTICLE_PAGE: &str = "<html><head><title>Docket 24-112</title></head><body>\
    <h1>Docket 24-112</h1><p>Reply comments of the utility on the proposed rate design.</p>\
    </body></html>";

pub const WIDGET_PAGE: &str = "<html><head><title>Docket 24-112</title></head><body>\
    <form action=\"/verify\" method=\"post\"><div class=\"cf-turnstile\" data-sitekey=\"0x4AAAAAAABkMYinukE8nzY\"></div></form>\
    </body></html>";

/// Same layout as `WIDGET_PAGE` with a different site key.
pub const ROTATED_WIDGET_PAGE: &str = "<html><head><title>Docket 24-112</title></head><body>\
    <form action=\"/verify\" method=\"post\"><div class=\"cf-turnstile\" data-sitekey=\"0x4AAAAAAAC9xQrT2mPbLkWd\"></div></form>\
    </body></html>";

pub const VIEWER_WRAPPER_PAGE: &str = "<html><head><title>Filing viewer</title></head><body>\
    <iframe src=\"/files/123.pdf\" width=\"100%\"></iframe></body></html>";

pub const INTERSTITIAL_PAGE: &str = "<html><head><title>Just a moment...</title></head>\
    <body><p>Checking your browser before accessing the portal.</p></body></html>";

/// How `navigate` behaves.
#[derive(Debug, Clone)]
pub enum NavBehavior {
    Ok(Navigation),
    Abort,
    /// Times out after partial content arrived.
    Timeout,
    /// Never completes.
    Hang,
}

/// What a fake page was asked to do.
#[derive(Debug, Default)]
pub struct PageLog {
    pub navigations: u32,
    pub injected: Vec<String>,
    pub reloads: u32,
    pub persisted: bool,
    pub closed: bool,
}

pub struct FakePage {
    nav: NavBehavior,
    /// Each `content` call takes the front; the last one repeats.
    contents: VecDeque<String>,
    current_url: Option<Url>,
    body: Option<Vec<u8>>,
    cookies: Vec<BrowserCookie>,
    log: Arc<Mutex<PageLog>>,
}

impl FakePage {
    pub fn new(contents: &[&str]) -> Self {
        Self {
            nav: NavBehavior::Ok(Navigation {
                status: Some(200),
                ..Default::default()
            }),
            contents: contents.iter().map(|c| c.to_string()).collect(),
            current_url: None,
            body: None,
            cookies: Vec::new(),
            log: Arc::new(Mutex::new(PageLog::default())),
        }
    }

    pub fn with_nav(mut self, nav: NavBehavior) -> Self {
        self.nav = nav;
        self
    }

    pub fn with_body(mut self, body: Vec<u8>) -> Self {
        self.body = Some(body);
        self
    }

    pub fn with_cookie(mut self, name: &str, value: &str) -> Self {
        self.cookies.push(BrowserCookie {
            name: name.to_string(),
            value: value.to_string(),
            domain: String::new(),
            path: "/".to_string(),
            secure: false,
            http_only: false,
        });
        self
    }

    pub fn log(&self) -> Arc<Mutex<PageLog>> {
        self.log.clone()
    }
}

#[async_trait]
impl PageDriver for FakePage {
    async fn navigate(
        &mut self,
        url: &Url,
        _wait: WaitUntil,
        timeout: Duration,
    ) -> Result<Navigation, TransportError> {
        self.log.lock().unwrap().navigations += 1;
        self.current_url = Some(url.clone());
        match self.nav.clone() {
            NavBehavior::Ok(nav) => Ok(nav),
            NavBehavior::Abort => Err(TransportError::navigation(format!(
                "net::ERR_ABORTED at {}",
                url
            ))),
            NavBehavior::Timeout => Err(TransportError::Timeout(timeout)),
            NavBehavior::Hang => std::future::pending().await,
        }
    }

    async fn content(&mut self) -> Result<String, TransportError> {
        let next = if self.contents.len() > 1 {
            self.contents.pop_front()
        } else {
            self.contents.front().cloned()
        };
        Ok(next.unwrap_or_default())
    }

    async fn current_url(&mut self) -> Option<Url> {
        self.current_url.clone()
    }

    async fn response_body(&mut self) -> Result<Vec<u8>, TransportError> {
        Ok(self.body.clone().unwrap_or_default())
    }

    async fn await_download(&mut self, _timeout: Duration) -> Option<Vec<u8>> {
        None
    }

    async fn inject_token(&mut self, token: &str) -> Result<InjectOutcome, TransportError> {
        self.log.lock().unwrap().injected.push(token.to_string());
        Ok(InjectOutcome::FormSubmitted)
    }

    async fn wait_for_quiescence(&mut self, _timeout: Duration) -> bool {
        true
    }

    async fn click_continue(&mut self) -> Result<bool, TransportError> {
        Ok(false)
    }

    async fn reload(&mut self, _timeout: Duration) -> Result<(), TransportError> {
        self.log.lock().unwrap().reloads += 1;
        Ok(())
    }

    async fn cookies(&mut self) -> Vec<BrowserCookie> {
        self.cookies.clone()
    }

    async fn persist_cookies(&mut self) {
        self.log.lock().unwrap().persisted = true;
    }

    async fn close(&mut self) {
        self.log.lock().unwrap().closed = true;
    }
}

/// Hands out one prepared page, or fails every open.
pub struct FakeFactory {
    page: Mutex<Option<FakePage>>,
}

impl FakeFactory {
    pub fn with_page(page: FakePage) -> Arc<Self> {
        Arc::new(Self {
            page: Mutex::new(Some(page)),
        })
    }

    pub fn unavailable() -> Arc<Self> {
        Arc::new(Self {
            page: Mutex::new(None),
        })
    }
}

#[async_trait]
impl SessionFactory for FakeFactory {
    async fn open(&self, _request: &RetrievalRequest) -> Result<Box<dyn PageDriver>, TransportError> {
        match self.page.lock().unwrap().take() {
            Some(page) => Ok(Box::new(page)),
            None => Err(TransportError::BrowserUnavailable(
                "Chrome/Chromium not found".to_string(),
            )),
        }
    }
}

/// One recorded direct request.
#[derive(Debug, Clone)]
pub struct DirectCall {
    pub url: String,
    pub cookie_names: Vec<String>,
}

/// Serves canned bodies by URL; anything else is a connection failure.
#[derive(Default)]
pub struct FakeDirect {
    responses: HashMap<String, (u16, String, Vec<u8>)>,
    calls: Mutex<Vec<DirectCall>>,
}

impl FakeDirect {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn serve(mut self, url: &str, status: u16, content_type: &str, body: &[u8]) -> Self {
        self.responses
            .insert(url.to_string(), (status, content_type.to_string(), body.to_vec()));
        self
    }

    pub fn calls(&self) -> Vec<DirectCall> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl DirectTransport for FakeDirect {
    async fn get(&self, request: DirectRequest<'_>) -> Result<FetchedBody, TransportError> {
        self.calls.lock().unwrap().push(DirectCall {
            url: request.url.to_string(),
            cookie_names: request.cookies.iter().map(|c| c.name.clone()).collect(),
        });

        let Some((status, content_type, body)) = self.responses.get(request.url.as_str()) else {
            return Err(TransportError::Navigation(format!(
                "connection refused: {}",
                request.url
            )));
        };

        let mut headers = HashMap::new();
        headers.insert("content-type".to_string(), content_type.clone());
        Ok(FetchedBody {
            status: *status,
            headers,
            final_url: request.url.clone(),
            bytes: body.clone(),
        })
    }
}

/// Solver that counts submissions and solves on the first poll.
#[derive(Default)]
pub struct CountingSolver {
    pub submits: AtomicU32,
    pub polls: AtomicU32,
}

impl CountingSolver {
    pub fn submits(&self) -> u32 {
        self.submits.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SolverApi for CountingSolver {
    async fn submit(&self, _site_key: &str, _page_url: &str) -> Result<String, SolverError> {
        let n = self.submits.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(format!("task-{}", n))
    }

    async fn poll(&self, _task_id: &str) -> Result<PollStatus, SolverError> {
        self.polls.fetch_add(1, Ordering::SeqCst);
        Ok(PollStatus::Solved("0.solved-token-value".to_string()))
    }
}

/// A full decision page whose prose mentions challenge phrases.
pub fn long_decision_page() -> String {
    let paragraph = "<p>Passengers must pass a security check before boarding, and the \
        commission finds the screening rules reasonable.</p>";
    format!(
        "<html><head><title>Decision 24-11-002</title></head><body><h1>Decision 24-11-002</h1>{}\
         <p>Attention required: reply comments are due in 30 days.</p></body></html>",
        paragraph.repeat(40)
    )
}

/// Solver whose service reports every task as unsolvable.
#[derive(Default)]
pub struct FailingSolver {
    pub submits: AtomicU32,
}

#[async_trait]
impl SolverApi for FailingSolver {
    async fn submit(&self, _site_key: &str, _page_url: &str) -> Result<String, SolverError> {
        self.submits.fetch_add(1, Ordering::SeqCst);
        Ok("task-1".to_string())
    }

    async fn poll(&self, _task_id: &str) -> Result<PollStatus, SolverError> {
        Ok(PollStatus::Failed("ERROR_CAPTCHA_UNSOLVABLE".to_string()))
    }
}

/// Build a PDF with one text line per page.
pub fn pdf_with_pages(lines: &[&str]) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Courier",
        "Encoding" => "WinAnsiEncoding",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! {
            "F1" => font_id,
        },
    });

    let mut kids: Vec<Object> = Vec::new();
    for line in lines {
        let content = Content {
            operations: vec![
                Operation::new("BT", vec![]),
                Operation::new("Tf", vec!["F1".into(), 24.into()]),
                Operation::new("Td", vec![72.into(), 700.into()]),
                Operation::new("Tj", vec![Object::string_literal(*line)]),
                Operation::new("ET", vec![]),
            ],
        };
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
            "Resources" => resources_id,
        });
        kids.push(page_id.into());
    }

    let count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
            "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut buf = Vec::new();
    doc.save_to(&mut buf).unwrap();
    buf
}

/// Build a zip package from (path, body) parts.
pub fn zip_package(parts: &[(&str, &[u8])]) -> Vec<u8> {
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    for (name, body) in parts {
        zip.start_file(*name, SimpleFileOptions::default()).unwrap();
        zip.write_all(body).unwrap();
    }
    zip.finish().unwrap().into_inner()
}

pub fn docx_with_paragraphs(paragraphs: &[&str]) -> Vec<u8> {
    let body: String = paragraphs
        .iter()
        .map(|p| format!("<w:p><w:r><w:t>{}</w:t></w:r></w:p>", p))
        .collect();
    let document = format!(
        r#"<?xml version="1.0" encoding="UTF-8"?><w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body>{}</w:body></w:document>"#,
        body
    );
    zip_package(&[
        ("[Content_Types].xml", b"<Types/>"),
        ("word/document.xml", document.as_bytes()),
    ])
}

pub fn xlsx_single_sheet(sheet: &str, rows: &[&[&str]]) -> Vec<u8> {
    let workbook = format!(
        r#"<workbook xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships"><sheets><sheet name="{}" sheetId="1" r:id="rId1"/></sheets></workbook>"#,
        sheet
    );
    let rels = r#"<Relationships><Relationship Id="rId1" Target="worksheets/sheet1.xml"/></Relationships>"#;
    let data: String = rows
        .iter()
        .enumerate()
        .map(|(i, cells)| {
            let cells: String = cells
                .iter()
                .map(|c| format!(r#"<c t="inlineStr"><is><t>{}</t></is></c>"#, c))
                .collect();
            format!(r#"<row r="{}">{}</row>"#, i + 1, cells)
        })
        .collect();
    let worksheet = format!("<worksheet><sheetData>{}</sheetData></worksheet>", data);
    zip_package(&[
        ("[Content_Types].xml", b"<Types/>"),
        ("xl/workbook.xml", workbook.as_bytes()),
        ("xl/_rels/workbook.xml.rels", rels.as_bytes()),
        ("xl/worksheets/sheet1.xml", worksheet.as_bytes()),
    ])
}
