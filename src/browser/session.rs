//! One Chrome page driven over CDP.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use chromiumoxide::cdp::browser_protocol::browser::{
    BrowserContextId, SetDownloadBehaviorBehavior, SetDownloadBehaviorParams,
};
use chromiumoxide::cdp::browser_protocol::fetch::{
    AuthChallengeResponse, AuthChallengeResponseResponse, ContinueRequestParams,
    ContinueWithAuthParams, EnableParams as FetchEnableParams, EventAuthRequired,
    EventRequestPaused,
};
use chromiumoxide::cdp::browser_protocol::network::{
    CookieParam, EnableParams as NetworkEnableParams, EventResponseReceived, GetCookiesParams,
    GetResponseBodyParams, RequestId, ResourceType, SetUserAgentOverrideParams,
};
use chromiumoxide::cdp::browser_protocol::page::{
    AddScriptToEvaluateOnNewDocumentParams, NavigateParams,
};
use chromiumoxide::cdp::browser_protocol::target::{CreateBrowserContextParams, CreateTargetParams};
use chromiumoxide::{Browser, Page};
use futures::StreamExt;
use tempfile::TempDir;
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout, Instant};
use tracing::{debug, info, warn};
use url::Url;

use super::launch::{ChromeSessionFactory, Connected};
use super::scripts::{
    inject_token_script, quiescence_script, CLICK_CONTINUE_SCRIPT, READY_STATE_SCRIPT,
};
use super::stealth::STEALTH_SCRIPTS;
use crate::config::{BrowserEngineConfig, BrowserEngineType};
use crate::models::ProxyProfile;
use crate::retrieval::{
    BrowserCookie, InjectOutcome, Navigation, PageDriver, TransportError, WaitUntil,
};

const POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Main-frame document response seen by the network listener.
#[derive(Debug, Clone)]
struct MainResponse {
    request_id: RequestId,
    url: String,
    status: u16,
    headers: HashMap<String, String>,
}

type ResponseSlot = Arc<Mutex<Option<MainResponse>>>;

pub struct ChromeSession {
    browser: Browser,
    page: Page,
    handler: JoinHandle<()>,
    listeners: Vec<JoinHandle<()>>,
    owned: bool,
    context: Option<BrowserContextId>,
    main_response: ResponseSlot,
    /// Profile and download directory, removed on drop.
    workdir: TempDir,
    cookies_file: Option<PathBuf>,
    closed: bool,
}

impl ChromeSession {
    pub(crate) async fn open(
        factory: &ChromeSessionFactory,
        config: &BrowserEngineConfig,
        user_agent: &str,
        proxy: Option<&ProxyProfile>,
    ) -> Result<Self, TransportError> {
        let workdir = tempfile::Builder::new().prefix("regacq-browser-").tempdir()?;
        let Connected {
            mut browser,
            handler,
            owned,
        } = factory.connect(proxy, &workdir.path().join("profile")).await?;

        // A shared remote browser gets the proxy through an isolated context
        let context = if owned {
            None
        } else {
            let mut params = CreateBrowserContextParams::builder().dispose_on_detach(true);
            if let Some(proxy) = proxy {
                params = params.proxy_server(proxy.server_url());
            }
            match browser.create_browser_context(params.build()).await {
                Ok(id) => Some(id),
                Err(e) => {
                    handler.abort();
                    return Err(TransportError::BrowserUnavailable(format!(
                        "could not create browser context: {}",
                        e
                    )));
                }
            }
        };

        let page = match new_page(&browser, context.clone()).await {
            Ok(page) => page,
            Err(e) => {
                if owned {
                    let _ = browser.close().await;
                    let _ = browser.wait().await;
                }
                handler.abort();
                return Err(e);
            }
        };

        let mut session = Self {
            browser,
            page,
            handler,
            listeners: Vec::new(),
            owned,
            context,
            main_response: Arc::new(Mutex::new(None)),
            workdir,
            cookies_file: config.resolved_cookies_file(),
            closed: false,
        };

        if let Err(e) = session.prepare(config, user_agent, proxy).await {
            session.close().await;
            return Err(e);
        }
        Ok(session)
    }

    async fn prepare(
        &mut self,
        config: &BrowserEngineConfig,
        user_agent: &str,
        proxy: Option<&ProxyProfile>,
    ) -> Result<(), TransportError> {
        // User agent and stealth patches go in before any navigation
        self.page
            .execute(SetUserAgentOverrideParams::new(user_agent.to_string()))
            .await
            .map_err(script_error)?;
        self.page
            .execute(NetworkEnableParams::default())
            .await
            .map_err(script_error)?;

        if config.engine == BrowserEngineType::Stealth {
            debug!("Installing stealth scripts");
            for script in STEALTH_SCRIPTS {
                if let Err(e) = self
                    .page
                    .execute(AddScriptToEvaluateOnNewDocumentParams::new(script.to_string()))
                    .await
                {
                    debug!("Stealth script skipped: {}", e);
                }
            }
        }

        if let Some(path) = self.cookies_file.clone() {
            if path.exists() {
                self.load_cookies(&path).await;
            }
        }

        self.enable_downloads().await;

        if let Some(proxy) = proxy.filter(|p| p.has_credentials()) {
            self.answer_proxy_auth(proxy).await?;
        }

        self.watch_main_responses().await?;
        Ok(())
    }

    fn download_dir(&self) -> PathBuf {
        self.workdir.path().join("downloads")
    }

    /// Route browser downloads into the session's own directory.
    async fn enable_downloads(&mut self) {
        let dir = self.download_dir();
        if let Err(e) = std::fs::create_dir_all(&dir) {
            warn!("Could not create download directory {:?}: {}", dir, e);
            return;
        }

        let mut params = SetDownloadBehaviorParams::builder()
            .behavior(SetDownloadBehaviorBehavior::Allow)
            .download_path(dir.to_string_lossy().to_string());
        if let Some(context) = &self.context {
            params = params.browser_context_id(context.clone());
        }
        match params.build() {
            Ok(params) => {
                if let Err(e) = self.browser.execute(params).await {
                    warn!("Download capture unavailable: {}", e);
                }
            }
            Err(e) => warn!("Download capture unavailable: {}", e),
        }
    }

    /// Answer proxy authentication challenges with the profile's
    /// credentials. Every paused request is let through unchanged.
    async fn answer_proxy_auth(&mut self, proxy: &ProxyProfile) -> Result<(), TransportError> {
        let mut auth_events = self
            .page
            .event_listener::<EventAuthRequired>()
            .await
            .map_err(script_error)?;
        let mut paused_events = self
            .page
            .event_listener::<EventRequestPaused>()
            .await
            .map_err(script_error)?;

        let enable = FetchEnableParams::builder().handle_auth_requests(true).build();
        self.page.execute(enable).await.map_err(script_error)?;

        let page = self.page.clone();
        let username = proxy.username.clone().unwrap_or_default();
        let password = proxy.password.clone().unwrap_or_default();
        self.listeners.push(tokio::spawn(async move {
            while let Some(event) = auth_events.next().await {
                let response = AuthChallengeResponse::builder()
                    .response(AuthChallengeResponseResponse::ProvideCredentials)
                    .username(username.clone())
                    .password(password.clone())
                    .build();
                let Ok(response) = response else { continue };
                let params = ContinueWithAuthParams::new(event.request_id.clone(), response);
                if let Err(e) = page.execute(params).await {
                    debug!("Proxy auth reply failed: {}", e);
                }
            }
        }));

        let page = self.page.clone();
        self.listeners.push(tokio::spawn(async move {
            while let Some(event) = paused_events.next().await {
                let params = ContinueRequestParams::new(event.request_id.clone());
                if let Err(e) = page.execute(params).await {
                    debug!("Continue request failed: {}", e);
                }
            }
        }));

        Ok(())
    }

    /// Record the latest main-frame document response.
    async fn watch_main_responses(&mut self) -> Result<(), TransportError> {
        let mut responses = self
            .page
            .event_listener::<EventResponseReceived>()
            .await
            .map_err(script_error)?;
        let main_frame = self.page.mainframe().await.ok().flatten();
        let slot = self.main_response.clone();

        self.listeners.push(tokio::spawn(async move {
            while let Some(event) = responses.next().await {
                if event.r#type != ResourceType::Document {
                    continue;
                }
                if main_frame.is_some() && event.frame_id != main_frame {
                    continue;
                }
                let headers = event
                    .response
                    .headers
                    .inner()
                    .as_object()
                    .map(|map| {
                        map.iter()
                            .map(|(k, v)| {
                                let value = v.as_str().map(str::to_string).unwrap_or_else(|| v.to_string());
                                (k.to_lowercase(), value)
                            })
                            .collect()
                    })
                    .unwrap_or_default();
                let response = MainResponse {
                    request_id: event.request_id.clone(),
                    url: event.response.url.clone(),
                    status: event.response.status as u16,
                    headers,
                };
                if let Ok(mut slot) = slot.lock() {
                    *slot = Some(response);
                }
            }
        }));

        Ok(())
    }

    fn last_response(&self) -> Option<MainResponse> {
        self.main_response.lock().ok().and_then(|slot| slot.clone())
    }

    async fn load_cookies(&self, path: &Path) {
        debug!("Loading cookies from {:?}", path);
        let cookies: Vec<BrowserCookie> = match std::fs::read_to_string(path)
            .map_err(|e| e.to_string())
            .and_then(|raw| serde_json::from_str(&raw).map_err(|e| e.to_string()))
        {
            Ok(cookies) => cookies,
            Err(e) => {
                warn!("Ignoring cookies file {:?}: {}", path, e);
                return;
            }
        };

        for cookie in cookies {
            if cookie.name.is_empty() || cookie.domain.is_empty() {
                continue;
            }
            let param = CookieParam::builder()
                .name(cookie.name.clone())
                .value(cookie.value.clone())
                .domain(cookie.domain.clone())
                .path(cookie.path.clone())
                .secure(cookie.secure)
                .http_only(cookie.http_only)
                .build();
            match param {
                Ok(param) => {
                    if let Err(e) = self.page.set_cookie(param).await {
                        warn!("Failed to set cookie {}: {}", cookie.name, e);
                    }
                }
                Err(e) => warn!("Failed to build cookie {}: {}", cookie.name, e),
            }
        }
    }

    fn save_cookies(&self, cookies: &[BrowserCookie]) {
        let Some(path) = &self.cookies_file else { return };
        if cookies.is_empty() {
            return;
        }
        let result = serde_json::to_string_pretty(cookies)
            .map_err(|e| e.to_string())
            .and_then(|json| {
                if let Some(parent) = path.parent() {
                    std::fs::create_dir_all(parent).map_err(|e| e.to_string())?;
                }
                std::fs::write(path, json).map_err(|e| e.to_string())
            });
        match result {
            Ok(()) => info!("Saved {} cookies to {:?}", cookies.len(), path),
            Err(e) => warn!("Failed to save cookies to {:?}: {}", path, e),
        }
    }

    async fn evaluate<T: serde::de::DeserializeOwned>(&self, script: String) -> Result<T, TransportError> {
        self.page
            .evaluate(script)
            .await
            .map_err(script_error)?
            .into_value()
            .map_err(|e| TransportError::Script(e.to_string()))
    }
}

async fn new_page(browser: &Browser, context: Option<BrowserContextId>) -> Result<Page, TransportError> {
    let mut params = CreateTargetParams::builder().url("about:blank");
    if let Some(context) = context {
        params = params.browser_context_id(context);
    }
    let params = params.build().map_err(TransportError::BrowserUnavailable)?;
    browser
        .new_page(params)
        .await
        .map_err(|e| TransportError::BrowserUnavailable(format!("could not open page: {}", e)))
}

fn script_error(e: chromiumoxide::error::CdpError) -> TransportError {
    TransportError::Script(e.to_string())
}

/// Poll `document.readyState` until the requested wait point.
async fn wait_for_ready_state(page: &Page, wait: WaitUntil) {
    let accepted: &[&str] = match wait {
        WaitUntil::Commit => return,
        WaitUntil::DomContentLoaded => &["interactive", "complete"],
        WaitUntil::Load => &["complete"],
    };
    loop {
        // evaluation fails while the old document is being replaced
        if let Ok(result) = page.evaluate(READY_STATE_SCRIPT.to_string()).await {
            if let Ok(state) = result.into_value::<String>() {
                if accepted.contains(&state.as_str()) {
                    debug!("Page ready state: {}", state);
                    return;
                }
            }
        }
        sleep(POLL_INTERVAL).await;
    }
}

#[async_trait]
impl PageDriver for ChromeSession {
    async fn navigate(
        &mut self,
        url: &Url,
        wait: WaitUntil,
        limit: Duration,
    ) -> Result<Navigation, TransportError> {
        if let Ok(mut slot) = self.main_response.lock() {
            *slot = None;
        }

        let params = NavigateParams::builder()
            .url(url.as_str())
            .build()
            .map_err(TransportError::Navigation)?;

        let page = self.page.clone();
        let navigation = async move {
            let result = page
                .execute(params)
                .await
                .map_err(|e| TransportError::navigation(e.to_string()))?;
            if let Some(error) = result.result.error_text.clone() {
                return Err(TransportError::navigation(error));
            }
            wait_for_ready_state(&page, wait).await;
            Ok(())
        };

        match timeout(limit, navigation).await {
            Err(_) => return Err(TransportError::Timeout(limit)),
            Ok(result) => result?,
        }

        let final_url = self.current_url().await;
        let response = self.last_response();
        Ok(Navigation {
            final_url: final_url.or_else(|| response.as_ref().and_then(|r| Url::parse(&r.url).ok())),
            status: response.as_ref().map(|r| r.status),
            headers: response.map(|r| r.headers).unwrap_or_default(),
        })
    }

    async fn content(&mut self) -> Result<String, TransportError> {
        self.page.content().await.map_err(script_error)
    }

    async fn current_url(&mut self) -> Option<Url> {
        self.page
            .url()
            .await
            .ok()
            .flatten()
            .and_then(|u| Url::parse(&u).ok())
    }

    async fn response_body(&mut self) -> Result<Vec<u8>, TransportError> {
        let response = self
            .last_response()
            .ok_or_else(|| TransportError::Navigation("no main-frame response recorded".to_string()))?;

        let body = self
            .page
            .execute(GetResponseBodyParams::new(response.request_id))
            .await
            .map_err(|e| TransportError::navigation(e.to_string()))?;

        if body.result.base64_encoded {
            base64::engine::general_purpose::STANDARD
                .decode(&body.result.body)
                .map_err(|e| TransportError::Script(format!("bad base64 body: {}", e)))
        } else {
            Ok(body.result.body.clone().into_bytes())
        }
    }

    async fn await_download(&mut self, limit: Duration) -> Option<Vec<u8>> {
        let dir = self.download_dir();
        let deadline = Instant::now() + limit;
        let mut last_size: Option<u64> = None;

        while Instant::now() < deadline {
            if let Some((path, size)) = finished_download(&dir) {
                // size must hold across two polls
                if last_size == Some(size) && size > 0 {
                    match tokio::fs::read(&path).await {
                        Ok(bytes) => {
                            info!("Browser download complete: {:?} ({} bytes)", path, size);
                            return Some(bytes);
                        }
                        Err(e) => warn!("Could not read download {:?}: {}", path, e),
                    }
                }
                last_size = Some(size);
            }
            sleep(POLL_INTERVAL).await;
        }
        debug!("No download finished within {:?}", limit);
        None
    }

    async fn inject_token(&mut self, token: &str) -> Result<InjectOutcome, TransportError> {
        let how: String = self.evaluate(inject_token_script(token)).await?;
        Ok(if how == "submitted" {
            InjectOutcome::FormSubmitted
        } else {
            InjectOutcome::Reloaded
        })
    }

    async fn wait_for_quiescence(&mut self, limit: Duration) -> bool {
        let script = quiescence_script(limit);
        match timeout(limit + Duration::from_secs(5), self.evaluate::<bool>(script)).await {
            Ok(Ok(idle)) => idle,
            Ok(Err(e)) => {
                // navigation after a form submit destroys the context
                debug!("Quiescence check interrupted: {}", e);
                false
            }
            Err(_) => false,
        }
    }

    async fn click_continue(&mut self) -> Result<bool, TransportError> {
        self.evaluate(CLICK_CONTINUE_SCRIPT.to_string()).await
    }

    async fn reload(&mut self, limit: Duration) -> Result<(), TransportError> {
        match timeout(limit, self.page.reload()).await {
            Err(_) => Err(TransportError::Timeout(limit)),
            Ok(Err(e)) => Err(TransportError::navigation(e.to_string())),
            Ok(Ok(_)) => Ok(()),
        }
    }

    async fn cookies(&mut self) -> Vec<BrowserCookie> {
        let mut params = GetCookiesParams::builder();
        if let Some(url) = self.current_url().await {
            params = params.urls(vec![url.to_string()]);
        }

        let cookies = match self.page.execute(params.build()).await {
            Ok(result) => result.result.cookies.clone(),
            Err(e) => {
                warn!("Failed to get cookies via CDP: {}, trying page.get_cookies()", e);
                self.page.get_cookies().await.unwrap_or_default()
            }
        };

        debug!("Got {} cookies from browser", cookies.len());
        cookies
            .iter()
            .map(|c| BrowserCookie {
                name: c.name.clone(),
                value: c.value.clone(),
                domain: c.domain.clone(),
                path: c.path.clone(),
                secure: c.secure,
                http_only: c.http_only,
            })
            .collect()
    }

    async fn persist_cookies(&mut self) {
        if self.cookies_file.is_none() || self.closed {
            return;
        }
        let cookies = self.cookies().await;
        self.save_cookies(&cookies);
    }

    async fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;

        for listener in self.listeners.drain(..) {
            listener.abort();
        }
        if let Err(e) = self.page.clone().close().await {
            debug!("Page close failed: {}", e);
        }

        if let Some(context) = self.context.take() {
            if let Err(e) = self.browser.dispose_browser_context(context).await {
                debug!("Browser context dispose failed: {}", e);
            }
        }
        if self.owned {
            if let Err(e) = self.browser.close().await {
                debug!("Browser close failed: {}", e);
            }
            let _ = self.browser.wait().await;
        }
        self.handler.abort();
        debug!("Browser session closed");
    }
}

/// A completed file in the download directory and its size.
fn finished_download(dir: &Path) -> Option<(PathBuf, u64)> {
    std::fs::read_dir(dir)
        .ok()?
        .flatten()
        .filter(|entry| {
            let name = entry.file_name();
            let name = name.to_string_lossy();
            !name.ends_with(".crdownload") && !name.starts_with('.')
        })
        .filter_map(|entry| {
            let meta = entry.metadata().ok()?;
            meta.is_file().then(|| (entry.path(), meta.len()))
        })
        .next()
}
