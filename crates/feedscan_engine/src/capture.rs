//! Credential capture by observing a headless Chromium session.
//!
//! The browser loads the feed's public page, scrolls to force the feed API to
//! be called, and the first request whose url contains the API path pattern is
//! recorded verbatim. The browser is torn down on every exit path.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::network::{
    EventRequestWillBeSent, Headers, Request, SetExtraHttpHeadersParams,
};
use chromiumoxide::page::Page;
use futures_util::StreamExt;
use rand::seq::SliceRandom;
use scan_logging::{scan_debug, scan_info, scan_warn};
use thiserror::Error;

use crate::Credentials;

const SCROLL_TO_BOTTOM: &str = "window.scrollTo(0, document.body.scrollHeight)";
const SEC_CH_UA: &str = r#""Google Chrome";v="110", "Not-A.Brand";v="99", "Chromium";v="110""#;

#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("no request matching the feed api was observed on {seed_url} within {waited:?}")]
    Timeout { seed_url: String, waited: Duration },
    #[error("browser session failed: {0}")]
    Browser(String),
    #[error("invalid seed url: {0}")]
    InvalidSeed(String),
}

/// Obtains a fresh authorized request template. Implementations do not retry
/// internally and do not short-circuit when a stored credential exists.
#[async_trait]
pub trait CredentialCapture: Send + Sync {
    async fn capture(&self) -> Result<Credentials, CaptureError>;
}

#[derive(Debug, Clone)]
pub struct CaptureSettings {
    pub seed_url: String,
    pub api_path_pattern: String,
    pub settle_delay: Duration,
    pub scroll_delay: Duration,
    pub timeout: Duration,
    pub chrome_executable: Option<PathBuf>,
    pub user_agents: Vec<String>,
}

impl Default for CaptureSettings {
    fn default() -> Self {
        Self {
            seed_url: "https://www.msn.com/en-us/channel/topic/Science/tp-Y_3304d105-5132-427d-b027-2f472f2fac07"
                .to_string(),
            api_path_pattern: "service/news/feed/pages/channelfeed".to_string(),
            settle_delay: Duration::from_secs(5),
            scroll_delay: Duration::from_secs(2),
            timeout: Duration::from_secs(60),
            chrome_executable: None,
            user_agents: [
                "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
                "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
                "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/119.0.0.0 Safari/537.36",
                "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/119.0.0.0 Safari/537.36 Edg/119.0.0.0",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
        }
    }
}

pub struct ChromiumCapture {
    settings: CaptureSettings,
}

impl ChromiumCapture {
    pub fn new(settings: CaptureSettings) -> Result<Self, CaptureError> {
        url::Url::parse(&settings.seed_url)
            .map_err(|err| CaptureError::InvalidSeed(format!("{}: {err}", settings.seed_url)))?;
        Ok(Self { settings })
    }

    fn pick_user_agent(&self) -> Option<&str> {
        self.settings
            .user_agents
            .choose(&mut rand::thread_rng())
            .map(String::as_str)
    }

    fn browser_config(&self) -> Result<BrowserConfig, CaptureError> {
        let mut builder = BrowserConfig::builder()
            .arg("--no-sandbox")
            .arg("--disable-dev-shm-usage")
            .arg("--disable-blink-features=AutomationControlled");
        if let Some(user_agent) = self.pick_user_agent() {
            scan_debug!("Capture user agent: {}", user_agent);
            builder = builder.arg(format!("--user-agent={user_agent}"));
        }
        if let Some(path) = &self.settings.chrome_executable {
            builder = builder.chrome_executable(path);
        }
        builder
            .build()
            .map_err(|err| CaptureError::Browser(format!("failed to build browser config: {err}")))
    }

    fn timed_out(&self, started: Instant) -> CaptureError {
        CaptureError::Timeout {
            seed_url: self.settings.seed_url.clone(),
            waited: started.elapsed(),
        }
    }

    /// Loads the seed page and forces additional feed content to load.
    async fn drive(&self, page: &Page) -> Result<(), CaptureError> {
        page.goto(self.settings.seed_url.as_str())
            .await
            .map_err(|err| CaptureError::Browser(format!("navigation failed: {err}")))?;
        tokio::time::sleep(self.settings.settle_delay).await;
        page.evaluate(SCROLL_TO_BOTTOM)
            .await
            .map_err(|err| CaptureError::Browser(format!("scroll failed: {err}")))?;
        tokio::time::sleep(self.settings.scroll_delay).await;
        Ok(())
    }

    async fn observe(&self, browser: &Browser) -> Result<Credentials, CaptureError> {
        let started = Instant::now();
        let page = browser
            .new_page("about:blank")
            .await
            .map_err(|err| CaptureError::Browser(format!("failed to open page: {err}")))?;
        page.execute(SetExtraHttpHeadersParams::new(Headers::new(
            serde_json::json!({ "sec-ch-ua": SEC_CH_UA }),
        )))
        .await
        .map_err(|err| CaptureError::Browser(format!("failed to set headers: {err}")))?;

        let mut requests = page
            .event_listener::<EventRequestWillBeSent>()
            .await
            .map_err(|err| CaptureError::Browser(format!("failed to observe traffic: {err}")))?;

        let drive = self.drive(&page);
        tokio::pin!(drive);
        let deadline = tokio::time::sleep(self.settings.timeout);
        tokio::pin!(deadline);

        loop {
            tokio::select! {
                biased;
                event = requests.next() => match event {
                    Some(event) if event.request.url.contains(&self.settings.api_path_pattern) => {
                        scan_info!("Captured feed request after {:?}", started.elapsed());
                        return Ok(credentials_from_request(&event.request));
                    }
                    Some(event) => scan_debug!("Ignoring request {}", event.request.url),
                    None => {
                        return Err(CaptureError::Browser("request stream closed".to_string()));
                    }
                },
                driven = &mut drive => {
                    driven?;
                    return Err(self.timed_out(started));
                }
                _ = &mut deadline => return Err(self.timed_out(started)),
            }
        }
    }
}

#[async_trait]
impl CredentialCapture for ChromiumCapture {
    async fn capture(&self) -> Result<Credentials, CaptureError> {
        scan_info!("Launching headless Chromium to capture feed credentials");
        let config = self.browser_config()?;
        let (mut browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|err| CaptureError::Browser(format!("failed to launch Chromium: {err}")))?;

        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                let _ = event;
            }
        });

        let result = self.observe(&browser).await;

        if let Err(err) = browser.close().await {
            scan_warn!("Failed to close browser cleanly: {}", err);
        }
        let _ = browser.wait().await;
        handler_task.abort();

        match &result {
            Ok(credentials) => scan_info!(
                "Capture succeeded: {} {} ({} headers)",
                credentials.method,
                credentials.url,
                credentials.headers.len()
            ),
            Err(err) => scan_warn!("Capture failed: {}", err),
        }
        result
    }
}

fn credentials_from_request(request: &Request) -> Credentials {
    let headers = request
        .headers
        .inner()
        .as_object()
        .map(|fields| {
            fields
                .iter()
                .filter_map(|(name, value)| Some((name.clone(), value.as_str()?.to_string())))
                .collect()
        })
        .unwrap_or_else(BTreeMap::new);

    Credentials {
        url: request.url.clone(),
        method: request.method.clone(),
        headers,
    }
}
