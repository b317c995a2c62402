//! Headless Chromium implementation of the browser seam.

use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::element::Element;
use chromiumoxide::page::Page;
use futures_util::StreamExt;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::{BrowserError, BrowserLauncher, BrowserPage, ElementHandle};
use crate::constants::BROWSER_USER_AGENT;

/// Default window width in pixels.
pub const DEFAULT_WINDOW_WIDTH: u32 = 1920;

/// Default window height in pixels.
pub const DEFAULT_WINDOW_HEIGHT: u32 = 1080;

/// Default per-request timeout in seconds.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Serializes an element into the shape of [`ElementHandle`].
///
/// Returned as a JSON string so the value survives the protocol by value.
const CAPTURE_ELEMENT_JS: &str = r"function() {
    const attributes = {};
    for (const attr of this.attributes) { attributes[attr.name] = attr.value; }
    return JSON.stringify({
        text: this.innerText ?? this.textContent ?? '',
        href: typeof this.href === 'string' ? this.href : null,
        attributes,
    });
}";

/// Chromium launch configuration.
#[derive(Debug, Clone)]
pub struct ChromiumConfig {
    pub window_width: u32,
    pub window_height: u32,
    pub request_timeout: Duration,
    /// Path to Chrome/Chromium executable (None for auto-detection).
    pub chrome_path: Option<String>,
}

impl Default for ChromiumConfig {
    fn default() -> Self {
        Self {
            window_width: DEFAULT_WINDOW_WIDTH,
            window_height: DEFAULT_WINDOW_HEIGHT,
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            chrome_path: None,
        }
    }
}

/// Launches a dedicated headless browser per session.
#[derive(Debug, Clone, Default)]
pub struct ChromiumLauncher {
    config: ChromiumConfig,
}

impl ChromiumLauncher {
    #[must_use]
    pub fn new(config: ChromiumConfig) -> Self {
        Self { config }
    }

    fn browser_config(&self) -> Result<BrowserConfig, BrowserError> {
        let mut builder = BrowserConfig::builder()
            .window_size(self.config.window_width, self.config.window_height)
            .request_timeout(self.config.request_timeout)
            .no_sandbox()
            .disable_default_args()
            .arg("--headless=new")
            .arg("--disable-gpu")
            .arg("--disable-dev-shm-usage")
            .arg("--disable-software-rasterizer")
            .arg("--no-first-run")
            .arg("--no-default-browser-check")
            .arg("--disable-background-networking")
            .arg("--disable-extensions")
            .arg("--disable-sync")
            .arg("--mute-audio")
            .arg(format!("--user-agent={BROWSER_USER_AGENT}"));

        if let Some(ref chrome_path) = self.config.chrome_path {
            builder = builder.chrome_executable(chrome_path);
        }

        builder.build().map_err(BrowserError::Launch)
    }
}

#[async_trait]
impl BrowserLauncher for ChromiumLauncher {
    async fn launch(&self) -> Result<Box<dyn BrowserPage>, BrowserError> {
        info!("Launching headless browser");

        let (browser, mut handler) = Browser::launch(self.browser_config()?)
            .await
            .map_err(|e| BrowserError::Launch(e.to_string()))?;

        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    debug!("Browser handler error: {e}");
                }
            }
        });

        let page = match browser.new_page("about:blank").await {
            Ok(page) => page,
            Err(e) => {
                handler_task.abort();
                return Err(BrowserError::Launch(format!("failed to open page: {e}")));
            }
        };

        Ok(Box::new(ChromiumPage {
            browser: Mutex::new(Some(browser)),
            page,
            handler_task,
        }))
    }
}

/// A page inside a browser owned exclusively by this value.
pub struct ChromiumPage {
    browser: Mutex<Option<Browser>>,
    page: Page,
    handler_task: JoinHandle<()>,
}

impl ChromiumPage {
    async fn first_match(
        &self,
        selector: &str,
    ) -> Result<Option<Element>, BrowserError> {
        let mut elements = self.page.find_elements(selector).await.map_err(protocol)?;
        if elements.is_empty() {
            Ok(None)
        } else {
            Ok(Some(elements.swap_remove(0)))
        }
    }

    async fn require(&self, selector: &str) -> Result<Element, BrowserError> {
        self.first_match(selector)
            .await?
            .ok_or_else(|| BrowserError::ElementNotFound {
                selector: selector.to_string(),
            })
    }
}

#[async_trait]
impl BrowserPage for ChromiumPage {
    async fn goto(&self, url: &str) -> Result<(), BrowserError> {
        let navigation_err = |e: chromiumoxide::error::CdpError| BrowserError::Navigation {
            url: url.to_string(),
            message: e.to_string(),
        };

        self.page.goto(url).await.map_err(navigation_err)?;
        self.page
            .wait_for_navigation()
            .await
            .map_err(navigation_err)?;
        Ok(())
    }

    async fn type_text(&self, selector: &str, text: &str) -> Result<(), BrowserError> {
        self.require(selector)
            .await?
            .click()
            .await
            .map_err(protocol)?
            .type_str(text)
            .await
            .map_err(protocol)?;
        Ok(())
    }

    async fn click(&self, selector: &str) -> Result<(), BrowserError> {
        self.require(selector)
            .await?
            .click()
            .await
            .map_err(protocol)?;
        Ok(())
    }

    async fn query(&self, selector: &str) -> Result<Option<ElementHandle>, BrowserError> {
        let Some(element) = self.first_match(selector).await? else {
            return Ok(None);
        };

        let returns = element
            .call_js_fn(CAPTURE_ELEMENT_JS, false)
            .await
            .map_err(protocol)?;

        let raw = returns
            .result
            .value
            .and_then(|v| v.as_str().map(ToString::to_string))
            .ok_or_else(|| {
                BrowserError::Protocol(format!("element capture returned no value for {selector}"))
            })?;

        serde_json::from_str(&raw)
            .map(Some)
            .map_err(|e| BrowserError::Protocol(format!("bad element capture: {e}")))
    }

    async fn location_search(&self) -> Result<String, BrowserError> {
        self.page
            .evaluate("window.location.search")
            .await
            .map_err(protocol)?
            .into_value::<String>()
            .map_err(|e| BrowserError::Protocol(e.to_string()))
    }

    async fn close(&self) -> Result<(), BrowserError> {
        if let Err(e) = self.page.clone().close().await {
            warn!("Failed to close page: {e}");
        }

        let mut guard = self.browser.lock().await;
        if let Some(mut browser) = guard.take() {
            browser.close().await.map_err(protocol)?;
            if let Err(e) = browser.wait().await {
                debug!("Browser process wait failed: {e}");
            }
            info!("Browser shutdown complete");
        }
        self.handler_task.abort();
        Ok(())
    }
}

impl Drop for ChromiumPage {
    fn drop(&mut self) {
        // The browser process is killed when `Browser` drops; only the
        // handler task needs stopping here.
        self.handler_task.abort();
    }
}

/// Messages of CDP errors raised while the document is being replaced.
const CONTEXT_LOST_MARKERS: &[&str] = &[
    "execution context was destroyed",
    "cannot find context with specified id",
    "could not find node with given id",
    "no node with given id found",
    "node is detached from document",
    "inspected target navigated or closed",
];

/// Messages of CDP errors raised once the target or its connection is gone.
const CLOSED_MARKERS: &[&str] = &[
    "target closed",
    "session closed",
    "no target with given id",
    "channel closed",
    "send error",
    "no response",
];

fn protocol(e: chromiumoxide::error::CdpError) -> BrowserError {
    classify_cdp_error(&e.to_string())
}

/// Map a CDP error message onto the [`BrowserError`] callers branch on.
fn classify_cdp_error(message: &str) -> BrowserError {
    let lower = message.to_lowercase();
    if CONTEXT_LOST_MARKERS.iter().any(|m| lower.contains(m)) {
        BrowserError::ContextLost(message.to_string())
    } else if CLOSED_MARKERS.iter().any(|m| lower.contains(m)) {
        BrowserError::PageClosed
    } else {
        BrowserError::Protocol(message.to_string())
    }
}
