//! Browser automation seam.
//!
//! The watcher only needs a handful of page operations. They are expressed
//! as traits so the extraction pipeline can run against headless Chromium in
//! production and against a scripted page in tests.

pub mod chromium;
pub mod session;

use std::collections::HashMap;

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;

pub use chromium::{ChromiumConfig, ChromiumLauncher};
pub use session::{AuthenticatedSession, LoginSelectors, Probe};

#[derive(Debug, Error)]
pub enum BrowserError {
    #[error("failed to launch browser: {0}")]
    Launch(String),
    #[error("navigation to {url} failed: {message}")]
    Navigation { url: String, message: String },
    #[error("element not found: {selector}")]
    ElementNotFound { selector: String },
    #[error("page is closed")]
    PageClosed,
    /// The document or node went away mid-call, usually because the page is
    /// navigating. Retrying once the new document is live can succeed.
    #[error("page context lost: {0}")]
    ContextLost(String),
    #[error("browser protocol error: {0}")]
    Protocol(String),
}

/// A DOM element captured at the moment it was located.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ElementHandle {
    /// Rendered text (`innerText`).
    #[serde(default)]
    pub text: String,
    /// Resolved `href` property, absolute for anchors.
    #[serde(default)]
    pub href: Option<String>,
    /// Raw attributes by name.
    #[serde(default)]
    pub attributes: HashMap<String, String>,
}

impl ElementHandle {
    #[must_use]
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }
}

/// One open browser tab.
#[async_trait]
pub trait BrowserPage: Send + Sync {
    /// Navigate to `url` and wait for the load to settle.
    async fn goto(&self, url: &str) -> Result<(), BrowserError>;

    /// Type `text` into the first element matching `selector`.
    async fn type_text(&self, selector: &str, text: &str) -> Result<(), BrowserError>;

    /// Click the first element matching `selector`.
    async fn click(&self, selector: &str) -> Result<(), BrowserError>;

    /// Look up `selector` once, without waiting.
    ///
    /// Returns `Ok(None)` when nothing matches right now.
    async fn query(&self, selector: &str) -> Result<Option<ElementHandle>, BrowserError>;

    /// Current `window.location.search` of the page.
    async fn location_search(&self) -> Result<String, BrowserError>;

    /// Close the page and the browser that owns it.
    async fn close(&self) -> Result<(), BrowserError>;
}

/// Starts browser sessions. Each call yields a fresh, isolated page.
#[async_trait]
pub trait BrowserLauncher: Send + Sync {
    async fn launch(&self) -> Result<Box<dyn BrowserPage>, BrowserError>;
}
