//! Forum thread-list scraper.
//!
//! One call to [`scrape`] launches a browser, signs in, reads the thread
//! list row by row and returns the resulting [`Snapshot`]. The browser is
//! closed before returning, on success and on failure.

pub mod extractor;
pub mod selectors;

use std::time::{Duration, Instant};

use chrono::Utc;
use thiserror::Error;
use tracing::{info, warn};

pub use extractor::PostExtractor;
pub use selectors::{Field, SelectorTemplate};

use crate::browser::session::LoginSelectors;
use crate::browser::{AuthenticatedSession, BrowserError, BrowserLauncher};
use crate::config::Config;
use crate::store::{LoginRecord, Snapshot};

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error(transparent)]
    Browser(#[from] BrowserError),
    #[error("row {row}: {field} has no {attribute} attribute")]
    MissingAttribute {
        row: usize,
        field: Field,
        attribute: &'static str,
    },
    #[error("row {row}: {field} has unparsable timestamp '{value}'")]
    InvalidTimestamp {
        row: usize,
        field: Field,
        value: String,
    },
    #[error("row {row}: {field} has unparsable count '{value}'")]
    InvalidCount {
        row: usize,
        field: Field,
        value: String,
    },
}

/// Everything the scraper needs besides the browser and credentials.
#[derive(Debug, Clone)]
pub struct ScrapeSettings {
    pub template: SelectorTemplate,
    pub login_selectors: LoginSelectors,
    pub probe_timeout: Duration,
    pub locate_poll: Duration,
    pub landing_query_prefix: String,
}

impl ScrapeSettings {
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self {
            template: SelectorTemplate::default(),
            login_selectors: LoginSelectors::default(),
            probe_timeout: config.probe_timeout,
            locate_poll: config.locate_poll,
            landing_query_prefix: config.landing_query_prefix.clone(),
        }
    }
}

/// Run one full extraction against the forum.
///
/// # Errors
///
/// Returns an error if the browser cannot be launched, sign-in fails, or a
/// row is missing a required field.
pub async fn scrape(
    launcher: &dyn BrowserLauncher,
    login: &LoginRecord,
    settings: &ScrapeSettings,
) -> Result<Snapshot, ExtractError> {
    let started = Instant::now();
    let mut snapshot = Snapshot::begin(login.url.clone(), Utc::now());

    let page = launcher.launch().await?;
    let session = AuthenticatedSession::new(page, settings.locate_poll);

    let result = extract_signed_in(&session, login, settings, &mut snapshot).await;

    if let Err(e) = session.close().await {
        warn!("Failed to close browser session: {e}");
    }
    result?;

    snapshot.latency_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
    info!(
        posts = snapshot.posts.len(),
        latency_ms = snapshot.latency_ms,
        "Scrape complete"
    );
    Ok(snapshot)
}

async fn extract_signed_in(
    session: &AuthenticatedSession,
    login: &LoginRecord,
    settings: &ScrapeSettings,
    snapshot: &mut Snapshot,
) -> Result<(), ExtractError> {
    session
        .login(login, &settings.login_selectors, &settings.landing_query_prefix)
        .await?;

    PostExtractor::new(session, &settings.template, settings.probe_timeout)
        .extract(snapshot)
        .await?;
    Ok(())
}
