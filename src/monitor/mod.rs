//! The periodic check: staleness test, re-extraction and announcement.

pub mod change;

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

pub use change::{is_stale, latest_changed, latest_relevant};

use crate::browser::BrowserLauncher;
use crate::config::Config;
use crate::notify::{DeliveryReport, Notifier};
use crate::scraper::{scrape, ExtractError, ScrapeSettings};
use crate::store::{SnapshotStore, StoreError};

#[derive(Debug, Error)]
pub enum CheckError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("extraction failed: {0}")]
    Extract(#[from] ExtractError),
    #[error("extraction did not finish within {0:?}")]
    Timeout(Duration),
}

/// What a check run did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckOutcome {
    /// Another check held the run lock; nothing was done.
    AlreadyRunning,
    /// The cached snapshot is within the staleness window.
    Fresh,
    /// A new snapshot was stored; its latest relevant post is unchanged.
    Unchanged { posts: usize },
    /// A new snapshot was stored and its latest relevant post was announced.
    Notified { url: String, report: DeliveryReport },
}

/// Owns everything one check needs and serializes check runs.
pub struct Monitor {
    store: SnapshotStore,
    launcher: Arc<dyn BrowserLauncher>,
    notifier: Notifier,
    settings: ScrapeSettings,
    staleness_window: Duration,
    check_timeout: Duration,
    run_lock: Mutex<()>,
}

impl Monitor {
    #[must_use]
    pub fn new(
        config: &Config,
        store: SnapshotStore,
        launcher: Arc<dyn BrowserLauncher>,
        notifier: Notifier,
    ) -> Self {
        Self {
            store,
            launcher,
            notifier,
            settings: ScrapeSettings::from_config(config),
            staleness_window: config.staleness_window,
            check_timeout: config.check_timeout,
            run_lock: Mutex::new(()),
        }
    }

    #[must_use]
    pub fn store(&self) -> &SnapshotStore {
        &self.store
    }

    /// Run one check against the current time.
    ///
    /// # Errors
    ///
    /// See [`Self::check_at`].
    pub async fn check(&self) -> Result<CheckOutcome, CheckError> {
        self.check_at(Utc::now()).await
    }

    /// Run one check as if the current time were `now`.
    ///
    /// Re-extracts when the stored snapshot is stale, persists the result, and
    /// announces the new latest relevant post if it differs from the old one.
    /// Returns immediately with [`CheckOutcome::AlreadyRunning`] if another
    /// check is in progress.
    ///
    /// # Errors
    ///
    /// Fails on unreadable records, extraction failures and extraction
    /// timeouts. Notification failures are never errors.
    pub async fn check_at(&self, now: DateTime<Utc>) -> Result<CheckOutcome, CheckError> {
        let Ok(_guard) = self.run_lock.try_lock() else {
            warn!("Check already in progress, skipping");
            return Ok(CheckOutcome::AlreadyRunning);
        };

        let config = self.store.load_config()?;
        let current = self.store.load_snapshot()?;
        let latest = latest_relevant(&current);

        if !is_stale(&current, now, self.staleness_window) {
            debug!(
                latest = ?latest.map(|p| p.title.as_str()),
                "Snapshot is fresh, skipping extraction"
            );
            return Ok(CheckOutcome::Fresh);
        }

        info!("Snapshot is stale, extracting thread list");
        let login = self.store.load_login()?;
        let fresh = tokio::time::timeout(
            self.check_timeout,
            scrape(self.launcher.as_ref(), &login, &self.settings),
        )
        .await
        .map_err(|_| CheckError::Timeout(self.check_timeout))??;

        self.store.save_snapshot(&fresh)?;

        // Compare against the persisted form of the new snapshot.
        let fresh = self.store.load_snapshot()?;
        let latest_new = latest_relevant(&fresh);
        if !latest_changed(latest, latest_new) {
            debug!("Latest relevant post unchanged");
            return Ok(CheckOutcome::Unchanged {
                posts: fresh.posts.len(),
            });
        }

        let Some(post) = latest_new else {
            info!("Latest relevant post disappeared, nothing to announce");
            return Ok(CheckOutcome::Unchanged {
                posts: fresh.posts.len(),
            });
        };

        info!(title = %post.title, url = %post.url, "New thread detected");
        let report = self.notifier.announce(post, &config).await;
        Ok(CheckOutcome::Notified {
            url: post.url.clone(),
            report,
        })
    }
}

/// Run checks forever, one every `interval`.
///
/// Failures are logged; the next tick is the retry.
pub async fn run_loop(monitor: Arc<Monitor>, interval: Duration) {
    info!(interval_secs = interval.as_secs(), "Check loop started");

    loop {
        match monitor.check().await {
            Ok(CheckOutcome::Notified { url, report }) => {
                info!(
                    url = %url,
                    delivered = report.delivered.len(),
                    failed = report.failed.len(),
                    "Check complete: announced new thread"
                );
            }
            Ok(outcome) => debug!(?outcome, "Check complete"),
            Err(e) => error!("Check failed: {e}"),
        }

        tokio::time::sleep(interval).await;
    }
}
