//! An authenticated forum session on top of a [`BrowserPage`].

use std::time::Duration;

use tracing::{debug, info};

use super::{BrowserError, BrowserPage, ElementHandle};
use crate::store::LoginRecord;

/// Outcome of a bounded wait for an element.
///
/// `Absent` is an ordinary answer (end of list, optional badge missing),
/// not a failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Probe {
    Found(ElementHandle),
    Absent,
}

impl Probe {
    #[must_use]
    pub fn is_found(&self) -> bool {
        matches!(self, Self::Found(_))
    }
}

/// Selectors of the sign-in form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginSelectors {
    pub username: String,
    pub password: String,
    pub submit: String,
}

impl Default for LoginSelectors {
    fn default() -> Self {
        Self {
            username: "input#auth".to_string(),
            password: "input#password".to_string(),
            submit: "button#elSignIn_submit".to_string(),
        }
    }
}

/// One browser page that has signed in to the forum.
///
/// Owned by a single check run and closed at its end.
pub struct AuthenticatedSession {
    page: Box<dyn BrowserPage>,
    poll_interval: Duration,
}

impl AuthenticatedSession {
    #[must_use]
    pub fn new(page: Box<dyn BrowserPage>, poll_interval: Duration) -> Self {
        Self {
            page,
            poll_interval,
        }
    }

    /// Sign in and wait until the browser lands on the authenticated page.
    ///
    /// The sequence is not retried; any failure aborts the caller's run.
    ///
    /// # Errors
    ///
    /// Returns the first browser error hit along the way.
    pub async fn login(
        &self,
        login: &LoginRecord,
        selectors: &LoginSelectors,
        landing_query_prefix: &str,
    ) -> Result<(), BrowserError> {
        info!(url = %login.url, username = %login.username, "Signing in to forum");

        self.page.goto(&login.url).await?;

        self.locate(&selectors.username).await?;
        self.page
            .type_text(&selectors.username, &login.username)
            .await?;

        self.locate(&selectors.password).await?;
        self.page
            .type_text(&selectors.password, &login.password)
            .await?;

        self.locate(&selectors.submit).await?;
        self.page.click(&selectors.submit).await?;

        self.wait_for_location(landing_query_prefix).await?;
        info!("Signed in");
        Ok(())
    }

    /// Wait for `selector` to appear and return the first match.
    ///
    /// There is no upper bound on the wait; wrap the call in a timeout or use
    /// [`Self::probe`] when one is needed. Lost page contexts during a
    /// navigation are waited out like a missing element.
    ///
    /// # Errors
    ///
    /// Returns [`BrowserError::ElementNotFound`] if the page closes or a
    /// navigation fails before the element shows up.
    pub async fn locate(&self, selector: &str) -> Result<ElementHandle, BrowserError> {
        loop {
            match self.page.query(selector).await {
                Ok(Some(element)) => return Ok(element),
                Ok(None) => tokio::time::sleep(self.poll_interval).await,
                Err(BrowserError::ContextLost(reason)) => {
                    debug!(selector, %reason, "Page context lost, waiting");
                    tokio::time::sleep(self.poll_interval).await;
                }
                Err(BrowserError::PageClosed | BrowserError::Navigation { .. }) => {
                    return Err(BrowserError::ElementNotFound {
                        selector: selector.to_string(),
                    });
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Wait at most `timeout` for `selector`.
    ///
    /// # Errors
    ///
    /// Timing out yields `Ok(Probe::Absent)`. Errors are only returned for
    /// real browser failures.
    pub async fn probe(&self, selector: &str, timeout: Duration) -> Result<Probe, BrowserError> {
        match tokio::time::timeout(timeout, self.locate(selector)).await {
            Ok(Ok(element)) => Ok(Probe::Found(element)),
            Ok(Err(e)) => Err(e),
            Err(_) => {
                debug!(selector, "Probe timed out");
                Ok(Probe::Absent)
            }
        }
    }

    async fn wait_for_location(&self, query_prefix: &str) -> Result<(), BrowserError> {
        loop {
            match self.page.location_search().await {
                Ok(search) if search.starts_with(query_prefix) => return Ok(()),
                Ok(_) => {}
                Err(BrowserError::ContextLost(reason)) => {
                    debug!(%reason, "Page context lost while waiting for landing page");
                }
                Err(e) => return Err(e),
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }

    /// Close the page and its browser.
    ///
    /// # Errors
    ///
    /// Returns an error if the browser does not shut down cleanly.
    pub async fn close(self) -> Result<(), BrowserError> {
        self.page.close().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    /// Page whose elements appear after a number of queries.
    #[derive(Default)]
    struct ScriptedPage {
        appear_after: HashMap<String, usize>,
        queries: Mutex<HashMap<String, usize>>,
        actions: Arc<Mutex<Vec<String>>>,
        closed: bool,
        search: String,
        /// Calls that fail with a lost context before the page settles.
        unsettled_calls: Mutex<usize>,
    }

    impl ScriptedPage {
        fn settle(&self) -> Result<(), BrowserError> {
            let mut remaining = self.unsettled_calls.lock().unwrap();
            if *remaining > 0 {
                *remaining -= 1;
                return Err(BrowserError::ContextLost(
                    "Execution context was destroyed".to_string(),
                ));
            }
            Ok(())
        }
    }

    #[async_trait]
    impl BrowserPage for ScriptedPage {
        async fn goto(&self, url: &str) -> Result<(), BrowserError> {
            self.actions.lock().unwrap().push(format!("goto {url}"));
            Ok(())
        }

        async fn type_text(&self, selector: &str, text: &str) -> Result<(), BrowserError> {
            self.actions
                .lock()
                .unwrap()
                .push(format!("type {selector} {text}"));
            Ok(())
        }

        async fn click(&self, selector: &str) -> Result<(), BrowserError> {
            self.actions.lock().unwrap().push(format!("click {selector}"));
            Ok(())
        }

        async fn query(&self, selector: &str) -> Result<Option<ElementHandle>, BrowserError> {
            if self.closed {
                return Err(BrowserError::PageClosed);
            }
            self.settle()?;
            let mut queries = self.queries.lock().unwrap();
            let seen = queries.entry(selector.to_string()).or_default();
            *seen += 1;
            match self.appear_after.get(selector) {
                Some(after) if *seen > *after => Ok(Some(ElementHandle {
                    text: selector.to_string(),
                    ..ElementHandle::default()
                })),
                _ => Ok(None),
            }
        }

        async fn location_search(&self) -> Result<String, BrowserError> {
            self.settle()?;
            Ok(self.search.clone())
        }

        async fn close(&self) -> Result<(), BrowserError> {
            Ok(())
        }
    }

    fn session(page: ScriptedPage) -> AuthenticatedSession {
        AuthenticatedSession::new(Box::new(page), Duration::from_millis(1))
    }

    #[tokio::test]
    async fn test_locate_waits_until_present() {
        let page = ScriptedPage {
            appear_after: HashMap::from([("li a".to_string(), 3)]),
            ..ScriptedPage::default()
        };
        let element = session(page).locate("li a").await.unwrap();
        assert_eq!(element.text, "li a");
    }

    #[tokio::test]
    async fn test_locate_waits_through_lost_context() {
        let page = ScriptedPage {
            appear_after: HashMap::from([("li a".to_string(), 0)]),
            unsettled_calls: Mutex::new(3),
            ..ScriptedPage::default()
        };
        let element = session(page).locate("li a").await.unwrap();
        assert_eq!(element.text, "li a");
    }

    #[tokio::test]
    async fn test_landing_wait_survives_navigation() {
        let page = ScriptedPage {
            search: "?/forum/13-suggestions/".to_string(),
            unsettled_calls: Mutex::new(2),
            ..ScriptedPage::default()
        };
        session(page)
            .wait_for_location("?/forum/13-suggestions")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_landing_wait_fails_on_closed_page() {
        struct ClosedPage;

        #[async_trait]
        impl BrowserPage for ClosedPage {
            async fn goto(&self, _: &str) -> Result<(), BrowserError> {
                Ok(())
            }
            async fn type_text(&self, _: &str, _: &str) -> Result<(), BrowserError> {
                Ok(())
            }
            async fn click(&self, _: &str) -> Result<(), BrowserError> {
                Ok(())
            }
            async fn query(&self, _: &str) -> Result<Option<ElementHandle>, BrowserError> {
                Err(BrowserError::PageClosed)
            }
            async fn location_search(&self) -> Result<String, BrowserError> {
                Err(BrowserError::PageClosed)
            }
            async fn close(&self) -> Result<(), BrowserError> {
                Ok(())
            }
        }

        let session = AuthenticatedSession::new(Box::new(ClosedPage), Duration::from_millis(1));
        let err = session.wait_for_location("?/").await.unwrap_err();
        assert!(matches!(err, BrowserError::PageClosed));
    }

    #[tokio::test]
    async fn test_locate_on_closed_page_is_not_found() {
        let page = ScriptedPage {
            closed: true,
            ..ScriptedPage::default()
        };
        let err = session(page).locate("li a").await.unwrap_err();
        assert!(matches!(err, BrowserError::ElementNotFound { ref selector } if selector == "li a"));
    }

    #[tokio::test]
    async fn test_probe_absent_after_timeout() {
        let probe = session(ScriptedPage::default())
            .probe(".ipsBadge", Duration::from_millis(20))
            .await
            .unwrap();
        assert_eq!(probe, Probe::Absent);
    }

    #[tokio::test]
    async fn test_probe_found() {
        let page = ScriptedPage {
            appear_after: HashMap::from([(".ipsBadge".to_string(), 0)]),
            ..ScriptedPage::default()
        };
        let probe = session(page)
            .probe(".ipsBadge", Duration::from_millis(200))
            .await
            .unwrap();
        assert!(probe.is_found());
    }

    #[tokio::test]
    async fn test_probe_propagates_real_failures() {
        let page = ScriptedPage {
            closed: true,
            ..ScriptedPage::default()
        };
        let result = session(page)
            .probe(".ipsBadge", Duration::from_millis(50))
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_login_sequence() {
        let actions = Arc::new(Mutex::new(Vec::new()));
        let selectors = LoginSelectors::default();
        let page = ScriptedPage {
            appear_after: HashMap::from([
                (selectors.username.clone(), 0),
                (selectors.password.clone(), 0),
                (selectors.submit.clone(), 0),
            ]),
            actions: Arc::clone(&actions),
            search: "?/forum/13-suggestions/".to_string(),
            ..ScriptedPage::default()
        };
        let login = LoginRecord {
            url: "https://forum.example.com/".to_string(),
            username: "watcher".to_string(),
            password: "secret".to_string(),
        };

        session(page)
            .login(&login, &selectors, "?/forum/13-suggestions")
            .await
            .unwrap();

        let actions = actions.lock().unwrap().clone();
        assert_eq!(
            actions,
            vec![
                "goto https://forum.example.com/".to_string(),
                "type input#auth watcher".to_string(),
                "type input#password secret".to_string(),
                "click button#elSignIn_submit".to_string(),
            ]
        );
    }
}
