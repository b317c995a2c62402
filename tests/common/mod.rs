//! Scripted forum used by the integration tests.
//!
//! `FakeSite` implements the browser traits over an in-memory thread list
//! laid out with the default selector template.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use forum_watch::browser::{
    BrowserError, BrowserLauncher, BrowserPage, ElementHandle, LoginSelectors,
};
use forum_watch::notify::{Channel, Message, Messenger, NotifyError};
use forum_watch::scraper::{Field, SelectorTemplate};
use forum_watch::store::{LoginRecord, NotificationConfig, SnapshotStore};

pub const FORUM_URL: &str = "https://forum.example.com/";
pub const LANDING_SEARCH: &str = "?/forum/13-suggestions/";

#[derive(Debug, Clone)]
pub struct FakeRow {
    pub title: String,
    pub url: String,
    pub pinned: bool,
    pub timestamp: DateTime<Utc>,
    pub replies: String,
    pub views: String,
    pub author: String,
    pub updated_at: DateTime<Utc>,
    pub updated_by: String,
    /// Field left out of the DOM entirely.
    pub omit: Option<Field>,
}

impl FakeRow {
    pub fn new(id: u32, title: &str, timestamp: DateTime<Utc>) -> Self {
        Self {
            title: title.to_string(),
            url: format!("{FORUM_URL}topic/{id}-thread/"),
            pinned: false,
            timestamp,
            replies: "2".to_string(),
            views: "31".to_string(),
            author: format!("user{id}"),
            updated_at: timestamp,
            updated_by: format!("user{id}"),
            omit: None,
        }
    }

    pub fn pinned(mut self) -> Self {
        self.pinned = true;
        self
    }

    fn profile(name: &str) -> String {
        format!("{FORUM_URL}profile/{name}/")
    }

    fn elements(&self) -> Vec<(Field, ElementHandle)> {
        let mut elements = vec![
            (Field::Title, link(&self.title, &self.url)),
            (Field::Timestamp, time(self.timestamp)),
            (Field::Replies, text(&self.replies)),
            (Field::Views, text(&self.views)),
            (Field::Author, link(&self.author, &Self::profile(&self.author))),
            (Field::UpdatedTimestamp, time(self.updated_at)),
            (
                Field::UpdatedUser,
                link(&self.updated_by, &Self::profile(&self.updated_by)),
            ),
        ];
        if self.pinned {
            elements.push((Field::Pinned, text("Pinned")));
        }
        elements.retain(|(field, _)| Some(*field) != self.omit);
        elements
    }
}

fn text(value: &str) -> ElementHandle {
    ElementHandle {
        text: value.to_string(),
        ..ElementHandle::default()
    }
}

fn link(value: &str, href: &str) -> ElementHandle {
    ElementHandle {
        text: value.to_string(),
        href: Some(href.to_string()),
        ..ElementHandle::default()
    }
}

fn time(at: DateTime<Utc>) -> ElementHandle {
    ElementHandle {
        text: "some time ago".to_string(),
        href: None,
        attributes: HashMap::from([("datetime".to_string(), at.to_rfc3339())]),
    }
}

#[derive(Default)]
struct SiteState {
    rows: Vec<FakeRow>,
    queries: Vec<String>,
    actions: Vec<String>,
    launches: usize,
    signed_in: bool,
    reject_login: bool,
}

/// A forum whose thread list can be changed between checks.
#[derive(Clone, Default)]
pub struct FakeSite {
    state: Arc<Mutex<SiteState>>,
}

impl FakeSite {
    pub fn with_rows(rows: Vec<FakeRow>) -> Self {
        let site = Self::default();
        site.set_rows(rows);
        site
    }

    pub fn set_rows(&self, rows: Vec<FakeRow>) {
        self.state.lock().unwrap().rows = rows;
    }

    pub fn push_row_front(&self, row: FakeRow) {
        self.state.lock().unwrap().rows.insert(0, row);
    }

    pub fn reject_login(&self) {
        self.state.lock().unwrap().reject_login = true;
    }

    pub fn launches(&self) -> usize {
        self.state.lock().unwrap().launches
    }

    pub fn queries(&self) -> Vec<String> {
        self.state.lock().unwrap().queries.clone()
    }

    pub fn actions(&self) -> Vec<String> {
        self.state.lock().unwrap().actions.clone()
    }

    fn dom(state: &SiteState) -> HashMap<String, ElementHandle> {
        let template = SelectorTemplate::default();
        let login = LoginSelectors::default();
        let mut dom = HashMap::new();

        if !state.signed_in {
            for selector in [login.username, login.password, login.submit] {
                dom.insert(selector, ElementHandle::default());
            }
            return dom;
        }

        for (i, row) in state.rows.iter().enumerate() {
            for (field, element) in row.elements() {
                dom.insert(template.field(i + 1, field), element);
            }
        }
        dom
    }
}

#[async_trait]
impl BrowserLauncher for FakeSite {
    async fn launch(&self) -> Result<Box<dyn BrowserPage>, BrowserError> {
        let mut state = self.state.lock().unwrap();
        state.launches += 1;
        state.signed_in = false;
        Ok(Box::new(self.clone()))
    }
}

#[async_trait]
impl BrowserPage for FakeSite {
    async fn goto(&self, url: &str) -> Result<(), BrowserError> {
        self.state.lock().unwrap().actions.push(format!("goto {url}"));
        Ok(())
    }

    async fn type_text(&self, selector: &str, text: &str) -> Result<(), BrowserError> {
        self.state
            .lock()
            .unwrap()
            .actions
            .push(format!("type {selector} {text}"));
        Ok(())
    }

    async fn click(&self, selector: &str) -> Result<(), BrowserError> {
        let mut state = self.state.lock().unwrap();
        state.actions.push(format!("click {selector}"));
        if state.reject_login {
            return Err(BrowserError::Protocol("sign-in rejected".to_string()));
        }
        state.signed_in = true;
        Ok(())
    }

    async fn query(&self, selector: &str) -> Result<Option<ElementHandle>, BrowserError> {
        let mut state = self.state.lock().unwrap();
        state.queries.push(selector.to_string());
        Ok(Self::dom(&state).remove(selector))
    }

    async fn location_search(&self) -> Result<String, BrowserError> {
        let state = self.state.lock().unwrap();
        Ok(if state.signed_in {
            LANDING_SEARCH.to_string()
        } else {
            "?/login/".to_string()
        })
    }

    async fn close(&self) -> Result<(), BrowserError> {
        self.state.lock().unwrap().actions.push("close".to_string());
        Ok(())
    }
}

/// Messenger that accepts every channel except `"missing"`.
#[derive(Default)]
pub struct RecordingMessenger {
    pub sent: Mutex<Vec<(String, Message)>>,
}

impl RecordingMessenger {
    pub fn sent(&self) -> Vec<(String, Message)> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Messenger for RecordingMessenger {
    async fn resolve_channel(&self, id: &str) -> Result<Option<Channel>, NotifyError> {
        if id == "missing" {
            return Ok(None);
        }
        Ok(Some(Channel {
            id: id.to_string(),
            name: None,
        }))
    }

    async fn send(&self, channel: &Channel, message: &Message) -> Result<(), NotifyError> {
        self.sent
            .lock()
            .unwrap()
            .push((channel.id.clone(), message.clone()));
        Ok(())
    }
}

pub fn login_record() -> LoginRecord {
    LoginRecord {
        url: FORUM_URL.to_string(),
        username: "watcher".to_string(),
        password: "secret".to_string(),
    }
}

/// Store with login and config records in place.
pub fn seeded_store(dir: &std::path::Path, channels: &[&str]) -> SnapshotStore {
    let store = SnapshotStore::open(dir.join("cache")).expect("Failed to open store");
    store
        .write(forum_watch::store::LOGIN_RECORD, &login_record())
        .expect("Failed to write login");
    store
        .write(
            forum_watch::store::CONFIG_RECORD,
            &NotificationConfig {
                managers: vec!["100".to_string()],
                channels: channels.iter().map(ToString::to_string).collect(),
            },
        )
        .expect("Failed to write config");
    store
}
