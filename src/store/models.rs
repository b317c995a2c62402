use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};

/// Hard upper bound on the number of rows read by one extraction run.
pub const MAX_POSTS: usize = 10;

/// Status recorded for a successful extraction.
pub const STATUS_OK: u16 = 200;

/// Status of the never-fetched sentinel snapshot.
pub const STATUS_NEVER_FETCHED: u16 = 500;

/// A forum user as linked from a thread row.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct UserLink {
    pub name: String,
    pub url: String,
}

/// Last activity on a thread.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LastUpdate {
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub timestamp: DateTime<Utc>,
    pub user: UserLink,
}

/// One forum thread as observed on the thread list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Post {
    pub title: String,
    pub url: String,
    pub pinned: bool,
    /// Creation time.
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub timestamp: DateTime<Utc>,
    pub replies: u64,
    pub views: u64,
    pub author: UserLink,
    pub updated: LastUpdate,
}

impl Post {
    /// Whether the thread has activity after its creation.
    #[must_use]
    pub fn was_updated(&self) -> bool {
        self.updated.timestamp != self.timestamp
    }
}

/// One extraction run, persisted wholesale as the `data` record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub status: u16,
    /// Forum page the posts were read from.
    #[serde(rename = "url")]
    pub source_url: String,
    /// Wall-clock duration of the extraction run, in milliseconds.
    #[serde(rename = "ping")]
    pub latency_ms: u64,
    #[serde(rename = "timestamp", with = "chrono::serde::ts_milliseconds")]
    pub fetched_at: DateTime<Utc>,
    /// Posts in page display order.
    #[serde(rename = "data")]
    pub posts: Vec<Post>,
}

impl Snapshot {
    /// A fresh, successful snapshot with no posts yet.
    ///
    /// `fetched_at` is truncated to the millisecond precision it is stored with.
    #[must_use]
    pub fn begin(source_url: impl Into<String>, fetched_at: DateTime<Utc>) -> Self {
        Self {
            status: STATUS_OK,
            source_url: source_url.into(),
            latency_ms: 0,
            fetched_at: fetched_at.trunc_subsecs(3),
            posts: Vec::new(),
        }
    }

    /// The sentinel used when no snapshot has ever been persisted.
    #[must_use]
    pub fn never_fetched() -> Self {
        Self {
            status: STATUS_NEVER_FETCHED,
            source_url: String::new(),
            latency_ms: 0,
            fetched_at: DateTime::<Utc>::UNIX_EPOCH,
            posts: Vec::new(),
        }
    }

    #[must_use]
    pub fn is_never_fetched(&self) -> bool {
        self.status == STATUS_NEVER_FETCHED || self.fetched_at == DateTime::<Utc>::UNIX_EPOCH
    }
}

/// Notification targets and the users allowed to edit them.
///
/// Owned by the management command; the watcher only reads it.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct NotificationConfig {
    #[serde(default)]
    pub managers: Vec<String>,
    #[serde(default)]
    pub channels: Vec<String>,
}

impl NotificationConfig {
    /// Channel ids with duplicates removed, first occurrence kept.
    #[must_use]
    pub fn unique_channels(&self) -> Vec<&str> {
        let mut seen = std::collections::HashSet::new();
        self.channels
            .iter()
            .map(String::as_str)
            .filter(|id| seen.insert(*id))
            .collect()
    }
}

/// Forum credentials, stored as the `login` record.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginRecord {
    pub url: String,
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for LoginRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoginRecord")
            .field("url", &self.url)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}
