//! Best-effort fan-out of new-thread announcements.

pub mod discord;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures_util::future::join_all;
use thiserror::Error;
use tracing::{debug, info, warn};

pub use discord::DiscordMessenger;

use crate::constants::ANNOUNCEMENT_TITLE;
use crate::store::{NotificationConfig, Post};

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("unexpected status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("message rejected: {0}")]
    Rejected(String),
}

/// A resolved chat channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Channel {
    pub id: String,
    pub name: Option<String>,
}

/// A rich message: one embed with a title and markdown description.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub title: String,
    pub description: String,
}

/// Messaging collaborator.
#[async_trait]
pub trait Messenger: Send + Sync {
    /// Look up a channel by id; `Ok(None)` if it does not exist or is not visible.
    async fn resolve_channel(&self, id: &str) -> Result<Option<Channel>, NotifyError>;

    async fn send(&self, channel: &Channel, message: &Message) -> Result<(), NotifyError>;
}

/// Outcome of one fan-out.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeliveryReport {
    pub delivered: Vec<String>,
    pub unresolved: Vec<String>,
    pub failed: Vec<String>,
}

enum Delivery {
    Delivered,
    Unresolved,
    Failed,
}

/// Sends announcements to every configured channel.
#[derive(Clone)]
pub struct Notifier {
    messenger: Arc<dyn Messenger>,
}

impl Notifier {
    #[must_use]
    pub fn new(messenger: Arc<dyn Messenger>) -> Self {
        Self { messenger }
    }

    /// Announce `post` to every channel in `config`.
    ///
    /// Channels are served concurrently and independently; failures are
    /// logged and reported, never returned.
    pub async fn announce(&self, post: &Post, config: &NotificationConfig) -> DeliveryReport {
        let message = announcement(post);
        let channels = config.unique_channels();

        let outcomes = join_all(
            channels
                .iter()
                .map(|id| self.deliver(id, &message)),
        )
        .await;

        let mut report = DeliveryReport::default();
        for (id, outcome) in channels.into_iter().zip(outcomes) {
            let bucket = match outcome {
                Delivery::Delivered => &mut report.delivered,
                Delivery::Unresolved => &mut report.unresolved,
                Delivery::Failed => &mut report.failed,
            };
            bucket.push(id.to_string());
        }

        info!(
            url = %post.url,
            delivered = report.delivered.len(),
            unresolved = report.unresolved.len(),
            failed = report.failed.len(),
            "Announcement sent"
        );
        report
    }

    async fn deliver(&self, channel_id: &str, message: &Message) -> Delivery {
        let channel = match self.messenger.resolve_channel(channel_id).await {
            Ok(Some(channel)) => channel,
            Ok(None) => {
                warn!(channel_id, "Channel not found, skipping");
                return Delivery::Unresolved;
            }
            Err(e) => {
                warn!(channel_id, error = %e, "Failed to resolve channel");
                return Delivery::Failed;
            }
        };

        match self.messenger.send(&channel, message).await {
            Ok(()) => {
                debug!(
                    channel_id,
                    channel = channel.name.as_deref().unwrap_or("unnamed"),
                    "Announcement delivered"
                );
                Delivery::Delivered
            }
            Err(e) => {
                warn!(channel_id, error = %e, "Failed to send announcement");
                Delivery::Failed
            }
        }
    }
}

/// Message announcing a newly seen thread.
#[must_use]
pub fn announcement(post: &Post) -> Message {
    Message {
        title: ANNOUNCEMENT_TITLE.to_string(),
        description: format!(
            "[{}]({}) by [{}]({}) - {}.",
            escape_link_text(&post.title),
            post.url,
            escape_link_text(&post.author.name),
            post.author.url,
            relative_timestamp(post.timestamp),
        ),
    }
}

/// Chat markup that clients render as a relative age ("3 hours ago").
#[must_use]
pub fn relative_timestamp(at: DateTime<Utc>) -> String {
    format!("<t:{}:R>", at.timestamp())
}

/// Escape brackets so text can sit inside a markdown link label.
#[must_use]
pub fn escape_link_text(text: &str) -> String {
    text.replace('[', "\\[").replace(']', "\\]")
}
