//! Discord REST implementation of [`Messenger`].

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, RETRY_AFTER};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{Channel, Message, Messenger, NotifyError};

#[derive(Clone)]
pub struct DiscordMessenger {
    client: Client,
    api_base: String,
    token: String,
    max_retries: u8,
}

impl DiscordMessenger {
    /// Build a messenger for the bot identified by `token`.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(api_base: &str, token: &str) -> Result<Self, NotifyError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .user_agent(concat!("forum-watch/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            api_base: api_base.trim_end_matches('/').to_string(),
            token: token.to_string(),
            max_retries: 3,
        })
    }

    #[must_use]
    pub fn with_retries(mut self, retries: u8) -> Self {
        self.max_retries = retries.max(1);
        self
    }

    fn auth_header(&self) -> String {
        format!("Bot {}", self.token)
    }
}

#[derive(Deserialize)]
struct ChannelResponse {
    id: String,
    #[serde(default)]
    name: Option<String>,
}

#[derive(Serialize)]
struct Embed<'a> {
    title: &'a str,
    description: &'a str,
}

#[derive(Serialize)]
struct CreateMessage<'a> {
    embeds: [Embed<'a>; 1],
}

impl<'a> CreateMessage<'a> {
    fn from_message(message: &'a Message) -> Self {
        Self {
            embeds: [Embed {
                title: &message.title,
                description: &message.description,
            }],
        }
    }
}

#[async_trait]
impl Messenger for DiscordMessenger {
    async fn resolve_channel(&self, id: &str) -> Result<Option<Channel>, NotifyError> {
        let response = self
            .client
            .get(format!("{}/channels/{id}", self.api_base))
            .header("Authorization", self.auth_header())
            .send()
            .await?;

        match response.status() {
            status if status.is_success() => {
                let channel: ChannelResponse = response.json().await?;
                Ok(Some(Channel {
                    id: channel.id,
                    name: channel.name,
                }))
            }
            StatusCode::NOT_FOUND | StatusCode::FORBIDDEN => Ok(None),
            status => Err(NotifyError::Status {
                status: status.as_u16(),
                body: response.text().await.unwrap_or_default(),
            }),
        }
    }

    async fn send(&self, channel: &Channel, message: &Message) -> Result<(), NotifyError> {
        let url = format!("{}/channels/{}/messages", self.api_base, channel.id);
        let payload = CreateMessage::from_message(message);

        let mut attempt: u8 = 0;
        loop {
            attempt += 1;
            let response = self
                .client
                .post(&url)
                .header("Authorization", self.auth_header())
                .json(&payload)
                .send()
                .await?;

            let status = response.status();
            if status.is_success() {
                debug!(channel_id = %channel.id, "Message sent");
                return Ok(());
            }

            let retryable = status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error();
            if retryable && attempt < self.max_retries {
                let delay = if status == StatusCode::TOO_MANY_REQUESTS {
                    retry_after(response.headers()).unwrap_or_else(|| backoff(attempt))
                } else {
                    backoff(attempt)
                };
                debug!(
                    channel_id = %channel.id,
                    status = status.as_u16(),
                    attempt,
                    delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                    "Retrying message"
                );
                tokio::time::sleep(delay).await;
                continue;
            }

            return Err(NotifyError::Status {
                status: status.as_u16(),
                body: response.text().await.unwrap_or_default(),
            });
        }
    }
}

/// First retry delay; doubles on each further attempt.
const BASE_BACKOFF: Duration = Duration::from_millis(500);

/// Upper bound on any single retry delay.
const MAX_BACKOFF: Duration = Duration::from_secs(30);

/// Delay before retrying after failed attempt number `attempt` (1-based).
fn backoff(attempt: u8) -> Duration {
    let factor = 1u32
        .checked_shl(u32::from(attempt.saturating_sub(1)))
        .unwrap_or(u32::MAX);
    BASE_BACKOFF.saturating_mul(factor).min(MAX_BACKOFF)
}

/// The `Retry-After` delay of a rate-limited response, in (fractional) seconds.
fn retry_after(headers: &HeaderMap) -> Option<Duration> {
    let seconds: f64 = headers
        .get(RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse()
        .ok()?;
    if !seconds.is_finite() || seconds < 0.0 {
        return None;
    }
    Some(Duration::from_secs_f64(seconds.min(MAX_BACKOFF.as_secs_f64())))
}
