//! Bounded row-by-row extraction of the thread list.

use std::time::Duration;

use chrono::{DateTime, SubsecRound, Utc};
use tracing::{debug, info};

use super::selectors::{Field, SelectorTemplate};
use super::ExtractError;
use crate::browser::{AuthenticatedSession, ElementHandle, Probe};
use crate::store::{LastUpdate, Post, Snapshot, UserLink, MAX_POSTS};

/// Reads up to [`MAX_POSTS`] thread rows from a signed-in session.
pub struct PostExtractor<'a> {
    session: &'a AuthenticatedSession,
    template: &'a SelectorTemplate,
    probe_timeout: Duration,
}

impl<'a> PostExtractor<'a> {
    #[must_use]
    pub fn new(
        session: &'a AuthenticatedSession,
        template: &'a SelectorTemplate,
        probe_timeout: Duration,
    ) -> Self {
        Self {
            session,
            template,
            probe_timeout,
        }
    }

    /// Append the rows currently on the page to `snapshot.posts`, in page order.
    ///
    /// Stops at the first row whose title does not show up within the probe
    /// timeout, or after [`MAX_POSTS`] rows. Returns the number of rows read.
    ///
    /// # Errors
    ///
    /// Fails if a row has a title but any required field is missing or malformed.
    pub async fn extract(&self, snapshot: &mut Snapshot) -> Result<usize, ExtractError> {
        let mut count = 0;
        for index in 1..=MAX_POSTS {
            match self.extract_row(index).await? {
                Some(post) => {
                    debug!(row = index, title = %post.title, pinned = post.pinned, "Extracted row");
                    snapshot.posts.push(post);
                    count += 1;
                }
                None => {
                    debug!(row = index, "No more rows");
                    break;
                }
            }
        }
        info!(posts = count, "Thread list extracted");
        Ok(count)
    }

    /// Read row `index`, or `None` if the row does not exist.
    ///
    /// # Errors
    ///
    /// Fails if the row exists but a required field cannot be read.
    pub async fn extract_row(&self, index: usize) -> Result<Option<Post>, ExtractError> {
        let title_selector = self.template.field(index, Field::Title);
        let Probe::Found(title) = self
            .session
            .probe(&title_selector, self.probe_timeout)
            .await?
        else {
            return Ok(None);
        };
        let url = require_href(index, Field::Title, &title)?;

        let pinned = self
            .session
            .probe(&self.template.field(index, Field::Pinned), self.probe_timeout)
            .await?
            .is_found();

        let timestamp = self.timestamp(index, Field::Timestamp).await?;
        let replies = self.count(index, Field::Replies).await?;
        let views = self.count(index, Field::Views).await?;
        let author = self.user(index, Field::Author).await?;

        let updated = LastUpdate {
            timestamp: self.timestamp(index, Field::UpdatedTimestamp).await?,
            user: self.user(index, Field::UpdatedUser).await?,
        };

        Ok(Some(Post {
            title: title.text.trim().to_string(),
            url,
            pinned,
            timestamp,
            replies,
            views,
            author,
            updated,
        }))
    }

    async fn required(&self, index: usize, field: Field) -> Result<ElementHandle, ExtractError> {
        Ok(self
            .session
            .locate(&self.template.field(index, field))
            .await?)
    }

    async fn timestamp(&self, index: usize, field: Field) -> Result<DateTime<Utc>, ExtractError> {
        let element = self.required(index, field).await?;
        let raw = element
            .attribute("datetime")
            .ok_or(ExtractError::MissingAttribute {
                row: index,
                field,
                attribute: "datetime",
            })?;
        parse_timestamp(raw).ok_or_else(|| ExtractError::InvalidTimestamp {
            row: index,
            field,
            value: raw.to_string(),
        })
    }

    async fn count(&self, index: usize, field: Field) -> Result<u64, ExtractError> {
        let element = self.required(index, field).await?;
        parse_count(&element.text).ok_or_else(|| ExtractError::InvalidCount {
            row: index,
            field,
            value: element.text.clone(),
        })
    }

    async fn user(&self, index: usize, field: Field) -> Result<UserLink, ExtractError> {
        let element = self.required(index, field).await?;
        Ok(UserLink {
            name: element.text.trim().to_string(),
            url: require_href(index, field, &element)?,
        })
    }
}

fn require_href(index: usize, field: Field, element: &ElementHandle) -> Result<String, ExtractError> {
    element
        .href
        .clone()
        .filter(|href| !href.is_empty())
        .ok_or(ExtractError::MissingAttribute {
            row: index,
            field,
            attribute: "href",
        })
}

/// Parse a `datetime` attribute (RFC 3339), truncated to milliseconds.
#[must_use]
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw.trim())
        .ok()
        .map(|dt| dt.with_timezone(&Utc).trunc_subsecs(3))
}

/// Parse a displayed count such as `12`, `1,234`, `1.2k` or `3M`.
///
/// Only the first whitespace-separated token is considered, so trailing
/// labels like `replies` are ignored.
#[must_use]
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]
pub fn parse_count(raw: &str) -> Option<u64> {
    let token = raw.split_whitespace().next()?.replace(',', "").to_lowercase();

    let (number, multiplier) = if let Some(n) = token.strip_suffix('k') {
        (n, 1_000.0)
    } else if let Some(n) = token.strip_suffix('m') {
        (n, 1_000_000.0)
    } else {
        return token.parse().ok();
    };

    let value: f64 = number.parse().ok()?;
    if !value.is_finite() || value.is_sign_negative() {
        return None;
    }
    Some((value * multiplier).round() as u64)
}
