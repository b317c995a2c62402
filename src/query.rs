//! Read-only lookups over the persisted snapshot.
//!
//! These back the chat commands that let users browse the cached thread
//! list. Nothing here touches the browser.

use thiserror::Error;

use crate::notify::{escape_link_text, relative_timestamp};
use crate::store::{Post, Snapshot};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueryError {
    #[error("No data has been cached yet.")]
    NoData,
    #[error("No post with that URL was found.")]
    UrlNotFound,
    #[error("No posts by that author were found.")]
    AuthorNotFound,
    #[error("No post with that title was found.")]
    TitleNotFound,
}

/// Case-insensitive string equality.
#[must_use]
pub fn eq_ignore_case(a: &str, b: &str) -> bool {
    a.to_lowercase() == b.to_lowercase()
}

fn fetched(snapshot: &Snapshot) -> Result<&Snapshot, QueryError> {
    if snapshot.is_never_fetched() {
        Err(QueryError::NoData)
    } else {
        Ok(snapshot)
    }
}

/// The post whose URL matches `url`, ignoring case.
///
/// # Errors
///
/// [`QueryError::NoData`] for a never-fetched snapshot,
/// [`QueryError::UrlNotFound`] when nothing matches.
pub fn find_by_url<'a>(snapshot: &'a Snapshot, url: &str) -> Result<&'a Post, QueryError> {
    fetched(snapshot)?
        .posts
        .iter()
        .find(|post| eq_ignore_case(&post.url, url))
        .ok_or(QueryError::UrlNotFound)
}

/// All posts by `author`, ignoring case, in page order.
///
/// # Errors
///
/// [`QueryError::NoData`] for a never-fetched snapshot,
/// [`QueryError::AuthorNotFound`] when nothing matches.
pub fn posts_by_author<'a>(snapshot: &'a Snapshot, author: &str) -> Result<Vec<&'a Post>, QueryError> {
    let posts: Vec<&Post> = fetched(snapshot)?
        .posts
        .iter()
        .filter(|post| eq_ignore_case(&post.author.name, author))
        .collect();

    if posts.is_empty() {
        Err(QueryError::AuthorNotFound)
    } else {
        Ok(posts)
    }
}

/// The first post whose title starts with `prefix`, ignoring case.
///
/// # Errors
///
/// [`QueryError::NoData`] for a never-fetched snapshot,
/// [`QueryError::TitleNotFound`] when nothing matches.
pub fn find_by_title_prefix<'a>(snapshot: &'a Snapshot, prefix: &str) -> Result<&'a Post, QueryError> {
    let prefix = prefix.to_lowercase();
    fetched(snapshot)?
        .posts
        .iter()
        .find(|post| post.title.to_lowercase().starts_with(&prefix))
        .ok_or(QueryError::TitleNotFound)
}

/// Every cached post, in page order.
///
/// # Errors
///
/// [`QueryError::NoData`] for a never-fetched snapshot.
pub fn all_posts(snapshot: &Snapshot) -> Result<&[Post], QueryError> {
    Ok(&fetched(snapshot)?.posts)
}

/// Multi-line summary of one post.
#[must_use]
pub fn describe_post(post: &Post, snapshot: &Snapshot) -> String {
    let mut created = format!(
        "Created by [{}]({}) - {}.",
        escape_link_text(&post.author.name),
        post.author.url,
        relative_timestamp(post.timestamp)
    );
    if post.was_updated() {
        created.push_str(&format!(
            " Last updated by [{}]({}) - {}.",
            escape_link_text(&post.updated.user.name),
            post.updated.user.url,
            relative_timestamp(post.updated.timestamp)
        ));
    }

    let pinned = if post.pinned { " | \u{1F4CC} Pinned" } else { "" };
    [
        created,
        String::new(),
        format!("Replies: **{}** | Views: **{}**{pinned}", post.replies, post.views),
        last_fetched_line(snapshot),
    ]
    .join("\n")
}

/// One line per post, pinned posts marked.
#[must_use]
pub fn describe_all(snapshot: &Snapshot) -> String {
    let mut lines: Vec<String> = snapshot
        .posts
        .iter()
        .map(|post| {
            format!(
                "{}[{}]({}) by [{}]({}) - {}",
                if post.pinned { "\u{1F4CC} " } else { "" },
                escape_link_text(&post.title),
                post.url,
                escape_link_text(&post.author.name),
                post.author.url,
                relative_timestamp(post.timestamp)
            )
        })
        .collect();
    lines.push(last_fetched_line(snapshot));
    lines.join("\n")
}

fn last_fetched_line(snapshot: &Snapshot) -> String {
    format!(
        "\n**Last fetched:** {}",
        relative_timestamp(snapshot.fetched_at)
    )
}
