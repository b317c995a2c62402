//! Staleness and "latest relevant post" rules.

use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::store::{Post, Snapshot};

/// The newest non-pinned post of `snapshot`.
///
/// Pinned threads are announcements, not new activity, so they never count.
/// Ties keep the post that appears first on the page. A never-fetched
/// snapshot has no latest post.
#[must_use]
pub fn latest_relevant(snapshot: &Snapshot) -> Option<&Post> {
    if snapshot.is_never_fetched() {
        return None;
    }
    snapshot
        .posts
        .iter()
        .filter(|post| !post.pinned)
        .fold(None, |best: Option<&Post>, post| match best {
            Some(b) if b.timestamp >= post.timestamp => Some(b),
            _ => Some(post),
        })
}

/// Whether `snapshot` is old enough to warrant a new extraction.
///
/// Age is measured from the latest relevant post (the Unix epoch when there
/// is none). The comparison is strict: exactly `window` old is still fresh.
#[must_use]
pub fn is_stale(snapshot: &Snapshot, now: DateTime<Utc>, window: Duration) -> bool {
    let reference = latest_relevant(snapshot).map_or(DateTime::<Utc>::UNIX_EPOCH, |p| p.timestamp);
    match chrono::Duration::from_std(window) {
        Ok(window) => now - reference > window,
        Err(_) => false,
    }
}

/// Whether the latest relevant post differs between two snapshots.
///
/// Only the timestamps are compared; either side may be absent.
#[must_use]
pub fn latest_changed(old: Option<&Post>, new: Option<&Post>) -> bool {
    old.map(|p| p.timestamp) != new.map(|p| p.timestamp)
}
