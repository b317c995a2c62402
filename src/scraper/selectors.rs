//! Declarative selectors for the forum's thread list.

use std::fmt;

/// Placeholder in [`SelectorTemplate::row`] replaced by the 1-based row index.
pub const ROW_INDEX_PLACEHOLDER: &str = "{i}";

/// The parts of a thread row the extractor reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    Title,
    Timestamp,
    Pinned,
    Replies,
    Views,
    Author,
    UpdatedTimestamp,
    UpdatedUser,
}

impl Field {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Title => "title",
            Self::Timestamp => "timestamp",
            Self::Pinned => "pinned",
            Self::Replies => "replies",
            Self::Views => "views",
            Self::Author => "author",
            Self::UpdatedTimestamp => "updated.timestamp",
            Self::UpdatedUser => "updated.user",
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Maps `(row index, field)` to a CSS selector.
///
/// The defaults match the Invision Community thread list layout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectorTemplate {
    /// Selector of one row, with [`ROW_INDEX_PLACEHOLDER`] for the index.
    pub row: String,
    pub title: String,
    pub timestamp: String,
    pub pinned: String,
    pub replies: String,
    pub views: String,
    pub author: String,
    pub updated_timestamp: String,
    pub updated_user: String,
}

impl Default for SelectorTemplate {
    fn default() -> Self {
        Self {
            row: ".ipsBox:nth-child(2) ol > li:nth-child({i})".to_string(),
            title: ".ipsDataItem_main a".to_string(),
            timestamp: ".ipsDataItem_meta time".to_string(),
            pinned: ".ipsDataItem_main .ipsBadge".to_string(),
            replies: ".ipsDataItem_stats li:nth-child(1) span".to_string(),
            views: ".ipsDataItem_stats li:nth-child(2) span".to_string(),
            author: ".ipsDataItem_meta a".to_string(),
            updated_timestamp: ".ipsDataItem_lastPoster time".to_string(),
            updated_user: ".ipsDataItem_lastPoster li:nth-child(2) a".to_string(),
        }
    }
}

impl SelectorTemplate {
    /// Selector of row `index` (1-based).
    #[must_use]
    pub fn row(&self, index: usize) -> String {
        self.row
            .replace(ROW_INDEX_PLACEHOLDER, &index.to_string())
    }

    #[must_use]
    pub fn field_selector(&self, field: Field) -> &str {
        match field {
            Field::Title => &self.title,
            Field::Timestamp => &self.timestamp,
            Field::Pinned => &self.pinned,
            Field::Replies => &self.replies,
            Field::Views => &self.views,
            Field::Author => &self.author,
            Field::UpdatedTimestamp => &self.updated_timestamp,
            Field::UpdatedUser => &self.updated_user,
        }
    }

    /// Full selector for `field` inside row `index`.
    #[must_use]
    pub fn field(&self, index: usize, field: Field) -> String {
        format!("{} {}", self.row(index), self.field_selector(field))
    }
}
