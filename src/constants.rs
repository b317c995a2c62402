//! Shared constants used across the application.

/// User agent presented by the headless browser.
///
/// A stock desktop Chrome string; some forum software serves a reduced
/// layout to headless user agents.
pub const BROWSER_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Title of the announcement embed.
pub const ANNOUNCEMENT_TITLE: &str = "Check this forum post out!";
