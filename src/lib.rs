//! Forum watcher library.
//!
//! Periodically signs in to a forum with a headless browser, reads the
//! thread list, stores it as a JSON snapshot, and announces new threads to
//! the configured chat channels.

pub mod browser;
pub mod config;
pub mod constants;
pub mod monitor;
pub mod notify;
pub mod query;
pub mod scraper;
pub mod store;
