//! Lifecycle scraper for Twitch broadcasts.
//!
//! Continuously discovers live broadcasts from the paginated GraphQL
//! feed, tracks each session from observed-live through ended, and
//! opportunistically fetches and compresses the playback manifest of
//! every session worth keeping before the platform removes it.

pub mod config;
pub mod database;
pub mod error;
pub mod scraper;

pub use error::{Error, Result};
