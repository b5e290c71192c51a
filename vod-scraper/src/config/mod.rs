//! Environment-driven configuration.
//!
//! Every scheduling knob is a plain scalar read from the environment
//! (after `dotenvy` has loaded any `.env` file), with defaults suited
//! to a single scraper instance polling once a second.

use std::fmt::Display;
use std::str::FromStr;
use std::time::Duration;

use crate::{Error, Result};

/// Full configuration for one scraper process.
#[derive(Debug, Clone)]
pub struct ScraperConfig {
    /// Postgres connection string.
    pub database_url: String,
    /// Helix application client id.
    pub client_id: String,
    /// Helix application client secret.
    pub client_secret: String,
    /// Cadence of the discovery feed poll loop.
    pub poll_interval: Duration,
    /// Deadline applied to every outbound network and database call.
    pub request_time_limit: Duration,
    /// A live session unseen for longer than this is presumed stopped.
    pub live_eviction_threshold: Duration,
    /// Grace period before a presumed-stopped session counts as ended.
    pub wait_eviction_threshold: Duration,
    /// Capacity bound of the archive-candidate queue.
    pub max_archive_queue_size: usize,
    /// Number of manifest-fetching workers.
    pub worker_count: usize,
    /// Cadence of each worker's job intake.
    pub worker_interval: Duration,
    /// Cursor age past which the feed cursor is forcibly reset.
    pub cursor_reset_threshold: Duration,
    /// Fractional offset into a page at which the next cursor is taken.
    pub cursor_fraction: f64,
    /// Minimum viewer count for a session to be tracked at all.
    pub min_viewers_to_observe: i64,
    /// Minimum peak viewer count for an ended session to be archived.
    pub min_viewers_to_record: i64,
    /// Streams requested per feed page (1 to 30).
    pub page_size: u32,
    /// Rows older than this are deleted each poll.
    pub retention: Duration,
    /// Gzip level for stored manifests (0 to 9).
    pub compression_level: u32,
    /// Lifetime of one scrape epoch before the pipeline is restarted.
    pub scraper_restart_interval: Duration,
    /// Rehydration window multiplier over the two eviction thresholds.
    pub eviction_ratio: f64,
}

impl Default for ScraperConfig {
    fn default() -> Self {
        Self {
            database_url: String::new(),
            client_id: String::new(),
            client_secret: String::new(),
            poll_interval: Duration::from_secs(1),
            request_time_limit: Duration::from_secs(15),
            live_eviction_threshold: Duration::from_secs(15 * 60),
            wait_eviction_threshold: Duration::from_secs(30 * 60),
            max_archive_queue_size: 2500,
            worker_count: 3,
            worker_interval: Duration::from_secs(2),
            cursor_reset_threshold: Duration::from_secs(5 * 60),
            cursor_fraction: 0.8,
            min_viewers_to_observe: 5,
            min_viewers_to_record: 10,
            page_size: 30,
            retention: Duration::from_secs(14 * 24 * 60 * 60),
            compression_level: 6,
            scraper_restart_interval: Duration::from_secs(12 * 60 * 60),
            eviction_ratio: 1.5,
        }
    }
}

fn env_var(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn required(key: &str) -> Result<String> {
    env_var(key).ok_or_else(|| Error::config(format!("{key} is not set")))
}

fn parsed<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: Display,
{
    match env_var(key) {
        Some(raw) => raw
            .parse()
            .map_err(|err| Error::config(format!("invalid {key}: {err}"))),
        None => Ok(default),
    }
}

fn seconds(key: &str, default: Duration) -> Result<Duration> {
    Ok(Duration::from_secs(parsed(key, default.as_secs())?))
}

impl ScraperConfig {
    /// Load configuration from the environment, falling back to defaults
    /// for everything except the database URL and Helix credentials.
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();
        let config = Self {
            database_url: required("DATABASE_URL")?,
            client_id: required("TWITCH_CLIENT_ID")?,
            client_secret: required("TWITCH_CLIENT_SECRET")?,
            poll_interval: seconds("POLL_INTERVAL_SECONDS", defaults.poll_interval)?,
            request_time_limit: seconds(
                "REQUEST_TIME_LIMIT_SECONDS",
                defaults.request_time_limit,
            )?,
            live_eviction_threshold: seconds(
                "LIVE_EVICTION_THRESHOLD_SECONDS",
                defaults.live_eviction_threshold,
            )?,
            wait_eviction_threshold: seconds(
                "WAIT_EVICTION_THRESHOLD_SECONDS",
                defaults.wait_eviction_threshold,
            )?,
            max_archive_queue_size: parsed(
                "MAX_ARCHIVE_QUEUE_SIZE",
                defaults.max_archive_queue_size,
            )?,
            worker_count: parsed("WORKER_COUNT", defaults.worker_count)?,
            worker_interval: seconds("WORKER_INTERVAL_SECONDS", defaults.worker_interval)?,
            cursor_reset_threshold: seconds(
                "CURSOR_RESET_THRESHOLD_SECONDS",
                defaults.cursor_reset_threshold,
            )?,
            cursor_fraction: parsed("CURSOR_FRACTION", defaults.cursor_fraction)?,
            min_viewers_to_observe: parsed(
                "MIN_VIEWERS_TO_OBSERVE",
                defaults.min_viewers_to_observe,
            )?,
            min_viewers_to_record: parsed(
                "MIN_VIEWERS_TO_RECORD",
                defaults.min_viewers_to_record,
            )?,
            page_size: parsed("PAGE_SIZE", defaults.page_size)?,
            retention: seconds("RETENTION_SECONDS", defaults.retention)?,
            compression_level: parsed("COMPRESSION_LEVEL", defaults.compression_level)?,
            scraper_restart_interval: seconds(
                "SCRAPER_RESTART_INTERVAL_SECONDS",
                defaults.scraper_restart_interval,
            )?,
            eviction_ratio: parsed("EVICTION_RATIO", defaults.eviction_ratio)?,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if !(0.0..1.0).contains(&self.cursor_fraction) {
            return Err(Error::config("CURSOR_FRACTION must be in [0, 1)"));
        }
        if self.page_size == 0 || self.page_size > 30 {
            return Err(Error::config("PAGE_SIZE must be between 1 and 30"));
        }
        if self.compression_level > 9 {
            return Err(Error::config("COMPRESSION_LEVEL must be between 0 and 9"));
        }
        if self.worker_count == 0 {
            return Err(Error::config("WORKER_COUNT must be at least 1"));
        }
        if self.eviction_ratio < 1.0 {
            return Err(Error::config("EVICTION_RATIO must be at least 1"));
        }
        Ok(())
    }
}
