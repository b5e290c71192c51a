//! Application-wide error types.

use thiserror::Error;

/// Application-wide result type.
pub type Result<T> = std::result::Result<T, Error>;

/// Application-wide error type.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Database error: {0}")]
    DatabaseSqlx(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Twitch API error: {0}")]
    Api(#[from] twitch_api::TwitchApiError),

    #[error("Manifest error: {0}")]
    Manifest(#[from] vod_manifest::ManifestError),

    #[error("Http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{operation} exceeded the request time limit")]
    DeadlineExceeded { operation: &'static str },

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Channel closed: {0}")]
    ChannelClosed(&'static str),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Task join error: {0}")]
    Join(#[from] tokio::task::JoinError),
}

impl Error {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    pub fn deadline(operation: &'static str) -> Self {
        Self::DeadlineExceeded { operation }
    }
}
