//! Row models for the streams and streamers tables.

use chrono::{DateTime, Utc};
use sqlx::FromRow;
use uuid::Uuid;

/// Full row of the streams table.
#[derive(Debug, Clone, FromRow)]
pub struct StreamRow {
    pub id: Uuid,
    pub streamer_id: String,
    pub stream_id: String,
    pub start_time: DateTime<Utc>,
    pub max_views: i64,
    pub last_updated_at: DateTime<Utc>,
    pub streamer_login_at_start: String,
    pub language_at_start: String,
    pub title_at_start: String,
    pub game_name_at_start: String,
    pub game_id_at_start: String,
    pub is_mature_at_start: bool,
    pub last_updated_minus_start_time_seconds: f64,
    pub recording_fetched_at: Option<DateTime<Utc>>,
    pub gzipped_bytes: Option<Vec<u8>>,
    pub hls_domain: Option<String>,
    pub hls_duration_seconds: Option<f64>,
    pub bytes_found: Option<bool>,
    pub public: Option<bool>,
    pub box_art_url_at_start: Option<String>,
    pub profile_image_url_at_start: Option<String>,
}

/// Subset of a streams row needed to rehydrate the pending queue at
/// cold start.
#[derive(Debug, Clone, FromRow)]
pub struct RecentLiveStreamRow {
    pub streamer_id: String,
    pub stream_id: String,
    pub start_time: DateTime<Utc>,
    pub streamer_login_at_start: String,
    pub game_id_at_start: String,
    pub max_views: i64,
    pub last_updated_at: DateTime<Utc>,
}
