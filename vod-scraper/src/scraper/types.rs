//! Records moved between the lifecycle queues.

use chrono::{DateTime, Utc};
use twitch_api::StreamNode;
use vod_manifest::VideoData;

/// One tracked broadcast, mutated in place while live and carried
/// through the pending and archive-candidate queues after it stops.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiveVod {
    pub streamer_id: String,
    pub stream_id: String,
    pub start_time: DateTime<Utc>,
    pub streamer_login_at_start: String,
    pub game_id_at_start: String,
    /// Monotonic maximum over all observations; never decreases.
    pub max_views: i64,
    /// Time of the last successful feed observation.
    pub last_updated: DateTime<Utc>,
    /// Time of the last queue transition of any kind.
    pub last_interaction: DateTime<Utc>,
}

impl LiveVod {
    /// Build a record from one feed observation.
    pub fn from_observation(node: &StreamNode, observed_at: DateTime<Utc>) -> Self {
        Self {
            streamer_id: node.broadcaster_id.clone(),
            stream_id: node.id.clone(),
            start_time: node.started_at,
            streamer_login_at_start: node.broadcaster_login.clone(),
            game_id_at_start: node.game_id.clone(),
            max_views: node.viewers_count,
            last_updated: observed_at,
            last_interaction: observed_at,
        }
    }

    /// Identity used to derive playback manifest URLs.
    pub fn video_data(&self) -> VideoData {
        VideoData {
            streamer_name: self.streamer_login_at_start.clone(),
            video_id: self.stream_id.clone(),
            start_time: self.start_time,
        }
    }
}

/// Outcome of one archival job: the manifest half may be missing, the
/// metadata half is always attempted.
#[derive(Debug, Clone)]
pub struct VodResult {
    pub vod: LiveVod,
    pub requested_at: DateTime<Utc>,
    pub gzipped_bytes: Option<Vec<u8>>,
    pub hls_domain: Option<String>,
    pub hls_duration_seconds: Option<f64>,
    pub public: Option<bool>,
    pub profile_image_url: Option<String>,
    pub box_art_url: Option<String>,
}

impl VodResult {
    pub fn bytes_found(&self) -> bool {
        self.gzipped_bytes.is_some()
    }
}
