//! Post-broadcast visibility and display metadata lookups.

use async_trait::async_trait;
use tracing::warn;
use twitch_api::{HelixClient, set_box_art_size, set_profile_image_width};

use super::retry::retry_once;

/// Stored profile image width.
const PROFILE_IMAGE_WIDTH: u32 = 50;
/// Stored box art dimensions.
const BOX_ART_WIDTH: u32 = 40;
const BOX_ART_HEIGHT: u32 = 56;

/// What could be learned about an ended session's VOD.
///
/// Every field is best-effort: a failed lookup leaves its field unset
/// rather than failing the job.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VideoVisibility {
    /// Whether the VOD is publicly listed. `None` when the listing
    /// lookup itself failed.
    pub public: Option<bool>,
    pub profile_image_url: Option<String>,
    pub box_art_url: Option<String>,
}

/// Source of visibility metadata for ended sessions.
#[async_trait]
pub trait VisibilityClient: Send + Sync {
    async fn get_visibility(
        &self,
        streamer_id: &str,
        stream_id: &str,
        game_id: &str,
    ) -> VideoVisibility;
}

#[async_trait]
impl VisibilityClient for HelixClient {
    async fn get_visibility(
        &self,
        streamer_id: &str,
        stream_id: &str,
        game_id: &str,
    ) -> VideoVisibility {
        let public = match retry_once(|| self.get_videos(streamer_id)).await {
            Ok(videos) => Some(
                videos
                    .iter()
                    .any(|video| video.stream_id.as_deref() == Some(stream_id)),
            ),
            Err(err) => {
                warn!(streamer_id, stream_id, %err, "video listing lookup failed");
                None
            }
        };
        let user_ids = [streamer_id];
        let profile_image_url = match retry_once(|| self.get_users(&user_ids)).await {
            Ok(users) => users
                .into_iter()
                .next()
                .map(|user| set_profile_image_width(&user.profile_image_url, PROFILE_IMAGE_WIDTH)),
            Err(err) => {
                warn!(streamer_id, %err, "user lookup failed");
                None
            }
        };
        let box_art_url = if game_id.is_empty() {
            None
        } else {
            let game_ids = [game_id];
            match retry_once(|| self.get_games(&game_ids)).await {
                Ok(games) => games
                    .into_iter()
                    .next()
                    .map(|game| set_box_art_size(&game.box_art_url, BOX_ART_WIDTH, BOX_ART_HEIGHT)),
                Err(err) => {
                    warn!(game_id, %err, "game lookup failed");
                    None
                }
            }
        };
        VideoVisibility {
            public,
            profile_image_url,
            box_art_url,
        }
    }
}
