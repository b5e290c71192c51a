//! The poll driver's seam over the discovery feed.

use std::sync::Arc;

use async_trait::async_trait;
use twitch_api::{GqlFeed, HelixClient, StreamsPage, TwitchApiError};

/// Paginated source of live sessions, plus the auth hook that cursor
/// resets trigger.
#[async_trait]
pub trait LiveFeed: Send + Sync {
    async fn fetch_page(
        &self,
        cursor: Option<&str>,
        first: u32,
    ) -> Result<StreamsPage, TwitchApiError>;

    /// Called on every cursor reset. The GQL feed itself is unauthed;
    /// this refreshes the Helix app token so the metadata side stays
    /// usable for as long as the scraper runs.
    async fn refresh_auth(&self) -> Result<(), TwitchApiError>;
}

/// Production feed: GraphQL for discovery, Helix for the token side.
pub struct TwitchLiveFeed {
    gql: GqlFeed,
    helix: Arc<HelixClient>,
}

impl TwitchLiveFeed {
    pub fn new(gql: GqlFeed, helix: Arc<HelixClient>) -> Self {
        Self { gql, helix }
    }
}

#[async_trait]
impl LiveFeed for TwitchLiveFeed {
    async fn fetch_page(
        &self,
        cursor: Option<&str>,
        first: u32,
    ) -> Result<StreamsPage, TwitchApiError> {
        self.gql.fetch_page(cursor, first).await
    }

    async fn refresh_auth(&self) -> Result<(), TwitchApiError> {
        self.helix.refresh_app_token().await
    }
}
