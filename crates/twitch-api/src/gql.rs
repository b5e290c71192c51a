//! Paginated live-streams discovery feed over the public GraphQL API.
//!
//! The GQL endpoint accepts the web player's client id without OAuth,
//! so the feed client carries no token state. Pagination is exposed
//! through per-edge cursors; callers pick which edge's cursor to resume
//! from, since the feed's ordering reshuffles between requests.

use std::time::Duration;

use chrono::{DateTime, Utc};
use rand::RngExt;
use reqwest::header::{HeaderMap, HeaderValue};
use serde::Deserialize;
use tracing::debug;

use crate::error::TwitchApiError;

/// Client id of the public web player.
pub const GQL_CLIENT_ID: &str = "kimne78kx3ncx6brgo4mv6wki5h1ko";

const GQL_URL: &str = "https://gql.twitch.tv/gql";

const STREAMS_QUERY: &str = "\
query LiveStreams($after: Cursor, $first: Int) {
  streams(after: $after, first: $first) {
    edges {
      cursor
      node {
        id
        title
        viewersCount
        createdAt
        language
        isMature
        broadcaster { id login }
        game { id name }
      }
    }
    pageInfo { hasNextPage }
  }
}";

/// One live stream as returned by the discovery feed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamNode {
    pub id: String,
    pub title: String,
    pub viewers_count: i64,
    pub started_at: DateTime<Utc>,
    pub language: String,
    pub is_mature: bool,
    pub broadcaster_id: String,
    pub broadcaster_login: String,
    pub game_id: String,
    pub game_name: String,
}

/// A feed edge: a stream plus the cursor that resumes after it.
#[derive(Debug, Clone)]
pub struct StreamEdge {
    pub cursor: Option<String>,
    pub node: StreamNode,
}

/// One page of the discovery feed.
#[derive(Debug, Clone, Default)]
pub struct StreamsPage {
    pub edges: Vec<StreamEdge>,
    pub has_next_page: bool,
}

#[derive(Debug, Deserialize)]
struct GqlResponse {
    data: Option<GqlData>,
}

#[derive(Debug, Deserialize)]
struct GqlData {
    streams: Option<RawConnection>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawConnection {
    #[serde(default)]
    edges: Vec<RawEdge>,
    page_info: RawPageInfo,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawPageInfo {
    #[serde(default)]
    has_next_page: bool,
}

#[derive(Debug, Deserialize)]
struct RawEdge {
    cursor: Option<String>,
    node: Option<RawNode>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawNode {
    id: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    viewers_count: i64,
    created_at: DateTime<Utc>,
    #[serde(default)]
    language: String,
    #[serde(default)]
    is_mature: bool,
    broadcaster: Option<RawBroadcaster>,
    game: Option<RawGame>,
}

#[derive(Debug, Deserialize)]
struct RawBroadcaster {
    id: String,
    login: String,
}

#[derive(Debug, Deserialize)]
struct RawGame {
    #[serde(default)]
    id: String,
    #[serde(default)]
    name: String,
}

fn device_id() -> String {
    // random device id of 16 digits
    format!(
        "{}",
        rand::rng().random_range(1000000000000000i64..9999999999999999i64)
    )
}

impl RawEdge {
    fn into_edge(self) -> Option<StreamEdge> {
        let node = self.node?;
        // the feed occasionally returns edges whose broadcaster has
        // already vanished; those cannot be tracked
        let broadcaster = node.broadcaster?;
        let (game_id, game_name) = node
            .game
            .map(|game| (game.id, game.name))
            .unwrap_or_default();
        Some(StreamEdge {
            cursor: self.cursor,
            node: StreamNode {
                id: node.id,
                title: node.title,
                viewers_count: node.viewers_count,
                started_at: node.created_at,
                language: node.language,
                is_mature: node.is_mature,
                broadcaster_id: broadcaster.id,
                broadcaster_login: broadcaster.login,
                game_id,
                game_name,
            },
        })
    }
}

/// Discovery feed client.
pub struct GqlFeed {
    client: reqwest::Client,
}

impl GqlFeed {
    pub fn new(request_timeout: Duration) -> Result<Self, TwitchApiError> {
        let mut headers = HeaderMap::new();
        headers.insert("Client-ID", HeaderValue::from_static(GQL_CLIENT_ID));
        if let Ok(value) = HeaderValue::from_str(&device_id()) {
            headers.insert("device-id", value);
        }
        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(request_timeout)
            .build()?;
        Ok(Self { client })
    }

    /// Fetch one page of live streams, most viewers first.
    pub async fn fetch_page(
        &self,
        cursor: Option<&str>,
        first: u32,
    ) -> Result<StreamsPage, TwitchApiError> {
        let body = serde_json::json!({
            "query": STREAMS_QUERY,
            "variables": { "after": cursor, "first": first },
        });
        let response = self.client.post(GQL_URL).json(&body).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TwitchApiError::Status { status, body });
        }
        let payload: GqlResponse = response.json().await?;
        let connection = payload
            .data
            .and_then(|data| data.streams)
            .ok_or(TwitchApiError::MissingData("streams"))?;
        let edges: Vec<StreamEdge> = connection
            .edges
            .into_iter()
            .filter_map(RawEdge::into_edge)
            .collect();
        debug!(
            edges = edges.len(),
            has_next_page = connection.page_info.has_next_page,
            "fetched feed page"
        );
        Ok(StreamsPage {
            edges,
            has_next_page: connection.page_info.has_next_page,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_feed_page() {
        let body = r#"{
            "data": {
                "streams": {
                    "edges": [
                        {
                            "cursor": "eyJzIjo2MX0=",
                            "node": {
                                "id": "40123456789",
                                "title": "drops enabled",
                                "viewersCount": 4821,
                                "createdAt": "2023-03-14T03:21:09Z",
                                "language": "EN",
                                "isMature": true,
                                "broadcaster": {"id": "12345", "login": "sodapoppin"},
                                "game": {"id": "32399", "name": "Counter-Strike"}
                            }
                        },
                        {"cursor": null, "node": null}
                    ],
                    "pageInfo": {"hasNextPage": true}
                }
            }
        }"#;
        let payload: GqlResponse = serde_json::from_str(body).unwrap();
        let connection = payload.data.unwrap().streams.unwrap();
        let edges: Vec<StreamEdge> = connection
            .edges
            .into_iter()
            .filter_map(RawEdge::into_edge)
            .collect();
        assert_eq!(edges.len(), 1);
        let node = &edges[0].node;
        assert_eq!(node.broadcaster_login, "sodapoppin");
        assert_eq!(node.viewers_count, 4821);
        assert_eq!(node.game_name, "Counter-Strike");
        assert!(connection.page_info.has_next_page);
    }

    #[test]
    fn missing_game_yields_empty_fields() {
        let raw = r#"{
            "cursor": "abc",
            "node": {
                "id": "1",
                "viewersCount": 10,
                "createdAt": "2023-01-01T00:00:00Z",
                "broadcaster": {"id": "2", "login": "someone"},
                "game": null
            }
        }"#;
        let edge: RawEdge = serde_json::from_str(raw).unwrap();
        let edge = edge.into_edge().unwrap();
        assert_eq!(edge.node.game_id, "");
        assert_eq!(edge.node.game_name, "");
    }

    #[test]
    fn device_id_is_sixteen_digits() {
        let id = device_id();
        assert_eq!(id.len(), 16);
        assert!(id.chars().all(|c| c.is_ascii_digit()));
    }
}
