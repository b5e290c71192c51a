//! Helix REST endpoints used for post-broadcast metadata.
//!
//! Helix requires an app access token (client-credentials grant). The
//! token is refreshed explicitly by the caller; requests made before
//! the first refresh fail with [`TwitchApiError::MissingToken`].

use std::time::Duration;

use parking_lot::RwLock;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::error::TwitchApiError;

const TOKEN_URL: &str = "https://id.twitch.tv/oauth2/token";
const HELIX_BASE: &str = "https://api.twitch.tv/helix";

#[derive(Debug, Clone, Deserialize)]
pub struct HelixVideo {
    pub id: String,
    #[serde(default)]
    pub stream_id: Option<String>,
    #[serde(default)]
    pub title: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HelixUser {
    pub id: String,
    pub login: String,
    #[serde(default)]
    pub profile_image_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HelixGame {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub box_art_url: String,
}

#[derive(Deserialize)]
struct Envelope<T> {
    data: Vec<T>,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
}

/// Helix client holding credentials and the current app access token.
pub struct HelixClient {
    http: reqwest::Client,
    client_id: String,
    client_secret: String,
    app_token: RwLock<Option<String>>,
}

impl HelixClient {
    pub fn new(
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        request_timeout: Duration,
    ) -> Result<Self, TwitchApiError> {
        let http = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()?;
        Ok(Self {
            http,
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            app_token: RwLock::new(None),
        })
    }

    /// Request a fresh app access token and install it for subsequent calls.
    pub async fn refresh_app_token(&self) -> Result<(), TwitchApiError> {
        let response = self
            .http
            .post(TOKEN_URL)
            .form(&[
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("grant_type", "client_credentials"),
            ])
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TwitchApiError::Status { status, body });
        }
        let token: TokenResponse = response.json().await?;
        *self.app_token.write() = Some(token.access_token);
        debug!("app access token refreshed");
        Ok(())
    }

    async fn get_data<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<Vec<T>, TwitchApiError> {
        let token = self
            .app_token
            .read()
            .clone()
            .ok_or(TwitchApiError::MissingToken)?;
        let response = self
            .http
            .get(format!("{HELIX_BASE}/{path}"))
            .query(query)
            .header("Client-Id", &self.client_id)
            .bearer_auth(token)
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TwitchApiError::Status { status, body });
        }
        Ok(response.json::<Envelope<T>>().await?.data)
    }

    /// Archived videos belonging to a broadcaster.
    pub async fn get_videos(&self, user_id: &str) -> Result<Vec<HelixVideo>, TwitchApiError> {
        self.get_data("videos", &[("user_id", user_id)]).await
    }

    pub async fn get_users(&self, ids: &[&str]) -> Result<Vec<HelixUser>, TwitchApiError> {
        let query: Vec<(&str, &str)> = ids.iter().map(|id| ("id", *id)).collect();
        self.get_data("users", &query).await
    }

    pub async fn get_games(&self, ids: &[&str]) -> Result<Vec<HelixGame>, TwitchApiError> {
        let query: Vec<(&str, &str)> = ids.iter().map(|id| ("id", *id)).collect();
        self.get_data("games", &query).await
    }
}
