use thiserror::Error;

/// Errors from the GraphQL feed and Helix endpoints.
#[derive(Error, Debug)]
pub enum TwitchApiError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("decode error: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("api returned status {status}: {body}")]
    Status {
        status: reqwest::StatusCode,
        body: String,
    },

    #[error("missing app access token")]
    MissingToken,

    #[error("gql response missing {0}")]
    MissingData(&'static str),
}
