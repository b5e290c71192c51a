use thiserror::Error;

/// Errors produced while locating, decoding or compressing a VOD playlist.
#[derive(Error, Debug)]
pub enum ManifestError {
    /// Every candidate URL was probed and none answered with a playlist.
    #[error("no working playlist url among {attempts} candidates")]
    NotFound { attempts: usize },

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("playlist parse error: {0}")]
    Parse(String),

    #[error("playlist encode error: {0}")]
    Encode(std::io::Error),

    #[error("compression error: {0}")]
    Compress(std::io::Error),
}
