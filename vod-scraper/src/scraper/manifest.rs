//! Manifest capture glue between the worker pool and `vod-manifest`.

use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;
use vod_manifest::{ManifestError, VideoData};

/// A captured, cleaned, compressed playlist.
#[derive(Debug, Clone)]
pub struct CompressedManifest {
    pub gzipped_bytes: Vec<u8>,
    pub domain: String,
    pub duration: Duration,
}

/// Resolves a session's playback manifest into storable bytes.
#[async_trait]
pub trait ManifestFetcher: Send + Sync {
    async fn fetch_compressed(&self, video: &VideoData)
    -> Result<CompressedManifest, ManifestError>;
}

/// Production fetcher: probe the CDN candidates, then decode, mute,
/// absolutize and gzip the playlist.
pub struct HttpManifestFetcher {
    client: reqwest::Client,
    compression_level: u32,
}

impl HttpManifestFetcher {
    pub fn new(client: reqwest::Client, compression_level: u32) -> Self {
        Self {
            client,
            compression_level,
        }
    }
}

#[async_trait]
impl ManifestFetcher for HttpManifestFetcher {
    async fn fetch_compressed(
        &self,
        video: &VideoData,
    ) -> Result<CompressedManifest, ManifestError> {
        let resolved = vod_manifest::resolve(&self.client, video).await?;
        let mut playlist = vod_manifest::decode_media_playlist(&resolved.body)?;
        vod_manifest::mute_segments(&mut playlist);
        vod_manifest::make_paths_explicit(&mut playlist, &resolved.location);
        let duration = vod_manifest::playlist_duration(&playlist);
        let bytes = vod_manifest::encode_playlist(&playlist)?;
        let gzipped_bytes = vod_manifest::compress(&bytes, self.compression_level)?;
        debug!(
            video_id = %video.video_id,
            domain = resolved.location.domain(),
            raw = bytes.len(),
            gzipped = gzipped_bytes.len(),
            "captured manifest"
        );
        Ok(CompressedManifest {
            gzipped_bytes,
            domain: resolved.location.domain().to_string(),
            duration,
        })
    }
}
