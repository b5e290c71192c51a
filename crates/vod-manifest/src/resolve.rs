//! Candidate playback URL generation and probing.
//!
//! Twitch serves finished-broadcast playlists from a set of CDN domains
//! under a path derived from `{login}_{video_id}_{timestamp}`. The exact
//! timestamp encoding the CDN used for a given VOD is not knowable up
//! front, so capture works by probing every candidate in a fixed order
//! and taking the first hit.

use chrono::{DateTime, TimeDelta, Utc};
use sha1::{Digest, Sha1};
use tracing::{debug, trace};

use crate::error::ManifestError;

/// CDN domains known to serve VOD playlists, probed in order.
pub const DOMAINS: &[&str] = &[
    "https://vod-secure.twitch.tv/",
    "https://vod-metro.twitch.tv/",
    "https://vod-pop-secure.twitch.tv/",
    "https://d2e2de1etea730.cloudfront.net/",
    "https://dqrpb9wgowsf5.cloudfront.net/",
    "https://ds0h3roq6wcgc.cloudfront.net/",
    "https://d2nvs31859zcd8.cloudfront.net/",
    "https://d2aba1wr3818hz.cloudfront.net/",
    "https://d3c27h4odz752x.cloudfront.net/",
    "https://dgeft87wbj63p.cloudfront.net/",
    "https://d1m7jfoe9zdc1j.cloudfront.net/",
    "https://d3vd9lfkzbru3h.cloudfront.net/",
    "https://d2vjef5jvl6bfs.cloudfront.net/",
    "https://d1ymi26ma8va5x.cloudfront.net/",
    "https://d1mhjrowxxagfy.cloudfront.net/",
    "https://ddacn6pr5v0tl.cloudfront.net/",
    "https://d3aqoihi2n8ty8.cloudfront.net/",
];

/// Identity of a finished broadcast, as needed to derive playlist URLs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoData {
    /// Streamer login at the time the broadcast started.
    pub streamer_name: String,
    /// Platform-assigned stream id.
    pub video_id: String,
    /// Broadcast start time, accurate to the second at best.
    pub start_time: DateTime<Utc>,
}

impl VideoData {
    fn path_base_unix(&self, time: DateTime<Utc>) -> String {
        format!("{}_{}_{}", self.streamer_name, self.video_id, time.timestamp())
    }

    fn path_base_formatted(&self) -> String {
        format!(
            "{}_{}_{}",
            self.streamer_name,
            self.video_id,
            self.start_time.format("%Y-%m-%d_%H-%M-%S")
        )
    }
}

/// One fully-derived candidate location for a VOD playlist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DomainWithPath {
    domain: &'static str,
    path: String,
}

impl DomainWithPath {
    pub fn domain(&self) -> &'static str {
        self.domain
    }

    /// URL of the source-quality media playlist at this location.
    pub fn playlist_url(&self) -> String {
        format!("{}{}/chunked/index-dvr.m3u8", self.domain, self.path)
    }

    /// Directory URL that relative segment paths resolve against.
    pub fn segment_base(&self) -> String {
        format!("{}{}/chunked/", self.domain, self.path)
    }
}

fn hashed_path(base: &str) -> String {
    let digest = Sha1::digest(base.as_bytes());
    let hex = hex::encode(digest);
    format!("{}_{}", &hex[..20], base)
}

/// All candidate playlist locations for a video, in probe order: the
/// unix start time first, then the same moment minus one second (the
/// recorded start time is sometimes one second late), then the
/// formatted date encoding. Each encoding fans out over every domain.
pub fn candidate_paths(video: &VideoData) -> Vec<DomainWithPath> {
    let bases = [
        video.path_base_unix(video.start_time),
        video.path_base_unix(video.start_time - TimeDelta::seconds(1)),
        video.path_base_formatted(),
    ];
    bases
        .iter()
        .flat_map(|base| {
            let path = hashed_path(base);
            DOMAINS.iter().map(move |domain| DomainWithPath {
                domain,
                path: path.clone(),
            })
        })
        .collect()
}

/// A playlist body together with the location that served it.
#[derive(Debug, Clone)]
pub struct ResolvedManifest {
    pub body: String,
    pub location: DomainWithPath,
}

/// Probe every candidate location and return the first playlist found.
///
/// Transport errors and non-success statuses both move on to the next
/// candidate; only full exhaustion is reported, as [`ManifestError::NotFound`].
pub async fn resolve(
    client: &reqwest::Client,
    video: &VideoData,
) -> Result<ResolvedManifest, ManifestError> {
    let candidates = candidate_paths(video);
    let attempts = candidates.len();
    for location in candidates {
        let url = location.playlist_url();
        match client.get(&url).send().await {
            Ok(response) if response.status().is_success() => match response.text().await {
                Ok(body) => {
                    debug!(%url, "found playlist");
                    return Ok(ResolvedManifest { body, location });
                }
                Err(err) => debug!(%url, %err, "failed reading playlist body"),
            },
            Ok(response) => trace!(%url, status = %response.status(), "candidate miss"),
            Err(err) => debug!(%url, %err, "candidate request failed"),
        }
    }
    Err(ManifestError::NotFound { attempts })
}
