//! Capture library for finished-broadcast playlists.
//!
//! Finds a working playlist URL for a VOD by probing candidate CDN
//! locations, cleans the playlist for archival and compresses it.

pub mod error;
pub mod playlist;
pub mod resolve;

pub use error::ManifestError;
pub use playlist::{
    compress, decode_media_playlist, encode_playlist, make_paths_explicit, mute_segments,
    playlist_duration,
};
pub use resolve::{DOMAINS, DomainWithPath, ResolvedManifest, VideoData, candidate_paths, resolve};
