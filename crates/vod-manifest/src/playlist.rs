//! Media playlist cleanup and compression for archival.
//!
//! A captured playlist is stored verbatim-ish: segment timing survives,
//! but per-segment metadata that playback does not need (titles, dates,
//! unmuted-audio variants) is stripped or rewritten, and relative
//! segment paths are made absolute so the stored playlist stands alone.

use std::io::Write;
use std::time::Duration;

use flate2::Compression;
use flate2::write::GzEncoder;
use m3u8_rs::MediaPlaylist;

use crate::error::ManifestError;
use crate::resolve::DomainWithPath;

/// Decode a media playlist, dropping segments with no URI.
///
/// Playlists for in-progress deletions occasionally carry trailing
/// entries with empty locations; those are not recoverable and are
/// filtered out rather than treated as a decode failure.
pub fn decode_media_playlist(body: &str) -> Result<MediaPlaylist, ManifestError> {
    let mut playlist = m3u8_rs::parse_media_playlist_res(body.as_bytes())
        .map_err(|e| ManifestError::Parse(e.to_string()))?;
    playlist.segments.retain(|segment| !segment.uri.is_empty());
    Ok(playlist)
}

/// Null out segment fields that archival does not need and rewrite
/// unmuted segment URIs to their muted counterparts.
///
/// The unmuted variants stop resolving once the VOD is removed; the
/// muted copies are the ones that stay fetchable.
pub fn mute_segments(playlist: &mut MediaPlaylist) {
    for segment in &mut playlist.segments {
        if segment.uri.contains("-unmuted") {
            segment.uri = segment.uri.replace("-unmuted", "-muted");
        }
        segment.title = None;
        segment.program_date_time = None;
        segment.daterange = None;
    }
}

/// Rewrite relative segment URIs to absolute URLs under `location`.
pub fn make_paths_explicit(playlist: &mut MediaPlaylist, location: &DomainWithPath) {
    let base = location.segment_base();
    for segment in &mut playlist.segments {
        if !segment.uri.starts_with("http://") && !segment.uri.starts_with("https://") {
            segment.uri = format!("{base}{}", segment.uri);
        }
    }
}

/// Total duration of the playlist, summed over segments.
pub fn playlist_duration(playlist: &MediaPlaylist) -> Duration {
    let seconds: f64 = playlist
        .segments
        .iter()
        .map(|segment| f64::from(segment.duration))
        .sum();
    Duration::from_secs_f64(seconds.max(0.0))
}

/// Serialize a playlist back to m3u8 text.
pub fn encode_playlist(playlist: &MediaPlaylist) -> Result<Vec<u8>, ManifestError> {
    let mut out = Vec::new();
    playlist.write_to(&mut out).map_err(ManifestError::Encode)?;
    Ok(out)
}

/// Gzip-compress `bytes` at the given level (0-9).
pub fn compress(bytes: &[u8], level: u32) -> Result<Vec<u8>, ManifestError> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::new(level));
    encoder.write_all(bytes).map_err(ManifestError::Compress)?;
    encoder.finish().map_err(ManifestError::Compress)
}
