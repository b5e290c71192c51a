//! Shared fakes for the pipeline tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use parking_lot::Mutex;
use twitch_api::{StreamEdge, StreamNode, StreamsPage, TwitchApiError};
use vod_manifest::{ManifestError, VideoData};

use crate::database::{
    RecentLiveStreamRow, RecordingUpdate, StreamRow, StreamsRepository, UpsertStreamersBatch,
    UpsertStreamsBatch,
};
use crate::{Error, Result};

use super::feed::LiveFeed;
use super::manifest::{CompressedManifest, ManifestFetcher};
use super::types::LiveVod;
use super::visibility::{VideoVisibility, VisibilityClient};

pub fn at(seconds: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(seconds, 0).unwrap()
}

pub fn sample_vod(stream: &str, views: i64) -> LiveVod {
    LiveVod {
        streamer_id: format!("sid-{stream}"),
        stream_id: stream.to_string(),
        start_time: at(0),
        streamer_login_at_start: format!("login-{stream}"),
        game_id_at_start: "509658".to_string(),
        max_views: views,
        last_updated: Utc::now(),
        last_interaction: Utc::now(),
    }
}

pub fn stream_row(stream: &str, views: i64, updated: i64) -> StreamRow {
    StreamRow {
        id: uuid::Uuid::new_v4(),
        streamer_id: format!("sid-{stream}"),
        stream_id: stream.to_string(),
        start_time: at(0),
        max_views: views,
        last_updated_at: at(updated),
        streamer_login_at_start: format!("login-{stream}"),
        language_at_start: "en".to_string(),
        title_at_start: String::new(),
        game_name_at_start: "Just Chatting".to_string(),
        game_id_at_start: "509658".to_string(),
        is_mature_at_start: false,
        last_updated_minus_start_time_seconds: (at(updated) - at(0)).as_seconds_f64(),
        recording_fetched_at: None,
        gzipped_bytes: None,
        hls_domain: None,
        hls_duration_seconds: None,
        bytes_found: None,
        public: None,
        box_art_url_at_start: None,
        profile_image_url_at_start: None,
    }
}

pub fn node(streamer: &str, stream: &str, started: i64, viewers: i64) -> StreamNode {
    StreamNode {
        id: stream.to_string(),
        title: format!("{streamer} live"),
        viewers_count: viewers,
        started_at: at(started),
        language: "en".to_string(),
        is_mature: false,
        broadcaster_id: format!("sid-{streamer}"),
        broadcaster_login: streamer.to_string(),
        game_id: "509658".to_string(),
        game_name: "Just Chatting".to_string(),
    }
}

pub fn page(nodes: Vec<StreamNode>, has_next_page: bool) -> StreamsPage {
    let edges = nodes
        .into_iter()
        .enumerate()
        .map(|(index, node)| StreamEdge {
            cursor: Some(format!("cursor-{index}")),
            node,
        })
        .collect();
    StreamsPage {
        edges,
        has_next_page,
    }
}

pub enum FeedScript {
    Page(StreamsPage),
    Error,
}

/// Scripted feed: serves prepared responses in order and records every
/// cursor it was asked for. Exhausted scripts serve empty final pages.
#[derive(Default)]
pub struct FakeFeed {
    script: Mutex<VecDeque<FeedScript>>,
    pub cursors_seen: Mutex<Vec<Option<String>>>,
    pub auth_refreshes: AtomicUsize,
}

impl FakeFeed {
    pub fn scripted(script: Vec<FeedScript>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            ..Self::default()
        }
    }

    pub fn refresh_count(&self) -> usize {
        self.auth_refreshes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LiveFeed for FakeFeed {
    async fn fetch_page(
        &self,
        cursor: Option<&str>,
        _first: u32,
    ) -> std::result::Result<StreamsPage, TwitchApiError> {
        self.cursors_seen.lock().push(cursor.map(str::to_string));
        match self.script.lock().pop_front() {
            Some(FeedScript::Page(page)) => Ok(page),
            Some(FeedScript::Error) => Err(TwitchApiError::MissingData("scripted failure")),
            None => Ok(StreamsPage {
                edges: Vec::new(),
                has_next_page: false,
            }),
        }
    }

    async fn refresh_auth(&self) -> std::result::Result<(), TwitchApiError> {
        self.auth_refreshes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Recording repository; writes fail on demand.
#[derive(Default)]
pub struct FakeRepo {
    pub streams_batches: Mutex<Vec<UpsertStreamsBatch>>,
    pub streamers_batches: Mutex<Vec<UpsertStreamersBatch>>,
    pub stream_deletes: Mutex<Vec<DateTime<Utc>>>,
    pub recordings: Mutex<Vec<RecordingUpdate>>,
    pub streamer_updates: Mutex<Vec<(String, Option<String>)>>,
    pub recent_sessions: Mutex<Vec<RecentLiveStreamRow>>,
    pub latest_rows: Mutex<Vec<StreamRow>>,
    pub latest_update: Mutex<Option<DateTime<Utc>>>,
    fail: AtomicBool,
}

impl FakeRepo {
    pub fn fail_writes(&self) {
        self.fail.store(true, Ordering::SeqCst);
    }

    fn check(&self) -> Result<()> {
        if self.fail.load(Ordering::SeqCst) {
            Err(Error::deadline("forced failure"))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl StreamsRepository for FakeRepo {
    async fn upsert_streams(&self, batch: &UpsertStreamsBatch) -> Result<()> {
        self.check()?;
        self.streams_batches.lock().push(batch.clone());
        Ok(())
    }

    async fn upsert_streamers(&self, batch: &UpsertStreamersBatch) -> Result<()> {
        self.check()?;
        self.streamers_batches.lock().push(batch.clone());
        Ok(())
    }

    async fn delete_streams_older_than(&self, cutoff: DateTime<Utc>) -> Result<()> {
        self.check()?;
        self.stream_deletes.lock().push(cutoff);
        Ok(())
    }

    async fn delete_streamers_older_than(&self, _cutoff: DateTime<Utc>) -> Result<()> {
        self.check()
    }

    async fn update_recording(&self, update: &RecordingUpdate) -> Result<()> {
        self.check()?;
        self.recordings.lock().push(update.clone());
        Ok(())
    }

    async fn update_streamer(&self, login: &str, profile_image_url: Option<&str>) -> Result<()> {
        self.check()?;
        self.streamer_updates
            .lock()
            .push((login.to_string(), profile_image_url.map(str::to_string)));
        Ok(())
    }

    async fn latest_update_time(&self) -> Result<Option<DateTime<Utc>>> {
        self.check()?;
        Ok(*self.latest_update.lock())
    }

    async fn get_latest_streams(&self, limit: i64) -> Result<Vec<StreamRow>> {
        self.check()?;
        Ok(self
            .latest_rows
            .lock()
            .iter()
            .take(limit as usize)
            .cloned()
            .collect())
    }

    async fn get_recent_live_sessions(
        &self,
        _cutoff: DateTime<Utc>,
    ) -> Result<Vec<RecentLiveStreamRow>> {
        self.check()?;
        Ok(self.recent_sessions.lock().clone())
    }
}

/// Manifest fetcher serving one canned outcome for every job.
pub struct FakeFetcher {
    manifest: Option<CompressedManifest>,
    attempts: usize,
    pub calls: AtomicUsize,
}

impl FakeFetcher {
    pub fn returning(result: std::result::Result<CompressedManifest, ManifestError>) -> Self {
        let (manifest, attempts) = match result {
            Ok(manifest) => (Some(manifest), 0),
            Err(ManifestError::NotFound { attempts }) => (None, attempts),
            Err(_) => (None, 0),
        };
        Self {
            manifest,
            attempts,
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl ManifestFetcher for FakeFetcher {
    async fn fetch_compressed(
        &self,
        _video: &VideoData,
    ) -> std::result::Result<CompressedManifest, ManifestError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.manifest {
            Some(manifest) => Ok(manifest.clone()),
            None => Err(ManifestError::NotFound {
                attempts: self.attempts,
            }),
        }
    }
}

/// Visibility source serving one canned answer for every job.
pub struct FakeVisibility {
    answer: VideoVisibility,
}

impl FakeVisibility {
    pub fn returning(answer: VideoVisibility) -> Self {
        Self { answer }
    }
}

#[async_trait]
impl VisibilityClient for FakeVisibility {
    async fn get_visibility(
        &self,
        _streamer_id: &str,
        _stream_id: &str,
        _game_id: &str,
    ) -> VideoVisibility {
        self.answer.clone()
    }
}
