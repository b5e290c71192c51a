//! Streams repository.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use twitch_api::StreamNode;

use crate::Result;
use crate::database::DbPool;
use crate::database::models::{RecentLiveStreamRow, StreamRow};

/// Columnar batch for the per-poll streams upsert.
///
/// Postgres receives one array per column and unnests them server-side,
/// so a whole page of observations is one statement.
#[derive(Debug, Default, Clone)]
pub struct UpsertStreamsBatch {
    pub last_updated_at: Vec<DateTime<Utc>>,
    pub max_views: Vec<i64>,
    pub start_time: Vec<DateTime<Utc>>,
    pub streamer_id: Vec<String>,
    pub stream_id: Vec<String>,
    pub streamer_login_at_start: Vec<String>,
    pub game_name_at_start: Vec<String>,
    pub language_at_start: Vec<String>,
    pub title_at_start: Vec<String>,
    pub game_id_at_start: Vec<String>,
    pub is_mature_at_start: Vec<bool>,
    pub last_updated_minus_start_time_seconds: Vec<f64>,
}

impl UpsertStreamsBatch {
    pub fn push(&mut self, node: &StreamNode, observed_at: DateTime<Utc>) {
        self.last_updated_at.push(observed_at);
        self.max_views.push(node.viewers_count);
        self.start_time.push(node.started_at);
        self.streamer_id.push(node.broadcaster_id.clone());
        self.stream_id.push(node.id.clone());
        self.streamer_login_at_start
            .push(node.broadcaster_login.clone());
        self.game_name_at_start.push(node.game_name.clone());
        self.language_at_start.push(node.language.clone());
        self.title_at_start.push(node.title.clone());
        self.game_id_at_start.push(node.game_id.clone());
        self.is_mature_at_start.push(node.is_mature);
        self.last_updated_minus_start_time_seconds
            .push((observed_at - node.started_at).as_seconds_f64());
    }

    pub fn len(&self) -> usize {
        self.stream_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stream_id.is_empty()
    }
}

/// Columnar batch for the per-poll streamers upsert.
#[derive(Debug, Default, Clone)]
pub struct UpsertStreamersBatch {
    pub start_time: Vec<DateTime<Utc>>,
    pub streamer_id: Vec<String>,
    pub streamer_login_at_start: Vec<String>,
}

impl UpsertStreamersBatch {
    pub fn push(&mut self, node: &StreamNode) {
        self.start_time.push(node.started_at);
        self.streamer_id.push(node.broadcaster_id.clone());
        self.streamer_login_at_start
            .push(node.broadcaster_login.clone());
    }

    pub fn is_empty(&self) -> bool {
        self.streamer_id.is_empty()
    }
}

/// Fields persisted for one archival attempt.
#[derive(Debug, Clone)]
pub struct RecordingUpdate {
    pub stream_id: String,
    pub start_time: DateTime<Utc>,
    pub recording_fetched_at: DateTime<Utc>,
    pub gzipped_bytes: Option<Vec<u8>>,
    pub bytes_found: bool,
    pub hls_domain: Option<String>,
    pub hls_duration_seconds: Option<f64>,
    pub public: Option<bool>,
    pub profile_image_url: Option<String>,
    pub box_art_url: Option<String>,
}

/// Streams repository trait.
#[async_trait]
pub trait StreamsRepository: Send + Sync {
    async fn upsert_streams(&self, batch: &UpsertStreamsBatch) -> Result<()>;
    async fn upsert_streamers(&self, batch: &UpsertStreamersBatch) -> Result<()>;
    async fn delete_streams_older_than(&self, cutoff: DateTime<Utc>) -> Result<()>;
    async fn delete_streamers_older_than(&self, cutoff: DateTime<Utc>) -> Result<()>;
    async fn update_recording(&self, update: &RecordingUpdate) -> Result<()>;
    async fn update_streamer(&self, login: &str, profile_image_url: Option<&str>) -> Result<()>;
    /// Most recent observation time across all rows, if any rows exist.
    async fn latest_update_time(&self) -> Result<Option<DateTime<Utc>>>;
    /// Most recently updated rows, newest first.
    async fn get_latest_streams(&self, limit: i64) -> Result<Vec<StreamRow>>;
    /// Not-yet-archived rows updated since `cutoff`, for cold-start
    /// rehydration of the pending queue.
    async fn get_recent_live_sessions(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<RecentLiveStreamRow>>;
}

/// SQLx implementation of StreamsRepository.
pub struct PgStreamsRepository {
    pool: DbPool,
}

impl PgStreamsRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl StreamsRepository for PgStreamsRepository {
    async fn upsert_streams(&self, batch: &UpsertStreamsBatch) -> Result<()> {
        if batch.is_empty() {
            return Ok(());
        }
        sqlx::query(
            r#"
            INSERT INTO streams (
                last_updated_at, max_views, start_time, streamer_id, stream_id,
                streamer_login_at_start, game_name_at_start, language_at_start,
                title_at_start, game_id_at_start, is_mature_at_start,
                last_updated_minus_start_time_seconds
            )
            SELECT * FROM UNNEST(
                $1::timestamptz[], $2::bigint[], $3::timestamptz[], $4::text[],
                $5::text[], $6::text[], $7::text[], $8::text[], $9::text[],
                $10::text[], $11::boolean[], $12::float8[]
            )
            ON CONFLICT (stream_id, start_time) DO UPDATE SET
                last_updated_at = EXCLUDED.last_updated_at,
                max_views = GREATEST(streams.max_views, EXCLUDED.max_views),
                last_updated_minus_start_time_seconds =
                    EXCLUDED.last_updated_minus_start_time_seconds
            "#,
        )
        .bind(&batch.last_updated_at)
        .bind(&batch.max_views)
        .bind(&batch.start_time)
        .bind(&batch.streamer_id)
        .bind(&batch.stream_id)
        .bind(&batch.streamer_login_at_start)
        .bind(&batch.game_name_at_start)
        .bind(&batch.language_at_start)
        .bind(&batch.title_at_start)
        .bind(&batch.game_id_at_start)
        .bind(&batch.is_mature_at_start)
        .bind(&batch.last_updated_minus_start_time_seconds)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn upsert_streamers(&self, batch: &UpsertStreamersBatch) -> Result<()> {
        if batch.is_empty() {
            return Ok(());
        }
        sqlx::query(
            r#"
            INSERT INTO streamers (start_time, streamer_id, streamer_login_at_start)
            SELECT * FROM UNNEST($1::timestamptz[], $2::text[], $3::text[])
            ON CONFLICT (streamer_id, start_time) DO UPDATE SET
                streamer_login_at_start = EXCLUDED.streamer_login_at_start
            "#,
        )
        .bind(&batch.start_time)
        .bind(&batch.streamer_id)
        .bind(&batch.streamer_login_at_start)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn delete_streams_older_than(&self, cutoff: DateTime<Utc>) -> Result<()> {
        sqlx::query("DELETE FROM streams WHERE last_updated_at < $1")
            .bind(cutoff)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn delete_streamers_older_than(&self, cutoff: DateTime<Utc>) -> Result<()> {
        sqlx::query("DELETE FROM streamers WHERE start_time < $1")
            .bind(cutoff)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn update_recording(&self, update: &RecordingUpdate) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE streams SET
                recording_fetched_at = $1,
                gzipped_bytes = $2,
                bytes_found = $3,
                hls_domain = $4,
                hls_duration_seconds = $5,
                public = $6,
                profile_image_url_at_start = $7,
                box_art_url_at_start = $8
            WHERE stream_id = $9 AND start_time = $10
            "#,
        )
        .bind(update.recording_fetched_at)
        .bind(&update.gzipped_bytes)
        .bind(update.bytes_found)
        .bind(&update.hls_domain)
        .bind(update.hls_duration_seconds)
        .bind(update.public)
        .bind(&update.profile_image_url)
        .bind(&update.box_art_url)
        .bind(&update.stream_id)
        .bind(update.start_time)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn update_streamer(&self, login: &str, profile_image_url: Option<&str>) -> Result<()> {
        sqlx::query(
            "UPDATE streamers SET profile_image_url_at_start = $2 \
             WHERE streamer_login_at_start = $1",
        )
        .bind(login)
        .bind(profile_image_url)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn latest_update_time(&self) -> Result<Option<DateTime<Utc>>> {
        let row: Option<(DateTime<Utc>,)> = sqlx::query_as(
            "SELECT last_updated_at FROM streams ORDER BY last_updated_at DESC LIMIT 1",
        )
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(|(time,)| time))
    }

    async fn get_latest_streams(&self, limit: i64) -> Result<Vec<StreamRow>> {
        let rows = sqlx::query_as::<_, StreamRow>(
            "SELECT * FROM streams ORDER BY last_updated_at DESC LIMIT $1",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn get_recent_live_sessions(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<RecentLiveStreamRow>> {
        let rows = sqlx::query_as::<_, RecentLiveStreamRow>(
            r#"
            SELECT streamer_id, stream_id, start_time, streamer_login_at_start,
                   game_id_at_start, max_views, last_updated_at
            FROM streams
            WHERE last_updated_at >= $1 AND recording_fetched_at IS NULL
            "#,
        )
        .bind(cutoff)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }
}
