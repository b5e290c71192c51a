//! Result sink: the single writer for archival outcomes.
//!
//! Serializing writes through one task keeps the large gzipped-bytes
//! updates off the poll driver's critical path. Write failures here are
//! fatal, same as the poll driver's persistence unit.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::database::{RecordingUpdate, StreamsRepository};
use crate::{Error, Result};

use super::types::VodResult;

pub async fn run_sink<R: StreamsRepository>(
    repo: Arc<R>,
    request_time_limit: Duration,
    mut results_rx: mpsc::Receiver<VodResult>,
    cancel: CancellationToken,
) -> Result<()> {
    info!("result sink started");
    loop {
        let result = tokio::select! {
            _ = cancel.cancelled() => return Ok(()),
            result = results_rx.recv() => result,
        };
        let Some(result) = result else {
            // worker pool gone
            return Ok(());
        };
        persist_result(&*repo, request_time_limit, result).await?;
    }
}

async fn persist_result<R>(repo: &R, request_time_limit: Duration, result: VodResult) -> Result<()>
where
    R: StreamsRepository + ?Sized,
{
    let update = RecordingUpdate {
        stream_id: result.vod.stream_id.clone(),
        start_time: result.vod.start_time,
        recording_fetched_at: result.requested_at,
        bytes_found: result.bytes_found(),
        gzipped_bytes: result.gzipped_bytes,
        hls_domain: result.hls_domain,
        hls_duration_seconds: result.hls_duration_seconds,
        public: result.public,
        profile_image_url: result.profile_image_url.clone(),
        box_art_url: result.box_art_url,
    };
    tokio::time::timeout(request_time_limit, repo.update_recording(&update))
        .await
        .map_err(|_| Error::deadline("recording update"))??;
    tokio::time::timeout(
        request_time_limit,
        repo.update_streamer(
            &result.vod.streamer_login_at_start,
            result.profile_image_url.as_deref(),
        ),
    )
    .await
    .map_err(|_| Error::deadline("streamer update"))??;
    info!(
        stream_id = %result.vod.stream_id,
        streamer = %result.vod.streamer_login_at_start,
        max_views = result.vod.max_views,
        bytes_found = update.bytes_found,
        "archival result persisted"
    );
    Ok(())
}
