//! Worker pool: turns one confirmed-ended session into one archival
//! result.
//!
//! Each worker paces itself with its own ticker and pulls from a shared
//! job channel, so the pool as a whole never exceeds one upstream
//! request burst per worker per interval. A job always produces a
//! result, even when every lookup in it failed.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::{Mutex, mpsc};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use vod_manifest::ManifestError;

use crate::{Error, Result};

use super::manifest::ManifestFetcher;
use super::types::{LiveVod, VodResult};
use super::visibility::VisibilityClient;

/// Job intake shared by the whole pool.
pub type SharedJobs = Arc<Mutex<mpsc::Receiver<LiveVod>>>;

pub async fn run_worker<M, V>(
    worker_id: usize,
    interval: Duration,
    fetcher: Arc<M>,
    visibility: Arc<V>,
    jobs_rx: SharedJobs,
    results_tx: mpsc::Sender<VodResult>,
    cancel: CancellationToken,
) -> Result<()>
where
    M: ManifestFetcher,
    V: VisibilityClient,
{
    info!(worker_id, "worker started");
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        tokio::select! {
            _ = cancel.cancelled() => return Ok(()),
            _ = ticker.tick() => {}
        }
        let job = {
            let mut rx = jobs_rx.lock().await;
            tokio::select! {
                _ = cancel.cancelled() => return Ok(()),
                job = rx.recv() => job,
            }
        };
        let Some(job) = job else {
            // dispatcher gone
            return Ok(());
        };
        let result = archive_one(worker_id, &*fetcher, &*visibility, job).await;
        tokio::select! {
            _ = cancel.cancelled() => return Ok(()),
            sent = results_tx.send(result) => {
                if sent.is_err() {
                    if cancel.is_cancelled() {
                        return Ok(());
                    }
                    return Err(Error::ChannelClosed("results channel"));
                }
            }
        }
    }
}

async fn archive_one<M, V>(worker_id: usize, fetcher: &M, visibility: &V, job: LiveVod) -> VodResult
where
    M: ManifestFetcher + ?Sized,
    V: VisibilityClient + ?Sized,
{
    let requested_at = Utc::now();
    debug!(
        worker_id,
        stream_id = %job.stream_id,
        streamer = %job.streamer_login_at_start,
        "archiving session"
    );
    let manifest = match fetcher.fetch_compressed(&job.video_data()).await {
        Ok(manifest) => Some(manifest),
        Err(ManifestError::NotFound { attempts }) => {
            debug!(
                worker_id,
                stream_id = %job.stream_id,
                attempts,
                "no manifest found on any candidate path"
            );
            None
        }
        Err(err) => {
            warn!(worker_id, stream_id = %job.stream_id, %err, "manifest capture failed");
            None
        }
    };
    let meta = visibility
        .get_visibility(&job.streamer_id, &job.stream_id, &job.game_id_at_start)
        .await;
    let (gzipped_bytes, hls_domain, hls_duration_seconds) = match manifest {
        Some(manifest) => (
            Some(manifest.gzipped_bytes),
            Some(manifest.domain),
            Some(manifest.duration.as_secs_f64()),
        ),
        None => (None, None, None),
    };
    VodResult {
        vod: job,
        requested_at,
        gzipped_bytes,
        hls_domain,
        hls_duration_seconds,
        public: meta.public,
        profile_image_url: meta.profile_image_url,
        box_art_url: meta.box_art_url,
    }
}
