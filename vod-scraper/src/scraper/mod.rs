//! Pipeline assembly and process lifecycle.
//!
//! Four stages joined by capacity-one channels: poll driver ->
//! dispatcher -> worker pool -> result sink. Each queue is owned by
//! exactly one task; everything crosses stage boundaries as messages.

pub mod archive_queue;
pub mod dispatcher;
pub mod feed;
pub mod live_queue;
pub mod manifest;
pub mod poller;
pub mod retry;
pub mod sink;
pub mod types;
pub mod visibility;
pub mod wait_queue;
pub mod worker;

#[cfg(test)]
pub mod testing;

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use twitch_api::{GqlFeed, HelixClient};

use crate::config::ScraperConfig;
use crate::database::{self, DbPool, PgStreamsRepository, StreamsRepository};
use crate::{Error, Result};

use dispatcher::run_dispatcher;
use feed::{LiveFeed, TwitchLiveFeed};
use manifest::{HttpManifestFetcher, ManifestFetcher};
use poller::{Poller, PollerConfig, delta};
use sink::run_sink;
use types::LiveVod;
use visibility::VisibilityClient;
use wait_queue::WaitVodQueue;
use worker::{SharedJobs, run_worker};

fn poller_config(config: &ScraperConfig) -> PollerConfig {
    PollerConfig {
        poll_interval: config.poll_interval,
        request_time_limit: config.request_time_limit,
        cursor_reset_threshold: config.cursor_reset_threshold,
        cursor_fraction: config.cursor_fraction,
        live_eviction_threshold: config.live_eviction_threshold,
        wait_eviction_threshold: config.wait_eviction_threshold,
        min_viewers_to_observe: config.min_viewers_to_observe,
        min_viewers_to_record: config.min_viewers_to_record,
        page_size: config.page_size,
        retention: config.retention,
    }
}

/// Rebuild the pending-confirmation queue from rows that were still
/// live when the previous process stopped.
///
/// Only the pending queue is rehydrated; the live registry starts
/// empty, so a session genuinely still live across the restart is
/// re-tracked as new.
async fn rehydrate_wait_queue<R>(repo: &R, config: &ScraperConfig) -> Result<WaitVodQueue>
where
    R: StreamsRepository + ?Sized,
{
    let mut queue = WaitVodQueue::new();
    let Some(latest) = repo.latest_update_time().await? else {
        info!("no prior observations, pending queue starts empty");
        return Ok(queue);
    };
    let window = (config.live_eviction_threshold + config.wait_eviction_threshold)
        .mul_f64(config.eviction_ratio);
    let cutoff = latest - delta(window);
    // requeue time, not the stored observation time: every rehydrated
    // session gets the full confirmation grace period
    let requeued_at = Utc::now();
    for row in repo.get_recent_live_sessions(cutoff).await? {
        queue.put(LiveVod {
            streamer_id: row.streamer_id,
            stream_id: row.stream_id,
            start_time: row.start_time,
            streamer_login_at_start: row.streamer_login_at_start,
            game_id_at_start: row.game_id_at_start,
            max_views: row.max_views,
            last_updated: row.last_updated_at,
            last_interaction: requeued_at,
        });
    }
    info!(rehydrated = queue.len(), "pending queue rehydrated from storage");
    Ok(queue)
}

/// Fail fast on a broken environment before spawning the pipeline.
async fn startup_checks(http: &reqwest::Client, pool: &DbPool, compression_level: u32) -> Result<()> {
    vod_manifest::compress(b"#EXTM3U\n", compression_level).map_err(Error::Manifest)?;
    sqlx::query("SELECT 1").execute(pool).await?;
    if let Err(err) = http.get(vod_manifest::DOMAINS[0]).send().await {
        warn!(%err, "cdn probe failed, manifest capture may be degraded");
    }
    Ok(())
}

/// Run one pipeline epoch over the given stage implementations until
/// cancellation or the first fatal error.
pub async fn run_pipeline<F, R, M, V>(
    config: &ScraperConfig,
    feed: Arc<F>,
    repo: Arc<R>,
    fetcher: Arc<M>,
    visibility: Arc<V>,
    initial_wait_queue: WaitVodQueue,
    cancel: CancellationToken,
) -> Result<()>
where
    F: LiveFeed + 'static,
    R: StreamsRepository + 'static,
    M: ManifestFetcher + 'static,
    V: VisibilityClient + 'static,
{
    let (batches_tx, batches_rx) = mpsc::channel(1);
    let (jobs_tx, jobs_rx) = mpsc::channel(1);
    let (results_tx, results_rx) = mpsc::channel(1);

    let mut tasks: JoinSet<Result<()>> = JoinSet::new();
    let poller = Poller::new(
        poller_config(config),
        feed,
        Arc::clone(&repo),
        initial_wait_queue,
        batches_tx,
        cancel.clone(),
    );
    tasks.spawn(poller.run());
    tasks.spawn(run_dispatcher(
        config.max_archive_queue_size,
        batches_rx,
        jobs_tx,
        cancel.clone(),
    ));
    let shared_jobs: SharedJobs = Arc::new(Mutex::new(jobs_rx));
    for worker_id in 0..config.worker_count {
        tasks.spawn(run_worker(
            worker_id,
            config.worker_interval,
            Arc::clone(&fetcher),
            Arc::clone(&visibility),
            Arc::clone(&shared_jobs),
            results_tx.clone(),
            cancel.clone(),
        ));
    }
    drop(results_tx);
    tasks.spawn(run_sink(
        repo,
        config.request_time_limit,
        results_rx,
        cancel.clone(),
    ));

    // first fatal error wins; everything else is cancelled and drained
    let mut first_error = None;
    while let Some(joined) = tasks.join_next().await {
        let outcome = match joined {
            Ok(outcome) => outcome,
            Err(join_err) => Err(Error::Join(join_err)),
        };
        if let Err(err) = outcome {
            if first_error.is_none() {
                first_error = Some(err);
            }
            cancel.cancel();
        }
    }
    match first_error {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

/// Build the production stages and run one pipeline epoch.
pub async fn run_scraper(config: &ScraperConfig, cancel: CancellationToken) -> Result<()> {
    let http = reqwest::Client::builder()
        .timeout(config.request_time_limit)
        .build()?;
    let gql = GqlFeed::new(config.request_time_limit)?;
    let helix = Arc::new(HelixClient::new(
        &config.client_id,
        &config.client_secret,
        config.request_time_limit,
    )?);
    helix.refresh_app_token().await?;
    let feed = Arc::new(TwitchLiveFeed::new(gql, Arc::clone(&helix)));

    let pool = database::init_pool(&config.database_url, config.request_time_limit).await?;
    database::run_migrations(&pool).await?;
    startup_checks(&http, &pool, config.compression_level).await?;
    let repo = Arc::new(PgStreamsRepository::new(pool));
    let wait_queue = rehydrate_wait_queue(&*repo, config).await?;

    let fetcher = Arc::new(HttpManifestFetcher::new(http, config.compression_level));
    run_pipeline(config, feed, repo, fetcher, helix, wait_queue, cancel).await
}

/// Run scrape epochs back to back until shutdown.
///
/// The pipeline is torn down and rebuilt on a fixed period so that
/// queue contents, cursors and connections never age beyond one epoch.
/// Fatal errors propagate to the caller instead of being restarted
/// over; a supervisor is better placed to decide what a crash loop
/// should do.
pub async fn run_forever(config: ScraperConfig, cancel: CancellationToken) -> Result<()> {
    loop {
        let epoch_cancel = cancel.child_token();
        let restart = tokio::time::sleep(config.scraper_restart_interval);
        tokio::pin!(restart);
        let run = run_scraper(&config, epoch_cancel.clone());
        tokio::pin!(run);
        tokio::select! {
            result = &mut run => {
                result?;
                if cancel.is_cancelled() {
                    return Ok(());
                }
                warn!("pipeline exited without a shutdown signal, restarting");
            }
            _ = &mut restart => {
                info!("epoch lifetime elapsed, restarting pipeline");
                epoch_cancel.cancel();
                run.await?;
            }
        }
        if cancel.is_cancelled() {
            return Ok(());
        }
    }
}
