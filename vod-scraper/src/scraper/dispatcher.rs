//! Dispatcher: holds the archive-candidate queue and feeds the worker
//! pool without ever blocking on it.
//!
//! The job branch of the select is guarded on the queue being
//! non-empty, and a permit is reserved before anything is popped. Busy
//! workers simply never consume; the dispatcher never pushes.

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::Result;

use super::archive_queue::ArchiveVodQueue;
use super::types::LiveVod;

pub async fn run_dispatcher(
    capacity: usize,
    mut batches_rx: mpsc::Receiver<Vec<LiveVod>>,
    jobs_tx: mpsc::Sender<LiveVod>,
    cancel: CancellationToken,
) -> Result<()> {
    info!(capacity, "dispatcher started");
    let mut queue = ArchiveVodQueue::new();
    loop {
        tokio::select! {
            _ = cancel.cancelled() => return Ok(()),
            batch = batches_rx.recv() => {
                let Some(batch) = batch else {
                    // poll driver gone; its exit carries the reason
                    return Ok(());
                };
                for vod in batch {
                    queue.put(vod);
                    if queue.len() > capacity {
                        if let Some(dropped) = queue.pop_lowest() {
                            debug!(
                                stream_id = %dropped.stream_id,
                                max_views = dropped.max_views,
                                "candidate queue over capacity, dropped least-viewed"
                            );
                        }
                    }
                }
            }
            permit = jobs_tx.reserve(), if !queue.is_empty() => {
                let Ok(permit) = permit else {
                    return Ok(());
                };
                if let Some(vod) = queue.pop_lowest() {
                    permit.send(vod);
                }
            }
        }
    }
}
