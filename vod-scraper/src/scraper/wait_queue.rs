//! Grace-period queue for sessions that appear to have stopped.
//!
//! Keyed by `(stream_id, start_time)`: a streamer who restarts
//! immediately has a pending entry for the old session and a live
//! entry for the new one at the same time. Ordered by
//! `(last_interaction, stream_id, start_time)` for stalest-first
//! sweeping.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};

use super::types::LiveVod;

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
struct WaitKey {
    last_interaction: DateTime<Utc>,
    stream_id: String,
    start_time: DateTime<Utc>,
}

impl WaitKey {
    fn of(vod: &LiveVod) -> Self {
        Self {
            last_interaction: vod.last_interaction,
            stream_id: vod.stream_id.clone(),
            start_time: vod.start_time,
        }
    }
}

#[derive(Debug, Clone, Hash, PartialEq, Eq)]
struct StreamIdStartTime {
    stream_id: String,
    start_time: DateTime<Utc>,
}

/// Pending-confirmation queue.
#[derive(Debug, Default)]
pub struct WaitVodQueue {
    by_id: HashMap<StreamIdStartTime, WaitKey>,
    by_staleness: BTreeMap<WaitKey, LiveVod>,
}

impl WaitVodQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.by_staleness.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_staleness.is_empty()
    }

    /// The record with the oldest `(last_interaction, stream_id, start_time)`.
    pub fn stalest(&self) -> Option<&LiveVod> {
        self.by_staleness.first_key_value().map(|(_, vod)| vod)
    }

    pub fn pop_stalest(&mut self) -> Option<LiveVod> {
        let (_, vod) = self.by_staleness.pop_first()?;
        self.by_id.remove(&StreamIdStartTime {
            stream_id: vod.stream_id.clone(),
            start_time: vod.start_time,
        });
        Some(vod)
    }

    pub fn get(&self, stream_id: &str, start_time: DateTime<Utc>) -> Option<&LiveVod> {
        let key = self.by_id.get(&StreamIdStartTime {
            stream_id: stream_id.to_string(),
            start_time,
        })?;
        self.by_staleness.get(key)
    }

    /// Remove the entry for `(stream_id, start_time)`, if present.
    pub fn remove(&mut self, stream_id: &str, start_time: DateTime<Utc>) -> Option<LiveVod> {
        let key = self.by_id.remove(&StreamIdStartTime {
            stream_id: stream_id.to_string(),
            start_time,
        })?;
        self.by_staleness.remove(&key)
    }

    /// Latest-wins upsert: any existing entry for the same key is
    /// replaced outright. A pending entry is terminal state awaiting a
    /// timeout, not an accumulator.
    pub fn put(&mut self, vod: LiveVod) {
        self.remove(&vod.stream_id, vod.start_time);
        let key = WaitKey::of(&vod);
        self.by_id.insert(
            StreamIdStartTime {
                stream_id: vod.stream_id.clone(),
                start_time: vod.start_time,
            },
            key.clone(),
        );
        self.by_staleness.insert(key, vod);
    }
}
