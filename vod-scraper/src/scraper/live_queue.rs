//! Registry of sessions believed currently live.
//!
//! One entry per streamer, with a secondary ordering on
//! `(last_updated, stream_id)` so the stalest entry is always the
//! ordered map's first key. A plain heap would not do here: restart
//! detection removes arbitrary entries by streamer id.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};

use super::types::LiveVod;

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
struct LiveKey {
    last_updated: DateTime<Utc>,
    stream_id: String,
}

impl LiveKey {
    fn of(vod: &LiveVod) -> Self {
        Self {
            last_updated: vod.last_updated,
            stream_id: vod.stream_id.clone(),
        }
    }
}

/// Result of an upsert against the live registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpsertOutcome {
    /// The streamer had no tracked session; a fresh record was inserted.
    Inserted,
    /// Same session observed again; view max merged, timestamps refreshed.
    Updated,
    /// The streamer restarted with a different start time; the previous
    /// record was evicted and is returned.
    Evicted(LiveVod),
}

/// Live session registry keyed by streamer, ordered by staleness.
#[derive(Debug, Default)]
pub struct LiveVodQueue {
    by_streamer: HashMap<String, LiveKey>,
    by_staleness: BTreeMap<LiveKey, LiveVod>,
}

impl LiveVodQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.by_staleness.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_staleness.is_empty()
    }

    /// The record with the oldest `(last_updated, stream_id)`.
    pub fn stalest(&self) -> Option<&LiveVod> {
        self.by_staleness.first_key_value().map(|(_, vod)| vod)
    }

    /// Remove and return the stalest record.
    pub fn pop_stalest(&mut self) -> Option<LiveVod> {
        let (_, vod) = self.by_staleness.pop_first()?;
        self.by_streamer.remove(&vod.streamer_id);
        Some(vod)
    }

    fn take(&mut self, key: &LiveKey) -> Option<LiveVod> {
        let vod = self.by_staleness.remove(key)?;
        self.by_streamer.remove(&vod.streamer_id);
        Some(vod)
    }

    fn insert(&mut self, vod: LiveVod) {
        let key = LiveKey::of(&vod);
        self.by_streamer.insert(vod.streamer_id.clone(), key.clone());
        self.by_staleness.insert(key, vod);
    }

    /// Insert or merge an observation.
    ///
    /// A same-session observation merges: the view max is monotonic and
    /// the staleness key is refreshed. A different start time for an
    /// already-tracked streamer means a restart; the old record is
    /// evicted and handed back to the caller.
    pub fn upsert(&mut self, vod: LiveVod) -> UpsertOutcome {
        let Some(key) = self.by_streamer.get(&vod.streamer_id).cloned() else {
            self.insert(vod);
            return UpsertOutcome::Inserted;
        };
        let Some(current) = self.take(&key) else {
            self.insert(vod);
            return UpsertOutcome::Inserted;
        };
        if current.start_time != vod.start_time {
            self.insert(vod);
            return UpsertOutcome::Evicted(current);
        }
        let merged = LiveVod {
            max_views: current.max_views.max(vod.max_views),
            last_updated: vod.last_updated,
            last_interaction: vod.last_interaction,
            ..current
        };
        self.insert(merged);
        UpsertOutcome::Updated
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(seconds: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(seconds, 0).unwrap()
    }

    fn vod(streamer: &str, stream: &str, start: i64, views: i64, updated: i64) -> LiveVod {
        LiveVod {
            streamer_id: streamer.to_string(),
            stream_id: stream.to_string(),
            start_time: at(start),
            streamer_login_at_start: streamer.to_string(),
            game_id_at_start: "509658".to_string(),
            max_views: views,
            last_updated: at(updated),
            last_interaction: at(updated),
        }
    }

    #[test]
    fn merge_keeps_monotonic_view_max() {
        let mut queue = LiveVodQueue::new();
        assert_eq!(queue.upsert(vod("a", "1", 0, 50, 10)), UpsertOutcome::Inserted);
        assert_eq!(queue.upsert(vod("a", "1", 0, 30, 20)), UpsertOutcome::Updated);
        let current = queue.stalest().unwrap();
        assert_eq!(current.max_views, 50);
        assert_eq!(current.last_updated, at(20));
    }

    #[test]
    fn restart_evicts_the_old_record() {
        let mut queue = LiveVodQueue::new();
        queue.upsert(vod("a", "1", 0, 50, 10));
        let UpsertOutcome::Evicted(old) = queue.upsert(vod("a", "2", 100, 5, 20)) else {
            panic!("expected eviction");
        };
        assert_eq!(old.stream_id, "1");
        assert_eq!(queue.len(), 1);
        assert_eq!(queue.stalest().unwrap().stream_id, "2");
    }

    #[test]
    fn stalest_follows_minimum_last_updated_then_stream_id() {
        let mut queue = LiveVodQueue::new();
        queue.upsert(vod("a", "2", 0, 5, 10));
        queue.upsert(vod("b", "1", 0, 5, 10));
        queue.upsert(vod("c", "3", 0, 5, 5));
        assert_eq!(queue.stalest().unwrap().stream_id, "3");
        assert_eq!(queue.pop_stalest().unwrap().stream_id, "3");
        // tie on last_updated broken by stream id
        assert_eq!(queue.pop_stalest().unwrap().stream_id, "1");
        assert_eq!(queue.pop_stalest().unwrap().stream_id, "2");
        assert!(queue.pop_stalest().is_none());
    }

    #[test]
    fn refreshing_reorders_the_staleness_index() {
        let mut queue = LiveVodQueue::new();
        queue.upsert(vod("a", "1", 0, 5, 10));
        queue.upsert(vod("b", "2", 0, 5, 20));
        queue.upsert(vod("a", "1", 0, 5, 30));
        assert_eq!(queue.stalest().unwrap().stream_id, "2");
    }
}
