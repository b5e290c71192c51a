//! Bounded, popularity-ordered queue of confirmed-ended sessions.
//!
//! Ordered by `(max_views, stream_id, start_time)` ascending. Capacity
//! is enforced by the owner immediately after each put: one
//! `pop_lowest` whenever the size exceeds the bound. Records here are
//! terminal; there is no removal by key.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

use super::types::LiveVod;

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
struct ArchiveKey {
    max_views: i64,
    stream_id: String,
    start_time: DateTime<Utc>,
}

impl ArchiveKey {
    fn of(vod: &LiveVod) -> Self {
        Self {
            max_views: vod.max_views,
            stream_id: vod.stream_id.clone(),
            start_time: vod.start_time,
        }
    }
}

/// Archive-candidate queue.
#[derive(Debug, Default)]
pub struct ArchiveVodQueue {
    tree: BTreeMap<ArchiveKey, LiveVod>,
}

impl ArchiveVodQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.tree.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tree.is_empty()
    }

    pub fn put(&mut self, vod: LiveVod) {
        self.tree.insert(ArchiveKey::of(&vod), vod);
    }

    /// Remove and return the least-viewed record.
    pub fn pop_lowest(&mut self) -> Option<LiveVod> {
        self.tree.pop_first().map(|(_, vod)| vod)
    }
}
