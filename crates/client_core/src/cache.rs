use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};

use tracing::debug;

/// Staleness marker for the cached feed.
///
/// Invalidation only bumps the epoch; fetchers compare it on their next read
/// and restart pagination from the first page when it moved.
#[derive(Debug, Clone, Default)]
pub struct FeedCache {
    epoch: Arc<AtomicU64>,
}

impl FeedCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn epoch(&self) -> u64 {
        self.epoch.load(Ordering::Acquire)
    }

    pub fn invalidate(&self) {
        let epoch = self.epoch.fetch_add(1, Ordering::AcqRel) + 1;
        debug!(epoch, "feed: cache invalidated");
    }

    pub fn is_stale(&self, seen_epoch: u64) -> bool {
        self.epoch() != seen_epoch
    }
}
