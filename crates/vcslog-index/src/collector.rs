//! Indexing telemetry counters

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use crate::formatting::{format_duration, format_number};

/// Collects usage counters of the index; shared between the engine and the
/// pause notifications it emits.
#[derive(Debug, Default)]
pub struct IndexCollector {
    fresh_indexes: AtomicUsize,
    indexing_time_ms: AtomicU64,
    caught_up: AtomicUsize,
    too_long_notifications: AtomicUsize,
    resume_clicks: AtomicUsize,
    flushes: AtomicUsize,
}

impl IndexCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn report_fresh_index(&self) {
        self.fresh_indexes.fetch_add(1, Ordering::Relaxed);
    }

    /// Total time a root needed to get fully indexed
    pub fn report_indexing_time(&self, millis: u64) {
        self.indexing_time_ms.fetch_add(millis, Ordering::Relaxed);
        self.caught_up.fetch_add(1, Ordering::Relaxed);
    }

    pub fn report_too_long_notification(&self) {
        self.too_long_notifications.fetch_add(1, Ordering::Relaxed);
    }

    pub fn report_resume_click(&self) {
        self.resume_clicks.fetch_add(1, Ordering::Relaxed);
    }

    /// Successful flush of the index storage
    pub fn report_flush(&self) {
        self.flushes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn statistics(&self) -> IndexStats {
        IndexStats {
            fresh_indexes: self.fresh_indexes.load(Ordering::Relaxed),
            indexing_time: Duration::from_millis(self.indexing_time_ms.load(Ordering::Relaxed)),
            caught_up: self.caught_up.load(Ordering::Relaxed),
            paused: self.too_long_notifications.load(Ordering::Relaxed),
            resumed: self.resume_clicks.load(Ordering::Relaxed),
            flushes: self.flushes.load(Ordering::Relaxed),
        }
    }
}

/// Snapshot of [`IndexCollector`] counters
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndexStats {
    pub fresh_indexes: usize,
    pub indexing_time: Duration,
    pub caught_up: usize,
    pub paused: usize,
    pub resumed: usize,
    pub flushes: usize,
}

impl std::fmt::Display for IndexStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Fresh indexes: {} | Caught up: {} in {} | Paused: {}, resumed: {}",
            format_number(self.fresh_indexes),
            format_number(self.caught_up),
            format_duration(self.indexing_time),
            self.paused,
            self.resumed
        )
    }
}
