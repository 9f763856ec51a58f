//! Indexing tunables

use serde::{Deserialize, Serialize};

/// Default time budget of one root before indexing is paused
pub const DEFAULT_LIMIT_MINUTES: u32 = 20;
/// Hashes passed to the VCS in one incremental read
pub const BATCH_SIZE: usize = 20_000;
/// Newly indexed commits between flushes of a full run
pub const FLUSHED_COMMITS_NUMBER: usize = 15_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexConfig {
    pub limit_minutes: u32,
    pub batch_size: usize,
    pub flushed_commits: usize,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            limit_minutes: DEFAULT_LIMIT_MINUTES,
            batch_size: BATCH_SIZE,
            flushed_commits: FLUSHED_COMMITS_NUMBER,
        }
    }
}

impl IndexConfig {
    pub fn with_limit_minutes(mut self, minutes: u32) -> Self {
        self.limit_minutes = minutes;
        self
    }

    pub fn with_batch_size(mut self, size: usize) -> Self {
        self.batch_size = size;
        self
    }

    pub fn with_flushed_commits(mut self, commits: usize) -> Self {
        self.flushed_commits = commits;
        self
    }

    /// Effective limit; never below one minute
    pub fn limit(&self) -> u32 {
        self.limit_minutes.max(1)
    }

    pub(crate) fn batch(&self) -> usize {
        self.batch_size.max(1)
    }

    pub(crate) fn flush_interval(&self) -> usize {
        self.flushed_commits.max(1)
    }
}
