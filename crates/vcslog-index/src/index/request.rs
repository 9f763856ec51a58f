//! One unit of indexing work: a set of commits of a single root

use anyhow::Result;
use std::collections::HashSet;
use std::fmt;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use vcslog_core::{CommitDetail, CommitIndex, ProgressIndicator, Root, VcsError, VcsLogIndexer};
use vcslog_db::IndexStorage;

use super::IndexInner;
use crate::budget::IndexingBudget;
use crate::controller::Request;
use crate::formatting::{format_duration, format_number};

pub(crate) struct IndexingRequest {
    index: Weak<IndexInner>,
    root: Root,
    commits: HashSet<CommitIndex>,
    full: bool,
    new_indexed: AtomicUsize,
    old_commits: AtomicUsize,
    start_time: AtomicU64,
}

impl IndexingRequest {
    pub(super) fn new(index: Weak<IndexInner>, root: Root, commits: HashSet<CommitIndex>, full: bool) -> Self {
        Self {
            index,
            root,
            commits,
            full,
            new_indexed: AtomicUsize::new(0),
            old_commits: AtomicUsize::new(0),
            start_time: AtomicU64::new(0),
        }
    }

    fn run_with(&self, index: &Arc<IndexInner>, indicator: &ProgressIndicator) -> Result<()> {
        if index.big_list.is_big(&self.root) {
            log::info!("Indexing repository {} is skipped since it is too big", self.root.name());
            index.put_back(&self.root, &self.commits);
            index.budget.task_finished(&self.root);
            return Ok(());
        }
        let (Some(storage), Some(indexer)) = (index.storage.as_ref(), index.indexers.get(&self.root)) else {
            index.budget.task_finished(&self.root);
            return Ok(());
        };

        indicator.set_fraction(0.0);
        self.start_time.store(index.clock.now_millis(), Ordering::SeqCst);

        if self.full {
            log::debug!("Indexing full repository in {}", self.root.name());
        } else {
            log::debug!("Indexing {} commits in {}", self.commits.len(), self.root.name());
        }

        let _finish = FinishGuard { request: self, index };
        let result = if self.full {
            self.index_all(index, storage, indexer.as_ref(), indicator)
        } else {
            self.index_one_by_one(index, storage, indexer.as_ref(), indicator)
        };

        match result {
            Ok(()) => Ok(()),
            Err(VcsError::Cancelled) => {
                self.schedule_reindex(index);
                Err(VcsError::Cancelled.into())
            }
            Err(e) => {
                log::error!("{:#}", anyhow::Error::from(e));
                self.schedule_reindex(index);
                Ok(())
            }
        }
    }

    fn index_one_by_one(
        &self,
        index: &Arc<IndexInner>,
        storage: &IndexStorage,
        indexer: &dyn VcsLogIndexer,
        indicator: &ProgressIndicator,
    ) -> Result<(), VcsError> {
        let commits: Vec<CommitIndex> = self
            .commits
            .iter()
            .copied()
            .filter(|&commit| {
                if index.is_commit_indexed(commit) {
                    self.old_commits.fetch_add(1, Ordering::SeqCst);
                    false
                } else {
                    true
                }
            })
            .collect();

        // Hashes go to the VCS in batches to bound the memory they take
        for batch in commits.chunks(index.config.batch()) {
            indicator.check_canceled()?;

            let hashes = self.hashes(index, batch)?;
            indexer.read_full_details(&self.root, &hashes, storage.paths(), &mut |detail: CommitDetail| {
                indicator.check_canceled()?;
                index.store_detail(&detail);
                self.new_indexed.fetch_add(1, Ordering::SeqCst);

                self.check_running_too_long(index, indicator);
                indicator.check_canceled()
            })?;

            self.display_progress(indicator);
        }
        Ok(())
    }

    fn index_all(
        &self,
        index: &Arc<IndexInner>,
        storage: &IndexStorage,
        indexer: &dyn VcsLogIndexer,
        indicator: &ProgressIndicator,
    ) -> Result<(), VcsError> {
        self.display_progress(indicator);
        let flush_interval = index.config.flush_interval();

        indexer.read_all_full_details(&self.root, storage.paths(), &mut |detail: CommitDetail| {
            indicator.check_canceled()?;
            index.store_detail(&detail);

            if (self.new_indexed.fetch_add(1, Ordering::SeqCst) + 1) % flush_interval == 0 {
                index.flush();
            }

            self.check_running_too_long(index, indicator);
            self.display_progress(indicator);
            indicator.check_canceled()
        })
    }

    fn hashes(&self, index: &IndexInner, batch: &[CommitIndex]) -> Result<Vec<String>, VcsError> {
        let mut hashes = Vec::with_capacity(batch.len());
        for &commit in batch {
            match index.resolver.commit_id(commit) {
                Ok(Some(id)) => hashes.push(id.hash),
                Ok(None) => log::warn!("Commit #{} of {} has no known hash", commit, self.root.name()),
                Err(e) => return Err(VcsError::backend(&self.root, e)),
            }
        }
        Ok(hashes)
    }

    /// Pauses the root once its accumulated time reaches its limit
    fn check_running_too_long(&self, index: &IndexInner, indicator: &ProgressIndicator) {
        let now = index.clock.now_millis();
        let time = index.budget.indexing_time(&self.root)
            + now.saturating_sub(self.start_time.load(Ordering::SeqCst));
        let limit = index.budget.limit_minutes(&self.root);

        if IndexingBudget::exceeded(limit, time) && !index.big_list.is_big(&self.root) {
            log::warn!(
                "Indexing {} was cancelled after {}",
                self.root.name(),
                format_duration(Duration::from_millis(time))
            );
            index.big_list.add_repository(self.root.clone());
            index.budget.raise_limit(&self.root, limit, time);
            indicator.cancel();
            index.show_indexing_notification(&self.root, limit);
        }
    }

    fn display_progress(&self, indicator: &ProgressIndicator) {
        let done = self.new_indexed.load(Ordering::SeqCst) + self.old_commits.load(Ordering::SeqCst);
        indicator.set_fraction(done as f64 / self.commits.len().max(1) as f64);
    }

    fn left_commits(&self) -> usize {
        self.commits
            .len()
            .saturating_sub(self.new_indexed.load(Ordering::SeqCst) + self.old_commits.load(Ordering::SeqCst))
    }

    /// Every commit of the request goes back to pending, not only the
    /// unfinished ones: partially written commits are not tracked
    fn schedule_reindex(&self, index: &Arc<IndexInner>) {
        log::debug!(
            "Schedule reindexing of {} commits in {}",
            format_number(self.left_commits()),
            self.root.name()
        );
        index.put_back(&self.root, &self.commits);
        index.schedule_index(false);
    }

    fn finish(&self, index: &IndexInner, unwinding: bool) {
        let elapsed = index
            .clock
            .now_millis()
            .saturating_sub(self.start_time.load(Ordering::SeqCst));

        index.budget.task_finished(&self.root);
        index.budget.add_time(&self.root, elapsed);
        if !unwinding && index.is_root_indexed(&self.root) {
            let time = index.budget.take_time(&self.root);
            index.collector.report_indexing_time(time);
            index.listeners.notify(&self.root);
        }

        self.report(elapsed);
        index.flush();
    }

    fn report(&self, elapsed_ms: u64) {
        let elapsed = format_duration(Duration::from_millis(elapsed_ms));
        let new_indexed = format_number(self.new_indexed.load(Ordering::SeqCst));
        if self.full {
            log::debug!("{} for indexing {} commits in {}", elapsed, new_indexed, self.root.name());
        } else {
            let left = self.left_commits();
            let left_message = if left > 0 {
                format!(". {} commits left", format_number(left))
            } else {
                String::new()
            };
            log::debug!(
                "{} for indexing {} new commits out of {} in {}{}",
                elapsed,
                new_indexed,
                format_number(self.commits.len()),
                self.root.name(),
                left_message
            );
        }
    }
}

impl Request for IndexingRequest {
    fn run(&self, indicator: &ProgressIndicator) -> Result<()> {
        // The engine is gone: nothing left to index into
        let Some(index) = self.index.upgrade() else { return Ok(()) };
        self.run_with(&index, indicator)
    }
}

impl fmt::Display for IndexingRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "IndexingRequest of {} commits in {}", self.commits.len(), self.root.name())?;
        if self.full {
            write!(f, " (full)")?;
        }
        Ok(())
    }
}

/// Bookkeeping that must happen on every exit path of a run
struct FinishGuard<'a> {
    request: &'a IndexingRequest,
    index: &'a IndexInner,
}

impl Drop for FinishGuard<'_> {
    fn drop(&mut self) {
        self.request.finish(self.index, std::thread::panicking());
    }
}
