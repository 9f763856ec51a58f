//! Shared fixtures for engine tests: an in-memory VCS, commit id resolver,
//! notifier and fatal error sink.

#![allow(dead_code)]

use anyhow::Result;
use std::collections::HashMap;
use std::io;
use std::path::Path;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use vcslog_core::{
    ChangeKind, ChangedPath, CommitDetail, CommitId, CommitIdResolver, CommitIndex, DetailConsumer,
    FatalErrorHandler, PathsEncoder, Root, VcsError, VcsLogIndexer, VcsLogProvider, VcsUser,
};
use vcslog_index::{IndexConfig, IndexingNotifier, ManualClock, PauseNotification, PersistentIndex};

// ── commits ──────────────────────────────────────────────────────────────────

pub fn hash(n: usize) -> String {
    format!("{:040x}", n + 1)
}

pub fn alice() -> VcsUser {
    VcsUser::new("Alice", "alice@example.com")
}

pub fn bob() -> VcsUser {
    VcsUser::new("Bob", "bob@example.com")
}

/// Commit `n` of a linear history: even commits by Alice, odd ones by Bob
#[derive(Debug, Clone)]
pub struct FakeCommit {
    pub detail: CommitDetail,
    pub paths: Vec<String>,
}

pub fn fake_commit(root: &Root, n: usize) -> FakeCommit {
    let author = if n % 2 == 0 { alice() } else { bob() };
    let detail = CommitDetail {
        hash: hash(n),
        root: root.clone(),
        parents: if n == 0 { vec![] } else { vec![hash(n - 1)] },
        committer: author.clone(),
        author,
        author_time: 1_600_000_000 + n as i64 * 60,
        commit_time: 1_600_000_000 + n as i64 * 60 + 5,
        full_message: format!("Fix parser bug #{}\n\nDetails of change {}", n, n),
        changes: vec![],
    };
    FakeCommit {
        detail,
        paths: vec![format!("src/module{}.rs", n % 3)],
    }
}

// ── VCS ──────────────────────────────────────────────────────────────────────

/// In-memory history of one root.
///
/// Each delivered commit advances the clock by the configured delay, which
/// lets budget tests spend minutes without waiting.
pub struct FakeVcs {
    root: Root,
    commits: Mutex<Vec<FakeCommit>>,
    clock: Option<Arc<ManualClock>>,
    delay_ms: AtomicU64,
    failures: AtomicUsize,
    batches: Mutex<Vec<usize>>,
    full_reads: AtomicUsize,
}

impl FakeVcs {
    pub fn new(root: &Root, count: usize) -> Arc<Self> {
        Self::build(root, count, None)
    }

    pub fn with_clock(root: &Root, count: usize, clock: Arc<ManualClock>) -> Arc<Self> {
        Self::build(root, count, Some(clock))
    }

    fn build(root: &Root, count: usize, clock: Option<Arc<ManualClock>>) -> Arc<Self> {
        Arc::new(Self {
            root: root.clone(),
            commits: Mutex::new((0..count).map(|n| fake_commit(root, n)).collect()),
            clock,
            delay_ms: AtomicU64::new(0),
            failures: AtomicUsize::new(0),
            batches: Mutex::new(Vec::new()),
            full_reads: AtomicUsize::new(0),
        })
    }

    /// Appends `count` commits and returns their hashes
    pub fn add_commits(&self, count: usize) -> Vec<String> {
        let mut commits = self.commits.lock().unwrap();
        let start = commits.len();
        commits.extend((start..start + count).map(|n| fake_commit(&self.root, n)));
        (start..start + count).map(hash).collect()
    }

    pub fn hashes(&self) -> Vec<String> {
        self.commits.lock().unwrap().iter().map(|c| c.detail.hash.clone()).collect()
    }

    pub fn set_delay(&self, delay: Duration) {
        self.delay_ms.store(delay.as_millis() as u64, Ordering::SeqCst);
    }

    /// Makes the next `count` reads fail before delivering anything
    pub fn fail_next(&self, count: usize) {
        self.failures.store(count, Ordering::SeqCst);
    }

    /// Sizes of the hash batches requested so far
    pub fn batches(&self) -> Vec<usize> {
        self.batches.lock().unwrap().clone()
    }

    pub fn full_reads(&self) -> usize {
        self.full_reads.load(Ordering::SeqCst)
    }

    fn check_failure(&self) -> Result<(), VcsError> {
        let failed = self
            .failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failed {
            let error = io::Error::new(io::ErrorKind::Other, "repository is locked");
            return Err(VcsError::backend(&self.root, error));
        }
        Ok(())
    }

    fn deliver(
        &self,
        commit: &FakeCommit,
        encoder: &dyn PathsEncoder,
        consumer: &mut DetailConsumer<'_>,
    ) -> Result<(), VcsError> {
        let mut detail = commit.detail.clone();
        for path in &commit.paths {
            let path_id = encoder
                .encode(&self.root, path)
                .map_err(|e| VcsError::backend(&self.root, e))?;
            detail.changes.push(ChangedPath {
                path_id,
                kind: ChangeKind::Modified,
            });
        }
        if let Some(clock) = &self.clock {
            clock.advance(Duration::from_millis(self.delay_ms.load(Ordering::SeqCst)));
        }
        consumer(detail)
    }
}

impl VcsLogIndexer for FakeVcs {
    fn supported_vcs(&self) -> &str {
        "Git"
    }

    fn read_full_details(
        &self,
        root: &Root,
        hashes: &[String],
        encoder: &dyn PathsEncoder,
        consumer: &mut DetailConsumer<'_>,
    ) -> Result<(), VcsError> {
        assert_eq!(root, &self.root);
        self.batches.lock().unwrap().push(hashes.len());
        self.check_failure()?;

        let by_hash: HashMap<String, FakeCommit> = self
            .commits
            .lock()
            .unwrap()
            .iter()
            .map(|c| (c.detail.hash.clone(), c.clone()))
            .collect();
        for hash in hashes {
            match by_hash.get(hash) {
                Some(commit) => self.deliver(commit, encoder, consumer)?,
                None => {
                    let error = io::Error::new(io::ErrorKind::NotFound, format!("unknown commit {}", hash));
                    return Err(VcsError::backend(root, error));
                }
            }
        }
        Ok(())
    }

    fn read_all_full_details(
        &self,
        root: &Root,
        encoder: &dyn PathsEncoder,
        consumer: &mut DetailConsumer<'_>,
    ) -> Result<(), VcsError> {
        assert_eq!(root, &self.root);
        self.full_reads.fetch_add(1, Ordering::SeqCst);
        self.check_failure()?;

        let commits = self.commits.lock().unwrap().clone();
        for commit in commits.iter().rev() {
            self.deliver(commit, encoder, consumer)?;
        }
        Ok(())
    }
}

pub struct FakeProvider(pub Option<Arc<FakeVcs>>);

impl VcsLogProvider for FakeProvider {
    fn indexer(&self) -> Option<Arc<dyn VcsLogIndexer>> {
        let indexer: Arc<dyn VcsLogIndexer> = self.0.clone()?;
        Some(indexer)
    }
}

// ── resolver ─────────────────────────────────────────────────────────────────

#[derive(Default)]
pub struct MemoryResolver {
    ids: Mutex<(HashMap<CommitId, CommitIndex>, Vec<CommitId>)>,
}

impl MemoryResolver {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }
}

impl CommitIdResolver for MemoryResolver {
    fn commit_index(&self, hash: &str, root: &Root) -> Result<CommitIndex> {
        let mut guard = self.ids.lock().unwrap();
        let (indices, ids) = &mut *guard;
        let id = CommitId::new(hash, root.clone());
        if let Some(&index) = indices.get(&id) {
            return Ok(index);
        }
        let index = ids.len() as CommitIndex;
        ids.push(id.clone());
        indices.insert(id, index);
        Ok(index)
    }

    fn commit_id(&self, index: CommitIndex) -> Result<Option<CommitId>> {
        Ok(self.ids.lock().unwrap().1.get(index as usize).cloned())
    }
}

// ── sinks ────────────────────────────────────────────────────────────────────

#[derive(Default)]
pub struct RecordingNotifier {
    pub notifications: Mutex<Vec<PauseNotification>>,
}

impl IndexingNotifier for RecordingNotifier {
    fn notify_paused(&self, notification: PauseNotification) {
        self.notifications.lock().unwrap().push(notification);
    }
}

#[derive(Default)]
pub struct RecordingFatal {
    pub errors: Mutex<Vec<String>>,
}

impl RecordingFatal {
    pub fn count(&self) -> usize {
        self.errors.lock().unwrap().len()
    }
}

impl FatalErrorHandler for RecordingFatal {
    fn consume(&self, source: &str, error: &anyhow::Error) {
        self.errors.lock().unwrap().push(format!("{}: {:#}", source, error));
    }
}

// ── engine ───────────────────────────────────────────────────────────────────

pub struct Harness {
    pub root: Root,
    pub vcs: Arc<FakeVcs>,
    pub resolver: Arc<MemoryResolver>,
    pub notifier: Arc<RecordingNotifier>,
    pub fatal: Arc<RecordingFatal>,
    pub clock: Arc<ManualClock>,
    pub index: PersistentIndex,
}

impl Harness {
    pub fn new(base_dir: &Path, commits: usize, config: IndexConfig) -> Self {
        let root = Root::new("/work/engine");
        let clock = Arc::new(ManualClock::new());
        let vcs = FakeVcs::with_clock(&root, commits, Arc::clone(&clock));
        let resolver = MemoryResolver::new();
        let notifier = Arc::new(RecordingNotifier::default());
        let fatal = Arc::new(RecordingFatal::default());

        let index = PersistentIndex::builder("engine", base_dir, resolver.clone())
            .provider(root.clone(), Arc::new(FakeProvider(Some(Arc::clone(&vcs)))))
            .config(config)
            .notifier(notifier.clone())
            .fatal_error_handler(fatal.clone())
            .clock(clock.clone())
            .build();

        Self {
            root,
            vcs,
            resolver,
            notifier,
            fatal,
            clock,
            index,
        }
    }

    pub fn index_of(&self, hash: &str) -> CommitIndex {
        self.resolver.commit_index(hash, &self.root).unwrap()
    }

    /// Marks every given commit, returning their indices
    pub fn mark(&self, hashes: &[String]) -> Vec<CommitIndex> {
        hashes
            .iter()
            .map(|hash| {
                let index = self.index_of(hash);
                self.index.mark_for_indexing(index, &self.root);
                index
            })
            .collect()
    }

    /// Fully indexes the current history, leaving the storage non-fresh
    pub fn index_everything(&self) -> Vec<CommitIndex> {
        let indices = self.mark(&self.vcs.hashes());
        self.index.index_now(true).unwrap();
        indices
    }

    pub fn indexed_count(&self) -> usize {
        self.index.storage().map_or(0, |storage| storage.commit_count())
    }
}
