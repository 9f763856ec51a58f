//! Persistent commit index engine
//!
//! [`PersistentIndex`] owns the index storage of one set of roots, tracks the
//! commits waiting to be indexed and turns them into [`IndexingRequest`]s
//! run on a single background slot.

mod request;

use anyhow::Result;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::mem;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use vcslog_core::{
    CommitDetail, CommitIdResolver, CommitIndex, FatalErrorHandler, Listeners, LoggingFatalErrorHandler,
    ProgressIndicator, Root, Subscription, VcsLogIndexer, VcsLogProvider,
};
use vcslog_db::{IndexStorage, StorageId, INDEX_KIND};

use crate::big_repositories::{BigRepositoriesList, BigRepositoryEvent};
use crate::budget::{Clock, IndexingBudget, SystemClock};
use crate::collector::{IndexCollector, IndexStats};
use crate::config::IndexConfig;
use crate::controller::{Request, SingleTaskController};
use crate::data_getter::IndexDataGetter;
use crate::executor::{BackgroundExecutor, HeavyAwareExecutor};
use crate::notification::{IndexingNotifier, LoggingNotifier, PauseNotification};

use request::IndexingRequest;

/// Version of the on-disk index layout; bumping it rebuilds every index
pub const INDEX_VERSION: u32 = 1;

const SOURCE: &str = "PersistentIndex";

pub(crate) struct IndexInner {
    project_name: String,
    roots: BTreeSet<Root>,
    indexers: HashMap<Root, Arc<dyn VcsLogIndexer>>,
    resolver: Arc<dyn CommitIdResolver>,
    storage: Option<IndexStorage>,
    fatal: Arc<dyn FatalErrorHandler>,
    notifier: Arc<dyn IndexingNotifier>,
    big_list: Arc<BigRepositoriesList>,
    budget: IndexingBudget,
    clock: Arc<dyn Clock>,
    config: IndexConfig,
    collector: Arc<IndexCollector>,
    pending: Mutex<HashMap<Root, HashSet<CommitIndex>>>,
    listeners: Listeners<Root>,
    controller: SingleTaskController<IndexingRequest>,
    disposed: AtomicBool,
}

/// Incremental, crash-safe index over the commit history of a set of roots.
///
/// Indexing is disabled for good if the storage cannot be opened; the error
/// goes to the fatal error handler and every query answers as if nothing
/// was indexed.
pub struct PersistentIndex {
    inner: Arc<IndexInner>,
    _big_list_subscription: Subscription,
}

/// Builder of a [`PersistentIndex`]
pub struct PersistentIndexBuilder {
    project_name: String,
    base_dir: PathBuf,
    resolver: Arc<dyn CommitIdResolver>,
    providers: Vec<(Root, Arc<dyn VcsLogProvider>)>,
    fatal: Arc<dyn FatalErrorHandler>,
    notifier: Arc<dyn IndexingNotifier>,
    big_list: Arc<BigRepositoriesList>,
    collector: Arc<IndexCollector>,
    clock: Arc<dyn Clock>,
    executor: Arc<dyn BackgroundExecutor>,
    config: IndexConfig,
}

impl PersistentIndexBuilder {
    pub fn provider(mut self, root: Root, provider: Arc<dyn VcsLogProvider>) -> Self {
        self.providers.push((root, provider));
        self
    }

    pub fn config(mut self, config: IndexConfig) -> Self {
        self.config = config;
        self
    }

    pub fn fatal_error_handler(mut self, handler: Arc<dyn FatalErrorHandler>) -> Self {
        self.fatal = handler;
        self
    }

    pub fn notifier(mut self, notifier: Arc<dyn IndexingNotifier>) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn big_repositories(mut self, list: Arc<BigRepositoriesList>) -> Self {
        self.big_list = list;
        self
    }

    pub fn collector(mut self, collector: Arc<IndexCollector>) -> Self {
        self.collector = collector;
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn executor(mut self, executor: Arc<dyn BackgroundExecutor>) -> Self {
        self.executor = executor;
        self
    }

    pub fn build(self) -> PersistentIndex {
        let all_roots: Vec<Root> = self.providers.iter().map(|(root, _)| root.clone()).collect();
        let indexers: HashMap<Root, Arc<dyn VcsLogIndexer>> = self
            .providers
            .iter()
            .filter_map(|(root, provider)| provider.indexer().map(|indexer| (root.clone(), indexer)))
            .collect();
        let roots: BTreeSet<Root> = indexers.keys().cloned().collect();

        let log_id = StorageId::calc_log_id(&self.project_name, &all_roots);
        let storage_id = StorageId::new(&self.base_dir, INDEX_KIND, &log_id, INDEX_VERSION);
        let storage = match IndexStorage::open_clean_or_reset_broken(&storage_id) {
            Ok(storage) => Some(storage),
            Err(e) => {
                self.fatal.consume(SOURCE, &e);
                None
            }
        };

        let inner = Arc::new(IndexInner {
            budget: IndexingBudget::new(&roots, self.config.limit()),
            project_name: self.project_name,
            roots,
            indexers,
            resolver: self.resolver,
            storage,
            fatal: self.fatal,
            notifier: self.notifier,
            big_list: self.big_list,
            clock: self.clock,
            config: self.config,
            collector: self.collector,
            pending: Mutex::new(HashMap::new()),
            listeners: Listeners::new(),
            controller: SingleTaskController::new("Indexing Commit Data", self.executor),
            disposed: AtomicBool::new(false),
        });

        let weak = Arc::downgrade(&inner);
        let subscription = inner.big_list.subscribe(move |event| {
            if let BigRepositoryEvent::Removed(root) = event {
                if let Some(inner) = weak.upgrade() {
                    if inner.roots.contains(root) {
                        inner.schedule_index(false);
                    }
                }
            }
        });

        PersistentIndex {
            inner,
            _big_list_subscription: subscription,
        }
    }
}

impl PersistentIndex {
    /// Starts building an index for `project_name` stored under `base_dir`
    pub fn builder<P: Into<PathBuf>>(
        project_name: &str,
        base_dir: P,
        resolver: Arc<dyn CommitIdResolver>,
    ) -> PersistentIndexBuilder {
        PersistentIndexBuilder {
            project_name: project_name.to_string(),
            base_dir: base_dir.into(),
            resolver,
            providers: Vec::new(),
            fatal: Arc::new(LoggingFatalErrorHandler),
            notifier: Arc::new(LoggingNotifier),
            big_list: Arc::new(BigRepositoriesList::new()),
            collector: Arc::new(IndexCollector::new()),
            clock: Arc::new(SystemClock::default()),
            executor: Arc::new(HeavyAwareExecutor::default()),
            config: IndexConfig::default(),
        }
    }

    /// Queues `index` of `root` unless it is indexed already or `root` is
    /// not indexable
    pub fn mark_for_indexing(&self, index: CommitIndex, root: &Root) {
        self.inner.mark_for_indexing(index, root);
    }

    /// Hands every pending commit to the background worker.
    ///
    /// While the storage is fresh only a `full` call does anything: it then
    /// indexes whole histories in one streaming pass per root.
    pub fn schedule_index(&self, full: bool) {
        self.inner.schedule_index(full);
    }

    /// Same as [`schedule_index`](Self::schedule_index), but runs the
    /// requests on the calling thread.
    ///
    /// Every request runs even if an earlier one was cancelled; the first
    /// cancellation is returned once all of them are done.
    pub fn index_now(&self, full: bool) -> Result<()> {
        let mut cancelled = None;
        for request in self.inner.take_requests(full) {
            // A paused root cancels its own indicator only
            if let Err(e) = request.run(&ProgressIndicator::new()) {
                cancelled.get_or_insert(e);
            }
        }
        cancelled.map_or(Ok(()), Err)
    }

    /// True if commit `index` is indexed; always true without storage so
    /// that nothing gets queued
    pub fn is_indexed(&self, index: CommitIndex) -> bool {
        self.inner.is_commit_indexed(index)
    }

    /// True if `root` is fully caught up: nothing pending, nothing running
    pub fn is_root_indexed(&self, root: &Root) -> bool {
        self.inner.is_root_indexed(root)
    }

    pub fn is_indexing_enabled(&self, root: &Root) -> bool {
        self.inner.is_indexing_enabled(root)
    }

    /// Makes the next start rebuild the index from scratch
    pub fn mark_corrupted(&self) {
        if let Some(storage) = &self.inner.storage {
            storage.mark_corrupted();
        }
    }

    pub fn data_getter(&self) -> Option<IndexDataGetter<'_>> {
        let storage = self.inner.storage.as_ref()?;
        Some(IndexDataGetter::new(
            storage,
            self.inner.resolver.as_ref(),
            self.inner.fatal.as_ref(),
            &self.inner.roots,
        ))
    }

    /// Calls `listener` each time a root becomes fully indexed
    pub fn add_listener<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&Root) + Send + Sync + 'static,
    {
        self.inner.listeners.subscribe(listener)
    }

    /// Roots that have an indexer
    pub fn roots(&self) -> impl Iterator<Item = &Root> {
        self.inner.roots.iter()
    }

    pub fn pending_count(&self, root: &Root) -> usize {
        self.inner.pending().get(root).map_or(0, HashSet::len)
    }

    pub fn indexing_limit(&self, root: &Root) -> u32 {
        self.inner.budget.limit_minutes(root)
    }

    pub fn big_repositories(&self) -> &Arc<BigRepositoriesList> {
        &self.inner.big_list
    }

    pub fn statistics(&self) -> IndexStats {
        self.inner.collector.statistics()
    }

    pub fn storage(&self) -> Option<&IndexStorage> {
        self.inner.storage.as_ref()
    }

    pub fn is_running(&self) -> bool {
        self.inner.controller.is_running()
    }

    /// Requests waiting for the background worker
    pub fn queued_requests(&self) -> usize {
        self.inner.controller.queued()
    }

    /// Blocks until the background worker is idle; false on timeout
    pub fn wait_for_idle(&self, timeout: Option<Duration>) -> bool {
        self.inner.controller.wait_for_idle(timeout)
    }

    pub fn flush(&self) {
        self.inner.flush();
    }

    /// Stops background work; queued requests are dropped
    pub fn dispose(&self) {
        if !self.inner.disposed.swap(true, Ordering::SeqCst) {
            self.inner.controller.dispose();
        }
    }
}

impl Drop for PersistentIndex {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl IndexInner {
    fn pending(&self) -> MutexGuard<'_, HashMap<Root, HashSet<CommitIndex>>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn mark_for_indexing(&self, index: CommitIndex, root: &Root) {
        if self.is_commit_indexed(index) || !self.roots.contains(root) {
            return;
        }
        self.pending().entry(root.clone()).or_default().insert(index);
    }

    /// Puts commits of an unfinished request back into the pending set
    pub(crate) fn put_back(&self, root: &Root, commits: &HashSet<CommitIndex>) {
        for &index in commits {
            self.mark_for_indexing(index, root);
        }
    }

    pub(crate) fn schedule_index(self: &Arc<Self>, full: bool) {
        for request in self.take_requests(full) {
            self.controller.request(request);
        }
    }

    /// Swaps out the pending set and builds one request per root that is
    /// not big; commits of big roots stay pending
    fn take_requests(self: &Arc<Self>, full: bool) -> Vec<IndexingRequest> {
        if self.disposed.load(Ordering::SeqCst) {
            return Vec::new();
        }
        let Some(storage) = &self.storage else { return Vec::new() };

        let mut pending = self.pending();
        if pending.is_empty() {
            return Vec::new();
        }
        // A fresh index waits for the complete log and indexes it in one go
        if storage.is_fresh() && !full {
            return Vec::new();
        }

        let commits_to_index = mem::take(&mut *pending);
        let is_full = full && storage.is_fresh();
        if is_full {
            log::debug!(
                "Index storage for project {} is fresh, scheduling full reindex",
                self.project_name
            );
        }

        let mut requests = Vec::new();
        for (root, commits) in commits_to_index {
            if commits.is_empty() {
                continue;
            }
            if self.big_list.is_big(&root) {
                log::info!("Indexing repository {} is skipped since it is too big", root.name());
                pending.insert(root, commits);
                continue;
            }
            self.budget.task_started(&root);
            requests.push(IndexingRequest::new(Arc::downgrade(self), root, commits, is_full));
        }

        if is_full {
            self.collector.report_fresh_index();
            storage.unmark_fresh();
        }
        requests
    }

    pub(crate) fn is_commit_indexed(&self, index: CommitIndex) -> bool {
        let Some(storage) = &self.storage else { return true };
        match storage.is_indexed(index) {
            Ok(indexed) => indexed,
            Err(e) => {
                self.fatal.consume(SOURCE, &e);
                false
            }
        }
    }

    pub(crate) fn is_root_indexed(&self, root: &Root) -> bool {
        if !self.is_indexing_enabled(root) {
            return false;
        }
        let pending = self.pending();
        pending.get(root).map_or(true, HashSet::is_empty) && self.budget.tasks(root) == 0
    }

    pub(crate) fn is_indexing_enabled(&self, root: &Root) -> bool {
        self.storage.is_some() && self.roots.contains(root) && !self.big_list.is_big(root)
    }

    /// Writes every record of `detail`; failures go to the fatal handler
    pub(crate) fn store_detail(&self, detail: &CommitDetail) {
        let Some(storage) = &self.storage else { return };
        if let Err(e) = self.try_store_detail(storage, detail) {
            self.fatal.consume(SOURCE, &e);
        }
    }

    fn try_store_detail(&self, storage: &IndexStorage, detail: &CommitDetail) -> Result<()> {
        let index = self.resolver.commit_index(&detail.hash, &detail.root)?;
        let parents = detail
            .parents
            .iter()
            .map(|parent| self.resolver.commit_index(parent, &detail.root))
            .collect::<Result<Vec<_>>>()?;
        storage.store_detail(index, detail, &parents)
    }

    pub(crate) fn flush(&self) {
        if let Some(storage) = &self.storage {
            match storage.flush() {
                Ok(()) => self.collector.report_flush(),
                Err(e) => self.fatal.consume(SOURCE, &e.into()),
            }
        }
    }

    pub(crate) fn show_indexing_notification(&self, root: &Root, limit_minutes: u32) {
        self.collector.report_too_long_notification();
        let vcs_name = self
            .indexers
            .get(root)
            .map_or("Vcs", |indexer| indexer.supported_vcs());
        let notification = PauseNotification::new(
            vcs_name,
            root.clone(),
            limit_minutes,
            Arc::clone(&self.big_list),
            Arc::clone(&self.collector),
        );
        self.notifier.notify_paused(notification);
    }
}
