//! Per-root indexing time accounting
//!
//! Every root carries its in-flight task count, the wall-clock time spent
//! indexing it since it was last caught up, and a time limit. The limit grows
//! each time it trips, so a resumed root gets a proportionally longer run.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, AtomicU64, AtomicUsize, Ordering};
use std::time::{Duration, Instant};
use vcslog_core::Root;

const MINUTE_MS: u64 = 60_000;

/// Monotonic millisecond source
pub trait Clock: Send + Sync {
    fn now_millis(&self) -> u64;
}

#[derive(Debug)]
pub struct SystemClock {
    origin: Instant,
}

impl Default for SystemClock {
    fn default() -> Self {
        Self { origin: Instant::now() }
    }
}

impl Clock for SystemClock {
    fn now_millis(&self) -> u64 {
        self.origin.elapsed().as_millis() as u64
    }
}

/// Clock that only moves when told to
#[derive(Debug, Default)]
pub struct ManualClock {
    millis: AtomicU64,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance(&self, by: Duration) {
        self.millis.fetch_add(by.as_millis() as u64, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_millis(&self) -> u64 {
        self.millis.load(Ordering::SeqCst)
    }
}

#[derive(Debug)]
struct RootBudget {
    tasks: AtomicUsize,
    indexing_time: AtomicU64,
    limit_minutes: AtomicU32,
}

#[derive(Debug)]
pub(crate) struct IndexingBudget {
    base_limit: u32,
    roots: HashMap<Root, RootBudget>,
}

impl IndexingBudget {
    pub(crate) fn new<'a>(roots: impl IntoIterator<Item = &'a Root>, base_limit: u32) -> Self {
        let base_limit = base_limit.max(1);
        let roots = roots
            .into_iter()
            .map(|root| {
                let budget = RootBudget {
                    tasks: AtomicUsize::new(0),
                    indexing_time: AtomicU64::new(0),
                    limit_minutes: AtomicU32::new(base_limit),
                };
                (root.clone(), budget)
            })
            .collect();
        Self { base_limit, roots }
    }

    pub(crate) fn task_started(&self, root: &Root) {
        if let Some(budget) = self.roots.get(root) {
            budget.tasks.fetch_add(1, Ordering::SeqCst);
        }
    }

    pub(crate) fn task_finished(&self, root: &Root) {
        if let Some(budget) = self.roots.get(root) {
            let _ = budget
                .tasks
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
        }
    }

    pub(crate) fn tasks(&self, root: &Root) -> usize {
        self.roots
            .get(root)
            .map_or(0, |budget| budget.tasks.load(Ordering::SeqCst))
    }

    pub(crate) fn add_time(&self, root: &Root, millis: u64) {
        if let Some(budget) = self.roots.get(root) {
            budget.indexing_time.fetch_add(millis, Ordering::SeqCst);
        }
    }

    /// Returns the accumulated time and starts over from zero
    pub(crate) fn take_time(&self, root: &Root) -> u64 {
        self.roots
            .get(root)
            .map_or(0, |budget| budget.indexing_time.swap(0, Ordering::SeqCst))
    }

    pub(crate) fn indexing_time(&self, root: &Root) -> u64 {
        self.roots
            .get(root)
            .map_or(0, |budget| budget.indexing_time.load(Ordering::SeqCst))
    }

    pub(crate) fn limit_minutes(&self, root: &Root) -> u32 {
        self.roots
            .get(root)
            .map_or(self.base_limit, |budget| budget.limit_minutes.load(Ordering::SeqCst))
    }

    /// True once `elapsed_ms` reached `limit` minutes
    pub(crate) fn exceeded(limit: u32, elapsed_ms: u64) -> bool {
        elapsed_ms >= u64::from(limit.max(1)) * MINUTE_MS
    }

    /// Raises the limit that tripped at `elapsed_ms` to the next multiple of
    /// the base limit past it, and by at least one base limit.
    ///
    /// Does nothing if the limit changed since `tripped` was read.
    pub(crate) fn raise_limit(&self, root: &Root, tripped: u32, elapsed_ms: u64) {
        let Some(budget) = self.roots.get(root) else { return };
        let base = u64::from(self.base_limit);
        let multiples = elapsed_ms / (base * MINUTE_MS) + 1;
        let raised = u64::from(tripped.saturating_add(self.base_limit)).max(multiples * base);
        let raised = u32::try_from(raised).unwrap_or(u32::MAX);
        let _ = budget
            .limit_minutes
            .compare_exchange(tripped, raised, Ordering::SeqCst, Ordering::SeqCst);
    }
}
