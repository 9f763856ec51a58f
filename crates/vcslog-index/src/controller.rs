//! Single background slot that drains queued requests in order

use std::collections::VecDeque;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use vcslog_core::{ProgressIndicator, VcsError};

use crate::executor::BackgroundExecutor;
use crate::priority::LoweredPriority;

/// Unit of work run by a [`SingleTaskController`]
pub(crate) trait Request: Send + 'static {
    /// Returning [`VcsError::Cancelled`] stops the whole run; any other error
    /// is logged and the next request runs.
    fn run(&self, indicator: &ProgressIndicator) -> anyhow::Result<()>;
}

struct State<R> {
    queue: VecDeque<R>,
    running: Option<ProgressIndicator>,
    closed: bool,
}

struct Shared<R> {
    name: String,
    executor: Arc<dyn BackgroundExecutor>,
    state: Mutex<State<R>>,
    idle: Condvar,
}

/// Runs at most one background task at a time.
///
/// [`request`](Self::request) only queues while a task is running; the task
/// pops requests FIFO until the queue is empty, then reports completion,
/// which starts a new task if requests arrived in the meantime.
pub(crate) struct SingleTaskController<R> {
    shared: Arc<Shared<R>>,
}

impl<R: Request> SingleTaskController<R> {
    pub(crate) fn new(name: &str, executor: Arc<dyn BackgroundExecutor>) -> Self {
        Self {
            shared: Arc::new(Shared {
                name: name.to_string(),
                executor,
                state: Mutex::new(State {
                    queue: VecDeque::new(),
                    running: None,
                    closed: false,
                }),
                idle: Condvar::new(),
            }),
        }
    }

    pub(crate) fn request(&self, request: R) {
        let start = {
            let mut state = self.shared.lock();
            if state.closed {
                return;
            }
            state.queue.push_back(request);
            Shared::claim_slot(&mut *state)
        };
        if let Some(indicator) = start {
            self.shared.start(indicator);
        }
    }

    pub(crate) fn is_running(&self) -> bool {
        self.shared.lock().running.is_some()
    }

    pub(crate) fn queued(&self) -> usize {
        self.shared.lock().queue.len()
    }

    /// Blocks until no task is running; false if `timeout` elapsed first
    pub(crate) fn wait_for_idle(&self, timeout: Option<Duration>) -> bool {
        let state = self.shared.lock();
        match timeout {
            Some(timeout) => {
                let (state, _) = self
                    .shared
                    .idle
                    .wait_timeout_while(state, timeout, |state| state.running.is_some())
                    .unwrap_or_else(PoisonError::into_inner);
                state.running.is_none()
            }
            None => {
                let _state = self
                    .shared
                    .idle
                    .wait_while(state, |state| state.running.is_some())
                    .unwrap_or_else(PoisonError::into_inner);
                true
            }
        }
    }

    /// Drops queued requests, cancels the running task and refuses new work
    pub(crate) fn dispose(&self) {
        let mut state = self.shared.lock();
        state.closed = true;
        state.queue.clear();
        if let Some(indicator) = &state.running {
            indicator.cancel();
        }
    }
}

impl<R: Request> Shared<R> {
    fn lock(&self) -> MutexGuard<'_, State<R>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Marks the slot busy if it is free and there is something to run
    fn claim_slot(state: &mut State<R>) -> Option<ProgressIndicator> {
        if state.running.is_some() || state.closed || state.queue.is_empty() {
            return None;
        }
        let indicator = ProgressIndicator::new();
        state.running = Some(indicator.clone());
        Some(indicator)
    }

    fn start(self: &Arc<Self>, indicator: ProgressIndicator) {
        let shared = Arc::clone(self);
        let result = self.executor.execute(
            &self.name,
            indicator,
            Box::new(move |indicator: ProgressIndicator| shared.run_loop(&indicator)),
        );

        if let Err(e) = result {
            log::error!("Could not start {}: {:#}", self.name, e);
            self.lock().running = None;
            self.idle.notify_all();
        }
    }

    fn pop(&self) -> Option<R> {
        self.lock().queue.pop_front()
    }

    fn run_loop(self: &Arc<Self>, indicator: &ProgressIndicator) {
        {
            let _priority = LoweredPriority::lower();
            while !indicator.is_canceled() {
                let Some(request) = self.pop() else { break };

                match panic::catch_unwind(AssertUnwindSafe(|| request.run(indicator))) {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) if is_cancelled(&e) => {
                        log::debug!("{} was cancelled", self.name);
                        break;
                    }
                    Ok(Err(e)) => log::error!("Error while running {}: {:#}", self.name, e),
                    Err(_) => log::error!("Request of {} panicked", self.name),
                }
            }
        }
        self.task_completed();
    }

    fn task_completed(self: &Arc<Self>) {
        let restart = {
            let mut state = self.lock();
            state.running = None;
            Self::claim_slot(&mut *state)
        };
        match restart {
            Some(indicator) => self.start(indicator),
            None => self.idle.notify_all(),
        }
    }
}

fn is_cancelled(error: &anyhow::Error) -> bool {
    error
        .downcast_ref::<VcsError>()
        .is_some_and(VcsError::is_cancelled)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::HeavyAwareExecutor;
    use std::sync::atomic::{AtomicUsize, Ordering};

    enum Step {
        Record(usize),
        Fail,
        Panic,
        Cancel,
    }

    struct TestRequest {
        step: Step,
        log: Arc<Mutex<Vec<usize>>>,
        concurrent: Arc<AtomicUsize>,
        max_concurrent: Arc<AtomicUsize>,
    }

    impl Request for TestRequest {
        fn run(&self, indicator: &ProgressIndicator) -> anyhow::Result<()> {
            let now = self.concurrent.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_concurrent.fetch_max(now, Ordering::SeqCst);
            std::thread::sleep(Duration::from_millis(2));
            self.concurrent.fetch_sub(1, Ordering::SeqCst);

            match self.step {
                Step::Record(n) => {
                    self.log.lock().unwrap().push(n);
                    Ok(())
                }
                Step::Fail => anyhow::bail!("broken request"),
                Step::Panic => panic!("request blew up"),
                Step::Cancel => {
                    indicator.cancel();
                    Err(VcsError::Cancelled.into())
                }
            }
        }
    }

    struct Fixture {
        controller: SingleTaskController<TestRequest>,
        log: Arc<Mutex<Vec<usize>>>,
        concurrent: Arc<AtomicUsize>,
        max_concurrent: Arc<AtomicUsize>,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                controller: SingleTaskController::new("test indexing", Arc::new(HeavyAwareExecutor::default())),
                log: Arc::new(Mutex::new(Vec::new())),
                concurrent: Arc::new(AtomicUsize::new(0)),
                max_concurrent: Arc::new(AtomicUsize::new(0)),
            }
        }

        fn request(&self, step: Step) {
            self.controller.request(TestRequest {
                step,
                log: Arc::clone(&self.log),
                concurrent: Arc::clone(&self.concurrent),
                max_concurrent: Arc::clone(&self.max_concurrent),
            });
        }

        fn settle(&self) {
            // A finished task may restart itself, so wait until nothing is queued either
            for _ in 0..500 {
                assert!(self.controller.wait_for_idle(Some(Duration::from_secs(10))));
                if self.controller.queued() == 0 && !self.controller.is_running() {
                    return;
                }
                std::thread::sleep(Duration::from_millis(2));
            }
            panic!("controller never settled");
        }
    }

    #[test]
    fn test_requests_run_in_order_one_at_a_time() {
        let fixture = Fixture::new();
        for n in 0..20 {
            fixture.request(Step::Record(n));
        }
        fixture.settle();

        assert_eq!(*fixture.log.lock().unwrap(), (0..20).collect::<Vec<_>>());
        assert_eq!(fixture.max_concurrent.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_failing_request_does_not_stop_the_rest() {
        let fixture = Fixture::new();
        fixture.request(Step::Record(1));
        fixture.request(Step::Fail);
        fixture.request(Step::Panic);
        fixture.request(Step::Record(2));
        fixture.settle();

        assert_eq!(*fixture.log.lock().unwrap(), vec![1, 2]);
    }

    #[test]
    fn test_cancellation_leaves_rest_for_next_run() {
        let fixture = Fixture::new();
        fixture.request(Step::Cancel);
        fixture.request(Step::Record(7));
        fixture.settle();

        // The cancelled run stopped early; completion restarted a run for the queued request
        assert_eq!(*fixture.log.lock().unwrap(), vec![7]);
    }

    #[test]
    fn test_disposed_controller_ignores_requests() {
        let fixture = Fixture::new();
        fixture.controller.dispose();
        fixture.request(Step::Record(1));
        assert!(fixture.controller.wait_for_idle(Some(Duration::from_secs(1))));
        assert!(fixture.log.lock().unwrap().is_empty());
        assert_eq!(fixture.controller.queued(), 0);
    }
}
