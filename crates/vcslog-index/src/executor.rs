//! Background execution that stays out of the way of heavy activity

use anyhow::{Context, Result};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use vcslog_core::ProgressIndicator;

/// Work handed to a [`BackgroundExecutor`]
pub type BackgroundTask = Box<dyn FnOnce(ProgressIndicator) + Send + 'static>;

/// Runs one task off the calling thread
pub trait BackgroundExecutor: Send + Sync {
    fn execute(&self, name: &str, indicator: ProgressIndicator, task: BackgroundTask) -> Result<()>;
}

/// Tells whether the host is busy with something more important
pub trait LoadMonitor: Send + Sync {
    /// True during heavy activity or in power save mode
    fn is_heavy(&self) -> bool;
}

/// Monitor of a host that is never busy
#[derive(Debug, Default, Clone, Copy)]
pub struct IdleLoadMonitor;

impl LoadMonitor for IdleLoadMonitor {
    fn is_heavy(&self) -> bool {
        false
    }
}

/// Spawns a named thread per task; the thread waits while the
/// [`LoadMonitor`] reports heavy activity and the task was not cancelled.
pub struct HeavyAwareExecutor {
    monitor: Arc<dyn LoadMonitor>,
    poll_interval: Duration,
}

impl HeavyAwareExecutor {
    pub fn new(monitor: Arc<dyn LoadMonitor>) -> Self {
        Self {
            monitor,
            poll_interval: Duration::from_millis(100),
        }
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }
}

impl Default for HeavyAwareExecutor {
    fn default() -> Self {
        Self::new(Arc::new(IdleLoadMonitor))
    }
}

impl BackgroundExecutor for HeavyAwareExecutor {
    fn execute(&self, name: &str, indicator: ProgressIndicator, task: BackgroundTask) -> Result<()> {
        let monitor = Arc::clone(&self.monitor);
        let poll_interval = self.poll_interval;
        let thread_name = name.to_string();

        thread::Builder::new()
            .name(name.to_string())
            .spawn(move || {
                let mut waited = false;
                while monitor.is_heavy() && !indicator.is_canceled() {
                    if !waited {
                        log::debug!("{} is waiting for heavy activity to end", thread_name);
                        waited = true;
                    }
                    thread::sleep(poll_interval);
                }
                task(indicator);
            })
            .with_context(|| format!("Failed to spawn {} thread", name))?;
        Ok(())
    }
}
