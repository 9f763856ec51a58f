//! Lowered scheduling priority for the indexing thread

use thread_priority::{get_current_thread_priority, set_current_thread_priority, ThreadPriority};

/// Drops the current thread to the minimum priority until dropped.
///
/// Failing to change the priority is not an error: the work just runs at
/// whatever priority the thread already had.
pub(crate) struct LoweredPriority {
    previous: Option<ThreadPriority>,
}

impl LoweredPriority {
    pub(crate) fn lower() -> Self {
        let previous = match get_current_thread_priority() {
            Ok(priority) => Some(priority),
            Err(e) => {
                log::debug!("Could not read indexing thread priority: {:?}", e);
                None
            }
        };

        match set_current_thread_priority(ThreadPriority::Min) {
            Ok(()) => Self { previous },
            Err(e) => {
                log::debug!("Could not set indexing thread priority: {:?}", e);
                Self { previous: None }
            }
        }
    }
}

impl Drop for LoweredPriority {
    fn drop(&mut self) {
        if let Some(previous) = self.previous.take() {
            if let Err(e) = set_current_thread_priority(previous) {
                log::debug!("Could not restore indexing thread priority: {:?}", e);
            }
        }
    }
}
