//! User-facing notification about paused indexing

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use vcslog_core::{Root, Subscription};

use crate::big_repositories::{BigRepositoriesList, BigRepositoryEvent};
use crate::collector::IndexCollector;
use crate::formatting::format_minutes;

pub const RESUME_ACTION: &str = "Resume";
pub const HELP_ACTION: &str = "Why is it helpful?";

/// Receives pause notifications. Delivery may be deferred; the engine never
/// waits for it.
pub trait IndexingNotifier: Send + Sync {
    fn notify_paused(&self, notification: PauseNotification);
}

/// Pause of one root, with a resume action.
///
/// Expires as soon as the root leaves the big repositories list, whoever
/// removed it.
pub struct PauseNotification {
    vcs_name: String,
    root: Root,
    limit_minutes: u32,
    big_list: Arc<BigRepositoriesList>,
    collector: Arc<IndexCollector>,
    expired: Arc<AtomicBool>,
    _subscription: Subscription,
}

impl PauseNotification {
    pub(crate) fn new(
        vcs_name: &str,
        root: Root,
        limit_minutes: u32,
        big_list: Arc<BigRepositoriesList>,
        collector: Arc<IndexCollector>,
    ) -> Self {
        let expired = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&expired);
        let watched = root.clone();
        let subscription = big_list.subscribe(move |event| {
            if let BigRepositoryEvent::Removed(removed) = event {
                if *removed == watched {
                    flag.store(true, Ordering::SeqCst);
                }
            }
        });

        let vcs_name = if vcs_name.is_empty() { "Vcs" } else { vcs_name };
        Self {
            vcs_name: vcs_name.to_string(),
            root,
            limit_minutes,
            big_list,
            collector,
            expired,
            _subscription: subscription,
        }
    }

    pub fn root(&self) -> &Root {
        &self.root
    }

    pub fn limit_minutes(&self) -> u32 {
        self.limit_minutes
    }

    pub fn content(&self) -> String {
        format!(
            "{} Log indexing was paused for '{}' as it took more than {}",
            self.vcs_name,
            self.root.name(),
            format_minutes(self.limit_minutes)
        )
    }

    pub fn actions(&self) -> [&'static str; 2] {
        [RESUME_ACTION, HELP_ACTION]
    }

    pub fn help_text(&self) -> String {
        format!(
            "Indexing speeds up search and other operations in {} Log and in File History. \
             Old style File History is shown if no index is available.",
            self.vcs_name
        )
    }

    /// Takes the root off the big list; the engine then schedules its
    /// pending commits again. Returns false if it was already resumed.
    pub fn resume(&self) -> bool {
        self.collector.report_resume_click();
        log::info!("Resuming indexing for {}", self.root.name());
        self.big_list.remove_repository(&self.root)
    }

    pub fn is_expired(&self) -> bool {
        self.expired.load(Ordering::SeqCst) || !self.big_list.is_big(&self.root)
    }
}

impl fmt::Debug for PauseNotification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PauseNotification")
            .field("root", &self.root)
            .field("limit_minutes", &self.limit_minutes)
            .field("expired", &self.is_expired())
            .finish()
    }
}

/// Notifier that only writes the notification to the log
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingNotifier;

impl IndexingNotifier for LoggingNotifier {
    fn notify_paused(&self, notification: PauseNotification) {
        log::warn!("{}", notification.content());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn paused(root: &Root) -> (PauseNotification, Arc<BigRepositoriesList>, Arc<IndexCollector>) {
        let list = Arc::new(BigRepositoriesList::new());
        let collector = Arc::new(IndexCollector::new());
        list.add_repository(root.clone());
        let notification =
            PauseNotification::new("Git", root.clone(), 120, Arc::clone(&list), Arc::clone(&collector));
        (notification, list, collector)
    }

    #[test]
    fn test_content() {
        let root = Root::new("/work/monorepo");
        let (notification, _, _) = paused(&root);
        assert_eq!(
            notification.content(),
            "Git Log indexing was paused for 'monorepo' as it took more than 2 hours"
        );
        assert_eq!(notification.actions(), ["Resume", "Why is it helpful?"]);
        assert!(notification.help_text().contains("Git Log"));
    }

    #[test]
    fn test_resume_removes_root_and_expires() {
        let root = Root::new("/work/monorepo");
        let (notification, list, collector) = paused(&root);
        assert!(!notification.is_expired());

        assert!(notification.resume());
        assert!(!list.is_big(&root));
        assert!(notification.is_expired());
        assert_eq!(collector.statistics().resumed, 1);

        assert!(!notification.resume());
    }

    #[test]
    fn test_external_removal_expires() {
        let root = Root::new("/work/monorepo");
        let (notification, list, _) = paused(&root);
        list.remove_repository(&root);
        assert!(notification.is_expired());
    }

    #[test]
    fn test_unknown_vcs_name() {
        let list = Arc::new(BigRepositoriesList::new());
        let notification =
            PauseNotification::new("", Root::new("/r"), 5, list, Arc::new(IndexCollector::new()));
        assert!(notification.content().starts_with("Vcs Log indexing"));
    }
}
