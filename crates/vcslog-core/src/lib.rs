//! VcsLog Core - Shared data model and collaborator contracts
//!
//! This crate defines the types passed between the storage layer, the
//! indexing engine and VCS backends: roots, commit identities and details,
//! the cancellation token used by background work, and listener lists.

mod error;
mod listeners;
mod models;
mod progress;
mod provider;

pub use error::{BackendError, VcsError};
pub use listeners::{Listeners, Subscription};
pub use models::{ChangeKind, ChangedPath, CommitDetail, CommitId, CommitIndex, Root, VcsUser};
pub use progress::ProgressIndicator;
pub use provider::{
    CommitIdResolver, DetailConsumer, FatalErrorHandler, LoggingFatalErrorHandler, PathsEncoder,
    VcsLogIndexer, VcsLogProvider,
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_root_name_is_last_component() {
        let root = Root::new("/home/dev/projects/kernel");
        assert_eq!(root.name(), "kernel");
        assert_eq!(root.to_string(), "/home/dev/projects/kernel");
    }

    #[test]
    fn test_commit_id_short_hash() {
        let id = CommitId::new("0123456789abcdef", Root::new("/repo"));
        assert_eq!(id.short_hash(), "01234567");
        assert_eq!(id.to_string(), "01234567 in repo");

        let short = CommitId::new("abc", Root::new("/repo"));
        assert_eq!(short.short_hash(), "abc");
    }
}
