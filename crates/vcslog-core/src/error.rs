//! Error types shared by VCS readers and the indexing engine

use crate::models::Root;

/// Boxed error coming from a VCS backend
pub type BackendError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Failures that can end a read of commit details
#[derive(Debug, thiserror::Error)]
pub enum VcsError {
    /// Cooperative cancellation was observed. Not a fault.
    #[error("operation was cancelled")]
    Cancelled,

    #[error("failed to read commit details in {root}: {source}")]
    Backend {
        root: Root,
        #[source]
        source: BackendError,
    },
}

impl VcsError {
    pub fn backend(root: &Root, source: impl Into<BackendError>) -> Self {
        Self::Backend {
            root: root.clone(),
            source: source.into(),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}
