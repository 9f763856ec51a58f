//! Collaborator contracts the index depends on but does not own

use anyhow::Result;
use std::sync::Arc;

use crate::error::VcsError;
use crate::models::{CommitDetail, CommitId, CommitIndex, Root};

/// Per-commit callback of a streaming read.
///
/// Returning an error stops the read; the reader must propagate it unchanged
/// so that [`VcsError::Cancelled`] reaches the caller.
pub type DetailConsumer<'a> = dyn FnMut(CommitDetail) -> Result<(), VcsError> + 'a;

/// Maps a root-relative path to a dense path id
pub trait PathsEncoder: Send + Sync {
    fn encode(&self, root: &Root, path: &str) -> Result<u32>;
}

/// Reads full commit details out of a VCS backend
pub trait VcsLogIndexer: Send + Sync {
    /// Display name of the VCS, e.g. "Git"
    fn supported_vcs(&self) -> &str;

    /// Delivers the details of the given commits, in any order
    fn read_full_details(
        &self,
        root: &Root,
        hashes: &[String],
        encoder: &dyn PathsEncoder,
        consumer: &mut DetailConsumer<'_>,
    ) -> Result<(), VcsError>;

    /// Streams every commit reachable in `root`
    fn read_all_full_details(
        &self,
        root: &Root,
        encoder: &dyn PathsEncoder,
        consumer: &mut DetailConsumer<'_>,
    ) -> Result<(), VcsError>;
}

/// A VCS integration for one root; roots whose provider has no indexer are
/// never indexed.
pub trait VcsLogProvider: Send + Sync {
    fn indexer(&self) -> Option<Arc<dyn VcsLogIndexer>>;
}

/// Authority over the commit hash <-> [`CommitIndex`] mapping
pub trait CommitIdResolver: Send + Sync {
    /// Returns the index of `hash` in `root`, assigning a new one if needed
    fn commit_index(&self, hash: &str, root: &Root) -> Result<CommitIndex>;

    fn commit_id(&self, index: CommitIndex) -> Result<Option<CommitId>>;
}

/// Receives unrecoverable errors; the reporter keeps running in degraded mode
pub trait FatalErrorHandler: Send + Sync {
    fn consume(&self, source: &str, error: &anyhow::Error);
}

/// Fatal error handler that only logs
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingFatalErrorHandler;

impl FatalErrorHandler for LoggingFatalErrorHandler {
    fn consume(&self, source: &str, error: &anyhow::Error) {
        log::error!("{}: {:#}", source, error);
    }
}
