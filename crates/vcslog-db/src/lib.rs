//! VcsLog DB - Persistent storage layer of the commit history index
//!
//! Everything lives in sled trees keyed by commit index:
//! - the commit set, whose membership marks a commit as fully indexed
//! - messages, parent lists, committers and timestamps
//! - trigram, user and path sub-indices
//!
//! Storage directories are versioned through [`StorageId`]; a version bump
//! leaves the old directory stale and it is removed on the next open.

mod codec;
mod commit_ids;
mod error;
mod paths;
mod storage;
mod storage_id;
mod trigrams;
mod users;

pub use commit_ids::{CommitIdStorage, COMMIT_ID_KIND};
pub use error::StorageError;
pub use paths::PathsIndex;
pub use storage::{IndexStorage, INDEX_KIND};
pub use storage_id::StorageId;
pub use trigrams::{trigrams, TrigramIndex};
pub use users::UserIndex;
