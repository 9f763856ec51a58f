//! Persistent commit hash <-> commit index mapping

use anyhow::{Context, Result};
use vcslog_core::{CommitId, CommitIdResolver, CommitIndex, Root};

use crate::codec::Enumerator;
use crate::storage_id::StorageId;

/// Storage kind under which commit id directories live
pub const COMMIT_ID_KIND: &str = "storage";

/// Sled-backed [`CommitIdResolver`] handing out dense commit indices
pub struct CommitIdStorage {
    commits: Enumerator,
    db: sled::Db,
}

fn commit_key(hash: &str, root: &Root) -> Result<Vec<u8>> {
    bincode::serialize(&CommitId::new(hash, root.clone())).context("Failed to serialize commit id")
}

impl CommitIdStorage {
    pub fn open(id: &StorageId) -> Result<Self> {
        if let Err(e) = id.cleanup_stale_versions() {
            log::warn!("Could not remove old commit id versions in {:?}: {}", id.subdir(), e);
        }
        let dir = id.storage_dir();
        let db = sled::open(&dir).with_context(|| format!("Failed to open commit id storage at {:?}", dir))?;
        let commits = Enumerator::open(&db, "commits")?;
        Ok(Self { commits, db })
    }

    /// Index of `hash` in `root` if it was ever enumerated
    pub fn find_index(&self, hash: &str, root: &Root) -> Result<Option<CommitIndex>> {
        self.commits.try_enumerate(&commit_key(hash, root)?)
    }

    pub fn len(&self) -> usize {
        self.commits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn flush(&self) -> Result<()> {
        self.commits.flush()?;
        self.db.flush().context("Failed to flush commit id storage")?;
        Ok(())
    }
}

impl CommitIdResolver for CommitIdStorage {
    fn commit_index(&self, hash: &str, root: &Root) -> Result<CommitIndex> {
        self.commits.enumerate(&commit_key(hash, root)?)
    }

    fn commit_id(&self, index: CommitIndex) -> Result<Option<CommitId>> {
        match self.commits.key_of(index)? {
            Some(bytes) => Ok(Some(
                bincode::deserialize(&bytes).context("Failed to deserialize commit id")?,
            )),
            None => Ok(None),
        }
    }
}
