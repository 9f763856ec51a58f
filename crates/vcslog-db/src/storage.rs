//! Index storage: every structure persisted for indexed commits

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use vcslog_core::{CommitDetail, CommitIndex};

use crate::codec::{decode_u32, flush_tree, index_key};
use crate::error::StorageError;
use crate::paths::PathsIndex;
use crate::storage_id::StorageId;
use crate::trigrams::TrigramIndex;
use crate::users::UserIndex;

/// Storage kind under which index directories live
pub const INDEX_KIND: &str = "index";

const COMMITS: &str = "commits";
const MESSAGES: &str = "messages";
const PARENTS: &str = "parents";
const COMMITTERS: &str = "committers";
const TIMESTAMPS: &str = "timestamps";
const META: &str = "meta";
const VERSION_KEY: &str = "version";
const CORRUPTION_MARKER: &str = "commits.corrupted";

/// Persistent per-commit records for one log.
///
/// A commit counts as indexed only once it is in the commit set, and the
/// commit set entry is always the last write for a commit. A crash in the
/// middle of [`store_detail`](Self::store_detail) therefore never leaves a
/// commit looking indexed with partial data behind it.
pub struct IndexStorage {
    commits: sled::Tree,
    messages: sled::Tree,
    parents: sled::Tree,
    committers: sled::Tree,
    timestamps: sled::Tree,
    trigrams: TrigramIndex,
    users: UserIndex,
    paths: PathsIndex,
    fresh: AtomicBool,
    dir: PathBuf,
    /// Kept last so the trees above are released before the database
    db: sled::Db,
}

impl IndexStorage {
    /// Opens the storage for `id`, failing on any broken structure.
    ///
    /// Nothing stays open on failure: structures opened so far are dropped
    /// when the error is returned.
    pub fn open(id: &StorageId) -> Result<Self> {
        let dir = id.storage_dir();
        if dir.join(CORRUPTION_MARKER).exists() {
            return Err(StorageError::Corrupted(dir).into());
        }
        if let Err(e) = id.cleanup_stale_versions() {
            log::warn!("Could not remove old index versions in {:?}: {}", id.subdir(), e);
        }

        let existed = dir.exists();
        let db = sled::open(&dir).with_context(|| format!("Failed to open index storage at {:?}", dir))?;
        check_version(&db, id.version())?;

        let commits = db.open_tree(COMMITS).context("Failed to open commits tree")?;
        let messages = db.open_tree(MESSAGES).context("Failed to open messages tree")?;
        let trigrams = TrigramIndex::open(&db)?;
        let users = UserIndex::open(&db)?;
        let paths = PathsIndex::open(&db)?;
        let parents = db.open_tree(PARENTS).context("Failed to open parents tree")?;
        let committers = db.open_tree(COMMITTERS).context("Failed to open committers tree")?;
        let timestamps = db.open_tree(TIMESTAMPS).context("Failed to open timestamps tree")?;

        let fresh = !existed || commits.is_empty();
        log::debug!("Opened index storage at {:?} (fresh: {})", dir, fresh);

        Ok(Self {
            commits,
            messages,
            parents,
            committers,
            timestamps,
            trigrams,
            users,
            paths,
            fresh: AtomicBool::new(fresh),
            dir,
            db,
        })
    }

    /// Opens the storage; if it is broken, wipes every file of `id` and tries once more.
    ///
    /// Only corruption and version mismatches count as broken. Any other
    /// failure, such as the database being locked by another process, is
    /// returned as is and nothing is deleted.
    pub fn open_clean_or_reset_broken(id: &StorageId) -> Result<Self> {
        match Self::open(id) {
            Ok(storage) => Ok(storage),
            Err(e) if is_broken(&e) => {
                log::warn!("Index storage at {:?} is broken, resetting: {:#}", id.storage_dir(), e);
                Self::cleanup(id);
                Self::open(id)
            }
            Err(e) => Err(e),
        }
    }

    pub fn cleanup(id: &StorageId) {
        if !id.cleanup_all_storage_files() {
            log::error!(
                "Could not clean up storage files in {:?} starting with {}",
                id.subdir(),
                id.log_id()
            );
        }
    }

    /// Writes every record of one commit, commit set membership last
    pub fn store_detail(&self, index: CommitIndex, detail: &CommitDetail, parents: &[CommitIndex]) -> Result<()> {
        self.write_record(index, detail, parents)?;
        self.commits
            .insert(index_key(index), &[] as &[u8])
            .context("Failed to mark commit as indexed")?;
        Ok(())
    }

    fn write_record(&self, index: CommitIndex, detail: &CommitDetail, parents: &[CommitIndex]) -> Result<()> {
        let key = index_key(index);
        self.messages
            .insert(key, detail.full_message.as_bytes())
            .context("Failed to store message")?;
        self.trigrams.update(index, detail)?;
        self.users.update(index, detail)?;
        self.paths.update(index, detail)?;

        let encoded = bincode::serialize(parents).context("Failed to serialize parents")?;
        self.parents.insert(key, encoded).context("Failed to store parents")?;

        // Committer is only recorded when it differs from the author
        if detail.author != detail.committer {
            let committer = self.users.get_user_id(&detail.committer)?;
            self.committers
                .insert(key, &committer.to_be_bytes()[..])
                .context("Failed to store committer")?;
        }

        let mut times = [0u8; 16];
        times[..8].copy_from_slice(&detail.author_time.to_be_bytes());
        times[8..].copy_from_slice(&detail.commit_time.to_be_bytes());
        self.timestamps.insert(key, &times[..]).context("Failed to store timestamps")?;
        Ok(())
    }

    pub fn is_indexed(&self, index: CommitIndex) -> Result<bool> {
        Ok(self.commits.contains_key(index_key(index))?)
    }

    pub fn commit_count(&self) -> usize {
        self.commits.len()
    }

    pub fn full_message(&self, index: CommitIndex) -> Result<Option<String>> {
        Ok(self
            .messages
            .get(index_key(index))?
            .map(|bytes| String::from_utf8_lossy(&bytes).into_owned()))
    }

    /// Every stored message, in commit index order
    pub fn messages(&self) -> impl Iterator<Item = Result<(CommitIndex, String)>> + '_ {
        self.messages.iter().map(|item| {
            let (key, value) = item.context("Failed to read messages")?;
            Ok((decode_u32(&key)?, String::from_utf8_lossy(&value).into_owned()))
        })
    }

    pub fn parents(&self, index: CommitIndex) -> Result<Option<Vec<CommitIndex>>> {
        match self.parents.get(index_key(index))? {
            Some(bytes) => Ok(Some(
                bincode::deserialize(&bytes).context("Failed to deserialize parents")?,
            )),
            None => Ok(None),
        }
    }

    /// Committer user id, present only when the committer is not the author
    pub fn committer_id(&self, index: CommitIndex) -> Result<Option<u32>> {
        match self.committers.get(index_key(index))? {
            Some(bytes) => Ok(Some(decode_u32(&bytes)?)),
            None => Ok(None),
        }
    }

    /// `(author_time, commit_time)` in Unix seconds
    pub fn timestamps(&self, index: CommitIndex) -> Result<Option<(i64, i64)>> {
        let Some(bytes) = self.timestamps.get(index_key(index))? else { return Ok(None) };
        let times: [u8; 16] = bytes[..].try_into().context("Malformed timestamps")?;
        let mut author = [0u8; 8];
        let mut commit = [0u8; 8];
        author.copy_from_slice(&times[..8]);
        commit.copy_from_slice(&times[8..]);
        Ok(Some((i64::from_be_bytes(author), i64::from_be_bytes(commit))))
    }

    pub fn trigrams(&self) -> &TrigramIndex {
        &self.trigrams
    }

    pub fn users(&self) -> &UserIndex {
        &self.users
    }

    pub fn paths(&self) -> &PathsIndex {
        &self.paths
    }

    /// Forces every structure to disk.
    ///
    /// A failing structure does not stop the others from being flushed; all
    /// failures are collected into one [`StorageError::Flush`].
    pub fn flush(&self) -> Result<(), StorageError> {
        let results: [(&'static str, Result<()>); 8] = [
            (MESSAGES, flush_tree(&self.messages)),
            ("trigrams", self.trigrams.flush()),
            ("users", self.users.flush()),
            ("paths", self.paths.flush()),
            (PARENTS, flush_tree(&self.parents)),
            (COMMITS, flush_tree(&self.commits)),
            (COMMITTERS, flush_tree(&self.committers)),
            (TIMESTAMPS, flush_tree(&self.timestamps)),
        ];

        let mut failed = Vec::new();
        for (name, result) in results {
            if let Err(e) = result {
                log::warn!("Failed to flush {} in {:?}: {:#}", name, self.dir, e);
                failed.push(name);
            }
        }

        if failed.is_empty() {
            Ok(())
        } else {
            Err(StorageError::Flush { failed })
        }
    }

    /// Makes the next open treat this storage as absent and rebuild it
    pub fn mark_corrupted(&self) {
        let marker = self.dir.join(CORRUPTION_MARKER);
        if let Err(e) = fs::write(&marker, b"") {
            log::warn!("Could not mark index storage {:?} as corrupted: {}", self.dir, e);
        }
    }

    /// True until the first full indexing pass has been scheduled
    pub fn is_fresh(&self) -> bool {
        self.fresh.load(Ordering::SeqCst)
    }

    pub fn unmark_fresh(&self) {
        self.fresh.store(false, Ordering::SeqCst);
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Total on-disk size of the storage in bytes
    pub fn size_on_disk(&self) -> u64 {
        self.db.size_on_disk().unwrap_or(0)
    }
}

fn is_broken(error: &anyhow::Error) -> bool {
    error.chain().any(|cause| {
        matches!(
            cause.downcast_ref::<StorageError>(),
            Some(StorageError::Corrupted(_) | StorageError::VersionMismatch { .. })
        ) || matches!(cause.downcast_ref::<sled::Error>(), Some(sled::Error::Corruption { .. }))
    })
}

fn check_version(db: &sled::Db, expected: u32) -> Result<()> {
    let meta = db.open_tree(META).context("Failed to open meta tree")?;
    match meta.get(VERSION_KEY)? {
        Some(bytes) => {
            let found = decode_u32(&bytes)?;
            if found != expected {
                return Err(StorageError::VersionMismatch { expected, found }.into());
            }
        }
        None => {
            meta.insert(VERSION_KEY, &expected.to_be_bytes()[..])
                .context("Failed to record storage version")?;
        }
    }
    Ok(())
}
