//! User index: author identities and the commits they wrote

use anyhow::{Context, Result};
use std::collections::HashSet;
use vcslog_core::{CommitDetail, CommitIndex, VcsUser};

use crate::codec::{composite_key, decode_u32, flush_tree, index_key, suffix_index, Enumerator};

pub struct UserIndex {
    users: Enumerator,
    authors: sled::Tree,
    user_commits: sled::Tree,
}

impl UserIndex {
    pub(crate) fn open(db: &sled::Db) -> Result<Self> {
        Ok(Self {
            users: Enumerator::open(db, "users")?,
            authors: db.open_tree("authors").context("Failed to open authors tree")?,
            user_commits: db
                .open_tree("user_commits")
                .context("Failed to open user_commits tree")?,
        })
    }

    /// Records the author of commit `index`
    pub fn update(&self, index: CommitIndex, detail: &CommitDetail) -> Result<()> {
        let user_id = self.get_user_id(&detail.author)?;
        self.authors
            .insert(index_key(index), &user_id.to_be_bytes()[..])
            .context("Failed to store commit author")?;
        self.user_commits
            .insert(composite_key(&user_id.to_be_bytes(), index), &[] as &[u8])
            .context("Failed to store user commit")?;
        Ok(())
    }

    /// Returns the id of `user`, enumerating it on first sight
    pub fn get_user_id(&self, user: &VcsUser) -> Result<u32> {
        let key = bincode::serialize(user).context("Failed to serialize user")?;
        self.users.enumerate(&key)
    }

    pub fn user(&self, id: u32) -> Result<Option<VcsUser>> {
        match self.users.key_of(id)? {
            Some(bytes) => Ok(Some(
                bincode::deserialize(&bytes).context("Failed to deserialize user")?,
            )),
            None => Ok(None),
        }
    }

    pub fn author_of(&self, index: CommitIndex) -> Result<Option<VcsUser>> {
        match self.authors.get(index_key(index))? {
            Some(bytes) => self.user(decode_u32(&bytes)?),
            None => Ok(None),
        }
    }

    /// Commits authored by any of `users`; unknown users match nothing
    pub fn commits_for_users(&self, users: &[VcsUser]) -> Result<HashSet<CommitIndex>> {
        let mut result = HashSet::new();
        for user in users {
            let key = bincode::serialize(user).context("Failed to serialize user")?;
            let Some(user_id) = self.users.try_enumerate(&key)? else { continue };
            for item in self.user_commits.scan_prefix(user_id.to_be_bytes()) {
                let (key, _) = item.context("Failed to read user commits")?;
                result.insert(suffix_index(&key)?);
            }
        }
        Ok(result)
    }

    /// Every known user whose name or email contains `text`, case-insensitively
    pub fn find_users(&self, text: &str) -> Result<Vec<VcsUser>> {
        let needle = text.to_lowercase();
        let mut found = Vec::new();
        for key in self.users.keys() {
            let user: VcsUser = bincode::deserialize(&key?).context("Failed to deserialize user")?;
            if user.name.to_lowercase().contains(&needle) || user.email.to_lowercase().contains(&needle) {
                found.push(user);
            }
        }
        Ok(found)
    }

    pub fn user_count(&self) -> usize {
        self.users.len()
    }

    pub fn flush(&self) -> Result<()> {
        self.users.flush()?;
        flush_tree(&self.authors)?;
        flush_tree(&self.user_commits)
    }
}
