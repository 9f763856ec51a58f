//! Path index: which commits touched which files

use anyhow::{Context, Result};
use std::collections::HashSet;
use vcslog_core::{ChangeKind, ChangedPath, CommitDetail, CommitIndex, PathsEncoder, Root};

use crate::codec::{composite_key, flush_tree, index_key, suffix_index, Enumerator};

/// `root \0 path`, so that equal relative paths in different roots get different ids
fn path_key(root: &Root, path: &str) -> Vec<u8> {
    let root = root.path().to_string_lossy();
    let mut key = Vec::with_capacity(root.len() + 1 + path.len());
    key.extend_from_slice(root.as_bytes());
    key.push(0);
    key.extend_from_slice(path.as_bytes());
    key
}

pub struct PathsIndex {
    paths: Enumerator,
    path_commits: sled::Tree,
    commit_paths: sled::Tree,
}

impl PathsIndex {
    pub(crate) fn open(db: &sled::Db) -> Result<Self> {
        Ok(Self {
            paths: Enumerator::open(db, "paths")?,
            path_commits: db
                .open_tree("path_commits")
                .context("Failed to open path_commits tree")?,
            commit_paths: db
                .open_tree("commit_paths")
                .context("Failed to open commit_paths tree")?,
        })
    }

    pub fn update(&self, index: CommitIndex, detail: &CommitDetail) -> Result<()> {
        let encoded = bincode::serialize(&detail.changes).context("Failed to serialize changes")?;
        self.commit_paths
            .insert(index_key(index), encoded)
            .context("Failed to store commit changes")?;

        for change in &detail.changes {
            let kind = bincode::serialize(&change.kind).context("Failed to serialize change kind")?;
            self.path_commits
                .insert(composite_key(&change.path_id.to_be_bytes(), index), kind)
                .context("Failed to store path change")?;
        }
        Ok(())
    }

    /// Commits that changed `path` in `root`, following renames backwards
    pub fn commits_for_path(&self, root: &Root, path: &str) -> Result<HashSet<CommitIndex>> {
        let mut result = HashSet::new();
        let Some(start) = self.paths.try_enumerate(&path_key(root, path))? else {
            return Ok(result);
        };

        let mut visited = HashSet::new();
        let mut queue = vec![start];
        while let Some(path_id) = queue.pop() {
            if !visited.insert(path_id) {
                continue;
            }
            for item in self.path_commits.scan_prefix(path_id.to_be_bytes()) {
                let (key, value) = item.context("Failed to read path commits")?;
                result.insert(suffix_index(&key)?);
                let kind: ChangeKind =
                    bincode::deserialize(&value).context("Failed to deserialize change kind")?;
                if let ChangeKind::Renamed { from } = kind {
                    queue.push(from);
                }
            }
        }
        Ok(result)
    }

    pub fn changed_paths(&self, index: CommitIndex) -> Result<Vec<ChangedPath>> {
        match self.commit_paths.get(index_key(index))? {
            Some(bytes) => bincode::deserialize(&bytes).context("Failed to deserialize changes"),
            None => Ok(Vec::new()),
        }
    }

    /// Root-relative path of `path_id`
    pub fn path(&self, path_id: u32) -> Result<Option<String>> {
        let Some(key) = self.paths.key_of(path_id)? else { return Ok(None) };
        let relative = match key.iter().position(|&b| b == 0) {
            Some(separator) => &key[separator + 1..],
            None => &key[..],
        };
        Ok(Some(String::from_utf8_lossy(relative).into_owned()))
    }

    pub fn path_count(&self) -> usize {
        self.paths.len()
    }

    pub fn flush(&self) -> Result<()> {
        self.paths.flush()?;
        flush_tree(&self.path_commits)?;
        flush_tree(&self.commit_paths)
    }
}

impl PathsEncoder for PathsIndex {
    fn encode(&self, root: &Root, path: &str) -> Result<u32> {
        self.paths.enumerate(&path_key(root, path))
    }
}
