//! Core data models for the commit history index

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// Dense surrogate identifier of a (commit hash, root) pair.
///
/// Assigned by a [`CommitIdResolver`](crate::CommitIdResolver); every on-disk
/// index is keyed by this value, never by the hash itself.
pub type CommitIndex = u32;

/// One version-controlled directory tree tracked by the index
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Root(PathBuf);

impl Root {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self(path.into())
    }

    pub fn path(&self) -> &Path {
        &self.0
    }

    /// Short display name: the last path component, or the whole path for `/`
    pub fn name(&self) -> String {
        self.0
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.0.display().to_string())
    }
}

impl fmt::Display for Root {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.display())
    }
}

/// Commit hash qualified by the root it belongs to
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CommitId {
    pub hash: String,
    pub root: Root,
}

impl CommitId {
    pub fn new(hash: impl Into<String>, root: Root) -> Self {
        Self {
            hash: hash.into(),
            root,
        }
    }

    /// Abbreviated hash for display
    pub fn short_hash(&self) -> &str {
        &self.hash[..self.hash.len().min(8)]
    }
}

impl fmt::Display for CommitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} in {}", self.short_hash(), self.root.name())
    }
}

/// Author or committer identity
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VcsUser {
    pub name: String,
    pub email: String,
}

impl VcsUser {
    pub fn new(name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
        }
    }
}

impl fmt::Display for VcsUser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.email.is_empty() {
            write!(f, "{}", self.name)
        } else {
            write!(f, "{} <{}>", self.name, self.email)
        }
    }
}

/// How a path changed in a commit relative to its first parent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChangeKind {
    Added,
    Modified,
    Deleted,
    /// Moved here from the path with the given id
    Renamed { from: u32 },
}

/// A changed path, already encoded by a [`PathsEncoder`](crate::PathsEncoder)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChangedPath {
    pub path_id: u32,
    pub kind: ChangeKind,
}

/// Everything the index records about one commit.
///
/// Produced by a [`VcsLogIndexer`](crate::VcsLogIndexer); timestamps are Unix
/// seconds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitDetail {
    pub hash: String,
    pub root: Root,
    pub parents: Vec<String>,
    pub author: VcsUser,
    pub committer: VcsUser,
    pub author_time: i64,
    pub commit_time: i64,
    pub full_message: String,
    pub changes: Vec<ChangedPath>,
}

impl CommitDetail {
    pub fn id(&self) -> CommitId {
        CommitId::new(self.hash.clone(), self.root.clone())
    }

    /// First line of the message
    pub fn subject(&self) -> &str {
        self.full_message.lines().next().unwrap_or("")
    }
}
