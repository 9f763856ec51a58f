//! Git backend of the commit detail reader

use anyhow::Context;
use git2::{Commit, Delta, DiffFindOptions, Oid, Repository, Revwalk, Sort};
use std::path::Path;
use std::sync::Arc;
use vcslog_core::{
    ChangeKind, ChangedPath, CommitDetail, DetailConsumer, PathsEncoder, Root, VcsError, VcsLogIndexer,
    VcsLogProvider, VcsUser,
};

/// Reads commit details with libgit2.
///
/// Changed paths are computed against the first parent, with rename
/// detection; root commits list every file as added.
#[derive(Debug, Default, Clone, Copy)]
pub struct GitLogIndexer;

impl GitLogIndexer {
    fn open(root: &Root) -> Result<Repository, VcsError> {
        Repository::open(root.path()).map_err(|e| VcsError::backend(root, e))
    }

    fn read_commit(
        repo: &Repository,
        commit: &Commit<'_>,
        root: &Root,
        encoder: &dyn PathsEncoder,
    ) -> Result<CommitDetail, VcsError> {
        let author = commit.author();
        let committer = commit.committer();
        let changes = Self::changes(repo, commit, root, encoder).map_err(|e| VcsError::backend(root, e))?;

        Ok(CommitDetail {
            hash: commit.id().to_string(),
            root: root.clone(),
            parents: commit.parent_ids().map(|id| id.to_string()).collect(),
            author: VcsUser::new(author.name().unwrap_or(""), author.email().unwrap_or("")),
            committer: VcsUser::new(committer.name().unwrap_or(""), committer.email().unwrap_or("")),
            author_time: author.when().seconds(),
            commit_time: committer.when().seconds(),
            full_message: String::from_utf8_lossy(commit.message_bytes()).trim_end().to_string(),
            changes,
        })
    }

    fn changes(
        repo: &Repository,
        commit: &Commit<'_>,
        root: &Root,
        encoder: &dyn PathsEncoder,
    ) -> anyhow::Result<Vec<ChangedPath>> {
        let tree = commit.tree().context("Failed to get commit tree")?;
        let parent_tree = if commit.parent_count() > 0 {
            Some(commit.parent(0)?.tree().context("Failed to get parent tree")?)
        } else {
            None
        };

        let mut diff = repo
            .diff_tree_to_tree(parent_tree.as_ref(), Some(&tree), None)
            .context("Failed to diff commit against its parent")?;
        let mut find = DiffFindOptions::new();
        find.renames(true);
        diff.find_similar(Some(&mut find)).context("Failed to detect renames")?;

        let mut changes = Vec::new();
        for delta in diff.deltas() {
            let new_path = delta.new_file().path();
            let old_path = delta.old_file().path();
            let (path, kind) = match delta.status() {
                Delta::Added | Delta::Copied => (new_path, ChangeKind::Added),
                Delta::Deleted => (old_path, ChangeKind::Deleted),
                Delta::Modified | Delta::Typechange => (new_path, ChangeKind::Modified),
                Delta::Renamed => {
                    let Some(from) = old_path else { continue };
                    let from = encoder.encode(root, &path_string(from))?;
                    (new_path, ChangeKind::Renamed { from })
                }
                _ => continue,
            };
            let Some(path) = path else { continue };
            changes.push(ChangedPath {
                path_id: encoder.encode(root, &path_string(path))?,
                kind,
            });
        }
        Ok(changes)
    }
}

fn path_string(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}

/// Every commit reachable from local branches, remote branches and HEAD
fn walk_all(repo: &Repository) -> Result<Revwalk<'_>, git2::Error> {
    let mut revwalk = repo.revwalk()?;
    revwalk.set_sorting(Sort::TOPOLOGICAL | Sort::TIME)?;
    revwalk.push_glob("heads")?;
    revwalk.push_glob("remotes")?;
    if repo.head().is_ok() {
        revwalk.push_head()?;
    }
    Ok(revwalk)
}

impl VcsLogIndexer for GitLogIndexer {
    fn supported_vcs(&self) -> &str {
        "Git"
    }

    fn read_full_details(
        &self,
        root: &Root,
        hashes: &[String],
        encoder: &dyn PathsEncoder,
        consumer: &mut DetailConsumer<'_>,
    ) -> Result<(), VcsError> {
        let repo = Self::open(root)?;
        for hash in hashes {
            let oid = Oid::from_str(hash).map_err(|e| VcsError::backend(root, e))?;
            let commit = repo.find_commit(oid).map_err(|e| VcsError::backend(root, e))?;
            consumer(Self::read_commit(&repo, &commit, root, encoder)?)?;
        }
        Ok(())
    }

    fn read_all_full_details(
        &self,
        root: &Root,
        encoder: &dyn PathsEncoder,
        consumer: &mut DetailConsumer<'_>,
    ) -> Result<(), VcsError> {
        let repo = Self::open(root)?;
        let revwalk = walk_all(&repo).map_err(|e| VcsError::backend(root, e))?;
        for oid in revwalk {
            let oid = oid.map_err(|e| VcsError::backend(root, e))?;
            let commit = repo.find_commit(oid).map_err(|e| VcsError::backend(root, e))?;
            consumer(Self::read_commit(&repo, &commit, root, encoder)?)?;
        }
        Ok(())
    }
}

/// Git integration of one or more roots
#[derive(Debug, Default, Clone)]
pub struct GitLogProvider {
    indexer: Arc<GitLogIndexer>,
}

impl GitLogProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hashes of every commit reachable in `root`, newest first
    pub fn all_hashes(&self, root: &Root) -> anyhow::Result<Vec<String>> {
        let repo = Repository::open(root.path())
            .with_context(|| format!("Failed to open repository at {}", root))?;
        let revwalk = walk_all(&repo).context("Failed to walk history")?;
        revwalk
            .map(|oid| -> anyhow::Result<String> { Ok(oid.context("Failed to get commit OID")?.to_string()) })
            .collect()
    }
}

impl VcsLogProvider for GitLogProvider {
    fn indexer(&self) -> Option<Arc<dyn VcsLogIndexer>> {
        let indexer: Arc<dyn VcsLogIndexer> = self.indexer.clone();
        Some(indexer)
    }
}
