//! Read access to indexed commit data

use anyhow::{Context, Result};
use regex::{Regex, RegexBuilder};
use std::collections::{BTreeSet, HashSet};
use vcslog_core::{ChangeKind, CommitId, CommitIdResolver, CommitIndex, FatalErrorHandler, Root, VcsUser};
use vcslog_db::IndexStorage;

const SOURCE: &str = "IndexDataGetter";

/// Text condition on full commit messages
#[derive(Debug, Clone)]
pub enum TextFilter {
    Plain { text: String, match_case: bool },
    Regex(Regex),
}

impl TextFilter {
    pub fn plain(text: &str, match_case: bool) -> Self {
        Self::Plain {
            text: text.to_string(),
            match_case,
        }
    }

    pub fn regex(pattern: &str, match_case: bool) -> Result<Self> {
        let regex = RegexBuilder::new(pattern)
            .case_insensitive(!match_case)
            .build()
            .with_context(|| format!("Invalid regex: {}", pattern))?;
        Ok(Self::Regex(regex))
    }

    pub fn matches(&self, message: &str) -> bool {
        match self {
            Self::Plain { text, match_case: true } => message.contains(text.as_str()),
            Self::Plain { text, match_case: false } => message.to_lowercase().contains(&text.to_lowercase()),
            Self::Regex(regex) => regex.is_match(message),
        }
    }
}

/// Queries over an opened index storage.
///
/// Storage read errors are reported to the fatal error handler and the
/// query answers as if the data were missing.
pub struct IndexDataGetter<'a> {
    storage: &'a IndexStorage,
    resolver: &'a dyn CommitIdResolver,
    fatal: &'a dyn FatalErrorHandler,
    roots: &'a BTreeSet<Root>,
}

impl<'a> IndexDataGetter<'a> {
    pub(crate) fn new(
        storage: &'a IndexStorage,
        resolver: &'a dyn CommitIdResolver,
        fatal: &'a dyn FatalErrorHandler,
        roots: &'a BTreeSet<Root>,
    ) -> Self {
        Self {
            storage,
            resolver,
            fatal,
            roots,
        }
    }

    fn report<T>(&self, result: Result<T>) -> Option<T> {
        match result {
            Ok(value) => Some(value),
            Err(e) => {
                self.fatal.consume(SOURCE, &e);
                None
            }
        }
    }

    pub fn commit_id(&self, index: CommitIndex) -> Option<CommitId> {
        self.report(self.resolver.commit_id(index)).flatten()
    }

    pub fn full_message(&self, index: CommitIndex) -> Option<String> {
        self.report(self.storage.full_message(index)).flatten()
    }

    pub fn author(&self, index: CommitIndex) -> Option<VcsUser> {
        self.report(self.storage.users().author_of(index)).flatten()
    }

    /// The committer, which is the author unless recorded otherwise
    pub fn committer(&self, index: CommitIndex) -> Option<VcsUser> {
        let committer = self.report(self.storage.committer_id(index)).flatten();
        match committer {
            Some(user_id) => self.report(self.storage.users().user(user_id)).flatten(),
            None => self.author(index),
        }
    }

    pub fn author_time(&self, index: CommitIndex) -> Option<i64> {
        self.timestamps(index).map(|(author, _)| author)
    }

    pub fn commit_time(&self, index: CommitIndex) -> Option<i64> {
        self.timestamps(index).map(|(_, commit)| commit)
    }

    fn timestamps(&self, index: CommitIndex) -> Option<(i64, i64)> {
        self.report(self.storage.timestamps(index)).flatten()
    }

    pub fn parents(&self, index: CommitIndex) -> Option<Vec<CommitIndex>> {
        self.report(self.storage.parents(index)).flatten()
    }

    /// Changed paths of commit `index` with their root-relative names
    pub fn changed_paths(&self, index: CommitIndex) -> Vec<(String, ChangeKind)> {
        let paths = self.storage.paths();
        let changes = self.report(paths.changed_paths(index)).unwrap_or_default();
        changes
            .into_iter()
            .filter_map(|change| {
                let path = self.report(paths.path(change.path_id)).flatten()?;
                Some((path, change.kind))
            })
            .collect()
    }

    /// Indexed commits whose message matches `filter`
    pub fn filter_messages(&self, filter: &TextFilter) -> HashSet<CommitIndex> {
        self.report(self.try_filter_messages(filter)).unwrap_or_default()
    }

    fn try_filter_messages(&self, filter: &TextFilter) -> Result<HashSet<CommitIndex>> {
        let candidates = match filter {
            TextFilter::Plain { text, .. } => self.storage.trigrams().commits_for_text(text)?,
            TextFilter::Regex(_) => None,
        };

        let mut result = HashSet::new();
        match candidates {
            Some(candidates) => {
                for index in candidates {
                    if !self.storage.is_indexed(index)? {
                        continue;
                    }
                    if let Some(message) = self.storage.full_message(index)? {
                        if filter.matches(&message) {
                            result.insert(index);
                        }
                    }
                }
            }
            None => {
                for entry in self.storage.messages() {
                    let (index, message) = entry?;
                    if filter.matches(&message) && self.storage.is_indexed(index)? {
                        result.insert(index);
                    }
                }
            }
        }
        Ok(result)
    }

    /// Drops commits whose records were written without reaching the commit set
    fn indexed_only(&self, commits: Result<HashSet<CommitIndex>>) -> Result<HashSet<CommitIndex>> {
        let mut indexed = HashSet::new();
        for index in commits? {
            if self.storage.is_indexed(index)? {
                indexed.insert(index);
            }
        }
        Ok(indexed)
    }

    /// Commits authored by any of `users`
    pub fn filter_users(&self, users: &[VcsUser]) -> HashSet<CommitIndex> {
        self.report(self.indexed_only(self.storage.users().commits_for_users(users)))
            .unwrap_or_default()
    }

    /// Known users whose name or email contains `text`
    pub fn find_users(&self, text: &str) -> Vec<VcsUser> {
        self.report(self.storage.users().find_users(text)).unwrap_or_default()
    }

    /// Commits matching every given condition; `None` when there is none
    pub fn filter(&self, text: Option<&TextFilter>, users: &[VcsUser]) -> Option<HashSet<CommitIndex>> {
        let by_text = text.map(|filter| self.filter_messages(filter));
        let by_users = (!users.is_empty()).then(|| self.filter_users(users));
        match (by_text, by_users) {
            (Some(a), Some(b)) => Some(a.intersection(&b).copied().collect()),
            (Some(a), None) | (None, Some(a)) => Some(a),
            (None, None) => None,
        }
    }

    /// Commits that changed `path` in `root`, following renames
    pub fn file_history(&self, root: &Root, path: &str) -> HashSet<CommitIndex> {
        if !self.roots.contains(root) {
            return HashSet::new();
        }
        self.report(self.indexed_only(self.storage.paths().commits_for_path(root, path)))
            .unwrap_or_default()
    }
}
