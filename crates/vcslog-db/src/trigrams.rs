//! Trigram index over full commit messages
//!
//! Messages are split into lowercase ASCII word trigrams; a query is answered
//! by intersecting the commit sets of its own trigrams. The result is a
//! candidate set: callers still have to check the actual message.

use anyhow::{Context, Result};
use std::collections::HashSet;
use vcslog_core::{CommitDetail, CommitIndex};

use crate::codec::{composite_key, flush_tree, suffix_index};

/// Lowercase ASCII word trigrams of `text`. Any byte that is not
/// `[a-z0-9_]` after lowercasing resets the window.
pub fn trigrams(text: &str) -> impl Iterator<Item = [u8; 3]> + '_ {
    TrigramIter {
        bytes: text.as_bytes(),
        i: 0,
        window: [0; 3],
        filled: 0,
    }
}

struct TrigramIter<'a> {
    bytes: &'a [u8],
    i: usize,
    window: [u8; 3],
    filled: usize,
}

impl Iterator for TrigramIter<'_> {
    type Item = [u8; 3];

    fn next(&mut self) -> Option<Self::Item> {
        while self.i < self.bytes.len() {
            let b = self.bytes[self.i].to_ascii_lowercase();
            self.i += 1;

            let is_word = b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'_';
            if !is_word {
                self.filled = 0;
                continue;
            }

            if self.filled < 3 {
                self.window[self.filled] = b;
                self.filled += 1;
                if self.filled < 3 {
                    continue;
                }
            } else {
                self.window = [self.window[1], self.window[2], b];
            }
            return Some(self.window);
        }
        None
    }
}

pub struct TrigramIndex {
    tree: sled::Tree,
}

impl TrigramIndex {
    pub(crate) fn open(db: &sled::Db) -> Result<Self> {
        let tree = db.open_tree("trigrams").context("Failed to open trigrams tree")?;
        Ok(Self { tree })
    }

    pub fn update(&self, index: CommitIndex, detail: &CommitDetail) -> Result<()> {
        let distinct: HashSet<[u8; 3]> = trigrams(&detail.full_message).collect();
        for trigram in distinct {
            self.tree
                .insert(composite_key(&trigram, index), &[] as &[u8])
                .context("Failed to store trigram")?;
        }
        Ok(())
    }

    /// Commits whose messages contain every trigram of `text`.
    ///
    /// `None` means `text` has no trigram at all and cannot be prefiltered.
    pub fn commits_for_text(&self, text: &str) -> Result<Option<HashSet<CommitIndex>>> {
        let wanted: HashSet<[u8; 3]> = trigrams(text).collect();
        if wanted.is_empty() {
            return Ok(None);
        }

        let mut result: Option<HashSet<CommitIndex>> = None;
        for trigram in wanted {
            let mut commits = HashSet::new();
            for item in self.tree.scan_prefix(trigram) {
                let (key, _) = item.context("Failed to read trigram index")?;
                let index = suffix_index(&key)?;
                if result.as_ref().map_or(true, |r| r.contains(&index)) {
                    commits.insert(index);
                }
            }
            if commits.is_empty() {
                return Ok(Some(commits));
            }
            result = Some(commits);
        }
        Ok(result)
    }

    pub fn flush(&self) -> Result<()> {
        flush_tree(&self.tree)
    }
}
