//! Helper functions for CLI operations

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use vcslog_core::{CommitIndex, Root};
use vcslog_db::{CommitIdStorage, StorageId, COMMIT_ID_KIND};
use vcslog_index::{BigRepositoriesList, GitLogProvider, IndexConfig, IndexDataGetter, PersistentIndex};

use crate::notifier::ConsoleNotifier;
use crate::output::CommitRow;

const PROJECT_NAME: &str = "vcslog";
const COMMIT_ID_VERSION: u32 = 1;
pub const BIG_REPOSITORIES_FILE: &str = "big-repositories.json";
const INDEX_GRACE: Duration = Duration::from_secs(60);

/// Everything a command needs to work with the index of a set of repositories
pub struct Workspace {
    pub roots: Vec<Root>,
    pub provider: Arc<GitLogProvider>,
    pub resolver: Arc<CommitIdStorage>,
    pub index: PersistentIndex,
}

impl Workspace {
    pub fn open(data_dir: &Path, repos: Vec<PathBuf>, config: IndexConfig) -> Result<Self> {
        fs::create_dir_all(data_dir)
            .with_context(|| format!("Failed to create data directory {:?}", data_dir))?;

        let mut roots = repos.iter().map(|repo| canonical_root(repo)).collect::<Result<Vec<_>>>()?;
        roots.sort();
        roots.dedup();

        let log_id = StorageId::calc_log_id(PROJECT_NAME, &roots);
        let ids = StorageId::new(data_dir, COMMIT_ID_KIND, &log_id, COMMIT_ID_VERSION);
        let resolver = Arc::new(CommitIdStorage::open(&ids).context("Failed to open commit id storage")?);
        let big_list = Arc::new(BigRepositoriesList::load(data_dir.join(BIG_REPOSITORIES_FILE))?);
        let provider = Arc::new(GitLogProvider::new());

        let mut builder = PersistentIndex::builder(PROJECT_NAME, data_dir, resolver.clone())
            .config(config)
            .big_repositories(big_list)
            .notifier(Arc::new(ConsoleNotifier));
        for root in &roots {
            builder = builder.provider(root.clone(), provider.clone());
        }

        Ok(Self {
            roots,
            provider,
            resolver,
            index: builder.build(),
        })
    }

    pub fn data_getter(&self) -> Result<IndexDataGetter<'_>> {
        self.index
            .data_getter()
            .context("Index storage is not available, see the log for details")
    }

    /// Flushes both the index and the commit ids it refers to
    pub fn flush(&self) -> Result<()> {
        self.index.flush();
        self.resolver.flush()
    }
}

/// Longest an `index` run may keep the worker busy: each root can use up
/// its whole time limit before it gets paused
pub fn index_timeout(config: &IndexConfig, roots: usize) -> Duration {
    let minutes = u64::from(config.limit()) * roots as u64;
    Duration::from_secs(minutes * 60) + INDEX_GRACE
}

/// Repository path as a root; roots are compared by path, so it is canonicalized
pub fn canonical_root(path: &Path) -> Result<Root> {
    let path = fs::canonicalize(path).with_context(|| format!("Repository {:?} does not exist", path))?;
    Ok(Root::new(path))
}

/// Table rows for `commits`, newest first
pub fn commit_rows(getter: &IndexDataGetter<'_>, commits: impl IntoIterator<Item = CommitIndex>) -> Vec<CommitRow> {
    let mut found: Vec<(i64, CommitRow)> = commits
        .into_iter()
        .filter_map(|commit| {
            let id = getter.commit_id(commit)?;
            let time = getter.commit_time(commit).unwrap_or(0);
            let row = CommitRow {
                commit: id.short_hash().to_string(),
                repository: id.root.name(),
                author: getter.author(commit).map_or_else(|| "-".to_string(), |user| user.name),
                date: format_relative_time(time),
                subject: getter
                    .full_message(commit)
                    .map(|message| truncate(message.lines().next().unwrap_or(""), 60))
                    .unwrap_or_default(),
            };
            Some((time, row))
        })
        .collect();
    found.sort_by(|a, b| b.0.cmp(&a.0));
    found.into_iter().map(|(_, row)| row).collect()
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let mut truncated: String = text.chars().take(max_chars - 1).collect();
    truncated.push('…');
    truncated
}

/// Formats timestamp as relative time (e.g., "2 days ago")
pub fn format_relative_time(timestamp: i64) -> String {
    let dt = DateTime::<Utc>::from_timestamp(timestamp, 0).unwrap_or(DateTime::<Utc>::MIN_UTC);
    let duration = Utc::now().signed_duration_since(dt);

    if duration.num_seconds() < 60 {
        "just now".to_string()
    } else if duration.num_minutes() < 60 {
        let mins = duration.num_minutes();
        format!("{} min{} ago", mins, if mins == 1 { "" } else { "s" })
    } else if duration.num_hours() < 24 {
        let hours = duration.num_hours();
        format!("{} hour{} ago", hours, if hours == 1 { "" } else { "s" })
    } else if duration.num_days() < 30 {
        let days = duration.num_days();
        format!("{} day{} ago", days, if days == 1 { "" } else { "s" })
    } else if duration.num_days() < 365 {
        let months = duration.num_days() / 30;
        format!("{} month{} ago", months, if months == 1 { "" } else { "s" })
    } else {
        let years = duration.num_days() / 365;
        format!("{} year{} ago", years, if years == 1 { "" } else { "s" })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_keeps_short_text() {
        assert_eq!(truncate("Fix typo", 60), "Fix typo");
    }

    #[test]
    fn test_truncate_counts_characters() {
        assert_eq!(truncate("äöüäöü", 4), "äöü…");
    }

    #[test]
    fn test_index_timeout_covers_every_root() {
        let config = IndexConfig::default().with_limit_minutes(2);
        assert_eq!(index_timeout(&config, 3), Duration::from_secs(7 * 60));
        assert_eq!(index_timeout(&config, 0), Duration::from_secs(60));
    }

    #[test]
    fn test_relative_time() {
        let now = Utc::now().timestamp();
        assert_eq!(format_relative_time(now), "just now");
        assert_eq!(format_relative_time(now - 3 * 3600), "3 hours ago");
        assert_eq!(format_relative_time(now - 2 * 86_400 * 365), "2 years ago");
    }
}
