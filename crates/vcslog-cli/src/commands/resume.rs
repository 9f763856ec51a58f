//! Resume command implementation

use anyhow::Result;
use colored::Colorize;
use std::fs;
use std::path::{Path, PathBuf};
use vcslog_core::Root;
use vcslog_index::BigRepositoriesList;

use crate::helpers::BIG_REPOSITORIES_FILE;

/// Takes a repository off the paused list so the next `index` run covers it
pub fn cmd_resume(data_dir: &Path, repo: PathBuf) -> Result<()> {
    let big_list = BigRepositoriesList::load(data_dir.join(BIG_REPOSITORIES_FILE))?;
    // A repository that no longer exists can still be taken off the list
    let root = Root::new(fs::canonicalize(&repo).unwrap_or(repo));

    if big_list.remove_repository(&root) {
        println!("{} Indexing of {} resumed", "▶".green(), root.name().bold());
        println!("  Run {} to continue", format!("vcslog index --repo {}", root).bright_cyan());
    } else {
        println!("{} Indexing of {} is not paused", "ℹ".bright_blue(), root.name().bold());
    }
    Ok(())
}
