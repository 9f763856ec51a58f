//! Stats command implementation

use anyhow::Result;
use colored::Colorize;
use std::path::{Path, PathBuf};
use tabled::{settings::Style, Table};
use vcslog_index::formatting::format_number;
use vcslog_index::IndexConfig;

use crate::helpers::Workspace;
use crate::output::RootRow;

/// Displays index statistics
pub fn cmd_stats(data_dir: &Path, repos: Vec<PathBuf>) -> Result<()> {
    let workspace = Workspace::open(data_dir, repos, IndexConfig::default())?;
    let big_list = workspace.index.big_repositories();

    println!("{}", "Index Statistics:".bright_cyan().bold());
    match workspace.index.storage() {
        Some(storage) => {
            println!("  {}: {}", "Indexed commits".bright_yellow(), format_number(storage.commit_count()).bold());
            println!("  {}: {}", "Known commits".bright_yellow(), format_number(workspace.resolver.len()).bold());
            println!("  {}: {}", "Users".bright_yellow(), format_number(storage.users().user_count()).bold());
            println!("  {}: {}", "Paths".bright_yellow(), format_number(storage.paths().path_count()).bold());
            println!("  {}: {} KiB", "Size on disk".bright_yellow(), (storage.size_on_disk() / 1024).to_string().bold());
        }
        None => println!("  {}", "Index storage is not available".red()),
    }

    let fresh = workspace.index.storage().map_or(true, |storage| storage.is_fresh());
    let rows: Vec<RootRow> = workspace
        .roots
        .iter()
        .map(|root| RootRow {
            repository: root.name(),
            path: root.to_string(),
            state: if big_list.is_big(root) {
                format!("paused (limit {} min)", workspace.index.indexing_limit(root))
            } else if fresh {
                "not indexed".to_string()
            } else {
                "indexed".to_string()
            },
        })
        .collect();
    if !rows.is_empty() {
        let mut table = Table::new(rows);
        table.with(Style::rounded());
        println!("\n{}", table);
    }

    let paused = big_list.repositories();
    if !paused.is_empty() {
        println!("\n{}", "Paused repositories:".bright_cyan().bold());
        for root in paused {
            println!("  {} {}", "⏸".yellow(), root);
        }
    }
    Ok(())
}
