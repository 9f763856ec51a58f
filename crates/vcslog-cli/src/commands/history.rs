//! History command implementation

use anyhow::Result;
use colored::Colorize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tabled::{
    settings::{object::Rows, Color, Modify, Style},
    Table,
};
use vcslog_index::IndexConfig;

use crate::helpers::{commit_rows, Workspace};

/// Lists commits that changed `path` in any of the repositories
pub fn cmd_history(data_dir: &Path, repos: Vec<PathBuf>, path: String, limit: usize) -> Result<()> {
    let workspace = Workspace::open(data_dir, repos, IndexConfig::default())?;
    let getter = workspace.data_getter()?;

    let path = path.trim_start_matches("./").replace('\\', "/");
    let mut commits = HashSet::new();
    for root in &workspace.roots {
        commits.extend(getter.file_history(root, &path));
    }

    if commits.is_empty() {
        println!("{} No indexed commits changed '{}'", "❌".red(), path.bold());
        return Ok(());
    }

    let rows = commit_rows(&getter, commits);
    let total = rows.len();
    println!("\n{} {}", "📄".bright_cyan(), path.bold().bright_white());
    println!("{}", "━".repeat(60).bright_black());

    let mut table = Table::new(rows.into_iter().take(limit));
    table
        .with(Style::rounded())
        .with(Modify::new(Rows::first()).with(Color::FG_BRIGHT_CYAN));
    println!("{}", table);

    if limit < total {
        println!(
            "\n  {} and {} more commits (use {} to see more)",
            "...".dimmed(),
            (total - limit).to_string().bold(),
            "-n".bright_cyan()
        );
    }
    Ok(())
}
