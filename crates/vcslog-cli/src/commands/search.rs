//! Search command implementation

use anyhow::Result;
use colored::Colorize;
use std::path::{Path, PathBuf};
use tabled::{
    settings::{object::Rows, Color, Modify, Style},
    Table,
};
use vcslog_index::{IndexConfig, TextFilter};

use crate::helpers::{commit_rows, Workspace};

/// Searches indexed commit messages, optionally restricted to an author
pub fn cmd_search(
    data_dir: &Path,
    repos: Vec<PathBuf>,
    text: String,
    regex: bool,
    case_sensitive: bool,
    author: Option<String>,
    limit: usize,
) -> Result<()> {
    let workspace = Workspace::open(data_dir, repos, IndexConfig::default())?;
    let getter = workspace.data_getter()?;

    let filter = if regex {
        TextFilter::regex(&text, case_sensitive)?
    } else {
        TextFilter::plain(&text, case_sensitive)
    };

    let users = match &author {
        Some(author) => {
            let users = getter.find_users(author);
            if users.is_empty() {
                println!("{} No authors match '{}'", "❌".red(), author.bold());
                return Ok(());
            }
            users
        }
        None => Vec::new(),
    };

    let found = getter.filter(Some(&filter), &users).unwrap_or_default();
    if found.is_empty() {
        println!("{} No commits found for '{}'", "❌".red(), text.bold());
        return Ok(());
    }

    let rows = commit_rows(&getter, found);
    let total = rows.len();
    println!(
        "\n{} {} commits match '{}'",
        "🔍".bright_cyan(),
        total.to_string().bold(),
        text.bright_white()
    );

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
