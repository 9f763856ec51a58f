//! Index command implementation

use anyhow::{bail, Context, Result};
use colored::Colorize;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use vcslog_core::CommitIdResolver;
use vcslog_index::formatting::{format_duration, format_minutes, format_number};
use vcslog_index::IndexConfig;

use crate::helpers::{index_timeout, Workspace};

const DISPOSE_TIMEOUT: Duration = Duration::from_secs(10);

/// Marks every reachable commit and waits until the background worker is done
pub fn cmd_index(data_dir: &Path, repos: Vec<PathBuf>, config: IndexConfig) -> Result<()> {
    log::info!("Time limit per repository: {}", format_minutes(config.limit()));

    let workspace = Workspace::open(data_dir, repos, config)?;
    if workspace.index.storage().is_none() {
        bail!("Index storage under {:?} could not be opened", data_dir);
    }

    for root in &workspace.roots {
        if workspace.index.big_repositories().is_big(root) {
            log::warn!("Indexing of {} is paused, run `vcslog resume {}` first", root.name(), root);
            continue;
        }
        let hashes = workspace
            .provider
            .all_hashes(root)
            .with_context(|| format!("Failed to list commits of {}", root))?;
        log::info!("Found {} commits in {}", format_number(hashes.len()), root.name());

        for hash in &hashes {
            let index = workspace.resolver.commit_index(hash, root)?;
            workspace.index.mark_for_indexing(index, root);
        }
    }

    let started = Instant::now();
    let timeout = index_timeout(&config, workspace.roots.len());
    workspace.index.schedule_index(true);
    if !workspace.index.wait_for_idle(Some(timeout)) {
        // Reads that keep failing are retried forever; stop them
        workspace.index.dispose();
        workspace.index.wait_for_idle(Some(DISPOSE_TIMEOUT));
        workspace.flush()?;
        bail!(
            "Indexing did not finish within {}, see the log for repositories that could not be read",
            format_duration(timeout)
        );
    }
    workspace.flush()?;

    for root in &workspace.roots {
        let state = if workspace.index.big_repositories().is_big(root) {
            "paused".yellow()
        } else if workspace.index.is_root_indexed(root) {
            "indexed".green()
        } else {
            format!("{} commits left", format_number(workspace.index.pending_count(root))).red()
        };
        println!("  {} {}", root.name().bold(), state);
    }

    let indexed = workspace.index.storage().map_or(0, |storage| storage.commit_count());
    println!(
        "{} {} commits indexed, took {}",
        "✓".green(),
        format_number(indexed).bold(),
        format_duration(started.elapsed())
    );
    Ok(())
}
