//! VcsLog CLI - Command line front end of the commit history index
//!
//! Provides:
//! - Indexing of one or more Git repositories
//! - Searching commit messages, optionally by author
//! - File history that follows renames
//! - Index statistics and resuming paused repositories

mod commands;
mod helpers;
mod notifier;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use vcslog_index::{IndexConfig, BATCH_SIZE, DEFAULT_LIMIT_MINUTES, FLUSHED_COMMITS_NUMBER};

use commands::{cmd_history, cmd_index, cmd_resume, cmd_search, cmd_stats};

#[derive(Parser)]
#[command(name = "vcslog")]
#[command(about = "Persistent, incremental index of Git commit history", long_about = None)]
#[command(version)]
struct Cli {
    /// Directory holding index data
    #[arg(short, long, default_value = "./vcslog-data")]
    data_dir: PathBuf,

    /// Log level
    #[arg(long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Indexes every commit reachable in the given repositories
    Index {
        /// Path to a local Git repository (repeatable)
        #[arg(short, long, required = true)]
        repo: Vec<PathBuf>,

        /// Minutes a repository may spend indexing before it is paused
        #[arg(long, default_value_t = DEFAULT_LIMIT_MINUTES)]
        limit_minutes: u32,

        /// Commits read from Git per batch
        #[arg(short = 'b', long, default_value_t = BATCH_SIZE)]
        batch_size: usize,

        /// Commits between storage flushes during a full pass
        #[arg(long, default_value_t = FLUSHED_COMMITS_NUMBER)]
        flush_every: usize,
    },

    /// Searches indexed commit messages
    Search {
        /// Text (or regular expression with --regex) to look for
        text: String,

        /// Indexed repositories, as passed to `index`
        #[arg(short, long, required = true)]
        repo: Vec<PathBuf>,

        /// Treat the text as a regular expression
        #[arg(long)]
        regex: bool,

        /// Match case exactly
        #[arg(short = 'c', long)]
        case_sensitive: bool,

        /// Only commits by users whose name or email contains this
        #[arg(short, long)]
        author: Option<String>,

        /// Maximum number of commits to display
        #[arg(short = 'n', long, default_value = "50")]
        limit: usize,
    },

    /// Shows commits that changed a file, following renames
    History {
        /// Path relative to the repository root
        path: String,

        /// Indexed repositories, as passed to `index`
        #[arg(short, long, required = true)]
        repo: Vec<PathBuf>,

        /// Maximum number of commits to display
        #[arg(short = 'n', long, default_value = "50")]
        limit: usize,
    },

    /// Shows index statistics
    Stats {
        /// Indexed repositories, as passed to `index`
        #[arg(short, long)]
        repo: Vec<PathBuf>,
    },

    /// Resumes indexing of a repository that was paused for taking too long
    Resume {
        /// Path to the paused repository
        repo: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Configure logger
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(&cli.log_level)).init();

    match cli.command {
        Commands::Index {
            repo,
            limit_minutes,
            batch_size,
            flush_every,
        } => {
            let config = IndexConfig::default()
                .with_limit_minutes(limit_minutes)
                .with_batch_size(batch_size)
                .with_flushed_commits(flush_every);
            cmd_index(&cli.data_dir, repo, config)?;
        }
        Commands::Search {
            text,
            repo,
            regex,
            case_sensitive,
            author,
            limit,
        } => {
            cmd_search(&cli.data_dir, repo, text, regex, case_sensitive, author, limit)?;
        }
        Commands::History { path, repo, limit } => {
            cmd_history(&cli.data_dir, repo, path, limit)?;
        }
        Commands::Stats { repo } => {
            cmd_stats(&cli.data_dir, repo)?;
        }
        Commands::Resume { repo } => {
            cmd_resume(&cli.data_dir, repo)?;
        }
    }

    Ok(())
}
