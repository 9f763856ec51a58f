//! VcsLog Index - Incremental indexing engine for commit history
//!
//! This crate is responsible for:
//! - Tracking commits waiting to be indexed, per root
//! - Running indexing requests one at a time on a low priority background thread
//! - Pausing roots whose indexing takes longer than their time budget
//! - Answering message, user and file history queries from the index
//! - Reading commit details out of Git repositories

mod big_repositories;
mod budget;
mod collector;
mod config;
mod controller;
mod data_getter;
mod executor;
pub mod formatting;
mod git;
mod index;
mod notification;
mod priority;

pub use big_repositories::{BigRepositoriesList, BigRepositoryEvent};
pub use budget::{Clock, ManualClock, SystemClock};
pub use collector::{IndexCollector, IndexStats};
pub use config::{IndexConfig, BATCH_SIZE, DEFAULT_LIMIT_MINUTES, FLUSHED_COMMITS_NUMBER};
pub use data_getter::{IndexDataGetter, TextFilter};
pub use executor::{BackgroundExecutor, BackgroundTask, HeavyAwareExecutor, IdleLoadMonitor, LoadMonitor};
pub use git::{GitLogIndexer, GitLogProvider};
pub use index::{PersistentIndex, PersistentIndexBuilder, INDEX_VERSION};
pub use notification::{IndexingNotifier, LoggingNotifier, PauseNotification, HELP_ACTION, RESUME_ACTION};
