//! Command implementations

mod history;
mod index;
mod resume;
mod search;
mod stats;

pub use history::cmd_history;
pub use index::cmd_index;
pub use resume::cmd_resume;
pub use search::cmd_search;
pub use stats::cmd_stats;
