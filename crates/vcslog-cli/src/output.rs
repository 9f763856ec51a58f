//! Output formatting structures for CLI display

use tabled::Tabled;

/// Table row for displaying commits
#[derive(Tabled)]
pub struct CommitRow {
    #[tabled(rename = "Commit")]
    pub commit: String,
    #[tabled(rename = "Repository")]
    pub repository: String,
    #[tabled(rename = "Author")]
    pub author: String,
    #[tabled(rename = "Date")]
    pub date: String,
    #[tabled(rename = "Subject")]
    pub subject: String,
}

/// Table row for displaying the state of a repository
#[derive(Tabled)]
pub struct RootRow {
    #[tabled(rename = "Repository")]
    pub repository: String,
    #[tabled(rename = "Path")]
    pub path: String,
    #[tabled(rename = "State")]
    pub state: String,
}
