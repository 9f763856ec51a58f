//! Pause notifications printed to the terminal

use colored::Colorize;
use vcslog_index::{IndexingNotifier, PauseNotification};

/// A terminal has no buttons: the resume action becomes a hint to run
/// `vcslog resume`
pub struct ConsoleNotifier;

impl IndexingNotifier for ConsoleNotifier {
    fn notify_paused(&self, notification: PauseNotification) {
        eprintln!("\n{} {}", "⏸".yellow(), notification.content().bold());
        eprintln!("  {}", notification.help_text().dimmed());
        eprintln!(
            "  {} vcslog resume {}",
            "To continue, run:".bright_yellow(),
            notification.root()
        );
    }
}
