//! Output formatting and progress reporting

use console::{style, Term};
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use scrollreel::{RecordObserver, Stage};
use serde::{Deserialize, Serialize};

/// Format of the final summary
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum OutputFormat {
    /// Human-readable text
    #[default]
    Text,
    /// JSON output
    Json,
}

/// Narrates recording progress on stderr
#[derive(Debug)]
pub struct ProgressReporter {
    term: Term,
    scroll_bar: ProgressBar,
    /// Whether to use colors
    pub use_color: bool,
    /// Quiet mode
    pub quiet: bool,
}

impl ProgressReporter {
    /// Create a new progress reporter
    #[must_use]
    pub fn new(use_color: bool, quiet: bool) -> Self {
        let scroll_bar = ProgressBar::with_draw_target(None, ProgressDrawTarget::hidden());
        scroll_bar.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("=>-"),
        );
        Self {
            term: Term::stderr(),
            scroll_bar,
            use_color,
            quiet,
        }
    }

    fn line(&self, symbol: &str, plain: &str, message: &str, paint: fn(&str) -> String) {
        let prefix = if self.use_color {
            paint(symbol)
        } else {
            plain.to_string()
        };
        let _ = self.term.write_line(&format!("{prefix} {message}"));
    }

    /// Print a success message
    pub fn success(&self, message: &str) {
        if self.quiet {
            return;
        }
        self.line("✓", "DONE", message, |s| style(s).green().bold().to_string());
    }

    /// Print a failure message
    pub fn failure(&self, message: &str) {
        // Always print failures, even in quiet mode
        self.line("✗", "FAIL", message, |s| style(s).red().bold().to_string());
    }

    /// Print a warning message
    pub fn warning(&self, message: &str) {
        if self.quiet {
            return;
        }
        self.line("⚠", "WARN", message, |s| style(s).yellow().bold().to_string());
    }

    /// Print an info message
    pub fn info(&self, message: &str) {
        if self.quiet {
            return;
        }
        self.line("ℹ", "INFO", message, |s| style(s).blue().bold().to_string());
    }

    fn scroll_step(&self, step: u64, total: u64) {
        if self.quiet {
            return;
        }
        if step == 1 {
            self.scroll_bar.set_length(total);
            self.scroll_bar.set_message("Scrolling");
            self.scroll_bar.set_draw_target(ProgressDrawTarget::stderr());
        }
        self.scroll_bar.set_position(step);
        if step >= total {
            self.scroll_bar.finish_and_clear();
            self.success(&format!("Scrolled {total} steps"));
        }
    }
}

impl RecordObserver for ProgressReporter {
    fn on_stage(&self, stage: &Stage) {
        match *stage {
            Stage::Scrolling { step, total } => self.scroll_step(step, total),
            Stage::Saving => {
                if !self.scroll_bar.is_finished() {
                    self.scroll_bar.finish_and_clear();
                }
                self.info(&stage.to_string());
            }
            _ => self.info(&stage.to_string()),
        }
    }
}
