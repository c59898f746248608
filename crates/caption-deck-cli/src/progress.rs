use caption_deck_core::error::ERROR_PREFIX;
use caption_deck_core::{BatchState, BatchStatus, ProgressReporter};
use colored::*;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;

const TICK_CHARS: &str = "⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏";

/// CLI progress reporter using indicatif progress bars.
///
/// - Scan phase: spinner
/// - Caption phase: percent bar with the current image as message
pub struct CliReporter {
    bar: Mutex<Option<ProgressBar>>,
}

impl CliReporter {
    pub fn new() -> Self {
        Self {
            bar: Mutex::new(None),
        }
    }

    fn set_bar(&self, pb: ProgressBar) {
        if let Ok(mut guard) = self.bar.lock() {
            if let Some(old) = guard.take() {
                old.finish_and_clear();
            }
            *guard = Some(pb);
        }
    }

    fn finish_bar(&self) {
        if let Ok(mut guard) = self.bar.lock() {
            if let Some(pb) = guard.take() {
                pb.finish_and_clear();
            }
        }
    }

    fn with_bar(&self, f: impl FnOnce(&ProgressBar)) {
        if let Ok(guard) = self.bar.lock() {
            if let Some(pb) = guard.as_ref() {
                f(pb);
            }
        }
    }
}

impl Default for CliReporter {
    fn default() -> Self {
        Self::new()
    }
}

fn spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    let style = ProgressStyle::with_template("{spinner:.cyan} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
        .tick_chars(TICK_CHARS);
    pb.set_style(style);
    pb.set_message(message.to_string());
    pb.enable_steady_tick(Duration::from_millis(80));
    pb
}

fn percent_bar() -> ProgressBar {
    let pb = ProgressBar::new(100);
    let style = ProgressStyle::with_template(
        "  {spinner:.cyan} Captioning [{bar:30.cyan/dim}] {pos:>3}% {msg}",
    )
    .unwrap_or_else(|_| ProgressStyle::default_bar())
    .progress_chars("━╸─")
    .tick_chars(TICK_CHARS);
    pb.set_style(style);
    pb.enable_steady_tick(Duration::from_millis(80));
    pb
}

impl ProgressReporter for CliReporter {
    fn on_state(&self, state: BatchState) {
        match state {
            BatchState::Scanning => self.set_bar(spinner("Scanning directory...")),
            BatchState::Running => self.set_bar(percent_bar()),
            _ => {}
        }
    }

    fn on_progress(&self, message: &str, percent: u8) {
        self.with_bar(|pb| {
            pb.set_position(u64::from(percent));
            pb.set_message(message.to_string());
        });
    }

    fn on_image_finished(&self, image_path: &Path, caption: &str) {
        let name = image_path
            .file_name()
            .map(|f| f.to_string_lossy().into_owned())
            .unwrap_or_default();
        let line = if caption.starts_with(ERROR_PREFIX) {
            format!("  {} {}: {}", "✗".red(), name, caption.red())
        } else {
            format!("  {} {}", "✓".green(), name)
        };
        self.with_bar(|pb| pb.println(&line));
    }

    fn on_finished(&self, status: BatchStatus) {
        self.finish_bar();
        let mark = match status {
            BatchStatus::Complete => "✓".green(),
            BatchStatus::Stopped => "■".yellow(),
            BatchStatus::NoImages => "-".dimmed(),
        };
        eprintln!("  {} {}", mark, status);
    }
}
