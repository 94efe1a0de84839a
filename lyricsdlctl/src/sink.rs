use std::time::Duration;

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use lyricsdl_core::{Severity, StatusSink};

use crate::folder::{Prompt, PromptAnswer, PromptHost};

const BAR_TEMPLATE: &str = "{spinner} {msg} [{elapsed_precise}] [{bar:30.cyan/blue}] {pos}/{len}";

/// Terminal rendition of the run overlay: one progress bar plus log lines
/// printed above it.
#[derive(Clone)]
pub struct TerminalSink {
    bar: ProgressBar,
}

impl TerminalSink {
    pub fn new() -> Self {
        let bar = ProgressBar::new(0);
        let style = ProgressStyle::default_bar()
            .template(BAR_TEMPLATE)
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=> ");
        bar.set_style(style);
        bar.enable_steady_tick(Duration::from_millis(120));
        Self { bar }
    }

    /// A sink that renders nothing, for non-interactive output.
    pub fn hidden() -> Self {
        let bar = ProgressBar::with_draw_target(Some(0), ProgressDrawTarget::hidden());
        Self { bar }
    }
}

impl Default for TerminalSink {
    fn default() -> Self {
        Self::new()
    }
}

pub fn format_line(message: &str, severity: Severity) -> String {
    match severity {
        Severity::Plain => message.to_string(),
        Severity::Success => format!("  ✓ {message}"),
        Severity::Skip => format!("  - {message}"),
        Severity::Error => format!("  ✗ {message}"),
    }
}

impl StatusSink for TerminalSink {
    fn set_status(&self, text: &str) {
        self.bar.set_message(text.to_string());
    }

    fn set_progress(&self, current: usize, total: usize) {
        self.bar.set_length(total as u64);
        self.bar.set_position(current as u64);
    }

    fn log(&self, message: &str, severity: Severity) {
        self.bar.println(format_line(message, severity));
    }

    fn show_close(&self) {
        self.bar.finish();
    }
}

impl PromptHost for TerminalSink {
    /// Clears the bar and holds its redraws until the prompt returns.
    fn suspend(&self, prompt: Prompt<'_>) -> PromptAnswer {
        self.bar.suspend(prompt)
    }
}
