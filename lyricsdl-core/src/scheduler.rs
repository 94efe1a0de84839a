use std::fmt;

use serde::Serialize;
use tokio::time::sleep;
use tracing::{info, warn};

use crate::catalog::ItemRecord;
use crate::config::ScheduleSection;
use crate::export::{ExportOutcome, ItemExporter};
use crate::ui::{Severity, UiSession};

const UNKNOWN_ERROR: &str = "unknown error";

/// Final counters of one download run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub completed: usize,
    pub failed: usize,
    pub skipped: usize,
    pub no_lyrics: usize,
}

impl RunSummary {
    pub fn processed(&self) -> usize {
        self.completed.saturating_add(self.failed)
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} downloaded", self.completed)?;
        if self.skipped > 0 {
            write!(f, ", {} already existed", self.skipped)?;
        }
        if self.failed > 0 {
            write!(f, ", {} failed", self.failed)?;
        }
        if self.no_lyrics > 0 {
            write!(f, ", {} no lyrics", self.no_lyrics)?;
        }
        Ok(())
    }
}

/// Exports items one after another with a single retry per item.
#[derive(Debug, Clone)]
pub struct BatchScheduler {
    settings: ScheduleSection,
}

impl BatchScheduler {
    pub fn new(settings: ScheduleSection) -> Self {
        Self { settings }
    }

    /// Returns a summary with `completed` and `failed` filled in. The caller
    /// owns the dedup and no-lyrics counters.
    pub async fn run(
        &self,
        items: &[ItemRecord],
        ui: &UiSession,
        exporter: &mut dyn ItemExporter,
    ) -> RunSummary {
        let total = items.len();
        let mut summary = RunSummary::default();
        ui.set_progress(0, total);
        ui.set_status(&format!("Downloading lyrics (0 / {total})..."));

        for item in items {
            let mut outcome = exporter.export(item, 1).await;
            let mut retried = false;
            if !outcome.success {
                warn!(
                    title = %item.title,
                    error = ?outcome.error,
                    cooldown_ms = self.settings.retry_cooldown_ms,
                    "export failed, retrying once"
                );
                sleep(self.settings.retry_cooldown()).await;
                outcome = exporter.export(item, 2).await;
                retried = true;
            }

            self.record(&mut summary, item, &outcome, retried, ui);
            let processed = summary.processed();
            ui.set_progress(processed, total);
            ui.set_status(&format!("Downloading lyrics ({processed} / {total})..."));

            sleep(self.settings.item_delay()).await;
        }

        info!(
            completed = summary.completed,
            failed = summary.failed,
            total,
            "batch finished"
        );
        summary
    }

    fn record(
        &self,
        summary: &mut RunSummary,
        item: &ItemRecord,
        outcome: &ExportOutcome,
        retried: bool,
        ui: &UiSession,
    ) {
        if outcome.success {
            summary.completed += 1;
            let line = if retried {
                format!("Downloaded (retry): {}", item.title)
            } else {
                format!("Downloaded: {}", item.title)
            };
            ui.log(&line, Severity::Success);
        } else {
            summary.failed += 1;
            let reason = outcome.error.as_deref().unwrap_or(UNKNOWN_ERROR);
            ui.log(&format!("Failed: {} — {reason}", item.title), Severity::Error);
        }
    }
}
