//! Top-level download run: enumerate, scan, dedup, schedule.

use serde::Serialize;
use thiserror::Error;
use tracing::{error, info};

use crate::browser::BrowserError;
use crate::catalog::{CatalogEnumerator, CatalogPage};
use crate::config::LyricsdlConfig;
use crate::export::{partition, ExistingExportScanner, FolderAccess, ItemExporter, ScanError};
use crate::scheduler::{BatchScheduler, RunSummary};
use crate::ui::{Severity, UiSession};

#[derive(Debug, Error)]
pub enum RunError {
    #[error("catalog enumeration failed: {0}")]
    Catalog(#[from] BrowserError),
    #[error(transparent)]
    Scan(#[from] ScanError),
}

/// How a run ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RunReport {
    NoItems,
    NoExportable { no_lyrics: usize },
    Cancelled,
    NothingNew { summary: RunSummary },
    Completed { summary: RunSummary },
    Failed { detail: String },
}

impl RunReport {
    pub fn summary(&self) -> Option<&RunSummary> {
        match self {
            RunReport::NothingNew { summary } | RunReport::Completed { summary } => Some(summary),
            _ => None,
        }
    }

    pub fn is_failure(&self) -> bool {
        match self {
            RunReport::Failed { .. } => true,
            RunReport::Completed { summary } => summary.failed > 0,
            _ => false,
        }
    }
}

/// One end-to-end run over a catalog view.
pub struct DownloadRun<'a> {
    catalog: &'a dyn CatalogPage,
    folder: &'a dyn FolderAccess,
    exporter: &'a mut dyn ItemExporter,
    enumerator: CatalogEnumerator,
    scanner: ExistingExportScanner,
    scheduler: BatchScheduler,
}

impl<'a> DownloadRun<'a> {
    pub fn new(
        config: &LyricsdlConfig,
        catalog: &'a dyn CatalogPage,
        folder: &'a dyn FolderAccess,
        exporter: &'a mut dyn ItemExporter,
    ) -> Self {
        Self {
            catalog,
            folder,
            exporter,
            enumerator: CatalogEnumerator::new(config.catalog.clone()),
            scanner: ExistingExportScanner::new(config.export.file_extension.clone()),
            scheduler: BatchScheduler::new(config.schedule.clone()),
        }
    }

    /// Runs the pipeline. Every ending, including errors, leaves the UI in a
    /// closable state.
    pub async fn run(mut self, ui: &UiSession) -> RunReport {
        let report = match self.execute(ui).await {
            Ok(report) => report,
            Err(err) => {
                error!(error = %err, "download run failed");
                ui.set_status("An error occurred.");
                let detail = err.to_string();
                ui.log(&format!("Error: {detail}"), Severity::Error);
                RunReport::Failed { detail }
            }
        };
        ui.show_close();
        report
    }

    async fn execute(&mut self, ui: &UiSession) -> Result<RunReport, RunError> {
        ui.set_status("Collecting songs from all pages...");
        let items = self.enumerator.enumerate_all(self.catalog, ui).await?;
        if items.is_empty() {
            ui.set_status("No songs found on the page.");
            return Ok(RunReport::NoItems);
        }
        ui.log(&format!("Found {} songs total.", items.len()), Severity::Success);

        let (with_lyrics, without_lyrics): (Vec<_>, Vec<_>) =
            items.into_iter().partition(|item| item.exportable());
        let no_lyrics = without_lyrics.len();
        if no_lyrics > 0 {
            ui.log(
                &format!("{no_lyrics} song(s) have no lyrics link and will be skipped."),
                Severity::Skip,
            );
        }
        if with_lyrics.is_empty() {
            ui.set_status("No songs with lyrics found.");
            return Ok(RunReport::NoExportable { no_lyrics });
        }

        ui.set_status("Select the folder where your lyrics are saved (for dedup)...");
        let Some(existing) = self.scanner.scan(self.folder).await? else {
            ui.set_status("Folder selection cancelled.");
            ui.log("Download cancelled by user.", Severity::Error);
            info!("folder selection cancelled, nothing downloaded");
            return Ok(RunReport::Cancelled);
        };

        let split = partition(with_lyrics, &existing);
        let skipped = split.skipped.len();
        for item in &split.skipped {
            ui.log(
                &format!("Already exists, skipped: {}", item.title),
                Severity::Skip,
            );
        }
        if skipped > 0 {
            ui.log(
                &format!("{skipped} song(s) already in folder, skipped."),
                Severity::Skip,
            );
        }

        if split.to_download.is_empty() {
            ui.set_status("All songs already downloaded!");
            ui.log("Nothing new to download.", Severity::Success);
            let summary = RunSummary {
                skipped,
                no_lyrics,
                ..RunSummary::default()
            };
            return Ok(RunReport::NothingNew { summary });
        }

        let scheduled = self
            .scheduler
            .run(&split.to_download, ui, &mut *self.exporter)
            .await;
        let summary = RunSummary {
            skipped,
            no_lyrics,
            ..scheduled
        };

        ui.set_status("Complete!");
        ui.log("", Severity::Plain);
        let severity = if summary.failed == 0 {
            Severity::Success
        } else {
            Severity::Error
        };
        ui.log(&format!("Done! {summary}."), severity);
        info!(
            completed = summary.completed,
            failed = summary.failed,
            skipped = summary.skipped,
            no_lyrics = summary.no_lyrics,
            "download run complete"
        );
        Ok(RunReport::Completed { summary })
    }
}
