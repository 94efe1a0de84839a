mod common;

use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use async_trait::async_trait;
use lyricsdl_core::config::ScheduleSection;
use lyricsdl_core::export::{ExportOutcome, ItemExporter};
use lyricsdl_core::{BatchScheduler, ItemRecord, RunSummary, Severity};
use tokio::time::Instant;

use common::{row, ui};

/// Replays scripted outcomes per title; anything unscripted succeeds.
#[derive(Default)]
struct ScriptedExporter {
    outcomes: HashMap<String, VecDeque<ExportOutcome>>,
    calls: Vec<(String, usize, Duration)>,
    started: Option<Instant>,
}

impl ScriptedExporter {
    fn script(mut self, title: &str, outcomes: Vec<ExportOutcome>) -> Self {
        self.outcomes.insert(title.to_string(), outcomes.into());
        self
    }
}

#[async_trait(?Send)]
impl ItemExporter for ScriptedExporter {
    async fn export(&mut self, item: &ItemRecord, attempt: usize) -> ExportOutcome {
        let started = *self.started.get_or_insert_with(Instant::now);
        self.calls
            .push((item.title.clone(), attempt, started.elapsed()));
        self.outcomes
            .get_mut(&item.title)
            .and_then(VecDeque::pop_front)
            .unwrap_or_else(ExportOutcome::succeeded)
    }
}

fn items(titles: &[&str]) -> Vec<ItemRecord> {
    titles
        .iter()
        .map(|title| ItemRecord::from_row(row(title, true)))
        .collect()
}

#[tokio::test(start_paused = true)]
async fn always_failing_item_is_attempted_exactly_twice() {
    let mut exporter = ScriptedExporter::default().script(
        "Holy",
        vec![
            ExportOutcome::failed("Timeout (30s)"),
            ExportOutcome::failed("Timeout (30s)"),
            ExportOutcome::failed("never reached"),
        ],
    );
    let (ui, sink) = ui();
    let summary = BatchScheduler::new(ScheduleSection::default())
        .run(&items(&["Holy"]), &ui, &mut exporter)
        .await;

    assert_eq!(
        summary,
        RunSummary {
            failed: 1,
            ..RunSummary::default()
        }
    );
    let attempts: Vec<_> = exporter.calls.iter().map(|call| call.1).collect();
    assert_eq!(attempts, vec![1, 2]);
    assert_eq!(exporter.calls[1].2, Duration::from_secs(2));
    assert_eq!(
        sink.logs(),
        vec![("Failed: Holy — Timeout (30s)".to_string(), Severity::Error)]
    );
}

#[tokio::test(start_paused = true)]
async fn retry_success_is_labelled() {
    let mut exporter = ScriptedExporter::default().script(
        "Above All",
        vec![ExportOutcome::failed("Could not find Download button in Export menu")],
    );
    let (ui, sink) = ui();
    let summary = BatchScheduler::new(ScheduleSection::default())
        .run(&items(&["Above All"]), &ui, &mut exporter)
        .await;
    assert_eq!(summary.completed, 1);
    assert_eq!(
        sink.logs(),
        vec![("Downloaded (retry): Above All".to_string(), Severity::Success)]
    );
}

#[tokio::test(start_paused = true)]
async fn progress_tracks_position_in_order() {
    let mut exporter = ScriptedExporter::default().script(
        "B",
        vec![
            ExportOutcome::failed("x"),
            ExportOutcome {
                success: false,
                error: None,
            },
        ],
    );
    let (ui, sink) = ui();
    let list = items(&["A", "B", "C"]);
    let summary = BatchScheduler::new(ScheduleSection::default())
        .run(&list, &ui, &mut exporter)
        .await;

    assert_eq!(summary.completed, 2);
    assert_eq!(summary.failed, 1);
    assert_eq!(sink.progress(), vec![(0, 3), (1, 3), (2, 3), (3, 3)]);
    let logs: Vec<_> = sink.logs().into_iter().map(|(text, _)| text).collect();
    assert_eq!(
        logs,
        vec!["Downloaded: A", "Failed: B — unknown error", "Downloaded: C"]
    );
    // status always agrees with the bar
    assert_eq!(
        sink.statuses(),
        vec![
            "Downloading lyrics (0 / 3)...",
            "Downloading lyrics (1 / 3)...",
            "Downloading lyrics (2 / 3)...",
            "Downloading lyrics (3 / 3)...",
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn items_are_spaced_by_the_inter_item_delay() {
    let mut exporter = ScriptedExporter::default();
    let (ui, _) = ui();
    let start = Instant::now();
    BatchScheduler::new(ScheduleSection::default())
        .run(&items(&["A", "B"]), &ui, &mut exporter)
        .await;
    let offsets: Vec<_> = exporter.calls.iter().map(|call| call.2).collect();
    assert_eq!(offsets, vec![Duration::ZERO, Duration::from_secs(1)]);
    // the delay also follows the last item
    assert_eq!(start.elapsed(), Duration::from_secs(2));
}

#[tokio::test(start_paused = true)]
async fn empty_batch_reports_zero_progress() {
    let mut exporter = ScriptedExporter::default();
    let (ui, sink) = ui();
    let summary = BatchScheduler::new(ScheduleSection::default())
        .run(&[], &ui, &mut exporter)
        .await;
    assert_eq!(summary, RunSummary::default());
    assert_eq!(sink.progress(), vec![(0, 0)]);
    assert!(exporter.calls.is_empty());
}
