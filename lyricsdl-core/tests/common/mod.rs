#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use lyricsdl_core::catalog::RawItemRow;
use lyricsdl_core::{Severity, StatusSink, UiSession};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UiEvent {
    Status(String),
    Progress(usize, usize),
    Log(String, Severity),
    Close,
}

#[derive(Default)]
pub struct RecordingSink {
    events: Mutex<Vec<UiEvent>>,
}

impl RecordingSink {
    pub fn events(&self) -> Vec<UiEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn statuses(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                UiEvent::Status(text) => Some(text),
                _ => None,
            })
            .collect()
    }

    pub fn logs(&self) -> Vec<(String, Severity)> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                UiEvent::Log(text, severity) => Some((text, severity)),
                _ => None,
            })
            .collect()
    }

    pub fn progress(&self) -> Vec<(usize, usize)> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                UiEvent::Progress(current, total) => Some((current, total)),
                _ => None,
            })
            .collect()
    }
}

impl StatusSink for RecordingSink {
    fn set_status(&self, text: &str) {
        self.events
            .lock()
            .unwrap()
            .push(UiEvent::Status(text.to_string()));
    }

    fn set_progress(&self, current: usize, total: usize) {
        self.events
            .lock()
            .unwrap()
            .push(UiEvent::Progress(current, total));
    }

    fn log(&self, message: &str, severity: Severity) {
        self.events
            .lock()
            .unwrap()
            .push(UiEvent::Log(message.to_string(), severity));
    }

    fn show_close(&self) {
        self.events.lock().unwrap().push(UiEvent::Close);
    }
}

pub fn ui() -> (UiSession, Arc<RecordingSink>) {
    let sink = Arc::new(RecordingSink::default());
    (UiSession::new(sink.clone()), sink)
}

pub fn row(title: &str, export: bool) -> RawItemRow {
    let slug = title.to_lowercase().replace(' ', "-");
    RawItemRow {
        title: Some(title.to_string()),
        href: Some(format!("/songs/{slug}")),
        export_href: export.then(|| format!("/songs/{slug}/viewlyrics")),
    }
}
