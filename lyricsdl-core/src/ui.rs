//! Status reporting seam between the download pipeline and whatever shows
//! progress to the user.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::Serialize;
use tracing::{error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Plain,
    Success,
    Skip,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Severity::Plain => "plain",
            Severity::Success => "success",
            Severity::Skip => "skip",
            Severity::Error => "error",
        };
        f.write_str(label)
    }
}

/// Receives status, progress and log updates. Implementations must not
/// block; the pipeline never inspects a return value.
pub trait StatusSink: Send + Sync {
    fn set_status(&self, text: &str);
    fn set_progress(&self, current: usize, total: usize);
    fn log(&self, message: &str, severity: Severity);
    fn show_close(&self);
}

/// Per-run handle on the status sink. Once closed, every update is dropped;
/// closing never interrupts the work already in flight.
pub struct UiSession {
    sink: Arc<dyn StatusSink>,
    closed: AtomicBool,
}

impl UiSession {
    pub fn new(sink: Arc<dyn StatusSink>) -> Self {
        Self {
            sink,
            closed: AtomicBool::new(false),
        }
    }

    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn set_status(&self, text: &str) {
        if !self.is_closed() {
            self.sink.set_status(text);
        }
    }

    pub fn set_progress(&self, current: usize, total: usize) {
        if !self.is_closed() {
            self.sink.set_progress(current, total);
        }
    }

    pub fn log(&self, message: &str, severity: Severity) {
        if !self.is_closed() {
            self.sink.log(message, severity);
        }
    }

    pub fn show_close(&self) {
        if !self.is_closed() {
            self.sink.show_close();
        }
    }
}

impl fmt::Debug for UiSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UiSession")
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}

/// Sink that forwards everything to `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl StatusSink for TracingSink {
    fn set_status(&self, text: &str) {
        info!(status = %text, "status");
    }

    fn set_progress(&self, current: usize, total: usize) {
        info!(current, total, "progress");
    }

    fn log(&self, message: &str, severity: Severity) {
        if message.is_empty() {
            return;
        }
        match severity {
            Severity::Error => error!(%severity, "{message}"),
            Severity::Skip => warn!(%severity, "{message}"),
            Severity::Plain | Severity::Success => info!(%severity, "{message}"),
        }
    }

    fn show_close(&self) {
        info!("run finished");
    }
}
