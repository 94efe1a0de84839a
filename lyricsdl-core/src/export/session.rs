use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use tokio::sync::mpsc;
use tokio::time::sleep;
use tracing::{debug, info, warn};
use url::Url;

use crate::browser::{BrowserMetrics, BrowserResult};
use crate::catalog::ItemRecord;

use super::channel::{Envelope, ResultPort, SandboxId};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExportOutcome {
    pub success: bool,
    pub error: Option<String>,
}

impl ExportOutcome {
    pub fn succeeded() -> Self {
        Self {
            success: true,
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
        }
    }
}

/// An isolated context that runs the export automation for one attempt.
#[async_trait(?Send)]
pub trait ExportSandbox {
    fn id(&self) -> SandboxId;
    /// Opens `url` and runs the export automation, reporting the result
    /// through `port`.
    async fn drive(&self, url: &str, port: &ResultPort);
    /// Tears the context down. Called exactly once per sandbox.
    async fn destroy(&mut self) -> BrowserResult<()>;
}

#[async_trait(?Send)]
pub trait SandboxFactory {
    async fn create(&self) -> BrowserResult<Box<dyn ExportSandbox>>;
}

/// Anything able to export one item per call. `attempt` starts at 1.
#[async_trait(?Send)]
pub trait ItemExporter {
    async fn export(&mut self, item: &ItemRecord, attempt: usize) -> ExportOutcome;
}

/// Settles an attempt exactly once, whichever signal comes first.
#[derive(Debug)]
struct AttemptGuard {
    trusted: SandboxId,
    settled: bool,
}

impl AttemptGuard {
    fn new(trusted: SandboxId) -> Self {
        Self {
            trusted,
            settled: false,
        }
    }

    fn accept(&mut self, envelope: Envelope) -> Option<ExportOutcome> {
        if envelope.source != self.trusted {
            debug!(
                expected = %self.trusted,
                source = %envelope.source,
                "ignoring message from foreign sandbox"
            );
            return None;
        }
        if !envelope.message.is_result() {
            debug!(kind = %envelope.message.kind, "ignoring non-result message");
            return None;
        }
        let outcome = if envelope.message.success {
            ExportOutcome::succeeded()
        } else {
            ExportOutcome {
                success: false,
                error: envelope.message.error,
            }
        };
        self.settle(outcome)
    }

    fn expire(&mut self, timeout: Duration) -> Option<ExportOutcome> {
        self.settle(ExportOutcome::failed(timeout_label(timeout)))
    }

    fn settle(&mut self, outcome: ExportOutcome) -> Option<ExportOutcome> {
        if self.settled {
            return None;
        }
        self.settled = true;
        Some(outcome)
    }
}

fn timeout_label(timeout: Duration) -> String {
    if timeout < Duration::from_secs(1) {
        format!("Timeout ({}ms)", timeout.as_millis())
    } else {
        format!("Timeout ({}s)", timeout.as_secs())
    }
}

/// Runs each export attempt in a fresh sandbox, bounded by a timeout.
///
/// The session owns the listening end of the result channel for its whole
/// life. Each attempt trusts only the sandbox it created; anything else that
/// arrives on the channel is dropped.
pub struct ExportSession {
    factory: Arc<dyn SandboxFactory>,
    origin: Url,
    timeout: Duration,
    tx: mpsc::UnboundedSender<Envelope>,
    rx: mpsc::UnboundedReceiver<Envelope>,
    metrics: Option<Arc<Mutex<BrowserMetrics>>>,
}

impl ExportSession {
    pub fn new(factory: Arc<dyn SandboxFactory>, base: &Url, timeout: Duration) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let origin =
            Url::parse(&base.origin().ascii_serialization()).unwrap_or_else(|_| base.clone());
        Self {
            factory,
            origin,
            timeout,
            tx,
            rx,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<Mutex<BrowserMetrics>>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn origin(&self) -> &Url {
        &self.origin
    }

    /// Resolves the item's export link against the catalog origin.
    pub fn resolve(&self, item: &ItemRecord) -> Result<Url, String> {
        let link = item
            .resource_url
            .as_deref()
            .ok_or_else(|| "Item has no export link".to_string())?;
        self.origin
            .join(link)
            .map_err(|err| format!("Invalid export link {link:?}: {err}"))
    }

    /// One export attempt. Never fails: every problem is reported as an
    /// unsuccessful outcome.
    pub async fn run(&mut self, item: &ItemRecord) -> ExportOutcome {
        let url = match self.resolve(item) {
            Ok(url) => url,
            Err(reason) => return ExportOutcome::failed(reason),
        };

        let mut sandbox = match self.factory.create().await {
            Ok(sandbox) => sandbox,
            Err(err) => return ExportOutcome::failed(format!("Failed to open sandbox: {err}")),
        };
        let sandbox_id = sandbox.id();
        debug!(sandbox = %sandbox_id, url = %url, title = %item.title, "export attempt started");

        let outcome = {
            let timeout = self.timeout;
            let mut guard = AttemptGuard::new(sandbox_id);
            let port = ResultPort::new(sandbox_id, self.tx.clone());
            let deadline = sleep(timeout);
            tokio::pin!(deadline);
            let drive = sandbox.drive(url.as_str(), &port);
            tokio::pin!(drive);
            let mut driving = true;

            // a result posted at the deadline wins over the timeout
            loop {
                tokio::select! {
                    biased;
                    envelope = self.rx.recv() => {
                        let Some(envelope) = envelope else {
                            break ExportOutcome::failed("Result channel closed");
                        };
                        if let Some(outcome) = guard.accept(envelope) {
                            break outcome;
                        }
                    }
                    _ = &mut drive, if driving => {
                        driving = false;
                    }
                    _ = &mut deadline => {
                        if let Some(outcome) = guard.expire(timeout) {
                            break outcome;
                        }
                    }
                }
            }
        };

        if let Err(err) = sandbox.destroy().await {
            warn!(sandbox = %sandbox_id, error = %err, "failed to destroy export sandbox");
        }
        debug!(
            sandbox = %sandbox_id,
            success = outcome.success,
            error = ?outcome.error,
            "export attempt finished"
        );
        outcome
    }
}

#[async_trait(?Send)]
impl ItemExporter for ExportSession {
    async fn export(&mut self, item: &ItemRecord, attempt: usize) -> ExportOutcome {
        if attempt > 1 {
            info!(title = %item.title, attempt, "retrying export");
        }
        let outcome = self.run(item).await;
        if let Some(metrics) = &self.metrics {
            if let Ok(mut guard) = metrics.lock() {
                guard.record_export_attempt(outcome.success);
                if attempt > 1 {
                    guard.record_retry();
                }
            }
        }
        outcome
    }
}
