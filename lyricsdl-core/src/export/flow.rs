use async_trait::async_trait;
use tokio::time::sleep;
use tracing::{debug, trace};

use crate::browser::BrowserResult;
use crate::config::ExportSection;
use crate::poll::{bounded_poll, PollOutcome};

use super::channel::{ResultMessage, ResultPort};

pub const TRIGGER_TIMEOUT_ERROR: &str = "Timeout: could not find Export button";
pub const DOWNLOAD_MISSING_ERROR: &str = "Could not find Download button in Export menu";

/// Page-level operations the export automation needs from a sandbox.
#[async_trait(?Send)]
pub trait ExportPage {
    async fn load(&self, url: &str) -> BrowserResult<()>;
    /// Clicks the export trigger if it has rendered. Returns whether it did.
    async fn click_export_trigger(&self) -> BrowserResult<bool>;
    /// Clicks the download entry of the export menu if present.
    async fn click_download(&self) -> BrowserResult<bool>;
}

/// The fixed click sequence run inside a sandbox: wait for the export
/// trigger, open the menu, pick download, then report through the port.
/// Exactly one message is posted per call.
#[derive(Debug, Clone)]
pub struct ExportFlow {
    settings: ExportSection,
}

impl ExportFlow {
    pub fn new(settings: ExportSection) -> Self {
        Self { settings }
    }

    pub async fn drive(&self, page: &dyn ExportPage, url: &str, port: &ResultPort) {
        let message = self.execute(page, url).await;
        debug!(
            sandbox = %port.source(),
            success = message.success,
            error = ?message.error,
            "export flow finished"
        );
        port.post(message);
    }

    async fn execute(&self, page: &dyn ExportPage, url: &str) -> ResultMessage {
        if let Err(err) = page.load(url).await {
            return ResultMessage::failure(url, format!("Navigation failed: {err}"));
        }

        let trigger = bounded_poll(
            self.settings.poll_interval(),
            self.settings.max_poll_attempts,
            |attempt| async move {
                match page.click_export_trigger().await {
                    Ok(true) => Some(()),
                    Ok(false) => None,
                    Err(err) => {
                        trace!(attempt, error = %err, "export trigger check failed");
                        None
                    }
                }
            },
        )
        .await;
        if let PollOutcome::Exhausted { attempts } = trigger {
            debug!(attempts, url, "export trigger never appeared");
            return ResultMessage::failure(url, TRIGGER_TIMEOUT_ERROR);
        }

        sleep(self.settings.trigger_settle()).await;
        match page.click_download().await {
            Ok(true) => {
                sleep(self.settings.download_settle()).await;
                ResultMessage::success(url)
            }
            Ok(false) => ResultMessage::failure(url, DOWNLOAD_MISSING_ERROR),
            Err(err) => ResultMessage::failure(url, format!("{DOWNLOAD_MISSING_ERROR}: {err}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser::BrowserError;
    use crate::export::channel::{Envelope, SandboxId};
    use std::cell::Cell;
    use std::time::Duration;
    use tokio::sync::mpsc;
    use tokio::time::Instant;

    struct ScriptedPage {
        load_fails: bool,
        trigger_after: Option<usize>,
        download: Result<bool, &'static str>,
        trigger_checks: Cell<usize>,
    }

    impl ScriptedPage {
        fn new(trigger_after: Option<usize>, download: Result<bool, &'static str>) -> Self {
            Self {
                load_fails: false,
                trigger_after,
                download,
                trigger_checks: Cell::new(0),
            }
        }
    }

    #[async_trait(?Send)]
    impl ExportPage for ScriptedPage {
        async fn load(&self, _url: &str) -> BrowserResult<()> {
            if self.load_fails {
                Err(BrowserError::Timeout("navigation".into()))
            } else {
                Ok(())
            }
        }

        async fn click_export_trigger(&self) -> BrowserResult<bool> {
            let checks = self.trigger_checks.get() + 1;
            self.trigger_checks.set(checks);
            Ok(self.trigger_after.is_some_and(|after| checks >= after))
        }

        async fn click_download(&self) -> BrowserResult<bool> {
            self.download
                .map_err(|reason| BrowserError::Script(reason.to_string()))
        }
    }

    async fn drive(page: &ScriptedPage) -> (Vec<Envelope>, SandboxId) {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let id = SandboxId::new();
        let port = ResultPort::new(id, tx);
        ExportFlow::new(ExportSection::default())
            .drive(page, "https://songs.example.com/songs/1", &port)
            .await;
        drop(port);
        let mut received = Vec::new();
        while let Some(envelope) = rx.recv().await {
            received.push(envelope);
        }
        (received, id)
    }

    #[tokio::test(start_paused = true)]
    async fn posts_success_after_menu_clicks() {
        let page = ScriptedPage::new(Some(3), Ok(true));
        let start = Instant::now();
        let (received, id) = drive(&page).await;
        assert_eq!(received.len(), 1);
        assert_eq!(received[0].source, id);
        assert!(received[0].message.success);
        assert_eq!(page.trigger_checks.get(), 3);
        // three polls, trigger settle, download settle
        assert_eq!(start.elapsed(), Duration::from_millis(1500 + 800 + 1000));
    }

    #[tokio::test(start_paused = true)]
    async fn missing_trigger_times_out_after_poll_budget() {
        let page = ScriptedPage::new(None, Ok(true));
        let start = Instant::now();
        let (received, _) = drive(&page).await;
        assert_eq!(received.len(), 1);
        assert_eq!(
            received[0].message.error.as_deref(),
            Some(TRIGGER_TIMEOUT_ERROR)
        );
        assert_eq!(page.trigger_checks.get(), 40);
        assert_eq!(start.elapsed(), Duration::from_secs(20));
    }

    #[tokio::test(start_paused = true)]
    async fn missing_download_entry_fails() {
        let page = ScriptedPage::new(Some(1), Ok(false));
        let (received, _) = drive(&page).await;
        assert_eq!(
            received[0].message.error.as_deref(),
            Some(DOWNLOAD_MISSING_ERROR)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn download_click_error_keeps_detail() {
        let page = ScriptedPage::new(Some(1), Err("detached"));
        let (received, _) = drive(&page).await;
        let error = received[0].message.error.clone().unwrap();
        assert!(error.starts_with(DOWNLOAD_MISSING_ERROR));
        assert!(error.contains("detached"));
    }

    #[tokio::test(start_paused = true)]
    async fn navigation_failure_is_reported() {
        let mut page = ScriptedPage::new(Some(1), Ok(true));
        page.load_fails = true;
        let (received, _) = drive(&page).await;
        assert_eq!(received.len(), 1);
        assert!(received[0]
            .message
            .error
            .as_deref()
            .unwrap()
            .starts_with("Navigation failed"));
        assert_eq!(page.trigger_checks.get(), 0);
    }
}
