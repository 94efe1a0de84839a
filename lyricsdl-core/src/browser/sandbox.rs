use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::config::ExportSection;
use crate::export::{ExportFlow, ExportPage, ExportSandbox, ResultPort, SandboxFactory, SandboxId};

use super::automation::{js_string, BrowserAutomation, BrowserContext};
use super::error::{BrowserError, BrowserResult};

/// Opens one background tab per export attempt.
#[derive(Debug, Clone)]
pub struct BrowserSandboxFactory {
    automation: Arc<BrowserAutomation>,
    settings: ExportSection,
}

impl BrowserSandboxFactory {
    pub fn new(automation: Arc<BrowserAutomation>, settings: ExportSection) -> Self {
        Self {
            automation,
            settings,
        }
    }
}

#[async_trait(?Send)]
impl SandboxFactory for BrowserSandboxFactory {
    async fn create(&self) -> BrowserResult<Box<dyn ExportSandbox>> {
        let context = self.automation.new_background_context().await?;
        context.with_metrics(|metrics| metrics.record_sandbox_created());
        let sandbox = BrowserExportSandbox {
            id: SandboxId::new(),
            context: Some(context),
            flow: ExportFlow::new(self.settings.clone()),
            settings: self.settings.clone(),
        };
        debug!(sandbox = %sandbox.id, "export sandbox opened");
        Ok(Box::new(sandbox))
    }
}

#[derive(Debug)]
pub struct BrowserExportSandbox {
    id: SandboxId,
    context: Option<BrowserContext>,
    flow: ExportFlow,
    settings: ExportSection,
}

impl BrowserExportSandbox {
    fn context(&self) -> BrowserResult<&BrowserContext> {
        self.context
            .as_ref()
            .ok_or_else(|| BrowserError::Unexpected(format!("sandbox {} already destroyed", self.id)))
    }
}

#[async_trait(?Send)]
impl ExportPage for BrowserExportSandbox {
    async fn load(&self, url: &str) -> BrowserResult<()> {
        self.context()?.goto(url).await
    }

    async fn click_export_trigger(&self) -> BrowserResult<bool> {
        let script = format!(
            r#"(() => {{
    const marker = document.querySelector({});
    if (!marker) return false;
    const target = marker.closest('button') || marker.parentElement;
    if (!target) return false;
    target.click();
    return true;
}})()"#,
            js_string(&self.settings.trigger_selector)
        );
        self.context()?
            .evaluate(&script, "click export trigger")
            .await
    }

    async fn click_download(&self) -> BrowserResult<bool> {
        let script = format!(
            "(() => {{ const el = document.querySelector({}); if (!el) return false; el.click(); return true; }})()",
            js_string(&self.settings.download_selector)
        );
        self.context()?.evaluate(&script, "click download").await
    }
}

#[async_trait(?Send)]
impl ExportSandbox for BrowserExportSandbox {
    fn id(&self) -> SandboxId {
        self.id
    }

    async fn drive(&self, url: &str, port: &ResultPort) {
        self.flow.drive(self, url, port).await;
    }

    async fn destroy(&mut self) -> BrowserResult<()> {
        let Some(context) = self.context.take() else {
            return Ok(());
        };
        context.with_metrics(|metrics| metrics.record_sandbox_destroyed());
        debug!(sandbox = %self.id, "closing export sandbox");
        context.close().await
    }
}
