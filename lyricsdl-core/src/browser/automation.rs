use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chromiumoxide::browser::{Browser, BrowserConfig as ChromiumConfig};
use chromiumoxide::cdp::browser_protocol::browser::{
    SetDownloadBehaviorBehavior, SetDownloadBehaviorParams,
};
use chromiumoxide::cdp::browser_protocol::page::NavigateParams;
use chromiumoxide::cdp::browser_protocol::target::CreateTargetParams;
use chromiumoxide::page::Page;
use futures::StreamExt;
use serde::de::DeserializeOwned;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::ChromiumSection;

use super::error::{BrowserError, BrowserResult};
use super::metrics::BrowserMetrics;
use super::profile::{BrowserProfile, ProfileManager};

#[derive(Debug, Clone, Default)]
pub struct LaunchOverrides {
    pub headless: Option<bool>,
}

#[derive(Debug, Clone)]
pub struct BrowserLauncher {
    config: Arc<ChromiumSection>,
    profiles: ProfileManager,
}

impl BrowserLauncher {
    pub fn new(config: ChromiumSection, profiles: ProfileManager) -> Self {
        Self {
            config: Arc::new(config),
            profiles,
        }
    }

    pub fn config(&self) -> &ChromiumSection {
        &self.config
    }

    pub fn profile_manager(&self) -> &ProfileManager {
        &self.profiles
    }

    pub async fn launch(&self) -> BrowserResult<BrowserAutomation> {
        self.launch_with_overrides(LaunchOverrides::default()).await
    }

    pub async fn launch_with_overrides(
        &self,
        overrides: LaunchOverrides,
    ) -> BrowserResult<BrowserAutomation> {
        let profile = self.profiles.open(&self.config.profile_name)?;
        let headless = overrides.headless.unwrap_or(self.config.headless);
        let chromium_config = self.build_chromium_config(&profile, headless)?;
        info!(
            profile = %profile.name(),
            path = %profile.path().display(),
            headless,
            "Launching Chromium instance"
        );

        let (browser, mut handler) = Browser::launch(chromium_config)
            .await
            .map_err(|err| BrowserError::Launch(err.to_string()))?;

        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(err) = event {
                    debug!(error = %err, "Chromium handler reported error");
                }
            }
        });

        profile.touch().await?;

        Ok(BrowserAutomation {
            browser,
            profile,
            handler_task: Some(handler_task),
            config: Arc::clone(&self.config),
            metrics: Arc::new(Mutex::new(BrowserMetrics::default())),
        })
    }

    fn build_chromium_config(
        &self,
        profile: &BrowserProfile,
        headless: bool,
    ) -> BrowserResult<ChromiumConfig> {
        let mut builder = ChromiumConfig::builder()
            .chrome_executable(&self.config.executable_path)
            .user_data_dir(profile.path());

        if !headless {
            builder = builder.with_head();
        }
        if !self.config.sandbox {
            builder = builder.no_sandbox();
        }
        if let Some(timeout) = self.config.request_timeout_seconds {
            builder = builder.request_timeout(Duration::from_secs(timeout));
        }

        builder = builder.args(self.chromium_args());
        builder.build().map_err(BrowserError::Configuration)
    }

    fn chromium_args(&self) -> Vec<String> {
        let mut args = Vec::new();
        if self.config.disable_gpu {
            args.push("--disable-gpu".to_string());
        }
        if let Some(lang) = &self.config.lang {
            args.push(format!("--lang={lang}"));
        }
        args.push("--no-first-run".into());
        args.push("--password-store=basic".into());
        args.extend(self.config.extra_args.iter().cloned());
        args
    }
}

/// A running Chromium instance. Call [`BrowserAutomation::shutdown`] before
/// dropping it.
#[derive(Debug)]
pub struct BrowserAutomation {
    browser: Browser,
    profile: BrowserProfile,
    handler_task: Option<JoinHandle<()>>,
    config: Arc<ChromiumSection>,
    metrics: Arc<Mutex<BrowserMetrics>>,
}

impl BrowserAutomation {
    pub fn profile(&self) -> &BrowserProfile {
        &self.profile
    }

    pub fn config(&self) -> &ChromiumSection {
        &self.config
    }

    pub fn metrics(&self) -> BrowserMetrics {
        self.metrics
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or_default()
    }

    pub fn metrics_handle(&self) -> Arc<Mutex<BrowserMetrics>> {
        Arc::clone(&self.metrics)
    }

    /// Opens a foreground tab.
    pub async fn new_context(&self) -> BrowserResult<BrowserContext> {
        self.open_context(CreateTargetParams::new("about:blank"))
            .await
    }

    /// Opens a tab that does not take focus from the catalog tab.
    pub async fn new_background_context(&self) -> BrowserResult<BrowserContext> {
        let params = CreateTargetParams::builder()
            .url("about:blank")
            .background(true)
            .build()
            .map_err(BrowserError::Configuration)?;
        self.open_context(params).await
    }

    async fn open_context(&self, params: CreateTargetParams) -> BrowserResult<BrowserContext> {
        if let Ok(mut metrics) = self.metrics.lock() {
            metrics.record_page_open();
        }
        let page = self.browser.new_page(params).await?;
        Ok(BrowserContext {
            page,
            metrics: Arc::clone(&self.metrics),
        })
    }

    /// Sends browser-initiated downloads to `dir`.
    pub async fn set_download_dir(&self, dir: &Path) -> BrowserResult<()> {
        let params = SetDownloadBehaviorParams::builder()
            .behavior(SetDownloadBehaviorBehavior::Allow)
            .download_path(dir.to_string_lossy().into_owned())
            .build()
            .map_err(BrowserError::Configuration)?;
        self.browser.execute(params).await?;
        info!(dir = %dir.display(), "download directory set");
        Ok(())
    }

    pub async fn shutdown(mut self) -> BrowserResult<()> {
        let metrics = self.metrics();
        info!(
            profile = %self.profile.name(),
            pages_opened = metrics.pages_opened,
            sandboxes_created = metrics.sandboxes_created,
            live_sandboxes = metrics.live_sandboxes(),
            export_attempts = metrics.export_attempts,
            export_failures = metrics.export_failures,
            success_rate = metrics.export_success_rate(),
            retries = metrics.retries,
            "Shutting down Chromium instance"
        );
        if let Err(err) = self.browser.close().await {
            warn!(error = %err, "Failed to close browser gracefully");
        }
        if let Some(handle) = self.handler_task.take() {
            if let Err(err) = handle.await {
                warn!(error = %err, "Browser handler join error");
            }
        }
        Ok(())
    }
}

impl Drop for BrowserAutomation {
    fn drop(&mut self) {
        if let Some(handle) = &self.handler_task {
            if !handle.is_finished() {
                warn!(
                    profile = %self.profile.name(),
                    "BrowserAutomation dropped without explicit shutdown"
                );
            }
        }
    }
}

/// One browser tab.
#[derive(Debug)]
pub struct BrowserContext {
    page: Page,
    metrics: Arc<Mutex<BrowserMetrics>>,
}

impl BrowserContext {
    pub fn page(&self) -> &Page {
        &self.page
    }

    pub async fn goto(&self, url: &str) -> BrowserResult<()> {
        let params = NavigateParams::builder()
            .url(url)
            .build()
            .map_err(BrowserError::Configuration)?;
        self.page.goto(params).await?;
        self.page.wait_for_navigation().await?;
        Ok(())
    }

    pub async fn current_url(&self) -> BrowserResult<Option<String>> {
        Ok(self.page.url().await?)
    }

    /// Runs `script` in the page and decodes its return value. `what` names
    /// the script in error messages.
    pub async fn evaluate<T: DeserializeOwned>(&self, script: &str, what: &str) -> BrowserResult<T> {
        self.page
            .evaluate(script)
            .await
            .map_err(|err| BrowserError::Script(format!("{what}: {err}")))?
            .into_value()
            .map_err(|err| BrowserError::Script(format!("failed to decode {what} result: {err}")))
    }

    pub fn with_metrics<F>(&self, f: F)
    where
        F: FnOnce(&mut BrowserMetrics),
    {
        if let Ok(mut guard) = self.metrics.lock() {
            f(&mut guard);
        }
    }

    pub async fn close(self) -> BrowserResult<()> {
        self.page.close().await?;
        Ok(())
    }
}

/// Encodes `value` as a JavaScript string literal.
pub(crate) fn js_string(value: &str) -> String {
    serde_json::Value::String(value.to_string()).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn chromium(extra_args: Vec<String>) -> ChromiumSection {
        ChromiumSection {
            executable_path: "/usr/bin/chromium".into(),
            headless: true,
            sandbox: true,
            disable_gpu: true,
            request_timeout_seconds: Some(60),
            profile_dir: "profiles".into(),
            profile_name: "default".into(),
            lang: Some("en-US".into()),
            extra_args,
        }
    }

    #[test]
    fn args_follow_chromium_section() {
        let dir = tempdir().unwrap();
        let launcher = BrowserLauncher::new(
            chromium(vec!["--window-size=1280,900".into()]),
            ProfileManager::new(dir.path()).unwrap(),
        );
        let args = launcher.chromium_args();
        assert_eq!(args[0], "--disable-gpu");
        assert!(args.contains(&"--lang=en-US".to_string()));
        assert_eq!(args.last().unwrap(), "--window-size=1280,900");
    }

    #[test]
    fn js_string_escapes_quotes() {
        assert_eq!(
            js_string(r#"a.product-target[title="Has Lyrics"]"#),
            r#""a.product-target[title=\"Has Lyrics\"]""#
        );
    }
}
