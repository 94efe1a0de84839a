use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use dialoguer::Confirm;
use lyricsdl_core::export::{FolderAccess, FolderAccessError, FolderEntry, LocalFolderAccess};
use tracing::debug;

pub type PromptAnswer = dialoguer::Result<Option<bool>>;
pub type Prompt<'a> = Box<dyn FnOnce() -> PromptAnswer + 'a>;

/// Live terminal output that has to step aside while a prompt is on screen.
pub trait PromptHost: Send + Sync {
    fn suspend(&self, prompt: Prompt<'_>) -> PromptAnswer;
}

/// Lists the export folder after the user has agreed to it.
#[derive(Clone)]
pub struct PromptedFolderAccess {
    inner: LocalFolderAccess,
    assume_yes: bool,
    host: Option<Arc<dyn PromptHost>>,
}

impl PromptedFolderAccess {
    pub fn new(path: impl Into<PathBuf>, assume_yes: bool) -> Self {
        Self {
            inner: LocalFolderAccess::new(path),
            assume_yes,
            host: None,
        }
    }

    /// Pauses `host` while the confirmation is shown.
    pub fn with_host(mut self, host: Arc<dyn PromptHost>) -> Self {
        self.host = Some(host);
        self
    }

    async fn confirm(&self) -> Result<bool, FolderAccessError> {
        if self.assume_yes {
            return Ok(true);
        }
        let prompt = format!(
            "Scan {} for lyrics you already saved?",
            self.inner.path().display()
        );
        let host = self.host.clone();
        let answer = tokio::task::spawn_blocking(move || {
            let ask = move || Confirm::new().with_prompt(prompt).default(true).interact_opt();
            match host {
                Some(host) => host.suspend(Box::new(ask)),
                None => ask(),
            }
        })
        .await
        .map_err(|err| FolderAccessError::Denied(format!("prompt task failed: {err}")))?
        .map_err(|err| FolderAccessError::Denied(format!("prompt failed: {err}")))?;
        Ok(answer.unwrap_or(false))
    }
}

#[async_trait(?Send)]
impl FolderAccess for PromptedFolderAccess {
    async fn request_entries(&self) -> Result<Vec<FolderEntry>, FolderAccessError> {
        if !self.confirm().await? {
            debug!(folder = %self.inner.path().display(), "folder access declined");
            return Err(FolderAccessError::Cancelled);
        }
        self.inner.request_entries().await
    }

    fn location(&self) -> Option<&Path> {
        Some(self.inner.path())
    }
}
