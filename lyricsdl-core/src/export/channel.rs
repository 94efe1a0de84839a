use std::fmt;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::debug;
use uuid::Uuid;

pub const RESULT_MARKER: &str = "RESULT_MARKER";

/// Identity of one sandbox instance. A fresh id is minted for every attempt,
/// so late messages from an earlier sandbox never match the current one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SandboxId(Uuid);

impl SandboxId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SandboxId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SandboxId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Result reported by the automation running inside a sandbox.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultMessage {
    #[serde(rename = "type")]
    pub kind: String,
    pub success: bool,
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ResultMessage {
    pub fn success(url: impl Into<String>) -> Self {
        Self {
            kind: RESULT_MARKER.to_string(),
            success: true,
            url: url.into(),
            error: None,
        }
    }

    pub fn failure(url: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            kind: RESULT_MARKER.to_string(),
            success: false,
            url: url.into(),
            error: Some(error.into()),
        }
    }

    pub fn is_result(&self) -> bool {
        self.kind == RESULT_MARKER
    }
}

/// A message together with the sandbox that posted it.
#[derive(Debug, Clone)]
pub struct Envelope {
    pub source: SandboxId,
    pub message: ResultMessage,
}

/// Sending half handed to a sandbox. Every message is stamped with the
/// sandbox's own id.
#[derive(Debug, Clone)]
pub struct ResultPort {
    source: SandboxId,
    tx: mpsc::UnboundedSender<Envelope>,
}

impl ResultPort {
    pub(crate) fn new(source: SandboxId, tx: mpsc::UnboundedSender<Envelope>) -> Self {
        Self { source, tx }
    }

    pub fn source(&self) -> SandboxId {
        self.source
    }

    pub fn post(&self, message: ResultMessage) {
        let envelope = Envelope {
            source: self.source,
            message,
        };
        if self.tx.send(envelope).is_err() {
            debug!(sandbox = %self.source, "result listener is gone, message dropped");
        }
    }
}
