pub mod browser;
pub mod catalog;
pub mod change_await;
pub mod config;
pub mod error;
pub mod export;
pub mod orchestrator;
pub mod poll;
pub mod scheduler;
pub mod ui;

pub use catalog::{CatalogEnumerator, CatalogPage, ItemRecord};
pub use config::{load_config, resolve_relative, LyricsdlConfig};
pub use error::{ConfigError, Result};
pub use orchestrator::{DownloadRun, RunError, RunReport};
pub use scheduler::{BatchScheduler, RunSummary};
pub use ui::{Severity, StatusSink, TracingSink, UiSession};
