use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, Result};

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct LyricsdlConfig {
    pub chromium: ChromiumSection,
    #[serde(default)]
    pub catalog: CatalogSection,
    #[serde(default)]
    pub change_await: ChangeAwaitSection,
    #[serde(default)]
    pub export: ExportSection,
    #[serde(default)]
    pub schedule: ScheduleSection,
}

impl LyricsdlConfig {
    /// Builds a configuration around an explicit chromium section, with every
    /// other section at its defaults.
    pub fn with_chromium(chromium: ChromiumSection) -> Self {
        Self {
            chromium,
            catalog: CatalogSection::default(),
            change_await: ChangeAwaitSection::default(),
            export: ExportSection::default(),
            schedule: ScheduleSection::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ChromiumSection {
    pub executable_path: String,
    pub headless: bool,
    pub sandbox: bool,
    pub disable_gpu: bool,
    pub request_timeout_seconds: Option<u64>,
    pub profile_dir: String,
    #[serde(default = "default_profile_name")]
    pub profile_name: String,
    pub lang: Option<String>,
    #[serde(default)]
    pub extra_args: Vec<String>,
}

fn default_profile_name() -> String {
    "default".to_string()
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CatalogSection {
    pub item_selector: String,
    pub title_selector: String,
    pub export_link_selector: String,
    pub page_size_selector: String,
    pub max_page_size: String,
    pub next_page_selector: String,
    pub status_selector: String,
    pub page_settle_ms: u64,
}

impl Default for CatalogSection {
    fn default() -> Self {
        Self {
            item_selector: "a.song-item".into(),
            title_selector: ".title".into(),
            export_link_selector: "a.product-target[title=\"Has Lyrics\"]".into(),
            page_size_selector: "#SearchResultsNumPerPageSelect".into(),
            max_page_size: "100".into(),
            next_page_selector: "#SearchResultsPaginationNextPageButton".into(),
            status_selector: ".pagination-status".into(),
            page_settle_ms: 500,
        }
    }
}

impl CatalogSection {
    pub fn page_settle(&self) -> Duration {
        Duration::from_millis(self.page_settle_ms)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ChangeAwaitSection {
    pub container_selectors: Vec<String>,
    pub timeout_ms: u64,
    pub settle_ms: u64,
    pub poll_interval_ms: u64,
}

impl Default for ChangeAwaitSection {
    fn default() -> Self {
        Self {
            container_selectors: vec![".song-list-table".into(), ".search-results".into()],
            timeout_ms: 15_000,
            settle_ms: 300,
            poll_interval_ms: 100,
        }
    }
}

impl ChangeAwaitSection {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn settle(&self) -> Duration {
        Duration::from_millis(self.settle_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }

    /// Number of probe checks that fit in the timeout window.
    pub fn max_polls(&self) -> usize {
        let interval = self.poll_interval_ms.max(1);
        self.timeout_ms.div_ceil(interval) as usize
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ExportSection {
    pub session_timeout_seconds: u64,
    pub poll_interval_ms: u64,
    pub max_poll_attempts: usize,
    pub trigger_selector: String,
    pub download_selector: String,
    pub trigger_settle_ms: u64,
    pub download_settle_ms: u64,
    pub file_extension: String,
}

impl Default for ExportSection {
    fn default() -> Self {
        Self {
            session_timeout_seconds: 30,
            poll_interval_ms: 500,
            max_poll_attempts: 40,
            trigger_selector: "i.fa-arrow-up-from-bracket".into(),
            download_selector: "#lyricsDownloadButton".into(),
            trigger_settle_ms: 800,
            download_settle_ms: 1000,
            file_extension: ".txt".into(),
        }
    }
}

impl ExportSection {
    pub fn session_timeout(&self) -> Duration {
        Duration::from_secs(self.session_timeout_seconds)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn trigger_settle(&self) -> Duration {
        Duration::from_millis(self.trigger_settle_ms)
    }

    pub fn download_settle(&self) -> Duration {
        Duration::from_millis(self.download_settle_ms)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ScheduleSection {
    pub retry_cooldown_ms: u64,
    pub item_delay_ms: u64,
}

impl Default for ScheduleSection {
    fn default() -> Self {
        Self {
            retry_cooldown_ms: 2_000,
            item_delay_ms: 1_000,
        }
    }
}

impl ScheduleSection {
    pub fn retry_cooldown(&self) -> Duration {
        Duration::from_millis(self.retry_cooldown_ms)
    }

    pub fn item_delay(&self) -> Duration {
        Duration::from_millis(self.item_delay_ms)
    }
}

pub fn load_config<P: AsRef<Path>>(path: P) -> Result<LyricsdlConfig> {
    load_toml(path)
}

/// Resolves `candidate` against the directory holding the config file.
pub fn resolve_relative<P: AsRef<Path>>(config_path: &Path, candidate: P) -> PathBuf {
    let path = candidate.as_ref();
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        config_path
            .parent()
            .map(|dir| dir.join(path))
            .unwrap_or_else(|| path.to_path_buf())
    }
}

fn load_toml<T, P>(path: P) -> Result<T>
where
    T: DeserializeOwned,
    P: AsRef<Path>,
{
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        source,
        path: path.to_path_buf(),
    })?;
    toml::from_str(&content).map_err(|source| ConfigError::Parse {
        source,
        path: path.to_path_buf(),
    })
}
