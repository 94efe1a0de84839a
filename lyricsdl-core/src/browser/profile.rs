use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use tokio::fs;
use tokio::io::AsyncWriteExt;

use crate::config::ChromiumSection;

use super::error::{BrowserError, BrowserResult};

const LAST_USED_MARKER: &str = ".last_used";

/// A persistent Chromium user-data directory. The catalog sits behind a
/// login, so the same profile is reused across launches to keep the session
/// cookies.
#[derive(Debug, Clone)]
pub struct BrowserProfile {
    name: String,
    path: PathBuf,
    opened_at: DateTime<Utc>,
}

impl BrowserProfile {
    pub fn open(base_dir: &Path, name: &str) -> BrowserResult<Self> {
        if name.is_empty() || name.contains(['/', '\\']) || name == ".." {
            return Err(BrowserError::Profile(format!(
                "invalid profile name: {name:?}"
            )));
        }
        let path = base_dir.join(name);
        std::fs::create_dir_all(&path)
            .map_err(|err| BrowserError::Profile(format!("failed to create profile dir: {err}")))?;
        Ok(Self {
            name: name.to_string(),
            path,
            opened_at: Utc::now(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn opened_at(&self) -> DateTime<Utc> {
        self.opened_at
    }

    pub async fn touch(&self) -> BrowserResult<()> {
        if self.path.exists() {
            let marker = self.path.join(LAST_USED_MARKER);
            let mut file = fs::File::create(&marker).await.map_err(|err| {
                BrowserError::Profile(format!("failed to write profile marker: {err}"))
            })?;
            file.write_all(self.opened_at.to_rfc3339().as_bytes())
                .await
                .map_err(|err| {
                    BrowserError::Profile(format!("failed to update profile marker: {err}"))
                })?;
        }
        Ok(())
    }

    pub async fn last_used(&self) -> Option<DateTime<Utc>> {
        let raw = fs::read_to_string(self.path.join(LAST_USED_MARKER))
            .await
            .ok()?;
        DateTime::parse_from_rfc3339(raw.trim())
            .ok()
            .map(|value| value.with_timezone(&Utc))
    }
}

#[derive(Debug, Clone)]
pub struct ProfileManager {
    base_dir: PathBuf,
}

impl ProfileManager {
    pub fn new<P: AsRef<Path>>(base_dir: P) -> BrowserResult<Self> {
        let base_dir = base_dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&base_dir).map_err(|err| {
            BrowserError::Profile(format!("failed to create profile base dir: {err}"))
        })?;
        Ok(Self { base_dir })
    }

    pub fn from_config(config: &ChromiumSection) -> BrowserResult<Self> {
        Self::new(&config.profile_dir)
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    pub fn open(&self, name: &str) -> BrowserResult<BrowserProfile> {
        BrowserProfile::open(&self.base_dir, name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn reopening_profile_reuses_directory() {
        let dir = tempdir().unwrap();
        let manager = ProfileManager::new(dir.path().join("profiles")).unwrap();
        let first = manager.open("default").unwrap();
        first.touch().await.unwrap();
        let second = manager.open("default").unwrap();
        assert_eq!(first.path(), second.path());
        let last_used = second.last_used().await.expect("marker written");
        assert_eq!(last_used.timestamp(), first.opened_at().timestamp());
    }

    #[test]
    fn rejects_path_like_names() {
        let dir = tempdir().unwrap();
        let manager = ProfileManager::new(dir.path()).unwrap();
        assert!(matches!(
            manager.open("../escape"),
            Err(BrowserError::Profile(_))
        ));
        assert!(matches!(manager.open(""), Err(BrowserError::Profile(_))));
    }
}
