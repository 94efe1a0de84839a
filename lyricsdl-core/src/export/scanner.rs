use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use thiserror::Error;
use tracing::info;

use super::dedup::ExistingKeySet;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    File,
    Directory,
    Other,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FolderEntry {
    pub name: String,
    pub kind: EntryKind,
}

impl FolderEntry {
    pub fn file(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: EntryKind::File,
        }
    }

    pub fn directory(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: EntryKind::Directory,
        }
    }
}

#[derive(Debug, Error)]
pub enum FolderAccessError {
    #[error("folder selection cancelled")]
    Cancelled,
    #[error("folder access denied: {0}")]
    Denied(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Read-only, user-authorised view of one folder level.
#[async_trait(?Send)]
pub trait FolderAccess {
    /// Asks for access and lists the direct entries of the folder.
    async fn request_entries(&self) -> Result<Vec<FolderEntry>, FolderAccessError>;

    /// Where the folder lives on disk, when that is known.
    fn location(&self) -> Option<&Path> {
        None
    }
}

#[derive(Debug, Error)]
pub enum ScanError {
    #[error("failed to list export folder: {0}")]
    Access(#[source] FolderAccessError),
}

#[derive(Debug, Clone)]
pub struct ExistingExportScanner {
    extension: String,
}

impl ExistingExportScanner {
    pub fn new(extension: impl Into<String>) -> Self {
        Self {
            extension: extension.into().to_lowercase(),
        }
    }

    /// Returns `Ok(None)` when the user declined access. Every other access
    /// failure is an error.
    pub async fn scan(
        &self,
        access: &dyn FolderAccess,
    ) -> Result<Option<ExistingKeySet>, ScanError> {
        let entries = match access.request_entries().await {
            Ok(entries) => entries,
            Err(FolderAccessError::Cancelled) => return Ok(None),
            Err(err) => return Err(ScanError::Access(err)),
        };

        let mut keys = ExistingKeySet::new();
        for entry in entries {
            if entry.kind != EntryKind::File {
                continue;
            }
            if let Some(stem) = self.key_for(&entry.name) {
                keys.insert(stem);
            }
        }
        info!(
            folder = ?access.location(),
            existing = keys.len(),
            "scanned export folder"
        );
        Ok(Some(keys))
    }

    /// Lowercased file name without the export extension, or `None` for
    /// other files.
    pub fn key_for(&self, file_name: &str) -> Option<String> {
        let lowered = file_name.to_lowercase();
        lowered
            .strip_suffix(self.extension.as_str())
            .map(str::to_string)
    }
}

/// Lists a directory on the local file system. Access is granted implicitly.
#[derive(Debug, Clone)]
pub struct LocalFolderAccess {
    path: PathBuf,
}

impl LocalFolderAccess {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait(?Send)]
impl FolderAccess for LocalFolderAccess {
    async fn request_entries(&self) -> Result<Vec<FolderEntry>, FolderAccessError> {
        let mut reader = tokio::fs::read_dir(&self.path)
            .await
            .map_err(|err| map_io(&self.path, err))?;
        let mut entries = Vec::new();
        while let Some(entry) = reader.next_entry().await? {
            let file_type = entry.file_type().await?;
            let kind = if file_type.is_file() {
                EntryKind::File
            } else if file_type.is_dir() {
                EntryKind::Directory
            } else {
                EntryKind::Other
            };
            entries.push(FolderEntry {
                name: entry.file_name().to_string_lossy().into_owned(),
                kind,
            });
        }
        Ok(entries)
    }

    fn location(&self) -> Option<&Path> {
        Some(&self.path)
    }
}

fn map_io(path: &Path, err: std::io::Error) -> FolderAccessError {
    if err.kind() == ErrorKind::PermissionDenied {
        FolderAccessError::Denied(format!("{}: {err}", path.display()))
    } else {
        FolderAccessError::Io(err)
    }
}
