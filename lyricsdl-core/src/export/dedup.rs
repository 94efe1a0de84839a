use std::collections::HashSet;

use tracing::debug;

use crate::catalog::ItemRecord;

/// Normalised stems of files already present in the export folder.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExistingKeySet {
    keys: HashSet<String>,
}

impl ExistingKeySet {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn insert(&mut self, key: String) {
        self.keys.insert(key);
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.keys.contains(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.keys.iter().map(String::as_str)
    }

    /// Keys in lexical order, for display.
    pub fn sorted(&self) -> Vec<&str> {
        let mut keys: Vec<&str> = self.iter().collect();
        keys.sort_unstable();
        keys
    }
}

impl<S: Into<String>> FromIterator<S> for ExistingKeySet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self {
            keys: iter.into_iter().map(Into::into).collect(),
        }
    }
}

pub fn normalize_title(title: &str) -> String {
    title.trim().to_lowercase()
}

/// Exports are saved as `<title><suffix>.txt` (for example `Above All-lyrics`),
/// so a key matches when it starts with the normalised title. A title that
/// is a strict prefix of another item's title also matches that item's file.
pub fn already_exists(title: &str, existing: &ExistingKeySet) -> bool {
    let normalized = normalize_title(title);
    existing
        .iter()
        .any(|key| key == normalized || key.starts_with(&normalized))
}

#[derive(Debug, Clone, Default)]
pub struct DedupPartition {
    pub to_download: Vec<ItemRecord>,
    pub skipped: Vec<ItemRecord>,
}

/// Splits `items` into those still to export and those already on disk,
/// keeping catalog order in both halves.
pub fn partition(items: Vec<ItemRecord>, existing: &ExistingKeySet) -> DedupPartition {
    let mut partition = DedupPartition::default();
    for item in items {
        if already_exists(&item.title, existing) {
            debug!(title = %item.title, "export already present");
            partition.skipped.push(item);
        } else {
            partition.to_download.push(item);
        }
    }
    partition
}
