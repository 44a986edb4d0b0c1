//! File records held by the project store.

use serde::{Deserialize, Serialize};

/// Remote-sync status of a locally authoritative value.
///
/// Local state always wins until the remote contradicts it; this tracks
/// whether the remote has caught up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SyncStatus {
    /// Remote copy matches the local value
    #[default]
    Synced,
    /// A remote write is scheduled or in flight
    Pending,
    /// The last remote write failed; the local value is kept
    Failed,
}

/// One file of the active project.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileRecord {
    /// Unique key within the project
    pub path: String,
    /// Last path segment, shown on tabs
    pub display_name: String,
    pub content: String,
    /// Local content differs from what the remote last acknowledged
    pub modified: bool,
    pub sync: SyncStatus,
}

impl FileRecord {
    /// A record freshly loaded from the remote store.
    pub fn loaded(path: impl Into<String>, content: impl Into<String>) -> Self {
        let path = path.into();
        Self {
            display_name: display_name(&path),
            path,
            content: content.into(),
            modified: false,
            sync: SyncStatus::Synced,
        }
    }

    /// A record created locally and not yet confirmed by the remote.
    pub fn created(path: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            modified: true,
            sync: SyncStatus::Pending,
            ..Self::loaded(path, content)
        }
    }
}

/// Last `/`-separated segment of a path.
pub fn display_name(path: &str) -> String {
    path.rsplit('/')
        .find(|segment| !segment.is_empty())
        .unwrap_or(path)
        .to_string()
}
