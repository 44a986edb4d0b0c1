//! Point-in-time compile request view of a project.
//!
//! Snapshots are derived, never stored: the compile trigger builds one at
//! the moment it fires so the request carries the state at the end of the
//! debounce window.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::project::ProjectState;

/// Body of a compile request: every file's content plus the entry point.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompilationSnapshot {
    pub files: BTreeMap<String, String>,
    pub main_file: String,
}

impl CompilationSnapshot {
    /// Returns `None` when the project has no main path or the main path is
    /// not one of its files.
    pub fn build(state: &ProjectState) -> Option<Self> {
        let main_file = state.main_path()?;
        if !state.files().contains_key(main_file) {
            return None;
        }

        let files = state
            .files()
            .iter()
            .map(|(path, record)| (path.clone(), record.content.clone()))
            .collect();

        Some(Self {
            files,
            main_file: main_file.to_string(),
        })
    }

    /// Total bytes of source content in the snapshot.
    pub fn content_len(&self) -> usize {
        self.files.values().map(String::len).sum()
    }
}
