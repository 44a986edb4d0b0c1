//! Project state store: the authoritative in-memory model of the active
//! project.
//!
//! ```text
//!   hydrate ──► files ◄── add_file / update_file
//!                 │
//!                 ├── open_paths  (ordered tabs, no duplicates)
//!                 ├── active_path (None iff open_paths is empty)
//!                 └── main_path   (compile entry point, need not be open)
//! ```
//!
//! Every mutation is synchronous and bumps `version` when it changes
//! anything a compile could observe. Remote effects (create, save, main-file
//! confirmation) are issued by the caller after the store accepted the
//! change; a rejected mutation leaves the store untouched.

use std::collections::BTreeMap;

use crate::catalog::{ProjectDetails, ProjectId, WorkspaceId};
use crate::error::ValidationError;
use crate::file::{FileRecord, SyncStatus};
use crate::snapshot::CompilationSnapshot;

#[derive(Debug, Clone, Default)]
pub struct ProjectState {
    files: BTreeMap<String, FileRecord>,
    open_paths: Vec<String>,
    active_path: Option<String>,
    main_path: Option<String>,
    main_sync: SyncStatus,
    workspace_id: Option<WorkspaceId>,
    project_id: Option<ProjectId>,
    workspace_name: Option<String>,
    project_name: Option<String>,
    loading: bool,
    /// Monotonic change counter watched by the compile trigger
    version: u64,
}

impl ProjectState {
    pub fn new() -> Self {
        Self::default()
    }

    // ── Selection ───────────────────────────────────────────────

    /// Replace the whole file set from a remote project payload.
    ///
    /// The main path is the declared main file when it is among the new
    /// files, otherwise the first file in path order. Only the main file is
    /// opened. Loaded content is authoritative, so nothing is modified.
    pub fn hydrate(
        &mut self,
        workspace_id: WorkspaceId,
        details: ProjectDetails,
        workspace_name: Option<String>,
    ) {
        let declared = details.declared_main().map(str::to_string);

        self.files = details
            .files
            .into_iter()
            .map(|(path, file)| {
                let record = FileRecord::loaded(path.clone(), file.content);
                (path, record)
            })
            .collect();

        self.main_path = match declared {
            Some(path) if self.files.contains_key(&path) => Some(path),
            Some(path) => {
                log::warn!("Declared main file {path} is not part of project {}", details.id);
                self.files.keys().next().cloned()
            }
            None => self.files.keys().next().cloned(),
        };
        self.open_paths = self.main_path.iter().cloned().collect();
        self.active_path = self.main_path.clone();
        self.main_sync = SyncStatus::Synced;

        if workspace_name.is_some() || self.workspace_id != Some(workspace_id) {
            self.workspace_name = workspace_name;
        }
        self.workspace_id = Some(workspace_id);
        self.project_id = Some(details.id);
        self.project_name = Some(details.name);
        self.loading = false;
        self.version += 1;
    }

    /// Select a workspace that has no project yet.
    pub fn select_empty(&mut self, workspace_id: WorkspaceId, workspace_name: Option<String>) {
        self.clear_files();
        self.workspace_id = Some(workspace_id);
        self.workspace_name = workspace_name;
        self.project_id = None;
        self.project_name = None;
        self.loading = false;
        self.version += 1;
    }

    /// Drop everything, e.g. after the session ended. The version keeps
    /// counting so observers still see a change.
    pub fn clear(&mut self) {
        let version = self.version + 1;
        *self = Self {
            version,
            ..Self::default()
        };
    }

    pub fn set_loading(&mut self, loading: bool) {
        self.loading = loading;
    }

    fn clear_files(&mut self) {
        self.files.clear();
        self.open_paths.clear();
        self.active_path = None;
        self.main_path = None;
        self.main_sync = SyncStatus::Synced;
    }

    // ── File mutations ──────────────────────────────────────────

    /// Insert a new file, open it and make it active.
    ///
    /// Existing paths are rejected rather than overwritten.
    pub fn add_file(&mut self, path: &str, content: &str) -> Result<(), ValidationError> {
        if path.trim().is_empty() {
            return Err(ValidationError::EmptyPath);
        }
        if self.files.contains_key(path) {
            return Err(ValidationError::DuplicatePath(path.to_string()));
        }

        self.files
            .insert(path.to_string(), FileRecord::created(path, content));
        if !self.open_paths.iter().any(|p| p == path) {
            self.open_paths.push(path.to_string());
        }
        self.active_path = Some(path.to_string());
        self.version += 1;
        Ok(())
    }

    /// Replace a file's content. Returns `false` for unknown paths.
    pub fn update_file(&mut self, path: &str, content: &str) -> bool {
        let Some(record) = self.files.get_mut(path) else {
            return false;
        };
        record.content = content.to_string();
        record.modified = true;
        record.sync = SyncStatus::Pending;
        self.version += 1;
        true
    }

    // ── Tabs ────────────────────────────────────────────────────

    /// Open a known file as a tab and activate it. Returns `false` for
    /// unknown paths.
    pub fn open_file(&mut self, path: &str) -> bool {
        if !self.files.contains_key(path) {
            return false;
        }
        if !self.open_paths.iter().any(|p| p == path) {
            self.open_paths.push(path.to_string());
        }
        self.active_path = Some(path.to_string());
        true
    }

    /// Close a tab. Closing the active tab activates the first remaining
    /// tab in order, or nothing when none remain.
    pub fn close_file(&mut self, path: &str) {
        self.open_paths.retain(|p| p != path);
        if self.active_path.as_deref() == Some(path) {
            self.active_path = self.open_paths.first().cloned();
        }
    }

    /// Set the active path without validation; an unknown path simply
    /// displays nothing.
    pub fn set_active_path(&mut self, path: Option<String>) {
        self.active_path = path;
    }

    /// Optimistically set the compile entry point.
    pub fn set_main_path(&mut self, path: &str) -> Result<(), ValidationError> {
        if !self.files.contains_key(path) {
            return Err(ValidationError::UnknownPath(path.to_string()));
        }
        self.main_path = Some(path.to_string());
        self.main_sync = SyncStatus::Pending;
        self.version += 1;
        Ok(())
    }

    // ── Remote acknowledgements ─────────────────────────────────

    /// Record a successful write of `sent` for `path`.
    ///
    /// If the content changed again after `sent` was captured the record
    /// stays pending; the newer content has its own write coming.
    pub fn mark_saved(&mut self, path: &str, sent: &str) {
        if let Some(record) = self.files.get_mut(path) {
            if record.content == sent {
                record.modified = false;
                record.sync = SyncStatus::Synced;
            }
        }
    }

    /// Record a failed write. The local content is kept and stays modified.
    pub fn mark_save_failed(&mut self, path: &str) {
        if let Some(record) = self.files.get_mut(path) {
            record.modified = true;
            record.sync = SyncStatus::Failed;
        }
    }

    pub fn mark_main_synced(&mut self, path: &str) {
        if self.main_path.as_deref() == Some(path) {
            self.main_sync = SyncStatus::Synced;
        }
    }

    pub fn mark_main_failed(&mut self, path: &str) {
        if self.main_path.as_deref() == Some(path) {
            self.main_sync = SyncStatus::Failed;
        }
    }

    // ── Queries ─────────────────────────────────────────────────

    pub fn files(&self) -> &BTreeMap<String, FileRecord> {
        &self.files
    }

    pub fn file(&self, path: &str) -> Option<&FileRecord> {
        self.files.get(path)
    }

    pub fn open_paths(&self) -> &[String] {
        &self.open_paths
    }

    pub fn active_path(&self) -> Option<&str> {
        self.active_path.as_deref()
    }

    pub fn main_path(&self) -> Option<&str> {
        self.main_path.as_deref()
    }

    pub fn main_sync(&self) -> SyncStatus {
        self.main_sync
    }

    pub fn workspace_id(&self) -> Option<WorkspaceId> {
        self.workspace_id
    }

    pub fn project_id(&self) -> Option<ProjectId> {
        self.project_id
    }

    pub fn workspace_name(&self) -> Option<&str> {
        self.workspace_name.as_deref()
    }

    pub fn project_name(&self) -> Option<&str> {
        self.project_name.as_deref()
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    /// A workspace and a project are selected and nothing is loading.
    pub fn is_ready(&self) -> bool {
        self.workspace_id.is_some() && self.project_id.is_some() && !self.loading
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    /// Paths whose local content the remote has not acknowledged.
    pub fn modified_paths(&self) -> Vec<String> {
        self.files
            .values()
            .filter(|f| f.modified)
            .map(|f| f.path.clone())
            .collect()
    }

    /// Compile request view of the current state, if compilable.
    pub fn snapshot(&self) -> Option<CompilationSnapshot> {
        CompilationSnapshot::build(self)
    }
}
