//! Remote catalog payloads: workspaces, project summaries and full project
//! details as served by the workspace API.
//!
//! The catalog is a cache. Every refresh replaces it wholesale, nothing here
//! is merged field by field.
//!
//! ```text
//! WorkspaceSummary ──┬── ProjectSummary   (catalog listing)
//!                    └── ProjectSummary
//!
//! ProjectDetails ──── files: path → RemoteFile   (hydration payload)
//! ```

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type WorkspaceId = Uuid;
pub type ProjectId = Uuid;

/// A workspace with its nested project summaries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkspaceSummary {
    pub id: WorkspaceId,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub owner_id: Option<Uuid>,
    #[serde(default)]
    pub project_count: usize,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub projects: Vec<ProjectSummary>,
}

impl WorkspaceSummary {
    /// First project in catalog order, used by the bootstrap policy.
    pub fn first_project(&self) -> Option<&ProjectSummary> {
        self.projects.first()
    }
}

/// Lightweight project entry listed under a workspace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectSummary {
    pub id: ProjectId,
    #[serde(default)]
    pub workspace_id: Option<WorkspaceId>,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub main_file: Option<String>,
    #[serde(default)]
    pub file_count: i64,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

/// One file inside a project payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteFile {
    pub path: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub is_main: bool,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Full project payload used to hydrate the project store.
///
/// `files` is keyed by path; a `BTreeMap` keeps iteration lexicographic so
/// the fallback main-file choice is deterministic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectDetails {
    pub id: ProjectId,
    #[serde(default)]
    pub workspace_id: Option<WorkspaceId>,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub main_file: Option<String>,
    #[serde(default)]
    pub files: BTreeMap<String, RemoteFile>,
}

impl ProjectDetails {
    /// The main file the server declares: `main_file`, or failing that the
    /// first file flagged `is_main`.
    pub fn declared_main(&self) -> Option<&str> {
        self.main_file
            .as_deref()
            .or_else(|| {
                self.files
                    .values()
                    .find(|f| f.is_main)
                    .map(|f| f.path.as_str())
            })
    }
}
