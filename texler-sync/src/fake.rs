//! In-memory [`RemoteApi`] for tests.
//!
//! Keeps workspaces and projects in memory, records every call, and lets a
//! test inject failures, per-operation latency and canned compile responses.
//! Latency uses `tokio::time::sleep`, so paused-clock tests stay
//! deterministic.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use texler_core::{
    encode_hex, CompilationSnapshot, ProjectDetails, ProjectId, ProjectSummary, RemoteFile,
    WorkspaceId, WorkspaceSummary,
};
use uuid::Uuid;

use crate::credentials::CredentialGate;
use crate::error::ApiError;
use crate::remote::{CompileResponse, RemoteApi};

/// Smallest byte sequence the fake hands back as a rendered document.
pub const FAKE_PDF: &[u8] = b"%PDF-1.5\n%fake\n";

/// Remote operations, for failure and latency injection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    ListWorkspaces,
    GetWorkspace,
    CreateWorkspace,
    GetProject,
    CreateProject,
    CreateFile,
    UpdateFile,
    SetMainFile,
    Compile,
}

/// A recorded call.
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    ListWorkspaces,
    GetWorkspace(WorkspaceId),
    CreateWorkspace { name: String },
    GetProject { workspace_id: WorkspaceId, project_id: ProjectId },
    CreateProject { workspace_id: WorkspaceId, name: Option<String> },
    CreateFile { project_id: ProjectId, path: String, content: String },
    UpdateFile { project_id: ProjectId, path: String, content: String },
    SetMainFile { project_id: ProjectId, path: String },
    Compile(CompilationSnapshot),
}

#[derive(Default)]
struct Inner {
    workspaces: Vec<WorkspaceSummary>,
    projects: HashMap<ProjectId, ProjectDetails>,
    calls: Vec<Call>,
    failures: HashMap<Op, VecDeque<ApiError>>,
    latency: HashMap<Op, Duration>,
    compile_responses: VecDeque<CompileResponse>,
}

#[derive(Default)]
pub struct FakeRemote {
    inner: Mutex<Inner>,
    gate: Option<Arc<CredentialGate>>,
}

impl FakeRemote {
    pub fn new() -> Self {
        Self::default()
    }

    /// Injected `Unauthorized` failures invalidate `gate`, as the HTTP
    /// client does on a 401.
    pub fn with_gate(gate: Arc<CredentialGate>) -> Self {
        Self {
            inner: Mutex::default(),
            gate: Some(gate),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // ── Seeding ─────────────────────────────────────────────────

    pub fn add_workspace(&self, name: &str) -> WorkspaceId {
        let id = Uuid::new_v4();
        self.lock().workspaces.push(WorkspaceSummary {
            id,
            name: name.to_string(),
            description: None,
            owner_id: None,
            project_count: 0,
            created_at: None,
            updated_at: None,
            projects: Vec::new(),
        });
        id
    }

    /// Add a project with `files` (path, content) to a seeded workspace.
    pub fn add_project(
        &self,
        workspace_id: WorkspaceId,
        name: &str,
        files: &[(&str, &str)],
        main_file: Option<&str>,
    ) -> ProjectId {
        let details = ProjectDetails {
            id: Uuid::new_v4(),
            workspace_id: Some(workspace_id),
            name: name.to_string(),
            description: None,
            main_file: main_file.map(str::to_string),
            files: files
                .iter()
                .map(|(path, content)| {
                    let file = RemoteFile {
                        path: path.to_string(),
                        content: content.to_string(),
                        is_main: Some(*path) == main_file,
                        updated_at: None,
                    };
                    (path.to_string(), file)
                })
                .collect(),
        };
        let id = details.id;
        let mut inner = self.lock();
        Self::link_project(&mut inner, workspace_id, &details);
        inner.projects.insert(id, details);
        id
    }

    fn link_project(inner: &mut Inner, workspace_id: WorkspaceId, details: &ProjectDetails) {
        if let Some(workspace) = inner.workspaces.iter_mut().find(|w| w.id == workspace_id) {
            workspace.projects.push(ProjectSummary {
                id: details.id,
                workspace_id: Some(workspace_id),
                name: details.name.clone(),
                description: details.description.clone(),
                main_file: details.main_file.clone(),
                file_count: details.files.len() as i64,
                created_at: None,
                updated_at: None,
            });
            workspace.project_count = workspace.projects.len();
        }
    }

    // ── Injection ───────────────────────────────────────────────

    /// Fail the next call of `op` with `error`. Queued failures are used in
    /// order.
    pub fn fail_next(&self, op: Op, error: ApiError) {
        self.lock().failures.entry(op).or_default().push_back(error);
    }

    pub fn set_latency(&self, op: Op, latency: Duration) {
        self.lock().latency.insert(op, latency);
    }

    /// Queue a compile response. Without one, compiles render [`FAKE_PDF`].
    pub fn push_compile_response(&self, response: CompileResponse) {
        self.lock().compile_responses.push_back(response);
    }

    // ── Inspection ──────────────────────────────────────────────

    pub fn calls(&self) -> Vec<Call> {
        self.lock().calls.clone()
    }

    /// `(path, content)` of every `update_file` call, in call order.
    pub fn writes(&self) -> Vec<(String, String)> {
        self.lock()
            .calls
            .iter()
            .filter_map(|call| match call {
                Call::UpdateFile { path, content, .. } => Some((path.clone(), content.clone())),
                _ => None,
            })
            .collect()
    }

    pub fn writes_for(&self, path: &str) -> Vec<String> {
        self.writes()
            .into_iter()
            .filter(|(p, _)| p == path)
            .map(|(_, content)| content)
            .collect()
    }

    pub fn compile_count(&self) -> usize {
        self.lock()
            .calls
            .iter()
            .filter(|call| matches!(call, Call::Compile(_)))
            .count()
    }

    pub fn count(&self, matches: impl Fn(&Call) -> bool) -> usize {
        self.lock().calls.iter().filter(|call| matches(call)).count()
    }

    /// Content the fake currently stores for `path`.
    pub fn stored_content(&self, project_id: ProjectId, path: &str) -> Option<String> {
        self.lock()
            .projects
            .get(&project_id)
            .and_then(|p| p.files.get(path))
            .map(|f| f.content.clone())
    }

    pub fn stored_main(&self, project_id: ProjectId) -> Option<String> {
        self.lock()
            .projects
            .get(&project_id)
            .and_then(|p| p.main_file.clone())
    }

    // ── Call plumbing ───────────────────────────────────────────

    /// Record the call, wait out the configured latency, then return the
    /// next injected failure if any.
    async fn enter(&self, op: Op, call: Call) -> Result<(), ApiError> {
        let latency = {
            let mut inner = self.lock();
            inner.calls.push(call);
            inner.latency.get(&op).copied()
        };
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }

        let failure = self
            .lock()
            .failures
            .get_mut(&op)
            .and_then(VecDeque::pop_front);
        match failure {
            Some(ApiError::Unauthorized) => {
                if let Some(gate) = &self.gate {
                    gate.invalidate();
                }
                Err(ApiError::Unauthorized)
            }
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    fn not_found(what: &str) -> ApiError {
        ApiError::Status {
            status: 404,
            message: format!("{what} not found"),
        }
    }
}

#[async_trait]
impl RemoteApi for FakeRemote {
    async fn list_workspaces(&self) -> Result<Vec<WorkspaceSummary>, ApiError> {
        self.enter(Op::ListWorkspaces, Call::ListWorkspaces).await?;
        Ok(self.lock().workspaces.clone())
    }

    async fn get_workspace(&self, workspace_id: WorkspaceId) -> Result<WorkspaceSummary, ApiError> {
        self.enter(Op::GetWorkspace, Call::GetWorkspace(workspace_id))
            .await?;
        self.lock()
            .workspaces
            .iter()
            .find(|w| w.id == workspace_id)
            .cloned()
            .ok_or_else(|| Self::not_found("Workspace"))
    }

    async fn create_workspace(
        &self,
        name: &str,
        description: Option<&str>,
    ) -> Result<WorkspaceSummary, ApiError> {
        let call = Call::CreateWorkspace {
            name: name.to_string(),
        };
        self.enter(Op::CreateWorkspace, call).await?;
        let id = self.add_workspace(name);
        let mut inner = self.lock();
        let workspace = inner
            .workspaces
            .iter_mut()
            .find(|w| w.id == id)
            .ok_or_else(|| Self::not_found("Workspace"))?;
        workspace.description = description.map(str::to_string);
        Ok(workspace.clone())
    }

    async fn get_project(
        &self,
        workspace_id: WorkspaceId,
        project_id: ProjectId,
    ) -> Result<ProjectDetails, ApiError> {
        let call = Call::GetProject {
            workspace_id,
            project_id,
        };
        self.enter(Op::GetProject, call).await?;
        self.lock()
            .projects
            .get(&project_id)
            .cloned()
            .ok_or_else(|| Self::not_found("Project"))
    }

    async fn create_project(
        &self,
        workspace_id: WorkspaceId,
        name: Option<&str>,
    ) -> Result<ProjectDetails, ApiError> {
        let call = Call::CreateProject {
            workspace_id,
            name: name.map(str::to_string),
        };
        self.enter(Op::CreateProject, call).await?;
        if !self.lock().workspaces.iter().any(|w| w.id == workspace_id) {
            return Err(Self::not_found("Workspace"));
        }
        let id = self.add_project(
            workspace_id,
            name.unwrap_or("Untitled Project"),
            &[("main.tex", "\\documentclass{article}\n\\begin{document}\n\\end{document}\n")],
            Some("main.tex"),
        );
        self.lock()
            .projects
            .get(&id)
            .cloned()
            .ok_or_else(|| Self::not_found("Project"))
    }

    async fn create_file(
        &self,
        _workspace_id: WorkspaceId,
        project_id: ProjectId,
        path: &str,
        content: &str,
    ) -> Result<String, ApiError> {
        let call = Call::CreateFile {
            project_id,
            path: path.to_string(),
            content: content.to_string(),
        };
        self.enter(Op::CreateFile, call).await?;
        let mut inner = self.lock();
        let project = inner
            .projects
            .get_mut(&project_id)
            .ok_or_else(|| Self::not_found("Project"))?;
        project.files.insert(
            path.to_string(),
            RemoteFile {
                path: path.to_string(),
                content: content.to_string(),
                is_main: false,
                updated_at: None,
            },
        );
        Ok(path.to_string())
    }

    async fn update_file(
        &self,
        _workspace_id: WorkspaceId,
        project_id: ProjectId,
        path: &str,
        content: &str,
    ) -> Result<String, ApiError> {
        let call = Call::UpdateFile {
            project_id,
            path: path.to_string(),
            content: content.to_string(),
        };
        self.enter(Op::UpdateFile, call).await?;
        let mut inner = self.lock();
        let file = inner
            .projects
            .get_mut(&project_id)
            .and_then(|p| p.files.get_mut(path))
            .ok_or_else(|| Self::not_found("File"))?;
        file.content = content.to_string();
        Ok(path.to_string())
    }

    async fn set_main_file(
        &self,
        _workspace_id: WorkspaceId,
        project_id: ProjectId,
        path: &str,
    ) -> Result<ProjectDetails, ApiError> {
        let call = Call::SetMainFile {
            project_id,
            path: path.to_string(),
        };
        self.enter(Op::SetMainFile, call).await?;
        let mut inner = self.lock();
        let project = inner
            .projects
            .get_mut(&project_id)
            .ok_or_else(|| Self::not_found("Project"))?;
        if !project.files.contains_key(path) {
            return Err(Self::not_found("File"));
        }
        for file in project.files.values_mut() {
            file.is_main = file.path == path;
        }
        project.main_file = Some(path.to_string());
        Ok(project.clone())
    }

    async fn compile(&self, snapshot: &CompilationSnapshot) -> Result<CompileResponse, ApiError> {
        self.enter(Op::Compile, Call::Compile(snapshot.clone()))
            .await?;
        let queued = self.lock().compile_responses.pop_front();
        Ok(queued.unwrap_or_else(|| CompileResponse::rendered(encode_hex(FAKE_PDF))))
    }
}
