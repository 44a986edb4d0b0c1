//! Remote catalog client.
//!
//! Caches the workspace list. The cache is replaced wholesale on every
//! successful refresh and left untouched when a refresh fails. Creation
//! calls always refresh before returning, so a created entity is visible in
//! the cache by the time the caller sees it.

use std::sync::{Arc, PoisonError, RwLock};

use texler_core::{ProjectDetails, ProjectId, WorkspaceId, WorkspaceSummary};

use crate::error::ApiError;
use crate::remote::RemoteApi;

pub struct CatalogClient {
    remote: Arc<dyn RemoteApi>,
    workspaces: RwLock<Vec<WorkspaceSummary>>,
}

impl CatalogClient {
    pub fn new(remote: Arc<dyn RemoteApi>) -> Self {
        Self {
            remote,
            workspaces: RwLock::new(Vec::new()),
        }
    }

    /// Fetch the workspace list and replace the cache.
    ///
    /// Fail-soft: on any error the cache is kept and an empty list is
    /// returned.
    pub async fn refresh_workspaces(&self) -> Vec<WorkspaceSummary> {
        self.try_refresh_workspaces().await.unwrap_or_default()
    }

    /// Like [`refresh_workspaces`](Self::refresh_workspaces), but reports
    /// the failure instead of an empty list.
    pub async fn try_refresh_workspaces(&self) -> Result<Vec<WorkspaceSummary>, ApiError> {
        match self.remote.list_workspaces().await {
            Ok(workspaces) => {
                log::debug!("Catalog refreshed: {} workspaces", workspaces.len());
                *self.workspaces.write().unwrap_or_else(PoisonError::into_inner) =
                    workspaces.clone();
                Ok(workspaces)
            }
            Err(e) => {
                log::warn!("Workspace refresh failed: {e}");
                Err(e)
            }
        }
    }

    /// The cached catalog.
    pub fn workspaces(&self) -> Vec<WorkspaceSummary> {
        self.workspaces
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn find_workspace(&self, workspace_id: WorkspaceId) -> Option<WorkspaceSummary> {
        self.workspaces
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .find(|w| w.id == workspace_id)
            .cloned()
    }

    pub async fn get_workspace(
        &self,
        workspace_id: WorkspaceId,
    ) -> Result<WorkspaceSummary, ApiError> {
        self.remote.get_workspace(workspace_id).await
    }

    pub async fn create_workspace(
        &self,
        name: &str,
        description: Option<&str>,
    ) -> Result<WorkspaceSummary, ApiError> {
        let workspace = self.remote.create_workspace(name, description).await?;
        log::info!("Created workspace {} ({})", workspace.name, workspace.id);
        self.refresh_workspaces().await;
        Ok(workspace)
    }

    pub async fn create_project(
        &self,
        workspace_id: WorkspaceId,
        name: Option<&str>,
    ) -> Result<ProjectDetails, ApiError> {
        let project = self.remote.create_project(workspace_id, name).await?;
        log::info!("Created project {} ({})", project.name, project.id);
        self.refresh_workspaces().await;
        Ok(project)
    }

    pub async fn load_project(
        &self,
        workspace_id: WorkspaceId,
        project_id: ProjectId,
    ) -> Result<ProjectDetails, ApiError> {
        self.remote.get_project(workspace_id, project_id).await
    }

    /// Forget the cache, e.g. after sign-out.
    pub fn clear(&self) {
        self.workspaces
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fake::{Call, FakeRemote, Op};

    #[tokio::test]
    async fn test_refresh_replaces_cache() {
        let remote = Arc::new(FakeRemote::new());
        let wid = remote.add_workspace("Thesis");
        let catalog = CatalogClient::new(remote.clone());

        let listed = catalog.refresh_workspaces().await;
        assert_eq!(listed.len(), 1);
        assert_eq!(catalog.find_workspace(wid).map(|w| w.name), Some("Thesis".into()));
    }

    #[tokio::test]
    async fn test_failed_refresh_keeps_cache() {
        let remote = Arc::new(FakeRemote::new());
        remote.add_workspace("Thesis");
        let catalog = CatalogClient::new(remote.clone());
        catalog.refresh_workspaces().await;

        remote.fail_next(Op::ListWorkspaces, ApiError::Connectivity("down".into()));
        let listed = catalog.refresh_workspaces().await;

        assert!(listed.is_empty());
        assert_eq!(catalog.workspaces().len(), 1);
    }

    #[tokio::test]
    async fn test_create_workspace_refreshes_catalog() {
        let remote = Arc::new(FakeRemote::new());
        let catalog = CatalogClient::new(remote.clone());

        let created = catalog.create_workspace("Papers", Some("2026")).await.unwrap();

        assert!(catalog.find_workspace(created.id).is_some());
        assert_eq!(
            remote.calls(),
            vec![
                Call::CreateWorkspace {
                    name: "Papers".into()
                },
                Call::ListWorkspaces
            ]
        );
    }

    #[tokio::test]
    async fn test_create_project_refreshes_catalog() {
        let remote = Arc::new(FakeRemote::new());
        let wid = remote.add_workspace("Thesis");
        let catalog = CatalogClient::new(remote.clone());

        let project = catalog.create_project(wid, Some("Chapter 1")).await.unwrap();

        let workspace = catalog.find_workspace(wid).unwrap();
        assert_eq!(workspace.first_project().map(|p| p.id), Some(project.id));
    }

    #[tokio::test]
    async fn test_failed_create_skips_refresh() {
        let remote = Arc::new(FakeRemote::new());
        remote.fail_next(
            Op::CreateWorkspace,
            ApiError::Status {
                status: 409,
                message: "exists".into(),
            },
        );
        let catalog = CatalogClient::new(remote.clone());

        assert!(catalog.create_workspace("Papers", None).await.is_err());
        assert_eq!(remote.count(|c| matches!(c, Call::ListWorkspaces)), 0);
    }
}
