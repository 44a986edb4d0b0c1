//! HTTP/JSON implementation of [`RemoteApi`].
//!
//! Every request carries the gate's bearer credential when one is present.
//! A 401 on any call invalidates the gate before the error is returned.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use texler_core::{CompilationSnapshot, ProjectDetails, ProjectId, WorkspaceId, WorkspaceSummary};

use crate::config::EngineConfig;
use crate::credentials::CredentialGate;
use crate::error::ApiError;
use crate::remote::{CompileResponse, RemoteApi};

#[derive(Debug, Deserialize)]
struct WorkspaceListEnvelope {
    workspaces: Vec<WorkspaceSummary>,
}

#[derive(Debug, Deserialize)]
struct WorkspaceEnvelope {
    workspace: WorkspaceSummary,
}

#[derive(Debug, Deserialize)]
struct ProjectEnvelope {
    project: ProjectDetails,
}

#[derive(Debug, Deserialize)]
struct FileEnvelope {
    file: FilePath,
}

#[derive(Debug, Deserialize)]
struct FilePath {
    path: String,
}

#[derive(Debug, Deserialize)]
struct LoginEnvelope {
    data: LoginData,
}

#[derive(Debug, Deserialize)]
struct LoginData {
    access_token: String,
}

pub struct HttpRemote {
    client: Client,
    config: EngineConfig,
    gate: Arc<CredentialGate>,
}

impl HttpRemote {
    pub fn new(config: EngineConfig, gate: Arc<CredentialGate>) -> Result<Self, ApiError> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| ApiError::Connectivity(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            config,
            gate,
        })
    }

    pub fn gate(&self) -> &Arc<CredentialGate> {
        &self.gate
    }

    /// Exchange email/password for an access token and install it in the
    /// gate.
    pub async fn login(&self, email: &str, password: &str) -> Result<(), ApiError> {
        let body = serde_json::json!({ "email": email, "password": password });
        let envelope: LoginEnvelope = self
            .send(self.request(Method::POST, "/auth/login").json(&body))
            .await?;
        self.gate.set_token(envelope.data.access_token);
        log::info!("Signed in as {email}");
        Ok(())
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.request_url(method, self.config.url(path))
    }

    fn request_url(&self, method: Method, url: String) -> RequestBuilder {
        let builder = self.client.request(method, url);
        match self.gate.bearer() {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn send<T: DeserializeOwned>(&self, builder: RequestBuilder) -> Result<T, ApiError> {
        let response = builder.send().await?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED {
            self.gate.invalidate();
            return Err(ApiError::Unauthorized);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::Status {
                status: status.as_u16(),
                message: error_message(&body, status),
            });
        }

        Ok(response.json::<T>().await?)
    }
}

/// Best human-readable message from an error body.
///
/// Understands `{ "error": "..." }`, `{ "error": { "message": "..." } }` and
/// `{ "message": "..." }`; anything else falls back to the raw body.
fn error_message(body: &str, status: StatusCode) -> String {
    if let Ok(value) = serde_json::from_str::<serde_json::Value>(body) {
        let message = value
            .get("error")
            .and_then(|e| e.as_str().or_else(|| e.get("message").and_then(|m| m.as_str())))
            .or_else(|| value.get("message").and_then(|m| m.as_str()));
        if let Some(message) = message {
            return message.to_string();
        }
    }

    let trimmed = body.trim();
    if trimmed.is_empty() {
        format!("HTTP {status}")
    } else {
        trimmed.to_string()
    }
}

fn project_path(workspace_id: WorkspaceId, project_id: ProjectId) -> String {
    format!("/workspaces/{workspace_id}/projects/{project_id}")
}

#[async_trait]
impl RemoteApi for HttpRemote {
    async fn list_workspaces(&self) -> Result<Vec<WorkspaceSummary>, ApiError> {
        let envelope: WorkspaceListEnvelope =
            self.send(self.request(Method::GET, "/workspaces")).await?;
        Ok(envelope.workspaces)
    }

    async fn get_workspace(&self, workspace_id: WorkspaceId) -> Result<WorkspaceSummary, ApiError> {
        let envelope: WorkspaceEnvelope = self
            .send(self.request(Method::GET, &format!("/workspaces/{workspace_id}")))
            .await?;
        Ok(envelope.workspace)
    }

    async fn create_workspace(
        &self,
        name: &str,
        description: Option<&str>,
    ) -> Result<WorkspaceSummary, ApiError> {
        let body = serde_json::json!({ "name": name, "description": description });
        let envelope: WorkspaceEnvelope = self
            .send(self.request(Method::POST, "/workspaces").json(&body))
            .await?;
        Ok(envelope.workspace)
    }

    async fn get_project(
        &self,
        workspace_id: WorkspaceId,
        project_id: ProjectId,
    ) -> Result<ProjectDetails, ApiError> {
        let envelope: ProjectEnvelope = self
            .send(self.request(Method::GET, &project_path(workspace_id, project_id)))
            .await?;
        Ok(envelope.project)
    }

    async fn create_project(
        &self,
        workspace_id: WorkspaceId,
        name: Option<&str>,
    ) -> Result<ProjectDetails, ApiError> {
        let body = serde_json::json!({ "name": name });
        let envelope: ProjectEnvelope = self
            .send(
                self.request(Method::POST, &format!("/workspaces/{workspace_id}/projects"))
                    .json(&body),
            )
            .await?;
        Ok(envelope.project)
    }

    async fn create_file(
        &self,
        workspace_id: WorkspaceId,
        project_id: ProjectId,
        path: &str,
        content: &str,
    ) -> Result<String, ApiError> {
        let body = serde_json::json!({ "path": path, "content": content });
        let url = format!("{}/files", project_path(workspace_id, project_id));
        let envelope: FileEnvelope = self
            .send(self.request(Method::POST, &url).json(&body))
            .await?;
        Ok(envelope.file.path)
    }

    async fn update_file(
        &self,
        workspace_id: WorkspaceId,
        project_id: ProjectId,
        path: &str,
        content: &str,
    ) -> Result<String, ApiError> {
        let body = serde_json::json!({ "path": path, "content": content });
        let url = format!("{}/files", project_path(workspace_id, project_id));
        let envelope: FileEnvelope = self
            .send(self.request(Method::PUT, &url).json(&body))
            .await?;
        Ok(envelope.file.path)
    }

    async fn set_main_file(
        &self,
        workspace_id: WorkspaceId,
        project_id: ProjectId,
        path: &str,
    ) -> Result<ProjectDetails, ApiError> {
        let body = serde_json::json!({ "path": path });
        let url = format!("{}/main-file", project_path(workspace_id, project_id));
        let envelope: ProjectEnvelope = self
            .send(self.request(Method::POST, &url).json(&body))
            .await?;
        Ok(envelope.project)
    }

    async fn compile(&self, snapshot: &CompilationSnapshot) -> Result<CompileResponse, ApiError> {
        self.send(
            self.request_url(Method::POST, self.config.compile_url())
                .json(snapshot),
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_message_shapes() {
        let status = StatusCode::BAD_REQUEST;
        assert_eq!(
            error_message(r#"{"success":false,"error":"Main file x.tex not found"}"#, status),
            "Main file x.tex not found"
        );
        assert_eq!(
            error_message(
                r#"{"success":false,"error":{"code":"NOT_FOUND","message":"File not found: a.tex"}}"#,
                status
            ),
            "File not found: a.tex"
        );
        assert_eq!(error_message(r#"{"message":"nope"}"#, status), "nope");
        assert_eq!(error_message("plain text", status), "plain text");
        assert_eq!(error_message("", status), "HTTP 400 Bad Request");
    }

    #[test]
    fn test_project_path() {
        let wid = uuid::Uuid::nil();
        let pid = uuid::Uuid::nil();
        assert_eq!(
            project_path(wid, pid),
            format!("/workspaces/{wid}/projects/{pid}")
        );
    }
}
