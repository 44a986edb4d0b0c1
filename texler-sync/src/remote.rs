//! Remote store interface: workspace/project/file CRUD plus the compile
//! endpoint.
//!
//! ```text
//! GET  /workspaces                                  → { workspaces: [...] }
//! POST /workspaces                                  → { workspace }
//! GET  /workspaces/{wid}                            → { workspace }
//! GET  /workspaces/{wid}/projects/{pid}             → { project }
//! POST /workspaces/{wid}/projects                   → { project }
//! POST /workspaces/{wid}/projects/{pid}/files       → { file: { path } }
//! PUT  /workspaces/{wid}/projects/{pid}/files       → { file: { path } }
//! POST /workspaces/{wid}/projects/{pid}/main-file   → { project }
//! POST /compile                                     → { success, pdf?, parsedErrors? }
//! ```
//!
//! [`HttpRemote`](crate::http::HttpRemote) speaks this over HTTP/JSON; tests
//! use an in-memory fake.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use texler_core::{CompilationSnapshot, ProjectDetails, ProjectId, WorkspaceId, WorkspaceSummary};

use crate::error::{ApiError, CompileError};

const GENERIC_COMPILE_FAILURE: &str = "Compilation failed";

#[async_trait]
pub trait RemoteApi: Send + Sync {
    async fn list_workspaces(&self) -> Result<Vec<WorkspaceSummary>, ApiError>;

    async fn get_workspace(&self, workspace_id: WorkspaceId) -> Result<WorkspaceSummary, ApiError>;

    async fn create_workspace(
        &self,
        name: &str,
        description: Option<&str>,
    ) -> Result<WorkspaceSummary, ApiError>;

    async fn get_project(
        &self,
        workspace_id: WorkspaceId,
        project_id: ProjectId,
    ) -> Result<ProjectDetails, ApiError>;

    async fn create_project(
        &self,
        workspace_id: WorkspaceId,
        name: Option<&str>,
    ) -> Result<ProjectDetails, ApiError>;

    /// Create a file; returns the path the server stored.
    async fn create_file(
        &self,
        workspace_id: WorkspaceId,
        project_id: ProjectId,
        path: &str,
        content: &str,
    ) -> Result<String, ApiError>;

    /// Overwrite a file's content; returns the path the server stored.
    async fn update_file(
        &self,
        workspace_id: WorkspaceId,
        project_id: ProjectId,
        path: &str,
        content: &str,
    ) -> Result<String, ApiError>;

    async fn set_main_file(
        &self,
        workspace_id: WorkspaceId,
        project_id: ProjectId,
        path: &str,
    ) -> Result<ProjectDetails, ApiError>;

    async fn compile(&self, snapshot: &CompilationSnapshot) -> Result<CompileResponse, ApiError>;
}

/// One diagnostic from the typesetting service.
///
/// The service is loose about shape: `line` is either a source line number
/// or the raw log line that reported the error.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Diagnostic {
    #[serde(default)]
    pub line: Option<serde_json::Value>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub context: Vec<String>,
}

impl Diagnostic {
    pub fn at(line: u32, message: impl Into<String>) -> Self {
        Self {
            line: Some(line.into()),
            message: Some(message.into()),
            context: Vec::new(),
        }
    }

    pub fn line_number(&self) -> Option<u32> {
        self.line
            .as_ref()
            .and_then(serde_json::Value::as_u64)
            .and_then(|n| u32::try_from(n).ok())
    }

    /// `message`, or the log line when that is all the service sent.
    pub fn text(&self) -> Option<&str> {
        self.message
            .as_deref()
            .or_else(|| self.line.as_ref().and_then(serde_json::Value::as_str))
            .map(str::trim)
            .filter(|text| !text.is_empty())
    }
}

/// Compile endpoint response.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CompileResponse {
    #[serde(default)]
    pub success: bool,
    /// Hex-encoded PDF
    #[serde(default)]
    pub pdf: Option<String>,
    #[serde(default, rename = "parsedErrors", alias = "parsed_errors")]
    pub parsed_errors: Option<Vec<Diagnostic>>,
    /// Service-level failure, e.g. missing main file
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub log: Option<String>,
}

impl CompileResponse {
    pub fn rendered(pdf_hex: impl Into<String>) -> Self {
        Self {
            success: true,
            pdf: Some(pdf_hex.into()),
            ..Self::default()
        }
    }

    pub fn failed(diagnostics: Vec<Diagnostic>) -> Self {
        Self {
            success: false,
            parsed_errors: Some(diagnostics),
            ..Self::default()
        }
    }

    /// Hex payload of a successful compile.
    pub fn artifact_hex(&self) -> Option<&str> {
        if self.success {
            self.pdf.as_deref()
        } else {
            None
        }
    }

    /// Failure built from the first diagnostic, then the `error` field,
    /// then a generic message.
    pub fn failure(&self) -> CompileError {
        let first = self.parsed_errors.as_deref().and_then(|d| d.first());

        if let Some(diagnostic) = first {
            if let Some(text) = diagnostic.text() {
                return CompileError {
                    line: diagnostic.line_number(),
                    message: text.to_string(),
                };
            }
        }

        let message = self
            .error
            .as_deref()
            .filter(|e| !e.trim().is_empty())
            .unwrap_or(GENERIC_COMPILE_FAILURE);
        CompileError {
            line: first.and_then(Diagnostic::line_number),
            message: message.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_response_with_numbered_diagnostic() {
        let response: CompileResponse = serde_json::from_value(serde_json::json!({
            "success": false,
            "parsedErrors": [{ "line": 3, "message": "Undefined control sequence" }]
        }))
        .unwrap();

        assert_eq!(response.artifact_hex(), None);
        assert_eq!(
            response.failure(),
            CompileError::at_line(3, "Undefined control sequence")
        );
    }

    #[test]
    fn test_response_with_log_line_diagnostic() {
        let response: CompileResponse = serde_json::from_value(serde_json::json!({
            "success": false,
            "output": "...",
            "errors": "",
            "pdf": null,
            "log": "This is pdfTeX",
            "parsedErrors": [{
                "line": "! LaTeX Error: File `missing.sty' not found.",
                "context": ["", "! LaTeX Error: File `missing.sty' not found.", ""]
            }]
        }))
        .unwrap();

        let failure = response.failure();
        assert_eq!(failure.line, None);
        assert_eq!(failure.message, "! LaTeX Error: File `missing.sty' not found.");
    }

    #[test]
    fn test_response_without_diagnostics() {
        let response: CompileResponse = serde_json::from_value(serde_json::json!({
            "success": false,
            "error": "Main file main.tex not found"
        }))
        .unwrap();
        assert_eq!(response.failure(), CompileError::new("Main file main.tex not found"));

        let bare = CompileResponse::default();
        assert_eq!(bare.failure(), CompileError::new("Compilation failed"));
    }

    #[test]
    fn test_success_without_pdf_is_not_an_artifact() {
        let response = CompileResponse {
            success: true,
            ..CompileResponse::default()
        };
        assert_eq!(response.artifact_hex(), None);
        assert_eq!(response.failure().message, "Compilation failed");
    }

    #[test]
    fn test_null_parsed_errors() {
        let response: CompileResponse = serde_json::from_value(serde_json::json!({
            "success": true,
            "pdf": "25504446",
            "parsedErrors": null
        }))
        .unwrap();
        assert_eq!(response.artifact_hex(), Some("25504446"));
    }
}
