//! Wire-level tests for the HTTP remote against a mock server.

use std::sync::Arc;

use serde_json::json;
use texler_core::CompilationSnapshot;
use texler_sync::{ApiError, CredentialGate, EngineConfig, HttpRemote, RemoteApi};
use uuid::Uuid;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn remote_with_token(server: &MockServer, token: Option<&str>) -> (HttpRemote, Arc<CredentialGate>) {
    let gate = Arc::new(match token {
        Some(token) => CredentialGate::with_token(token),
        None => CredentialGate::new(),
    });
    let config = EngineConfig {
        api_base_url: format!("{}/api/v1", server.uri()),
        ..EngineConfig::for_testing()
    };
    (HttpRemote::new(config, gate.clone()).unwrap(), gate)
}

#[tokio::test]
async fn test_list_workspaces_sends_bearer_and_parses_catalog() {
    let server = MockServer::start().await;
    let wid = Uuid::new_v4();
    let pid = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path("/api/v1/workspaces"))
        .and(header("authorization", "Bearer secret"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "workspaces": [{
                "id": wid,
                "name": "Thesis",
                "description": null,
                "owner_id": Uuid::new_v4(),
                "project_count": 1,
                "created_at": "2026-01-05T10:00:00Z",
                "updated_at": "2026-01-06T10:00:00Z",
                "projects": [{
                    "id": pid,
                    "workspace_id": wid,
                    "name": "Draft",
                    "main_file": "main.tex",
                    "file_count": 2
                }]
            }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let (remote, _) = remote_with_token(&server, Some("secret")).await;
    let workspaces = remote.list_workspaces().await.unwrap();

    assert_eq!(workspaces.len(), 1);
    assert_eq!(workspaces[0].name, "Thesis");
    assert!(workspaces[0].created_at.is_some());
    assert_eq!(workspaces[0].first_project().map(|p| p.id), Some(pid));
}

#[tokio::test]
async fn test_get_project_payload() {
    let server = MockServer::start().await;
    let wid = Uuid::new_v4();
    let pid = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path(format!("/api/v1/workspaces/{wid}/projects/{pid}")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "project": {
                "id": pid,
                "name": "Draft",
                "main_file": null,
                "files": {
                    "chapters/one.tex": { "path": "chapters/one.tex", "content": "One", "is_main": false },
                    "main.tex": { "path": "main.tex", "content": "Main", "is_main": true }
                }
            }
        })))
        .mount(&server)
        .await;

    let (remote, _) = remote_with_token(&server, Some("t")).await;
    let project = remote.get_project(wid, pid).await.unwrap();

    assert_eq!(project.files.len(), 2);
    assert_eq!(project.declared_main(), Some("main.tex"));
}

#[tokio::test]
async fn test_update_file_body() {
    let server = MockServer::start().await;
    let wid = Uuid::new_v4();
    let pid = Uuid::new_v4();

    Mock::given(method("PUT"))
        .and(path(format!("/api/v1/workspaces/{wid}/projects/{pid}/files")))
        .and(body_json(json!({ "path": "main.tex", "content": "new" })))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "file": { "path": "main.tex" } })),
        )
        .expect(1)
        .mount(&server)
        .await;

    let (remote, _) = remote_with_token(&server, Some("t")).await;
    let stored = remote.update_file(wid, pid, "main.tex", "new").await.unwrap();
    assert_eq!(stored, "main.tex");
}

#[tokio::test]
async fn test_unauthorized_invalidates_gate() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/workspaces"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "success": false,
            "error": { "code": "UNAUTHORIZED", "message": "Token expired" }
        })))
        .mount(&server)
        .await;

    let (remote, gate) = remote_with_token(&server, Some("stale")).await;
    let err = remote.list_workspaces().await.unwrap_err();

    assert_eq!(err, ApiError::Unauthorized);
    assert!(!gate.is_authenticated());
}

#[tokio::test]
async fn test_error_body_message_is_surfaced() {
    let server = MockServer::start().await;
    let wid = Uuid::new_v4();
    Mock::given(method("GET"))
        .and(path(format!("/api/v1/workspaces/{wid}")))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "success": false,
            "error": {
                "code": "NOT_FOUND",
                "message": "Workspace not found",
                "timestamp": "2026-01-05T10:00:00Z"
            }
        })))
        .mount(&server)
        .await;

    let (remote, _) = remote_with_token(&server, Some("t")).await;
    assert_eq!(
        remote.get_workspace(wid).await.unwrap_err(),
        ApiError::Status {
            status: 404,
            message: "Workspace not found".into()
        }
    );
}

#[tokio::test]
async fn test_malformed_body_is_decode_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/workspaces"))
        .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
        .mount(&server)
        .await;

    let (remote, _) = remote_with_token(&server, Some("t")).await;
    assert!(matches!(
        remote.list_workspaces().await,
        Err(ApiError::Decode(_))
    ));
}

#[tokio::test]
async fn test_compile_request_and_diagnostics() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/compile"))
        .and(body_json(json!({
            "files": { "main.tex": "\\undefined" },
            "main_file": "main.tex"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": false,
            "pdf": null,
            "parsedErrors": [{ "line": 3, "message": "Undefined control sequence" }]
        })))
        .mount(&server)
        .await;

    let (remote, _) = remote_with_token(&server, Some("t")).await;
    let snapshot = CompilationSnapshot {
        files: [("main.tex".to_string(), "\\undefined".to_string())].into(),
        main_file: "main.tex".to_string(),
    };
    let response = remote.compile(&snapshot).await.unwrap();

    assert!(!response.success);
    let failure = response.failure();
    assert_eq!(failure.line, Some(3));
    assert_eq!(failure.message, "Undefined control sequence");
}

#[tokio::test]
async fn test_login_installs_token() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/auth/login"))
        .and(body_json(json!({ "email": "ada@example.com", "password": "pw" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "data": {
                "access_token": "fresh-token",
                "refresh_token": "refresh",
                "expires_in": 3600,
                "user": { "email": "ada@example.com" }
            }
        })))
        .mount(&server)
        .await;

    let (remote, gate) = remote_with_token(&server, None).await;
    remote.login("ada@example.com", "pw").await.unwrap();

    assert_eq!(gate.bearer().as_deref(), Some("fresh-token"));
    assert_eq!(gate.epoch(), 1);
}

#[tokio::test]
async fn test_unreachable_server_is_connectivity_error() {
    let gate = Arc::new(CredentialGate::with_token("t"));
    let config = EngineConfig {
        api_base_url: "http://127.0.0.1:9/api/v1".to_string(),
        ..EngineConfig::for_testing()
    };
    let remote = HttpRemote::new(config, gate.clone()).unwrap();

    assert!(matches!(
        remote.list_workspaces().await,
        Err(ApiError::Connectivity(_))
    ));
    assert!(gate.is_authenticated());
}
