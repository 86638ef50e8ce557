//! HTTP-level tests for the MergeAI API.
//!
//! The router is driven in-process with `tower::ServiceExt::oneshot` against a
//! real artifact store in a temp directory and a scripted engine:
//!
//! - left input `FAIL`     → exit 1, stderr `fatal: invalid syntax`
//! - left input `CONFLICT` → exit 0, one conflict in the stderr block
//! - third path present    → stdout is `resolved:` + the resolutions document
//! - otherwise             → stdout is left + right

use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tempfile::TempDir;
use tower::ServiceExt;

use mergeai_core::config::WebConfig;
use mergeai_core::engine::{EngineOutput, MergeEngine};
use mergeai_core::errors::EngineError;
use mergeai_core::{ArtifactStore, MergeOrchestrator};
use mergeai_web::WebServer;

// ===========================================================================
// Helpers
// ===========================================================================

const BOUNDARY: &str = "mergeai-test-boundary";

#[derive(Default)]
struct ScriptedEngine {
    calls: AtomicUsize,
}

#[async_trait]
impl MergeEngine for ScriptedEngine {
    async fn invoke(&self, paths: &[PathBuf]) -> Result<EngineOutput, EngineError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let left = tokio::fs::read_to_string(&paths[0]).await?;
        let right = tokio::fs::read_to_string(&paths[1]).await?;

        if left == "FAIL" {
            return Ok(EngineOutput {
                stdout: "garbage".into(),
                stderr: "fatal: invalid syntax\n".into(),
                exit_code: 1,
            });
        }

        let stderr = if left == "CONFLICT" {
            "===MERGEAI_CONFLICTS_START===\n[{\"id\": 1, \"type\": \"method\", \"message\": \"Add differs\"}]\n===MERGEAI_CONFLICTS_END===\n".to_string()
        } else {
            String::new()
        };

        let stdout = match paths.get(2) {
            Some(resolutions) => format!("resolved:{}", tokio::fs::read_to_string(resolutions).await?),
            None => format!("{}{}", left, right),
        };

        Ok(EngineOutput {
            stdout: stdout.into_bytes(),
            stderr,
            exit_code: 0,
        })
    }
}

struct TestApp {
    _dir: TempDir,
    router: Router,
    engine: Arc<ScriptedEngine>,
    store: ArtifactStore,
}

async fn test_app() -> TestApp {
    test_app_with(WebConfig::default()).await
}

async fn test_app_with(config: WebConfig) -> TestApp {
    let dir = tempfile::tempdir().unwrap();
    let store = ArtifactStore::open(dir.path().join("artifacts")).await.unwrap();
    let engine = Arc::new(ScriptedEngine::default());
    let orchestrator = MergeOrchestrator::new(store.clone(), engine.clone())
        .with_download_prefix(config.download_prefix.clone());
    let router = WebServer::new(config, orchestrator).router();
    TestApp {
        _dir: dir,
        router,
        engine,
        store,
    }
}

/// Multipart form builder.
struct Form {
    body: Vec<u8>,
}

impl Form {
    fn new() -> Self {
        Self { body: Vec::new() }
    }

    fn file(mut self, name: &str, file_name: &str, content: impl AsRef<[u8]>) -> Self {
        self.body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\nContent-Type: application/octet-stream\r\n\r\n",
                BOUNDARY, name, file_name
            )
            .as_bytes(),
        );
        self.body.extend_from_slice(content.as_ref());
        self.body.extend_from_slice(b"\r\n");
        self
    }

    fn text(mut self, name: &str, content: impl AsRef<[u8]>) -> Self {
        self.body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{}\"\r\n\r\n",
                BOUNDARY, name
            )
            .as_bytes(),
        );
        self.body.extend_from_slice(content.as_ref());
        self.body.extend_from_slice(b"\r\n");
        self
    }

    fn into_body(mut self) -> Body {
        self.body
            .extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());
        Body::from(self.body)
    }
}

fn post(uri: &str, body: Body) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", BOUNDARY),
        )
        .body(body)
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

async fn send(app: &TestApp, request: Request<Body>) -> (StatusCode, Vec<u8>) {
    let response = app.router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, bytes.to_vec())
}

async fn send_json(app: &TestApp, request: Request<Body>) -> (StatusCode, Value) {
    let (status, bytes) = send(app, request).await;
    (status, serde_json::from_slice(&bytes).unwrap())
}

fn artifact_count(app: &TestApp) -> usize {
    std::fs::read_dir(app.store.root()).unwrap().count()
}

// ===========================================================================
// Detect
// ===========================================================================

#[tokio::test]
async fn test_detect_clean_merge_and_download() {
    let app = test_app().await;
    let body = Form::new()
        .file("file1", "FileA.cs", b"class A {}\n")
        .file("file2", "FileB.cs", b"class B {}\n")
        .into_body();

    let (status, json) = send_json(&app, post("/merge", body)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["conflicts"], json!([]));

    let id = json["merged_artifact_id"].as_str().unwrap();
    assert!(id.starts_with("merged_"));
    let reference = json["download_reference"].as_str().unwrap();
    assert_eq!(reference, format!("/download/{}", id));

    let (status, bytes) = send(&app, get(reference)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(bytes, b"class A {}\nclass B {}\n");
}

#[tokio::test]
async fn test_download_headers() {
    let app = test_app().await;
    let body = Form::new()
        .file("file1", "a.cs", b"a")
        .file("file2", "b.cs", b"b")
        .into_body();
    let (_, json) = send_json(&app, post("/merge", body)).await;
    let reference = json["download_reference"].as_str().unwrap();

    let response = app.router.clone().oneshot(get(reference)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let content_type = response.headers()[header::CONTENT_TYPE].to_str().unwrap();
    assert!(content_type.starts_with("text/plain"));
    let disposition = response.headers()[header::CONTENT_DISPOSITION].to_str().unwrap();
    assert!(disposition.starts_with("attachment"));
    assert!(disposition.contains(json["merged_artifact_id"].as_str().unwrap()));
}

#[tokio::test]
async fn test_detect_returns_conflicts() {
    let app = test_app().await;
    let body = Form::new()
        .file("file1", "a.cs", b"CONFLICT")
        .file("file2", "b.cs", b"other")
        .into_body();

    let (status, json) = send_json(&app, post("/merge", body)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        json["conflicts"],
        json!([{"id": 1, "type": "method", "message": "Add differs"}])
    );
}

#[tokio::test]
async fn test_detect_engine_failure() {
    let app = test_app().await;
    let body = Form::new()
        .file("file1", "a.cs", b"FAIL")
        .file("file2", "b.cs", b"b")
        .into_body();

    let (status, json) = send_json(&app, post("/merge", body)).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(json, json!({"error": "fatal: invalid syntax"}));

    // Only the two staged inputs; no merged output.
    assert_eq!(artifact_count(&app), 2);
}

#[tokio::test]
async fn test_detect_missing_file() {
    let app = test_app().await;
    let body = Form::new().file("file1", "a.cs", b"a").into_body();

    let (status, json) = send_json(&app, post("/merge", body)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json["error"].as_str().unwrap().contains("file2"));
    assert_eq!(app.engine.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_identical_uploads_produce_distinct_artifacts() {
    let app = test_app().await;
    let mut ids = Vec::new();
    for _ in 0..2 {
        let body = Form::new()
            .file("file1", "same.cs", b"x")
            .file("file2", "same.cs", b"y")
            .into_body();
        let (status, json) = send_json(&app, post("/merge", body)).await;
        assert_eq!(status, StatusCode::OK);
        ids.push(json["merged_artifact_id"].as_str().unwrap().to_string());
    }
    assert_ne!(ids[0], ids[1]);

    for id in &ids {
        let (status, bytes) = send(&app, get(&format!("/download/{}", id))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(bytes, b"xy");
    }
}

#[tokio::test]
async fn test_upload_limit() {
    let config = WebConfig {
        max_upload_bytes: 64,
        ..WebConfig::default()
    };
    let app = test_app_with(config).await;
    let big = vec![b'x'; 1024];
    let body = Form::new()
        .file("file1", "a.cs", &big)
        .file("file2", "b.cs", b"b")
        .into_body();

    let response = app.router.clone().oneshot(post("/merge", body)).await.unwrap();
    assert!(response.status().is_client_error());
    assert_eq!(app.engine.calls.load(Ordering::SeqCst), 0);
}

// ===========================================================================
// Resolve
// ===========================================================================

#[tokio::test]
async fn test_resolve_passes_resolutions() {
    let app = test_app().await;
    let resolutions = br#"[{"id": 1, "choice": "A"}, {"id": 2, "choice": "Both"}]"#;
    let body = Form::new()
        .file("file1", "a.cs", b"left")
        .file("file2", "b.cs", b"right")
        .file("resolutions", "resolutions.json", resolutions)
        .into_body();

    let (status, json) = send_json(&app, post("/merge/resolve", body)).await;
    assert_eq!(status, StatusCode::OK);
    let id = json["merged_artifact_id"].as_str().unwrap();
    assert!(id.starts_with("final_"));

    let (status, bytes) = send(&app, get(json["download_reference"].as_str().unwrap())).await;
    assert_eq!(status, StatusCode::OK);
    let text = String::from_utf8(bytes).unwrap();
    let sent: Value = serde_json::from_str(text.strip_prefix("resolved:").unwrap()).unwrap();
    assert_eq!(
        sent,
        json!([{"Id": 1, "Choice": "A"}, {"Id": 2, "Choice": "Both"}])
    );
}

#[tokio::test]
async fn test_resolve_accepts_text_field_and_engine_casing() {
    let app = test_app().await;
    let body = Form::new()
        .file("file1", "a.cs", b"left")
        .file("file2", "b.cs", b"right")
        .text("resolutions", br#"[{"Id": 3, "Choice": "B"}]"#)
        .into_body();

    let (status, json) = send_json(&app, post("/merge/resolve", body)).await;
    assert_eq!(status, StatusCode::OK);
    assert!(json["merged_artifact_id"].as_str().unwrap().starts_with("final_"));
}

#[tokio::test]
async fn test_resolve_rejects_bad_resolutions() {
    let app = test_app().await;
    let body = Form::new()
        .file("file1", "a.cs", b"left")
        .file("file2", "b.cs", b"right")
        .text("resolutions", br#"[{"id": 1, "choice": "C"}]"#)
        .into_body();

    let (status, json) = send_json(&app, post("/merge/resolve", body)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json["error"].as_str().unwrap().starts_with("invalid resolutions"));
    assert_eq!(app.engine.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_resolve_requires_resolutions() {
    let app = test_app().await;
    let body = Form::new()
        .file("file1", "a.cs", b"left")
        .file("file2", "b.cs", b"right")
        .into_body();

    let (status, _) = send_json(&app, post("/merge/resolve", body)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

// ===========================================================================
// Download & status
// ===========================================================================

#[tokio::test]
async fn test_download_unknown_artifact() {
    let app = test_app().await;
    let (status, json) = send_json(&app, get("/download/merged_doesnotexist.cs")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json, json!({"error": "artifact not found"}));
}

#[tokio::test]
async fn test_download_rejects_traversal() {
    let app = test_app().await;
    std::fs::write(app.store.root().join("..").join("secret.txt"), b"secret").unwrap();

    let (status, json) = send_json(&app, get("/download/..%2Fsecret.txt")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json, json!({"error": "artifact not found"}));
}

#[tokio::test]
async fn test_ping() {
    let app = test_app().await;
    let (status, json) = send_json(&app, get("/ping")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json, json!({"message": "MergeAI backend is running!"}));
}

#[tokio::test]
async fn test_health() {
    let app = test_app().await;
    let (status, json) = send_json(&app, get("/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["ok"], json!(true));
    assert!(json["version"].is_string());
}

#[tokio::test]
async fn test_custom_download_prefix() {
    let config = WebConfig {
        download_prefix: "/files".into(),
        ..WebConfig::default()
    };
    let app = test_app_with(config).await;
    let body = Form::new()
        .file("file1", "a.cs", b"a")
        .file("file2", "b.cs", b"b")
        .into_body();
    let (_, json) = send_json(&app, post("/merge", body)).await;
    assert!(json["download_reference"]
        .as_str()
        .unwrap()
        .starts_with("/files/merged_"));
}
