//! Integration tests for the media upload and analysis endpoints.
//!
//! Each test serves the router on an ephemeral port with an offline pipeline
//! (every external tool points at a nonexistent path) and a real background
//! worker, then drives it over HTTP.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use casegen_api::{app, ApiConfig, AppState};
use casegen_core::{InMemoryMediaRepository, MediaRepository};
use casegen_inference::OllamaConfig;
use casegen_pipeline::{AnalysisConfig, AnalysisWorker, VideoAnalysisPipeline, WorkerConfig, WorkerHandle};
use reqwest::{multipart, StatusCode};
use serde_json::Value;
use tempfile::TempDir;
use uuid::Uuid;

// ============================================================================
// HELPER FUNCTIONS
// ============================================================================

struct TestServer {
    base_url: String,
    repo: InMemoryMediaRepository,
    client: reqwest::Client,
    storage_dir: PathBuf,
    _worker: WorkerHandle,
    _dir: TempDir,
}

fn offline_config(workspace_root: &Path) -> AnalysisConfig {
    AnalysisConfig::default()
        .with_all_tools("/nonexistent/casegen-test-tool")
        .with_workspace_root(workspace_root)
        .with_ollama(OllamaConfig {
            base_url: "http://127.0.0.1:9".to_string(),
            ..OllamaConfig::default()
        })
}

async fn spawn_server_with(
    worker_config: WorkerConfig,
    workspace_root: impl Fn(&Path) -> std::path::PathBuf,
) -> TestServer {
    let dir = tempfile::tempdir().unwrap();
    let pipeline = Arc::new(
        VideoAnalysisPipeline::from_config(offline_config(&workspace_root(dir.path())))
            .expect("Failed to build pipeline"),
    );
    let repo = InMemoryMediaRepository::new();
    let worker = AnalysisWorker::new(Arc::new(repo.clone()), pipeline.clone(), worker_config).start();

    let storage_dir = dir.path().join("media");
    let config = ApiConfig {
        media_storage_dir: storage_dir.clone(),
        ..ApiConfig::default()
    };
    let state = AppState {
        repo: Arc::new(repo.clone()),
        queue: worker.queue(),
        pipeline,
        config: Arc::new(config),
    };

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app(state)).await.unwrap();
    });

    TestServer {
        base_url: format!("http://{}", addr),
        repo,
        client: reqwest::Client::new(),
        storage_dir,
        _worker: worker,
        _dir: dir,
    }
}

async fn spawn_server() -> TestServer {
    spawn_server_with(WorkerConfig::default(), |root| root.join("work")).await
}

impl TestServer {
    fn stored_files(&self) -> usize {
        std::fs::read_dir(&self.storage_dir)
            .map(|entries| entries.count())
            .unwrap_or(0)
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn upload(&self, name: &str, bytes: &[u8]) -> Value {
        let form = multipart::Form::new().part(
            "file",
            multipart::Part::bytes(bytes.to_vec()).file_name(name.to_string()),
        );
        let response = self
            .client
            .post(self.url("/api/v1/media"))
            .header("X-User-Id", "alice")
            .multipart(form)
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        response.json().await.unwrap()
    }

    async fn analyze(&self, id: &str, force: bool) -> reqwest::Response {
        self.client
            .post(self.url(&format!("/api/v1/media/{}/analyze?force={}", id, force)))
            .send()
            .await
            .unwrap()
    }

    async fn get(&self, path: &str) -> reqwest::Response {
        self.client.get(self.url(path)).send().await.unwrap()
    }

    /// Poll the asset until it reaches `status`.
    async fn wait_for_status(&self, id: &str, status: &str) -> Value {
        tokio::time::timeout(Duration::from_secs(30), async {
            loop {
                let asset: Value = self
                    .get(&format!("/api/v1/media/{}", id))
                    .await
                    .json()
                    .await
                    .unwrap();
                if asset["status"] == status {
                    return asset;
                }
                tokio::time::sleep(Duration::from_millis(25)).await;
            }
        })
        .await
        .expect("Timed out waiting for asset status")
    }
}

fn media_id(asset: &Value) -> String {
    asset["id"].as_str().unwrap().to_string()
}

// ============================================================================
// TESTS
// ============================================================================

#[tokio::test]
async fn test_health_check() {
    let server = spawn_server().await;
    let response = server.get("/health").await;
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["status"], "healthy");
    assert!(body["version"].is_string());
}

#[tokio::test]
async fn test_tool_report_lists_offline_tools() {
    let server = spawn_server().await;
    let response = server.get("/api/v1/tools").await;
    assert_eq!(response.status(), StatusCode::OK);

    let report: Value = response.json().await.unwrap();
    let tools = report["tools"].as_array().unwrap();
    assert!(!tools.is_empty());
    assert!(tools.iter().all(|t| t["available"] == false));
    let strategies = report["strategies"].as_array().unwrap();
    assert_eq!(strategies.last().unwrap(), "static_fallback");
}

#[tokio::test]
async fn test_upload_analyze_and_fetch_result() {
    let server = spawn_server().await;

    let asset = server.upload("login_flow.mp4", b"not really a video").await;
    assert_eq!(asset["status"], "uploaded");
    assert_eq!(asset["owner_id"], "alice");
    assert_eq!(asset["filename"], "login_flow.mp4");
    assert_eq!(asset["size_bytes"], 18);
    let id = media_id(&asset);

    let response = server.analyze(&id, false).await;
    assert_eq!(response.status(), StatusCode::ACCEPTED);
    let accepted: Value = response.json().await.unwrap();
    assert_eq!(accepted["media_id"], id.as_str());
    assert_eq!(accepted["status"], "analyzing");
    assert!(accepted["job_id"].is_string());

    server.wait_for_status(&id, "completed").await;

    let response = server.get(&format!("/api/v1/media/{}/result", id)).await;
    assert_eq!(response.status(), StatusCode::OK);
    let result: Value = response.json().await.unwrap();
    assert_eq!(result["strategy"], "filename_heuristic");
    assert!(result["title"].as_str().unwrap().contains("Login"));
    assert_eq!(result["status"], "Draft");
    assert_eq!(result["full_script"], result["description"]);
    assert!(!result["steps"].as_array().unwrap().is_empty());

    // Completed and not forced: the stored result comes back directly.
    let response = server.analyze(&id, false).await;
    assert_eq!(response.status(), StatusCode::OK);
    let again: Value = response.json().await.unwrap();
    assert_eq!(again["title"], result["title"]);
    assert_eq!(again["analyzed_at"], result["analyzed_at"]);

    // Forced: a new job is queued.
    let response = server.analyze(&id, true).await;
    assert_eq!(response.status(), StatusCode::ACCEPTED);
    server.wait_for_status(&id, "completed").await;
}

#[tokio::test]
async fn test_upload_rejects_missing_and_empty_file() {
    let server = spawn_server().await;

    let form = multipart::Form::new().text("filename", "login_flow.mp4");
    let response = server
        .client
        .post(server.url("/api/v1/media"))
        .multipart(form)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: Value = response.json().await.unwrap();
    assert!(body["error"].as_str().unwrap().contains("Missing file"));

    let form = multipart::Form::new().part(
        "file",
        multipart::Part::bytes(Vec::new()).file_name("empty.mp4"),
    );
    let response = server
        .client
        .post(server.url("/api/v1/media"))
        .multipart(form)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(server.repo.len().await, 0);
    assert_eq!(server.stored_files(), 0);
}

#[tokio::test]
async fn test_large_upload_is_stored_intact() {
    let server = spawn_server().await;
    let bytes: Vec<u8> = (0..3 * 1024 * 1024).map(|i| (i % 251) as u8).collect();

    let form = multipart::Form::new()
        .part(
            "file",
            multipart::Part::bytes(bytes.clone()).file_name("long_session.mp4"),
        )
        .text("filename", "Checkout Flow.mp4");
    let response = server
        .client
        .post(server.url("/api/v1/media"))
        .multipart(form)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let asset: Value = response.json().await.unwrap();

    assert_eq!(asset["size_bytes"], bytes.len() as u64);
    assert_eq!(asset["filename"], "Checkout_Flow.mp4");
    let stored = std::fs::read(asset["storage_path"].as_str().unwrap()).unwrap();
    assert!(stored == bytes);
    assert_eq!(server.stored_files(), 1);
}

#[tokio::test]
async fn test_unknown_media_is_not_found() {
    let server = spawn_server().await;
    let id = Uuid::new_v4().to_string();

    assert_eq!(
        server.get(&format!("/api/v1/media/{}", id)).await.status(),
        StatusCode::NOT_FOUND
    );
    assert_eq!(server.analyze(&id, false).await.status(), StatusCode::NOT_FOUND);
    assert_eq!(
        server.get(&format!("/api/v1/media/{}/result", id)).await.status(),
        StatusCode::NOT_FOUND
    );
}

#[tokio::test]
async fn test_analyze_rejects_emptied_file() {
    let server = spawn_server().await;
    let asset = server.upload("checkout.mp4", b"video").await;
    let id = media_id(&asset);

    let storage_path = asset["storage_path"].as_str().unwrap();
    std::fs::write(storage_path, b"").unwrap();

    let response = server.analyze(&id, false).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: Value = response.json().await.unwrap();
    assert!(body["error"].as_str().unwrap().contains("empty"));

    std::fs::remove_file(storage_path).unwrap();
    assert_eq!(server.analyze(&id, false).await.status(), StatusCode::BAD_REQUEST);

    // Rejected requests leave the asset untouched.
    let asset: Value = server
        .get(&format!("/api/v1/media/{}", id))
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(asset["status"], "uploaded");
}

#[tokio::test]
async fn test_analyze_conflicts_while_analyzing() {
    let server = spawn_server().await;
    let asset = server.upload("settings.mp4", b"video").await;
    let id = media_id(&asset);

    // Move to `analyzing` without queueing a job so the state holds still.
    server
        .repo
        .begin_analysis(Uuid::parse_str(&id).unwrap(), false)
        .await
        .unwrap();

    assert_eq!(server.analyze(&id, false).await.status(), StatusCode::CONFLICT);
    assert_eq!(
        server.get(&format!("/api/v1/media/{}/result", id)).await.status(),
        StatusCode::CONFLICT
    );
}

#[tokio::test]
async fn test_result_before_analysis_is_not_found() {
    let server = spawn_server().await;
    let asset = server.upload("login_flow.mp4", b"video").await;

    let response = server
        .get(&format!("/api/v1/media/{}/result", media_id(&asset)))
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_unrecoverable_failure_surfaces_as_server_error() {
    // The workspace root sits under a regular file, so no workspace can be created.
    let server = spawn_server_with(WorkerConfig::default(), |root| {
        let blocker = root.join("blocker");
        std::fs::write(&blocker, b"file").unwrap();
        blocker.join("work")
    })
    .await;
    let asset = server.upload("login_flow.mp4", b"video").await;
    let id = media_id(&asset);

    assert_eq!(server.analyze(&id, false).await.status(), StatusCode::ACCEPTED);
    let failed = server.wait_for_status(&id, "failed").await;
    assert!(failed["error_message"].is_string());

    let response = server.get(&format!("/api/v1/media/{}/result", id)).await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"], failed["error_message"]);

    // Failed assets may be analyzed again without forcing.
    assert_eq!(server.analyze(&id, false).await.status(), StatusCode::ACCEPTED);
}

#[tokio::test]
async fn test_queue_failure_marks_asset_failed() {
    let server = spawn_server_with(WorkerConfig::default().with_enabled(false), |root| {
        root.join("work")
    })
    .await;
    // The disabled worker exits at once and closes its queue.
    tokio::time::sleep(Duration::from_millis(100)).await;

    let asset = server.upload("login_flow.mp4", b"video").await;
    let id = media_id(&asset);

    let response = server.analyze(&id, false).await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body: Value = response.json().await.unwrap();
    assert!(body["error"].as_str().unwrap().contains("not running"));

    let asset: Value = server
        .get(&format!("/api/v1/media/{}", id))
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(asset["status"], "failed");
}
