//! API Integration Tests
//!
//! The analyzer is wired with an offline hashing embedder, a scripted
//! captioner and a sampler that writes placeholder frames, so no model
//! server or ffmpeg install is needed.

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;
use tower::ServiceExt;
use tsva_api::{create_router, state::AppState};
use tsva_core::{AppConfig, Captioner, ImageReference};
use tsva_rag::{AnalyzerSettings, SceneAnalyzer};
use tsva_vector::{HashingEmbedding, IndexPaths};
use tsva_video::{frame_file_name, FrameRate, FrameSampler, SampledFrame, SampledVideo};

// =============================================================================
// Test collaborators
// =============================================================================

const CAPTIONS: [&str; 3] = [
    "car waiting at red light",
    "pedestrian crossing on green",
    "car running red light",
];

struct PlaceholderSampler;

impl FrameSampler for PlaceholderSampler {
    fn sample(&self, _video: &Path, output_dir: &Path) -> tsva_video::Result<SampledVideo> {
        std::fs::create_dir_all(output_dir)?;
        let frame_rate = FrameRate::resolve(Some(30.0), 1.0);
        let mut frames = Vec::new();
        for ordinal in [0u64, 60, 120] {
            let file_name = frame_file_name(ordinal, frame_rate);
            let path = output_dir.join(&file_name);
            std::fs::write(&path, b"jpeg")?;
            frames.push(SampledFrame {
                ordinal,
                path,
                file_name,
                timestamp: frame_rate.timestamp(ordinal),
            });
        }
        Ok(SampledVideo { frame_rate, frames })
    }

    fn is_available(&self) -> bool {
        true
    }

    fn name(&self) -> &str {
        "placeholder"
    }
}

/// Captions frames by their ordinal; answers follow-up prompts with a fixed text
struct ScriptedCaptioner;

#[async_trait]
impl Captioner for ScriptedCaptioner {
    async fn generate_caption(
        &self,
        image: &ImageReference,
        prompt: &str,
    ) -> tsva_core::Result<String> {
        if prompt.starts_with("This scene shows:") {
            return Ok("Vehicle entered on red. High collision risk.".to_string());
        }
        let name = image.to_string();
        let caption = if name.contains("frame_000000_") {
            CAPTIONS[0]
        } else if name.contains("frame_000060_") {
            CAPTIONS[1]
        } else {
            CAPTIONS[2]
        };
        Ok(caption.to_string())
    }

    fn model_name(&self) -> &str {
        "scripted"
    }
}

struct TestApp {
    dir: TempDir,
    state: Arc<AppState>,
    router: Router,
}

impl TestApp {
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        let settings = AnalyzerSettings {
            frames_dir: root.join("frames"),
            captions_path: root.join("captions_output.json"),
            index_paths: IndexPaths::new(root.join("captions.index"), root.join("metadata.json")),
            summary_count: 5,
        };
        let analyzer = SceneAnalyzer::new(
            Arc::new(HashingEmbedding::new(512)),
            Arc::new(ScriptedCaptioner),
            Arc::new(PlaceholderSampler),
            settings,
        );
        let state = Arc::new(AppState::new(AppConfig::default(), analyzer));
        Self {
            dir,
            router: create_router(state.clone()),
            state,
        }
    }

    fn video(&self) -> String {
        let path = self.dir.path().join("junction.mp4");
        std::fs::write(&path, b"video").unwrap();
        path.display().to_string()
    }

    async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json = serde_json::from_slice(&body).unwrap_or(Value::Null);
        (status, json)
    }

    async fn get(&self, uri: &str) -> (StatusCode, Value) {
        self.send(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
    }

    async fn post(&self, uri: &str, body: Value) -> (StatusCode, Value) {
        self.send(create_json_request("POST", uri, body)).await
    }

    async fn analyze(&self) -> (StatusCode, Value) {
        let video = self.video();
        self.post("/api/v1/analyze", json!({ "video_path": video }))
            .await
    }
}

/// Helper to create a test request
fn create_json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("Content-Type", "application/json")
        .body(Body::from(serde_json::to_string(&body).unwrap()))
        .unwrap()
}

// =============================================================================
// Health Check Tests
// =============================================================================

#[tokio::test]
async fn test_health_check() {
    let app = TestApp::new();
    let (status, json) = app.get("/health").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "ok");
    assert!(json["version"].is_string());
}

#[tokio::test]
async fn test_readiness_reports_index_state() {
    let app = TestApp::new();

    let (status, json) = app.get("/ready").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["ready"], true);
    assert_eq!(json["checks"]["busy"], false);
    assert_eq!(json["checks"]["index_built"], false);

    app.analyze().await;
    let (_, json) = app.get("/ready").await;
    assert_eq!(json["checks"]["index_built"], true);
    assert_eq!(json["checks"]["indexed_captions"], 3);
}

#[tokio::test]
async fn test_readiness_while_analyzer_busy() {
    let app = TestApp::new();
    let _running = app.state.analyzer.lock().await;

    let (status, json) = app.get("/ready").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["ready"], true);
    assert_eq!(json["checks"]["busy"], true);
    assert!(json["checks"]["index_built"].is_null());
}

#[tokio::test]
async fn test_metrics_count_requests() {
    let app = TestApp::new();
    app.post("/api/v1/ask", json!({ "question": "red light" }))
        .await;

    let (status, json) = app.get("/metrics").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["total_requests"], 1);
    assert!(json["uptime_seconds"].is_number());
}

#[tokio::test]
async fn test_openapi_document() {
    let app = TestApp::new();
    let (status, json) = app.get("/api-docs/openapi.json").await;

    assert_eq!(status, StatusCode::OK);
    for path in ["/health", "/api/v1/analyze", "/api/v1/ask", "/api/v1/search"] {
        assert!(json["paths"][path].is_object(), "missing {path}");
    }
}

// =============================================================================
// Analysis API Tests
// =============================================================================

#[tokio::test]
async fn test_analyze_returns_summary_and_frames() {
    let app = TestApp::new();
    let (status, json) = app.analyze().await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "Analysis complete");
    assert_eq!(
        json["summary"],
        "00:00:00: car waiting at red light\n\n\
         00:00:02: pedestrian crossing on green\n\n\
         00:00:04: car running red light"
    );

    let frames = json["frames"].as_array().unwrap();
    assert_eq!(frames.len(), 3);
    assert_eq!(frames[1]["image_id"], "frame_000060_2000ms.jpg");
    assert_eq!(frames[1]["source"], "junction.mp4");
    assert!(app.dir.path().join("captions_output.json").is_file());
}

#[tokio::test]
async fn test_analyze_missing_video_is_bad_request() {
    let app = TestApp::new();
    let (status, json) = app
        .post(
            "/api/v1/analyze",
            json!({ "video_path": "/nonexistent/clip.mp4" }),
        )
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["code"], "BAD_REQUEST");
}

#[tokio::test]
async fn test_ask_before_analysis_is_conflict() {
    let app = TestApp::new();
    let (status, json) = app
        .post("/api/v1/ask", json!({ "question": "red light" }))
        .await;

    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(json["code"], "INDEX_NOT_BUILT");
}

#[tokio::test]
async fn test_ask_empty_question() {
    let app = TestApp::new();
    let (status, json) = app.post("/api/v1/ask", json!({ "question": "  " })).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["code"], "BAD_REQUEST");
}

#[tokio::test]
async fn test_ask_after_analysis() {
    let app = TestApp::new();
    app.analyze().await;

    let (status, json) = app
        .post(
            "/api/v1/ask",
            json!({ "question": "Did a car run the red light?" }),
        )
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["found"], true);
    let timestamp = json["timestamp"].as_str().unwrap();
    assert_eq!(
        json["answer"],
        format!("[{timestamp}] Vehicle entered on red. High collision risk.")
    );
    assert!(json["image_id"].as_str().unwrap().starts_with("frame_"));
}

#[tokio::test]
async fn test_search_results_are_ordered() {
    let app = TestApp::new();
    app.analyze().await;

    let (status, json) = app
        .post(
            "/api/v1/search",
            json!({ "query": "red light violation", "top_k": 3 }),
        )
        .await;

    assert_eq!(status, StatusCode::OK);
    let results = json["results"].as_array().unwrap();
    assert_eq!(results.len(), 3);
    let distances: Vec<f64> = results
        .iter()
        .map(|r| r["distance"].as_f64().unwrap())
        .collect();
    assert!(distances.windows(2).all(|w| w[0] <= w[1]));

    let top_two: Vec<&str> = results[..2]
        .iter()
        .map(|r| r["caption"].as_str().unwrap())
        .collect();
    assert!(top_two.contains(&"car running red light"));
}

#[tokio::test]
async fn test_search_uses_default_top_k_and_rejects_zero() {
    let app = TestApp::new();
    app.analyze().await;

    let (status, json) = app
        .post("/api/v1/search", json!({ "query": "car" }))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["results"].as_array().unwrap().len(), 3);

    let (status, _) = app
        .post("/api/v1/search", json!({ "query": "car", "top_k": 0 }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}
