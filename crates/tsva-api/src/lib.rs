//! TSVA API - HTTP server
//!
//! Exposes video analysis, question answering and caption search over
//! JSON endpoints, with an OpenAPI document generated by utoipa.

pub mod error;
pub mod handlers;
pub mod state;

use axum::{
    routing::{get, post},
    Json, Router,
};
use handlers::{analysis, health};
use state::AppState;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use utoipa::OpenApi;

/// OpenAPI document
#[derive(OpenApi)]
#[openapi(
    info(
        title = "TSVA API",
        description = "Traffic scene video analysis and caption retrieval"
    ),
    paths(
        health::health_check,
        health::readiness_check,
        health::metrics,
        analysis::analyze_handler,
        analysis::ask_handler,
        analysis::search_handler,
    ),
    components(schemas(
        error::ApiError,
        health::HealthResponse,
        health::BuildInfo,
        health::ReadinessResponse,
        health::ReadinessChecks,
        health::MetricsResponse,
        analysis::FrameCaption,
        analysis::AnalyzeRequest,
        analysis::AnalyzeResponse,
        analysis::AskRequest,
        analysis::AskResponse,
        analysis::SearchRequest,
        analysis::SearchHit,
        analysis::SearchResponse,
    )),
    tags(
        (name = "health", description = "Liveness, readiness and counters"),
        (name = "analysis", description = "Video analysis and retrieval")
    )
)]
pub struct ApiDoc;

/// API v1 routes
pub fn api_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/analyze", post(analysis::analyze_handler))
        .route("/ask", post(analysis::ask_handler))
        .route("/search", post(analysis::search_handler))
}

/// Full application router
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health::health_check))
        .route("/ready", get(health::readiness_check))
        .route("/metrics", get(health::metrics))
        .route("/api-docs/openapi.json", get(openapi_json))
        .nest("/api/v1", api_routes())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}
