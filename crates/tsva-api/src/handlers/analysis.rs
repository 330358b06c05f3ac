//! Video analysis, question answering and caption search handlers

use crate::error::AppError;
use crate::state::AppState;
use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use tsva_core::CaptionRecord;
use tsva_rag::{Answer, ScoredRecord};
use utoipa::ToSchema;

/// Caption of one sampled frame
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct FrameCaption {
    /// Frame image file name
    #[schema(example = "frame_000120_4000ms.jpg")]
    pub image_id: String,

    #[schema(example = "A car runs the red light while pedestrians wait.")]
    pub caption: String,

    /// Elapsed time in the video
    #[schema(example = "00:00:04")]
    pub timestamp: String,

    /// Source video file name
    #[schema(example = "junction.mp4")]
    pub source: String,
}

impl From<&CaptionRecord> for FrameCaption {
    fn from(record: &CaptionRecord) -> Self {
        Self {
            image_id: record.image_id().to_string(),
            caption: record.caption().to_string(),
            timestamp: record.timestamp().to_string(),
            source: record.source().to_string(),
        }
    }
}

// ============================================================================
// Analyze
// ============================================================================

/// Analyze request body
#[derive(Debug, Deserialize, ToSchema)]
pub struct AnalyzeRequest {
    /// Video file readable by the server
    #[schema(example = "videos/junction.mp4")]
    pub video_path: String,

    /// Instruction for the vision-language model; the traffic prompt when absent
    pub prompt: Option<String>,
}

/// Analyze response body
#[derive(Debug, Serialize, ToSchema)]
pub struct AnalyzeResponse {
    #[schema(example = "Analysis complete")]
    pub status: String,

    /// First captions as `"{timestamp}: {caption}"`
    pub summary: String,

    /// Every sampled frame in order
    pub frames: Vec<FrameCaption>,
}

/// Sample, caption and index a video
#[utoipa::path(
    post,
    path = "/api/v1/analyze",
    tag = "analysis",
    request_body = AnalyzeRequest,
    responses(
        (status = 200, description = "Video analyzed", body = AnalyzeResponse),
        (status = 400, description = "Invalid request", body = crate::error::ApiError),
        (status = 502, description = "Model or video tool failed", body = crate::error::ApiError)
    )
)]
pub async fn analyze_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<AnalyzeRequest>,
) -> Result<impl IntoResponse, AppError> {
    state.increment_requests();

    if req.video_path.trim().is_empty() {
        return Err(AppError::BadRequest("video_path cannot be empty".to_string()));
    }

    let video = PathBuf::from(req.video_path.trim());
    let mut analyzer = state.analyzer.lock().await;
    let report = analyzer
        .analyze_video(&video, req.prompt.as_deref())
        .await?;

    let response = AnalyzeResponse {
        status: report.status,
        summary: report.summary,
        frames: report.records.iter().map(FrameCaption::from).collect(),
    };

    Ok((StatusCode::OK, Json(response)))
}

// ============================================================================
// Ask
// ============================================================================

/// Ask request body
#[derive(Debug, Deserialize, ToSchema)]
pub struct AskRequest {
    #[schema(example = "Did any car run a red light?")]
    pub question: String,
}

/// Ask response body
#[derive(Debug, Serialize, ToSchema)]
pub struct AskResponse {
    /// Whether a frame matched the question
    pub found: bool,

    /// `"[{timestamp}] {analysis}"`, or the no-match message
    pub answer: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_id: Option<String>,
}

impl From<Answer> for AskResponse {
    fn from(answer: Answer) -> Self {
        let answer_text = answer.to_string();
        match answer {
            Answer::Found {
                timestamp, record, ..
            } => Self {
                found: true,
                answer: answer_text,
                timestamp: Some(timestamp),
                image_id: Some(record.image_id().to_string()),
            },
            Answer::NotFound => Self {
                found: false,
                answer: answer_text,
                timestamp: None,
                image_id: None,
            },
        }
    }
}

/// Answer a question about the analyzed video
#[utoipa::path(
    post,
    path = "/api/v1/ask",
    tag = "analysis",
    request_body = AskRequest,
    responses(
        (status = 200, description = "Question answered", body = AskResponse),
        (status = 400, description = "Invalid request", body = crate::error::ApiError),
        (status = 409, description = "No index yet", body = crate::error::ApiError)
    )
)]
pub async fn ask_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<AskRequest>,
) -> Result<impl IntoResponse, AppError> {
    state.increment_requests();

    if req.question.trim().is_empty() {
        return Err(AppError::BadRequest("Question cannot be empty".to_string()));
    }

    let analyzer = state.analyzer.lock().await;
    let answer = analyzer.ask(&req.question).await?;

    Ok((StatusCode::OK, Json(AskResponse::from(answer))))
}

// ============================================================================
// Search
// ============================================================================

/// Search request body
#[derive(Debug, Deserialize, ToSchema)]
pub struct SearchRequest {
    #[schema(example = "pedestrian crossing on red")]
    pub query: String,

    /// Maximum number of results; the configured default when absent
    #[schema(example = 5)]
    pub top_k: Option<usize>,
}

/// A caption with its distance to the query
#[derive(Debug, Serialize, ToSchema)]
pub struct SearchHit {
    pub image_id: String,
    pub caption: String,
    pub timestamp: String,
    pub source: String,

    /// Euclidean distance, lower is closer
    pub distance: f32,
}

impl From<&ScoredRecord> for SearchHit {
    fn from(hit: &ScoredRecord) -> Self {
        Self {
            image_id: hit.record.image_id().to_string(),
            caption: hit.record.caption().to_string(),
            timestamp: hit.record.timestamp().to_string(),
            source: hit.record.source().to_string(),
            distance: hit.distance,
        }
    }
}

/// Search response body
#[derive(Debug, Serialize, ToSchema)]
pub struct SearchResponse {
    pub results: Vec<SearchHit>,
}

/// Nearest captions to a free-text query
#[utoipa::path(
    post,
    path = "/api/v1/search",
    tag = "analysis",
    request_body = SearchRequest,
    responses(
        (status = 200, description = "Search results, nearest first", body = SearchResponse),
        (status = 400, description = "Invalid request", body = crate::error::ApiError),
        (status = 409, description = "No index yet", body = crate::error::ApiError)
    )
)]
pub async fn search_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SearchRequest>,
) -> Result<impl IntoResponse, AppError> {
    state.increment_requests();

    let top_k = req.top_k.unwrap_or(state.config.index.default_top_k);
    let analyzer = state.analyzer.lock().await;
    let hits = analyzer.search(&req.query, top_k).await?;

    let results = hits.iter().map(SearchHit::from).collect();

    Ok((StatusCode::OK, Json(SearchResponse { results })))
}
