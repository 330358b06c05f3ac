//! API error handling

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use tsva_core::TsvaError;
use utoipa::ToSchema;

/// API error response
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ApiError {
    /// Error code
    pub code: String,
    /// Human-readable message
    pub message: String,
    /// Additional details
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ApiError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new("BAD_REQUEST", message)
    }

    pub fn internal_error() -> Self {
        Self::new("INTERNAL_ERROR", "Internal server error")
    }
}

/// Application error type
#[derive(Debug)]
pub enum AppError {
    BadRequest(String),
    IndexNotBuilt,
    DataIntegrity(String),
    Upstream(String),
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error) = match self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, ApiError::bad_request(msg)),
            AppError::IndexNotBuilt => (
                StatusCode::CONFLICT,
                ApiError::new(
                    "INDEX_NOT_BUILT",
                    "No caption index yet; analyze a video first",
                ),
            ),
            AppError::DataIntegrity(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ApiError::new("DATA_INTEGRITY", "Caption index is inconsistent").with_details(msg),
            ),
            AppError::Upstream(msg) => (
                StatusCode::BAD_GATEWAY,
                ApiError::new("UPSTREAM_ERROR", "Model server or video tool failed")
                    .with_details(msg),
            ),
            AppError::Internal(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ApiError::internal_error().with_details(msg),
            ),
        };

        (status, Json(error)).into_response()
    }
}

impl From<TsvaError> for AppError {
    fn from(err: TsvaError) -> Self {
        match err {
            TsvaError::ValidationError(msg) => AppError::BadRequest(msg),
            TsvaError::IndexNotBuilt => AppError::IndexNotBuilt,
            TsvaError::DataIntegrity(msg) => AppError::DataIntegrity(msg),
            TsvaError::CaptionError(msg) => AppError::Upstream(format!("Caption error: {msg}")),
            TsvaError::EmbeddingError(msg) => {
                AppError::Upstream(format!("Embedding error: {msg}"))
            }
            TsvaError::VideoError(msg) => AppError::Upstream(format!("Video error: {msg}")),
            other => AppError::Internal(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_status_mapping() {
        let cases = [
            (
                TsvaError::ValidationError("empty".into()),
                StatusCode::BAD_REQUEST,
            ),
            (TsvaError::IndexNotBuilt, StatusCode::CONFLICT),
            (
                TsvaError::DataIntegrity("3 vs 2".into()),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
            (
                TsvaError::CaptionError("offline".into()),
                StatusCode::BAD_GATEWAY,
            ),
            (
                TsvaError::VideoError("ffmpeg".into()),
                StatusCode::BAD_GATEWAY,
            ),
            (
                TsvaError::ConfigError("bad".into()),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];

        for (err, status) in cases {
            let response = AppError::from(err).into_response();
            assert_eq!(response.status(), status);
        }
    }
}
