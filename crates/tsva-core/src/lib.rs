//! TSVA Core - Domain models, traits, and shared types
//!
//! This crate defines the core abstractions used throughout TSVA:
//! - Caption records produced for sampled video frames
//! - Image references handed to vision-language models
//! - Common error types
//! - The captioner trait implemented by model clients
//! - Configuration management

pub mod captions;
pub mod config;

pub use captions::{read_caption_file, write_caption_file};
pub use config::{
    AppConfig, CaptionerConfig, CaptionerProvider, ConfigError, EmbeddingConfig,
    EmbeddingProvider, IndexConfig, LoggingConfig, PipelineConfig, ServerConfig,
};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;

// ============================================================================
// Error Types
// ============================================================================

/// Core error types for TSVA operations
#[derive(Error, Debug)]
pub enum TsvaError {
    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Index not built: build or load an index before querying it")]
    IndexNotBuilt,

    #[error("Data integrity error: {0}")]
    DataIntegrity(String),

    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Embedding error: {0}")]
    EmbeddingError(String),

    #[error("Caption error: {0}")]
    CaptionError(String),

    #[error("Video error: {0}")]
    VideoError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl TsvaError {
    /// Wrap an IO error together with the path it occurred on
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

impl From<ConfigError> for TsvaError {
    fn from(err: ConfigError) -> Self {
        Self::ConfigError(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, TsvaError>;

// ============================================================================
// Caption Records
// ============================================================================

/// Description of one sampled video frame
///
/// Created once per sampled frame and never modified afterwards; the fields
/// are only reachable through accessors. Serializes as
/// `{image_id, caption, timestamp, source}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptionRecord {
    image_id: String,
    caption: String,
    timestamp: String,
    source: String,
}

impl CaptionRecord {
    /// Create a new caption record
    pub fn new(
        image_id: impl Into<String>,
        caption: impl Into<String>,
        timestamp: impl Into<String>,
        source: impl Into<String>,
    ) -> Self {
        Self {
            image_id: image_id.into(),
            caption: caption.into(),
            timestamp: timestamp.into(),
            source: source.into(),
        }
    }

    /// File name of the frame image inside the frames directory
    pub fn image_id(&self) -> &str {
        &self.image_id
    }

    /// Model-generated description of the frame
    pub fn caption(&self) -> &str {
        &self.caption
    }

    /// Elapsed time of the frame in the video (`HH:MM:SS`)
    pub fn timestamp(&self) -> &str {
        &self.timestamp
    }

    /// File name of the video the frame was sampled from
    pub fn source(&self) -> &str {
        &self.source
    }
}

// ============================================================================
// Image References
// ============================================================================

/// An image that can be handed to a vision-language model
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageReference {
    /// Existing file on the local filesystem
    Local(PathBuf),
    /// `http://` or `https://` URL
    Remote(String),
}

impl ImageReference {
    /// Validate a raw reference.
    ///
    /// Accepts an HTTP(S) URL or a path to an existing regular file.
    pub fn parse(raw: &str) -> Result<Self> {
        let trimmed = raw.trim();
        if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
            return Ok(Self::Remote(trimmed.to_string()));
        }

        let path = Path::new(trimmed);
        if !trimmed.is_empty() && path.is_file() {
            return Ok(Self::Local(path.to_path_buf()));
        }

        Err(TsvaError::ValidationError(format!(
            "Invalid image path or URL: {raw}"
        )))
    }

    /// Validate a local path
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if path.is_file() {
            Ok(Self::Local(path.to_path_buf()))
        } else {
            Err(TsvaError::ValidationError(format!(
                "Invalid image path or URL: {}",
                path.display()
            )))
        }
    }

    pub fn is_remote(&self) -> bool {
        matches!(self, Self::Remote(_))
    }
}

impl fmt::Display for ImageReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Local(path) => write!(f, "{}", path.display()),
            Self::Remote(url) => f.write_str(url),
        }
    }
}

// ============================================================================
// Traits
// ============================================================================

/// Trait for vision-language model clients
#[async_trait]
pub trait Captioner: Send + Sync {
    /// Describe an image following the given instruction prompt
    async fn generate_caption(&self, image: &ImageReference, prompt: &str) -> Result<String>;

    /// Identifier of the underlying model
    fn model_name(&self) -> &str;
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_caption_record_serialization() {
        let record = CaptionRecord::new(
            "frame_000060_2000ms.jpg",
            "car waiting at red light",
            "00:00:02",
            "junction.mp4",
        );

        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["image_id"], "frame_000060_2000ms.jpg");
        assert_eq!(json["caption"], "car waiting at red light");
        assert_eq!(json["timestamp"], "00:00:02");
        assert_eq!(json["source"], "junction.mp4");

        let back: CaptionRecord = serde_json::from_value(json).unwrap();
        assert_eq!(back, record);
    }

    #[test]
    fn test_image_reference_url() {
        let reference = ImageReference::parse("https://example.com/frame.jpg").unwrap();
        assert!(reference.is_remote());
        assert_eq!(reference.to_string(), "https://example.com/frame.jpg");

        assert!(ImageReference::parse("http://localhost/x.png")
            .unwrap()
            .is_remote());
    }

    #[test]
    fn test_image_reference_local_file() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let raw = file.path().to_str().unwrap();

        let reference = ImageReference::parse(raw).unwrap();
        assert_eq!(reference, ImageReference::Local(file.path().to_path_buf()));
        assert!(ImageReference::from_path(file.path()).is_ok());
    }

    #[test]
    fn test_image_reference_invalid() {
        for raw in ["", "   ", "/definitely/not/here.jpg", "ftp://host/frame.jpg"] {
            let err = ImageReference::parse(raw).unwrap_err();
            assert!(matches!(err, TsvaError::ValidationError(_)), "{raw}");
        }

        let dir = tempfile::tempdir().unwrap();
        assert!(ImageReference::from_path(dir.path()).is_err());
    }

    #[test]
    fn test_error_display() {
        let err = TsvaError::io("metadata.json", std::io::Error::other("disk full"));
        assert!(err.to_string().contains("metadata.json"));
        assert!(TsvaError::IndexNotBuilt.to_string().contains("not built"));
    }
}
