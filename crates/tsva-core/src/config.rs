//! TSVA Configuration Management
//!
//! Handles configuration from environment variables and TOML files
//! with sensible defaults for a local Ollama setup.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    /// HTTP server configuration
    pub server: ServerConfig,

    /// Vision-language model configuration
    pub captioner: CaptionerConfig,

    /// Sentence embedding configuration
    pub embedding: EmbeddingConfig,

    /// Video sampling pipeline configuration
    pub pipeline: PipelineConfig,

    /// Caption index storage configuration
    pub index: IndexConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();
        config.apply_env()?;
        Ok(config)
    }

    /// Load from a TOML file
    pub fn from_file(path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let path = path.into();
        let content = std::fs::read_to_string(&path).map_err(|e| ConfigError::FileReadError {
            path: path.clone(),
            source: e,
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path,
            message: e.to_string(),
        })
    }

    /// Merge with environment variables (env takes precedence)
    pub fn with_env_override(mut self) -> Result<Self, ConfigError> {
        self.apply_env()?;
        Ok(self)
    }

    /// Load the file if given, apply env overrides, then validate
    pub fn load(path: Option<PathBuf>) -> Result<Self, ConfigError> {
        let config = match path {
            Some(path) => Self::from_file(path)?.with_env_override()?,
            None => Self::from_env()?,
        };
        config.validate()?;
        Ok(config)
    }

    /// Reject values the pipeline cannot work with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.pipeline.frame_stride == 0 {
            return Err(ConfigError::InvalidValue {
                key: "pipeline.frame_stride".to_string(),
                value: "0".to_string(),
            });
        }
        if !(self.pipeline.fallback_fps.is_finite() && self.pipeline.fallback_fps > 0.0) {
            return Err(ConfigError::InvalidValue {
                key: "pipeline.fallback_fps".to_string(),
                value: self.pipeline.fallback_fps.to_string(),
            });
        }
        if self.index.default_top_k == 0 {
            return Err(ConfigError::InvalidValue {
                key: "index.default_top_k".to_string(),
                value: "0".to_string(),
            });
        }
        if self.embedding.provider == EmbeddingProvider::Hash && self.embedding.dimension == 0 {
            return Err(ConfigError::InvalidValue {
                key: "embedding.dimension".to_string(),
                value: "0".to_string(),
            });
        }
        Ok(())
    }

    fn apply_env(&mut self) -> Result<(), ConfigError> {
        // Server
        if let Ok(host) = std::env::var("TSVA_HOST") {
            self.server.host = host;
        }
        if let Ok(port) = std::env::var("TSVA_PORT") {
            self.server.port = parse_env("TSVA_PORT", port)?;
        }

        // Captioner
        if let Ok(provider) = std::env::var("CAPTIONER_PROVIDER") {
            self.captioner.provider = provider.parse()?;
        }
        if let Ok(model) = std::env::var("CAPTIONER_MODEL") {
            self.captioner.model = model;
        }
        if let Ok(url) = std::env::var("OLLAMA_URL") {
            self.captioner.ollama_url = url.clone();
            self.embedding.ollama_url = url;
        }
        if let Ok(url) = std::env::var("OPENAI_BASE_URL") {
            self.captioner.openai_base_url = Some(url);
        }
        if let Ok(key) = std::env::var("OPENAI_API_KEY") {
            self.captioner.openai_api_key = Some(key.clone());
            self.embedding.openai_api_key = Some(key);
        }

        // Embedding
        if let Ok(provider) = std::env::var("EMBEDDING_PROVIDER") {
            self.embedding.provider = provider.parse()?;
        }
        if let Ok(model) = std::env::var("EMBEDDING_MODEL") {
            self.embedding.model = model;
        }

        // Pipeline
        if let Ok(dir) = std::env::var("TSVA_FRAMES_DIR") {
            self.pipeline.frames_dir = PathBuf::from(dir);
        }
        if let Ok(stride) = std::env::var("TSVA_FRAME_STRIDE") {
            self.pipeline.frame_stride = parse_env("TSVA_FRAME_STRIDE", stride)?;
        }

        // Index
        if let Ok(path) = std::env::var("TSVA_INDEX_PATH") {
            self.index.index_path = PathBuf::from(path);
        }
        if let Ok(path) = std::env::var("TSVA_METADATA_PATH") {
            self.index.metadata_path = PathBuf::from(path);
        }

        // Logging
        if let Ok(level) = std::env::var("LOG_LEVEL") {
            self.logging.level = level;
        }

        Ok(())
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, value: String) -> Result<T, ConfigError> {
    value.parse().map_err(|_| ConfigError::InvalidValue {
        key: key.to_string(),
        value,
    })
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host to bind to
    pub host: String,

    /// Port to listen on
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

/// Vision-language model configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptionerConfig {
    /// Model server to use
    pub provider: CaptionerProvider,

    /// Ollama server URL
    pub ollama_url: String,

    /// OpenAI-compatible API base URL
    pub openai_base_url: Option<String>,

    /// OpenAI API key
    pub openai_api_key: Option<String>,

    /// Vision model name
    pub model: String,

    /// Maximum tokens to generate per caption
    pub max_tokens: u32,

    /// Sampling temperature
    pub temperature: f32,

    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for CaptionerConfig {
    fn default() -> Self {
        Self {
            provider: CaptionerProvider::Ollama,
            ollama_url: "http://localhost:11434".to_string(),
            openai_base_url: None,
            openai_api_key: None,
            model: "llava:7b".to_string(),
            max_tokens: 520,
            temperature: 0.1,
            timeout_secs: 300,
        }
    }
}

/// Supported vision-language model servers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CaptionerProvider {
    Ollama,
    OpenAI,
}

impl std::str::FromStr for CaptionerProvider {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "ollama" => Ok(Self::Ollama),
            "openai" => Ok(Self::OpenAI),
            _ => Err(ConfigError::InvalidValue {
                key: "CAPTIONER_PROVIDER".to_string(),
                value: s.to_string(),
            }),
        }
    }
}

/// Sentence embedding configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// Embedding backend
    pub provider: EmbeddingProvider,

    /// Embedding model name
    pub model: String,

    /// Vector dimension (used by the hash provider; informative otherwise)
    pub dimension: usize,

    /// Ollama server URL
    pub ollama_url: String,

    /// OpenAI API key
    pub openai_api_key: Option<String>,

    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: EmbeddingProvider::Ollama,
            model: "all-minilm".to_string(),
            dimension: 384,
            ollama_url: "http://localhost:11434".to_string(),
            openai_api_key: None,
            timeout_secs: 60,
        }
    }
}

/// Supported embedding backends
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingProvider {
    Ollama,
    OpenAI,
    /// Offline feature-hashing embedder
    Hash,
}

impl std::str::FromStr for EmbeddingProvider {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "ollama" => Ok(Self::Ollama),
            "openai" => Ok(Self::OpenAI),
            "hash" => Ok(Self::Hash),
            _ => Err(ConfigError::InvalidValue {
                key: "EMBEDDING_PROVIDER".to_string(),
                value: s.to_string(),
            }),
        }
    }
}

/// Video sampling pipeline configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Keep every Nth decoded frame
    pub frame_stride: u64,

    /// Frame rate assumed when the video reports none
    pub fallback_fps: f64,

    /// Directory sampled frames are written to
    pub frames_dir: PathBuf,

    /// Intermediate caption file written after analysis
    pub captions_path: PathBuf,

    /// Number of captions included in the analysis summary
    pub summary_count: usize,

    /// Path to the ffmpeg executable
    pub ffmpeg_path: Option<String>,

    /// Path to the ffprobe executable
    pub ffprobe_path: Option<String>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            frame_stride: 60,
            fallback_fps: 1.0,
            frames_dir: PathBuf::from("frames"),
            captions_path: PathBuf::from("captions_output.json"),
            summary_count: 5,
            ffmpeg_path: None,
            ffprobe_path: None,
        }
    }
}

/// Caption index storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexConfig {
    /// Vector blob location
    pub index_path: PathBuf,

    /// Metadata list location
    pub metadata_path: PathBuf,

    /// Result count for searches that don't specify one
    pub default_top_k: usize,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            index_path: PathBuf::from("captions.index"),
            metadata_path: PathBuf::from("metadata.json"),
            default_top_k: 5,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// JSON format for logs
    pub json_format: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json_format: false,
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    FileReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {message}")]
    ParseError { path: PathBuf, message: String },

    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },

    #[error("Missing required configuration: {0}")]
    MissingRequired(String),
}
