//! Vision-language model clients
//!
//! Provides captioners for Ollama multimodal models (llava, qwen-vl, ...)
//! and OpenAI-compatible chat-completion APIs that accept image inputs.

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tsva_core::{
    Captioner, CaptionerConfig, CaptionerProvider, ConfigError, ImageReference, Result, TsvaError,
};

fn http_client(timeout_secs: u64) -> Result<Client> {
    Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| TsvaError::CaptionError(format!("Failed to build HTTP client: {e}")))
}

/// Read a local image or download a remote one
async fn load_image_bytes(client: &Client, image: &ImageReference) -> Result<Vec<u8>> {
    match image {
        ImageReference::Local(path) => tokio::fs::read(path)
            .await
            .map_err(|e| TsvaError::io(path, e)),
        ImageReference::Remote(url) => {
            let response = client
                .get(url)
                .send()
                .await
                .map_err(|e| TsvaError::CaptionError(format!("Image download failed: {e}")))?;

            if !response.status().is_success() {
                return Err(TsvaError::CaptionError(format!(
                    "Image download failed with status {}: {url}",
                    response.status()
                )));
            }

            let bytes = response
                .bytes()
                .await
                .map_err(|e| TsvaError::CaptionError(format!("Image download failed: {e}")))?;
            Ok(bytes.to_vec())
        }
    }
}

fn mime_type(image: &ImageReference) -> &'static str {
    let name = image.to_string().to_lowercase();
    if name.ends_with(".png") {
        "image/png"
    } else if name.ends_with(".webp") {
        "image/webp"
    } else {
        "image/jpeg"
    }
}

// ============================================================================
// Ollama Captioner
// ============================================================================

/// Ollama multimodal model client
pub struct OllamaCaptioner {
    client: Client,
    base_url: String,
    model: String,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct OllamaRequest {
    model: String,
    prompt: String,
    images: Vec<String>,
    stream: bool,
    options: OllamaOptions,
}

#[derive(Debug, Serialize)]
struct OllamaOptions {
    num_predict: u32,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
#[allow(dead_code)]
struct OllamaResponse {
    response: String,
    done: bool,
}

impl OllamaCaptioner {
    /// Create a new Ollama captioner
    pub fn new(base_url: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
            max_tokens: 520,
            temperature: 0.1,
        }
    }

    /// Create from config
    pub fn from_config(config: &CaptionerConfig) -> Result<Self> {
        Ok(Self {
            client: http_client(config.timeout_secs)?,
            base_url: config.ollama_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            max_tokens: config.max_tokens,
            temperature: config.temperature,
        })
    }
}

#[async_trait]
impl Captioner for OllamaCaptioner {
    async fn generate_caption(&self, image: &ImageReference, prompt: &str) -> Result<String> {
        let bytes = load_image_bytes(&self.client, image).await?;

        let request = OllamaRequest {
            model: self.model.clone(),
            prompt: prompt.to_string(),
            images: vec![STANDARD.encode(bytes)],
            stream: false,
            options: OllamaOptions {
                num_predict: self.max_tokens,
                temperature: self.temperature,
            },
        };

        tracing::debug!(model = %self.model, image = %image, "Requesting caption from Ollama");

        let response = self
            .client
            .post(format!("{}/api/generate", self.base_url))
            .json(&request)
            .send()
            .await
            .map_err(|e| TsvaError::CaptionError(format!("Ollama request failed: {e}")))?;

        if !response.status().is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(TsvaError::CaptionError(format!(
                "Ollama error: {error_text}"
            )));
        }

        let result: OllamaResponse = response.json().await.map_err(|e| {
            TsvaError::CaptionError(format!("Failed to parse Ollama response: {e}"))
        })?;

        Ok(result.response.trim().to_string())
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

// ============================================================================
// OpenAI Captioner
// ============================================================================

/// OpenAI-compatible chat-completions client with image input
pub struct OpenAiCaptioner {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct OpenAiRequest {
    model: String,
    messages: Vec<Message>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct Message {
    role: String,
    content: Vec<ContentPart>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Debug, Serialize)]
struct ImageUrl {
    url: String,
}

#[derive(Debug, Deserialize)]
struct OpenAiResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
#[allow(dead_code)]
struct Choice {
    message: ResponseMessage,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

impl OpenAiCaptioner {
    /// Create a new OpenAI captioner
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.into(),
            base_url: "https://api.openai.com/v1".to_string(),
            model: model.into(),
            max_tokens: 520,
            temperature: 0.1,
        }
    }

    /// Create from config
    pub fn from_config(config: &CaptionerConfig) -> Result<Self> {
        let api_key = config
            .openai_api_key
            .as_ref()
            .ok_or_else(|| ConfigError::MissingRequired("OpenAI API key".to_string()))?;

        let base_url = config
            .openai_base_url
            .clone()
            .unwrap_or_else(|| "https://api.openai.com/v1".to_string());

        Ok(Self {
            client: http_client(config.timeout_secs)?,
            api_key: api_key.clone(),
            base_url: base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            max_tokens: config.max_tokens,
            temperature: config.temperature,
        })
    }

    /// Set custom base URL (for vLLM, LM Studio or other compatible servers)
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    /// Remote images are passed through; local files are inlined as data URLs
    async fn image_url(&self, image: &ImageReference) -> Result<String> {
        match image {
            ImageReference::Remote(url) => Ok(url.clone()),
            ImageReference::Local(_) => {
                let bytes = load_image_bytes(&self.client, image).await?;
                Ok(format!(
                    "data:{};base64,{}",
                    mime_type(image),
                    STANDARD.encode(bytes)
                ))
            }
        }
    }
}

#[async_trait]
impl Captioner for OpenAiCaptioner {
    async fn generate_caption(&self, image: &ImageReference, prompt: &str) -> Result<String> {
        let request = OpenAiRequest {
            model: self.model.clone(),
            messages: vec![Message {
                role: "user".to_string(),
                content: vec![
                    ContentPart::Text {
                        text: prompt.to_string(),
                    },
                    ContentPart::ImageUrl {
                        image_url: ImageUrl {
                            url: self.image_url(image).await?,
                        },
                    },
                ],
            }],
            max_tokens: self.max_tokens,
            temperature: self.temperature,
        };

        tracing::debug!(model = %self.model, image = %image, "Requesting caption from OpenAI");

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| TsvaError::CaptionError(format!("Request failed: {e}")))?;

        if !response.status().is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(TsvaError::CaptionError(format!(
                "OpenAI error: {error_text}"
            )));
        }

        let result: OpenAiResponse = response
            .json()
            .await
            .map_err(|e| TsvaError::CaptionError(format!("Failed to parse response: {e}")))?;

        result
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .map(|content| content.trim().to_string())
            .ok_or_else(|| TsvaError::CaptionError("No response generated".to_string()))
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

// ============================================================================
// Factory function
// ============================================================================

/// Create a captioner from config
pub fn create_captioner(config: &CaptionerConfig) -> Result<Box<dyn Captioner>> {
    match config.provider {
        CaptionerProvider::OpenAI => Ok(Box::new(OpenAiCaptioner::from_config(config)?)),
        CaptionerProvider::Ollama => Ok(Box::new(OllamaCaptioner::from_config(config)?)),
    }
}

// ============================================================================
// Tests
// ============================================================================
