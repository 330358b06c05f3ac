//! TSVA RAG - Video captioning and caption retrieval orchestrator
//!
//! This crate ties the pieces together:
//! - Frame sampling and per-frame captioning of a video
//! - Building and persisting the caption index
//! - Answering questions by retrieving the nearest caption and asking the
//!   vision-language model about its frame
//!
//! Everything hangs off an explicitly constructed [`SceneAnalyzer`].

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;
use tsva_core::{
    write_caption_file, AppConfig, CaptionRecord, Captioner, ImageReference, Result, TsvaError,
};
use tsva_vector::{create_embedding_client, save_index, EmbeddingClient, IndexPaths};
use tsva_video::{FfmpegConfig, FfmpegSampler, FrameSampler};

pub mod captioner;
pub mod indexer;
pub mod pipeline;
pub mod prompts;

pub use captioner::{create_captioner, OllamaCaptioner, OpenAiCaptioner};
pub use indexer::CaptionIndexer;
pub use pipeline::summarize;
pub use prompts::{safety_analysis_prompt, DEFAULT_FRAME_PROMPT, NO_RELEVANT_FRAME};
pub use tsva_vector::ScoredRecord;

/// Status reported by a finished analysis
pub const ANALYSIS_COMPLETE: &str = "Analysis complete";

// ============================================================================
// Settings
// ============================================================================

/// Locations and limits used by the analyzer
#[derive(Debug, Clone)]
pub struct AnalyzerSettings {
    /// Directory sampled frames are written to and resolved from
    pub frames_dir: PathBuf,

    /// Intermediate caption file
    pub captions_path: PathBuf,

    /// Persisted index artifacts
    pub index_paths: IndexPaths,

    /// Captions included in the analysis summary
    pub summary_count: usize,
}

impl Default for AnalyzerSettings {
    fn default() -> Self {
        Self::from_config(&AppConfig::default())
    }
}

impl AnalyzerSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            frames_dir: config.pipeline.frames_dir.clone(),
            captions_path: config.pipeline.captions_path.clone(),
            index_paths: IndexPaths::new(
                config.index.index_path.clone(),
                config.index.metadata_path.clone(),
            ),
            summary_count: config.pipeline.summary_count,
        }
    }
}

// ============================================================================
// Results
// ============================================================================

/// Outcome of analysing one video
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisReport {
    pub status: String,

    /// First few captions as `"{timestamp}: {caption}"`, blank-line separated
    pub summary: String,

    /// One record per sampled frame, in frame order
    pub records: Vec<CaptionRecord>,

    /// Frame rate used for timestamps
    pub fps: f64,

    /// Whether `fps` is the configured fallback
    pub fps_fallback: bool,
}

/// Answer to a free-text question
#[derive(Debug, Clone, PartialEq)]
pub enum Answer {
    /// A frame matched and the model described it
    Found {
        timestamp: String,
        response: String,
        record: CaptionRecord,
    },
    /// The index holds no captions
    NotFound,
}

impl Answer {
    pub fn is_found(&self) -> bool {
        matches!(self, Self::Found { .. })
    }
}

impl fmt::Display for Answer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Found {
                timestamp,
                response,
                ..
            } => write!(f, "[{timestamp}] {response}"),
            Self::NotFound => f.write_str(NO_RELEVANT_FRAME),
        }
    }
}

// ============================================================================
// Scene Analyzer
// ============================================================================

/// Application context owning the model clients, the sampler and the index
pub struct SceneAnalyzer {
    captioner: Arc<dyn Captioner>,
    sampler: Arc<dyn FrameSampler>,
    indexer: CaptionIndexer,
    settings: AnalyzerSettings,
}

impl SceneAnalyzer {
    /// Create from injected collaborators
    pub fn new(
        embedder: Arc<dyn EmbeddingClient>,
        captioner: Arc<dyn Captioner>,
        sampler: Arc<dyn FrameSampler>,
        settings: AnalyzerSettings,
    ) -> Self {
        Self {
            captioner,
            sampler,
            indexer: CaptionIndexer::new(embedder),
            settings,
        }
    }

    /// Wire the configured model clients and the ffmpeg sampler
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let embedder: Arc<dyn EmbeddingClient> =
            Arc::from(create_embedding_client(&config.embedding)?);
        let captioner: Arc<dyn Captioner> = Arc::from(create_captioner(&config.captioner)?);

        let sampler = FfmpegSampler::with_config(
            FfmpegConfig::default()
                .with_stride(config.pipeline.frame_stride)
                .with_fallback_fps(config.pipeline.fallback_fps)
                .with_executables(
                    config.pipeline.ffmpeg_path.clone(),
                    config.pipeline.ffprobe_path.clone(),
                ),
        );
        if !sampler.is_available() {
            tracing::warn!("ffmpeg not found; video analysis will fail until it is installed");
        }

        tracing::info!(
            captioner = captioner.model_name(),
            embedder = embedder.model_name(),
            "Scene analyzer ready"
        );

        Ok(Self::new(
            embedder,
            captioner,
            Arc::new(sampler),
            AnalyzerSettings::from_config(config),
        ))
    }

    /// Load a previously saved index if one exists.
    ///
    /// Returns `false` when neither artifact is present.
    pub fn restore(&mut self) -> Result<bool> {
        let paths = &self.settings.index_paths;
        if !paths.vectors.exists() && !paths.metadata.exists() {
            tracing::debug!("No saved index to restore");
            return Ok(false);
        }
        self.indexer.load(paths)?;
        Ok(true)
    }

    /// Sample, caption and index a video, replacing the current index.
    ///
    /// Frames are sampled into a run directory under `frames_dir` and only
    /// moved next to the live frames once the new index is saved, so a
    /// failed run leaves the previous frames, captions and index untouched.
    pub async fn analyze_video(
        &mut self,
        video: &Path,
        prompt: Option<&str>,
    ) -> Result<AnalysisReport> {
        let prompt = prompt
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .unwrap_or(DEFAULT_FRAME_PROMPT);

        tracing::info!(video = %video.display(), "Analyzing video");

        let frames_dir = &self.settings.frames_dir;
        let run_dir = pipeline::run_directory(frames_dir)?;

        let sampled = pipeline::sample_video(self.sampler.clone(), video, run_dir.path()).await?;
        let source = pipeline::source_name(video);
        let records =
            pipeline::caption_frames(self.captioner.as_ref(), &sampled.frames, &source, prompt)
                .await?;

        let index = self.indexer.prepare(records.clone()).await?;
        save_index(&index, &self.settings.index_paths)?;
        pipeline::promote_frames(&sampled.frames, frames_dir)?;
        write_caption_file(&self.settings.captions_path, &records)?;
        self.indexer.install(index);

        tracing::info!(frames = records.len(), "Analysis complete");

        Ok(AnalysisReport {
            status: ANALYSIS_COMPLETE.to_string(),
            summary: summarize(&records, self.settings.summary_count),
            records,
            fps: sampled.frame_rate.fps(),
            fps_fallback: sampled.frame_rate.is_fallback(),
        })
    }

    /// Rebuild and save the index from an intermediate caption file
    pub async fn index_captions(&mut self, path: &Path) -> Result<usize> {
        let count = self.indexer.build_from_file(path).await?;
        self.indexer.save(&self.settings.index_paths)?;
        Ok(count)
    }

    /// Retrieve the nearest frame and ask the model about it
    pub async fn ask(&self, question: &str) -> Result<Answer> {
        let question = question.trim();
        if question.is_empty() {
            return Err(TsvaError::ValidationError(
                "Question must not be empty".to_string(),
            ));
        }

        let Some(record) = self.indexer.query(question).await? else {
            return Ok(Answer::NotFound);
        };

        let image = self.resolve_frame(record.image_id())?;
        let prompt = safety_analysis_prompt(record.caption());
        tracing::debug!(image = %image, timestamp = record.timestamp(), "Asking about frame");

        let response = self.captioner.generate_caption(&image, &prompt).await?;

        Ok(Answer::Found {
            timestamp: record.timestamp().to_string(),
            response: response.trim().to_string(),
            record,
        })
    }

    /// Scored nearest captions for `query`
    pub async fn search(&self, query: &str, top_k: usize) -> Result<Vec<ScoredRecord>> {
        self.indexer.search_scored(query, top_k).await
    }

    pub fn indexer(&self) -> &CaptionIndexer {
        &self.indexer
    }

    pub fn settings(&self) -> &AnalyzerSettings {
        &self.settings
    }

    pub fn captioner_model(&self) -> &str {
        self.captioner.model_name()
    }

    /// Image of an indexed frame: URLs as-is, file names under the frames directory
    fn resolve_frame(&self, image_id: &str) -> Result<ImageReference> {
        if image_id.starts_with("http://") || image_id.starts_with("https://") {
            return ImageReference::parse(image_id);
        }
        ImageReference::from_path(self.settings.frames_dir.join(image_id))
    }
}

// ============================================================================
// Tests
// ============================================================================
