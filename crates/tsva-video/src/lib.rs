//! TSVA Video - Frame sampling for traffic videos
//!
//! Decodes a video with the `ffmpeg`/`ffprobe` executables and keeps one
//! frame per fixed stride. Every sampled frame gets an elapsed-time
//! timestamp computed from its ordinal position and the video's frame rate.
//!
//! When the frame rate is missing, unreadable, zero, negative or not finite,
//! a configured fallback rate is used instead so timestamp arithmetic never
//! divides by zero.

use std::path::{Path, PathBuf};
use std::process::Command;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SamplerError {
    #[error("Video tool not available: {0}")]
    ToolNotAvailable(String),

    #[error("Invalid video: {0}")]
    InvalidVideo(String),

    #[error("Frame rate probe failed: {0}")]
    ProbeFailed(String),

    #[error("Frame extraction failed: {0}")]
    ExtractionFailed(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, SamplerError>;

// ============================================================================
// Frame rate and timestamps
// ============================================================================

/// Effective frame rate used for timestamp computation
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameRate {
    fps: f64,
    fallback: bool,
}

impl FrameRate {
    /// Pick the reported rate when usable, otherwise the fallback.
    ///
    /// An unusable fallback is itself replaced by 1 fps.
    pub fn resolve(reported: Option<f64>, fallback_fps: f64) -> Self {
        match reported {
            Some(fps) if is_usable(fps) => Self {
                fps,
                fallback: false,
            },
            _ => Self {
                fps: if is_usable(fallback_fps) {
                    fallback_fps
                } else {
                    1.0
                },
                fallback: true,
            },
        }
    }

    pub fn fps(&self) -> f64 {
        self.fps
    }

    /// The video did not report a usable rate
    pub fn is_fallback(&self) -> bool {
        self.fallback
    }

    /// Whole seconds elapsed before frame `ordinal`
    pub fn elapsed_secs(&self, ordinal: u64) -> u64 {
        (ordinal as f64 / self.fps).floor() as u64
    }

    /// Milliseconds elapsed before frame `ordinal`
    pub fn offset_ms(&self, ordinal: u64) -> u64 {
        (ordinal as f64 * 1000.0 / self.fps).floor() as u64
    }

    /// `HH:MM:SS` timestamp of frame `ordinal`
    pub fn timestamp(&self, ordinal: u64) -> String {
        format_timestamp(self.elapsed_secs(ordinal))
    }
}

fn is_usable(fps: f64) -> bool {
    fps.is_finite() && fps > 0.0
}

/// Render seconds as `HH:MM:SS` (hours grow past two digits if needed)
pub fn format_timestamp(total_secs: u64) -> String {
    let hours = total_secs / 3600;
    let minutes = (total_secs % 3600) / 60;
    let seconds = total_secs % 60;
    format!("{hours:02}:{minutes:02}:{seconds:02}")
}

/// Rename extracted frames, in extraction order, to their final names.
///
/// The `n`-th staged file is decoded frame `n * stride`.
pub fn place_frames(
    staged: Vec<PathBuf>,
    output_dir: &Path,
    stride: u64,
    rate: FrameRate,
) -> Result<Vec<SampledFrame>> {
    let mut frames = Vec::with_capacity(staged.len());
    for (position, staged_path) in staged.into_iter().enumerate() {
        let ordinal = position as u64 * stride;
        let file_name = frame_file_name(ordinal, rate);
        let path = output_dir.join(&file_name);
        std::fs::rename(&staged_path, &path)?;

        tracing::debug!(ordinal, file = %file_name, "Sampled frame");
        frames.push(SampledFrame {
            ordinal,
            path,
            timestamp: rate.timestamp(ordinal),
            file_name,
        });
    }
    Ok(frames)
}

/// File name of a sampled frame, derived from its ordinal and offset
pub fn frame_file_name(ordinal: u64, rate: FrameRate) -> String {
    format!("frame_{ordinal:06}_{}ms.jpg", rate.offset_ms(ordinal))
}

/// Parse an ffprobe rate such as `30000/1001`, `25/1` or `29.97`
pub fn parse_frame_rate(raw: &str) -> Option<f64> {
    let raw = raw.trim();
    let fps = match raw.split_once('/') {
        Some((num, den)) => {
            let num: f64 = num.trim().parse().ok()?;
            let den: f64 = den.trim().parse().ok()?;
            if den == 0.0 {
                return None;
            }
            num / den
        }
        None => raw.parse().ok()?,
    };

    is_usable(fps).then_some(fps)
}

// ============================================================================
// Sampler trait
// ============================================================================

/// A frame written to disk by a sampler
#[derive(Debug, Clone, PartialEq)]
pub struct SampledFrame {
    /// Position of the frame among all decoded frames
    pub ordinal: u64,
    /// Location of the frame image
    pub path: PathBuf,
    /// File name of the frame image
    pub file_name: String,
    /// Elapsed time, `HH:MM:SS`
    pub timestamp: String,
}

/// Result of sampling one video
#[derive(Debug, Clone, PartialEq)]
pub struct SampledVideo {
    pub frame_rate: FrameRate,
    pub frames: Vec<SampledFrame>,
}

/// Trait for frame sampling backends
pub trait FrameSampler: Send + Sync {
    /// Write every Nth frame of `video` into `output_dir`, in order
    fn sample(&self, video: &Path, output_dir: &Path) -> Result<SampledVideo>;

    /// Check if the backend can run on this system
    fn is_available(&self) -> bool;

    /// Get the backend name
    fn name(&self) -> &str;
}

// ============================================================================
// ffmpeg sampler
// ============================================================================

/// ffmpeg sampler configuration
#[derive(Debug, Clone)]
pub struct FfmpegConfig {
    /// Keep every Nth decoded frame
    pub stride: u64,
    /// Rate assumed when the video reports none
    pub fallback_fps: f64,
    /// JPEG quality scale (2 = best, 31 = worst)
    pub jpeg_quality: u8,
    /// Path to ffmpeg executable
    pub ffmpeg_path: Option<String>,
    /// Path to ffprobe executable
    pub ffprobe_path: Option<String>,
}

impl Default for FfmpegConfig {
    fn default() -> Self {
        Self {
            stride: 60,
            fallback_fps: 1.0,
            jpeg_quality: 2,
            ffmpeg_path: None,
            ffprobe_path: None,
        }
    }
}

impl FfmpegConfig {
    /// Set frame stride (at least 1)
    pub fn with_stride(mut self, stride: u64) -> Self {
        self.stride = stride.max(1);
        self
    }

    /// Set fallback frame rate
    pub fn with_fallback_fps(mut self, fps: f64) -> Self {
        self.fallback_fps = fps;
        self
    }

    /// Set executable locations
    pub fn with_executables(mut self, ffmpeg: Option<String>, ffprobe: Option<String>) -> Self {
        self.ffmpeg_path = ffmpeg;
        self.ffprobe_path = ffprobe;
        self
    }
}

/// Frame sampler driving the ffmpeg command-line tools
pub struct FfmpegSampler {
    config: FfmpegConfig,
}

impl FfmpegSampler {
    /// Create a new sampler with default config
    pub fn new() -> Self {
        Self::with_config(FfmpegConfig::default())
    }

    /// Create with custom config
    pub fn with_config(config: FfmpegConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &FfmpegConfig {
        &self.config
    }

    fn ffmpeg(&self) -> &str {
        self.config.ffmpeg_path.as_deref().unwrap_or("ffmpeg")
    }

    fn ffprobe(&self) -> &str {
        self.config.ffprobe_path.as_deref().unwrap_or("ffprobe")
    }

    fn probe_args(video: &Path) -> Vec<String> {
        vec![
            "-v".to_string(),
            "error".to_string(),
            "-select_streams".to_string(),
            "v:0".to_string(),
            "-show_entries".to_string(),
            "stream=avg_frame_rate,r_frame_rate".to_string(),
            "-of".to_string(),
            "default=noprint_wrappers=1:nokey=1".to_string(),
            video.display().to_string(),
        ]
    }

    fn extract_args(&self, video: &Path, pattern: &Path) -> Vec<String> {
        vec![
            "-hide_banner".to_string(),
            "-loglevel".to_string(),
            "error".to_string(),
            "-nostdin".to_string(),
            "-y".to_string(),
            "-i".to_string(),
            video.display().to_string(),
            "-vf".to_string(),
            format!("select=not(mod(n\\,{}))", self.config.stride.max(1)),
            "-vsync".to_string(),
            "vfr".to_string(),
            "-q:v".to_string(),
            self.config.jpeg_quality.to_string(),
            pattern.display().to_string(),
        ]
    }

    /// Frame rate reported by the first video stream, if usable
    pub fn probe_frame_rate(&self, video: &Path) -> Result<Option<f64>> {
        let output = Command::new(self.ffprobe())
            .args(Self::probe_args(video))
            .output()
            .map_err(|e| SamplerError::ProbeFailed(e.to_string()))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(SamplerError::ProbeFailed(format!(
                "ffprobe failed: {}",
                stderr.trim()
            )));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        Ok(stdout.lines().find_map(parse_frame_rate))
    }

    fn extract(&self, video: &Path, staging: &Path) -> Result<Vec<PathBuf>> {
        let pattern = staging.join("%06d.jpg");
        let output = Command::new(self.ffmpeg())
            .args(self.extract_args(video, &pattern))
            .output()
            .map_err(|e| SamplerError::ExtractionFailed(e.to_string()))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(SamplerError::ExtractionFailed(format!(
                "ffmpeg failed: {}",
                stderr.trim()
            )));
        }

        let mut staged = Vec::new();
        for entry in std::fs::read_dir(staging)? {
            let path = entry?.path();
            if path.extension().is_some_and(|ext| ext == "jpg") {
                staged.push(path);
            }
        }
        staged.sort();
        Ok(staged)
    }
}

impl Default for FfmpegSampler {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameSampler for FfmpegSampler {
    fn sample(&self, video: &Path, output_dir: &Path) -> Result<SampledVideo> {
        if !video.is_file() {
            return Err(SamplerError::InvalidVideo(format!(
                "{} is not a file",
                video.display()
            )));
        }

        if !self.is_available() {
            return Err(SamplerError::ToolNotAvailable(
                "ffmpeg/ffprobe are not installed or not in PATH".to_string(),
            ));
        }

        let reported = match self.probe_frame_rate(video) {
            Ok(rate) => rate,
            Err(e) => {
                tracing::warn!(video = %video.display(), error = %e, "Could not read frame rate");
                None
            }
        };

        let frame_rate = FrameRate::resolve(reported, self.config.fallback_fps);
        if frame_rate.is_fallback() {
            tracing::warn!(
                video = %video.display(),
                fallback_fps = frame_rate.fps(),
                "Video reports no usable frame rate, using fallback"
            );
        }

        std::fs::create_dir_all(output_dir)?;
        let staging = tempfile::Builder::new()
            .prefix(".tsva-staging-")
            .tempdir_in(output_dir)?;

        let staged = self.extract(video, staging.path())?;
        let stride = self.config.stride.max(1);
        let frames = place_frames(staged, output_dir, stride, frame_rate)?;

        tracing::info!(
            video = %video.display(),
            fps = frame_rate.fps(),
            stride,
            frames = frames.len(),
            "Video sampled"
        );

        Ok(SampledVideo { frame_rate, frames })
    }

    fn is_available(&self) -> bool {
        [self.ffmpeg(), self.ffprobe()].iter().all(|tool| {
            Command::new(tool)
                .arg("-version")
                .output()
                .map(|o| o.status.success())
                .unwrap_or(false)
        })
    }

    fn name(&self) -> &str {
        "ffmpeg"
    }
}

// ============================================================================
// Tests
// ============================================================================
