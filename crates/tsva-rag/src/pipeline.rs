//! Video to caption pipeline
//!
//! Samples frames from a video, captions each one in order and produces
//! one [`CaptionRecord`] per sampled frame.

use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;
use tsva_core::{CaptionRecord, Captioner, ImageReference, Result, TsvaError};
use tsva_video::{FrameSampler, SampledFrame, SampledVideo, SamplerError};

fn video_error(err: SamplerError) -> TsvaError {
    TsvaError::VideoError(err.to_string())
}

/// Run the (blocking) sampler off the async executor
pub async fn sample_video(
    sampler: Arc<dyn FrameSampler>,
    video: &Path,
    frames_dir: &Path,
) -> Result<SampledVideo> {
    if !video.is_file() {
        return Err(TsvaError::ValidationError(format!(
            "Video not found: {}",
            video.display()
        )));
    }

    let sampler_name = sampler.name().to_string();
    let video = video.to_path_buf();
    let frames_dir = frames_dir.to_path_buf();
    let sampled = tokio::task::spawn_blocking(move || sampler.sample(&video, &frames_dir))
        .await
        .map_err(|e| TsvaError::VideoError(format!("Sampling task failed: {e}")))?
        .map_err(video_error)?;

    tracing::debug!(
        sampler = %sampler_name,
        frames = sampled.frames.len(),
        "Sampling finished"
    );
    Ok(sampled)
}

/// Private directory under `frames_dir` for one analysis run, removed on drop
pub fn run_directory(frames_dir: &Path) -> Result<TempDir> {
    std::fs::create_dir_all(frames_dir).map_err(|e| TsvaError::io(frames_dir, e))?;
    tempfile::Builder::new()
        .prefix(".run-")
        .tempdir_in(frames_dir)
        .map_err(|e| TsvaError::io(frames_dir, e))
}

/// Move sampled frames into `frames_dir` under their file names
pub fn promote_frames(frames: &[SampledFrame], frames_dir: &Path) -> Result<()> {
    for frame in frames {
        let target = frames_dir.join(&frame.file_name);
        std::fs::rename(&frame.path, &target).map_err(|e| TsvaError::io(&target, e))?;
    }
    tracing::debug!(frames = frames.len(), dir = %frames_dir.display(), "Frames promoted");
    Ok(())
}

/// Caption every frame in order. The first failure aborts the run.
pub async fn caption_frames(
    captioner: &dyn Captioner,
    frames: &[SampledFrame],
    source: &str,
    prompt: &str,
) -> Result<Vec<CaptionRecord>> {
    let mut records = Vec::with_capacity(frames.len());

    for (i, frame) in frames.iter().enumerate() {
        let image = ImageReference::from_path(&frame.path)?;
        let caption = captioner.generate_caption(&image, prompt).await?;
        tracing::debug!(
            frame = %frame.file_name,
            timestamp = %frame.timestamp,
            "Captioned frame {}/{}",
            i + 1,
            frames.len()
        );
        records.push(CaptionRecord::new(
            frame.file_name.clone(),
            caption.trim(),
            frame.timestamp.clone(),
            source,
        ));
    }

    Ok(records)
}

/// File name of the video, used as the `source` of its records
pub fn source_name(video: &Path) -> String {
    video
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| video.display().to_string())
}

/// `"{timestamp}: {caption}"` for the first `count` records, blank-line separated
pub fn summarize(records: &[CaptionRecord], count: usize) -> String {
    records
        .iter()
        .take(count)
        .map(|r| format!("{}: {}", r.timestamp(), r.caption()))
        .collect::<Vec<_>>()
        .join("\n\n")
}
