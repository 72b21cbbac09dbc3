pub mod assembler;
pub mod fetcher;
pub mod progress;

use crate::config::StoryConfig;
use crate::error::{StoryError, StoryResult};
use crate::story::PromptGenerator;
use assembler::VideoAssembler;
use fetcher::FrameFetcher;
use progress::{ProgressEvent, ProgressSender, ProgressStage};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Final result of one generation run.
#[derive(Debug)]
pub struct GenerationOutcome {
    pub video_path: PathBuf,
    pub frames_generated: usize,
    pub total_frames: usize,
}

impl GenerationOutcome {
    /// Human-readable completion qualifier; partial success is reported
    /// explicitly, never rounded up to "all".
    pub fn summary(&self) -> String {
        if self.frames_generated == self.total_frames {
            "All frames generated successfully".into()
        } else {
            format!(
                "Generated {} of {} frames successfully",
                self.frames_generated, self.total_frames
            )
        }
    }
}

/// Drive a full generation run: prompts → images → validation → encode.
///
/// The frames directory is exclusively owned by this run. Frame cleanup and
/// generator reset happen on every exit path, success or failure, so a
/// retried run starts from a clean slate.
#[allow(clippy::too_many_arguments)]
pub async fn generate_video(
    config: &StoryConfig,
    prompt: &str,
    duration_secs: u32,
    fps: u32,
    frames_dir: &Path,
    video_path: &Path,
    generator: &mut PromptGenerator,
    fetcher: Arc<FrameFetcher>,
    assembler: &dyn VideoAssembler,
    progress: &ProgressSender,
) -> StoryResult<GenerationOutcome> {
    if prompt.trim().is_empty() {
        return Err(StoryError::EmptyPrompt);
    }
    config.validate_duration(duration_secs)?;
    config.validate_fps(fps)?;

    std::fs::create_dir_all(frames_dir)?;
    if let Some(parent) = video_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    generator.initialize(prompt, fps, duration_secs);

    let result = drive(
        config,
        duration_secs,
        fps,
        frames_dir,
        video_path,
        generator,
        fetcher,
        assembler,
        progress,
    )
    .await;

    cleanup_frames(frames_dir);
    generator.clear();

    result
}

#[allow(clippy::too_many_arguments)]
async fn drive(
    config: &StoryConfig,
    duration_secs: u32,
    fps: u32,
    frames_dir: &Path,
    video_path: &Path,
    generator: &mut PromptGenerator,
    fetcher: Arc<FrameFetcher>,
    assembler: &dyn VideoAssembler,
    progress: &ProgressSender,
) -> StoryResult<GenerationOutcome> {
    // Widened so config-raised bounds can never overflow u32
    let total_frames = (duration_secs as u64 * fps as u64) as usize;
    let gen_cfg = &config.generation;
    let batch_size = gen_cfg.batch_size.max(1);
    let batches = total_frames.div_ceil(batch_size);

    debug!("Generating {total_frames} frames in {batches} batch(es) of up to {batch_size}");
    progress.emit(
        ProgressEvent::new(ProgressStage::Generating, 0, total_frames)
            .message("Starting frame generation..."),
    );

    let mut succeeded = 0usize;

    for batch in 0..batches {
        let start = batch * batch_size;
        let end = (start + batch_size).min(total_frames);
        let mut handles = Vec::with_capacity(end - start);

        // Prompts are sequential: frame N's context depends on frame N-1.
        // The image fetches they feed run concurrently across the batch.
        for index in start..end {
            let frame_prompt =
                generator.next_frame_prompt((index + 1) as u32, total_frames as u32)?;

            // 1-based, matching the frame numbering in the message text
            progress.emit(
                ProgressEvent::new(ProgressStage::Generating, succeeded, total_frames)
                    .current_frame(index + 1)
                    .prompt(frame_prompt.clone())
                    .message(format!("Generating frame {} of {total_frames}", index + 1))
                    .story(generator.history()),
            );

            let fetcher = Arc::clone(&fetcher);
            let dir = frames_dir.to_path_buf();
            handles.push(tokio::task::spawn_blocking(move || {
                fetcher.fetch_frame(&frame_prompt, index, &dir)
            }));

            // Stagger launches so the image service isn't hammered at once
            tokio::time::sleep(Duration::from_millis(gen_cfg.launch_delay_ms)).await;
        }

        // Await the whole batch; one frame's failure never aborts siblings
        for result in futures::future::join_all(handles).await {
            match result {
                Ok(Ok(_)) => succeeded += 1,
                Ok(Err(e)) => warn!("{e}"),
                Err(e) => warn!("Fetch task panicked: {e}"),
            }
        }

        progress.emit(
            ProgressEvent::new(ProgressStage::Generating, succeeded, total_frames)
                .message(format!("Generated {succeeded} of {total_frames} frames")),
        );

        if batch + 1 < batches {
            tokio::time::sleep(Duration::from_millis(gen_cfg.batch_delay_ms)).await;
        }
    }

    let required = (total_frames as f64 * gen_cfg.min_success_ratio).ceil() as usize;
    if succeeded < required {
        return Err(StoryError::InsufficientFrames {
            got: succeeded,
            want: total_frames,
        });
    }

    validate_frame_sequence(frames_dir, succeeded)?;

    progress.emit(
        ProgressEvent::new(ProgressStage::Processing, succeeded, total_frames)
            .message("Creating video from frames..."),
    );

    let output = assembler.assemble(frames_dir, video_path, fps)?;

    let outcome = GenerationOutcome {
        video_path: output,
        frames_generated: succeeded,
        total_frames,
    };
    progress.emit(
        ProgressEvent::new(ProgressStage::Complete, succeeded, total_frames)
            .message(outcome.summary())
            .video_url(outcome.video_path.display().to_string()),
    );

    Ok(outcome)
}

/// Check the frames directory holds exactly the gapless sequence
/// `frame_0000.jpg .. frame_{n-1:04}.jpg`. A gap would make the encoder
/// silently stop (or stitch a stale file) at the missing index.
pub fn validate_frame_sequence(frames_dir: &Path, expected: usize) -> StoryResult<()> {
    let mut indices: Vec<usize> = std::fs::read_dir(frames_dir)?
        .filter_map(|entry| entry.ok())
        .filter_map(|entry| parse_frame_index(&entry.file_name().to_string_lossy()))
        .collect();
    indices.sort_unstable();

    for want in 0..expected {
        match indices.get(want) {
            Some(&got) if got == want => {}
            _ => return Err(StoryError::SequenceGap(want)),
        }
    }

    if indices.len() != expected {
        return Err(StoryError::Other(format!(
            "Frames directory holds {} frame files, expected exactly {expected}",
            indices.len()
        )));
    }

    Ok(())
}

/// Parse an index out of a `frame_NNNN.jpg` filename.
fn parse_frame_index(name: &str) -> Option<usize> {
    name.strip_prefix("frame_")?
        .strip_suffix(".jpg")?
        .parse()
        .ok()
}

/// Best-effort removal of all files in the frames directory.
fn cleanup_frames(frames_dir: &Path) {
    let Ok(entries) = std::fs::read_dir(frames_dir) else {
        return;
    };
    for entry in entries.filter_map(|e| e.ok()) {
        if let Err(e) = std::fs::remove_file(entry.path()) {
            warn!("Failed to remove {}: {e}", entry.path().display());
        }
    }
}
