use crate::config::load_config;
use crate::error::StoryResult;
use crate::pipeline::assembler::FfmpegAssembler;
use crate::pipeline::fetcher::{FrameFetcher, HttpImageSource};
use crate::pipeline::progress::{ProgressEvent, ProgressSender, ProgressStage};
use crate::pipeline::{generate_video, GenerationOutcome};
use crate::story::completion::HttpCompletionClient;
use crate::story::PromptGenerator;
use colored::*;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::info;

#[allow(clippy::too_many_arguments)]
pub async fn run(
    prompt: &str,
    duration: u32,
    fps: Option<u32>,
    output: Option<&Path>,
    config_path: Option<&Path>,
    batch_size: Option<usize>,
    retries: Option<u32>,
    json: bool,
) -> StoryResult<()> {
    let mut config = load_config(config_path)?;
    if let Some(size) = batch_size {
        config.generation.batch_size = size;
    }
    if let Some(attempts) = retries {
        config.generation.fetch_attempts = attempts;
    }
    let fps = fps.unwrap_or(config.video.fps);

    let frames_dir = PathBuf::from(&config.output.frames_dir);
    let videos_dir = output
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from(&config.output.videos_dir));
    let video_path = videos_dir.join(video_filename());

    let mut generator = PromptGenerator::new(
        Box::new(HttpCompletionClient::new(config.completion.clone())),
        config.generation.context_window,
    );
    let fetcher = Arc::new(FrameFetcher::new(
        Box::new(HttpImageSource::new(&config.images)),
        config.generation.fetch_attempts,
        config.video.frame_size,
    ));
    let assembler = FfmpegAssembler::new(config.video.crf, &config.video.preset);

    // Fail before any prompts are spent if the encoder is missing
    FfmpegAssembler::probe()?;

    if !json {
        println!(
            "{} \"{}\" ({duration}s @ {fps}fps)",
            "Generating video for".bold(),
            prompt
        );
    }

    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
    let progress = ProgressSender::new(tx);
    let printer = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            print_event(&event, json);
        }
    });

    let result = generate_video(
        &config,
        prompt,
        duration,
        fps,
        &frames_dir,
        &video_path,
        &mut generator,
        fetcher,
        &assembler,
        &progress,
    )
    .await;

    if let Err(e) = &result {
        progress.emit(
            ProgressEvent::new(ProgressStage::Complete, 0, 0).error(e.to_string()),
        );
    }
    drop(progress);
    let _ = printer.await;

    let outcome = result?;
    info!("Run finished: {}", outcome.summary());
    if !json {
        print_outcome(&outcome);
    }
    Ok(())
}

fn print_event(event: &ProgressEvent, json: bool) {
    if json {
        if let Ok(line) = serde_json::to_string(event) {
            println!("{line}");
        }
        return;
    }
    if let Some(message) = &event.message {
        println!(
            "  [{}/{}] {}",
            event.frames_generated, event.total_frames, message
        );
    }
}

fn print_outcome(outcome: &GenerationOutcome) {
    println!("{} {}", "done:".green().bold(), outcome.summary());
    println!(
        "{} {}",
        "video:".green().bold(),
        outcome.video_path.display()
    );
}

/// Unique output name per run, millisecond-stamped to avoid collisions.
fn video_filename() -> String {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or(0);
    format!("video_{millis}.mp4")
}
