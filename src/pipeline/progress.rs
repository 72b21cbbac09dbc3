use crate::story::StoryFrame;
use serde::Serialize;
use std::time::Instant;
use tokio::sync::mpsc::UnboundedSender;

/// Where the run currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ProgressStage {
    Generating,
    Processing,
    Complete,
}

/// Observational snapshot streamed to consumers while a run is in flight.
/// Never persisted. The terminal event carries `video_url` or `error`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressEvent {
    pub stage: ProgressStage,
    pub frames_generated: usize,
    pub total_frames: usize,
    pub current_frame: usize,
    /// Seconds since the run started; stamped by the sender.
    pub elapsed_time: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_prompt: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub story_frames: Vec<StoryFrame>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ProgressEvent {
    pub fn new(stage: ProgressStage, frames_generated: usize, total_frames: usize) -> Self {
        Self {
            stage,
            frames_generated,
            total_frames,
            current_frame: frames_generated,
            elapsed_time: 0.0,
            current_prompt: None,
            message: None,
            story_frames: Vec::new(),
            video_url: None,
            error: None,
        }
    }

    pub fn current_frame(mut self, frame: usize) -> Self {
        self.current_frame = frame;
        self
    }

    pub fn prompt(mut self, prompt: impl Into<String>) -> Self {
        self.current_prompt = Some(prompt.into());
        self
    }

    pub fn message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn story(mut self, frames: Vec<StoryFrame>) -> Self {
        self.story_frames = frames;
        self
    }

    pub fn video_url(mut self, url: impl Into<String>) -> Self {
        self.video_url = Some(url.into());
        self
    }

    pub fn error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }
}

/// Fire-and-forget progress channel from the orchestrator to a consumer.
///
/// Sends never block. A dropped receiver (client went away) silently stops
/// delivery without interrupting the run. `noop()` produces a sender with
/// no channel at all, for callers that don't care about progress.
pub struct ProgressSender {
    tx: Option<UnboundedSender<ProgressEvent>>,
    started: Instant,
}

impl ProgressSender {
    pub fn new(tx: UnboundedSender<ProgressEvent>) -> Self {
        Self {
            tx: Some(tx),
            started: Instant::now(),
        }
    }

    pub fn noop() -> Self {
        Self {
            tx: None,
            started: Instant::now(),
        }
    }

    /// Stamp the elapsed time and deliver the event, if anyone is listening.
    pub fn emit(&self, mut event: ProgressEvent) {
        if let Some(tx) = &self.tx {
            event.elapsed_time = self.started.elapsed().as_secs_f64();
            let _ = tx.send(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_serializes_camel_case() {
        let event = ProgressEvent::new(ProgressStage::Generating, 3, 10)
            .current_frame(4)
            .prompt("a fox")
            .message("Generating frame 4 of 10");
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["stage"], "generating");
        assert_eq!(json["framesGenerated"], 3);
        assert_eq!(json["totalFrames"], 10);
        assert_eq!(json["currentFrame"], 4);
        assert_eq!(json["currentPrompt"], "a fox");
        assert!(json.get("videoUrl").is_none());
        assert!(json.get("error").is_none());
        assert!(json.get("storyFrames").is_none());
    }

    #[test]
    fn test_terminal_event_shapes() {
        let done = ProgressEvent::new(ProgressStage::Complete, 10, 10).video_url("/videos/v.mp4");
        let json = serde_json::to_value(&done).unwrap();
        assert_eq!(json["stage"], "complete");
        assert_eq!(json["videoUrl"], "/videos/v.mp4");

        let failed = ProgressEvent::new(ProgressStage::Generating, 2, 10).error("boom");
        let json = serde_json::to_value(&failed).unwrap();
        assert_eq!(json["error"], "boom");
    }

    #[tokio::test]
    async fn test_sender_delivers_with_elapsed_time() {
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let sender = ProgressSender::new(tx);
        sender.emit(ProgressEvent::new(ProgressStage::Generating, 0, 5));
        let event = rx.recv().await.unwrap();
        assert_eq!(event.total_frames, 5);
        assert!(event.elapsed_time >= 0.0);
    }

    #[tokio::test]
    async fn test_sender_survives_dropped_receiver() {
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
        drop(rx);
        let sender = ProgressSender::new(tx);
        // Must not panic or error out; abandonment is not a failure
        sender.emit(ProgressEvent::new(ProgressStage::Generating, 0, 5));
    }

    #[test]
    fn test_noop_sender() {
        let sender = ProgressSender::noop();
        sender.emit(ProgressEvent::new(ProgressStage::Complete, 1, 1));
    }
}
