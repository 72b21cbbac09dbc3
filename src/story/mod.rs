pub mod completion;

use crate::error::{StoryError, StoryResult};
use completion::{ChatMessage, CompletionClient};
use serde::Serialize;
use tracing::{debug, warn};

/// How much of a frame's full prompt is kept as rolling context.
const CONTEXT_CHARS: usize = 150;

/// One entry in the story memory: the full prompt used for a frame plus an
/// abbreviated context string fed into later frames.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoryFrame {
    pub frame_number: u32,
    pub prompt: String,
    pub context: String,
}

/// Stateful per-run prompt generator.
///
/// Holds the rolling story memory and derives each frame's prompt from the
/// base concept, the last few frames' context, and the frame's temporal
/// position. One instance per generation run; never shared across runs.
///
/// Completion failures are absorbed: `next_frame_prompt` always produces a
/// prompt (falling back to a deterministic scene description) so the
/// pipeline never stalls on the text service. Contrast with the image
/// fetcher, which propagates failures to the caller.
pub struct PromptGenerator {
    client: Box<dyn CompletionClient>,
    memory: Vec<StoryFrame>,
    base_context: String,
    fps: u32,
    total_duration_secs: u32,
    context_window: usize,
    ready: bool,
}

impl PromptGenerator {
    pub fn new(client: Box<dyn CompletionClient>, context_window: usize) -> Self {
        Self {
            client,
            memory: Vec::new(),
            base_context: String::new(),
            fps: 0,
            total_duration_secs: 0,
            context_window,
            ready: false,
        }
    }

    /// Start a run: reset memory and record timing parameters.
    /// Must be called exactly once before any prompt request.
    pub fn initialize(&mut self, base_prompt: &str, fps: u32, total_duration_secs: u32) {
        self.base_context = base_prompt.to_string();
        self.memory.clear();
        self.fps = fps;
        self.total_duration_secs = total_duration_secs;
        self.ready = true;
        debug!("Story initialized with prompt: {base_prompt}");
    }

    /// Produce the prompt for one frame, appending it to story memory.
    ///
    /// Errors only if the session was never initialized; remote failures
    /// and empty responses turn into the deterministic fallback prompt.
    pub fn next_frame_prompt(
        &mut self,
        frame_number: u32,
        total_frames: u32,
    ) -> StoryResult<String> {
        if !self.ready {
            return Err(StoryError::Other(
                "Story not initialized. Call initialize first.".into(),
            ));
        }

        let messages = [
            ChatMessage::system(self.system_prompt(frame_number, total_frames)),
            ChatMessage::user(format!(
                "Generate detailed visual description for frame {frame_number}/{total_frames}"
            )),
        ];

        match self.client.complete(&messages) {
            Ok(text) if !text.trim().is_empty() => {
                let prompt = text.trim().to_string();
                self.memory.push(StoryFrame {
                    frame_number,
                    prompt: prompt.clone(),
                    context: abbreviate(&prompt),
                });
                debug!(
                    "Added frame {frame_number} to story memory ({} total)",
                    self.memory.len()
                );
                Ok(prompt)
            }
            other => {
                if let Err(e) = other {
                    warn!("Frame {frame_number} prompt generation failed, using fallback: {e}");
                }
                let fallback = format!("{} - Scene {}", self.base_context, frame_number);
                self.memory.push(StoryFrame {
                    frame_number,
                    prompt: fallback.clone(),
                    context: format!("Fallback scene {frame_number}"),
                });
                Ok(fallback)
            }
        }
    }

    /// A snapshot of the story so far. Copy, not a live view.
    pub fn history(&self) -> Vec<StoryFrame> {
        self.memory.clone()
    }

    /// The most recent full prompt, or the base concept before any frames.
    pub fn current_context(&self) -> &str {
        self.memory
            .last()
            .map(|f| f.prompt.as_str())
            .unwrap_or(&self.base_context)
    }

    /// End the run: drop memory, base context, and the ready flag.
    pub fn clear(&mut self) {
        self.memory.clear();
        self.base_context.clear();
        self.ready = false;
        debug!("Story memory cleared");
    }

    /// Compose the system instruction: story concept, last few frames of
    /// context, the frame's position in time, and style guidance.
    fn system_prompt(&self, frame_number: u32, total_frames: u32) -> String {
        let previous_context = self
            .memory
            .iter()
            .rev()
            .take(self.context_window)
            .rev()
            .map(|f| format!("Frame {}: {}", f.frame_number, f.context))
            .collect::<Vec<_>>()
            .join("\n");

        let elapsed_secs = if self.fps > 0 {
            frame_number as f64 / self.fps as f64
        } else {
            0.0
        };

        format!(
            "You are a creative visual storyteller. Create a detailed scene description \
             for frame {frame_number} of {total_frames} based on this story concept: \
             \"{base}\".\n\
             This frame occurs {elapsed_secs:.1} seconds into a {total} second video.\n\n\
             Previous frames context:\n{previous_context}\n\n\
             Generate a coherent next scene that progresses the story naturally.\n\
             Focus on visual details like:\n\
             - Scene composition and setting\n\
             - Character actions and expressions\n\
             - Lighting and atmosphere\n\
             - Camera angles and movement\n\n\
             Keep transitions smooth and logical between scenes.\n\n\
             Response format: Provide only the scene description, no explanations or \
             additional text. Keep the description concise but vivid (50-100 words).",
            base = self.base_context,
            total = self.total_duration_secs,
        )
    }
}

/// Truncate a prompt to its abbreviated context form.
fn abbreviate(prompt: &str) -> String {
    if prompt.chars().count() <= CONTEXT_CHARS {
        prompt.to_string()
    } else {
        let mut s: String = prompt.chars().take(CONTEXT_CHARS).collect();
        s.push_str("...");
        s
    }
}
