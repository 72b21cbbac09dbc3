use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoryError {
    #[error("Prompt is required and must be non-empty")]
    EmptyPrompt,

    #[error("Duration must be between {min} and {max} seconds (got {secs})")]
    DurationOutOfRange { secs: u32, min: u32, max: u32 },

    #[error("Frame rate must be between {min} and {max} fps (got {fps})")]
    FpsOutOfRange { fps: u32, min: u32, max: u32 },

    #[error("Config file not found: {0}")]
    ConfigNotFound(PathBuf),

    #[error("Failed to parse config: {0}")]
    ConfigParse(String),

    #[error("Image fetch for frame {frame} failed after {attempts} attempts: {message}")]
    ImageFetch {
        frame: usize,
        attempts: u32,
        message: String,
    },

    #[error("Frame sequence has a gap at index {0}; refusing to encode")]
    SequenceGap(usize),

    #[error("Not enough frames generated: got {got} of {want}")]
    InsufficientFrames { got: usize, want: usize },

    #[error("FFmpeg not found on PATH")]
    EncoderUnavailable,

    #[error("FFmpeg error: {0}")]
    Encode(String),

    #[error("Completion service error: {0}")]
    Completion(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

impl StoryError {
    /// Return an actionable hint for the user, if applicable.
    pub fn hint(&self) -> Option<String> {
        match self {
            StoryError::EmptyPrompt => Some(
                "Pass a story prompt, e.g.: storyreel generate \"a fox crossing a frozen lake\" --duration 10".into(),
            ),
            StoryError::DurationOutOfRange { .. } => Some(
                "Adjust --duration, or change [limits] min/max_duration_secs in storyreel.toml.".into(),
            ),
            StoryError::FpsOutOfRange { .. } => Some(
                "Adjust --fps, or change [limits] min/max_fps in storyreel.toml.".into(),
            ),
            StoryError::ConfigNotFound(_) => Some(
                "Pass --config with a valid path, or omit it to use built-in defaults.".into(),
            ),
            StoryError::ConfigParse(_) => Some(
                "Check storyreel.toml syntax. All sections and keys are optional.".into(),
            ),
            StoryError::ImageFetch { .. } => Some(
                "The image service may be rate limiting. Lower [generation] batch_size or raise fetch_attempts.".into(),
            ),
            StoryError::InsufficientFrames { .. } => Some(
                "Too many frame fetches failed this run. Retry, or lower [generation] min_success_ratio to accept a sparser result.".into(),
            ),
            StoryError::SequenceGap(_) => Some(
                "A frame file is missing from the frames directory. Re-run the generation; the frames dir is rebuilt each run.".into(),
            ),
            StoryError::EncoderUnavailable => Some(
                "Ensure FFmpeg is installed and on your PATH. Install via: brew install ffmpeg (macOS) or apt install ffmpeg (Linux).".into(),
            ),
            _ => None,
        }
    }
}

pub type StoryResult<T> = Result<T, StoryError>;
