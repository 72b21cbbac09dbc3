use crate::error::{StoryError, StoryResult};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct StoryConfig {
    #[serde(default)]
    pub video: VideoConfig,
    #[serde(default)]
    pub generation: GenerationConfig,
    #[serde(default)]
    pub limits: LimitsConfig,
    #[serde(default)]
    pub completion: CompletionConfig,
    #[serde(default)]
    pub images: ImageServiceConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct VideoConfig {
    #[serde(default = "default_fps")]
    pub fps: u32,
    #[serde(default = "default_frame_size")]
    pub frame_size: u32,
    #[serde(default = "default_crf")]
    pub crf: u32,
    #[serde(default = "default_preset")]
    pub preset: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GenerationConfig {
    /// Frames per batch: prompts are sequential within a batch, image
    /// fetches run concurrently with this fan-out.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_fetch_attempts")]
    pub fetch_attempts: u32,
    #[serde(default = "default_min_success_ratio")]
    pub min_success_ratio: f64,
    #[serde(default = "default_launch_delay_ms")]
    pub launch_delay_ms: u64,
    #[serde(default = "default_batch_delay_ms")]
    pub batch_delay_ms: u64,
    /// How many prior frames feed the narrative context window.
    #[serde(default = "default_context_window")]
    pub context_window: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LimitsConfig {
    #[serde(default = "default_min_duration")]
    pub min_duration_secs: u32,
    #[serde(default = "default_max_duration")]
    pub max_duration_secs: u32,
    #[serde(default = "default_min_fps")]
    pub min_fps: u32,
    #[serde(default = "default_max_fps")]
    pub max_fps: u32,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CompletionConfig {
    #[serde(default = "default_completion_url")]
    pub base_url: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_temperature")]
    pub temperature: f64,
    #[serde(default = "default_top_p")]
    pub top_p: f64,
    #[serde(default = "default_top_k")]
    pub top_k: u32,
    #[serde(default = "default_repetition_penalty")]
    pub repetition_penalty: f64,
    #[serde(default = "default_stop")]
    pub stop: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ImageServiceConfig {
    #[serde(default = "default_image_url")]
    pub base_url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct OutputConfig {
    #[serde(default = "default_frames_dir")]
    pub frames_dir: String,
    #[serde(default = "default_videos_dir")]
    pub videos_dir: String,
}

// Defaults
fn default_fps() -> u32 {
    30
}
fn default_frame_size() -> u32 {
    1024
}
fn default_crf() -> u32 {
    23
}
fn default_preset() -> String {
    "medium".into()
}
fn default_batch_size() -> usize {
    8
}
fn default_fetch_attempts() -> u32 {
    5
}
fn default_min_success_ratio() -> f64 {
    0.9
}
fn default_launch_delay_ms() -> u64 {
    100
}
fn default_batch_delay_ms() -> u64 {
    2000
}
fn default_context_window() -> usize {
    3
}
fn default_min_duration() -> u32 {
    1
}
fn default_max_duration() -> u32 {
    300
}
fn default_min_fps() -> u32 {
    1
}
fn default_max_fps() -> u32 {
    60
}
fn default_completion_url() -> String {
    "https://api.together.xyz".into()
}
fn default_model() -> String {
    "deepseek-ai/DeepSeek-V3".into()
}
fn default_max_tokens() -> u32 {
    200
}
fn default_temperature() -> f64 {
    0.7
}
fn default_top_p() -> f64 {
    0.7
}
fn default_top_k() -> u32 {
    50
}
fn default_repetition_penalty() -> f64 {
    1.0
}
fn default_stop() -> String {
    "<\u{ff5c}end\u{2581}of\u{2581}sentence\u{ff5c}>".into()
}
fn default_image_url() -> String {
    "https://image.pollinations.ai".into()
}
fn default_timeout_secs() -> u64 {
    60
}
fn default_frames_dir() -> String {
    "./frames".into()
}
fn default_videos_dir() -> String {
    "./videos".into()
}

impl Default for VideoConfig {
    fn default() -> Self {
        Self {
            fps: default_fps(),
            frame_size: default_frame_size(),
            crf: default_crf(),
            preset: default_preset(),
        }
    }
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            fetch_attempts: default_fetch_attempts(),
            min_success_ratio: default_min_success_ratio(),
            launch_delay_ms: default_launch_delay_ms(),
            batch_delay_ms: default_batch_delay_ms(),
            context_window: default_context_window(),
        }
    }
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            min_duration_secs: default_min_duration(),
            max_duration_secs: default_max_duration(),
            min_fps: default_min_fps(),
            max_fps: default_max_fps(),
        }
    }
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            base_url: default_completion_url(),
            model: default_model(),
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            top_p: default_top_p(),
            top_k: default_top_k(),
            repetition_penalty: default_repetition_penalty(),
            stop: default_stop(),
        }
    }
}

impl Default for ImageServiceConfig {
    fn default() -> Self {
        Self {
            base_url: default_image_url(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            frames_dir: default_frames_dir(),
            videos_dir: default_videos_dir(),
        }
    }
}

impl StoryConfig {
    /// Reject a requested duration outside the configured bounds.
    pub fn validate_duration(&self, secs: u32) -> StoryResult<()> {
        if secs < self.limits.min_duration_secs || secs > self.limits.max_duration_secs {
            return Err(StoryError::DurationOutOfRange {
                secs,
                min: self.limits.min_duration_secs,
                max: self.limits.max_duration_secs,
            });
        }
        Ok(())
    }

    /// Reject a requested frame rate outside the configured bounds.
    /// Also catches `--fps 0`, which would yield a zero-frame run.
    pub fn validate_fps(&self, fps: u32) -> StoryResult<()> {
        if fps < self.limits.min_fps || fps > self.limits.max_fps {
            return Err(StoryError::FpsOutOfRange {
                fps,
                min: self.limits.min_fps,
                max: self.limits.max_fps,
            });
        }
        Ok(())
    }
}

/// Load config from an explicit path, or from `./storyreel.toml` if present.
/// A missing implicit config is not an error; every field has a default.
pub fn load_config(explicit: Option<&Path>) -> StoryResult<StoryConfig> {
    let path = match explicit {
        Some(p) => {
            if !p.exists() {
                return Err(StoryError::ConfigNotFound(p.to_path_buf()));
            }
            p.to_path_buf()
        }
        None => {
            let default = Path::new("storyreel.toml");
            if !default.exists() {
                return Ok(StoryConfig::default());
            }
            default.to_path_buf()
        }
    };

    let content = std::fs::read_to_string(&path)?;
    toml::from_str(&content).map_err(|e| StoryError::ConfigParse(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_config() {
        let toml = r#"
[video]
fps = 24
frame_size = 512
crf = 18
preset = "slow"

[generation]
batch_size = 5
fetch_attempts = 3
min_success_ratio = 0.7

[limits]
min_duration_secs = 10
max_duration_secs = 30
"#;
        let config: StoryConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.video.fps, 24);
        assert_eq!(config.video.frame_size, 512);
        assert_eq!(config.video.preset, "slow");
        assert_eq!(config.generation.batch_size, 5);
        assert_eq!(config.generation.fetch_attempts, 3);
        assert!((config.generation.min_success_ratio - 0.7).abs() < f64::EPSILON);
        assert_eq!(config.limits.min_duration_secs, 10);
        assert_eq!(config.limits.max_duration_secs, 30);
    }

    #[test]
    fn test_parse_empty_config_uses_defaults() {
        let config: StoryConfig = toml::from_str("").unwrap();
        assert_eq!(config.video.fps, 30);
        assert_eq!(config.video.frame_size, 1024);
        assert_eq!(config.video.crf, 23);
        assert_eq!(config.generation.batch_size, 8);
        assert_eq!(config.generation.fetch_attempts, 5);
        assert!((config.generation.min_success_ratio - 0.9).abs() < f64::EPSILON);
        assert_eq!(config.generation.context_window, 3);
        assert_eq!(config.limits.min_duration_secs, 1);
        assert_eq!(config.limits.max_duration_secs, 300);
        assert_eq!(config.completion.model, "deepseek-ai/DeepSeek-V3");
        assert_eq!(config.images.timeout_secs, 60);
        assert_eq!(config.output.frames_dir, "./frames");
    }

    #[test]
    fn test_parse_invalid_toml() {
        let result = toml::from_str::<StoryConfig>("not valid toml [[[");
        assert!(result.is_err());
    }

    #[test]
    fn test_validate_duration_bounds() {
        let config = StoryConfig::default();
        assert!(config.validate_duration(1).is_ok());
        assert!(config.validate_duration(300).is_ok());
        assert!(config.validate_duration(0).is_err());
        assert!(config.validate_duration(301).is_err());

        let narrow: StoryConfig = toml::from_str(
            "[limits]\nmin_duration_secs = 10\nmax_duration_secs = 30\n",
        )
        .unwrap();
        assert!(narrow.validate_duration(9).is_err());
        assert!(narrow.validate_duration(10).is_ok());
        assert!(narrow.validate_duration(30).is_ok());
        assert!(narrow.validate_duration(31).is_err());
    }

    #[test]
    fn test_duration_error_carries_bounds() {
        let config = StoryConfig::default();
        match config.validate_duration(500) {
            Err(StoryError::DurationOutOfRange { secs, min, max }) => {
                assert_eq!(secs, 500);
                assert_eq!(min, 1);
                assert_eq!(max, 300);
            }
            other => panic!("expected DurationOutOfRange, got {other:?}"),
        }
    }

    #[test]
    fn test_validate_fps_bounds() {
        let config = StoryConfig::default();
        assert!(config.validate_fps(1).is_ok());
        assert!(config.validate_fps(30).is_ok());
        assert!(config.validate_fps(60).is_ok());
        assert!(config.validate_fps(0).is_err());
        match config.validate_fps(20_000_000) {
            Err(StoryError::FpsOutOfRange { fps, min, max }) => {
                assert_eq!(fps, 20_000_000);
                assert_eq!(min, 1);
                assert_eq!(max, 60);
            }
            other => panic!("expected FpsOutOfRange, got {other:?}"),
        }

        let wide: StoryConfig = toml::from_str("[limits]\nmax_fps = 120\n").unwrap();
        assert!(wide.validate_fps(120).is_ok());
        assert!(wide.validate_fps(121).is_err());
    }

    #[test]
    fn test_load_config_explicit_missing() {
        let result = load_config(Some(std::path::Path::new("/nonexistent/storyreel.toml")));
        assert!(matches!(result, Err(StoryError::ConfigNotFound(_))));
    }

    #[test]
    fn test_load_config_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("storyreel.toml");
        std::fs::write(&path, "[video]\nfps = 12\n").unwrap();
        let config = load_config(Some(&path)).unwrap();
        assert_eq!(config.video.fps, 12);
        assert_eq!(config.video.frame_size, 1024); // default survives
    }
}
