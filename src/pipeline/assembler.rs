use crate::error::{StoryError, StoryResult};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use tracing::debug;

/// Seam for the final encode step: numbered frames in, one video file out.
pub trait VideoAssembler: Send + Sync {
    fn assemble(&self, frames_dir: &Path, output_path: &Path, fps: u32) -> StoryResult<PathBuf>;
}

/// Encodes a `frame_%04d.jpg` sequence with the system FFmpeg.
///
/// CRF ~23 with the medium preset balances quality and encode time;
/// yuv420p and +faststart keep the output playable in browsers and start
/// streaming before the full download finishes.
pub struct FfmpegAssembler {
    crf: u32,
    preset: String,
}

impl FfmpegAssembler {
    pub fn new(crf: u32, preset: &str) -> Self {
        Self {
            crf,
            preset: preset.to_string(),
        }
    }

    /// Verify the encoder binary is present before committing to a run.
    pub fn probe() -> StoryResult<()> {
        let result = Command::new("ffmpeg")
            .arg("-version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status();

        match result {
            Ok(status) if status.success() => Ok(()),
            Ok(_) => Err(StoryError::EncoderUnavailable),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StoryError::EncoderUnavailable)
            }
            Err(e) => Err(StoryError::Encode(format!("Failed to probe ffmpeg: {e}"))),
        }
    }
}

impl VideoAssembler for FfmpegAssembler {
    fn assemble(&self, frames_dir: &Path, output_path: &Path, fps: u32) -> StoryResult<PathBuf> {
        Self::probe()?;

        let input_pattern = frames_dir.join("frame_%04d.jpg");
        debug!(
            "Encoding {} @ {fps}fps, crf={}, preset={}",
            input_pattern.display(),
            self.crf,
            self.preset
        );

        let output = Command::new("ffmpeg")
            .args(["-y", "-framerate", &fps.to_string()])
            .args(["-pattern_type", "sequence", "-i"])
            .arg(&input_pattern)
            .args(["-c:v", "libx264", "-pix_fmt", "yuv420p"])
            .args(["-preset", &self.preset, "-crf", &self.crf.to_string()])
            .args(["-movflags", "+faststart"])
            .arg(output_path)
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .output()
            .map_err(|e| StoryError::Encode(format!("Failed to spawn ffmpeg: {e}")))?;

        if !output.status.success() {
            // Attach the full encoder log so frame gaps and codec problems
            // are diagnosable without re-running.
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(StoryError::Encode(format!(
                "FFmpeg exited with {}: {}",
                output.status,
                stderr.trim()
            )));
        }

        Ok(output_path.to_path_buf())
    }
}
