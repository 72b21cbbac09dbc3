use crate::config::ImageServiceConfig;
use crate::error::{StoryError, StoryResult};
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn};

/// Seam for the remote image-generation service: raw bytes for a prompt.
///
/// Implementations are stateless and safe to call concurrently across
/// distinct frame indices.
pub trait ImageSource: Send + Sync {
    fn fetch(&self, prompt: &str, index: usize) -> StoryResult<Vec<u8>>;
}

/// Pollinations-style image service: the prompt rides in the URL path,
/// seeded per frame so retries are deterministic.
pub struct HttpImageSource {
    agent: ureq::Agent,
    base_url: String,
}

impl HttpImageSource {
    pub fn new(config: &ImageServiceConfig) -> Self {
        let agent: ureq::Agent = ureq::Agent::config_builder()
            .timeout_global(Some(Duration::from_secs(config.timeout_secs)))
            .build()
            .into();
        Self {
            agent,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        }
    }

    fn frame_url(&self, prompt: &str, index: usize) -> String {
        let seeded = format!("{prompt} {index}");
        let encoded = urlencoding::encode(&seeded);
        format!(
            "{}/prompt/{}?seed={}&nologo=true&quality=100&width=1024&height=1024",
            self.base_url, encoded, index
        )
    }
}

impl ImageSource for HttpImageSource {
    fn fetch(&self, prompt: &str, index: usize) -> StoryResult<Vec<u8>> {
        let url = self.frame_url(prompt, index);

        let response = self
            .agent
            .get(&url)
            .header("Accept", "image/jpeg")
            .header("User-Agent", "Mozilla/5.0")
            .call()
            .map_err(|e| StoryError::Other(format!("Image request failed: {e}")))?;

        response
            .into_body()
            .read_to_vec()
            .map_err(|e| StoryError::Other(format!("Failed to read image response: {e}")))
    }
}

/// Backoff before retry attempt `k` (0-indexed): min(1000ms * 2^k, 10s).
pub fn backoff_delay(attempt: u32) -> Duration {
    let ms = 1000u64.saturating_mul(2u64.saturating_pow(attempt)).min(10_000);
    Duration::from_millis(ms)
}

/// Zero-padded frame filename so a directory listing sorts into playback order.
pub fn frame_filename(index: usize) -> String {
    format!("frame_{index:04}.jpg")
}

/// Letterbox an encoded image onto a black square canvas of `size` pixels,
/// preserving aspect ratio, and re-encode as JPEG. Every frame must have
/// identical dimensions before the encoder sees them.
pub fn letterbox(bytes: &[u8], size: u32) -> StoryResult<Vec<u8>> {
    let img = image::load_from_memory(bytes)
        .map_err(|e| StoryError::Other(format!("Image decode failed: {e}")))?;

    let resized = img.resize(size, size, image::imageops::FilterType::Triangle);
    let mut canvas = RgbImage::from_pixel(size, size, Rgb([0, 0, 0]));
    let x = (size - resized.width()) / 2;
    let y = (size - resized.height()) / 2;
    image::imageops::overlay(&mut canvas, &resized.to_rgb8(), x as i64, y as i64);

    let mut out = Vec::new();
    DynamicImage::ImageRgb8(canvas)
        .write_to(&mut Cursor::new(&mut out), ImageFormat::Jpeg)
        .map_err(|e| StoryError::Other(format!("Image encode failed: {e}")))?;
    Ok(out)
}

/// Retrying frame fetcher: pulls one image per frame index, normalizes it,
/// and persists it under a sequence-numbered filename.
///
/// Unlike the prompt generator, exhausted retries here propagate to the
/// caller as a failed unit of work.
pub struct FrameFetcher {
    source: Box<dyn ImageSource>,
    attempts: u32,
    frame_size: u32,
}

impl FrameFetcher {
    pub fn new(source: Box<dyn ImageSource>, attempts: u32, frame_size: u32) -> Self {
        Self {
            source,
            attempts: attempts.max(1),
            frame_size,
        }
    }

    /// Fetch, normalize, and write one frame. Blocking; run on a blocking
    /// task when called from async code.
    pub fn fetch_frame(&self, prompt: &str, index: usize, out_dir: &Path) -> StoryResult<PathBuf> {
        let mut last_err = String::new();

        for attempt in 0..self.attempts {
            if attempt > 0 {
                std::thread::sleep(backoff_delay(attempt));
            }

            match self.try_once(prompt, index, out_dir) {
                Ok(path) => {
                    debug!("Frame {index} written to {}", path.display());
                    return Ok(path);
                }
                Err(e) => {
                    warn!(
                        "Attempt {} failed for frame {index}: {e}",
                        attempt + 1
                    );
                    last_err = e.to_string();
                }
            }
        }

        Err(StoryError::ImageFetch {
            frame: index,
            attempts: self.attempts,
            message: last_err,
        })
    }

    fn try_once(&self, prompt: &str, index: usize, out_dir: &Path) -> StoryResult<PathBuf> {
        let bytes = self.source.fetch(prompt, index)?;
        let normalized = letterbox(&bytes, self.frame_size)?;
        let path = out_dir.join(frame_filename(index));
        std::fs::write(&path, normalized)?;
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    fn png_fixture(width: u32, height: u32) -> Vec<u8> {
        let img = RgbImage::from_pixel(width, height, Rgb([120, 40, 200]));
        let mut out = Vec::new();
        DynamicImage::ImageRgb8(img)
            .write_to(&mut Cursor::new(&mut out), ImageFormat::Png)
            .unwrap();
        out
    }

    #[test]
    fn test_frame_url_encodes_prompt_and_seeds_by_index() {
        let source = HttpImageSource::new(&ImageServiceConfig::default());
        let url = source.frame_url("a red fox, snowy field", 7);
        assert_eq!(
            url,
            "https://image.pollinations.ai/prompt/a%20red%20fox%2C%20snowy%20field%207\
             ?seed=7&nologo=true&quality=100&width=1024&height=1024"
        );
    }

    struct FixtureSource {
        bytes: Vec<u8>,
    }

    impl ImageSource for FixtureSource {
        fn fetch(&self, _prompt: &str, _index: usize) -> StoryResult<Vec<u8>> {
            Ok(self.bytes.clone())
        }
    }

    struct CountingFailSource {
        calls: Arc<AtomicU32>,
        succeed_on: u32,
        bytes: Vec<u8>,
    }

    impl ImageSource for CountingFailSource {
        fn fetch(&self, _prompt: &str, _index: usize) -> StoryResult<Vec<u8>> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if n >= self.succeed_on {
                Ok(self.bytes.clone())
            } else {
                Err(StoryError::Other("503 service unavailable".into()))
            }
        }
    }

    #[test]
    fn test_backoff_delay_schedule() {
        assert_eq!(backoff_delay(0), Duration::from_millis(1000));
        assert_eq!(backoff_delay(1), Duration::from_millis(2000));
        assert_eq!(backoff_delay(2), Duration::from_millis(4000));
        assert_eq!(backoff_delay(3), Duration::from_millis(8000));
        assert_eq!(backoff_delay(4), Duration::from_millis(10000));
        assert_eq!(backoff_delay(10), Duration::from_millis(10000));
    }

    #[test]
    fn test_frame_filename_zero_padded() {
        assert_eq!(frame_filename(0), "frame_0000.jpg");
        assert_eq!(frame_filename(7), "frame_0007.jpg");
        assert_eq!(frame_filename(123), "frame_0123.jpg");
        assert_eq!(frame_filename(9999), "frame_9999.jpg");
    }

    #[test]
    fn test_letterbox_wide_image_to_square() {
        let out = letterbox(&png_fixture(200, 100), 64).unwrap();
        let img = image::load_from_memory(&out).unwrap();
        assert_eq!(img.width(), 64);
        assert_eq!(img.height(), 64);
        // Wide input letterboxes top and bottom: corners stay black
        let rgb = img.to_rgb8();
        assert_eq!(rgb.get_pixel(0, 0), &Rgb([0, 0, 0]));
        assert_eq!(rgb.get_pixel(0, 63), &Rgb([0, 0, 0]));
    }

    #[test]
    fn test_letterbox_rejects_garbage() {
        assert!(letterbox(b"not an image", 64).is_err());
    }

    #[test]
    fn test_fetch_frame_writes_expected_file() {
        let dir = tempfile::tempdir().unwrap();
        let fetcher = FrameFetcher::new(
            Box::new(FixtureSource {
                bytes: png_fixture(32, 32),
            }),
            3,
            64,
        );
        let path = fetcher.fetch_frame("a fox", 12, dir.path()).unwrap();
        assert_eq!(path.file_name().unwrap(), "frame_0012.jpg");
        assert!(path.exists());
    }

    #[test]
    fn test_fetch_frame_retries_then_succeeds() {
        let dir = tempfile::tempdir().unwrap();
        let calls = Arc::new(AtomicU32::new(0));
        let fetcher = FrameFetcher::new(
            Box::new(CountingFailSource {
                calls: Arc::clone(&calls),
                succeed_on: 2,
                bytes: png_fixture(16, 16),
            }),
            3,
            32,
        );
        let result = fetcher.fetch_frame("a fox", 0, dir.path());
        assert!(result.is_ok());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_fetch_frame_exhaustion_propagates() {
        let dir = tempfile::tempdir().unwrap();
        let calls = Arc::new(AtomicU32::new(0));
        let fetcher = FrameFetcher::new(
            Box::new(CountingFailSource {
                calls: Arc::clone(&calls),
                succeed_on: u32::MAX,
                bytes: Vec::new(),
            }),
            2,
            32,
        );
        match fetcher.fetch_frame("a fox", 5, dir.path()) {
            Err(StoryError::ImageFetch {
                frame,
                attempts,
                message,
            }) => {
                assert_eq!(frame, 5);
                assert_eq!(attempts, 2);
                assert!(message.contains("503"));
            }
            other => panic!("expected ImageFetch error, got {other:?}"),
        }
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        // No partial file left behind
        assert!(!dir.path().join("frame_0005.jpg").exists());
    }
}
