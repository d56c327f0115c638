//! Still image replayed as a live stream

use std::path::PathBuf;
use std::time::Instant;

use tracing::info;

use crate::{CameraError, CameraSource, StreamConstraints, StreamInfo, VideoFrame};

/// Camera that serves the same decoded image on every capture
///
/// Images larger than the ideal resolution are scaled down to it.
pub struct StillImageCamera {
    path: PathBuf,
    frame: Option<VideoFrame>,
    opened_at: Option<Instant>,
    sequence: u32,
}

impl StillImageCamera {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            frame: None,
            opened_at: None,
            sequence: 0,
        }
    }
}

#[async_trait::async_trait]
impl CameraSource for StillImageCamera {
    async fn open(&mut self, constraints: &StreamConstraints) -> Result<StreamInfo, CameraError> {
        let bytes = tokio::fs::read(&self.path)
            .await
            .map_err(|e| CameraError::Open(format!("{}: {}", self.path.display(), e)))?;
        let image = image::load_from_memory(&bytes)
            .map_err(|e| CameraError::Format(e.to_string()))?
            .to_rgb8();

        let mut frame = VideoFrame::from_rgb_image(image, 0, 0);
        if frame.width > constraints.ideal_width || frame.height > constraints.ideal_height {
            frame = frame.resize(constraints.ideal_width, constraints.ideal_height);
        }

        info!(
            "Still image camera {} streaming at {}x{}",
            self.path.display(),
            frame.width,
            frame.height
        );

        let info = StreamInfo {
            width: frame.width,
            height: frame.height,
            label: self.path.display().to_string(),
        };
        self.frame = Some(frame);
        self.opened_at = Some(Instant::now());
        self.sequence = 0;
        Ok(info)
    }

    fn video_size(&self) -> (u32, u32) {
        self.frame
            .as_ref()
            .map(|f| (f.width, f.height))
            .unwrap_or((0, 0))
    }

    async fn capture_frame(&mut self) -> Result<VideoFrame, CameraError> {
        let (frame, opened_at) = match (&self.frame, self.opened_at) {
            (Some(frame), Some(opened_at)) => (frame, opened_at),
            _ => return Err(CameraError::NotInitialized),
        };

        let mut frame = frame.clone();
        frame.timestamp_ns = opened_at.elapsed().as_nanos() as u64;
        frame.sequence = self.sequence;
        self.sequence = self.sequence.wrapping_add(1);
        Ok(frame)
    }

    fn release(&mut self) {
        if self.frame.take().is_some() {
            self.opened_at = None;
            info!("Still image camera released");
        }
    }

    fn is_streaming(&self) -> bool {
        self.frame.is_some()
    }

    fn name(&self) -> &str {
        "still-image"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_png(width: u32, height: u32) -> PathBuf {
        let path = std::env::temp_dir().join(format!(
            "still-camera-{}-{}x{}.png",
            std::process::id(),
            width,
            height
        ));
        image::RgbImage::from_pixel(width, height, image::Rgb([9, 9, 9]))
            .save(&path)
            .unwrap();
        path
    }

    #[tokio::test]
    async fn test_open_keeps_small_images() {
        let path = write_png(320, 240);
        let mut camera = StillImageCamera::new(&path);

        let info = camera.open(&StreamConstraints::default()).await.unwrap();
        assert_eq!((info.width, info.height), (320, 240));

        let frame = camera.capture_frame().await.unwrap();
        assert_eq!(frame.get_pixel(0, 0), Some([9, 9, 9]));
        let _ = std::fs::remove_file(path);
    }

    #[tokio::test]
    async fn test_open_downscales_large_images() {
        let path = write_png(1280, 960);
        let mut camera = StillImageCamera::new(&path);

        camera.open(&StreamConstraints::default()).await.unwrap();
        assert_eq!(camera.video_size(), (640, 480));
        let _ = std::fs::remove_file(path);
    }

    #[tokio::test]
    async fn test_missing_file_fails_to_open() {
        let mut camera = StillImageCamera::new("/nonexistent/driver.jpg");
        let result = camera.open(&StreamConstraints::default()).await;
        assert!(matches!(result, Err(CameraError::Open(_))));
        assert!(!camera.is_streaming());
        assert_eq!(camera.video_size(), (0, 0));
    }
}
