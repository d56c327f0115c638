//! Controller configuration

use std::time::Duration;

use camera_capture::frame::DEFAULT_JPEG_QUALITY;
use camera_capture::{FacingMode, StreamConstraints};
use serde::{Deserialize, Serialize};

/// Capture loop configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerConfig {
    /// Ideal capture width
    pub width: u32,
    /// Ideal capture height
    pub height: u32,
    /// Camera facing
    pub facing: FacingMode,
    /// Time between capture ticks (milliseconds)
    pub interval_ms: u64,
    /// Delay between stream start and the capture loop (milliseconds)
    pub warmup_ms: u64,
    /// JPEG quality for uploads (1-100)
    pub jpeg_quality: u8,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            width: 640,
            height: 480,
            facing: FacingMode::User,
            interval_ms: 1000,
            warmup_ms: 1000,
            jpeg_quality: DEFAULT_JPEG_QUALITY,
        }
    }
}

impl ControllerConfig {
    /// Stream constraints for the camera
    pub fn constraints(&self) -> StreamConstraints {
        StreamConstraints {
            ideal_width: self.width,
            ideal_height: self.height,
            facing: self.facing,
        }
    }

    /// Tick period, never zero
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms.max(1))
    }

    pub fn warmup(&self) -> Duration {
        Duration::from_millis(self.warmup_ms)
    }
}
