//! Camera Capture Library for the Drowsiness Client
//!
//! Acquires a driver-facing video stream and hands out the current frame on
//! demand. Supports:
//! - Synthetic test pattern (no hardware required)
//! - Still image replayed as a live stream
//! - V4L2 webcams (`v4l2` feature)

pub mod frame;
pub mod pattern;
pub mod still;
#[cfg(feature = "v4l2")]
pub mod v4l2;

pub use frame::{EncodedFrame, VideoFrame};
pub use pattern::{CameraProbe, TestPatternCamera};
pub use still::StillImageCamera;
#[cfg(feature = "v4l2")]
pub use v4l2::V4l2Camera;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Camera error types
#[derive(Error, Debug)]
pub enum CameraError {
    #[error("Camera access denied: {0}")]
    PermissionDenied(String),

    #[error("Failed to open camera: {0}")]
    Open(String),

    #[error("Invalid format: {0}")]
    Format(String),

    #[error("Streaming error: {0}")]
    Stream(String),

    #[error("Frame encoding failed: {0}")]
    Encode(String),

    #[error("Camera not initialized")]
    NotInitialized,
}

/// Which way the camera faces
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FacingMode {
    /// Front camera pointed at the driver
    #[default]
    User,
    /// Rear / road-facing camera
    Environment,
}

/// Requested stream constraints
///
/// Width and height are *ideal* values: a source may deliver a different
/// resolution, and the negotiated one is reported in [`StreamInfo`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamConstraints {
    /// Ideal capture width
    pub ideal_width: u32,
    /// Ideal capture height
    pub ideal_height: u32,
    /// Camera facing
    pub facing: FacingMode,
}

impl Default for StreamConstraints {
    fn default() -> Self {
        Self {
            ideal_width: 640,
            ideal_height: 480,
            facing: FacingMode::User,
        }
    }
}

/// Stream metadata, available once the source has negotiated a format
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamInfo {
    pub width: u32,
    pub height: u32,
    /// Human-readable source label for logs
    pub label: String,
}

/// A live video source
///
/// `open` resolves only after stream metadata is known, mirroring a video
/// element's `loadedmetadata` event.
#[async_trait::async_trait]
pub trait CameraSource: Send {
    /// Acquire the stream and wait for its metadata
    async fn open(&mut self, constraints: &StreamConstraints) -> Result<StreamInfo, CameraError>;

    /// Current video dimensions, `(0, 0)` while unknown
    fn video_size(&self) -> (u32, u32);

    /// Grab the frame currently shown by the stream
    async fn capture_frame(&mut self) -> Result<VideoFrame, CameraError>;

    /// Stop all tracks. Safe to call when not streaming.
    fn release(&mut self);

    /// Check if streaming
    fn is_streaming(&self) -> bool;

    /// Source name for logging
    fn name(&self) -> &str;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_constraints() {
        let constraints = StreamConstraints::default();
        assert_eq!(constraints.ideal_width, 640);
        assert_eq!(constraints.ideal_height, 480);
        assert_eq!(constraints.facing, FacingMode::User);
    }
}
