//! Capture Loop Controller
//!
//! Owns one detection session at a time:
//! - Camera acquisition and release
//! - Fixed-interval frame capture and upload to the detection service
//! - Rendering of annotated frames and the drowsiness alert
//! - Best-effort silencing of the server-side alarm

mod capture;
mod config;
mod controller;

pub use config::ControllerConfig;
pub use controller::CaptureController;

use camera_capture::CameraError;
use detect_client::DetectError;
use thiserror::Error;

/// Shown when the camera cannot be opened
pub const CAMERA_ERROR_MESSAGE: &str =
    "Failed to access camera. Please ensure camera permissions are granted.";

/// Shown when a detection request fails and the session is torn down
pub const DETECTION_ERROR_MESSAGE: &str = "Detection error occurred. Please try again.";

/// Controller error types
#[derive(Error, Debug)]
pub enum ControllerError {
    #[error("Camera error: {0}")]
    Camera(#[from] CameraError),

    #[error("Detection error: {0}")]
    Detect(#[from] DetectError),
}
