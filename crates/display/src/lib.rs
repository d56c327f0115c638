//! Display Surface
//!
//! Everything the user sees besides the camera itself:
//! - Overlay canvas layered over the live video
//! - Start / stop / stop-alarm controls
//! - Drowsiness alert banner and page background
//! - Blocking user notifications

pub mod overlay;
pub mod recording;
pub mod terminal;

pub use overlay::{decode_annotated, OverlayCanvas};
pub use recording::{DisplayEvent, RecordingDisplay};
pub use terminal::TerminalDisplay;

use alerting::AlertBanner;
use camera_capture::StreamInfo;
use image::RgbImage;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Display error types
#[derive(Error, Debug)]
pub enum DisplayError {
    #[error("Invalid base64 image: {0}")]
    Base64(String),

    #[error("Image decoding failed: {0}")]
    Decode(String),

    #[error("Overlay has no size")]
    EmptyOverlay,

    #[error("Failed to write overlay: {0}")]
    Io(String),
}

/// Enabled state of the start/stop controls
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlState {
    pub start_enabled: bool,
    pub stop_enabled: bool,
}

impl ControlState {
    /// Idle: start enabled, stop disabled
    pub const IDLE: ControlState = ControlState {
        start_enabled: true,
        stop_enabled: false,
    };

    /// Detection running: start disabled, stop enabled
    pub const RUNNING: ControlState = ControlState {
        start_enabled: false,
        stop_enabled: true,
    };
}

impl Default for ControlState {
    fn default() -> Self {
        Self::IDLE
    }
}

/// UI the capture controller drives
///
/// Methods take `&self`; implementations are shared between the controller
/// and its capture task.
pub trait DisplaySurface: Send + Sync {
    /// Show the live stream
    fn attach_stream(&self, info: &StreamInfo);

    /// Remove the live stream
    fn detach_stream(&self);

    /// Size the overlay to the video dimensions (clears it)
    fn resize_overlay(&self, width: u32, height: u32);

    /// Replace the overlay contents with `image`
    fn draw_overlay(&self, image: &RgbImage);

    /// Clear the overlay
    fn clear_overlay(&self);

    /// Enable / disable the start and stop controls
    fn set_controls(&self, controls: ControlState);

    /// Show or hide the alert banner and set the page background
    fn show_banner(&self, banner: AlertBanner);

    /// Blocking user notification
    fn notify(&self, message: &str);
}
