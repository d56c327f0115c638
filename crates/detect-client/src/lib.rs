//! Detection Service Client
//!
//! Talks to the external drowsiness detection service:
//! - `POST /detect` with a multipart JPEG frame, returns a [`DetectionResult`]
//! - `POST /stop_beep` to silence the server-side alarm

mod http;
mod result;

pub use http::{HttpDetectionClient, ServerConfig};
pub use result::{Detection, DetectionResult};

use camera_capture::EncodedFrame;
use thiserror::Error;

/// Errors talking to the detection service
#[derive(Debug, Error)]
pub enum DetectError {
    /// Connection refused, timeout, or other transport failure
    #[error("Request failed: {0}")]
    Transport(String),

    /// Server answered with a non-success status
    #[error("Server returned {status}: {message}")]
    Status { status: u16, message: String },

    /// Response body was not a valid detection result
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Invalid server URL: {0}")]
    InvalidUrl(String),
}

impl From<reqwest::Error> for DetectError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            DetectError::InvalidResponse(err.to_string())
        } else {
            DetectError::Transport(err.to_string())
        }
    }
}

/// Detection service interface
#[async_trait::async_trait]
pub trait DetectionClient: Send + Sync {
    /// Submit one frame for analysis
    async fn detect(&self, frame: EncodedFrame) -> Result<DetectionResult, DetectError>;

    /// Ask the server to silence its alarm
    async fn stop_beep(&self) -> Result<(), DetectError>;
}
