//! Synthetic test-pattern camera
//!
//! Produces a moving gradient without any hardware. Also used by tests to
//! simulate denied permissions and streams whose metadata never arrives.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info, warn};

use crate::{CameraError, CameraSource, StreamConstraints, StreamInfo, VideoFrame};

/// Shared counters for observing a camera after it has been boxed away
#[derive(Debug, Clone, Default)]
pub struct CameraProbe {
    opens: Arc<AtomicU32>,
    releases: Arc<AtomicU32>,
    captures: Arc<AtomicU32>,
    streaming: Arc<AtomicBool>,
}

impl CameraProbe {
    /// Successful `open` calls
    pub fn opens(&self) -> u32 {
        self.opens.load(Ordering::SeqCst)
    }

    /// `release` calls that stopped a live stream
    pub fn releases(&self) -> u32 {
        self.releases.load(Ordering::SeqCst)
    }

    /// Frames handed out
    pub fn captures(&self) -> u32 {
        self.captures.load(Ordering::SeqCst)
    }

    pub fn is_streaming(&self) -> bool {
        self.streaming.load(Ordering::SeqCst)
    }
}

/// Test-pattern camera
pub struct TestPatternCamera {
    /// Reject `open` as if the user denied permission
    deny_access: bool,
    /// Forced size, `Some((0, 0))` simulates missing metadata
    forced_size: Option<(u32, u32)>,
    size: (u32, u32),
    sequence: u32,
    opened_at: Option<Instant>,
    probe: CameraProbe,
}

impl TestPatternCamera {
    /// Create a camera that honours the requested constraints
    pub fn new() -> Self {
        Self {
            deny_access: false,
            forced_size: None,
            size: (0, 0),
            sequence: 0,
            opened_at: None,
            probe: CameraProbe::default(),
        }
    }

    /// Create a camera whose `open` always fails with a permission error
    pub fn denied() -> Self {
        Self {
            deny_access: true,
            ..Self::new()
        }
    }

    /// Report a fixed video size regardless of constraints
    pub fn with_size(mut self, width: u32, height: u32) -> Self {
        self.forced_size = Some((width, height));
        self
    }

    /// Counters that stay valid after the camera is moved
    pub fn probe(&self) -> CameraProbe {
        self.probe.clone()
    }

    fn render(&self) -> Vec<u8> {
        let (width, height) = self.size;
        let offset = self.sequence.wrapping_mul(8);
        let mut data = Vec::with_capacity((width * height * 3) as usize);
        for y in 0..height {
            for x in 0..width {
                let bar = ((x + offset) / 32) % 2 == 0;
                data.push((x * 255 / width.max(1)) as u8);
                data.push((y * 255 / height.max(1)) as u8);
                data.push(if bar { 192 } else { 64 });
            }
        }
        data
    }
}

impl Default for TestPatternCamera {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl CameraSource for TestPatternCamera {
    async fn open(&mut self, constraints: &StreamConstraints) -> Result<StreamInfo, CameraError> {
        if self.deny_access {
            warn!("Test pattern camera configured to deny access");
            return Err(CameraError::PermissionDenied(
                "permission denied by test pattern source".to_string(),
            ));
        }

        self.size = self
            .forced_size
            .unwrap_or((constraints.ideal_width, constraints.ideal_height));
        self.sequence = 0;
        self.opened_at = Some(Instant::now());
        self.probe.opens.fetch_add(1, Ordering::SeqCst);
        self.probe.streaming.store(true, Ordering::SeqCst);

        info!(
            "Test pattern camera streaming at {}x{} ({:?})",
            self.size.0, self.size.1, constraints.facing
        );

        Ok(StreamInfo {
            width: self.size.0,
            height: self.size.1,
            label: self.name().to_string(),
        })
    }

    fn video_size(&self) -> (u32, u32) {
        if self.opened_at.is_some() {
            self.size
        } else {
            (0, 0)
        }
    }

    async fn capture_frame(&mut self) -> Result<VideoFrame, CameraError> {
        let opened_at = self.opened_at.ok_or(CameraError::NotInitialized)?;
        let (width, height) = self.size;
        if width == 0 || height == 0 {
            return Err(CameraError::Stream("no video dimensions".to_string()));
        }

        let frame = VideoFrame::new(
            self.render(),
            width,
            height,
            opened_at.elapsed().as_nanos() as u64,
            self.sequence,
        );
        self.sequence = self.sequence.wrapping_add(1);
        self.probe.captures.fetch_add(1, Ordering::SeqCst);
        debug!("Test pattern frame {}", frame.sequence);
        Ok(frame)
    }

    fn release(&mut self) {
        if self.opened_at.take().is_some() {
            self.probe.releases.fetch_add(1, Ordering::SeqCst);
            self.probe.streaming.store(false, Ordering::SeqCst);
            info!("Test pattern camera released");
        }
    }

    fn is_streaming(&self) -> bool {
        self.opened_at.is_some()
    }

    fn name(&self) -> &str {
        "test-pattern"
    }
}
