//! In-memory display that records every call
//!
//! Headless stand-in for a real UI, used by tests and dry runs.

use std::sync::{Mutex, MutexGuard};

use alerting::AlertBanner;
use camera_capture::StreamInfo;
use image::RgbImage;

use crate::{ControlState, DisplaySurface, OverlayCanvas};

/// A recorded display call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisplayEvent {
    StreamAttached { width: u32, height: u32 },
    StreamDetached,
    OverlayResized { width: u32, height: u32 },
    OverlayDrawn,
    OverlayCleared,
    Controls(ControlState),
    Banner(AlertBanner),
    Notified(String),
}

#[derive(Debug)]
struct Recorded {
    events: Vec<DisplayEvent>,
    controls: ControlState,
    banner: AlertBanner,
    overlay: OverlayCanvas,
    streaming: bool,
}

/// Display that keeps its state and call history in memory
#[derive(Debug)]
pub struct RecordingDisplay {
    inner: Mutex<Recorded>,
}

impl RecordingDisplay {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Recorded {
                events: Vec::new(),
                controls: ControlState::IDLE,
                banner: AlertBanner::hidden(),
                overlay: OverlayCanvas::new(0, 0),
                streaming: false,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Recorded> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Every call so far, in order
    pub fn events(&self) -> Vec<DisplayEvent> {
        self.lock().events.clone()
    }

    pub fn controls(&self) -> ControlState {
        self.lock().controls
    }

    pub fn banner(&self) -> AlertBanner {
        self.lock().banner
    }

    pub fn is_streaming(&self) -> bool {
        self.lock().streaming
    }

    /// Copy of the overlay canvas
    pub fn overlay(&self) -> OverlayCanvas {
        self.lock().overlay.clone()
    }

    /// Number of overlay draws
    pub fn draw_count(&self) -> usize {
        self.count(|e| matches!(e, DisplayEvent::OverlayDrawn))
    }

    /// Notification messages shown to the user
    pub fn notifications(&self) -> Vec<String> {
        self.lock()
            .events
            .iter()
            .filter_map(|e| match e {
                DisplayEvent::Notified(message) => Some(message.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn count(&self, predicate: impl Fn(&DisplayEvent) -> bool) -> usize {
        self.lock().events.iter().filter(|e| predicate(e)).count()
    }
}

impl Default for RecordingDisplay {
    fn default() -> Self {
        Self::new()
    }
}

impl DisplaySurface for RecordingDisplay {
    fn attach_stream(&self, info: &StreamInfo) {
        let mut inner = self.lock();
        inner.streaming = true;
        inner.events.push(DisplayEvent::StreamAttached {
            width: info.width,
            height: info.height,
        });
    }

    fn detach_stream(&self) {
        let mut inner = self.lock();
        inner.streaming = false;
        inner.events.push(DisplayEvent::StreamDetached);
    }

    fn resize_overlay(&self, width: u32, height: u32) {
        let mut inner = self.lock();
        inner.overlay.resize(width, height);
        inner
            .events
            .push(DisplayEvent::OverlayResized { width, height });
    }

    fn draw_overlay(&self, image: &RgbImage) {
        let mut inner = self.lock();
        inner.overlay.draw(image);
        inner.events.push(DisplayEvent::OverlayDrawn);
    }

    fn clear_overlay(&self) {
        let mut inner = self.lock();
        inner.overlay.clear();
        inner.events.push(DisplayEvent::OverlayCleared);
    }

    fn set_controls(&self, controls: ControlState) {
        let mut inner = self.lock();
        inner.controls = controls;
        inner.events.push(DisplayEvent::Controls(controls));
    }

    fn show_banner(&self, banner: AlertBanner) {
        let mut inner = self.lock();
        inner.banner = banner;
        inner.events.push(DisplayEvent::Banner(banner));
    }

    fn notify(&self, message: &str) {
        self.lock()
            .events
            .push(DisplayEvent::Notified(message.to_string()));
    }
}
