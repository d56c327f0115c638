//! Terminal display
//!
//! Reports UI changes on the terminal and optionally mirrors the overlay to
//! an image file that any viewer can watch.

use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};

use alerting::{AlertBanner, Background};
use camera_capture::StreamInfo;
use image::RgbImage;
use tracing::{debug, info, warn};

use crate::{ControlState, DisplaySurface, OverlayCanvas};

pub struct TerminalDisplay {
    overlay: Mutex<OverlayCanvas>,
    mirror: Option<Arc<OverlayMirror>>,
}

/// Writes overlay snapshots to disk, newest wins
struct OverlayMirror {
    path: PathBuf,
    pending: Mutex<Option<OverlayCanvas>>,
    /// Serializes file writes
    writer: Mutex<()>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl OverlayMirror {
    fn write_pending(&self) {
        let _writer = lock(&self.writer);
        let Some(snapshot) = lock(&self.pending).take() else {
            return;
        };
        if let Err(e) = snapshot.save(&self.path) {
            warn!("Could not write overlay to {}: {}", self.path.display(), e);
        }
    }
}

impl TerminalDisplay {
    /// `overlay_path`: where to write the overlay after each change
    pub fn new(overlay_path: Option<PathBuf>) -> Self {
        Self {
            overlay: Mutex::new(OverlayCanvas::new(0, 0)),
            mirror: overlay_path.map(|path| {
                Arc::new(OverlayMirror {
                    path,
                    pending: Mutex::new(None),
                    writer: Mutex::new(()),
                })
            }),
        }
    }

    fn with_overlay(&self, f: impl FnOnce(&mut OverlayCanvas)) {
        let snapshot = {
            let mut overlay = lock(&self.overlay);
            f(&mut overlay);
            if overlay.width() == 0 || overlay.height() == 0 {
                return;
            }
            overlay.clone()
        };

        let Some(mirror) = &self.mirror else {
            return;
        };
        *lock(&mirror.pending) = Some(snapshot);

        // PNG encoding stays off the async worker threads.
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let mirror = mirror.clone();
                handle.spawn_blocking(move || mirror.write_pending());
            }
            Err(_) => mirror.write_pending(),
        }
    }
}

impl DisplaySurface for TerminalDisplay {
    fn attach_stream(&self, info: &StreamInfo) {
        info!("Video: {} ({}x{})", info.label, info.width, info.height);
    }

    fn detach_stream(&self) {
        info!("Video: detached");
    }

    fn resize_overlay(&self, width: u32, height: u32) {
        debug!("Overlay sized to {}x{}", width, height);
        self.with_overlay(|overlay| overlay.resize(width, height));
    }

    fn draw_overlay(&self, image: &RgbImage) {
        self.with_overlay(|overlay| overlay.draw(image));
    }

    fn clear_overlay(&self) {
        self.with_overlay(|overlay| overlay.clear());
    }

    fn set_controls(&self, controls: ControlState) {
        debug!(
            "Controls: start {}, stop {}",
            if controls.start_enabled { "enabled" } else { "disabled" },
            if controls.stop_enabled { "enabled" } else { "disabled" }
        );
    }

    fn show_banner(&self, banner: AlertBanner) {
        match (banner.visible, banner.background) {
            (true, Background::Warning([r, g, b])) => {
                warn!("DROWSINESS DETECTED (background #{:02x}{:02x}{:02x})", r, g, b);
                eprintln!("!!! DROWSINESS DETECTED - TAKE A BREAK !!!");
            }
            (true, Background::Normal) => warn!("DROWSINESS DETECTED"),
            (false, _) => debug!("Alert hidden"),
        }
    }

    fn notify(&self, message: &str) {
        warn!("User notification: {}", message);
        eprintln!("{}", message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn test_overlay_mirrored_to_file() {
        let path = std::env::temp_dir().join(format!("overlay-{}.png", std::process::id()));
        let display = TerminalDisplay::new(Some(path.clone()));

        display.resize_overlay(8, 6);
        display.draw_overlay(&RgbImage::from_pixel(8, 6, Rgb([0, 0, 255])));

        let written = image::open(&path).unwrap().to_rgba8();
        assert_eq!(written.dimensions(), (8, 6));
        assert_eq!(written.get_pixel(0, 0).0, [0, 0, 255, 255]);

        display.clear_overlay();
        let cleared = image::open(&path).unwrap().to_rgba8();
        assert_eq!(cleared.get_pixel(0, 0).0[3], 0);
        let _ = std::fs::remove_file(path);
    }

    #[test]
    fn test_unsized_overlay_not_written() {
        let path = std::env::temp_dir().join(format!("overlay-empty-{}.png", std::process::id()));
        let display = TerminalDisplay::new(Some(path.clone()));
        display.clear_overlay();
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_overlay_written_off_runtime_thread() {
        let path = std::env::temp_dir().join(format!("overlay-async-{}.png", std::process::id()));
        let display = TerminalDisplay::new(Some(path.clone()));

        display.resize_overlay(4, 4);
        display.draw_overlay(&RgbImage::from_pixel(4, 4, Rgb([255, 0, 0])));
        display.draw_overlay(&RgbImage::from_pixel(4, 4, Rgb([0, 255, 0])));

        // The newest snapshot lands last.
        let mut latest = None;
        for _ in 0..200 {
            if let Ok(written) = image::open(&path) {
                let pixel = written.to_rgba8().get_pixel(0, 0).0;
                if pixel == [0, 255, 0, 255] {
                    latest = Some(pixel);
                    break;
                }
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        assert_eq!(latest, Some([0, 255, 0, 255]));
        let _ = std::fs::remove_file(path);
    }
}
