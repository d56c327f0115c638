//! Capture task: warm-up, fixed-interval ticks, rendering

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use detect_client::DetectionResult;
use display::decode_annotated;
use tokio::sync::watch;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::controller::Shared;
use crate::ControllerError;

/// Clears the in-flight flag when a tick ends or is cancelled
struct InFlight<'a>(&'a AtomicBool);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Run one session's capture loop until cancelled or a tick fails
pub(crate) async fn capture_loop(
    shared: Arc<Shared>,
    id: Uuid,
    overlay_size: (u32, u32),
    mut cancelled: watch::Receiver<bool>,
) {
    let period = shared.config.interval();
    let start = Instant::now() + shared.config.warmup() + period;
    let mut ticker = time::interval_at(start, period);
    // A slow upload delays the next tick instead of queueing a burst.
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    debug!("Session {} capture loop waiting for first tick", id);

    loop {
        tokio::select! {
            biased;
            _ = cancelled.changed() => break,
            _ = ticker.tick() => {}
        }

        let outcome = tokio::select! {
            biased;
            _ = cancelled.changed() => break,
            outcome = tick(&shared, id, overlay_size) => outcome,
        };

        if let Err(e) = outcome {
            shared.fail(id, e);
            break;
        }
    }

    info!("Session {} capture loop finished", id);
}

/// One capture tick: grab, encode, upload, render
async fn tick(shared: &Shared, id: Uuid, overlay_size: (u32, u32)) -> Result<(), ControllerError> {
    if shared.in_flight.swap(true, Ordering::AcqRel) {
        metrics::counter!("capture_ticks_skipped_total").increment(1);
        debug!("Previous tick still in flight, skipping");
        return Ok(());
    }
    let _in_flight = InFlight(&shared.in_flight);
    metrics::counter!("capture_ticks_total").increment(1);

    let frame = {
        let mut camera = shared.camera.lock().await;
        let (width, _) = camera.video_size();
        if width == 0 {
            debug!("Video dimensions unknown, skipping tick");
            return Ok(());
        }
        match camera.capture_frame().await {
            Ok(frame) => frame,
            Err(e) => {
                warn!("Frame capture failed, skipping tick: {}", e);
                return Ok(());
            }
        }
    };

    let encoded = match frame.encode_jpeg(shared.config.jpeg_quality) {
        Ok(encoded) => encoded,
        Err(e) => {
            warn!("Frame {} could not be encoded: {}", frame.sequence, e);
            return Ok(());
        }
    };

    let result = shared.client.detect(encoded).await?;

    if !shared.is_current(id).await {
        debug!("Discarding detection result for stale session {}", id);
        return Ok(());
    }

    render(shared, &result, overlay_size);
    Ok(())
}

/// Reflect a detection result on the display
fn render(shared: &Shared, result: &DetectionResult, (width, height): (u32, u32)) {
    if let Some(encoded) = result.annotated_image() {
        match decode_annotated(encoded, width, height) {
            Ok(image) => shared.display.draw_overlay(&image),
            Err(e) => warn!("Could not draw annotated frame: {}", e),
        }
    }

    if let Some(top) = result.top_detection() {
        debug!(
            "{} detection(s), top: {} ({:.2})",
            result.detections.len(),
            top.label,
            top.confidence
        );
    }

    let banner = {
        let mut alerts = shared.alerts();
        alerts.update(result.drowsy);
        alerts.banner()
    };
    shared.display.show_banner(banner);
}
