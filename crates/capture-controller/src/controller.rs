//! Controller lifecycle: `new → start → stop → dispose`

use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex as StdMutex, MutexGuard};

use alerting::{AlertBanner, AlertManager};
use camera_capture::CameraSource;
use detect_client::DetectionClient;
use display::{ControlState, DisplaySurface};
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::capture::capture_loop;
use crate::{ControllerConfig, ControllerError, CAMERA_ERROR_MESSAGE, DETECTION_ERROR_MESSAGE};

/// One start/stop cycle
struct Session {
    id: Uuid,
    cancel: watch::Sender<bool>,
    task: JoinHandle<()>,
}

/// Why a session is being torn down
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Teardown {
    /// `stop()` / `dispose()` from the owner
    Requested,
    /// The capture task hit a fatal detection error
    Failed(Uuid),
}

/// State shared between the controller and its capture task
pub(crate) struct Shared {
    pub(crate) config: ControllerConfig,
    pub(crate) camera: Mutex<Box<dyn CameraSource>>,
    pub(crate) client: Arc<dyn DetectionClient>,
    pub(crate) display: Arc<dyn DisplaySurface>,
    alerts: StdMutex<AlertManager>,
    /// Held for the whole of `start` and `teardown`
    lifecycle: Mutex<()>,
    session: Mutex<Option<Session>>,
    /// Run flag, observable through [`CaptureController::wait_stopped`]
    running: watch::Sender<bool>,
    /// Set while a tick is capturing/uploading/rendering
    pub(crate) in_flight: AtomicBool,
}

impl Shared {
    pub(crate) fn alerts(&self) -> MutexGuard<'_, AlertManager> {
        self.alerts
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Whether `id` still names the active session
    pub(crate) async fn is_current(&self, id: Uuid) -> bool {
        self.session.lock().await.as_ref().map(|s| s.id) == Some(id)
    }

    /// Fire-and-forget alarm silencing
    pub(crate) fn spawn_stop_beep(&self) -> JoinHandle<()> {
        let client = self.client.clone();
        tokio::spawn(async move {
            match client.stop_beep().await {
                Ok(()) => debug!("Stop beep acknowledged"),
                Err(e) => warn!("Error stopping beep: {}", e),
            }
        })
    }

    /// Tear the session down and reset the UI
    ///
    /// Returns false when `reason` is a failure of a session that is no
    /// longer active (already stopped by its owner, or replaced by a newer
    /// one). Such a call leaves the camera and UI alone.
    pub(crate) async fn teardown(&self, reason: Teardown) -> bool {
        let _lifecycle = self.lifecycle.lock().await;
        let session = {
            let mut slot = self.session.lock().await;
            let stale = match (reason, slot.as_ref()) {
                (Teardown::Failed(id), Some(active)) => active.id != id,
                (Teardown::Failed(_), None) => true,
                (Teardown::Requested, _) => false,
            };
            if stale {
                return false;
            }
            slot.take()
        };

        if let Some(session) = session {
            let _ = session.cancel.send(true);
            match reason {
                Teardown::Requested => {
                    if let Err(e) = session.task.await {
                        if e.is_panic() {
                            error!("Capture task panicked: {}", e);
                        }
                    }
                    info!("Detection session {} stopped", session.id);
                }
                // The capture task has already returned.
                Teardown::Failed(_) => info!("Detection session {} aborted", session.id),
            }
        }

        self.camera.lock().await.release();
        self.display.detach_stream();
        self.display.clear_overlay();
        self.alerts().reset();
        self.display.show_banner(AlertBanner::hidden());
        self.display.set_controls(ControlState::IDLE);
        if let Teardown::Failed(_) = reason {
            self.display.notify(DETECTION_ERROR_MESSAGE);
        }
        self.running.send_replace(false);
        self.spawn_stop_beep();
        true
    }

    /// Fatal tick error: stop everything and tell the user once
    ///
    /// Runs as its own task so that a concurrent `stop()` awaiting the
    /// capture task never waits on this teardown.
    pub(crate) fn fail(self: &Arc<Self>, id: Uuid, err: ControllerError) {
        error!("Error in detection: {}", err);
        let shared = self.clone();
        tokio::spawn(async move {
            if !shared.teardown(Teardown::Failed(id)).await {
                debug!("Session {} already stopped, failure ignored", id);
            }
        });
    }
}

/// Capture loop controller
///
/// At most one session (and so one capture task) exists at a time.
pub struct CaptureController {
    shared: Arc<Shared>,
}

impl CaptureController {
    /// Create an idle controller
    pub fn new(
        config: ControllerConfig,
        alerts: AlertManager,
        camera: Box<dyn CameraSource>,
        client: Arc<dyn DetectionClient>,
        display: Arc<dyn DisplaySurface>,
    ) -> Self {
        info!(
            "Creating capture controller ({} camera, {}x{}, every {} ms)",
            camera.name(),
            config.width,
            config.height,
            config.interval_ms
        );
        display.set_controls(ControlState::IDLE);

        Self {
            shared: Arc::new(Shared {
                config,
                camera: Mutex::new(camera),
                client,
                display,
                alerts: StdMutex::new(alerts),
                lifecycle: Mutex::new(()),
                session: Mutex::new(None),
                running: watch::channel(false).0,
                in_flight: AtomicBool::new(false),
            }),
        }
    }

    /// Start detection
    ///
    /// Opens the camera, sizes the overlay and schedules the capture loop.
    /// Calling it while running does nothing. A camera failure notifies the
    /// user and leaves the controls untouched.
    pub async fn start(&self) -> Result<(), ControllerError> {
        let shared = &self.shared;
        let _lifecycle = shared.lifecycle.lock().await;
        if shared.session.lock().await.is_some() {
            debug!("Detection already running");
            return Ok(());
        }

        let constraints = shared.config.constraints();
        let info = {
            let mut camera = shared.camera.lock().await;
            match camera.open(&constraints).await {
                Ok(info) => info,
                Err(e) => {
                    error!("Error accessing the camera: {}", e);
                    shared.display.notify(CAMERA_ERROR_MESSAGE);
                    return Err(e.into());
                }
            }
        };

        shared.display.attach_stream(&info);
        shared.display.resize_overlay(info.width, info.height);

        shared.display.set_controls(ControlState::RUNNING);

        let id = Uuid::new_v4();
        let (cancel, cancelled) = watch::channel(false);
        let task = tokio::spawn(capture_loop(
            shared.clone(),
            id,
            (info.width, info.height),
            cancelled,
        ));

        info!(
            "Detection session {} started ({}x{} from {})",
            id, info.width, info.height, info.label
        );
        *shared.session.lock().await = Some(Session { id, cancel, task });
        shared.running.send_replace(true);
        Ok(())
    }

    /// Stop detection
    ///
    /// Cancels the capture loop (including any in-flight upload), releases
    /// the camera, resets the UI and silences the alarm. Safe to call at any
    /// time.
    pub async fn stop(&self) {
        self.shared.teardown(Teardown::Requested).await;
    }

    /// Silence the server-side alarm without blocking
    ///
    /// Failures are logged only. The returned handle may be dropped.
    pub fn stop_beep(&self) -> JoinHandle<()> {
        self.shared.spawn_stop_beep()
    }

    /// Stop and consume the controller
    pub async fn dispose(self) {
        if self.is_running() {
            self.stop().await;
        }
    }

    /// Check if a session is active
    pub fn is_running(&self) -> bool {
        *self.shared.running.borrow()
    }

    /// Start/stop enablement matching the current session state
    pub fn control_state(&self) -> ControlState {
        if self.is_running() {
            ControlState::RUNNING
        } else {
            ControlState::IDLE
        }
    }

    /// Resolve once no session is active
    pub async fn wait_stopped(&self) {
        let mut running = self.shared.running.subscribe();
        let _ = running.wait_for(|running| !running).await;
    }

    /// Current alert banner
    pub fn banner(&self) -> AlertBanner {
        self.shared.alerts().banner()
    }
}

impl Drop for CaptureController {
    fn drop(&mut self) {
        if let Ok(mut slot) = self.shared.session.try_lock() {
            if let Some(session) = slot.take() {
                let _ = session.cancel.send(true);
                debug!("Detection session {} cancelled on drop", session.id);
            }
        }
    }
}
