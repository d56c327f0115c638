//! Drowsiness Detection Client
//!
//! Wires the camera, detection service client and terminal display into a
//! capture controller, and drives it from stdin commands.

pub mod command;
pub mod config;

pub use command::Command;
pub use config::{AppConfig, CameraKind, CameraSettings, LoggingConfig};

use std::sync::Arc;

use alerting::AlertManager;
use anyhow::Context;
use camera_capture::{CameraSource, StillImageCamera, TestPatternCamera};
use capture_controller::CaptureController;
use detect_client::HttpDetectionClient;
use display::TerminalDisplay;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Initialize logging
pub fn init_logging(config: &LoggingConfig) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .with_context(|| format!("invalid log filter {:?}", config.level))?;

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);

    let result = if config.json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
    result.map_err(|e| anyhow::anyhow!("failed to set tracing subscriber: {}", e))
}

/// Build the configured camera source
pub fn build_camera(settings: &CameraSettings) -> anyhow::Result<Box<dyn CameraSource>> {
    match settings.source {
        CameraKind::TestPattern => Ok(Box::new(TestPatternCamera::new())),
        CameraKind::Still => {
            let path = settings
                .path
                .as_deref()
                .context("camera.path is required for the still source")?;
            Ok(Box::new(StillImageCamera::new(path)))
        }
        CameraKind::V4l2 => v4l2_camera(settings),
    }
}

#[cfg(feature = "v4l2")]
fn v4l2_camera(settings: &CameraSettings) -> anyhow::Result<Box<dyn CameraSource>> {
    let device = settings
        .path
        .clone()
        .unwrap_or_else(|| "/dev/video0".to_string());
    Ok(Box::new(camera_capture::V4l2Camera::new(device)))
}

#[cfg(not(feature = "v4l2"))]
fn v4l2_camera(_settings: &CameraSettings) -> anyhow::Result<Box<dyn CameraSource>> {
    anyhow::bail!("camera source v4l2 needs a build with the `v4l2` feature")
}

/// Build a controller from configuration
pub fn build_controller(config: &AppConfig) -> anyhow::Result<CaptureController> {
    let camera = build_camera(&config.camera)?;
    let client = HttpDetectionClient::new(&config.server).context("detection client")?;
    let display = TerminalDisplay::new(config.display.overlay_path.clone());
    let alerts = AlertManager::new(config.alert.clone()).context("alert configuration")?;

    Ok(CaptureController::new(
        config.capture.clone(),
        alerts,
        camera,
        Arc::new(client),
        Arc::new(display),
    ))
}

/// Apply one command; returns false on quit
pub async fn handle_command(controller: &CaptureController, command: Command) -> bool {
    match command {
        Command::Start => {
            // The controller already told the user what went wrong.
            if let Err(e) = controller.start().await {
                warn!("Start failed: {}", e);
            }
        }
        Command::Stop => controller.stop().await,
        Command::StopBeep => {
            let _ = controller.stop_beep();
        }
        Command::Quit => return false,
    }
    true
}

/// Run the client until Ctrl-C, `quit`, or end of input
pub async fn run(config: AppConfig) -> anyhow::Result<()> {
    let controller = build_controller(&config)?;

    if config.auto_start {
        handle_command(&controller, Command::Start).await;
    }
    info!("Commands: start, stop, beep, quit");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted");
                break;
            }
            line = lines.next_line(), if stdin_open => {
                match line.context("reading stdin")? {
                    Some(line) if line.trim().is_empty() => {}
                    Some(line) => match line.parse::<Command>() {
                        Ok(command) => {
                            if !handle_command(&controller, command).await {
                                break;
                            }
                        }
                        Err(e) => warn!("{}", e),
                    },
                    None => {
                        info!("Input closed; press Ctrl-C to exit");
                        stdin_open = false;
                    }
                }
            }
        }
    }

    info!("Shutting down");
    controller.dispose().await;
    Ok(())
}
