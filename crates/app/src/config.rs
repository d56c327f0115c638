//! Application configuration
//!
//! Layers, lowest to highest precedence: built-in defaults, the TOML/YAML/JSON
//! file, then `DROWSY__SECTION__KEY` environment variables.

use std::path::PathBuf;

use alerting::AlertConfig;
use capture_controller::ControllerConfig;
use detect_client::ServerConfig;
use serde::Deserialize;

/// Config file looked up when none is given
pub const DEFAULT_CONFIG_NAME: &str = "drowsy-client";

/// Environment variable prefix
pub const ENV_PREFIX: &str = "DROWSY";

/// Which camera source to open
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CameraKind {
    #[default]
    TestPattern,
    Still,
    V4l2,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CameraSettings {
    pub source: CameraKind,
    /// Image file for `still`, device node for `v4l2`
    pub path: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct DisplaySettings {
    /// Mirror the overlay to this PNG file
    pub overlay_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive, overridden by `RUST_LOG`
    pub level: String,
    /// Emit JSON lines instead of human-readable output
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub capture: ControllerConfig,
    pub camera: CameraSettings,
    pub alert: AlertConfig,
    pub display: DisplaySettings,
    pub logging: LoggingConfig,
    /// Start detection as soon as the client is up
    pub auto_start: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            capture: ControllerConfig::default(),
            camera: CameraSettings::default(),
            alert: AlertConfig::default(),
            display: DisplaySettings::default(),
            logging: LoggingConfig::default(),
            auto_start: true,
        }
    }
}

impl AppConfig {
    /// Load configuration
    ///
    /// An explicit `path` must exist; the default file is optional.
    pub fn load(path: Option<&str>) -> Result<Self, config::ConfigError> {
        let file = match path {
            Some(path) => config::File::with_name(path),
            None => config::File::with_name(DEFAULT_CONFIG_NAME).required(false),
        };

        let settings = config::Config::builder()
            .add_source(file)
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        settings.try_deserialize()
    }
}
