//! Alert Manager Implementation

use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, info};

/// Alert configuration errors
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AlertError {
    #[error("Invalid warning color {0:?}, expected #rrggbb")]
    InvalidColor(String),
}

/// Alert configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertConfig {
    /// Page background while the alert is shown (default: #ff0000)
    pub warning_color: String,
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            warning_color: "#ff0000".to_string(),
        }
    }
}

impl AlertConfig {
    /// Parse `warning_color` into RGB
    pub fn warning_rgb(&self) -> Result<[u8; 3], AlertError> {
        let invalid = || AlertError::InvalidColor(self.warning_color.clone());
        let hex = self.warning_color.strip_prefix('#').ok_or_else(invalid)?;
        if hex.len() != 6 || !hex.is_ascii() {
            return Err(invalid());
        }

        let mut rgb = [0u8; 3];
        for (i, channel) in rgb.iter_mut().enumerate() {
            *channel = u8::from_str_radix(&hex[i * 2..i * 2 + 2], 16).map_err(|_| invalid())?;
        }
        Ok(rgb)
    }
}

/// Page background behind the video
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Background {
    /// No override
    #[default]
    Normal,
    /// Full-viewport warning color
    Warning([u8; 3]),
}

/// What the alert banner should look like
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AlertBanner {
    pub visible: bool,
    pub background: Background,
}

impl AlertBanner {
    /// Hidden banner, default background
    pub fn hidden() -> Self {
        Self::default()
    }

    /// Visible banner over the warning background
    pub fn raised(color: [u8; 3]) -> Self {
        Self {
            visible: true,
            background: Background::Warning(color),
        }
    }
}

/// Result of feeding a drowsy flag to the manager
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertTransition {
    /// Alert just became visible
    Raised,
    /// Alert was visible and is now hidden
    Cleared,
    /// No visible change
    Unchanged,
}

/// Alert manager for the drowsiness banner
pub struct AlertManager {
    warning_rgb: [u8; 3],
    banner: AlertBanner,
    /// Start of the current alert episode
    raised_at: Option<Instant>,
    /// Number of alert episodes since the last reset
    episodes: usize,
}

impl AlertManager {
    /// Create a new alert manager
    pub fn new(config: AlertConfig) -> Result<Self, AlertError> {
        let warning_rgb = config.warning_rgb()?;
        info!("Creating alert manager with config: {:?}", config);
        Ok(Self {
            warning_rgb,
            banner: AlertBanner::hidden(),
            raised_at: None,
            episodes: 0,
        })
    }

    /// Apply the drowsy flag of one detection result
    pub fn update(&mut self, drowsy: bool) -> AlertTransition {
        match (drowsy, self.banner.visible) {
            (true, false) => {
                self.banner = AlertBanner::raised(self.warning_rgb);
                self.raised_at = Some(Instant::now());
                self.episodes += 1;
                metrics::counter!("drowsy_alerts_total").increment(1);
                info!("Drowsiness alert raised (episode {})", self.episodes);
                AlertTransition::Raised
            }
            (false, true) => {
                let duration = self.episode_duration().unwrap_or_default();
                self.banner = AlertBanner::hidden();
                self.raised_at = None;
                info!("Drowsiness alert cleared after {:?}", duration);
                AlertTransition::Cleared
            }
            _ => {
                debug!("Alert state unchanged (drowsy: {})", drowsy);
                AlertTransition::Unchanged
            }
        }
    }

    /// Hide the banner without counting it as a cleared episode
    pub fn reset(&mut self) {
        self.banner = AlertBanner::hidden();
        self.raised_at = None;
    }

    /// Current banner
    pub fn banner(&self) -> AlertBanner {
        self.banner
    }

    /// How long the current alert has been visible
    pub fn episode_duration(&self) -> Option<Duration> {
        self.raised_at.map(|t| t.elapsed())
    }

    /// Alert episodes so far
    pub fn episodes(&self) -> usize {
        self.episodes
    }
}

impl Default for AlertManager {
    fn default() -> Self {
        Self {
            warning_rgb: [0xFF, 0x00, 0x00],
            banner: AlertBanner::hidden(),
            raised_at: None,
            episodes: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_warning_color_is_red() {
        assert_eq!(AlertConfig::default().warning_rgb(), Ok([255, 0, 0]));
    }

    #[test]
    fn test_invalid_colors_rejected() {
        for color in ["ff0000", "#ff00", "#gg0000", "#ff0000ff"] {
            let config = AlertConfig {
                warning_color: color.to_string(),
            };
            assert!(AlertManager::new(config).is_err(), "{} accepted", color);
        }
    }

    #[test]
    fn test_drowsy_raises_alert() {
        let mut manager = AlertManager::default();

        assert_eq!(manager.update(true), AlertTransition::Raised);
        let banner = manager.banner();
        assert!(banner.visible);
        assert_eq!(banner.background, Background::Warning([255, 0, 0]));
        assert!(manager.episode_duration().is_some());
    }

    #[test]
    fn test_alert_clears_and_restores_background() {
        let mut manager = AlertManager::default();
        manager.update(true);

        assert_eq!(manager.update(false), AlertTransition::Cleared);
        assert_eq!(manager.banner(), AlertBanner::hidden());
        assert_eq!(manager.banner().background, Background::Normal);
    }

    #[test]
    fn test_repeated_flags_are_unchanged() {
        let mut manager = AlertManager::default();
        assert_eq!(manager.update(false), AlertTransition::Unchanged);

        manager.update(true);
        assert_eq!(manager.update(true), AlertTransition::Unchanged);
        assert_eq!(manager.episodes(), 1);
    }

    #[test]
    fn test_episodes_counted() {
        let mut manager = AlertManager::default();
        for _ in 0..3 {
            manager.update(true);
            manager.update(false);
        }
        assert_eq!(manager.episodes(), 3);
    }

    #[test]
    fn test_reset_hides_banner() {
        let mut manager = AlertManager::default();
        manager.update(true);
        manager.reset();

        assert!(!manager.banner().visible);
        assert!(manager.episode_duration().is_none());
        assert_eq!(manager.episodes(), 1);
    }

    #[test]
    fn test_config_deserializes_with_defaults() {
        let config: AlertConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config.warning_color, "#ff0000");
    }
}
