//! Alerting System
//!
//! Tracks the drowsiness alert banner (visibility and page background) and
//! counts alert episodes.

mod manager;

pub use manager::{
    AlertBanner, AlertConfig, AlertError, AlertManager, AlertTransition, Background,
};
