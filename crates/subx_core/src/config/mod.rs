//! Configuration management for SubX.
//!
//! This module provides:
//! - TOML-based configuration with logical sections
//! - Atomic file writes (write to temp, then rename)
//! - Section-level updates (only changed section is modified)
//! - Validation on load with automatic defaults
//!
//! # Example
//!
//! ```no_run
//! use subx_core::config::{ConfigManager, ConfigSection};
//! use subx_core::models::CorrectionLevel;
//!
//! let mut config = ConfigManager::new(".config/settings.toml");
//! config.load_or_create().unwrap();
//!
//! println!("Preferred language: {}", config.settings().extraction.preferred_language);
//!
//! config.settings_mut().correction.level = CorrectionLevel::Thorough;
//! config.update_section(ConfigSection::Correction).unwrap();
//! ```

mod manager;
mod settings;

pub use manager::{ConfigError, ConfigManager, ConfigResult};
pub use settings::{
    CleanupSettings, ConfigSection, CorrectionSettings, ExtractionSettings, LoggingSettings,
    NetworkSettings, PathSettings, Settings, ToolSettings,
};
