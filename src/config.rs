// SPDX-License-Identifier: GPL-3.0-only

//! Persisted user configuration
//!
//! Stored as JSON under the user's config directory. A missing file yields
//! defaults; a malformed one is logged and replaced by defaults so a bad edit
//! never keeps the application from starting.

use crate::constants::{self, OperatingProfile, display, profiles, timing};
use crate::errors::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Current on-disk format version
pub const CONFIG_VERSION: u32 = 1;

/// Resize/re-encode settings for one operating profile
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProfileSettings {
    /// Longest output edge in pixels
    pub target_width: u32,
    /// JPEG quality in `0.0..=1.0`
    pub quality: f32,
}

impl ProfileSettings {
    /// Built-in preset for a profile
    pub fn preset(profile: OperatingProfile) -> Self {
        Self {
            target_width: profile.target_width(),
            quality: profile.quality(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// On-disk format version
    pub config_version: u32,
    /// Classifier URL receiving `POST {"image": ...}`
    pub endpoint: String,
    /// Upper bound for one classifier round trip
    pub request_timeout_ms: u64,
    /// Single-shot preprocessing
    pub interactive: ProfileSettings,
    /// Continuous loop preprocessing
    pub continuous: ProfileSettings,
    /// Delay between continuous cycles
    pub loop_interval_ms: u64,
    /// V4L2 capture device
    pub camera_device: String,
    /// Quality the shutter shoots at before preprocessing
    pub camera_capture_quality: f32,
    /// Percent above which a result is shown as confident
    pub confidence_threshold_percent: f64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            config_version: CONFIG_VERSION,
            endpoint: constants::DEFAULT_ENDPOINT.to_string(),
            request_timeout_ms: timing::DEFAULT_REQUEST_TIMEOUT_MS,
            interactive: ProfileSettings::preset(OperatingProfile::Interactive),
            continuous: ProfileSettings::preset(OperatingProfile::Continuous),
            loop_interval_ms: timing::DEFAULT_LOOP_INTERVAL_MS,
            camera_device: "/dev/video0".to_string(),
            camera_capture_quality: profiles::CAMERA_CAPTURE_QUALITY,
            confidence_threshold_percent: display::CONFIDENCE_POSITIVE_PERCENT,
        }
    }
}

impl Config {
    /// Default config file location
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("sign-camera").join("config.json"))
    }

    /// Load from the default location, applying the environment override
    pub fn load() -> Self {
        let mut config = match Self::default_path() {
            Some(path) => Self::load_or_default(&path),
            None => {
                debug!("No config directory available, using defaults");
                Self::default()
            }
        };
        config.apply_env_override(std::env::var(constants::ENDPOINT_ENV_VAR).ok());
        config
    }

    /// Load from `path`, falling back to defaults when absent or malformed
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load_from(path) {
            Ok(config) => config,
            Err(ConfigError::Io(msg)) if !path.exists() => {
                debug!(path = %path.display(), %msg, "Config file absent, using defaults");
                Self::default()
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Ignoring unusable config file");
                Self::default()
            }
        }
    }

    /// Strict load from `path`
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&raw)?;
        config.validate()?;
        info!(path = %path.display(), "Loaded config");
        Ok(config)
    }

    /// Write pretty JSON to `path`, creating parent directories
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let raw = serde_json::to_string_pretty(self)?;
        std::fs::write(path, raw)?;
        info!(path = %path.display(), "Saved config");
        Ok(())
    }

    /// Write to the default location
    pub fn save(&self) -> Result<(), ConfigError> {
        let path = Self::default_path()
            .ok_or_else(|| ConfigError::Io("no config directory available".to_string()))?;
        self.save_to(&path)
    }

    /// Replace the endpoint with a non-empty override
    pub fn apply_env_override(&mut self, endpoint: Option<String>) {
        if let Some(endpoint) = endpoint.filter(|e| !e.trim().is_empty()) {
            debug!(%endpoint, "Endpoint overridden from environment");
            self.endpoint = endpoint;
        }
    }

    /// Check value ranges
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.endpoint.trim().is_empty() {
            return Err(ConfigError::Invalid("endpoint must not be empty".into()));
        }
        for (name, profile) in [
            ("interactive", &self.interactive),
            ("continuous", &self.continuous),
        ] {
            if profile.target_width == 0 {
                return Err(ConfigError::Invalid(format!(
                    "{} target_width must be positive",
                    name
                )));
            }
            if !(0.0..=1.0).contains(&profile.quality) {
                return Err(ConfigError::Invalid(format!(
                    "{} quality {} is outside 0..=1",
                    name, profile.quality
                )));
            }
        }
        if self.request_timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "request_timeout_ms must be positive".into(),
            ));
        }
        if !(0.0..=100.0).contains(&self.confidence_threshold_percent) {
            return Err(ConfigError::Invalid(format!(
                "confidence_threshold_percent {} is outside 0..=100",
                self.confidence_threshold_percent
            )));
        }
        if !(0.0..=1.0).contains(&self.camera_capture_quality) {
            return Err(ConfigError::Invalid(format!(
                "camera_capture_quality {} is outside 0..=1",
                self.camera_capture_quality
            )));
        }
        Ok(())
    }

    /// Preprocessing settings for a profile
    pub fn profile(&self, profile: OperatingProfile) -> ProfileSettings {
        match profile {
            OperatingProfile::Interactive => self.interactive,
            OperatingProfile::Continuous => self.continuous,
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir()
            .join(format!("sign-camera-config-{}", uuid::Uuid::new_v4()))
            .join(name)
    }

    #[test]
    fn test_missing_file_yields_defaults() {
        let path = temp_path("absent.json");
        assert_eq!(Config::load_or_default(&path), Config::default());
    }

    #[test]
    fn test_malformed_file_yields_defaults() {
        let path = temp_path("broken.json");
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "{ not json").unwrap();
        assert!(matches!(Config::load_from(&path), Err(ConfigError::Parse(_))));
        assert_eq!(Config::load_or_default(&path), Config::default());
    }

    #[test]
    fn test_save_then_load() {
        let path = temp_path("config.json");
        let mut config = Config::default();
        config.loop_interval_ms = 250;
        config.endpoint = "http://127.0.0.1:5000/predict".into();
        config.save_to(&path).unwrap();
        assert_eq!(Config::load_from(&path).unwrap(), config);
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let path = temp_path("partial.json");
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, r#"{"loop_interval_ms": 40}"#).unwrap();
        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.loop_interval_ms, 40);
        assert_eq!(config.interactive.target_width, 224);
    }

    #[test]
    fn test_validate_rejects_bad_quality() {
        let mut config = Config::default();
        config.continuous.quality = 1.5;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_validate_rejects_zero_timeout() {
        let mut config = Config::default();
        config.request_timeout_ms = 0;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_validate_rejects_bad_threshold() {
        for threshold in [-1.0, 100.5, f64::NAN] {
            let mut config = Config::default();
            config.confidence_threshold_percent = threshold;
            assert!(
                matches!(config.validate(), Err(ConfigError::Invalid(_))),
                "threshold {} accepted",
                threshold
            );
        }
    }

    #[test]
    fn test_env_override_ignores_blank() {
        let mut config = Config::default();
        config.apply_env_override(Some("  ".into()));
        assert_eq!(config.endpoint, constants::DEFAULT_ENDPOINT);
        config.apply_env_override(Some("http://localhost:9/predict".into()));
        assert_eq!(config.endpoint, "http://localhost:9/predict");
    }
}
