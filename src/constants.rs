// SPDX-License-Identifier: GPL-3.0-only

//! Application-wide constants

use serde::{Deserialize, Serialize};

/// Classifier endpoint used when neither config nor environment override it
pub const DEFAULT_ENDPOINT: &str = "https://flaskapp.angelica.cloud/predict";

/// Environment variable overriding the configured endpoint
pub const ENDPOINT_ENV_VAR: &str = "SIGN_CAMERA_ENDPOINT";

/// Operating profile of a session
///
/// The profile decides how aggressively frames are compressed before upload:
/// single-shot captures favour a small payload, the continuous loop keeps
/// full quality at a slightly larger size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum OperatingProfile {
    /// One cycle per explicit shutter press or gallery pick
    #[default]
    Interactive,
    /// Cycles repeat automatically on a fixed delay
    Continuous,
}

impl OperatingProfile {
    pub const ALL: [OperatingProfile; 2] =
        [OperatingProfile::Interactive, OperatingProfile::Continuous];

    /// Get display name for the profile
    pub fn display_name(&self) -> &'static str {
        match self {
            OperatingProfile::Interactive => "Single shot",
            OperatingProfile::Continuous => "Continuous",
        }
    }

    /// Longest output edge in pixels
    pub fn target_width(&self) -> u32 {
        match self {
            OperatingProfile::Interactive => profiles::INTERACTIVE_TARGET_WIDTH,
            OperatingProfile::Continuous => profiles::CONTINUOUS_TARGET_WIDTH,
        }
    }

    /// Re-encoding quality in `0.0..=1.0`
    pub fn quality(&self) -> f32 {
        match self {
            OperatingProfile::Interactive => profiles::INTERACTIVE_QUALITY,
            OperatingProfile::Continuous => profiles::CONTINUOUS_QUALITY,
        }
    }
}

/// Preprocessing presets
pub mod profiles {
    /// Single-shot output width
    pub const INTERACTIVE_TARGET_WIDTH: u32 = 224;

    /// Single-shot JPEG quality
    pub const INTERACTIVE_QUALITY: f32 = 0.7;

    /// Continuous loop output width
    pub const CONTINUOUS_TARGET_WIDTH: u32 = 256;

    /// Continuous loop JPEG quality
    pub const CONTINUOUS_QUALITY: f32 = 1.0;

    /// Quality the camera shutter shoots at, before preprocessing
    pub const CAMERA_CAPTURE_QUALITY: f32 = 0.4;
}

/// Timing constants
pub mod timing {
    /// Classifier request timeout
    pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 5_000;

    /// Delay between the end of one continuous cycle and the start of the next
    pub const DEFAULT_LOOP_INTERVAL_MS: u64 = 1_000;

    /// Frames dropped after stream start while exposure settles
    pub const CAMERA_WARMUP_FRAMES: u32 = 3;

    /// Terminal input poll interval (also the redraw cadence)
    pub const TERMINAL_POLL_MS: u64 = 50;

    /// Consecutive loop failures after which each further failure is logged at warn level
    pub const LOOP_FAILURE_WARN_AFTER: u64 = 3;
}

/// Result presentation
pub mod display {
    /// Percent above which a confidence is shown as positive
    pub const CONFIDENCE_POSITIVE_PERCENT: f64 = 70.0;

    /// Colour class for a displayed confidence
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum ConfidenceTone {
        /// Strictly above the threshold (green)
        Positive,
        /// At or below the threshold (red)
        Negative,
    }

    /// Pick the tone for a confidence in `0.0..=1.0`
    ///
    /// Positive when `confidence * 100 > threshold_percent`. The threshold is
    /// scaled down instead of the confidence scaled up, so 0.7 against 70%
    /// stays exactly on the boundary.
    pub fn confidence_tone(confidence: f64, threshold_percent: f64) -> ConfidenceTone {
        if confidence > threshold_percent / 100.0 {
            ConfidenceTone::Positive
        } else {
            ConfidenceTone::Negative
        }
    }

    /// Format a confidence as "Accuracy: 92.0%"
    pub fn format_accuracy(confidence: f64) -> String {
        format!("Accuracy: {:.1}%", confidence * 100.0)
    }
}

/// Supported file formats for gallery picks and still-image cameras
pub mod file_formats {
    /// Supported image file extensions
    pub const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "bmp", "webp"];

    /// Check if a file extension is a supported image format
    pub fn is_image_extension(ext: &str) -> bool {
        IMAGE_EXTENSIONS.contains(&ext.to_lowercase().as_str())
    }
}

/// Application information utilities
pub mod app_info {
    /// Get the application version from build-time environment
    pub fn version() -> &'static str {
        env!("GIT_VERSION")
    }

    /// User-Agent sent to the classifier
    pub fn user_agent() -> String {
        format!("sign-camera/{}", version())
    }
}

#[cfg(test)]
mod tests {
    use super::display::*;
    use super::*;

    #[test]
    fn test_profile_presets() {
        assert_eq!(OperatingProfile::Interactive.target_width(), 224);
        assert_eq!(OperatingProfile::Continuous.target_width(), 256);
        assert_eq!(OperatingProfile::Interactive.quality(), 0.7);
        assert_eq!(OperatingProfile::Continuous.quality(), 1.0);
    }

    #[test]
    fn test_confidence_tone_threshold() {
        assert_eq!(
            confidence_tone(0.92, CONFIDENCE_POSITIVE_PERCENT),
            ConfidenceTone::Positive
        );
        assert_eq!(
            confidence_tone(0.45, CONFIDENCE_POSITIVE_PERCENT),
            ConfidenceTone::Negative
        );
        // Exactly 70% is not above the threshold
        assert_eq!(
            confidence_tone(0.70, CONFIDENCE_POSITIVE_PERCENT),
            ConfidenceTone::Negative
        );
        // Just above the boundary must not round down onto it
        assert_eq!(
            confidence_tone(0.700000001, CONFIDENCE_POSITIVE_PERCENT),
            ConfidenceTone::Positive
        );
    }

    #[test]
    fn test_format_accuracy() {
        assert_eq!(format_accuracy(0.92), "Accuracy: 92.0%");
        assert_eq!(format_accuracy(0.4567), "Accuracy: 45.7%");
    }

    #[test]
    fn test_image_extensions() {
        assert!(file_formats::is_image_extension("JPG"));
        assert!(file_formats::is_image_extension("png"));
        assert!(!file_formats::is_image_extension("mp4"));
    }
}
