// SPDX-License-Identifier: GPL-3.0-only

//! Integration tests for constants module

use sign_camera::constants::display::{self, ConfidenceTone};
use sign_camera::constants::{OperatingProfile, file_formats};

#[test]
fn test_operating_profiles() {
    assert_eq!(OperatingProfile::ALL.len(), 2);
    assert_eq!(OperatingProfile::Interactive.target_width(), 224);
    assert_eq!(OperatingProfile::Interactive.quality(), 0.7);
    assert_eq!(OperatingProfile::Continuous.target_width(), 256);
    assert_eq!(OperatingProfile::Continuous.quality(), 1.0);
}

#[test]
fn test_profile_display_names() {
    for profile in OperatingProfile::ALL {
        assert!(!profile.display_name().is_empty());
    }
}

#[test]
fn test_confidence_threshold_is_strict() {
    let threshold = display::CONFIDENCE_POSITIVE_PERCENT;
    assert_eq!(display::confidence_tone(0.92, threshold), ConfidenceTone::Positive);
    assert_eq!(display::confidence_tone(0.45, threshold), ConfidenceTone::Negative);
    assert_eq!(display::confidence_tone(0.70, threshold), ConfidenceTone::Negative);
    assert_eq!(display::confidence_tone(0.701, threshold), ConfidenceTone::Positive);
    assert_eq!(display::confidence_tone(0.700000001, threshold), ConfidenceTone::Positive);
}

#[test]
fn test_accuracy_format() {
    assert_eq!(display::format_accuracy(0.92), "Accuracy: 92.0%");
    assert_eq!(display::format_accuracy(0.0), "Accuracy: 0.0%");
    assert_eq!(display::format_accuracy(1.0), "Accuracy: 100.0%");
}

#[test]
fn test_image_extensions() {
    assert!(file_formats::is_image_extension("JPG"));
    assert!(file_formats::is_image_extension("png"));
    assert!(!file_formats::is_image_extension("mp4"));
}
