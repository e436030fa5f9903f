// SPDX-License-Identifier: GPL-3.0-only

//! Image preprocessing
//!
//! Decode → fit longest edge within the target width → JPEG at the profile
//! quality → base64. The same input and config always yield the same payload.

use crate::backends::camera::RawImage;
use crate::config::ProfileSettings;
use crate::constants::OperatingProfile;
use crate::errors::{PipelineError, PipelineResult};
use crate::media::encode_jpeg;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use image::imageops::FilterType;
use tracing::debug;

/// Resize/re-encode settings
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PreprocessConfig {
    /// Longest output edge in pixels
    pub target_width: u32,
    /// JPEG quality in `0.0..=1.0`
    pub quality: f32,
}

impl PreprocessConfig {
    pub fn for_profile(profile: OperatingProfile) -> Self {
        ProfileSettings::preset(profile).into()
    }
}

impl From<ProfileSettings> for PreprocessConfig {
    fn from(settings: ProfileSettings) -> Self {
        Self {
            target_width: settings.target_width,
            quality: settings.quality,
        }
    }
}

/// Payload ready for upload
///
/// Immutable once produced. The classifier takes it by value, so a payload
/// can be sent at most once.
#[derive(Debug, PartialEq)]
pub struct PreprocessedImage {
    payload: String,
    target_width: u32,
    encoding_quality: f32,
    width: u32,
    height: u32,
}

impl PreprocessedImage {
    /// Base64 of the JPEG bytes
    pub fn payload(&self) -> &str {
        &self.payload
    }

    pub fn target_width(&self) -> u32 {
        self.target_width
    }

    pub fn encoding_quality(&self) -> f32 {
        self.encoding_quality
    }

    /// Output dimensions after resizing
    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn into_payload(self) -> String {
        self.payload
    }
}

/// Output size with the longest edge at most `target`, aspect ratio kept
///
/// Images already within bounds are left alone. The short edge is rounded to
/// the nearest pixel and never drops below one.
pub fn fit_within(width: u32, height: u32, target: u32) -> (u32, u32) {
    let longest = width.max(height);
    if longest <= target || longest == 0 {
        return (width, height);
    }

    let scale = |edge: u32| -> u32 {
        let scaled = (edge as u64 * target as u64 + longest as u64 / 2) / longest as u64;
        (scaled as u32).max(1)
    };

    if width >= height {
        (target, scale(height))
    } else {
        (scale(width), target)
    }
}

/// Stateless preprocessor
#[derive(Debug, Default, Clone, Copy)]
pub struct ImagePreprocessor;

impl ImagePreprocessor {
    pub fn new() -> Self {
        Self
    }

    /// Preprocess synchronously
    pub fn process(
        &self,
        raw: &RawImage,
        config: PreprocessConfig,
    ) -> PipelineResult<PreprocessedImage> {
        if config.target_width == 0 {
            return Err(PipelineError::UnsupportedFormat(
                "target width must be positive".to_string(),
            ));
        }

        let decoded = image::load_from_memory(&raw.data)
            .map_err(|e| PipelineError::UnsupportedFormat(e.to_string()))?;

        let (width, height) = fit_within(decoded.width(), decoded.height(), config.target_width);
        let resized = if (width, height) == (decoded.width(), decoded.height()) {
            decoded.to_rgb8()
        } else {
            decoded
                .resize_exact(width, height, FilterType::Triangle)
                .to_rgb8()
        };

        let jpeg = encode_jpeg(&resized, config.quality)
            .map_err(|e| PipelineError::UnsupportedFormat(format!("JPEG encoding failed: {}", e)))?;
        let payload = STANDARD.encode(&jpeg);

        debug!(
            origin = %raw.origin,
            source_width = decoded.width(),
            source_height = decoded.height(),
            width,
            height,
            jpeg_size = jpeg.len(),
            payload_size = payload.len(),
            "Image preprocessed"
        );

        Ok(PreprocessedImage {
            payload,
            target_width: config.target_width,
            encoding_quality: config.quality,
            width,
            height,
        })
    }

    /// Preprocess on a blocking thread (CPU-bound)
    pub async fn process_async(
        &self,
        raw: RawImage,
        config: PreprocessConfig,
    ) -> PipelineResult<PreprocessedImage> {
        let preprocessor = *self;
        tokio::task::spawn_blocking(move || preprocessor.process(&raw, config))
            .await
            .map_err(|e| PipelineError::UnsupportedFormat(format!("Preprocess task error: {}", e)))?
    }
}
