// SPDX-License-Identifier: GPL-3.0-only

//! JPEG encoding

use image::RgbImage;

/// Map a `0.0..=1.0` quality to the encoder's `1..=100` scale
pub fn jpeg_quality(quality: f32) -> u8 {
    (quality.clamp(0.0, 1.0) * 100.0).round().max(1.0) as u8
}

/// Encode an RGB image as JPEG
pub fn encode_jpeg(image: &RgbImage, quality: f32) -> Result<Vec<u8>, image::ImageError> {
    let mut buffer = Vec::new();
    let mut cursor = std::io::Cursor::new(&mut buffer);

    let mut encoder =
        image::codecs::jpeg::JpegEncoder::new_with_quality(&mut cursor, jpeg_quality(quality));

    encoder.encode(
        image.as_raw(),
        image.width(),
        image.height(),
        image::ExtendedColorType::Rgb8,
    )?;

    Ok(buffer)
}
