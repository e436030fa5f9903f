// SPDX-License-Identifier: GPL-3.0-only

//! Still-image camera
//!
//! Serves the same image file for every shot, re-encoded at the requested
//! capture quality. Used for headless runs and demos where no capture
//! hardware is present.

use super::{BackendError, BackendResult, CaptureDevice, RawImage};
use crate::constants::file_formats;
use crate::media::encode_jpeg;
use futures::future::BoxFuture;
use image::RgbImage;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info};

enum StillSource {
    File(PathBuf),
    Memory(Arc<RgbImage>),
}

/// Capture device backed by a single image
pub struct StillImageCamera {
    name: String,
    source: StillSource,
    frame: Option<Arc<RgbImage>>,
}

impl StillImageCamera {
    /// Camera that loads `path` when opened
    pub fn from_file(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        Self {
            name: path.display().to_string(),
            source: StillSource::File(path),
            frame: None,
        }
    }

    /// Camera serving an in-memory frame
    pub fn from_image(name: impl Into<String>, image: RgbImage) -> Self {
        Self {
            name: name.into(),
            source: StillSource::Memory(Arc::new(image)),
            frame: None,
        }
    }

    async fn load(&self) -> BackendResult<Arc<RgbImage>> {
        match &self.source {
            StillSource::Memory(image) => Ok(Arc::clone(image)),
            StillSource::File(path) => {
                let extension = path
                    .extension()
                    .and_then(|e| e.to_str())
                    .unwrap_or_default();
                if !file_formats::is_image_extension(extension) {
                    return Err(BackendError::FormatNotSupported(format!(
                        "Unsupported file format: {}",
                        extension
                    )));
                }

                let bytes = tokio::fs::read(path)
                    .await
                    .map_err(|e| BackendError::DeviceNotFound(format!("{}: {}", path.display(), e)))?;

                tokio::task::spawn_blocking(move || {
                    image::load_from_memory(&bytes)
                        .map(|img| Arc::new(img.to_rgb8()))
                        .map_err(|e| BackendError::FormatNotSupported(e.to_string()))
                })
                .await
                .map_err(|e| BackendError::Other(format!("Decode task error: {}", e)))?
            }
        }
    }
}

impl CaptureDevice for StillImageCamera {
    fn name(&self) -> &str {
        &self.name
    }

    fn open(&mut self) -> BoxFuture<'_, BackendResult<()>> {
        Box::pin(async move {
            let frame = self.load().await?;
            info!(
                camera = %self.name,
                width = frame.width(),
                height = frame.height(),
                "Still-image camera ready"
            );
            self.frame = Some(frame);
            Ok(())
        })
    }

    fn is_ready(&self) -> bool {
        self.frame.is_some()
    }

    fn take_picture(&mut self, quality: f32) -> BoxFuture<'_, BackendResult<RawImage>> {
        Box::pin(async move {
            let frame = self.frame.clone().ok_or(BackendError::NotReady)?;
            let origin = self.name.clone();

            let data = tokio::task::spawn_blocking(move || {
                encode_jpeg(&frame, quality)
                    .map_err(|e| BackendError::CaptureFailed(format!("JPEG encoding failed: {}", e)))
            })
            .await
            .map_err(|e| BackendError::Other(format!("Encoding task error: {}", e)))??;

            debug!(camera = %origin, size = data.len(), "Still picture taken");
            Ok(RawImage::new(data, origin))
        })
    }

    fn close(&mut self) {
        self.frame = None;
    }
}
