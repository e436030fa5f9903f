// SPDX-License-Identifier: GPL-3.0-only

//! Image acquisition
//!
//! The acquirer is the only owner of the capture device and the gallery
//! picker. It turns one shutter press or pick into a [`CaptureRequest`] and
//! never touches session state itself.

use crate::backends::camera::{CaptureDevice, RawImage};
use crate::backends::gallery::{GalleryProvider, PickOutcome};
use crate::config::Config;
use crate::errors::{PipelineError, PipelineResult};
use chrono::{DateTime, Local};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Where a capture came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CaptureSource {
    /// Live camera shutter
    Camera,
    /// Gallery selection
    Gallery,
}

impl CaptureSource {
    pub fn display_name(&self) -> &'static str {
        match self {
            CaptureSource::Camera => "Camera",
            CaptureSource::Gallery => "Gallery",
        }
    }
}

/// One acquired image, consumed once by the preprocessor
#[derive(Debug)]
pub struct CaptureRequest {
    /// Identifies the in-flight request in `SessionState::Busy`
    pub id: Uuid,
    pub source: CaptureSource,
    pub raw: RawImage,
    pub captured_at: DateTime<Local>,
}

impl CaptureRequest {
    fn new(source: CaptureSource, raw: RawImage) -> Self {
        Self {
            id: Uuid::new_v4(),
            source,
            raw,
            captured_at: Local::now(),
        }
    }
}

/// Exclusive owner of the camera and gallery collaborators
pub struct ImageAcquirer {
    camera: Option<Box<dyn CaptureDevice>>,
    gallery: Option<Box<dyn GalleryProvider>>,
    camera_quality: f32,
}

impl ImageAcquirer {
    /// Acquirer shooting camera pictures at `camera_quality`
    pub fn new(camera_quality: f32) -> Self {
        Self {
            camera: None,
            gallery: None,
            camera_quality,
        }
    }

    /// Acquirer shooting at the configured `camera_capture_quality`
    pub fn from_config(config: &Config) -> Self {
        Self::new(config.camera_capture_quality)
    }

    pub fn with_camera(mut self, camera: Box<dyn CaptureDevice>) -> Self {
        self.camera = Some(camera);
        self
    }

    pub fn with_gallery(mut self, gallery: Box<dyn GalleryProvider>) -> Self {
        self.gallery = Some(gallery);
        self
    }

    pub fn has_camera(&self) -> bool {
        self.camera.is_some()
    }

    pub fn camera_ready(&self) -> bool {
        self.camera.as_ref().is_some_and(|c| c.is_ready())
    }

    /// Open the camera so that it signals ready
    pub async fn prepare_camera(&mut self) -> PipelineResult<()> {
        let camera = self.camera.as_mut().ok_or(PipelineError::DeviceNotReady)?;
        let opened = camera.open().await;
        opened.map_err(|e| {
            warn!(camera = %camera.name(), error = %e, "Camera failed to open");
            PipelineError::CaptureFailed(e.to_string())
        })
    }

    /// Release the camera between sessions
    pub fn release_camera(&mut self) {
        if let Some(camera) = self.camera.as_mut() {
            camera.close();
        }
    }

    /// Acquire one image from `source`
    pub async fn acquire(&mut self, source: CaptureSource) -> PipelineResult<CaptureRequest> {
        let request = match source {
            CaptureSource::Camera => self.acquire_from_camera().await?,
            CaptureSource::Gallery => self.acquire_from_gallery().await?,
        };

        info!(
            request = %request.id,
            source = ?request.source,
            origin = %request.raw.origin,
            size = request.raw.len(),
            "Image acquired"
        );
        Ok(request)
    }

    async fn acquire_from_camera(&mut self) -> PipelineResult<CaptureRequest> {
        let quality = self.camera_quality;
        let camera = self
            .camera
            .as_mut()
            .filter(|c| c.is_ready())
            .ok_or(PipelineError::DeviceNotReady)?;

        let raw = camera.take_picture(quality).await?;
        Ok(CaptureRequest::new(CaptureSource::Camera, raw))
    }

    async fn acquire_from_gallery(&mut self) -> PipelineResult<CaptureRequest> {
        let gallery = self
            .gallery
            .as_mut()
            .ok_or(PipelineError::PermissionDenied)?;

        if !gallery.request_permission().await.is_granted() {
            debug!("Gallery permission denied");
            return Err(PipelineError::PermissionDenied);
        }

        match gallery.pick_image().await? {
            PickOutcome::Picked(raw) => Ok(CaptureRequest::new(CaptureSource::Gallery, raw)),
            PickOutcome::Cancelled => Err(PipelineError::UserCancelled),
        }
    }
}
