// SPDX-License-Identifier: GPL-3.0-only

//! V4L2 still capture
//!
//! Opens a `/dev/video*` node, prefers MJPEG (falls back to YUYV), and for
//! each picture starts a short memory-mapped stream, drops a few warm-up
//! frames while exposure settles, and keeps the next one.
//!
//! The opened device handle is owned by the camera between shots and moved
//! into the blocking capture task for the duration of a shot.

use super::format_converters::yuyv_to_rgb;
use super::{
    BackendError, BackendResult, CameraDevice, CaptureDevice, CaptureFormat, PixelFormat, RawImage,
};
use crate::constants::timing;
use crate::media::encode_jpeg;
use futures::future::BoxFuture;
use image::RgbImage;
use std::path::Path;
use tokio::task::JoinError;
use tracing::{debug, info, warn};
use v4l::FourCC;
use v4l::buffer::Type;
use v4l::io::traits::CaptureStream;
use v4l::prelude::*;
use v4l::video::Capture;

/// Number of mmap buffers requested per shot
const STREAM_BUFFERS: u32 = 4;

/// Camera backed by a V4L2 capture node
pub struct V4l2Camera {
    path: String,
    handle: Option<Device>,
    format: Option<CaptureFormat>,
    warmup_frames: u32,
}

impl V4l2Camera {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            handle: None,
            format: None,
            warmup_frames: timing::CAMERA_WARMUP_FRAMES,
        }
    }

    /// Format negotiated by the last successful `open`
    pub fn format(&self) -> Option<CaptureFormat> {
        self.format
    }

    /// The capture task died holding the device handle, which is gone with it
    fn shot_aborted(&mut self, error: JoinError) -> BackendError {
        warn!(device = %self.path, error = %error, "Capture task failed, camera must be reopened");
        self.close();
        BackendError::CaptureFailed(format!("Capture task error: {}", error))
    }
}

impl CaptureDevice for V4l2Camera {
    fn name(&self) -> &str {
        &self.path
    }

    fn open(&mut self) -> BoxFuture<'_, BackendResult<()>> {
        Box::pin(async move {
            let path = self.path.clone();
            let (device, format) = tokio::task::spawn_blocking(move || negotiate(&path))
                .await
                .map_err(|e| BackendError::Other(format!("Open task error: {}", e)))??;

            info!(device = %self.path, format = %format, "V4L2 camera ready");
            self.handle = Some(device);
            self.format = Some(format);
            Ok(())
        })
    }

    fn is_ready(&self) -> bool {
        self.handle.is_some() && self.format.is_some()
    }

    fn take_picture(&mut self, quality: f32) -> BoxFuture<'_, BackendResult<RawImage>> {
        Box::pin(async move {
            let format = self.format.ok_or(BackendError::NotReady)?;
            let mut device = self.handle.take().ok_or(BackendError::NotReady)?;
            let warmup = self.warmup_frames;

            let joined = tokio::task::spawn_blocking(move || {
                let result = grab_picture(&mut device, format, warmup, quality);
                (device, result)
            })
            .await;
            let (device, result) = match joined {
                Ok(shot) => shot,
                Err(e) => return Err(self.shot_aborted(e)),
            };

            self.handle = Some(device);
            let data = result?;
            debug!(device = %self.path, size = data.len(), "V4L2 picture taken");
            Ok(RawImage::new(data, self.path.clone()))
        })
    }

    fn close(&mut self) {
        if self.handle.take().is_some() {
            debug!(device = %self.path, "V4L2 camera released");
        }
        self.format = None;
    }
}

/// Open the node and settle on MJPEG or YUYV at the current resolution
fn negotiate(path: &str) -> BackendResult<(Device, CaptureFormat)> {
    let device = Device::with_path(path)
        .map_err(|e| BackendError::DeviceNotFound(format!("{}: {}", path, e)))?;

    let offered: Vec<[u8; 4]> = device
        .enum_formats()
        .map_err(|e| BackendError::IoError(format!("Failed to enumerate formats: {}", e)))?
        .into_iter()
        .map(|desc| desc.fourcc.repr)
        .collect();

    let wanted = [PixelFormat::Mjpeg, PixelFormat::Yuyv]
        .into_iter()
        .find(|f| offered.contains(f.fourcc()))
        .ok_or_else(|| {
            BackendError::FormatNotSupported(format!("{} offers neither MJPG nor YUYV", path))
        })?;

    let mut format = device
        .format()
        .map_err(|e| BackendError::IoError(format!("Failed to query format: {}", e)))?;
    format.fourcc = FourCC::new(wanted.fourcc());

    let applied = device
        .set_format(&format)
        .map_err(|e| BackendError::FormatNotSupported(format!("Failed to set format: {}", e)))?;

    let pixel_format = PixelFormat::from_fourcc(&applied.fourcc.repr).ok_or_else(|| {
        BackendError::FormatNotSupported(format!("Driver switched to {}", applied.fourcc))
    })?;

    Ok((
        device,
        CaptureFormat {
            width: applied.width,
            height: applied.height,
            pixel_format,
        },
    ))
}

/// Stream briefly and JPEG-encode the first frame after warm-up
fn grab_picture(
    device: &mut Device,
    format: CaptureFormat,
    warmup: u32,
    quality: f32,
) -> BackendResult<Vec<u8>> {
    let mut stream = MmapStream::with_buffers(device, Type::VideoCapture, STREAM_BUFFERS)
        .map_err(|e| BackendError::CaptureFailed(format!("Failed to create buffer stream: {}", e)))?;

    let mut frame = Vec::new();
    for _ in 0..=warmup {
        let (buf, meta) = stream
            .next()
            .map_err(|e| BackendError::CaptureFailed(format!("Failed to dequeue frame: {}", e)))?;
        let used = (meta.bytesused as usize).min(buf.len());
        frame.clear();
        frame.extend_from_slice(&buf[..used]);
    }

    let image = match format.pixel_format {
        PixelFormat::Mjpeg => image::load_from_memory(&frame)
            .map_err(|e| BackendError::CaptureFailed(format!("Corrupt MJPEG frame: {}", e)))?
            .to_rgb8(),
        PixelFormat::Yuyv => {
            let rgb = yuyv_to_rgb(&frame, format.width, format.height);
            RgbImage::from_raw(format.width, format.height, rgb).ok_or_else(|| {
                BackendError::CaptureFailed(format!(
                    "Short YUYV frame: {} bytes for {}",
                    frame.len(),
                    format
                ))
            })?
        }
    };

    encode_jpeg(&image, quality)
        .map_err(|e| BackendError::CaptureFailed(format!("JPEG encoding failed: {}", e)))
}

/// List V4L2 nodes that can capture video
///
/// Scans `/dev/video*` in name order; nodes that cannot be opened or that
/// are metadata-only are skipped.
pub fn enumerate_cameras() -> Vec<CameraDevice> {
    let dev_path = Path::new("/dev");
    let Ok(entries) = std::fs::read_dir(dev_path) else {
        return Vec::new();
    };

    let mut nodes: Vec<_> = entries
        .filter_map(|e| e.ok())
        .filter(|e| e.file_name().to_string_lossy().starts_with("video"))
        .map(|e| e.path())
        .collect();
    nodes.sort();

    let mut cameras = Vec::new();
    for node in nodes {
        let path = node.to_string_lossy().to_string();
        let device = match Device::with_path(&node) {
            Ok(device) => device,
            Err(e) => {
                debug!(device = %path, error = %e, "Skipping unopenable node");
                continue;
            }
        };
        match device.query_caps() {
            Ok(caps) if caps.capabilities.contains(v4l::capability::Flags::VIDEO_CAPTURE) => {
                cameras.push(CameraDevice {
                    name: caps.card,
                    path,
                });
            }
            Ok(_) => debug!(device = %path, "Skipping non-capture node"),
            Err(e) => warn!(device = %path, error = %e, "Failed to query capabilities"),
        }
    }

    cameras
}
