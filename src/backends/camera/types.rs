// SPDX-License-Identifier: GPL-3.0-only

//! Shared types for capture backends

use std::sync::Arc;

/// One still image as produced by a capture backend or picker
///
/// The bytes are an encoded image (JPEG, PNG, ...) exactly as the source
/// produced it; decoding happens in the preprocessor.
#[derive(Clone)]
pub struct RawImage {
    /// Encoded image bytes
    pub data: Arc<[u8]>,
    /// Where the image came from (device path or file path), for previews
    pub origin: String,
}

impl RawImage {
    pub fn new(data: impl Into<Arc<[u8]>>, origin: impl Into<String>) -> Self {
        Self {
            data: data.into(),
            origin: origin.into(),
        }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl std::fmt::Debug for RawImage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "RawImage({} bytes from {})", self.data.len(), self.origin)
    }
}

/// A capture device found on the system
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CameraDevice {
    /// Human readable name (V4L2 card name)
    pub name: String,
    /// Device node, e.g. `/dev/video0`
    pub path: String,
}

/// Negotiated capture format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureFormat {
    pub width: u32,
    pub height: u32,
    pub pixel_format: PixelFormat,
}

impl std::fmt::Display for CaptureFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{} {:?}", self.width, self.height, self.pixel_format)
    }
}

/// Pixel formats a capture backend can hand back
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PixelFormat {
    /// Motion JPEG, each buffer is a complete JPEG image
    Mjpeg,
    /// YUYV - Packed 4:2:2 (Y0 U Y1 V interleaved)
    Yuyv,
}

impl PixelFormat {
    /// V4L2 FourCC code
    pub fn fourcc(&self) -> &'static [u8; 4] {
        match self {
            PixelFormat::Mjpeg => b"MJPG",
            PixelFormat::Yuyv => b"YUYV",
        }
    }

    /// Map a FourCC back to a supported format
    pub fn from_fourcc(code: &[u8; 4]) -> Option<Self> {
        match code {
            b"MJPG" => Some(PixelFormat::Mjpeg),
            b"YUYV" => Some(PixelFormat::Yuyv),
            _ => None,
        }
    }
}

/// Result type for backend operations
pub type BackendResult<T> = Result<T, BackendError>;

/// Backend-specific errors
#[derive(Debug, Clone)]
pub enum BackendError {
    /// Camera device not found
    DeviceNotFound(String),
    /// Device was used before it signalled readiness
    NotReady,
    /// Format not supported
    FormatNotSupported(String),
    /// Streaming or hardware failure
    CaptureFailed(String),
    /// General I/O error
    IoError(String),
    /// Other errors
    Other(String),
}

impl std::fmt::Display for BackendError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BackendError::DeviceNotFound(msg) => write!(f, "Device not found: {}", msg),
            BackendError::NotReady => write!(f, "Device not ready"),
            BackendError::FormatNotSupported(msg) => write!(f, "Format not supported: {}", msg),
            BackendError::CaptureFailed(msg) => write!(f, "Capture failed: {}", msg),
            BackendError::IoError(msg) => write!(f, "I/O error: {}", msg),
            BackendError::Other(msg) => write!(f, "Error: {}", msg),
        }
    }
}

impl std::error::Error for BackendError {}

impl From<std::io::Error> for BackendError {
    fn from(err: std::io::Error) -> Self {
        BackendError::IoError(err.to_string())
    }
}

impl From<BackendError> for crate::errors::PipelineError {
    fn from(err: BackendError) -> Self {
        use crate::errors::PipelineError;
        match err {
            BackendError::NotReady => PipelineError::DeviceNotReady,
            other => PipelineError::CaptureFailed(other.to_string()),
        }
    }
}
