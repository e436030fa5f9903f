// SPDX-License-Identifier: GPL-3.0-only

//! Error types for the capture-to-inference pipeline
//!
//! Every failure a cycle can hit maps onto [`PipelineError`]. The session
//! stores the fieldless [`ErrorKind`] projection in its state so the
//! interface (and tests) can match on failures without carrying messages.

use std::fmt;

/// Result type alias for pipeline stages
pub type PipelineResult<T> = Result<T, PipelineError>;

/// Result type alias using AppError
pub type AppResult<T> = Result<T, AppError>;

/// Failure of a single acquire → preprocess → infer cycle
///
/// None of these are fatal to the session; they abort the current cycle only.
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineError {
    /// Gallery or camera permission was not granted
    PermissionDenied,
    /// Camera has not signalled that it is ready for capture
    DeviceNotReady,
    /// Hardware or transport error while taking the picture
    CaptureFailed(String),
    /// Picker closed without a selection
    UserCancelled,
    /// Source bytes could not be decoded as an image
    UnsupportedFormat(String),
    /// Connection failure or timeout talking to the classifier
    NetworkError(String),
    /// Classifier answered with a non-success status
    ServerError(u16),
    /// Classifier answered with a body we refuse to interpret
    InvalidResponse(String),
}

impl PipelineError {
    /// Fieldless kind stored in session state
    pub fn kind(&self) -> ErrorKind {
        match self {
            PipelineError::PermissionDenied => ErrorKind::PermissionDenied,
            PipelineError::DeviceNotReady => ErrorKind::DeviceNotReady,
            PipelineError::CaptureFailed(_) => ErrorKind::CaptureFailed,
            PipelineError::UserCancelled => ErrorKind::UserCancelled,
            PipelineError::UnsupportedFormat(_) => ErrorKind::UnsupportedFormat,
            PipelineError::NetworkError(_) => ErrorKind::NetworkError,
            PipelineError::ServerError(status) => ErrorKind::ServerError(*status),
            PipelineError::InvalidResponse(_) => ErrorKind::InvalidResponse,
        }
    }
}

/// Error kind without payload, carried by `SessionState::Error`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    PermissionDenied,
    DeviceNotReady,
    CaptureFailed,
    UserCancelled,
    UnsupportedFormat,
    NetworkError,
    ServerError(u16),
    InvalidResponse,
}

impl ErrorKind {
    /// Short description for status lines
    pub fn display_name(&self) -> &'static str {
        match self {
            ErrorKind::PermissionDenied => "Permission denied",
            ErrorKind::DeviceNotReady => "Camera not ready",
            ErrorKind::CaptureFailed => "Capture failed",
            ErrorKind::UserCancelled => "Cancelled",
            ErrorKind::UnsupportedFormat => "Unsupported image format",
            ErrorKind::NetworkError => "Network error",
            ErrorKind::ServerError(_) => "Server error",
            ErrorKind::InvalidResponse => "Invalid response",
        }
    }
}

/// Configuration errors
#[derive(Debug, Clone)]
pub enum ConfigError {
    /// Config file could not be read or written
    Io(String),
    /// Config file is not valid JSON for [`crate::config::Config`]
    Parse(String),
    /// A value is outside its allowed range
    Invalid(String),
}

/// Main application error type
#[derive(Debug, Clone)]
pub enum AppError {
    /// Pipeline errors escaping a one-off command
    Pipeline(PipelineError),
    /// Configuration errors
    Config(ConfigError),
    /// Terminal or filesystem errors
    Io(String),
    /// Generic error with message
    Other(String),
}

impl fmt::Display for PipelineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineError::PermissionDenied => write!(f, "Permission denied"),
            PipelineError::DeviceNotReady => write!(f, "Camera device is not ready"),
            PipelineError::CaptureFailed(msg) => write!(f, "Capture failed: {}", msg),
            PipelineError::UserCancelled => write!(f, "Selection cancelled"),
            PipelineError::UnsupportedFormat(msg) => write!(f, "Unsupported format: {}", msg),
            PipelineError::NetworkError(msg) => write!(f, "Network error: {}", msg),
            PipelineError::ServerError(status) => write!(f, "Server error: HTTP {}", status),
            PipelineError::InvalidResponse(msg) => write!(f, "Invalid response: {}", msg),
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::ServerError(status) => write!(f, "Server error (HTTP {})", status),
            other => write!(f, "{}", other.display_name()),
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Io(msg) => write!(f, "Config I/O error: {}", msg),
            ConfigError::Parse(msg) => write!(f, "Config parse error: {}", msg),
            ConfigError::Invalid(msg) => write!(f, "Invalid config: {}", msg),
        }
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Pipeline(e) => write!(f, "{}", e),
            AppError::Config(e) => write!(f, "{}", e),
            AppError::Io(msg) => write!(f, "I/O error: {}", msg),
            AppError::Other(msg) => write!(f, "{}", msg),
        }
    }
}

impl std::error::Error for PipelineError {}
impl std::error::Error for ConfigError {}
impl std::error::Error for AppError {}

impl From<PipelineError> for AppError {
    fn from(err: PipelineError) -> Self {
        AppError::Pipeline(err)
    }
}

impl From<ConfigError> for AppError {
    fn from(err: ConfigError) -> Self {
        AppError::Config(err)
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Io(err.to_string())
    }
}

impl From<String> for AppError {
    fn from(msg: String) -> Self {
        AppError::Other(msg)
    }
}

impl From<&str> for AppError {
    fn from(msg: &str) -> Self {
        AppError::Other(msg.to_string())
    }
}

impl From<std::io::Error> for ConfigError {
    fn from(err: std::io::Error) -> Self {
        ConfigError::Io(err.to_string())
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(err: serde_json::Error) -> Self {
        ConfigError::Parse(err.to_string())
    }
}

impl From<reqwest::Error> for PipelineError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            PipelineError::InvalidResponse(err.to_string())
        } else if let Some(status) = err.status() {
            PipelineError::ServerError(status.as_u16())
        } else {
            // Timeouts, refused connections, TLS and body transport failures
            PipelineError::NetworkError(err.to_string())
        }
    }
}
