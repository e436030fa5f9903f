// SPDX-License-Identifier: GPL-3.0-only

//! Sign Camera - hand-sign classification from camera shots and pictures
//!
//! Captures an image of a hand sign, shrinks it to a small base64 JPEG,
//! sends it to a remote classifier and shows the returned label and
//! confidence.
//!
//! # Architecture
//!
//! - [`backends`]: camera, gallery picker and permission collaborators
//! - [`media`]: JPEG encoding helpers
//! - [`pipelines`]: acquire → preprocess → classify stages
//! - [`session`]: session state machine and the continuous capture loop
//! - [`config`]: user configuration handling
//! - [`terminal`]: ratatui interface over the session state
//!
//! # Example
//!
//! ```ignore
//! // Classify a single picture:
//! // sign-camera classify hand.jpg
//! ```

pub mod backends;
pub mod config;
pub mod constants;
pub mod errors;
pub mod media;
pub mod pipelines;
pub mod session;
pub mod terminal;

// Re-export commonly used types
pub use config::Config;
pub use constants::OperatingProfile;
pub use errors::{AppError, ErrorKind, PipelineError};
pub use pipelines::inference::{CaptureSource, InferenceClient, InferenceResult};
pub use session::{CycleOutcome, LoopConfig, LoopController, Session, SessionState};
