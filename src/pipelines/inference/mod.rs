// SPDX-License-Identifier: GPL-3.0-only

//! Capture-to-inference stages
//!
//! ```text
//! ┌───────────────┐     ┌───────────────────┐     ┌─────────────────┐
//! │ ImageAcquirer │ ──▶ │ ImagePreprocessor │ ──▶ │ InferenceClient │
//! │ camera/picker │     │ resize + JPEG     │     │ POST {"image"}  │
//! │               │     │ + base64          │     │ → label, conf.  │
//! └───────────────┘     └───────────────────┘     └─────────────────┘
//! ```
//!
//! Each stage is a suspension point. The stages know nothing about session
//! state; sequencing and state updates live in [`crate::session`].

pub mod acquire;
pub mod client;
pub mod preprocess;

pub use acquire::{CaptureRequest, CaptureSource, ImageAcquirer};
pub use client::{Classifier, InferenceClient, InferenceResult, parse_response};
pub use preprocess::{ImagePreprocessor, PreprocessConfig, PreprocessedImage, fit_within};
