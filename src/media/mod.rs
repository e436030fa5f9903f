// SPDX-License-Identifier: GPL-3.0-only

//! Media utilities shared by capture backends and the inference pipeline
//!
//! - [`jpeg`]: JPEG re-encoding with a `0.0..=1.0` quality knob

pub mod jpeg;

pub use jpeg::{encode_jpeg, jpeg_quality};
