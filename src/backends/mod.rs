// SPDX-License-Identifier: GPL-3.0-only

//! Collaborators at the edge of the pipeline
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │               ImageAcquirer                  │
//! └──────────┬──────────────────┬───────────────┘
//!            │                  │
//! ┌──────────┴───────┐  ┌───────┴──────────┐
//! │      Camera      │  │     Gallery      │
//! │ (V4L2 / still)   │  │ (file dialog)    │
//! └──────────────────┘  └──────────────────┘
//! ```
//!
//! - [`camera`]: capture devices with an explicit ready signal
//! - [`gallery`]: permission-gated image picker
//! - [`permissions`]: camera/gallery permission providers

pub mod camera;
pub mod gallery;
pub mod permissions;
