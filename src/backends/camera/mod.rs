// SPDX-License-Identifier: GPL-3.0-only

//! Capture device abstraction
//!
//! ```text
//! ┌─────────────────────┐
//! │    ImageAcquirer    │  ← exclusive owner of the device
//! └──────────┬──────────┘
//!            │
//!            ▼
//! ┌─────────────────────┐
//! │ CaptureDevice Trait │  ← open / take_picture / close
//! └──────────┬──────────┘
//!            │
//!      ┌─────┴──────┐
//!      ▼            ▼
//!  ┌───────┐  ┌────────────┐
//!  │ V4L2  │  │ Still image│
//!  └───────┘  └────────────┘
//! ```
//!
//! A device only accepts `take_picture` after `open` succeeded; that is the
//! "camera ready" signal the acquirer checks.

pub mod format_converters;
pub mod still;
pub mod types;
pub mod v4l2;

pub use still::StillImageCamera;
pub use types::*;
pub use v4l2::{V4l2Camera, enumerate_cameras};

use futures::future::BoxFuture;

/// A camera the session can shoot single pictures with
pub trait CaptureDevice: Send {
    /// Name used in logs and previews
    fn name(&self) -> &str;

    /// Open the device and negotiate a format
    ///
    /// Success is the ready signal; until then `take_picture` fails with
    /// [`BackendError::NotReady`].
    fn open(&mut self) -> BoxFuture<'_, BackendResult<()>>;

    /// Whether `open` has succeeded and `close` has not been called since
    fn is_ready(&self) -> bool;

    /// Take one picture, JPEG-encoded at `quality` (`0.0..=1.0`)
    fn take_picture(&mut self, quality: f32) -> BoxFuture<'_, BackendResult<RawImage>>;

    /// Release the device; it must be opened again before the next picture
    fn close(&mut self);
}
