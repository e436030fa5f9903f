// SPDX-License-Identifier: GPL-3.0-only

//! Permission providers
//!
//! On a desktop the camera "permission" is simply whether the device node can
//! be opened read/write by this user; gallery access is always granted. Both
//! sit behind [`PermissionProvider`] so sessions can be driven by doubles.

use futures::future::BoxFuture;
use std::path::PathBuf;
use tracing::{info, warn};

/// Answer from a permission request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermissionStatus {
    Granted,
    Denied,
}

impl PermissionStatus {
    pub fn is_granted(&self) -> bool {
        matches!(self, PermissionStatus::Granted)
    }
}

/// Something that can be asked for access to a resource
pub trait PermissionProvider: Send {
    fn request_permission(&mut self) -> BoxFuture<'_, PermissionStatus>;
}

/// Grants camera access when the device node is readable and writable
pub struct DeviceNodePermission {
    path: PathBuf,
}

impl DeviceNodePermission {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl PermissionProvider for DeviceNodePermission {
    fn request_permission(&mut self) -> BoxFuture<'_, PermissionStatus> {
        Box::pin(async move {
            let path = self.path.clone();
            let opened = tokio::task::spawn_blocking(move || {
                std::fs::OpenOptions::new()
                    .read(true)
                    .write(true)
                    .open(&path)
                    .map(|_| ())
            })
            .await;

            match opened {
                Ok(Ok(())) => {
                    info!(device = %self.path.display(), "Camera access granted");
                    PermissionStatus::Granted
                }
                Ok(Err(e)) => {
                    warn!(device = %self.path.display(), error = %e, "Camera access denied");
                    PermissionStatus::Denied
                }
                Err(e) => {
                    warn!(error = %e, "Permission check task failed");
                    PermissionStatus::Denied
                }
            }
        })
    }
}

/// Fixed answer, for platforms without a permission model and for tests
#[derive(Debug, Clone, Copy)]
pub struct StaticPermission(pub PermissionStatus);

impl StaticPermission {
    pub fn granted() -> Self {
        Self(PermissionStatus::Granted)
    }

    pub fn denied() -> Self {
        Self(PermissionStatus::Denied)
    }
}

impl PermissionProvider for StaticPermission {
    fn request_permission(&mut self) -> BoxFuture<'_, PermissionStatus> {
        let status = self.0;
        Box::pin(async move { status })
    }
}
