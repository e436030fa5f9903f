// SPDX-License-Identifier: GPL-3.0-only

//! Gallery pickers
//!
//! A picker either yields one image or reports that the user closed it
//! without choosing. The native dialog runs on a blocking thread so the
//! runtime keeps serving other work while it is open.

use crate::backends::camera::{BackendError, BackendResult, RawImage};
use crate::backends::permissions::PermissionStatus;
use crate::constants::file_formats;
use futures::future::BoxFuture;
use std::path::PathBuf;
use tracing::{debug, info};

/// Result of showing the picker
#[derive(Debug, Clone)]
pub enum PickOutcome {
    Picked(RawImage),
    Cancelled,
}

/// Gallery permission + picker collaborator
pub trait GalleryProvider: Send {
    fn request_permission(&mut self) -> BoxFuture<'_, PermissionStatus>;

    fn pick_image(&mut self) -> BoxFuture<'_, BackendResult<PickOutcome>>;
}

async fn read_picked(path: PathBuf) -> BackendResult<PickOutcome> {
    let data = tokio::fs::read(&path)
        .await
        .map_err(|e| BackendError::IoError(format!("{}: {}", path.display(), e)))?;
    info!(path = %path.display(), size = data.len(), "Gallery image picked");
    Ok(PickOutcome::Picked(RawImage::new(
        data,
        path.display().to_string(),
    )))
}

/// Native file dialog starting in the user's pictures directory
#[derive(Debug, Default)]
pub struct FileDialogGallery {
    start_dir: Option<PathBuf>,
}

impl FileDialogGallery {
    pub fn new() -> Self {
        Self {
            start_dir: dirs::picture_dir(),
        }
    }
}

impl GalleryProvider for FileDialogGallery {
    fn request_permission(&mut self) -> BoxFuture<'_, PermissionStatus> {
        // Desktop file access is governed by the dialog itself
        Box::pin(async { PermissionStatus::Granted })
    }

    fn pick_image(&mut self) -> BoxFuture<'_, BackendResult<PickOutcome>> {
        let start_dir = self.start_dir.clone();
        Box::pin(async move {
            let picked = tokio::task::spawn_blocking(move || {
                let mut dialog = rfd::FileDialog::new()
                    .set_title("Choose a hand sign picture")
                    .add_filter("Images", file_formats::IMAGE_EXTENSIONS);
                if let Some(dir) = start_dir {
                    dialog = dialog.set_directory(dir);
                }
                dialog.pick_file()
            })
            .await
            .map_err(|e| BackendError::Other(format!("Picker task error: {}", e)))?;

            match picked {
                Some(path) => read_picked(path).await,
                None => {
                    debug!("Gallery picker closed without selection");
                    Ok(PickOutcome::Cancelled)
                }
            }
        })
    }
}

/// Picker pre-answered with a path, used by the headless `classify` command
///
/// Yields the path once; later picks report cancellation.
#[derive(Debug)]
pub struct SelectedFileGallery {
    pending: Option<PathBuf>,
    permission: PermissionStatus,
}

impl SelectedFileGallery {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            pending: Some(path.into()),
            permission: PermissionStatus::Granted,
        }
    }

    /// Picker that always reports cancellation
    pub fn empty() -> Self {
        Self {
            pending: None,
            permission: PermissionStatus::Granted,
        }
    }

    pub fn with_permission(mut self, permission: PermissionStatus) -> Self {
        self.permission = permission;
        self
    }
}

impl GalleryProvider for SelectedFileGallery {
    fn request_permission(&mut self) -> BoxFuture<'_, PermissionStatus> {
        let permission = self.permission;
        Box::pin(async move { permission })
    }

    fn pick_image(&mut self) -> BoxFuture<'_, BackendResult<PickOutcome>> {
        let pending = self.pending.take();
        Box::pin(async move {
            match pending {
                Some(path) => read_picked(path).await,
                None => Ok(PickOutcome::Cancelled),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_selected_file_yields_once() {
        let path = std::env::temp_dir().join(format!("sign-camera-{}.jpg", uuid::Uuid::new_v4()));
        std::fs::write(&path, b"not really a jpeg").unwrap();

        let mut gallery = SelectedFileGallery::new(&path);
        match gallery.pick_image().await.unwrap() {
            PickOutcome::Picked(raw) => assert_eq!(raw.len(), 17),
            PickOutcome::Cancelled => panic!("Expected a picked image"),
        }
        assert!(matches!(
            gallery.pick_image().await.unwrap(),
            PickOutcome::Cancelled
        ));
        let _ = std::fs::remove_file(path);
    }

    #[tokio::test]
    async fn test_unreadable_selection_is_io_error() {
        let mut gallery = SelectedFileGallery::new("/nonexistent/sign.png");
        assert!(matches!(
            gallery.pick_image().await,
            Err(BackendError::IoError(_))
        ));
    }
}
