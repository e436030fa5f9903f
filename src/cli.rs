// SPDX-License-Identifier: GPL-3.0-only

//! CLI commands
//!
//! This module provides command-line functionality for:
//! - Listing capture devices
//! - Classifying a single picture
//! - Running the continuous capture loop until Ctrl+C

use sign_camera::backends::camera::{
    CaptureDevice, StillImageCamera, V4l2Camera, enumerate_cameras,
};
use sign_camera::backends::gallery::SelectedFileGallery;
use sign_camera::backends::permissions::{
    DeviceNodePermission, PermissionProvider, StaticPermission,
};
use sign_camera::errors::{AppError, AppResult, PipelineError};
use sign_camera::pipelines::inference::{CaptureSource, ImageAcquirer, InferenceClient};
use sign_camera::session::{CycleOutcome, LoopConfig, LoopController, Session, SessionSnapshot};
use sign_camera::Config;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// How often `watch` looks for a new result to print
const WATCH_POLL_MS: u64 = 50;

/// List V4L2 capture devices
pub fn list_cameras() -> AppResult<()> {
    let cameras = enumerate_cameras();

    if cameras.is_empty() {
        println!("No cameras found.");
        return Ok(());
    }

    println!("Available cameras:");
    println!();
    for (index, camera) in cameras.iter().enumerate() {
        println!("  [{}] {}", index, camera.name);
        println!("      Device: {}", camera.path);
    }

    Ok(())
}

/// Classify one picture as if it had been picked from the gallery
pub fn classify(image: PathBuf, config: Config) -> AppResult<()> {
    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(classify_picture(image, config))
}

async fn classify_picture(image: PathBuf, config: Config) -> AppResult<()> {
    let classifier = InferenceClient::from_config(&config)?;
    let acquirer = ImageAcquirer::from_config(&config)
        .with_gallery(Box::new(SelectedFileGallery::new(&image)));
    let session = Session::new(acquirer, Arc::new(classifier), &config);

    // No camera is involved
    session.initialize(&mut StaticPermission::granted()).await;
    session.start();

    println!("Classifying {}...", image.display());
    let outcome = session.capture(CaptureSource::Gallery).await;
    session.shutdown().await;

    match outcome {
        CycleOutcome::Completed(result) => {
            println!("{}", result.label());
            println!("{}", result.accuracy_text());
            Ok(())
        }
        CycleOutcome::Failed(e) => Err(AppError::Pipeline(e)),
        other => Err(AppError::Other(format!(
            "Classification did not complete: {:?}",
            other
        ))),
    }
}

/// Run continuous capture, printing each result until Ctrl+C or `cycles`
pub fn watch(
    camera: Option<String>,
    image: Option<PathBuf>,
    interval_ms: Option<u64>,
    cycles: Option<u64>,
    config: Config,
) -> AppResult<()> {
    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(run_watch(camera, image, interval_ms, cycles, config))
}

async fn run_watch(
    camera: Option<String>,
    image: Option<PathBuf>,
    interval_ms: Option<u64>,
    cycles: Option<u64>,
    config: Config,
) -> AppResult<()> {
    let (device, mut permission): (Box<dyn CaptureDevice>, Box<dyn PermissionProvider>) =
        match image {
            Some(path) => {
                println!("Using picture: {}", path.display());
                (
                    Box::new(StillImageCamera::from_file(path)),
                    Box::new(StaticPermission::granted()),
                )
            }
            None => {
                let path = camera.unwrap_or_else(|| config.camera_device.clone());
                println!("Using camera: {}", path);
                (
                    Box::new(V4l2Camera::new(path.clone())),
                    Box::new(DeviceNodePermission::new(path)),
                )
            }
        };

    let classifier = InferenceClient::from_config(&config)?;
    let acquirer = ImageAcquirer::from_config(&config).with_camera(device);
    let session = Session::new(acquirer, Arc::new(classifier), &config);

    if !session.initialize(permission.as_mut()).await.is_granted() {
        return Err(AppError::Pipeline(PipelineError::PermissionDenied));
    }
    session.start();

    let (stop_tx, mut stop_rx) = tokio::sync::watch::channel(false);
    ctrlc::set_handler(move || {
        let _ = stop_tx.send(true);
    })
    .map_err(|e| AppError::Other(format!("Failed to set Ctrl+C handler: {}", e)))?;

    let mut controller = LoopController::new(session.clone());
    controller.start(LoopConfig {
        interval_ms: interval_ms.unwrap_or(config.loop_interval_ms),
        enabled: true,
        max_cycles: cycles,
    });
    println!("Watching... Press Ctrl+C to stop");

    let mut ticker = tokio::time::interval(Duration::from_millis(WATCH_POLL_MS));
    let mut last_revision = 0;
    while controller.is_running() {
        tokio::select! {
            _ = stop_rx.changed() => {
                println!();
                println!("Stopping...");
                controller.stop();
            }
            _ = ticker.tick() => {}
        }
        report(&session.snapshot(), &mut last_revision);
    }

    let summary = controller.wait().await.unwrap_or_default();
    // The last cycle may have landed after the final poll
    report(&session.snapshot(), &mut last_revision);
    session.shutdown().await;

    println!(
        "{} cycles, {} classified, {} failed",
        summary.cycles, summary.successes, summary.failures
    );
    Ok(())
}

/// Print the session's latest result once
fn report(snapshot: &SessionSnapshot, last_revision: &mut u64) {
    if let Some(line) = result_line(snapshot, last_revision) {
        println!("{}", line);
    }
}

/// Line for a result not yet printed
///
/// Failed cycles are skipped; they are already logged by the session.
fn result_line(snapshot: &SessionSnapshot, last_revision: &mut u64) -> Option<String> {
    if snapshot.revision == *last_revision {
        return None;
    }
    *last_revision = snapshot.revision;
    let result = snapshot.state.result()?;
    Some(format!(
        "[{}] {}  {}",
        result.received_at().format("%H:%M:%S"),
        result.label(),
        result.accuracy_text()
    ))
}
