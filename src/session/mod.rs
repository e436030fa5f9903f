// SPDX-License-Identifier: GPL-3.0-only

//! Capture sessions
//!
//! A [`Session`] wires the pipeline stages to the [`SessionStateMachine`]:
//!
//! ```text
//!   capture(source) ─┐            ┌─ LoopController (continuous)
//!                    ▼            ▼
//!              ┌──────────────────────┐
//!              │      run_cycle       │  acquire → preprocess → classify
//!              └──────────┬───────────┘
//!                         │ liveness checked under the state lock
//!                         ▼
//!              ┌──────────────────────┐
//!              │ SessionStateMachine  │ ──▶ snapshot() ──▶ interface
//!              └──────────────────────┘
//! ```
//!
//! The state lock is a plain `std::sync::Mutex` and is never held across an
//! `.await`. The acquirer sits behind an async mutex that a cycle holds from
//! acquisition until its result is in, which makes it the exclusive camera
//! resource.

pub mod liveness;
pub mod loop_controller;
pub mod state;

pub use liveness::Liveness;
pub use loop_controller::{LoopConfig, LoopController, LoopSummary};
pub use state::{CameraPermission, Mode, Preview, SessionState, SessionStateMachine};

use crate::backends::permissions::{PermissionProvider, PermissionStatus};
use crate::config::Config;
use crate::constants::OperatingProfile;
use crate::errors::PipelineError;
use crate::pipelines::inference::{
    CaptureSource, Classifier, ImageAcquirer, ImagePreprocessor, InferenceResult, PreprocessConfig,
};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info, warn};

/// How one cycle ended
#[derive(Debug, Clone)]
pub enum CycleOutcome {
    /// Another cycle held the camera, or the session was not ready
    Skipped,
    Completed(InferenceResult),
    Failed(PipelineError),
    /// Work finished after its owner was revoked; nothing was applied
    Discarded,
}

/// Owned copy of what the interface renders
#[derive(Debug, Clone)]
pub struct SessionSnapshot {
    pub state: SessionState,
    pub preview: Option<Preview>,
    pub last_result: Option<InferenceResult>,
    pub camera_permission: CameraPermission,
    pub loading: bool,
    pub revision: u64,
}

struct SessionInner {
    machine: Mutex<SessionStateMachine>,
    acquirer: tokio::sync::Mutex<ImageAcquirer>,
    classifier: Arc<dyn Classifier>,
    preprocessor: ImagePreprocessor,
    interactive: PreprocessConfig,
    continuous: PreprocessConfig,
    liveness: Liveness,
}

/// Cheap-to-clone handle to one capture session
#[derive(Clone)]
pub struct Session {
    inner: Arc<SessionInner>,
}

impl Session {
    pub fn new(acquirer: ImageAcquirer, classifier: Arc<dyn Classifier>, config: &Config) -> Self {
        Self {
            inner: Arc::new(SessionInner {
                machine: Mutex::new(SessionStateMachine::new()),
                acquirer: tokio::sync::Mutex::new(acquirer),
                classifier,
                preprocessor: ImagePreprocessor::new(),
                interactive: config.profile(OperatingProfile::Interactive).into(),
                continuous: config.profile(OperatingProfile::Continuous).into(),
                liveness: Liveness::new(),
            }),
        }
    }

    fn machine(&self) -> MutexGuard<'_, SessionStateMachine> {
        // The machine never holds a half-applied transition
        self.inner
            .machine
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Apply `update` only while both the session and `owner` are alive
    fn apply<F>(&self, owner: &Liveness, update: F) -> bool
    where
        F: FnOnce(&mut SessionStateMachine) -> bool,
    {
        let mut machine = self.machine();
        if !self.inner.liveness.is_alive() || !owner.is_alive() {
            debug!(owner = owner.id(), "Dropping update from revoked cycle");
            return false;
        }
        update(&mut machine)
    }

    /// Ask for camera permission and, if granted, bring the camera up
    pub async fn initialize(&self, permissions: &mut dyn PermissionProvider) -> PermissionStatus {
        let status = permissions.request_permission().await;
        self.apply(&self.inner.liveness, |machine| {
            machine.set_camera_permission(status);
            true
        });

        if status.is_granted() {
            let mut acquirer = self.inner.acquirer.lock().await;
            if acquirer.has_camera()
                && let Err(e) = acquirer.prepare_camera().await
            {
                // Captures will report DeviceNotReady until the camera opens
                warn!(error = %e, "Camera not ready");
            }
        }
        status
    }

    /// Leave the welcome screen
    pub fn start(&self) -> bool {
        self.apply(&self.inner.liveness, SessionStateMachine::start)
    }

    /// Run one single-shot cycle from `source`
    pub async fn capture(&self, source: CaptureSource) -> CycleOutcome {
        let liveness = self.inner.liveness.clone();
        self.run_cycle(source, Mode::SingleShot, &liveness).await
    }

    /// Clear result and preview; ignored while a cycle is in flight
    pub fn reset(&self) -> bool {
        self.apply(&self.inner.liveness, SessionStateMachine::reset)
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        let machine = self.machine();
        SessionSnapshot {
            state: machine.state().clone(),
            preview: machine.preview().cloned(),
            last_result: machine.last_result().cloned(),
            camera_permission: machine.camera_permission(),
            loading: machine.is_loading(),
            revision: machine.revision(),
        }
    }

    pub fn is_alive(&self) -> bool {
        self.inner.liveness.is_alive()
    }

    /// Revoke `owner` and release anything it had in flight
    ///
    /// Done under the state lock so no update of `owner` can land after
    /// this returns.
    pub(crate) fn revoke(&self, owner: &Liveness) {
        let mut machine = self.machine();
        if owner.revoke() {
            machine.abandon(owner.id());
        }
    }

    /// Tear the session down; later cycle results are dropped
    pub async fn shutdown(&self) {
        self.revoke(&self.inner.liveness);
        self.inner.acquirer.lock().await.release_camera();
        info!("Session shut down");
    }

    /// One acquire → preprocess → classify → update pass
    pub(crate) async fn run_cycle(
        &self,
        source: CaptureSource,
        mode: Mode,
        owner: &Liveness,
    ) -> CycleOutcome {
        let owner_id = owner.id();
        if !self.apply(owner, |machine| machine.begin_capture(owner_id)) {
            return CycleOutcome::Skipped;
        }

        // Held until the cycle resolves, so a cycle abandoned by a restart
        // finishes before the next one touches the camera or the network
        let mut acquirer = self.inner.acquirer.lock().await;
        let request = match acquirer.acquire(source).await {
            Ok(request) => request,
            Err(e) => return self.fail(owner, mode, e),
        };

        let request_id = request.id;
        let preview = Preview::from_request(&request);
        let (camera_preview, gallery_preview) = match request.source {
            CaptureSource::Camera => (Some(preview), None),
            CaptureSource::Gallery => (None, Some(preview)),
        };
        if !self.apply(owner, |machine| machine.image_acquired(owner_id, request_id, camera_preview)) {
            return CycleOutcome::Discarded;
        }

        let config = match mode {
            Mode::SingleShot => self.inner.interactive,
            Mode::Continuous => self.inner.continuous,
        };
        let image = match self.inner.preprocessor.process_async(request.raw, config).await {
            Ok(image) => image,
            Err(e) => return self.fail(owner, mode, e),
        };

        match self.inner.classifier.classify(image).await {
            Ok(result) => {
                let applied = self.apply(owner, |machine| {
                    machine.inference_succeeded(owner_id, request_id, result.clone(), gallery_preview)
                });
                if applied {
                    CycleOutcome::Completed(result)
                } else {
                    debug!(request = %request_id, "Result arrived after cancellation");
                    CycleOutcome::Discarded
                }
            }
            Err(e) => self.fail(owner, mode, e),
        }
    }

    fn fail(&self, owner: &Liveness, mode: Mode, error: PipelineError) -> CycleOutcome {
        let owner_id = owner.id();
        if !self.apply(owner, |machine| machine.cycle_failed(owner_id, &error)) {
            return CycleOutcome::Discarded;
        }
        match mode {
            Mode::SingleShot => debug!(error = %error, "Cycle failed"),
            Mode::Continuous => warn!(error = %error, "Continuous cycle failed"),
        }
        CycleOutcome::Failed(error)
    }
}
