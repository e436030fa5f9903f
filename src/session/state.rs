// SPDX-License-Identifier: GPL-3.0-only

//! Session state machine
//!
//! ```text
//! Welcome ──start──▶ Ready ──begin──▶ Capturing ──acquired──▶ Busy(id)
//!                      ▲                  │                     │
//!                      │              cancelled             ┌───┴────┐
//!                      │             (restore)           success  failure
//!                      │                                    ▼        ▼
//!                      └────────── reset / next cycle ── Result   Error(kind)
//! ```
//!
//! Every mutator checks that the caller owns the in-flight cycle, so an
//! update from an abandoned cycle is dropped here even if it slipped past
//! the liveness check. The busy indicator is derived from the state and can
//! never disagree with it.

use crate::backends::camera::RawImage;
use crate::backends::permissions::PermissionStatus;
use crate::constants::OperatingProfile;
use crate::errors::{ErrorKind, PipelineError};
use crate::pipelines::inference::{CaptureRequest, CaptureSource, InferenceResult};
use chrono::{DateTime, Local};
use tracing::{debug, info};
use uuid::Uuid;

/// What the interface renders
#[derive(Debug, Clone)]
pub enum SessionState {
    /// Initial screen, left once on explicit start
    Welcome,
    Ready,
    /// Waiting for the shutter or the picker
    Capturing,
    /// Request with this id is being preprocessed or classified
    Busy(Uuid),
    Result(InferenceResult),
    Error(ErrorKind),
}

impl SessionState {
    pub fn name(&self) -> &'static str {
        match self {
            SessionState::Welcome => "Welcome",
            SessionState::Ready => "Ready",
            SessionState::Capturing => "Capturing",
            SessionState::Busy(_) => "Busy",
            SessionState::Result(_) => "Result",
            SessionState::Error(_) => "Error",
        }
    }

    /// A cycle holds the camera in these states
    pub fn is_in_flight(&self) -> bool {
        matches!(self, SessionState::Capturing | SessionState::Busy(_))
    }

    pub fn result(&self) -> Option<&InferenceResult> {
        match self {
            SessionState::Result(result) => Some(result),
            _ => None,
        }
    }

    pub fn error_kind(&self) -> Option<ErrorKind> {
        match self {
            SessionState::Error(kind) => Some(*kind),
            _ => None,
        }
    }
}

/// How a cycle was triggered
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// One explicit shutter press or gallery pick
    SingleShot,
    /// Driven by the loop controller
    Continuous,
}

impl Mode {
    /// Preprocessing profile for cycles in this mode
    pub fn profile(&self) -> OperatingProfile {
        match self {
            Mode::SingleShot => OperatingProfile::Interactive,
            Mode::Continuous => OperatingProfile::Continuous,
        }
    }
}

/// Camera permission as seen by the interface
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CameraPermission {
    /// Not answered yet; nothing is rendered
    #[default]
    Pending,
    Granted,
    Denied,
}

impl From<PermissionStatus> for CameraPermission {
    fn from(status: PermissionStatus) -> Self {
        match status {
            PermissionStatus::Granted => CameraPermission::Granted,
            PermissionStatus::Denied => CameraPermission::Denied,
        }
    }
}

/// Last image shown to the user
#[derive(Debug, Clone)]
pub struct Preview {
    pub source: CaptureSource,
    pub image: RawImage,
    pub captured_at: DateTime<Local>,
}

impl Preview {
    pub fn from_request(request: &CaptureRequest) -> Self {
        Self {
            source: request.source,
            image: request.raw.clone(),
            captured_at: request.captured_at,
        }
    }
}

/// The single mutable session state
#[derive(Debug, Clone)]
pub struct SessionStateMachine {
    state: SessionState,
    preview: Option<Preview>,
    last_result: Option<InferenceResult>,
    camera_permission: CameraPermission,
    /// State to go back to when a capture is cancelled or abandoned
    resume: Option<SessionState>,
    /// Liveness id of the cycle currently holding the camera
    in_flight: Option<u64>,
    revision: u64,
}

impl Default for SessionStateMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionStateMachine {
    pub fn new() -> Self {
        Self {
            state: SessionState::Welcome,
            preview: None,
            last_result: None,
            camera_permission: CameraPermission::Pending,
            resume: None,
            in_flight: None,
            revision: 0,
        }
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn preview(&self) -> Option<&Preview> {
        self.preview.as_ref()
    }

    /// Most recent successful result, kept through later failures
    pub fn last_result(&self) -> Option<&InferenceResult> {
        self.last_result.as_ref()
    }

    pub fn camera_permission(&self) -> CameraPermission {
        self.camera_permission
    }

    pub fn is_loading(&self) -> bool {
        self.state.is_in_flight()
    }

    pub fn in_flight(&self) -> Option<u64> {
        self.in_flight
    }

    /// Bumped on every applied mutation
    pub fn revision(&self) -> u64 {
        self.revision
    }

    fn transition(&mut self, next: SessionState) {
        debug!(from = self.state.name(), to = next.name(), "Session state transition");
        self.state = next;
        self.revision += 1;
    }

    fn owns(&self, owner: u64) -> bool {
        self.in_flight == Some(owner)
    }

    pub fn set_camera_permission(&mut self, status: PermissionStatus) {
        self.camera_permission = status.into();
        self.revision += 1;
        info!(permission = ?self.camera_permission, "Camera permission answered");
    }

    /// Leave the welcome screen; needs camera permission
    pub fn start(&mut self) -> bool {
        if !matches!(self.state, SessionState::Welcome) {
            return false;
        }
        if self.camera_permission != CameraPermission::Granted {
            debug!(permission = ?self.camera_permission, "Cannot start without camera permission");
            return false;
        }
        self.transition(SessionState::Ready);
        true
    }

    /// Claim the camera for a new cycle
    ///
    /// Ignored (returns false) while another cycle is in flight or before
    /// the session has started.
    pub fn begin_capture(&mut self, owner: u64) -> bool {
        if let Some(current) = self.in_flight {
            debug!(owner, current, "Capture ignored, a cycle is already in flight");
            return false;
        }
        match self.state {
            SessionState::Ready | SessionState::Result(_) | SessionState::Error(_) => {}
            _ => {
                debug!(state = self.state.name(), "Capture ignored in this state");
                return false;
            }
        }

        self.resume = Some(self.state.clone());
        if !matches!(self.state, SessionState::Ready) {
            self.transition(SessionState::Ready);
        }
        self.in_flight = Some(owner);
        self.transition(SessionState::Capturing);
        true
    }

    /// Image is in hand; camera shots become the preview right away
    pub fn image_acquired(&mut self, owner: u64, request_id: Uuid, preview: Option<Preview>) -> bool {
        if !self.owns(owner) || !matches!(self.state, SessionState::Capturing) {
            return false;
        }
        if let Some(preview) = preview {
            self.preview = Some(preview);
        }
        self.transition(SessionState::Busy(request_id));
        true
    }

    /// Classifier answered for `request_id`
    pub fn inference_succeeded(
        &mut self,
        owner: u64,
        request_id: Uuid,
        result: InferenceResult,
        preview: Option<Preview>,
    ) -> bool {
        if !self.owns(owner) || !matches!(self.state, SessionState::Busy(id) if id == request_id) {
            return false;
        }
        if let Some(preview) = preview {
            self.preview = Some(preview);
        }
        self.in_flight = None;
        self.resume = None;
        self.last_result = Some(result.clone());
        self.transition(SessionState::Result(result));
        true
    }

    /// The cycle failed at any stage
    ///
    /// A cancelled pick or a refused gallery permission puts the previous
    /// state back. Every other failure becomes `Error(kind)`. The preview is
    /// left untouched either way.
    pub fn cycle_failed(&mut self, owner: u64, error: &PipelineError) -> bool {
        if !self.owns(owner) {
            return false;
        }
        self.in_flight = None;
        let resume = self.resume.take().unwrap_or(SessionState::Ready);

        match error.kind() {
            ErrorKind::UserCancelled | ErrorKind::PermissionDenied => self.transition(resume),
            kind => self.transition(SessionState::Error(kind)),
        }
        true
    }

    /// Drop the claim of a cycle that will never be applied
    pub fn abandon(&mut self, owner: u64) -> bool {
        if !self.owns(owner) {
            return false;
        }
        self.in_flight = None;
        let resume = self.resume.take().unwrap_or(SessionState::Ready);
        if self.state.is_in_flight() {
            self.transition(resume);
        }
        true
    }

    /// Back to `Ready` with preview and result cleared
    pub fn reset(&mut self) -> bool {
        match self.state {
            SessionState::Ready | SessionState::Result(_) | SessionState::Error(_) => {}
            _ => return false,
        }
        self.preview = None;
        self.last_result = None;
        self.transition(SessionState::Ready);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const OWNER: u64 = 7;

    fn started() -> SessionStateMachine {
        let mut machine = SessionStateMachine::new();
        machine.set_camera_permission(PermissionStatus::Granted);
        assert!(machine.start());
        machine
    }

    fn preview(source: CaptureSource) -> Preview {
        Preview {
            source,
            image: RawImage::new(vec![1, 2, 3], "test"),
            captured_at: Local::now(),
        }
    }

    fn result(label: &str, confidence: f64) -> InferenceResult {
        InferenceResult::new(label, confidence).unwrap()
    }

    #[test]
    fn test_start_requires_permission() {
        let mut machine = SessionStateMachine::new();
        assert!(!machine.start());

        machine.set_camera_permission(PermissionStatus::Denied);
        assert!(!machine.start());
        assert!(matches!(machine.state(), SessionState::Welcome));

        machine.set_camera_permission(PermissionStatus::Granted);
        assert!(machine.start());
        // Welcome is left for good
        assert!(!machine.start());
        assert!(matches!(machine.state(), SessionState::Ready));
    }

    #[test]
    fn test_full_cycle() {
        let mut machine = started();
        let id = Uuid::new_v4();

        assert!(machine.begin_capture(OWNER));
        assert!(machine.is_loading());
        assert!(machine.image_acquired(OWNER, id, Some(preview(CaptureSource::Camera))));
        assert!(matches!(machine.state(), SessionState::Busy(busy) if *busy == id));
        assert!(machine.is_loading());

        assert!(machine.inference_succeeded(OWNER, id, result("A", 0.92), None));
        assert!(!machine.is_loading());
        assert_eq!(machine.state().result().unwrap().label(), "A");
        assert_eq!(machine.last_result().unwrap().label(), "A");
        assert_eq!(machine.in_flight(), None);
    }

    #[test]
    fn test_reentrant_capture_ignored() {
        let mut machine = started();
        assert!(machine.begin_capture(OWNER));
        let revision = machine.revision();
        assert!(!machine.begin_capture(OWNER + 1));
        assert!(!machine.begin_capture(OWNER));
        assert_eq!(machine.revision(), revision);
    }

    #[test]
    fn test_stale_owner_ignored() {
        let mut machine = started();
        let id = Uuid::new_v4();
        machine.begin_capture(OWNER);
        assert!(!machine.image_acquired(OWNER + 1, id, None));
        machine.image_acquired(OWNER, id, None);
        // Wrong request id
        assert!(!machine.inference_succeeded(OWNER, Uuid::new_v4(), result("A", 0.5), None));
        assert!(!machine.cycle_failed(OWNER + 1, &PipelineError::ServerError(500)));
        assert!(matches!(machine.state(), SessionState::Busy(_)));
    }

    #[test]
    fn test_cancel_restores_previous_state() {
        let mut machine = started();
        let id = Uuid::new_v4();
        machine.begin_capture(OWNER);
        machine.image_acquired(OWNER, id, None);
        machine.inference_succeeded(OWNER, id, result("A", 0.92), Some(preview(CaptureSource::Gallery)));

        assert!(machine.begin_capture(OWNER));
        assert!(machine.cycle_failed(OWNER, &PipelineError::UserCancelled));
        assert_eq!(machine.state().result().unwrap().label(), "A");
        assert!(machine.preview().is_some());
        assert_eq!(machine.in_flight(), None);
    }

    #[test]
    fn test_error_keeps_preview_and_last_result() {
        let mut machine = started();
        let first = Uuid::new_v4();
        machine.begin_capture(OWNER);
        machine.image_acquired(OWNER, first, Some(preview(CaptureSource::Camera)));
        machine.inference_succeeded(OWNER, first, result("A", 0.92), None);

        machine.begin_capture(OWNER);
        machine.image_acquired(OWNER, Uuid::new_v4(), None);
        machine.cycle_failed(OWNER, &PipelineError::NetworkError("timeout".into()));

        assert_eq!(machine.state().error_kind(), Some(ErrorKind::NetworkError));
        assert!(machine.preview().is_some());
        assert_eq!(machine.last_result().unwrap().label(), "A");
        assert!(!machine.is_loading());
    }

    #[test]
    fn test_gallery_preview_only_on_success() {
        let mut machine = started();
        machine.begin_capture(OWNER);
        machine.image_acquired(OWNER, Uuid::new_v4(), None);
        machine.cycle_failed(OWNER, &PipelineError::ServerError(503));
        assert!(machine.preview().is_none());
        assert_eq!(machine.state().error_kind(), Some(ErrorKind::ServerError(503)));
    }

    #[test]
    fn test_next_cycle_leaves_error() {
        let mut machine = started();
        machine.begin_capture(OWNER);
        machine.cycle_failed(OWNER, &PipelineError::DeviceNotReady);
        assert_eq!(machine.state().error_kind(), Some(ErrorKind::DeviceNotReady));

        assert!(machine.begin_capture(OWNER));
        assert!(matches!(machine.state(), SessionState::Capturing));
    }

    #[test]
    fn test_reset_is_idempotent() {
        let mut machine = started();
        let id = Uuid::new_v4();
        machine.begin_capture(OWNER);
        machine.image_acquired(OWNER, id, Some(preview(CaptureSource::Camera)));
        machine.inference_succeeded(OWNER, id, result("B", 0.45), None);

        assert!(machine.reset());
        assert!(machine.reset());
        assert!(matches!(machine.state(), SessionState::Ready));
        assert!(machine.preview().is_none());
        assert!(machine.last_result().is_none());
    }

    #[test]
    fn test_reset_ignored_in_flight() {
        let mut machine = started();
        machine.begin_capture(OWNER);
        assert!(!machine.reset());
        assert!(matches!(machine.state(), SessionState::Capturing));
    }

    #[test]
    fn test_abandon_releases_claim() {
        let mut machine = started();
        machine.begin_capture(OWNER);
        machine.image_acquired(OWNER, Uuid::new_v4(), None);
        assert!(machine.abandon(OWNER));
        assert!(matches!(machine.state(), SessionState::Ready));
        assert!(!machine.abandon(OWNER));
        assert!(machine.begin_capture(OWNER + 1));
    }

    #[test]
    fn test_mode_profiles() {
        assert_eq!(Mode::SingleShot.profile(), OperatingProfile::Interactive);
        assert_eq!(Mode::Continuous.profile(), OperatingProfile::Continuous);
    }
}
