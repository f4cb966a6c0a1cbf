use std::fmt;

use thiserror::Error;

/// Camera access lifecycle.
///
/// `Uninitialized → Requesting → Ready | Denied | Errored`; a failed state
/// may go back to `Requesting` when the user asks again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CaptureState {
    #[default]
    Uninitialized,
    Requesting,
    Ready,
    Denied,
    Errored,
}

impl CaptureState {
    pub fn is_ready(self) -> bool {
        self == CaptureState::Ready
    }

    /// Whether the shell should offer a (re)request-access action.
    pub fn can_request(self) -> bool {
        matches!(
            self,
            CaptureState::Uninitialized | CaptureState::Denied | CaptureState::Errored
        )
    }
}

impl fmt::Display for CaptureState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CaptureState::Uninitialized => "not requested",
            CaptureState::Requesting => "requesting",
            CaptureState::Ready => "ready",
            CaptureState::Denied => "denied",
            CaptureState::Errored => "error",
        };
        f.write_str(s)
    }
}

/// Classified camera access failure.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CameraError {
    #[error("camera permission denied; allow camera access and try again")]
    PermissionDenied,
    #[error("no camera found; connect a camera and try again")]
    NotFound,
    #[error("camera is in use by another application")]
    Unavailable,
    #[error("could not access camera: {0}")]
    Other(String),
}

impl CameraError {
    /// State the capture source settles in after this failure.
    pub fn resulting_state(&self) -> CaptureState {
        match self {
            CameraError::PermissionDenied => CaptureState::Denied,
            _ => CaptureState::Errored,
        }
    }
}
