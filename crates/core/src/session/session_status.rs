use std::fmt;

use crate::annotation::domain::expression_tally::TallySnapshot;
use crate::capture::domain::capture_state::CaptureState;

/// Model loading progress as shown to the user.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum LoadingStatus {
    #[default]
    NotLoaded,
    Loading,
    Loaded,
    Failed,
}

impl fmt::Display for LoadingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LoadingStatus::NotLoaded => "models not loaded",
            LoadingStatus::Loading => "loading models",
            LoadingStatus::Loaded => "models loaded",
            LoadingStatus::Failed => "model load failed",
        };
        f.write_str(s)
    }
}

/// Everything the shell renders, captured at one instant.
#[derive(Clone, Debug, PartialEq)]
pub struct SessionStatus {
    pub camera: CaptureState,
    pub loading: LoadingStatus,
    pub last_error: Option<String>,
    pub tally: TallySnapshot,
    pub annotating: bool,
    pub recording: bool,
    pub has_artifact: bool,
}

impl SessionStatus {
    /// Which actions the shell should offer in this state.
    pub fn controls(&self) -> ControlAvailability {
        let models_ready = self.loading == LoadingStatus::Loaded;
        ControlAvailability {
            request_access_visible: self.camera.can_request(),
            start_recording_enabled: self.camera.is_ready() && models_ready && !self.recording,
            stop_recording_enabled: self.recording,
            download_enabled: self.has_artifact,
            retry_models_visible: self.loading == LoadingStatus::Failed,
        }
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "camera: {} | {}", self.camera, self.loading)?;
        if self.recording {
            f.write_str(" | recording")?;
        }
        if self.has_artifact {
            f.write_str(" | recording ready")?;
        }
        if let Some(error) = &self.last_error {
            write!(f, " | error: {error}")?;
        }
        Ok(())
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ControlAvailability {
    pub request_access_visible: bool,
    pub start_recording_enabled: bool,
    pub stop_recording_enabled: bool,
    pub download_enabled: bool,
    pub retry_models_visible: bool,
}
