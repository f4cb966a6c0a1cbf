use std::sync::Arc;

use super::domain::camera_device::CameraDevice;
use super::domain::capture_state::{CameraError, CaptureState};
use super::domain::video_source::VideoSource;

/// Owns camera access and the live signal it produces.
///
/// Only one signal is held at a time: a new access request, `release`, or
/// dropping the source stops the previous signal's tracks first.
pub struct CaptureSource {
    device: Box<dyn CameraDevice>,
    state: CaptureState,
    video: Option<Arc<dyn VideoSource>>,
    last_error: Option<CameraError>,
}

impl CaptureSource {
    pub fn new(device: Box<dyn CameraDevice>) -> Self {
        Self {
            device,
            state: CaptureState::Uninitialized,
            video: None,
            last_error: None,
        }
    }

    pub fn state(&self) -> CaptureState {
        self.state
    }

    pub fn video(&self) -> Option<Arc<dyn VideoSource>> {
        self.video.clone()
    }

    pub fn last_error(&self) -> Option<&CameraError> {
        self.last_error.as_ref()
    }

    /// Asks the platform for the camera.
    ///
    /// On failure the state becomes `Denied` or `Errored` and the classified
    /// cause is kept for display. No automatic retry.
    pub fn request_access(&mut self) -> Result<Arc<dyn VideoSource>, CameraError> {
        self.release();
        self.state = CaptureState::Requesting;

        match self.device.open() {
            Ok(video) => {
                let (w, h) = video.dimensions();
                log::info!("Camera ready ({w}x{h})");
                self.state = CaptureState::Ready;
                self.last_error = None;
                self.video = Some(video.clone());
                Ok(video)
            }
            Err(e) => {
                log::warn!("Camera access failed: {e}");
                self.state = e.resulting_state();
                self.last_error = Some(e.clone());
                Err(e)
            }
        }
    }

    /// Stops the live signal, if any. Failure states are left untouched.
    pub fn release(&mut self) {
        if let Some(video) = self.video.take() {
            video.stop();
            log::debug!("Camera released");
        }
        if self.state == CaptureState::Ready {
            self.state = CaptureState::Uninitialized;
        }
    }
}

impl Drop for CaptureSource {
    fn drop(&mut self) {
        self.release();
    }
}
