use std::path::PathBuf;
use std::sync::{Arc, PoisonError};
use std::time::Instant;

use thiserror::Error;

use crate::annotation::annotation_loop::{AnnotationLoop, LoopSettings};
use crate::annotation::domain::drawing_surface::{DrawingSurface, SharedSurface};
use crate::annotation::domain::expression_tally::{ExpressionTally, SharedTally};
use crate::annotation::domain::face_annotator::FaceAnnotator;
use crate::annotation::loop_logger::{LoopLogger, SummaryLoopLogger};
use crate::annotation::poll_handle::PollHandle;
use crate::capture::capture_source::CaptureSource;
use crate::capture::domain::camera_device::CameraDevice;
use crate::capture::domain::capture_state::CameraError;
use crate::capture::domain::video_source::VideoSource;
use crate::config::TrackerConfig;
use crate::detection::domain::detection_provider::DetectionProvider;
use crate::detection::model_loader::{load_models_with_retry, ModelLoadError, RetryPolicy};
use crate::recording::domain::artifact_sink::ArtifactSink;
use crate::recording::domain::codec::NegotiatedCodec;
use crate::recording::domain::media_recorder::RecorderBackend;
use crate::recording::recording_pipeline::{
    unix_millis, RecordingError, RecordingPipeline, RecordingSettings,
};

use super::session_status::{LoadingStatus, SessionStatus};

#[derive(Error, Debug)]
pub enum SessionError {
    #[error(transparent)]
    Camera(#[from] CameraError),
    #[error(transparent)]
    Models(#[from] ModelLoadError),
    #[error(transparent)]
    Recording(#[from] RecordingError),
    #[error("face models are not loaded")]
    ModelsNotLoaded,
    #[error("camera is not ready")]
    CameraNotReady,
}

/// The collaborators a session is wired to.
pub struct SessionPorts {
    pub camera: Box<dyn CameraDevice>,
    pub provider: Box<dyn DetectionProvider>,
    pub annotator: Arc<dyn FaceAnnotator>,
    pub recorder: Box<dyn RecorderBackend>,
    pub sink: Box<dyn ArtifactSink>,
}

/// Facade the UI shell drives: one method per user action plus a status
/// snapshot for rendering.
///
/// Every failure is reported to the caller and also kept as the single
/// latest error message. Recording failures never stop capture or
/// annotation.
pub struct TrackerSession {
    config: TrackerConfig,
    capture: CaptureSource,
    /// Present while no annotation loop owns it.
    provider: Option<Box<dyn DetectionProvider>>,
    loading: LoadingStatus,
    annotator: Arc<dyn FaceAnnotator>,
    surface: SharedSurface,
    tally: SharedTally,
    poll: Option<PollHandle>,
    recording: RecordingPipeline,
    sink: Box<dyn ArtifactSink>,
    last_error: Option<String>,
    seen_recording_error: Option<RecordingError>,
}

impl TrackerSession {
    pub fn new(config: TrackerConfig, ports: SessionPorts) -> Self {
        let loading = if ports.provider.is_loaded() {
            LoadingStatus::Loaded
        } else {
            LoadingStatus::NotLoaded
        };
        let recording = RecordingPipeline::new(ports.recorder, RecordingSettings::from_config(&config));
        Self {
            config,
            capture: CaptureSource::new(ports.camera),
            provider: Some(ports.provider),
            loading,
            annotator: ports.annotator,
            surface: DrawingSurface::shared(0, 0),
            tally: ExpressionTally::shared(),
            poll: None,
            recording,
            sink: ports.sink,
            last_error: None,
            seen_recording_error: None,
        }
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    /// The surface annotated frames are drawn onto.
    pub fn surface(&self) -> SharedSurface {
        self.surface.clone()
    }

    pub fn status(&self) -> SessionStatus {
        SessionStatus {
            camera: self.capture.state(),
            loading: self.loading,
            last_error: self.last_error.clone(),
            tally: self
                .tally
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .snapshot(),
            annotating: self.poll.as_ref().is_some_and(PollHandle::is_running),
            recording: self.recording.is_recording(),
            has_artifact: self.recording.has_artifact(),
        }
    }

    /// Asks for the camera. Any running loop is stopped first because its
    /// video is about to be released.
    pub fn request_camera_access(&mut self) -> Result<(), SessionError> {
        self.stop_annotation();
        match self.capture.request_access() {
            Ok(_) => {
                self.last_error = None;
                Ok(())
            }
            Err(e) => Err(self.fail(e.into())),
        }
    }

    /// Loads the detection models with bounded retry. Calling it again
    /// after a failure is the manual retry.
    pub fn load_models(&mut self) -> Result<(), SessionError> {
        let Some(provider) = self.provider.as_mut() else {
            // A running loop holds the provider, so its models are loaded.
            return Ok(());
        };
        self.loading = LoadingStatus::Loading;
        let policy = RetryPolicy {
            max_attempts: self.config.model_load_attempts,
            backoff: self.config.model_load_backoff(),
        };
        match load_models_with_retry(provider.as_mut(), &policy) {
            Ok(()) => {
                self.loading = LoadingStatus::Loaded;
                Ok(())
            }
            Err(e) => {
                self.loading = LoadingStatus::Failed;
                Err(self.fail(e.into()))
            }
        }
    }

    /// Starts the annotation loop on the current video. No-op if running.
    pub fn start_annotation(&mut self) -> Result<(), SessionError> {
        if self.poll.as_ref().is_some_and(PollHandle::is_running) {
            return Ok(());
        }
        self.stop_annotation();

        if self.loading != LoadingStatus::Loaded {
            return Err(self.fail(SessionError::ModelsNotLoaded));
        }
        let Some(video) = self.capture.video() else {
            return Err(self.fail(SessionError::CameraNotReady));
        };
        let Some(provider) = self.provider.take() else {
            return Err(self.fail(SessionError::ModelsNotLoaded));
        };

        let logger: Box<dyn LoopLogger> = Box::new(SummaryLoopLogger::default());
        let annotation_loop = AnnotationLoop::new(
            video,
            provider,
            self.surface.clone(),
            self.tally.clone(),
            self.annotator.clone(),
            logger,
            LoopSettings::from_config(&self.config),
        );
        self.poll = Some(annotation_loop.spawn());
        Ok(())
    }

    /// Cancels the annotation loop and takes the provider back.
    pub fn stop_annotation(&mut self) {
        if let Some(mut poll) = self.poll.take() {
            match poll.cancel() {
                Some(provider) => self.provider = Some(provider),
                None => {
                    // The worker died with the provider; models must be reloaded.
                    self.loading = LoadingStatus::NotLoaded;
                }
            }
        }
    }

    pub fn start_recording(&mut self) -> Result<NegotiatedCodec, SessionError> {
        if self.loading != LoadingStatus::Loaded {
            return Err(self.fail(SessionError::ModelsNotLoaded));
        }
        let ready = self.capture.state().is_ready();
        match self.recording.start_recording(ready, &self.surface, Instant::now()) {
            Ok(codec) => {
                self.seen_recording_error = self.recording.last_error().cloned();
                Ok(codec)
            }
            Err(e) => Err(self.fail_recording(e)),
        }
    }

    pub fn stop_recording(&mut self) -> Result<(), SessionError> {
        self.recording
            .stop_recording()
            .map_err(|e| self.fail_recording(e))
    }

    pub fn reset_tally(&mut self) {
        self.tally
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .reset();
    }

    /// Saves and releases the artifact. `Ok(None)` when there is none.
    pub fn download_artifact(&mut self) -> Result<Option<PathBuf>, SessionError> {
        self.recording
            .download_artifact(self.sink.as_mut(), unix_millis())
            .map_err(|e| self.fail_recording(e))
    }

    /// Blocks until a stopping recording has been assembled, up to `timeout`.
    pub fn wait_for_recording(&mut self, timeout: std::time::Duration) -> bool {
        let idle = self.recording.wait_until_idle(timeout);
        self.sync_recording_error();
        idle
    }

    /// Drives timers and events. Call regularly from the shell's loop.
    ///
    /// Reclaims the provider from a loop that stopped on its own (video
    /// paused or ended) and starts annotation once camera and models are
    /// both ready.
    pub fn poll(&mut self) {
        self.recording.poll(Instant::now());
        self.sync_recording_error();

        if self.poll.as_ref().is_some_and(|p| !p.is_running()) {
            log::debug!("Annotation loop ended; reclaiming provider");
            self.stop_annotation();
        }
        // A paused or ended video ends the cycle; only a new access request restarts it.
        let video_live = self
            .capture
            .video()
            .is_some_and(|v| !v.is_ended() && !v.is_paused());
        if self.poll.is_none() && video_live && self.loading == LoadingStatus::Loaded {
            if let Err(e) = self.start_annotation() {
                log::warn!("Could not start annotation: {e}");
            }
        }
    }

    /// Cancels polling, stops recording, and releases the camera.
    pub fn shutdown(&mut self) {
        self.stop_annotation();
        self.recording.shutdown();
        self.capture.release();
    }

    fn sync_recording_error(&mut self) {
        let current = self.recording.last_error().cloned();
        if current != self.seen_recording_error {
            if let Some(e) = &current {
                self.last_error = Some(e.to_string());
            }
            self.seen_recording_error = current;
        }
    }

    fn fail_recording(&mut self, e: RecordingError) -> SessionError {
        self.seen_recording_error = self.recording.last_error().cloned();
        self.fail(e.into())
    }

    fn fail(&mut self, e: SessionError) -> SessionError {
        self.last_error = Some(e.to_string());
        e
    }
}

impl Drop for TrackerSession {
    fn drop(&mut self) {
        self.shutdown();
    }
}
