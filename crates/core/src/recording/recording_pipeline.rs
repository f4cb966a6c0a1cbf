use std::path::PathBuf;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use crossbeam_channel::Receiver;
use thiserror::Error;

use crate::annotation::domain::drawing_surface::SharedSurface;
use crate::config::TrackerConfig;

use super::domain::artifact::Artifact;
use super::domain::artifact_sink::ArtifactSink;
use super::domain::codec::{negotiate, NegotiatedCodec};
use super::domain::media_recorder::{
    MediaRecorder, RecorderBackend, RecorderEvent, RecorderOptions, RecorderState,
};
use super::domain::surface_stream::SurfaceStream;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RecordingError {
    #[error("camera is not ready")]
    NotReady,
    #[error("a recording is already in progress")]
    AlreadyActive,
    #[error("no recording is in progress")]
    NotActive,
    #[error("no supported video codec found")]
    UnsupportedCodec,
    #[error("failed to create recorder: {0}")]
    RecorderConstruction(String),
    #[error("no video data was captured")]
    NoDataCaptured,
    #[error("recorder failed: {0}")]
    Encoder(String),
    #[error("failed to save recording: {0}")]
    Save(String),
}

/// Recorder session lifecycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RecordingPhase {
    Idle,
    /// Recorder built, waiting for the stream to settle before encoding.
    Starting { ready_at: Instant },
    Active,
    /// Stop requested, waiting for the final segment.
    Stopping,
}

impl RecordingPhase {
    /// True from start request until the recorder reports it has stopped.
    pub fn is_recording(self) -> bool {
        !matches!(self, RecordingPhase::Idle)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct RecordingSettings {
    pub codec_priority: Vec<String>,
    pub timeslice: Duration,
    pub fps: u32,
    pub stabilization_delay: Duration,
    pub filename_prefix: String,
}

impl RecordingSettings {
    pub fn from_config(config: &TrackerConfig) -> Self {
        Self {
            codec_priority: config.codec_priority.clone(),
            timeslice: config.timeslice(),
            fps: config.recording_fps,
            stabilization_delay: config.stabilization_delay(),
            filename_prefix: config.filename_prefix.clone(),
        }
    }
}

impl Default for RecordingSettings {
    fn default() -> Self {
        Self::from_config(&TrackerConfig::default())
    }
}

struct RecordingSession {
    codec: NegotiatedCodec,
    recorder: Box<dyn MediaRecorder>,
    events: Receiver<RecorderEvent>,
    segments: Vec<Vec<u8>>,
}

/// Turns the drawing surface into a downloadable video.
///
/// State machine `Idle → Starting → Active → Stopping → Idle`, driven by
/// the caller's actions and by recorder events pumped through [`poll`].
/// At most one session exists at a time; its events arrive on a channel
/// created for that session only.
///
/// [`poll`]: RecordingPipeline::poll
pub struct RecordingPipeline {
    backend: Box<dyn RecorderBackend>,
    settings: RecordingSettings,
    phase: RecordingPhase,
    session: Option<RecordingSession>,
    artifact: Option<Artifact>,
    last_error: Option<RecordingError>,
}

impl RecordingPipeline {
    pub fn new(backend: Box<dyn RecorderBackend>, settings: RecordingSettings) -> Self {
        Self {
            backend,
            settings,
            phase: RecordingPhase::Idle,
            session: None,
            artifact: None,
            last_error: None,
        }
    }

    pub fn phase(&self) -> RecordingPhase {
        self.phase
    }

    pub fn is_recording(&self) -> bool {
        self.phase.is_recording()
    }

    pub fn artifact(&self) -> Option<&Artifact> {
        self.artifact.as_ref()
    }

    pub fn has_artifact(&self) -> bool {
        self.artifact.is_some()
    }

    pub fn last_error(&self) -> Option<&RecordingError> {
        self.last_error.as_ref()
    }

    /// Codec of the current session, if any.
    pub fn codec(&self) -> Option<&NegotiatedCodec> {
        self.session.as_ref().map(|s| &s.codec)
    }

    /// Begins a session recording `surface`.
    ///
    /// Encoding starts on the first [`poll`](Self::poll) after the
    /// stabilization delay. Fails without side effects when the camera or
    /// surface is not ready or a session is already running.
    pub fn start_recording(
        &mut self,
        capture_ready: bool,
        surface: &SharedSurface,
        now: Instant,
    ) -> Result<NegotiatedCodec, RecordingError> {
        let stream = SurfaceStream::new(surface.clone(), self.settings.fps);
        let (w, h) = stream.dimensions();
        if !capture_ready || w == 0 || h == 0 {
            return Err(RecordingError::NotReady);
        }
        if self.phase.is_recording() {
            log::warn!("Start requested while a recording is in progress; ignoring");
            return Err(RecordingError::AlreadyActive);
        }

        let backend = &self.backend;
        let Some(codec) = negotiate(&self.settings.codec_priority, |mime| {
            backend.is_type_supported(mime)
        }) else {
            log::warn!("None of {:?} is supported", self.settings.codec_priority);
            self.last_error = Some(RecordingError::UnsupportedCodec);
            return Err(RecordingError::UnsupportedCodec);
        };

        let (events_tx, events_rx) = crossbeam_channel::unbounded();
        let options = RecorderOptions {
            mime_type: codec.mime_type.clone(),
            timeslice: self.settings.timeslice,
        };
        let recorder = match self.backend.create(stream, options, events_tx) {
            Ok(recorder) => recorder,
            Err(e) => {
                let err = RecordingError::RecorderConstruction(e.to_string());
                self.last_error = Some(err.clone());
                return Err(err);
            }
        };

        log::info!("Recording with {} ({w}x{h})", codec.mime_type);
        // A failed start keeps the previous artifact; a new session releases it.
        self.artifact = None;
        self.session = Some(RecordingSession {
            codec: codec.clone(),
            recorder,
            events: events_rx,
            segments: Vec::new(),
        });
        self.phase = RecordingPhase::Starting {
            ready_at: now + self.settings.stabilization_delay,
        };
        self.poll(now);
        Ok(codec)
    }

    /// Requests the recorder to stop. Completion arrives as a `Stopped`
    /// event on a later [`poll`](Self::poll).
    ///
    /// Stopping before encoding began ends the session with
    /// [`RecordingError::NoDataCaptured`].
    pub fn stop_recording(&mut self) -> Result<(), RecordingError> {
        match self.phase {
            RecordingPhase::Active => {
                let Some(session) = self.session.as_mut() else {
                    self.phase = RecordingPhase::Idle;
                    return Err(RecordingError::NotActive);
                };
                if let Err(e) = session.recorder.stop() {
                    let err = RecordingError::Encoder(e.to_string());
                    log::warn!("Recorder stop failed: {e}");
                    self.last_error = Some(err.clone());
                    self.abandon_session();
                    return Err(err);
                }
                self.phase = RecordingPhase::Stopping;
                Ok(())
            }
            RecordingPhase::Starting { .. } => {
                log::info!("Recording stopped before encoding began");
                self.abandon_session();
                self.last_error = Some(RecordingError::NoDataCaptured);
                Err(RecordingError::NoDataCaptured)
            }
            RecordingPhase::Stopping | RecordingPhase::Idle => Err(RecordingError::NotActive),
        }
    }

    /// Advances timers and applies pending recorder events.
    pub fn poll(&mut self, now: Instant) {
        if let RecordingPhase::Starting { ready_at } = self.phase {
            if now >= ready_at {
                self.begin_encoding();
            }
        }
        while let Some(event) = self.next_event() {
            self.handle_event(event);
        }
    }

    /// Blocks until the session has finished stopping, or `timeout` passes.
    ///
    /// Returns `true` when the pipeline is idle.
    pub fn wait_until_idle(&mut self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            self.poll(Instant::now());
            if !self.phase.is_recording() {
                return true;
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return false;
            }
            let Some(session) = self.session.as_ref() else {
                return !self.phase.is_recording();
            };
            let wait = remaining.min(Duration::from_millis(50));
            let received = session.events.recv_timeout(wait);
            if let Ok(event) = received {
                self.handle_event(event);
            }
        }
    }

    /// Saves the artifact through `sink` as `<prefix>-<timestamp_ms>.<ext>`
    /// and releases it.
    ///
    /// Without an artifact this is a no-op returning `Ok(None)`. If saving
    /// fails the artifact is kept so the download can be retried.
    pub fn download_artifact(
        &mut self,
        sink: &mut dyn ArtifactSink,
        timestamp_ms: u128,
    ) -> Result<Option<PathBuf>, RecordingError> {
        let Some(artifact) = self.artifact.as_ref() else {
            return Ok(None);
        };
        let filename = artifact.filename(&self.settings.filename_prefix, timestamp_ms);
        match sink.save(&filename, artifact.data()) {
            Ok(path) => {
                log::info!("Saved recording to {}", path.display());
                self.artifact = None;
                Ok(Some(path))
            }
            Err(e) => {
                let err = RecordingError::Save(e.to_string());
                self.last_error = Some(err.clone());
                Err(err)
            }
        }
    }

    /// Stops any running recorder and drops the session. Used on teardown.
    pub fn shutdown(&mut self) {
        if let Some(session) = self.session.as_mut() {
            if session.recorder.state() == RecorderState::Recording {
                if let Err(e) = session.recorder.stop() {
                    log::warn!("Recorder stop on shutdown failed: {e}");
                }
            }
        }
        self.abandon_session();
    }

    fn begin_encoding(&mut self) {
        let Some(session) = self.session.as_mut() else {
            self.phase = RecordingPhase::Idle;
            return;
        };
        if session.recorder.state() != RecorderState::Inactive {
            log::debug!("Recorder already running; skipping start");
            self.phase = RecordingPhase::Active;
            return;
        }
        match session.recorder.start() {
            Ok(()) => self.phase = RecordingPhase::Active,
            Err(e) => {
                log::warn!("Recorder failed to start: {e}");
                self.last_error = Some(RecordingError::Encoder(e.to_string()));
                self.abandon_session();
            }
        }
    }

    fn next_event(&self) -> Option<RecorderEvent> {
        self.session.as_ref()?.events.try_recv().ok()
    }

    fn handle_event(&mut self, event: RecorderEvent) {
        match event {
            RecorderEvent::Started => {
                log::debug!("Recorder started");
                self.last_error = None;
            }
            RecorderEvent::DataAvailable(data) => {
                if data.is_empty() {
                    log::debug!("Ignoring empty recorder segment");
                } else if let Some(session) = self.session.as_mut() {
                    log::debug!("Recorder segment: {} bytes", data.len());
                    session.segments.push(data);
                }
            }
            RecorderEvent::Error(message) => {
                log::warn!("Recorder error: {message}");
                self.last_error = Some(RecordingError::Encoder(message));
            }
            RecorderEvent::Stopped => self.finish_session(),
        }
    }

    fn finish_session(&mut self) {
        self.phase = RecordingPhase::Idle;
        let Some(session) = self.session.take() else {
            return;
        };
        let segment_count = session.segments.len();
        match Artifact::assemble(session.segments, &session.codec) {
            Some(artifact) => {
                log::info!(
                    "Recording assembled: {} bytes from {segment_count} segments",
                    artifact.len()
                );
                self.artifact = Some(artifact);
            }
            None => {
                log::warn!("Recording stopped with no data");
                self.last_error = Some(RecordingError::NoDataCaptured);
            }
        }
    }

    fn abandon_session(&mut self) {
        self.session = None;
        self.phase = RecordingPhase::Idle;
    }
}

impl Drop for RecordingPipeline {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Milliseconds since the Unix epoch, for artifact filenames.
pub fn unix_millis() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or(0)
}
