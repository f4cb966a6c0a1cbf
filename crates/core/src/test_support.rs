//! In-memory fakes for every port, shared by the unit tests.

use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crossbeam_channel::{Receiver, Sender};

use crate::capture::domain::camera_device::CameraDevice;
use crate::capture::domain::capture_state::CameraError;
use crate::capture::domain::video_source::VideoSource;
use crate::detection::domain::detected_face::{DetectedFace, Point};
use crate::detection::domain::detection_provider::{DetectionProvider, DetectorOptions};
use crate::recording::domain::artifact_sink::ArtifactSink;
use crate::recording::domain::media_recorder::{
    MediaRecorder, RecorderBackend, RecorderEvent, RecorderOptions, RecorderState,
};
use crate::recording::domain::surface_stream::SurfaceStream;
use crate::shared::expression::{Expression, ExpressionScores};
use crate::shared::frame::Frame;
use crate::shared::region::Region;

// --- Capture ---

#[derive(Default)]
struct FakeVideoState {
    dims: Mutex<(u32, u32)>,
    paused: AtomicBool,
    ended: AtomicBool,
    stopped: AtomicBool,
    frames: AtomicUsize,
}

/// Video signal with settable dimensions and playback flags.
#[derive(Clone, Default)]
pub struct FakeVideo {
    state: Arc<FakeVideoState>,
}

impl FakeVideo {
    pub fn new(width: u32, height: u32) -> Self {
        let video = Self::default();
        video.set_dimensions(width, height);
        video
    }

    pub fn set_dimensions(&self, width: u32, height: u32) {
        *self.state.dims.lock().unwrap() = (width, height);
    }

    pub fn set_ended(&self, ended: bool) {
        self.state.ended.store(ended, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.state.stopped.load(Ordering::SeqCst)
    }
}

impl VideoSource for FakeVideo {
    fn dimensions(&self) -> (u32, u32) {
        *self.state.dims.lock().unwrap()
    }

    fn current_frame(&self) -> Option<Frame> {
        let (w, h) = self.dimensions();
        if w == 0 || h == 0 {
            return None;
        }
        let index = self.state.frames.fetch_add(1, Ordering::SeqCst);
        Some(Frame::new(vec![128; (w * h * 3) as usize], w, h, index))
    }

    fn is_paused(&self) -> bool {
        self.state.paused.load(Ordering::SeqCst)
    }

    fn set_paused(&self, paused: bool) {
        self.state.paused.store(paused, Ordering::SeqCst);
    }

    fn is_ended(&self) -> bool {
        self.state.ended.load(Ordering::SeqCst)
    }

    fn stop(&self) {
        self.state.stopped.store(true, Ordering::SeqCst);
        self.state.ended.store(true, Ordering::SeqCst);
    }
}

/// Camera that hands out queued videos (the last one repeatedly) or fails.
pub struct FakeCamera {
    videos: VecDeque<FakeVideo>,
    error: Option<CameraError>,
}

impl FakeCamera {
    pub fn granting(video: FakeVideo) -> Self {
        Self {
            videos: VecDeque::from([video]),
            error: None,
        }
    }

    pub fn failing(error: CameraError) -> Self {
        Self {
            videos: VecDeque::new(),
            error: Some(error),
        }
    }

    pub fn push_video(&mut self, video: FakeVideo) {
        self.videos.push_back(video);
    }
}

impl CameraDevice for FakeCamera {
    fn open(&mut self) -> Result<Arc<dyn VideoSource>, CameraError> {
        if let Some(error) = &self.error {
            return Err(error.clone());
        }
        let video = if self.videos.len() > 1 {
            self.videos.pop_front()
        } else {
            self.videos.front().cloned()
        };
        match video {
            Some(v) => Ok(Arc::new(v)),
            None => Err(CameraError::NotFound),
        }
    }
}

// --- Detection ---

/// A face whose dominant expression is `expression`.
pub fn face_with(expression: Expression) -> DetectedFace {
    let mut scores = [0.05; Expression::COUNT];
    scores[expression.index()] = 0.9;
    DetectedFace {
        region: Region::new(8.0, 8.0, 16.0, 16.0, 0.9),
        landmarks: vec![Point::new(16.0, 16.0)],
        expressions: ExpressionScores::new(scores),
    }
}

/// Provider replaying queued results; empty once the script runs out.
pub struct ScriptedProvider {
    results: VecDeque<Result<Vec<DetectedFace>, String>>,
    loaded: bool,
    failing_loads: u32,
    load_calls: u32,
    detect_calls: Arc<AtomicUsize>,
    gate: Option<Receiver<()>>,
}

impl ScriptedProvider {
    pub fn new(results: Vec<Result<Vec<DetectedFace>, String>>) -> Self {
        Self {
            results: results.into(),
            loaded: false,
            failing_loads: 0,
            load_calls: 0,
            detect_calls: Arc::new(AtomicUsize::new(0)),
            gate: None,
        }
    }

    pub fn loaded(results: Vec<Result<Vec<DetectedFace>, String>>) -> Self {
        Self {
            loaded: true,
            ..Self::new(results)
        }
    }

    /// The next `n` load attempts fail.
    pub fn failing_loads(mut self, n: u32) -> Self {
        self.failing_loads = n;
        self
    }

    /// Every `detect` blocks until the returned sender fires (or is dropped).
    pub fn gated(mut self) -> (Self, Sender<()>) {
        let (tx, rx) = crossbeam_channel::unbounded();
        self.gate = Some(rx);
        (self, tx)
    }

    pub fn load_calls(&self) -> u32 {
        self.load_calls
    }

    pub fn detect_calls_handle(&self) -> Arc<AtomicUsize> {
        self.detect_calls.clone()
    }
}

impl DetectionProvider for ScriptedProvider {
    fn load_models(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        self.load_calls += 1;
        if self.failing_loads > 0 {
            self.failing_loads -= 1;
            return Err("simulated model load failure".into());
        }
        self.loaded = true;
        Ok(())
    }

    fn is_loaded(&self) -> bool {
        self.loaded
    }

    fn detect(
        &mut self,
        _frame: &Frame,
        _options: &DetectorOptions,
    ) -> Result<Vec<DetectedFace>, Box<dyn std::error::Error>> {
        self.detect_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.gate {
            let _ = gate.recv();
        }
        if !self.loaded {
            return Err("models not loaded".into());
        }
        match self.results.pop_front() {
            Some(Ok(faces)) => Ok(faces),
            Some(Err(message)) => Err(message.into()),
            None => Ok(Vec::new()),
        }
    }
}

// --- Recording ---

#[derive(Default)]
struct BackendState {
    supported: Option<Vec<String>>,
    fail_create: bool,
    created: usize,
    last_options: Option<RecorderOptions>,
    events: Option<Sender<RecorderEvent>>,
    start_calls: usize,
    stop_calls: usize,
    recording: bool,
}

/// Recorder backend whose events are pushed by the test via [`emit`](Self::emit).
#[derive(Clone, Default)]
pub struct ScriptedBackend {
    state: Arc<Mutex<BackendState>>,
}

impl ScriptedBackend {
    pub fn supporting_all() -> Self {
        Self::default()
    }

    pub fn supporting(mime_types: &[&str]) -> Self {
        let backend = Self::default();
        backend.state.lock().unwrap().supported =
            Some(mime_types.iter().map(|m| m.to_string()).collect());
        backend
    }

    pub fn failing_create(self) -> Self {
        self.state.lock().unwrap().fail_create = true;
        self
    }

    /// Restricts support to `mime_types` from now on.
    pub fn support_only(&self, mime_types: &[&str]) {
        self.state.lock().unwrap().supported =
            Some(mime_types.iter().map(|m| m.to_string()).collect());
    }

    pub fn fail_next_create(&self) {
        self.state.lock().unwrap().fail_create = true;
    }

    pub fn support_all(&self) {
        self.state.lock().unwrap().supported = None;
    }

    /// Makes the current recorder report `Recording` without a start call.
    pub fn force_recording_state(&self) {
        self.state.lock().unwrap().recording = true;
    }

    /// Sends an event on the most recently created recorder's channel.
    pub fn emit(&self, event: RecorderEvent) {
        if let Some(events) = &self.state.lock().unwrap().events {
            let _ = events.send(event);
        }
    }

    pub fn created(&self) -> usize {
        self.state.lock().unwrap().created
    }

    pub fn last_options(&self) -> Option<RecorderOptions> {
        self.state.lock().unwrap().last_options.clone()
    }

    pub fn start_calls(&self) -> usize {
        self.state.lock().unwrap().start_calls
    }

    pub fn stop_calls(&self) -> usize {
        self.state.lock().unwrap().stop_calls
    }
}

impl RecorderBackend for ScriptedBackend {
    fn is_type_supported(&self, mime_type: &str) -> bool {
        match &self.state.lock().unwrap().supported {
            None => true,
            Some(list) => list.iter().any(|m| m == mime_type),
        }
    }

    fn create(
        &mut self,
        _stream: SurfaceStream,
        options: RecorderOptions,
        events: Sender<RecorderEvent>,
    ) -> Result<Box<dyn MediaRecorder>, Box<dyn std::error::Error>> {
        let mut state = self.state.lock().unwrap();
        if state.fail_create {
            return Err("encoder refused the stream".into());
        }
        state.created += 1;
        state.last_options = Some(options);
        state.events = Some(events.clone());
        state.recording = false;
        Ok(Box::new(ScriptedRecorder {
            state: self.state.clone(),
            events,
        }))
    }
}

struct ScriptedRecorder {
    state: Arc<Mutex<BackendState>>,
    events: Sender<RecorderEvent>,
}

impl MediaRecorder for ScriptedRecorder {
    fn state(&self) -> RecorderState {
        if self.state.lock().unwrap().recording {
            RecorderState::Recording
        } else {
            RecorderState::Inactive
        }
    }

    fn start(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        {
            let mut state = self.state.lock().unwrap();
            state.start_calls += 1;
            state.recording = true;
        }
        let _ = self.events.send(RecorderEvent::Started);
        Ok(())
    }

    fn stop(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        let mut state = self.state.lock().unwrap();
        state.stop_calls += 1;
        state.recording = false;
        Ok(())
    }
}

/// Sink that keeps saved files in memory. Clones share storage.
#[derive(Clone, Default)]
pub struct MemorySink {
    saved: Arc<Mutex<Vec<(String, Vec<u8>)>>>,
    fail: bool,
}

impl MemorySink {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn saved(&self) -> Vec<(String, Vec<u8>)> {
        self.saved.lock().unwrap().clone()
    }
}

impl ArtifactSink for MemorySink {
    fn save(&mut self, filename: &str, data: &[u8]) -> Result<PathBuf, Box<dyn std::error::Error>> {
        if self.fail {
            return Err("disk full".into());
        }
        self.saved
            .lock()
            .unwrap()
            .push((filename.to_string(), data.to_vec()));
        Ok(PathBuf::from(filename))
    }
}
