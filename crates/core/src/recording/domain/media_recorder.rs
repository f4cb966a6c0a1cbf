use std::time::Duration;

use crossbeam_channel::Sender;

use super::surface_stream::SurfaceStream;

/// Recorder lifecycle as reported by the backend.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RecorderState {
    Inactive,
    Recording,
}

/// Asynchronous notifications from a running recorder, delivered in order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RecorderEvent {
    Started,
    /// One flushed segment. May be empty.
    DataAvailable(Vec<u8>),
    Stopped,
    Error(String),
}

#[derive(Clone, Debug, PartialEq)]
pub struct RecorderOptions {
    pub mime_type: String,
    /// Flush interval: at most this much encoded data is held before a
    /// `DataAvailable` event is emitted.
    pub timeslice: Duration,
}

/// One encoder bound to one stream.
///
/// `stop` returns immediately; completion is signalled by
/// [`RecorderEvent::Stopped`], after any final `DataAvailable`.
pub trait MediaRecorder: Send {
    fn state(&self) -> RecorderState;

    fn start(&mut self) -> Result<(), Box<dyn std::error::Error>>;

    fn stop(&mut self) -> Result<(), Box<dyn std::error::Error>>;
}

/// Platform media-recording capability.
pub trait RecorderBackend: Send {
    fn is_type_supported(&self, mime_type: &str) -> bool;

    /// Builds an inactive recorder that reports through `events`.
    fn create(
        &mut self,
        stream: SurfaceStream,
        options: RecorderOptions,
        events: Sender<RecorderEvent>,
    ) -> Result<Box<dyn MediaRecorder>, Box<dyn std::error::Error>>;
}
