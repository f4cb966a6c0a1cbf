use std::time::Instant;

use crossbeam_channel::{Receiver, Sender, TrySendError};

use crate::detection::domain::detected_face::DetectedFace;
use crate::detection::domain::detection_provider::{DetectionProvider, DetectorOptions};
use crate::shared::frame::Frame;

pub type SendError = Box<dyn std::error::Error + Send + Sync>;

/// Result of one inference, in the submitted frame's native coordinates.
pub struct DetectionOutcome {
    pub native_size: (u32, u32),
    pub faces: Result<Vec<DetectedFace>, SendError>,
    pub elapsed_ms: f64,
}

/// Runs the detection provider on a dedicated thread.
///
/// The request queue holds at most one frame and `try_submit` never blocks,
/// so a slow provider can never make inference calls stack up.
pub struct DetectionWorker {
    requests: Option<Sender<Frame>>,
    results: Receiver<DetectionOutcome>,
    handle: Option<std::thread::JoinHandle<Box<dyn DetectionProvider>>>,
}

impl DetectionWorker {
    pub fn spawn(provider: Box<dyn DetectionProvider>, options: DetectorOptions) -> Self {
        let (request_tx, request_rx) = crossbeam_channel::bounded::<Frame>(1);
        let (result_tx, result_rx) = crossbeam_channel::unbounded::<DetectionOutcome>();
        let handle = spawn_detector(provider, options, request_rx, result_tx);
        Self {
            requests: Some(request_tx),
            results: result_rx,
            handle: Some(handle),
        }
    }

    /// Queues `frame` if the slot is free. Returns `false` when busy or shut down.
    pub fn try_submit(&self, frame: Frame) -> bool {
        let Some(requests) = &self.requests else {
            return false;
        };
        match requests.try_send(frame) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => false,
            Err(TrySendError::Disconnected(_)) => {
                log::warn!("Detection worker has exited");
                false
            }
        }
    }

    pub fn results(&self) -> &Receiver<DetectionOutcome> {
        &self.results
    }

    /// Closes the request queue and waits for the current inference to finish.
    ///
    /// Returns the provider so it can be reused by the next loop, or `None`
    /// if the worker thread panicked.
    pub fn shutdown(mut self) -> Option<Box<dyn DetectionProvider>> {
        self.requests.take();
        self.handle.take().and_then(|h| h.join().ok())
    }
}

impl Drop for DetectionWorker {
    fn drop(&mut self) {
        self.requests.take();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

fn spawn_detector(
    mut provider: Box<dyn DetectionProvider>,
    options: DetectorOptions,
    request_rx: Receiver<Frame>,
    result_tx: Sender<DetectionOutcome>,
) -> std::thread::JoinHandle<Box<dyn DetectionProvider>> {
    std::thread::spawn(move || {
        for frame in request_rx {
            let start = Instant::now();
            let faces = provider
                .detect(&frame, &options)
                .map_err(|e| -> SendError { e.to_string().into() });
            let outcome = DetectionOutcome {
                native_size: frame.dimensions(),
                faces,
                elapsed_ms: start.elapsed().as_secs_f64() * 1000.0,
            };
            if result_tx.send(outcome).is_err() {
                break;
            }
        }
        provider
    })
}
