use std::sync::{Arc, PoisonError};
use std::time::{Duration, Instant};

use crossbeam_channel::{after, select, tick, Receiver};

use crate::capture::domain::video_source::VideoSource;
use crate::config::TrackerConfig;
use crate::detection::domain::detected_face::DetectedFace;
use crate::detection::domain::detection_provider::{DetectionProvider, DetectorOptions};

use super::detection_worker::{DetectionOutcome, DetectionWorker};
use super::domain::drawing_surface::SharedSurface;
use super::domain::expression_tally::SharedTally;
use super::domain::face_annotator::FaceAnnotator;
use super::loop_logger::LoopLogger;
use super::poll_handle::PollHandle;

/// Loop parameters, usually derived from [`TrackerConfig`].
#[derive(Clone, Debug, PartialEq)]
pub struct LoopSettings {
    pub tick_interval: Duration,
    pub dimension_backoff: Duration,
    pub mirror: bool,
    pub track_counts: bool,
    pub display_size: Option<(u32, u32)>,
    pub detector: DetectorOptions,
}

impl LoopSettings {
    pub fn from_config(config: &TrackerConfig) -> Self {
        Self {
            tick_interval: config.tick_interval(),
            dimension_backoff: config.dimension_backoff(),
            mirror: config.mirror,
            track_counts: config.track_counts,
            display_size: config.display_size,
            detector: DetectorOptions {
                min_confidence: config.min_confidence,
                input_size: config.input_size,
            },
        }
    }
}

impl Default for LoopSettings {
    fn default() -> Self {
        Self::from_config(&TrackerConfig::default())
    }
}

/// What a single tick did.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TickOutcome {
    /// Video paused or ended; the loop must stop.
    Stopped,
    /// Previous inference still pending; nothing was drawn.
    SkippedBusy,
    /// Video has no dimensions or frame yet.
    Deferred,
    /// Frame drawn and handed to the detector.
    Dispatched,
}

/// Draws the live video onto the shared surface at a fixed cadence and
/// overlays detection results as they arrive.
///
/// Each tick draws the current frame and hands the unmirrored frame to the
/// detection worker. The annotations and tally updates for that frame are
/// applied when its result comes back. While a result is pending, ticks are
/// skipped, so the surface always shows the frame the annotations belong to.
pub struct AnnotationLoop {
    video: Arc<dyn VideoSource>,
    surface: SharedSurface,
    tally: SharedTally,
    annotator: Arc<dyn FaceAnnotator>,
    worker: DetectionWorker,
    logger: Box<dyn LoopLogger>,
    settings: LoopSettings,
    in_flight: bool,
    dispatched: usize,
    skipped: usize,
}

impl AnnotationLoop {
    /// `provider` must already have its models loaded.
    pub fn new(
        video: Arc<dyn VideoSource>,
        provider: Box<dyn DetectionProvider>,
        surface: SharedSurface,
        tally: SharedTally,
        annotator: Arc<dyn FaceAnnotator>,
        logger: Box<dyn LoopLogger>,
        settings: LoopSettings,
    ) -> Self {
        let worker = DetectionWorker::spawn(provider, settings.detector.clone());
        Self {
            video,
            surface,
            tally,
            annotator,
            worker,
            logger,
            settings,
            in_flight: false,
            dispatched: 0,
            skipped: 0,
        }
    }

    /// Runs the loop on its own thread until cancelled or the video stops.
    pub fn spawn(self) -> PollHandle {
        let (cancel_tx, cancel_rx) = crossbeam_channel::bounded::<()>(1);
        let handle = std::thread::spawn(move || self.run(cancel_rx));
        PollHandle::new(cancel_tx, handle)
    }

    fn run(mut self, cancel: Receiver<()>) -> Option<Box<dyn DetectionProvider>> {
        if self.wait_for_dimensions(&cancel) {
            self.logger.info("Annotation loop started");
            let ticker = tick(self.settings.tick_interval);
            let results = self.worker.results().clone();
            loop {
                select! {
                    recv(cancel) -> _ => break,
                    recv(results) -> msg => match msg {
                        Ok(outcome) => self.on_detection(outcome),
                        Err(_) => break,
                    },
                    recv(ticker) -> _ => {
                        if self.tick() == TickOutcome::Stopped {
                            log::info!("Video paused or ended; annotation loop stopping");
                            break;
                        }
                    }
                }
            }
        }
        self.finish()
    }

    /// Blocks until the video reports non-zero dimensions.
    ///
    /// Returns `false` if cancelled or the video stopped first.
    fn wait_for_dimensions(&self, cancel: &Receiver<()>) -> bool {
        loop {
            if self.video.is_ended() {
                return false;
            }
            let (w, h) = self.video.dimensions();
            if w > 0 && h > 0 {
                return true;
            }
            log::debug!(
                "Video dimensions not available yet; retrying in {:?}",
                self.settings.dimension_backoff
            );
            select! {
                recv(cancel) -> _ => return false,
                recv(after(self.settings.dimension_backoff)) -> _ => {}
            }
        }
    }

    /// One cadence step: stop check, busy check, draw, dispatch.
    pub fn tick(&mut self) -> TickOutcome {
        if self.video.is_paused() || self.video.is_ended() {
            return TickOutcome::Stopped;
        }
        if self.in_flight {
            self.skipped += 1;
            self.logger.metric("skipped_ticks", self.skipped as f64);
            log::debug!("Detection still in flight; skipping tick");
            return TickOutcome::SkippedBusy;
        }

        let native = self.video.dimensions();
        if native.0 == 0 || native.1 == 0 {
            return TickOutcome::Deferred;
        }
        let Some(frame) = self.video.current_frame() else {
            return TickOutcome::Deferred;
        };

        let start = Instant::now();
        let (w, h) = self.settings.display_size.unwrap_or(native);
        {
            let mut surface = self.surface.lock().unwrap_or_else(PoisonError::into_inner);
            surface.resize(w, h);
            surface.clear();
            surface.draw_frame(&frame, self.settings.mirror);
        }
        self.logger.timing("draw", elapsed_ms(start));

        if !self.worker.try_submit(frame) {
            return TickOutcome::SkippedBusy;
        }
        self.in_flight = true;
        self.dispatched += 1;
        self.logger.progress(self.dispatched);
        TickOutcome::Dispatched
    }

    /// Applies one detection result: rescale, annotate, tally.
    pub fn on_detection(&mut self, outcome: DetectionOutcome) {
        self.in_flight = false;
        self.logger.timing("detect", outcome.elapsed_ms);

        let faces = match outcome.faces {
            Ok(faces) => faces,
            Err(e) => {
                log::warn!("Face detection failed: {e}");
                return;
            }
        };

        let start = Instant::now();
        let faces = {
            let mut surface = self.surface.lock().unwrap_or_else(PoisonError::into_inner);
            let display = surface.dimensions();
            let faces: Vec<DetectedFace> = faces
                .iter()
                .map(|face| {
                    let scaled = face.rescaled(outcome.native_size, display);
                    if self.settings.mirror {
                        scaled.mirrored(display.0)
                    } else {
                        scaled
                    }
                })
                .collect();
            self.annotator.annotate(&mut surface, &faces);
            faces
        };
        self.logger.timing("annotate", elapsed_ms(start));
        self.logger.metric("faces", faces.len() as f64);

        if self.settings.track_counts && !faces.is_empty() {
            let mut tally = self.tally.lock().unwrap_or_else(PoisonError::into_inner);
            for face in &faces {
                tally.increment(face.dominant_expression());
            }
        }
    }

    /// Waits up to `timeout` for a pending result and applies it.
    ///
    /// Returns `true` if a result was applied.
    pub fn await_detection(&mut self, timeout: Duration) -> bool {
        match self.worker.results().recv_timeout(timeout) {
            Ok(outcome) => {
                self.on_detection(outcome);
                true
            }
            Err(_) => false,
        }
    }

    pub fn is_in_flight(&self) -> bool {
        self.in_flight
    }

    pub fn skipped_ticks(&self) -> usize {
        self.skipped
    }

    fn finish(self) -> Option<Box<dyn DetectionProvider>> {
        self.logger.summary();
        self.worker.shutdown()
    }
}

fn elapsed_ms(start: Instant) -> f64 {
    start.elapsed().as_secs_f64() * 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotation::domain::drawing_surface::DrawingSurface;
    use crate::annotation::domain::expression_tally::ExpressionTally;
    use crate::annotation::infrastructure::overlay_annotator::OverlayAnnotator;
    use crate::annotation::loop_logger::NullLoopLogger;
    use crate::shared::expression::Expression;
    use crate::test_support::{face_with, FakeVideo, ScriptedProvider};

    const WAIT: Duration = Duration::from_secs(5);

    struct Harness {
        video: FakeVideo,
        surface: SharedSurface,
        tally: SharedTally,
    }

    fn build(
        video: FakeVideo,
        provider: ScriptedProvider,
        settings: LoopSettings,
    ) -> (AnnotationLoop, Harness) {
        let surface = DrawingSurface::shared(0, 0);
        let tally = ExpressionTally::shared();
        let annotation_loop = AnnotationLoop::new(
            Arc::new(video.clone()),
            Box::new(provider),
            surface.clone(),
            tally.clone(),
            Arc::new(OverlayAnnotator::new()),
            Box::new(NullLoopLogger),
            settings,
        );
        (
            annotation_loop,
            Harness {
                video,
                surface,
                tally,
            },
        )
    }

    fn fast_settings() -> LoopSettings {
        LoopSettings {
            tick_interval: Duration::from_millis(5),
            dimension_backoff: Duration::from_millis(5),
            ..LoopSettings::default()
        }
    }

    fn count(tally: &SharedTally, expression: Expression) -> u64 {
        tally.lock().unwrap().count(expression)
    }

    #[test]
    fn test_zero_dimensions_defer_then_proceed() {
        let video = FakeVideo::new(0, 0);
        let provider = ScriptedProvider::loaded(vec![Ok(vec![])]);
        let (mut lp, h) = build(video, provider, fast_settings());

        assert_eq!(lp.tick(), TickOutcome::Deferred);
        assert_eq!(h.surface.lock().unwrap().dimensions(), (0, 0));

        h.video.set_dimensions(64, 48);
        assert_eq!(lp.tick(), TickOutcome::Dispatched);
        assert_eq!(h.surface.lock().unwrap().dimensions(), (64, 48));
    }

    #[test]
    fn test_paused_or_ended_video_stops() {
        let video = FakeVideo::new(32, 32);
        let (mut lp, h) = build(video, ScriptedProvider::loaded(vec![]), fast_settings());

        h.video.set_paused(true);
        assert_eq!(lp.tick(), TickOutcome::Stopped);
        h.video.set_paused(false);
        h.video.set_ended(true);
        assert_eq!(lp.tick(), TickOutcome::Stopped);
    }

    #[test]
    fn test_busy_ticks_are_skipped() {
        let (provider, gate) = ScriptedProvider::loaded(vec![Ok(vec![])]).gated();
        let calls = provider.detect_calls_handle();
        let (mut lp, _h) = build(FakeVideo::new(32, 32), provider, fast_settings());

        assert_eq!(lp.tick(), TickOutcome::Dispatched);
        assert_eq!(lp.tick(), TickOutcome::SkippedBusy);
        assert_eq!(lp.tick(), TickOutcome::SkippedBusy);
        assert_eq!(lp.skipped_ticks(), 2);

        gate.send(()).unwrap();
        assert!(lp.await_detection(WAIT));
        assert!(!lp.is_in_flight());
        assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst), 1);
        assert_eq!(lp.tick(), TickOutcome::Dispatched);

        // Release the second inference so the worker can be joined.
        drop(gate);
        drop(lp);
    }

    #[test]
    fn test_one_increment_per_face() {
        let faces = vec![
            face_with(Expression::Happy),
            face_with(Expression::Happy),
            face_with(Expression::Angry),
        ];
        let provider = ScriptedProvider::loaded(vec![Ok(faces)]);
        let (mut lp, h) = build(FakeVideo::new(64, 48), provider, fast_settings());

        assert_eq!(lp.tick(), TickOutcome::Dispatched);
        assert!(lp.await_detection(WAIT));
        assert_eq!(count(&h.tally, Expression::Happy), 2);
        assert_eq!(count(&h.tally, Expression::Angry), 1);
        assert_eq!(count(&h.tally, Expression::Neutral), 0);
    }

    #[test]
    fn test_detection_failure_skips_tally() {
        let provider = ScriptedProvider::loaded(vec![Err("gpu lost".into())]);
        let (mut lp, h) = build(FakeVideo::new(64, 48), provider, fast_settings());

        lp.tick();
        assert!(lp.await_detection(WAIT));
        assert!(!lp.is_in_flight());
        assert_eq!(h.tally.lock().unwrap().snapshot().total(), 0);
        // loop keeps going
        assert_eq!(lp.tick(), TickOutcome::Dispatched);
    }

    #[test]
    fn test_tally_disabled_when_not_tracking_counts() {
        let provider = ScriptedProvider::loaded(vec![Ok(vec![face_with(Expression::Sad)])]);
        let settings = LoopSettings {
            track_counts: false,
            ..fast_settings()
        };
        let (mut lp, h) = build(FakeVideo::new(64, 48), provider, settings);

        lp.tick();
        assert!(lp.await_detection(WAIT));
        assert_eq!(h.tally.lock().unwrap().snapshot().total(), 0);
    }

    #[test]
    fn test_display_size_overrides_surface() {
        let settings = LoopSettings {
            display_size: Some((32, 24)),
            ..fast_settings()
        };
        let (mut lp, h) = build(FakeVideo::new(64, 48), ScriptedProvider::loaded(vec![]), settings);

        lp.tick();
        assert_eq!(h.surface.lock().unwrap().dimensions(), (32, 24));
    }

    #[test]
    fn test_spawned_loop_waits_for_dimensions_then_tallies() {
        let video = FakeVideo::new(0, 0);
        let provider = ScriptedProvider::loaded(vec![Ok(vec![face_with(Expression::Surprised)])]);
        let (lp, h) = build(video, provider, fast_settings());

        let mut handle = lp.spawn();
        std::thread::sleep(Duration::from_millis(30));
        assert!(handle.is_running());
        assert_eq!(h.tally.lock().unwrap().snapshot().total(), 0);

        h.video.set_dimensions(32, 32);
        let deadline = Instant::now() + WAIT;
        while count(&h.tally, Expression::Surprised) == 0 && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(5));
        }
        assert_eq!(count(&h.tally, Expression::Surprised), 1);

        let provider = handle.cancel();
        assert!(provider.is_some());
        assert!(!handle.is_running());
    }

    #[test]
    fn test_spawned_loop_stops_when_video_ends() {
        let (lp, h) = build(FakeVideo::new(16, 16), ScriptedProvider::loaded(vec![]), fast_settings());
        let mut handle = lp.spawn();

        h.video.set_ended(true);
        let deadline = Instant::now() + WAIT;
        while handle.is_running() && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(5));
        }
        assert!(!handle.is_running());
        assert!(handle.cancel().is_some());
        assert!(handle.cancel().is_none());
    }
}
