use std::collections::HashMap;
use std::time::Instant;

/// Observability port for the annotation loop.
///
/// Keeps the loop independent of where timings end up (log output, a UI
/// overlay, or nowhere in tests).
pub trait LoopLogger: Send {
    /// Report the number of ticks that dispatched a detection so far.
    fn progress(&mut self, ticks: usize);

    /// Record how long a named stage took for one tick.
    fn timing(&mut self, stage: &str, duration_ms: f64);

    /// Record a point-in-time metric (e.g. face count).
    fn metric(&mut self, name: &str, value: f64);

    fn info(&mut self, message: &str);

    /// Emit an end-of-loop summary. Default: no-op.
    fn summary(&self) {}
}

/// Discards everything.
pub struct NullLoopLogger;

impl LoopLogger for NullLoopLogger {
    fn progress(&mut self, _ticks: usize) {}
    fn timing(&mut self, _stage: &str, _duration_ms: f64) {}
    fn metric(&mut self, _name: &str, _value: f64) {}
    fn info(&mut self, _message: &str) {}
}

/// Accumulates per-stage timings and metrics and logs a summary when the
/// loop ends. Progress is logged every `every_ticks` ticks at debug level.
pub struct SummaryLoopLogger {
    every_ticks: usize,
    timings: HashMap<String, Vec<f64>>,
    metrics: HashMap<String, Vec<f64>>,
    start_time: Instant,
    ticks: usize,
}

impl SummaryLoopLogger {
    pub fn new(every_ticks: usize) -> Self {
        Self {
            every_ticks: every_ticks.max(1),
            timings: HashMap::new(),
            metrics: HashMap::new(),
            start_time: Instant::now(),
            ticks: 0,
        }
    }

    /// Returns the formatted summary, or `None` if nothing was recorded.
    pub fn summary_string(&self) -> Option<String> {
        if self.timings.is_empty() && self.metrics.is_empty() {
            return None;
        }

        let elapsed_ms = self.start_time.elapsed().as_secs_f64() * 1000.0;
        let mut lines = vec![format!(
            "Annotation summary ({} ticks, {:.1}s):",
            self.ticks,
            elapsed_ms / 1000.0
        )];

        let mut stages: Vec<_> = self.timings.keys().collect();
        stages.sort();
        for stage in stages {
            let durations = &self.timings[stage];
            let total_ms: f64 = durations.iter().sum();
            let avg_ms = mean(durations);
            lines.push(format!(
                "  {stage:10}: avg {avg_ms:6.1}ms  total {total_ms:7.0}ms"
            ));
        }

        let mut names: Vec<_> = self.metrics.keys().collect();
        names.sort();
        for name in names {
            let values = &self.metrics[name];
            let last = values.last().copied().unwrap_or(0.0);
            lines.push(format!("  {name}: avg {:.1}  last {last:.0}", mean(values)));
        }

        if self.ticks > 0 && elapsed_ms > 0.0 {
            let rate = self.ticks as f64 / (elapsed_ms / 1000.0);
            lines.push(format!("  Detection rate: {rate:.1} Hz"));
        }

        Some(lines.join("\n"))
    }

    pub fn timings_for(&self, stage: &str) -> Option<&[f64]> {
        self.timings.get(stage).map(|v| v.as_slice())
    }

    pub fn metrics_for(&self, name: &str) -> Option<&[f64]> {
        self.metrics.get(name).map(|v| v.as_slice())
    }
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

impl Default for SummaryLoopLogger {
    fn default() -> Self {
        Self::new(50)
    }
}

impl LoopLogger for SummaryLoopLogger {
    fn progress(&mut self, ticks: usize) {
        self.ticks = ticks;
        if ticks % self.every_ticks == 0 {
            log::debug!("Annotation loop: {ticks} detections dispatched");
        }
    }

    fn timing(&mut self, stage: &str, duration_ms: f64) {
        self.timings
            .entry(stage.to_string())
            .or_default()
            .push(duration_ms);
    }

    fn metric(&mut self, name: &str, value: f64) {
        self.metrics
            .entry(name.to_string())
            .or_default()
            .push(value);
    }

    fn info(&mut self, message: &str) {
        log::info!("{message}");
    }

    fn summary(&self) {
        if let Some(text) = self.summary_string() {
            log::info!("\n\n{text}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_null_logger_is_noop() {
        let mut logger = NullLoopLogger;
        logger.progress(1);
        logger.timing("detect", 5.0);
        logger.metric("faces", 2.0);
        logger.info("hello");
        logger.summary();
    }

    #[test]
    fn test_timing_records_values() {
        let mut logger = SummaryLoopLogger::new(10);
        logger.timing("detect", 20.0);
        logger.timing("detect", 30.0);
        logger.timing("draw", 5.0);

        assert_eq!(logger.timings_for("detect").unwrap(), &[20.0, 30.0]);
        assert_eq!(logger.timings_for("draw").unwrap().len(), 1);
        assert!(logger.timings_for("annotate").is_none());
    }

    #[test]
    fn test_summary_includes_stages_and_metrics() {
        let mut logger = SummaryLoopLogger::new(10);
        logger.progress(4);
        logger.timing("draw", 2.0);
        logger.timing("detect", 40.0);
        logger.metric("faces", 1.0);
        logger.metric("faces", 2.0);
        logger.metric("skipped_ticks", 3.0);

        let summary = logger.summary_string().unwrap();
        assert!(summary.contains("Annotation summary (4 ticks"));
        assert!(summary.contains("detect"));
        assert!(summary.contains("draw"));
        assert!(summary.contains("faces: avg 1.5"));
        assert!(summary.contains("skipped_ticks: avg 3.0  last 3"));
    }

    #[test]
    fn test_empty_summary_returns_none() {
        assert!(SummaryLoopLogger::default().summary_string().is_none());
    }

    #[test]
    fn test_mean() {
        assert_relative_eq!(mean(&[]), 0.0);
        assert_relative_eq!(mean(&[1.0, 2.0, 6.0]), 3.0);
    }
}
