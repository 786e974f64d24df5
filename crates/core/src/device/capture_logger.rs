use std::collections::HashMap;
use std::time::Instant;

/// Session-level observer of the capture loop.
///
/// Decouples the loop from its reporting: the binary logs a summary at
/// shutdown, tests discard everything.
pub trait CaptureLogger: Send {
    /// One frame went through detection; `accepted` faces passed the filter.
    fn frame_processed(&mut self, accepted: usize);

    /// Record how long a named stage took for one frame.
    fn timing(&mut self, stage: &str, duration_ms: f64);

    /// Bump a named event counter (uploads, failures, ...).
    fn count(&mut self, event: &str);

    /// Emit an end-of-session summary. Default: no-op.
    fn summary(&self) {}
}

/// Running aggregate of one stage's durations. Constant size regardless of
/// how many frames the device processes.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct StageTiming {
    pub count: usize,
    pub total_ms: f64,
    pub max_ms: f64,
}

impl StageTiming {
    fn record(&mut self, duration_ms: f64) {
        self.count += 1;
        self.total_ms += duration_ms;
        self.max_ms = self.max_ms.max(duration_ms);
    }

    pub fn avg_ms(&self) -> f64 {
        self.total_ms / self.count.max(1) as f64
    }
}

/// Silent logger that discards all events.
pub struct NullCaptureLogger;

impl CaptureLogger for NullCaptureLogger {
    fn frame_processed(&mut self, _accepted: usize) {}
    fn timing(&mut self, _stage: &str, _duration_ms: f64) {}
    fn count(&mut self, _event: &str) {}
}

/// Tracks per-stage timing and event counts and logs a summary report when
/// the device shuts down.
///
/// A progress line is logged every `throttle_frames` frames.
pub struct LogCaptureLogger {
    throttle_frames: usize,
    timings: HashMap<String, StageTiming>,
    counters: HashMap<String, usize>,
    start_time: Instant,
    frames: usize,
    faces_accepted: usize,
}

impl LogCaptureLogger {
    pub fn new(throttle_frames: usize) -> Self {
        Self {
            throttle_frames: throttle_frames.max(1),
            timings: HashMap::new(),
            counters: HashMap::new(),
            start_time: Instant::now(),
            frames: 0,
            faces_accepted: 0,
        }
    }

    /// Returns the formatted summary, or `None` if no frame was processed.
    pub fn summary_string(&self) -> Option<String> {
        if self.frames == 0 && self.counters.is_empty() {
            return None;
        }

        let elapsed_s = self.start_time.elapsed().as_secs_f64();
        let mut lines = vec![format!(
            "Capture summary ({} frames, {} faces accepted, {elapsed_s:.1}s):",
            self.frames, self.faces_accepted
        )];

        let mut stages: Vec<_> = self.timings.keys().collect();
        stages.sort();
        for stage in stages {
            let t = &self.timings[stage];
            lines.push(format!(
                "  {stage:12}: avg {:6.1}ms  max {:6.1}ms  total {:7.0}ms",
                t.avg_ms(),
                t.max_ms,
                t.total_ms
            ));
        }

        let mut events: Vec<_> = self.counters.iter().collect();
        events.sort();
        for (event, n) in events {
            lines.push(format!("  {event}: {n}"));
        }

        Some(lines.join("\n"))
    }

    pub fn timings_for(&self, stage: &str) -> Option<StageTiming> {
        self.timings.get(stage).copied()
    }

    pub fn count_of(&self, event: &str) -> usize {
        self.counters.get(event).copied().unwrap_or(0)
    }
}

impl Default for LogCaptureLogger {
    fn default() -> Self {
        Self::new(100)
    }
}

impl CaptureLogger for LogCaptureLogger {
    fn frame_processed(&mut self, accepted: usize) {
        self.frames += 1;
        self.faces_accepted += accepted;
        if self.frames % self.throttle_frames == 0 {
            log::info!(
                "Processed {} frames ({} faces accepted)",
                self.frames,
                self.faces_accepted
            );
        }
    }

    fn timing(&mut self, stage: &str, duration_ms: f64) {
        self.timings
            .entry(stage.to_string())
            .or_default()
            .record(duration_ms);
    }

    fn count(&mut self, event: &str) {
        *self.counters.entry(event.to_string()).or_default() += 1;
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
    fn test_null_logger_all_methods_are_noop() {
        let mut logger = NullCaptureLogger;
        logger.frame_processed(2);
        logger.timing("detect", 5.0);
        logger.count("faces_uploaded");
        logger.summary();
    }

    #[test]
    fn test_timing_records_values() {
        let mut logger = LogCaptureLogger::new(10);
        logger.timing("detect", 20.0);
        logger.timing("detect", 30.0);

        let detect = logger.timings_for("detect").unwrap();
        assert_eq!(detect.count, 2);
        assert_relative_eq!(detect.total_ms, 50.0);
        assert_relative_eq!(detect.max_ms, 30.0);
        assert_relative_eq!(detect.avg_ms(), 25.0);
        assert!(logger.timings_for("upload").is_none());
    }

    #[test]
    fn test_timing_storage_is_constant_over_long_sessions() {
        let mut logger = LogCaptureLogger::new(1_000_000);
        for i in 0..100_000 {
            logger.frame_processed(0);
            logger.timing("detect", (i % 50) as f64);
            logger.timing("upload", 1.0);
        }

        assert_eq!(logger.timings.len(), 2);
        let detect = logger.timings_for("detect").unwrap();
        assert_eq!(detect.count, 100_000);
        assert_relative_eq!(detect.max_ms, 49.0);
        assert_relative_eq!(detect.avg_ms(), 24.5);
    }

    #[test]
    fn test_counters_accumulate() {
        let mut logger = LogCaptureLogger::new(10);
        logger.count("upload_failures");
        logger.count("upload_failures");
        logger.count("faces_uploaded");
        assert_eq!(logger.count_of("upload_failures"), 2);
        assert_eq!(logger.count_of("faces_uploaded"), 1);
        assert_eq!(logger.count_of("read_failures"), 0);
    }

    #[test]
    fn test_summary_lists_frames_stages_and_events() {
        let mut logger = LogCaptureLogger::new(10);
        logger.frame_processed(1);
        logger.frame_processed(0);
        logger.timing("detect", 12.0);
        logger.count("faces_uploaded");

        let summary = logger.summary_string().unwrap();
        assert!(summary.contains("2 frames, 1 faces accepted"));
        assert!(summary.contains("detect"));
        assert!(summary.contains("max"));
        assert!(summary.contains("faces_uploaded: 1"));
    }

    #[test]
    fn test_empty_summary_returns_none() {
        assert!(LogCaptureLogger::new(10).summary_string().is_none());
    }

    #[test]
    fn test_zero_throttle_is_clamped() {
        let mut logger = LogCaptureLogger::new(0);
        logger.frame_processed(0);
        assert_eq!(logger.throttle_frames, 1);
    }
}
