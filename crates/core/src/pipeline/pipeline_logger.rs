use std::collections::HashMap;
use std::time::Instant;

/// Cross-cutting logger for capture session events.
///
/// The recording loop reports through this trait instead of calling the
/// `log` macros directly, so callers choose how progress and face events
/// surface.
pub trait PipelineLogger: Send {
    /// Report frame-level progress.
    fn progress(&mut self, current: usize, total: usize);

    /// Record how long a named pipeline stage took for one frame.
    fn timing(&mut self, stage: &str, duration_ms: f64);

    /// Record a point-in-time metric (e.g. detections per frame).
    fn metric(&mut self, name: &str, value: f64);

    /// Advisory event: frame `frame_index` contained `count` (at least one) faces.
    /// Must not block.
    fn faces_detected(&mut self, frame_index: usize, count: usize);

    /// Log a human-readable status message.
    fn info(&mut self, message: &str);

    /// Emit an end-of-pipeline summary. Default: no-op.
    fn summary(&self) {}
}

/// Silent logger that discards all events.
///
/// Used by embedders that track progress through the callback,
/// and by tests where logger output is irrelevant.
pub struct NullPipelineLogger;

impl PipelineLogger for NullPipelineLogger {
    fn progress(&mut self, _current: usize, _total: usize) {}
    fn timing(&mut self, _stage: &str, _duration_ms: f64) {}
    fn metric(&mut self, _name: &str, _value: f64) {}
    fn info(&mut self, _message: &str) {}
    fn faces_detected(&mut self, _frame_index: usize, _count: usize) {}
}

/// Running totals for one pipeline stage.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct StageStats {
    pub calls: usize,
    pub total_ms: f64,
    pub max_ms: f64,
}

impl StageStats {
    fn record(&mut self, duration_ms: f64) {
        self.calls += 1;
        self.total_ms += duration_ms;
        self.max_ms = self.max_ms.max(duration_ms);
    }

    pub fn avg_ms(&self) -> f64 {
        if self.calls == 0 {
            0.0
        } else {
            self.total_ms / self.calls as f64
        }
    }
}

/// CLI-oriented logger for a recording.
///
/// Keeps constant-size running totals (per-stage timings, face events,
/// metric means) and logs a recording summary through `log` at the end.
/// Progress lines are throttled to every `throttle_frames` frames.
pub struct StdoutPipelineLogger {
    throttle_frames: usize,
    stages: HashMap<String, StageStats>,
    metric_sums: HashMap<String, (usize, f64)>,
    start_time: Instant,
    frames_written: usize,
    total_frames: usize,
    face_frames: usize,
    face_detections: usize,
    peak_faces: usize,
}

impl StdoutPipelineLogger {
    pub fn new(throttle_frames: usize) -> Self {
        Self {
            throttle_frames: throttle_frames.max(1),
            stages: HashMap::new(),
            metric_sums: HashMap::new(),
            start_time: Instant::now(),
            frames_written: 0,
            total_frames: 0,
            face_frames: 0,
            face_detections: 0,
            peak_faces: 0,
        }
    }

    pub fn stage(&self, name: &str) -> Option<StageStats> {
        self.stages.get(name).copied()
    }

    /// Summary of the recording, or `None` before any frame was processed.
    pub fn summary_string(&self) -> Option<String> {
        if self.stages.is_empty() && self.frames_written == 0 {
            return None;
        }
        let elapsed = self.start_time.elapsed().as_secs_f64();
        let mut lines = vec![format!(
            "Recording summary: {}/{} frames in {elapsed:.1}s",
            self.frames_written, self.total_frames
        )];

        let mut names: Vec<_> = self.stages.keys().collect();
        names.sort();
        for name in names {
            let st = &self.stages[name];
            lines.push(format!(
                "  {name:8} avg {:6.1}ms  max {:6.1}ms",
                st.avg_ms(),
                st.max_ms
            ));
        }

        let mut metrics: Vec<_> = self.metric_sums.iter().collect();
        metrics.sort_by(|a, b| a.0.cmp(b.0));
        for (name, (n, sum)) in metrics {
            if *n > 0 {
                lines.push(format!("  {name} per frame: {:.2}", sum / *n as f64));
            }
        }

        if self.face_frames > 0 {
            let ratio = if self.frames_written > 0 {
                self.face_frames as f64 / self.frames_written as f64 * 100.0
            } else {
                0.0
            };
            lines.push(format!(
                "  Faces: {} in {} frames ({ratio:.1}% of written), at most {} in one frame",
                self.face_detections, self.face_frames, self.peak_faces
            ));
        } else {
            lines.push("  Faces: none".to_string());
        }

        if self.frames_written > 0 && elapsed > 0.0 {
            lines.push(format!(
                "  Capture rate: {:.1} fps",
                self.frames_written as f64 / elapsed
            ));
        }
        Some(lines.join("\n"))
    }
}

impl Default for StdoutPipelineLogger {
    fn default() -> Self {
        Self::new(10)
    }
}

impl PipelineLogger for StdoutPipelineLogger {
    fn progress(&mut self, current: usize, total: usize) {
        self.frames_written = current;
        self.total_frames = total;
        if total > 0 && (current % self.throttle_frames == 0 || current == total) {
            let pct = current as f64 / total as f64 * 100.0;
            log::info!("Recording: {current}/{total} frames ({pct:.1}%)");
        }
    }

    fn timing(&mut self, stage: &str, duration_ms: f64) {
        self.stages
            .entry(stage.to_string())
            .or_default()
            .record(duration_ms);
    }

    fn metric(&mut self, name: &str, value: f64) {
        let entry = self.metric_sums.entry(name.to_string()).or_default();
        entry.0 += 1;
        entry.1 += value;
    }

    fn info(&mut self, message: &str) {
        log::info!("{message}");
    }

    fn faces_detected(&mut self, frame_index: usize, count: usize) {
        self.face_frames += 1;
        self.face_detections += count;
        self.peak_faces = self.peak_faces.max(count);
        log::info!("Frame {frame_index}: {count} face(s) detected");
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
    use rstest::rstest;

    #[test]
    fn test_null_logger_accepts_everything() {
        let mut logger = NullPipelineLogger;
        logger.progress(1, 10);
        logger.timing("detect", 5.0);
        logger.metric("detections", 3.0);
        logger.info("hello");
        logger.faces_detected(4, 2);
        logger.summary();
    }

    #[test]
    fn test_stage_stats_accumulate() {
        let mut logger = StdoutPipelineLogger::new(10);
        logger.timing("detect", 20.0);
        logger.timing("detect", 30.0);
        logger.timing("encode", 5.0);

        let detect = logger.stage("detect").unwrap();
        assert_eq!(detect.calls, 2);
        assert_relative_eq!(detect.avg_ms(), 25.0);
        assert_relative_eq!(detect.max_ms, 30.0);
        assert_eq!(logger.stage("encode").map(|s| s.calls), Some(1));
        assert!(logger.stage("preview").is_none());
    }

    #[test]
    fn test_summary_reports_face_ratio() {
        let mut logger = StdoutPipelineLogger::new(10);
        for i in 1..=20 {
            logger.progress(i, 20);
            logger.timing("detect", 1.0);
        }
        logger.faces_detected(3, 1);
        logger.faces_detected(7, 3);

        let summary = logger.summary_string().unwrap();
        assert!(summary.starts_with("Recording summary: 20/20 frames"));
        assert!(summary.contains("Faces: 4 in 2 frames (10.0% of written), at most 3 in one frame"));
    }

    #[test]
    fn test_summary_lists_stages_and_metric_mean() {
        let mut logger = StdoutPipelineLogger::new(10);
        logger.progress(2, 4);
        for stage in ["read", "detect", "encode", "preview"] {
            logger.timing(stage, 1.0);
        }
        logger.metric("detections", 1.0);
        logger.metric("detections", 2.0);

        let summary = logger.summary_string().unwrap();
        for stage in ["read", "detect", "encode", "preview"] {
            assert!(summary.contains(stage), "missing {stage}");
        }
        assert!(summary.contains("detections per frame: 1.50"));
        assert!(summary.contains("Faces: none"));
    }

    #[test]
    fn test_empty_summary_returns_none() {
        assert!(StdoutPipelineLogger::new(10).summary_string().is_none());
    }

    #[rstest]
    #[case(0, 1)]
    #[case(1, 1)]
    #[case(25, 25)]
    fn test_throttle_is_at_least_one(#[case] requested: usize, #[case] expected: usize) {
        assert_eq!(StdoutPipelineLogger::new(requested).throttle_frames, expected);
    }

    #[test]
    fn test_progress_tracks_written_and_total() {
        let mut logger = StdoutPipelineLogger::default();
        for i in 1..=7 {
            logger.progress(i, 20);
        }
        assert_eq!((logger.frames_written, logger.total_frames), (7, 20));
    }

    #[test]
    fn test_info_keeps_no_history() {
        let mut logger = StdoutPipelineLogger::new(10);
        for _ in 0..1000 {
            logger.info("camera opened");
        }
        assert!(logger.summary_string().is_none());
    }
}
