use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use crate::annotation::domain::frame_annotator::FrameAnnotator;
use crate::annotation::infrastructure::rectangle_annotator::RectangleAnnotator;
use crate::detection::domain::face_detector::{DetectionParams, FaceDetector};
use crate::pipeline::capture_session::{CaptureError, CaptureOutcome, CaptureSession, CaptureSettings};
use crate::pipeline::pipeline_logger::{NullPipelineLogger, PipelineLogger};
use crate::shared::frame::Frame;
use crate::shared::region::Region;
use crate::video::domain::camera_source::CameraSource;
use crate::video::domain::preview_sink::PreviewSink;
use crate::video::domain::video_writer::VideoWriter;

/// Progress callback: `(frames_written, total_frames)`. Returning `false` stops
/// the recording as if cancelled.
pub type ProgressFn = Box<dyn Fn(usize, usize) -> bool + Send>;

/// Records annotated video from a camera for a fixed frame budget.
///
/// Each tick reads one frame, detects faces on a grayscale copy, outlines
/// them on the colour frame, encodes it and forwards it to the preview.
/// This is a single-use struct: `execute` consumes the camera and writer,
/// so calling it twice fails with [`CaptureError::AlreadyExecuted`].
pub struct RecordVideoUseCase {
    camera: Option<Box<dyn CameraSource>>,
    writer: Option<Box<dyn VideoWriter>>,
    detector: Arc<dyn FaceDetector>,
    annotator: Box<dyn FrameAnnotator>,
    preview: Option<Box<dyn PreviewSink>>,
    logger: Box<dyn PipelineLogger>,
    on_progress: Option<ProgressFn>,
    cancelled: Arc<AtomicBool>,
}

impl RecordVideoUseCase {
    pub fn new(
        camera: Box<dyn CameraSource>,
        writer: Box<dyn VideoWriter>,
        detector: Arc<dyn FaceDetector>,
    ) -> Self {
        Self {
            camera: Some(camera),
            writer: Some(writer),
            detector,
            annotator: Box::new(RectangleAnnotator::default()),
            preview: None,
            logger: Box::new(NullPipelineLogger),
            on_progress: None,
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn with_annotator(mut self, annotator: Box<dyn FrameAnnotator>) -> Self {
        self.annotator = annotator;
        self
    }

    pub fn with_preview(mut self, preview: Box<dyn PreviewSink>) -> Self {
        self.preview = Some(preview);
        self
    }

    pub fn with_logger(mut self, logger: Box<dyn PipelineLogger>) -> Self {
        self.logger = logger;
        self
    }

    pub fn with_progress(mut self, on_progress: ProgressFn) -> Self {
        self.on_progress = Some(on_progress);
        self
    }

    /// Shares a stop flag with the caller; it is polled once per frame.
    pub fn with_cancellation(mut self, cancelled: Arc<AtomicBool>) -> Self {
        self.cancelled = cancelled;
        self
    }

    pub fn cancellation_flag(&self) -> Arc<AtomicBool> {
        self.cancelled.clone()
    }

    pub fn execute(&mut self, settings: &CaptureSettings) -> Result<CaptureOutcome, CaptureError> {
        if self.camera.is_none() || self.writer.is_none() {
            return Err(CaptureError::AlreadyExecuted);
        }
        settings.validate()?;

        let (Some(mut camera), Some(mut writer)) = (self.camera.take(), self.writer.take()) else {
            return Err(CaptureError::AlreadyExecuted);
        };

        camera
            .open(&settings.camera_request())
            .map_err(CaptureError::DeviceUnavailable)?;

        if let Err(source) = writer.open(&settings.output_path, &settings.encoder_settings()) {
            camera.release();
            return Err(CaptureError::EncoderInit {
                path: settings.output_path.clone(),
                source,
            });
        }

        let mut session = CaptureSession::new(settings);
        self.logger.info(&format!(
            "Recording {} frames ({:.1}s @ {} fps) to {}",
            session.total_frames(),
            session.duration_secs(),
            session.fps(),
            settings.output_path.display()
        ));

        let loop_result = self.run_loop(&mut *camera, &mut *writer, &mut session, settings);

        camera.release();
        let close_result = writer.close();
        if let Some(mut preview) = self.preview.take() {
            preview.close();
        }
        self.logger.summary();

        match loop_result {
            Err(e) => {
                if let Err(close_err) = close_result {
                    log::warn!("Could not finalize partial output: {close_err}");
                }
                Err(e)
            }
            Ok(cancelled) => {
                close_result.map_err(|source| CaptureError::Finalize {
                    path: settings.output_path.clone(),
                    source,
                })?;
                if cancelled {
                    self.logger.info(&format!(
                        "Recording cancelled after {} of {} frames",
                        session.frames_written(),
                        session.total_frames()
                    ));
                }
                Ok(session.finish(cancelled))
            }
        }
    }

    /// Runs ticks until the budget is spent. Returns whether it was cancelled.
    fn run_loop(
        &mut self,
        camera: &mut dyn CameraSource,
        writer: &mut dyn VideoWriter,
        session: &mut CaptureSession,
        settings: &CaptureSettings,
    ) -> Result<bool, CaptureError> {
        let total = session.total_frames();
        let mut stop_requested = false;

        while !session.is_complete() {
            if stop_requested || self.cancelled.load(Ordering::Relaxed) {
                return Ok(true);
            }

            let t0 = Instant::now();
            let captured = camera
                .read_frame()
                .map_err(|source| CaptureError::CaptureRead {
                    frames_written: session.frames_written(),
                    source,
                })?;
            let mut frame = fit_frame(captured, settings.frame_width, settings.frame_height);
            frame.set_index(session.frames_written());
            self.logger.timing("read", elapsed_ms(t0));

            let t0 = Instant::now();
            let faces = self.detect_faces(&frame, &settings.detection);
            self.logger.timing("detect", elapsed_ms(t0));
            self.logger.metric("detections", faces.len() as f64);

            self.annotator.annotate(&mut frame, &faces);
            if !faces.is_empty() {
                self.logger.faces_detected(frame.index(), faces.len());
            }

            let t0 = Instant::now();
            writer
                .write(&frame)
                .map_err(|source| CaptureError::EncoderWrite {
                    frame_index: frame.index(),
                    source,
                })?;
            session.record_frame(faces.len());
            self.logger.timing("encode", elapsed_ms(t0));

            let t0 = Instant::now();
            self.show_preview(&frame);
            self.logger.timing("preview", elapsed_ms(t0));

            let written = session.frames_written();
            self.logger.progress(written, total);
            if let Some(cb) = &self.on_progress {
                stop_requested = !cb(written, total);
            }
        }

        Ok(false)
    }

    /// Detector failures count as "no faces" so one bad frame never ends a recording.
    fn detect_faces(&self, frame: &Frame, params: &DetectionParams) -> Vec<Region> {
        let gray = frame.to_grayscale();
        match self.detector.detect(&gray, params) {
            Ok(faces) => faces,
            Err(e) => {
                log::debug!("Detection failed on frame {}: {e}", frame.index());
                Vec::new()
            }
        }
    }

    /// A failing preview is dropped; recording continues without it.
    fn show_preview(&mut self, frame: &Frame) {
        let Some(preview) = self.preview.as_mut() else {
            return;
        };
        if let Err(e) = preview.show(frame) {
            log::warn!("Preview disabled: {e}");
            preview.close();
            self.preview = None;
        }
    }
}

/// Scales frames that arrive at a different resolution to the encoder geometry.
fn fit_frame(frame: Frame, width: u32, height: u32) -> Frame {
    if frame.width() == width && frame.height() == height {
        frame
    } else {
        frame.resized(width, height)
    }
}

fn elapsed_ms(start: Instant) -> f64 {
    start.elapsed().as_secs_f64() * 1000.0
}
