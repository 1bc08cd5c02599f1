use std::path::PathBuf;

use thiserror::Error;

use crate::detection::domain::face_detector::DetectionParams;
use crate::shared::constants::{
    DEFAULT_CAMERA_INDEX, DEFAULT_DURATION_SECS, DEFAULT_FPS, DEFAULT_FRAME_HEIGHT,
    DEFAULT_FRAME_WIDTH, DEFAULT_OUTPUT_FILENAME,
};
use crate::video::domain::camera_source::{CameraError, CameraRequest};
use crate::video::domain::video_writer::{EncoderError, EncoderSettings};

#[derive(Error, Debug)]
pub enum CaptureError {
    #[error("invalid capture settings: {0}")]
    InvalidSettings(String),
    #[error("camera unavailable: {0}")]
    DeviceUnavailable(#[source] CameraError),
    #[error("cannot create output {path}: {source}")]
    EncoderInit {
        path: PathBuf,
        #[source]
        source: EncoderError,
    },
    #[error("camera read failed after {frames_written} frames: {source}")]
    CaptureRead {
        frames_written: usize,
        #[source]
        source: CameraError,
    },
    #[error("writing frame {frame_index} failed: {source}")]
    EncoderWrite {
        frame_index: usize,
        #[source]
        source: EncoderError,
    },
    #[error("finalizing {path} failed: {source}")]
    Finalize {
        path: PathBuf,
        #[source]
        source: EncoderError,
    },
    #[error("capture session already executed")]
    AlreadyExecuted,
}

/// Everything needed to run one recording.
#[derive(Clone, Debug, PartialEq)]
pub struct CaptureSettings {
    pub output_path: PathBuf,
    pub duration_secs: f64,
    pub fps: f64,
    pub frame_width: u32,
    pub frame_height: u32,
    pub camera_index: u32,
    pub detection: DetectionParams,
}

impl CaptureSettings {
    pub fn new(output_path: impl Into<PathBuf>, duration_secs: f64) -> Self {
        Self {
            output_path: output_path.into(),
            duration_secs,
            ..Self::default()
        }
    }

    /// Checks the settings before any device or file is touched.
    pub fn validate(&self) -> Result<(), CaptureError> {
        let invalid = |msg: String| Err(CaptureError::InvalidSettings(msg));

        if !self.duration_secs.is_finite() || self.duration_secs < 0.0 {
            return invalid(format!(
                "duration must be a non-negative number of seconds, got {}",
                self.duration_secs
            ));
        }
        if !self.fps.is_finite() || self.fps <= 0.0 {
            return invalid(format!("frame rate must be positive, got {}", self.fps));
        }
        if self.frame_width == 0 || self.frame_height == 0 {
            return invalid(format!(
                "frame size must be non-zero, got {}x{}",
                self.frame_width, self.frame_height
            ));
        }
        if self.frame_width % 2 != 0 || self.frame_height % 2 != 0 {
            return invalid(format!(
                "frame size must be even, got {}x{}",
                self.frame_width, self.frame_height
            ));
        }
        if self.output_path.as_os_str().is_empty() {
            return invalid("output path is empty".into());
        }
        self.detection
            .validate()
            .map_err(|e| CaptureError::InvalidSettings(e.to_string()))
    }

    /// `round(duration * fps)`.
    pub fn total_frames(&self) -> usize {
        (self.duration_secs * self.fps).round() as usize
    }

    pub fn camera_request(&self) -> CameraRequest {
        CameraRequest {
            index: self.camera_index,
            width: self.frame_width,
            height: self.frame_height,
            fps: self.fps,
        }
    }

    pub fn encoder_settings(&self) -> EncoderSettings {
        EncoderSettings::new(self.frame_width, self.frame_height, self.fps)
    }
}

impl Default for CaptureSettings {
    fn default() -> Self {
        Self {
            output_path: PathBuf::from(DEFAULT_OUTPUT_FILENAME),
            duration_secs: DEFAULT_DURATION_SECS,
            fps: DEFAULT_FPS,
            frame_width: DEFAULT_FRAME_WIDTH,
            frame_height: DEFAULT_FRAME_HEIGHT,
            camera_index: DEFAULT_CAMERA_INDEX,
            detection: DetectionParams::default(),
        }
    }
}

/// Running state of one recording, updated once per written frame.
#[derive(Debug)]
pub struct CaptureSession {
    output_path: PathBuf,
    fps: f64,
    duration_secs: f64,
    total_frames: usize,
    frames_written: usize,
    total_detections: usize,
    frames_with_faces: usize,
}

impl CaptureSession {
    pub fn new(settings: &CaptureSettings) -> Self {
        Self {
            output_path: settings.output_path.clone(),
            fps: settings.fps,
            duration_secs: settings.duration_secs,
            total_frames: settings.total_frames(),
            frames_written: 0,
            total_detections: 0,
            frames_with_faces: 0,
        }
    }

    pub fn fps(&self) -> f64 {
        self.fps
    }

    pub fn duration_secs(&self) -> f64 {
        self.duration_secs
    }

    pub fn total_frames(&self) -> usize {
        self.total_frames
    }

    pub fn frames_written(&self) -> usize {
        self.frames_written
    }

    pub fn is_complete(&self) -> bool {
        self.frames_written >= self.total_frames
    }

    pub fn any_faces(&self) -> bool {
        self.frames_with_faces > 0
    }

    pub fn record_frame(&mut self, detections: usize) {
        self.frames_written += 1;
        self.total_detections += detections;
        if detections > 0 {
            self.frames_with_faces += 1;
        }
    }

    pub fn finish(self, cancelled: bool) -> CaptureOutcome {
        CaptureOutcome {
            faces_detected: self.any_faces(),
            output_path: self.output_path,
            frames_written: self.frames_written,
            total_frames: self.total_frames,
            cancelled,
            total_detections: self.total_detections,
            frames_with_faces: self.frames_with_faces,
        }
    }
}

/// Result of a finished (or cancelled) recording.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CaptureOutcome {
    /// The finalized output file.
    pub output_path: PathBuf,
    /// True once any frame contained at least one face.
    pub faces_detected: bool,
    pub frames_written: usize,
    /// Frame budget the session was started with.
    pub total_frames: usize,
    pub cancelled: bool,
    pub total_detections: usize,
    pub frames_with_faces: usize,
}
