use thiserror::Error;

use crate::shared::constants::{
    DEFAULT_CAMERA_INDEX, DEFAULT_FPS, DEFAULT_FRAME_HEIGHT, DEFAULT_FRAME_WIDTH,
};
use crate::shared::frame::Frame;

#[derive(Error, Debug)]
pub enum CameraError {
    #[error("camera {index} unavailable: {reason}")]
    Unavailable { index: u32, reason: String },
    #[error("camera is not open")]
    NotOpened,
    #[error("camera stream ended")]
    EndOfStream,
    #[error("frame read failed: {0}")]
    Read(String),
}

/// What to ask the device for. Drivers may deliver something close instead.
#[derive(Clone, Debug, PartialEq)]
pub struct CameraRequest {
    pub index: u32,
    pub width: u32,
    pub height: u32,
    pub fps: f64,
}

impl Default for CameraRequest {
    fn default() -> Self {
        Self {
            index: DEFAULT_CAMERA_INDEX,
            width: DEFAULT_FRAME_WIDTH,
            height: DEFAULT_FRAME_HEIGHT,
            fps: DEFAULT_FPS,
        }
    }
}

/// A live frame source.
///
/// `read_frame` blocks until the next frame is available. Frames may
/// arrive at a different size than requested; callers fit them.
pub trait CameraSource: Send {
    fn open(&mut self, request: &CameraRequest) -> Result<(), CameraError>;

    fn read_frame(&mut self) -> Result<Frame, CameraError>;

    /// Stops the stream and frees the device. Safe to call repeatedly.
    fn release(&mut self);
}
