use std::path::Path;

use thiserror::Error;

use crate::shared::constants::{DEFAULT_FPS, DEFAULT_FRAME_HEIGHT, DEFAULT_FRAME_WIDTH};
use crate::shared::frame::Frame;

#[derive(Error, Debug)]
pub enum EncoderError {
    #[error("encoder initialisation failed: {0}")]
    Init(String),
    #[error("encoder not opened")]
    NotOpened,
    #[error("frame is {got_w}x{got_h}, encoder expects {want_w}x{want_h}")]
    FrameSize {
        got_w: u32,
        got_h: u32,
        want_w: u32,
        want_h: u32,
    },
    #[error("frame encoding failed: {0}")]
    Write(String),
    #[error("finalizing output failed: {0}")]
    Finalize(String),
}

/// Video codec requested from the encoder.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Codec {
    /// MPEG-4 Part 2 (fourcc `mp4v`).
    Mpeg4,
}

#[derive(Clone, Debug, PartialEq)]
pub struct EncoderSettings {
    pub width: u32,
    pub height: u32,
    pub fps: f64,
    pub codec: Codec,
}

impl EncoderSettings {
    pub fn new(width: u32, height: u32, fps: f64) -> Self {
        Self {
            width,
            height,
            fps,
            codec: Codec::Mpeg4,
        }
    }
}

impl Default for EncoderSettings {
    fn default() -> Self {
        Self::new(DEFAULT_FRAME_WIDTH, DEFAULT_FRAME_HEIGHT, DEFAULT_FPS)
    }
}

/// Abstracts video encoding so the pipeline can write output without
/// depending on a specific codec library.
pub trait VideoWriter: Send {
    fn open(&mut self, path: &Path, settings: &EncoderSettings) -> Result<(), EncoderError>;

    /// Frames must match the opened geometry; they are encoded in call order.
    fn write(&mut self, frame: &Frame) -> Result<(), EncoderError>;

    /// Flushes buffered packets and writes the container trailer.
    /// Calling it again after a successful close is a no-op.
    fn close(&mut self) -> Result<(), EncoderError>;
}
