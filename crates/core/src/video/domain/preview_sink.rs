use thiserror::Error;

use crate::shared::frame::Frame;

#[derive(Error, Debug)]
pub enum PreviewError {
    #[error("preview unavailable: {0}")]
    Unavailable(String),
    #[error("preview display closed")]
    Closed,
}

/// Live display of annotated frames while recording.
///
/// `show` must not hold the caller up for long: a slow display drops
/// frames rather than throttling capture.
pub trait PreviewSink: Send {
    fn show(&mut self, frame: &Frame) -> Result<(), PreviewError>;

    /// Tears the display down. Default: no-op.
    fn close(&mut self) {}
}

/// Discards every frame. Used for headless recording.
pub struct NullPreviewSink;

impl PreviewSink for NullPreviewSink {
    fn show(&mut self, _frame: &Frame) -> Result<(), PreviewError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::frame::PixelFormat;

    #[test]
    fn test_null_sink_accepts_everything() {
        let mut sink = NullPreviewSink;
        for i in 0..3 {
            sink.show(&Frame::filled(4, 4, PixelFormat::Bgr24, 0, i)).unwrap();
        }
        sink.close();
    }
}
