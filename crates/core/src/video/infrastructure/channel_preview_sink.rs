use crossbeam_channel::{Receiver, Sender, TrySendError};

use crate::shared::frame::Frame;
use crate::video::domain::preview_sink::{PreviewError, PreviewSink};

/// Hands preview frames to another thread through a bounded channel.
///
/// When the receiver lags the newest frame is dropped instead of blocking
/// capture. Embedders render from the paired [`Receiver`].
pub struct ChannelPreviewSink {
    tx: Sender<Frame>,
    dropped: usize,
}

impl ChannelPreviewSink {
    pub fn new(capacity: usize) -> (Self, Receiver<Frame>) {
        let (tx, rx) = crossbeam_channel::bounded(capacity.max(1));
        (Self { tx, dropped: 0 }, rx)
    }

    pub fn dropped(&self) -> usize {
        self.dropped
    }
}

impl PreviewSink for ChannelPreviewSink {
    fn show(&mut self, frame: &Frame) -> Result<(), PreviewError> {
        match self.tx.try_send(frame.clone()) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => {
                self.dropped += 1;
                Ok(())
            }
            Err(TrySendError::Disconnected(_)) => Err(PreviewError::Closed),
        }
    }
}
