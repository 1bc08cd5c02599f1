use std::thread::JoinHandle;
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, TrySendError};

use crate::shared::frame::Frame;
use crate::video::domain::preview_sink::{PreviewError, PreviewSink};

/// How long `close` waits for the worker before detaching it.
pub const DEFAULT_CLOSE_TIMEOUT: Duration = Duration::from_millis(500);

/// Runs another sink on its own thread so a slow display never stalls capture.
///
/// Holds at most one pending frame; frames arriving while the worker is
/// busy are dropped. `close` waits at most `close_timeout` for the worker;
/// a worker still stuck inside the inner sink after that is detached.
pub struct ThreadedPreviewSink {
    tx: Option<Sender<Frame>>,
    handle: Option<JoinHandle<()>>,
    // Disconnects when the worker exits.
    done: Receiver<()>,
    close_timeout: Duration,
    dropped: usize,
}

impl ThreadedPreviewSink {
    pub fn new(mut inner: Box<dyn PreviewSink>) -> Self {
        let (tx, rx) = crossbeam_channel::bounded::<Frame>(1);
        let (done_tx, done) = crossbeam_channel::bounded::<()>(0);
        let handle = std::thread::spawn(move || {
            let _done = done_tx;
            for frame in rx {
                if let Err(e) = inner.show(&frame) {
                    log::warn!("Preview stopped: {e}");
                    break;
                }
            }
            inner.close();
        });
        Self {
            tx: Some(tx),
            handle: Some(handle),
            done,
            close_timeout: DEFAULT_CLOSE_TIMEOUT,
            dropped: 0,
        }
    }

    pub fn with_close_timeout(mut self, timeout: Duration) -> Self {
        self.close_timeout = timeout;
        self
    }

    pub fn dropped(&self) -> usize {
        self.dropped
    }
}

impl PreviewSink for ThreadedPreviewSink {
    fn show(&mut self, frame: &Frame) -> Result<(), PreviewError> {
        let Some(tx) = self.tx.as_ref() else {
            return Err(PreviewError::Closed);
        };
        match tx.try_send(frame.clone()) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => {
                self.dropped += 1;
                Ok(())
            }
            Err(TrySendError::Disconnected(_)) => Err(PreviewError::Closed),
        }
    }

    fn close(&mut self) {
        drop(self.tx.take());
        let Some(handle) = self.handle.take() else {
            return;
        };
        match self.done.recv_timeout(self.close_timeout) {
            Err(RecvTimeoutError::Timeout) => {
                log::warn!(
                    "Preview did not stop within {:?}; detaching it",
                    self.close_timeout
                );
            }
            _ => {
                if handle.join().is_err() {
                    log::warn!("Preview thread panicked");
                }
            }
        }
        if self.dropped > 0 {
            log::debug!("Preview dropped {} frames", self.dropped);
        }
    }
}

impl Drop for ThreadedPreviewSink {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Instant;

    use crate::shared::frame::PixelFormat;

    struct CountingSink {
        shown: Arc<AtomicUsize>,
        closed: Arc<AtomicBool>,
    }

    impl PreviewSink for CountingSink {
        fn show(&mut self, _frame: &Frame) -> Result<(), PreviewError> {
            self.shown.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
        fn close(&mut self) {
            self.closed.store(true, Ordering::SeqCst);
        }
    }

    struct FailingSink;

    impl PreviewSink for FailingSink {
        fn show(&mut self, _frame: &Frame) -> Result<(), PreviewError> {
            Err(PreviewError::Unavailable("no display".into()))
        }
    }

    fn frame(i: usize) -> Frame {
        Frame::filled(2, 2, PixelFormat::Bgr24, 0, i)
    }

    #[test]
    fn test_forwards_frames_and_closes_inner() {
        let shown = Arc::new(AtomicUsize::new(0));
        let closed = Arc::new(AtomicBool::new(false));
        let mut sink = ThreadedPreviewSink::new(Box::new(CountingSink {
            shown: shown.clone(),
            closed: closed.clone(),
        }));

        for i in 0..10 {
            sink.show(&frame(i)).unwrap();
        }
        sink.close();

        let delivered = shown.load(Ordering::SeqCst);
        assert!(delivered >= 1);
        assert_eq!(delivered + sink.dropped(), 10);
        assert!(closed.load(Ordering::SeqCst));
    }

    #[test]
    fn test_failing_inner_eventually_reports_closed() {
        let mut sink = ThreadedPreviewSink::new(Box::new(FailingSink));
        sink.show(&frame(0)).unwrap();

        let mut saw_closed = false;
        for i in 1..1000 {
            if matches!(sink.show(&frame(i)), Err(PreviewError::Closed)) {
                saw_closed = true;
                break;
            }
            std::thread::sleep(std::time::Duration::from_millis(1));
        }
        assert!(saw_closed);
    }

    /// Blocks in `show` until `release` is set, like a paused player window.
    pub(crate) struct StalledSink {
        pub(crate) release: Arc<AtomicBool>,
    }

    impl PreviewSink for StalledSink {
        fn show(&mut self, _frame: &Frame) -> Result<(), PreviewError> {
            let deadline = Instant::now() + Duration::from_secs(10);
            while !self.release.load(Ordering::SeqCst) && Instant::now() < deadline {
                std::thread::sleep(Duration::from_millis(5));
            }
            Ok(())
        }
    }

    #[test]
    fn test_close_gives_up_on_stalled_inner() {
        let release = Arc::new(AtomicBool::new(false));
        let mut sink = ThreadedPreviewSink::new(Box::new(StalledSink {
            release: release.clone(),
        }))
        .with_close_timeout(Duration::from_millis(50));

        sink.show(&frame(0)).unwrap();
        std::thread::sleep(Duration::from_millis(20));

        let start = Instant::now();
        sink.close();
        assert!(start.elapsed() < Duration::from_secs(1));
        release.store(true, Ordering::SeqCst);
    }

    #[test]
    fn test_show_after_close_is_closed() {
        let mut sink = ThreadedPreviewSink::new(Box::new(FailingSink));
        sink.close();
        assert!(matches!(sink.show(&frame(0)), Err(PreviewError::Closed)));
    }
}
