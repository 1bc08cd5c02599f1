use std::io::Write;
use std::process::{Child, Command, Stdio};

use crate::shared::constants::DEFAULT_FPS;
use crate::shared::frame::{Frame, PixelFormat};
use crate::video::domain::preview_sink::{PreviewError, PreviewSink};

/// Streams raw frames into an `ffplay` window.
///
/// The player is spawned on the first frame, once the geometry is known.
/// Closing the window makes the next `show` return [`PreviewError::Closed`].
pub struct FfplayPreviewSink {
    title: String,
    fps: f64,
    child: Option<Child>,
}

impl FfplayPreviewSink {
    pub fn new(title: impl Into<String>, fps: f64) -> Self {
        Self {
            title: title.into(),
            fps,
            child: None,
        }
    }

    fn spawn(&self, frame: &Frame) -> Result<Child, PreviewError> {
        Command::new("ffplay")
            .args(ffplay_args(
                &self.title,
                frame.format(),
                frame.width(),
                frame.height(),
                self.fps,
            ))
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| PreviewError::Unavailable(format!("cannot start ffplay: {e}")))
    }
}

impl PreviewSink for FfplayPreviewSink {
    fn show(&mut self, frame: &Frame) -> Result<(), PreviewError> {
        if self.child.is_none() {
            self.child = Some(self.spawn(frame)?);
        }
        let stdin = self
            .child
            .as_mut()
            .and_then(|c| c.stdin.as_mut())
            .ok_or(PreviewError::Closed)?;
        stdin
            .write_all(frame.data())
            .and_then(|_| stdin.flush())
            .map_err(|_| PreviewError::Closed)
    }

    fn close(&mut self) {
        if let Some(mut child) = self.child.take() {
            drop(child.stdin.take());
            let _ = child.kill();
            let _ = child.wait();
        }
    }
}

impl Drop for FfplayPreviewSink {
    fn drop(&mut self) {
        self.close();
    }
}

fn ffplay_args(title: &str, format: PixelFormat, width: u32, height: u32, fps: f64) -> Vec<String> {
    let pixel_format = match format {
        PixelFormat::Bgr24 => "bgr24",
        PixelFormat::Rgb24 => "rgb24",
        PixelFormat::Gray8 => "gray",
    };
    [
        "-loglevel",
        "quiet",
        "-window_title",
        title,
        "-f",
        "rawvideo",
        "-pixel_format",
        pixel_format,
        "-video_size",
        &format!("{width}x{height}"),
        "-framerate",
        &frame_rate_arg(fps),
        "-fflags",
        "nobuffer",
        "-flags",
        "low_delay",
        "-",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

/// ffplay accepts decimal rates, so fractional rates are passed through unrounded.
fn frame_rate_arg(fps: f64) -> String {
    if fps.is_finite() && fps > 0.0 {
        format!("{fps}")
    } else {
        format!("{DEFAULT_FPS}")
    }
}
