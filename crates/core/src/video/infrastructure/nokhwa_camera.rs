use nokhwa::pixel_format::RgbFormat;
use nokhwa::utils::{
    CameraFormat, CameraIndex, FrameFormat, RequestedFormat, RequestedFormatType, Resolution,
};
use nokhwa::{nokhwa_initialize, Camera};

use crate::shared::frame::{Frame, PixelFormat};
use crate::video::domain::camera_source::{CameraError, CameraRequest, CameraSource};

/// Webcam capture through nokhwa's native backend.
///
/// Frames are decoded to RGB24 and numbered from 0 in arrival order.
pub struct NokhwaCamera {
    camera: Option<Camera>,
    next_index: usize,
}

// Safety: the camera handle is owned by one pipeline thread and never shared.
unsafe impl Send for NokhwaCamera {}

impl NokhwaCamera {
    pub fn new() -> Self {
        Self {
            camera: None,
            next_index: 0,
        }
    }

    pub fn is_open(&self) -> bool {
        self.camera.is_some()
    }
}

impl Default for NokhwaCamera {
    fn default() -> Self {
        Self::new()
    }
}

impl CameraSource for NokhwaCamera {
    fn open(&mut self, request: &CameraRequest) -> Result<(), CameraError> {
        self.release();

        nokhwa_initialize(|granted| {
            log::debug!("Camera access granted: {granted}");
        });

        let unavailable = |e: nokhwa::NokhwaError| CameraError::Unavailable {
            index: request.index,
            reason: e.to_string(),
        };

        let fps = request.fps.round().max(1.0) as u32;
        let wanted = CameraFormat::new(
            Resolution::new(request.width, request.height),
            FrameFormat::MJPEG,
            fps,
        );
        let format = RequestedFormat::new::<RgbFormat>(RequestedFormatType::Closest(wanted));

        let mut camera =
            Camera::new(CameraIndex::Index(request.index), format).map_err(unavailable)?;
        camera.open_stream().map_err(unavailable)?;

        let actual = camera.camera_format();
        log::info!(
            "Camera {} opened: {}x{} @ {} fps ({:?})",
            request.index,
            actual.resolution().width(),
            actual.resolution().height(),
            actual.frame_rate(),
            actual.format()
        );

        self.camera = Some(camera);
        self.next_index = 0;
        Ok(())
    }

    fn read_frame(&mut self) -> Result<Frame, CameraError> {
        let camera = self.camera.as_mut().ok_or(CameraError::NotOpened)?;
        if !camera.is_stream_open() {
            return Err(CameraError::EndOfStream);
        }

        let buffer = camera
            .frame()
            .map_err(|e| CameraError::Read(e.to_string()))?;
        let image = buffer
            .decode_image::<RgbFormat>()
            .map_err(|e| CameraError::Read(e.to_string()))?;

        let (width, height) = image.dimensions();
        let frame = Frame::new(
            image.into_raw(),
            width,
            height,
            PixelFormat::Rgb24,
            self.next_index,
        );
        self.next_index += 1;
        Ok(frame)
    }

    fn release(&mut self) {
        if let Some(mut camera) = self.camera.take() {
            if let Err(e) = camera.stop_stream() {
                log::warn!("Failed to stop camera stream: {e}");
            }
            log::debug!("Camera released after {} frames", self.next_index);
        }
    }
}

impl Drop for NokhwaCamera {
    fn drop(&mut self) {
        self.release();
    }
}
