use std::path::Path;

use crate::video::domain::media_probe::{ContainerInfo, MediaProbe, ProbeError};

/// Container durations are reported in `AV_TIME_BASE` units.
const AV_TIME_BASE: f64 = 1_000_000.0;

/// Reads container properties via ffmpeg-next (libavformat).
///
/// Only headers and stream parameters are inspected; no frame is decoded.
#[derive(Default)]
pub struct FfmpegProbe;

impl FfmpegProbe {
    pub fn new() -> Self {
        Self
    }
}

impl MediaProbe for FfmpegProbe {
    fn probe(&self, path: &Path) -> Result<ContainerInfo, ProbeError> {
        ffmpeg_next::init().map_err(|e| ProbeError::Open(e.to_string()))?;

        let ictx = ffmpeg_next::format::input(path).map_err(|e| ProbeError::Open(e.to_string()))?;

        let stream = ictx
            .streams()
            .best(ffmpeg_next::media::Type::Video)
            .ok_or(ProbeError::NoVideoStream)?;

        let codec_ctx = ffmpeg_next::codec::context::Context::from_parameters(stream.parameters())
            .map_err(|e| ProbeError::Codec(e.to_string()))?;
        let decoder = codec_ctx
            .decoder()
            .video()
            .map_err(|e| ProbeError::Codec(e.to_string()))?;

        if decoder.width() == 0 || decoder.height() == 0 {
            return Err(ProbeError::Codec("stream reports zero frame size".into()));
        }

        let fps = rational_to_f64(stream.avg_frame_rate())
            .filter(|fps| *fps > 0.0)
            .or_else(|| rational_to_f64(stream.rate()))
            .unwrap_or(0.0);

        let duration = if ictx.duration() > 0 {
            ictx.duration() as f64 / AV_TIME_BASE
        } else {
            let tb = rational_to_f64(stream.time_base()).unwrap_or(0.0);
            (stream.duration().max(0) as f64) * tb
        };

        Ok(ContainerInfo {
            duration,
            fps,
            width: decoder.width(),
            height: decoder.height(),
        })
    }
}

fn rational_to_f64(rate: ffmpeg_next::Rational) -> Option<f64> {
    if rate.denominator() == 0 {
        None
    } else {
        Some(rate.numerator() as f64 / rate.denominator() as f64)
    }
}
