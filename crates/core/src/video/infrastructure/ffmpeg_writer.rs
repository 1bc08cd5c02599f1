use std::path::{Path, PathBuf};

use crate::shared::frame::{Frame, PixelFormat};
use crate::video::domain::video_writer::{Codec, EncoderError, EncoderSettings, VideoWriter};

/// Encodes video frames via ffmpeg-next (libavformat + libavcodec).
///
/// The container is chosen from the output extension; the video track is
/// MPEG-4 Part 2 in YUV420P. Frames may arrive as BGR, RGB or grayscale.
pub struct FfmpegWriter {
    output_path: Option<PathBuf>,
    octx: Option<ffmpeg_next::format::context::Output>,
    encoder: Option<ffmpeg_next::codec::encoder::video::Encoder>,
    scaler: Option<(PixelFormat, ffmpeg_next::software::scaling::Context)>,
    width: u32,
    height: u32,
    time_base: ffmpeg_next::Rational,
    frame_count: usize,
    video_stream_index: usize,
}

// Safety: FfmpegWriter is only used from a single thread at a time.
// The raw pointers inside ffmpeg types are not shared across threads.
unsafe impl Send for FfmpegWriter {}

impl FfmpegWriter {
    pub fn new() -> Self {
        Self {
            output_path: None,
            octx: None,
            encoder: None,
            scaler: None,
            width: 0,
            height: 0,
            time_base: ffmpeg_next::Rational(0, 1),
            frame_count: 0,
            video_stream_index: 0,
        }
    }

    pub fn frames_written(&self) -> usize {
        self.frame_count
    }

    fn scaler_for(
        &mut self,
        format: PixelFormat,
    ) -> Result<&mut ffmpeg_next::software::scaling::Context, EncoderError> {
        let stale = !matches!(self.scaler, Some((f, _)) if f == format);
        if stale {
            let ctx = ffmpeg_next::software::scaling::Context::get(
                av_pixel(format),
                self.width,
                self.height,
                ffmpeg_next::format::Pixel::YUV420P,
                self.width,
                self.height,
                ffmpeg_next::software::scaling::Flags::BILINEAR,
            )
            .map_err(|e| EncoderError::Write(e.to_string()))?;
            self.scaler = Some((format, ctx));
        }
        match self.scaler.as_mut() {
            Some((_, ctx)) => Ok(ctx),
            None => Err(EncoderError::NotOpened),
        }
    }

    /// Drains every packet the encoder has ready into the container.
    fn drain_packets(&mut self) -> Result<(), ffmpeg_next::Error> {
        let (Some(encoder), Some(octx)) = (self.encoder.as_mut(), self.octx.as_mut()) else {
            return Ok(());
        };
        let ost_time_base = octx
            .stream(self.video_stream_index)
            .map(|s| s.time_base())
            .unwrap_or(self.time_base);

        let mut encoded = ffmpeg_next::Packet::empty();
        while encoder.receive_packet(&mut encoded).is_ok() {
            encoded.set_stream(self.video_stream_index);
            encoded.set_duration(1);
            encoded.rescale_ts(self.time_base, ost_time_base);
            encoded.write_interleaved(octx)?;
        }
        Ok(())
    }
}

impl Default for FfmpegWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl VideoWriter for FfmpegWriter {
    fn open(&mut self, path: &Path, settings: &EncoderSettings) -> Result<(), EncoderError> {
        let init = |e: ffmpeg_next::Error| EncoderError::Init(e.to_string());

        if settings.width == 0 || settings.height == 0 {
            return Err(EncoderError::Init(format!(
                "invalid frame size {}x{}",
                settings.width, settings.height
            )));
        }
        // YUV420P needs even dimensions.
        if settings.width % 2 != 0 || settings.height % 2 != 0 {
            return Err(EncoderError::Init(format!(
                "frame size {}x{} must be even",
                settings.width, settings.height
            )));
        }

        ffmpeg_next::init().map_err(init)?;

        let mut octx = ffmpeg_next::format::output(path).map_err(init)?;

        let global_header = octx
            .format()
            .flags()
            .contains(ffmpeg_next::format::Flags::GLOBAL_HEADER);

        let codec_id = match settings.codec {
            Codec::Mpeg4 => ffmpeg_next::codec::Id::MPEG4,
        };
        let codec = ffmpeg_next::encoder::find(codec_id)
            .ok_or_else(|| EncoderError::Init(format!("{codec_id:?} encoder not found")))?;

        let mut ost = octx.add_stream(Some(codec)).map_err(init)?;

        let mut encoder_ctx = ffmpeg_next::codec::context::Context::new_with_codec(codec)
            .encoder()
            .video()
            .map_err(init)?;

        encoder_ctx.set_width(settings.width);
        encoder_ctx.set_height(settings.height);
        encoder_ctx.set_format(ffmpeg_next::format::Pixel::YUV420P);

        let frame_rate = frame_rate(settings.fps)
            .ok_or_else(|| EncoderError::Init(format!("unsupported frame rate {}", settings.fps)))?;
        let time_base = frame_rate.invert();

        encoder_ctx.set_time_base(time_base);
        encoder_ctx.set_frame_rate(Some(frame_rate));

        if global_header {
            encoder_ctx.set_flags(ffmpeg_next::codec::Flags::GLOBAL_HEADER);
        }

        let encoder = encoder_ctx
            .open_with(ffmpeg_next::Dictionary::new())
            .map_err(init)?;
        ost.set_parameters(&encoder);
        ost.set_time_base(time_base);
        ost.set_avg_frame_rate(frame_rate);

        self.video_stream_index = 0; // only stream

        octx.write_header().map_err(init)?;

        self.width = settings.width;
        self.height = settings.height;
        self.time_base = time_base;
        self.output_path = Some(path.to_path_buf());
        self.octx = Some(octx);
        self.encoder = Some(encoder);
        self.scaler = None;
        self.frame_count = 0;

        log::debug!(
            "Encoder opened: {} ({}x{} @ {}/{} fps)",
            path.display(),
            settings.width,
            settings.height,
            frame_rate.numerator(),
            frame_rate.denominator()
        );
        Ok(())
    }

    fn write(&mut self, frame: &Frame) -> Result<(), EncoderError> {
        if self.encoder.is_none() {
            return Err(EncoderError::NotOpened);
        }
        if frame.width() != self.width || frame.height() != self.height {
            return Err(EncoderError::FrameSize {
                got_w: frame.width(),
                got_h: frame.height(),
                want_w: self.width,
                want_h: self.height,
            });
        }

        let format = frame.format();
        let row_bytes = self.width as usize * format.channels() as usize;
        let mut src_frame =
            ffmpeg_next::util::frame::video::Video::new(av_pixel(format), self.width, self.height);

        let stride = src_frame.stride(0);
        let data = src_frame.data_mut(0);
        let src = frame.data();

        // Copy pixel data, respecting stride
        for row in 0..self.height as usize {
            let src_start = row * row_bytes;
            let dst_start = row * stride;
            data[dst_start..dst_start + row_bytes]
                .copy_from_slice(&src[src_start..src_start + row_bytes]);
        }

        let mut yuv_frame = ffmpeg_next::util::frame::video::Video::empty();
        self.scaler_for(format)?
            .run(&src_frame, &mut yuv_frame)
            .map_err(|e| EncoderError::Write(e.to_string()))?;
        yuv_frame.set_pts(Some(self.frame_count as i64));

        if let Some(encoder) = self.encoder.as_mut() {
            encoder
                .send_frame(&yuv_frame)
                .map_err(|e| EncoderError::Write(e.to_string()))?;
        }
        self.drain_packets()
            .map_err(|e| EncoderError::Write(e.to_string()))?;

        self.frame_count += 1;
        Ok(())
    }

    fn close(&mut self) -> Result<(), EncoderError> {
        let finalize = |e: ffmpeg_next::Error| EncoderError::Finalize(e.to_string());

        let result = match self.encoder.as_mut() {
            Some(encoder) => {
                let flushed = encoder.send_eof().map_err(finalize).and_then(|_| {
                    // Flush encoder
                    self.drain_packets().map_err(finalize)
                });
                flushed.and_then(|_| match self.octx.as_mut() {
                    Some(octx) => octx.write_trailer().map_err(finalize),
                    None => Ok(()),
                })
            }
            None => Ok(()),
        };

        if result.is_ok() {
            if let Some(path) = self.output_path.as_ref() {
                log::debug!("Finalized {} ({} frames)", path.display(), self.frame_count);
            }
        }

        self.octx = None;
        self.encoder = None;
        self.scaler = None;
        self.output_path = None;

        result
    }
}

impl Drop for FfmpegWriter {
    fn drop(&mut self) {
        if self.encoder.is_some() {
            if let Err(e) = self.close() {
                log::warn!("Failed to finalize video on drop: {e}");
            }
        }
    }
}

/// MPEG-4 Part 2 caps both terms of the time base at 16 bits.
const MAX_RATE_TERM: i64 = 65_535;

/// Closest fraction to `fps` whose terms fit the MPEG-4 time base, by
/// continued-fraction expansion. `None` for rates that cannot be expressed.
fn frame_rate(fps: f64) -> Option<ffmpeg_next::Rational> {
    if !fps.is_finite() || fps <= 0.0 {
        return None;
    }
    let (mut num, mut prev_num) = (1i64, 0i64);
    let (mut den, mut prev_den) = (0i64, 1i64);
    let mut x = fps;
    loop {
        let a = x.floor();
        if a > MAX_RATE_TERM as f64 {
            break;
        }
        let a = a as i64;
        let next_num = a * num + prev_num;
        let next_den = a * den + prev_den;
        if next_num > MAX_RATE_TERM || next_den > MAX_RATE_TERM {
            break;
        }
        (prev_num, num) = (num, next_num);
        (prev_den, den) = (den, next_den);

        let frac = x - a as f64;
        if frac < 1e-9 || ((num as f64 / den as f64) - fps).abs() <= fps * 1e-9 {
            break;
        }
        x = 1.0 / frac;
    }
    (num > 0 && den > 0).then(|| ffmpeg_next::Rational(num as i32, den as i32))
}

fn av_pixel(format: PixelFormat) -> ffmpeg_next::format::Pixel {
    match format {
        PixelFormat::Bgr24 => ffmpeg_next::format::Pixel::BGR24,
        PixelFormat::Rgb24 => ffmpeg_next::format::Pixel::RGB24,
        PixelFormat::Gray8 => ffmpeg_next::format::Pixel::GRAY8,
    }
}
