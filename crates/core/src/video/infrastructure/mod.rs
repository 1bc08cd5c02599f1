pub mod channel_preview_sink;
pub mod ffmpeg_probe;
pub mod ffmpeg_writer;
pub mod ffplay_preview_sink;
pub mod nokhwa_camera;
pub mod threaded_preview_sink;
