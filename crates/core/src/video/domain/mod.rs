pub mod camera_source;
pub mod media_probe;
pub mod preview_sink;
pub mod video_writer;
