pub mod constants;
pub mod frame;
pub mod media_metadata;
pub mod region;
pub mod video_handle;
