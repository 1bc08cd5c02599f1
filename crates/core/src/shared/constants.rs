pub const CASCADE_MODEL_NAME: &str = "haarcascade_frontalface_default.xml";
pub const CASCADE_MODEL_URL: &str =
    "https://raw.githubusercontent.com/opencv/opencv/4.x/data/haarcascades/haarcascade_frontalface_default.xml";

pub const DEFAULT_CAMERA_INDEX: u32 = 0;
pub const DEFAULT_FPS: f64 = 20.0;
pub const DEFAULT_FRAME_WIDTH: u32 = 640;
pub const DEFAULT_FRAME_HEIGHT: u32 = 480;
pub const DEFAULT_DURATION_SECS: f64 = 5.0;
pub const DEFAULT_OUTPUT_FILENAME: &str = "recorded_video.mp4";

/// Detector pyramid step between scales.
pub const DEFAULT_SCALE_FACTOR: f64 = 1.3;
/// Raw hits a grouped detection needs to exceed to be reported.
pub const DEFAULT_MIN_NEIGHBORS: u32 = 5;

/// Overlay colour, RGB (blue).
pub const OVERLAY_COLOR: [u8; 3] = [0, 0, 255];
pub const OVERLAY_THICKNESS: u32 = 2;

/// Read size for streaming digests.
pub const DIGEST_CHUNK_SIZE: usize = 4096;

pub const VIDEO_EXTENSIONS: &[&str] = &["mp4", "avi", "mov", "mkv", "m4v"];
