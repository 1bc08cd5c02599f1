pub mod capture_session;
pub mod pipeline_logger;
pub mod record_video_use_case;
