pub mod annotation;
pub mod detection;
pub mod integrity;
pub mod metadata;
pub mod pipeline;
pub mod shared;
pub mod video;
