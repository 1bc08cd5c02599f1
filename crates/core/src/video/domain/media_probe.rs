use std::path::Path;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProbeError {
    #[error("cannot open container: {0}")]
    Open(String),
    #[error("no video stream found")]
    NoVideoStream,
    #[error("unsupported video stream: {0}")]
    Codec(String),
}

/// Container-level facts about the primary video stream.
#[derive(Clone, Debug, PartialEq)]
pub struct ContainerInfo {
    pub duration: f64,
    pub fps: f64,
    pub width: u32,
    pub height: u32,
}

/// Reads stream properties from a media container without decoding frames.
pub trait MediaProbe: Send + Sync {
    fn probe(&self, path: &Path) -> Result<ContainerInfo, ProbeError>;
}
