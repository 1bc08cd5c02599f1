use thiserror::Error;

use crate::shared::constants::{DEFAULT_MIN_NEIGHBORS, DEFAULT_SCALE_FACTOR};
use crate::shared::frame::{Frame, PixelFormat};
use crate::shared::region::Region;

#[derive(Error, Debug)]
pub enum DetectionError {
    #[error("detector expects a grayscale frame, got {0:?}")]
    NotGrayscale(PixelFormat),
    #[error("invalid detection parameters: {0}")]
    InvalidParams(String),
}

/// Tuning knobs for a multi-scale detection pass.
#[derive(Clone, Debug, PartialEq)]
pub struct DetectionParams {
    /// Pyramid step between scales; must exceed 1.0.
    pub scale_factor: f64,
    /// A grouped box is kept only when more than this many raw hits support it.
    pub min_neighbors: u32,
    /// Smallest face (width, height) to look for.
    pub min_size: Option<(u32, u32)>,
    /// Largest face (width, height) to look for.
    pub max_size: Option<(u32, u32)>,
}

impl DetectionParams {
    pub fn new(scale_factor: f64, min_neighbors: u32) -> Self {
        Self {
            scale_factor,
            min_neighbors,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<(), DetectionError> {
        if !self.scale_factor.is_finite() || self.scale_factor <= 1.0 {
            return Err(DetectionError::InvalidParams(format!(
                "scale factor must be greater than 1.0, got {}",
                self.scale_factor
            )));
        }
        if let (Some(min), Some(max)) = (self.min_size, self.max_size) {
            if min.0 > max.0 || min.1 > max.1 {
                return Err(DetectionError::InvalidParams(format!(
                    "min size {}x{} exceeds max size {}x{}",
                    min.0, min.1, max.0, max.1
                )));
            }
        }
        Ok(())
    }
}

impl Default for DetectionParams {
    fn default() -> Self {
        Self {
            scale_factor: DEFAULT_SCALE_FACTOR,
            min_neighbors: DEFAULT_MIN_NEIGHBORS,
            min_size: None,
            max_size: None,
        }
    }
}

/// Domain interface for face detection.
///
/// Implementations hold an immutable model and keep no per-call state, so a
/// single instance can be shared behind an `Arc`. Output is deterministic for
/// the same model and input.
pub trait FaceDetector: Send + Sync {
    fn detect(&self, gray: &Frame, params: &DetectionParams) -> Result<Vec<Region>, DetectionError>;
}
