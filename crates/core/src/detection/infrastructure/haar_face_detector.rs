use std::path::Path;

use crate::detection::domain::face_detector::{DetectionError, DetectionParams, FaceDetector};
use crate::detection::domain::rect_grouper::RectGrouper;
use crate::detection::infrastructure::haar_cascade::{HaarCascade, ModelLoadError};
use crate::detection::infrastructure::integral_image::IntegralImage;
use crate::detection::infrastructure::model_resolver::ModelResolver;
use crate::shared::frame::{Frame, PixelFormat};
use crate::shared::region::Region;

/// Multi-scale Viola-Jones face detector over a Haar cascade.
///
/// The frame is shrunk by `scale_factor` per pyramid level while the
/// cascade window stays fixed, so each level finds faces
/// `factor` times larger than the window.
pub struct HaarFaceDetector {
    cascade: HaarCascade,
    grouper: RectGrouper,
}

impl HaarFaceDetector {
    pub fn new(cascade: HaarCascade) -> Self {
        Self {
            cascade,
            grouper: RectGrouper::default(),
        }
    }

    pub fn load(path: &Path) -> Result<Self, ModelLoadError> {
        Ok(Self::new(HaarCascade::from_file(path)?))
    }

    /// Loads the cascade from `explicit` or wherever `resolver` finds it.
    pub fn resolve(explicit: Option<&Path>, resolver: &ModelResolver) -> Result<Self, ModelLoadError> {
        let path = resolver.resolve(explicit, None)?;
        Self::load(&path)
    }

    /// Pyramid factors to scan, smallest faces first.
    fn scales(&self, width: u32, height: u32, params: &DetectionParams) -> Vec<f64> {
        let (win_w, win_h) = self.cascade.window_size();
        let (min_w, min_h) = params.min_size.unwrap_or((0, 0));
        let (max_w, max_h) = params.max_size.unwrap_or((width, height));

        let mut scales = Vec::new();
        let mut factor = 1.0f64;
        loop {
            let obj_w = (win_w as f64 * factor).round() as u32;
            let obj_h = (win_h as f64 * factor).round() as u32;
            if obj_w > max_w || obj_h > max_h {
                break;
            }
            let scaled_w = (width as f64 / factor).round() as u32;
            let scaled_h = (height as f64 / factor).round() as u32;
            if scaled_w < win_w || scaled_h < win_h {
                break;
            }
            if obj_w >= min_w && obj_h >= min_h {
                scales.push(factor);
            }
            factor *= params.scale_factor;
        }
        scales
    }

    /// Every window position the cascade accepts, in frame coordinates.
    fn raw_hits(&self, gray: &Frame, params: &DetectionParams) -> Vec<Region> {
        let (win_w, win_h) = self.cascade.window_size();
        let mut hits = Vec::new();

        for factor in self.scales(gray.width(), gray.height(), params) {
            let scaled_w = (gray.width() as f64 / factor).round() as u32;
            let scaled_h = (gray.height() as f64 / factor).round() as u32;
            let level = gray.resized(scaled_w, scaled_h);
            let ii = IntegralImage::new(level.data(), scaled_w, scaled_h);

            let step = if factor > 2.0 { 1 } else { 2 };
            let obj_w = (win_w as f64 * factor).round() as i32;
            let obj_h = (win_h as f64 * factor).round() as i32;

            for y in (0..=scaled_h - win_h).step_by(step) {
                for x in (0..=scaled_w - win_w).step_by(step) {
                    if self.cascade.accepts(&ii, x, y) {
                        hits.push(Region::new(
                            (x as f64 * factor).round() as i32,
                            (y as f64 * factor).round() as i32,
                            obj_w,
                            obj_h,
                        ));
                    }
                }
            }
        }
        hits
    }
}

impl FaceDetector for HaarFaceDetector {
    fn detect(&self, gray: &Frame, params: &DetectionParams) -> Result<Vec<Region>, DetectionError> {
        if gray.format() != PixelFormat::Gray8 {
            return Err(DetectionError::NotGrayscale(gray.format()));
        }
        params.validate()?;

        let hits = self.raw_hits(gray, params);
        let faces: Vec<Region> = self
            .grouper
            .group(&hits, params.min_neighbors)
            .into_iter()
            .filter_map(|r| r.clamp_to(gray.width(), gray.height()))
            .collect();

        log::debug!(
            "Frame {}: {} raw hits, {} faces",
            gray.index(),
            hits.len(),
            faces.len()
        );
        Ok(faces)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::infrastructure::haar_cascade::tests::EDGE_CASCADE;
    use rstest::rstest;

    fn detector() -> HaarFaceDetector {
        HaarFaceDetector::new(HaarCascade::from_xml(EDGE_CASCADE).unwrap())
    }

    /// 120x120 black frame with a bright 20x40 block whose left edge the
    /// edge cascade responds to.
    fn pattern_frame() -> (Frame, Region) {
        let (w, h) = (120u32, 120u32);
        let pattern = Region::new(60, 40, 20, 40);
        let mut data = vec![0u8; (w * h) as usize];
        for y in pattern.y..pattern.bottom() {
            for x in pattern.x..pattern.right() {
                data[(y as u32 * w + x as u32) as usize] = 200;
            }
        }
        (Frame::new(data, w, h, PixelFormat::Gray8, 0), pattern)
    }

    fn params(min_neighbors: u32) -> DetectionParams {
        DetectionParams::new(1.3, min_neighbors)
    }

    #[test]
    fn test_blank_frame_has_no_faces() {
        let frame = Frame::filled(120, 120, PixelFormat::Gray8, 0, 0);
        assert!(detector().detect(&frame, &params(0)).unwrap().is_empty());
    }

    #[test]
    fn test_uniform_bright_frame_has_no_faces() {
        let frame = Frame::filled(120, 120, PixelFormat::Gray8, 180, 0);
        assert!(detector().detect(&frame, &params(0)).unwrap().is_empty());
    }

    #[test]
    fn test_pattern_found_inside_frame() {
        let (frame, pattern) = pattern_frame();
        let faces = detector().detect(&frame, &params(1)).unwrap();

        assert!(!faces.is_empty());
        assert!(faces.len() <= 10, "too many boxes: {faces:?}");
        for f in &faces {
            assert!(f.is_within(120, 120), "{f:?} outside frame");
            assert!(
                f.x < pattern.right()
                    && f.right() > pattern.x
                    && f.y < pattern.bottom()
                    && f.bottom() > pattern.y,
                "{f:?} misses the pattern"
            );
        }
    }

    #[test]
    fn test_grouping_reduces_raw_hits() {
        let (frame, _) = pattern_frame();
        let det = detector();
        let raw = det.raw_hits(&frame, &params(1));
        let grouped = det.detect(&frame, &params(1)).unwrap();
        assert!(raw.len() > grouped.len());
    }

    #[test]
    fn test_detection_is_deterministic() {
        let (frame, _) = pattern_frame();
        let det = detector();
        let a = det.detect(&frame, &params(2)).unwrap();
        let b = det.detect(&frame, &params(2)).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_colour_frame_rejected() {
        let frame = Frame::filled(40, 40, PixelFormat::Bgr24, 0, 0);
        let result = detector().detect(&frame, &params(3));
        assert!(matches!(
            result,
            Err(DetectionError::NotGrayscale(PixelFormat::Bgr24))
        ));
    }

    #[test]
    fn test_invalid_params_rejected() {
        let (frame, _) = pattern_frame();
        let result = detector().detect(&frame, &DetectionParams::new(1.0, 3));
        assert!(matches!(result, Err(DetectionError::InvalidParams(_))));
    }

    #[test]
    fn test_frame_smaller_than_window() {
        let frame = Frame::filled(10, 10, PixelFormat::Gray8, 0, 0);
        assert!(detector().detect(&frame, &params(0)).unwrap().is_empty());
    }

    #[rstest]
    #[case(Some((1000, 1000)), None, 0)]
    #[case(None, Some((10, 10)), 0)]
    fn test_size_limits_prune_scales(
        #[case] min_size: Option<(u32, u32)>,
        #[case] max_size: Option<(u32, u32)>,
        #[case] expected_scales: usize,
    ) {
        let p = DetectionParams {
            min_size,
            max_size,
            ..params(0)
        };
        assert_eq!(detector().scales(120, 120, &p).len(), expected_scales);
    }

    #[test]
    fn test_scales_follow_factor() {
        let scales = detector().scales(120, 120, &params(0));
        assert!((scales[0] - 1.0).abs() < 1e-12);
        assert!((scales[1] - 1.3).abs() < 1e-12);
        // 120 / 1.3^7 rounds to 19, smaller than the 20px window.
        assert_eq!(scales.len(), 7);
    }

    #[test]
    fn test_load_missing_file() {
        let result = HaarFaceDetector::load(Path::new("/nonexistent/cascade.xml"));
        assert!(matches!(result, Err(ModelLoadError::Io { .. })));
    }

    #[test]
    fn test_resolve_explicit_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("edge.xml");
        std::fs::write(&path, EDGE_CASCADE).unwrap();
        let resolver = ModelResolver::frontal_face().with_cache_dir(dir.path());
        assert!(HaarFaceDetector::resolve(Some(&path), &resolver).is_ok());
    }
}
