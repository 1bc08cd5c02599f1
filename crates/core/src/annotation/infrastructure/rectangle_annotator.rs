use ndarray::{s, ArrayView1, Axis};

use crate::annotation::domain::frame_annotator::FrameAnnotator;
use crate::shared::constants::{OVERLAY_COLOR, OVERLAY_THICKNESS};
use crate::shared::frame::Frame;
use crate::shared::region::Region;

/// Outlines each region with a solid rectangle drawn inside its bounds.
pub struct RectangleAnnotator {
    color: [u8; 3],
    thickness: u32,
}

impl RectangleAnnotator {
    /// `color` is RGB; it is written in the frame's own channel order.
    pub fn new(color: [u8; 3], thickness: u32) -> Self {
        Self {
            color,
            thickness: thickness.max(1),
        }
    }
}

impl Default for RectangleAnnotator {
    fn default() -> Self {
        Self::new(OVERLAY_COLOR, OVERLAY_THICKNESS)
    }
}

impl FrameAnnotator for RectangleAnnotator {
    fn annotate(&self, frame: &mut Frame, regions: &[Region]) {
        let px = frame.native_pixel(self.color);
        let px = ArrayView1::from(&px[..]);
        let (width, height) = (frame.width(), frame.height());
        let mut view = frame.as_ndarray_mut();
        let t = self.thickness as usize;

        for r in regions {
            let Some(r) = r.clamp_to(width, height) else {
                continue;
            };
            let (x0, y0) = (r.x as usize, r.y as usize);
            let (x1, y1) = (r.right() as usize, r.bottom() as usize);

            let bands = [
                (y0..(y0 + t).min(y1), x0..x1),
                (y1.saturating_sub(t).max(y0)..y1, x0..x1),
                (y0..y1, x0..(x0 + t).min(x1)),
                (y0..y1, x1.saturating_sub(t).max(x0)..x1),
            ];
            for (ys, xs) in bands {
                let mut band = view.slice_mut(s![ys, xs, ..]);
                for mut lane in band.lanes_mut(Axis(2)) {
                    lane.assign(&px);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::frame::PixelFormat;

    fn pixel(frame: &Frame, x: u32, y: u32) -> &[u8] {
        let c = frame.channels() as usize;
        let at = ((y * frame.width() + x) as usize) * c;
        &frame.data()[at..at + c]
    }

    #[test]
    fn test_outline_in_bgr_order() {
        let mut frame = Frame::filled(20, 20, PixelFormat::Bgr24, 0, 0);
        RectangleAnnotator::default().annotate(&mut frame, &[Region::new(5, 5, 10, 10)]);

        // Blue in BGR is [255, 0, 0].
        assert_eq!(pixel(&frame, 5, 5), &[255, 0, 0]);
        assert_eq!(pixel(&frame, 6, 10), &[255, 0, 0]);
        assert_eq!(pixel(&frame, 14, 14), &[255, 0, 0]);
        assert_eq!(pixel(&frame, 13, 10), &[255, 0, 0]);
        // Interior and exterior untouched.
        assert_eq!(pixel(&frame, 10, 10), &[0, 0, 0]);
        assert_eq!(pixel(&frame, 7, 7), &[0, 0, 0]);
        assert_eq!(pixel(&frame, 4, 4), &[0, 0, 0]);
        assert_eq!(pixel(&frame, 15, 15), &[0, 0, 0]);
    }

    #[test]
    fn test_outline_in_rgb_order() {
        let mut frame = Frame::filled(10, 10, PixelFormat::Rgb24, 0, 0);
        RectangleAnnotator::new([10, 20, 30], 1).annotate(&mut frame, &[Region::new(0, 0, 4, 4)]);
        assert_eq!(pixel(&frame, 0, 0), &[10, 20, 30]);
        assert_eq!(pixel(&frame, 1, 1), &[0, 0, 0]);
    }

    #[test]
    fn test_stroke_pixel_count() {
        let mut frame = Frame::filled(30, 30, PixelFormat::Bgr24, 0, 0);
        RectangleAnnotator::new([255, 255, 255], 2).annotate(&mut frame, &[Region::new(5, 5, 10, 8)]);
        let painted = frame.data().chunks_exact(3).filter(|p| p[0] == 255).count();
        // 10x8 box minus the 6x4 interior.
        assert_eq!(painted, 80 - 24);
    }

    #[test]
    fn test_region_past_edge_is_clipped() {
        let mut frame = Frame::filled(10, 10, PixelFormat::Bgr24, 0, 0);
        RectangleAnnotator::default().annotate(&mut frame, &[Region::new(6, 6, 10, 10)]);
        assert_eq!(pixel(&frame, 9, 9), &[255, 0, 0]);
        assert_eq!(pixel(&frame, 6, 6), &[255, 0, 0]);
    }

    #[test]
    fn test_region_outside_frame_ignored() {
        let mut frame = Frame::filled(10, 10, PixelFormat::Bgr24, 7, 0);
        RectangleAnnotator::default().annotate(&mut frame, &[Region::new(50, 50, 5, 5)]);
        assert!(frame.data().iter().all(|&b| b == 7));
    }

    #[test]
    fn test_no_regions_leaves_frame() {
        let mut frame = Frame::filled(8, 8, PixelFormat::Gray8, 3, 0);
        RectangleAnnotator::default().annotate(&mut frame, &[]);
        assert!(frame.data().iter().all(|&b| b == 3));
    }
}
