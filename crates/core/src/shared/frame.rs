use ndarray::{ArrayView3, ArrayViewMut3};

/// Colour encoding of a [`Frame`]'s pixel bytes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PixelFormat {
    Bgr24,
    Rgb24,
    Gray8,
}

impl PixelFormat {
    pub fn channels(self) -> u8 {
        match self {
            PixelFormat::Bgr24 | PixelFormat::Rgb24 => 3,
            PixelFormat::Gray8 => 1,
        }
    }

    /// Byte offsets of the red, green and blue samples within one pixel.
    fn rgb_offsets(self) -> Option<(usize, usize, usize)> {
        match self {
            PixelFormat::Bgr24 => Some((2, 1, 0)),
            PixelFormat::Rgb24 => Some((0, 1, 2)),
            PixelFormat::Gray8 => None,
        }
    }
}

/// A single captured frame: contiguous pixel bytes in row-major order.
///
/// Format conversion happens at I/O boundaries and in
/// [`Frame::to_grayscale`]; everything else treats pixel data as opaque.
#[derive(Clone, Debug)]
pub struct Frame {
    data: Vec<u8>,
    width: u32,
    height: u32,
    format: PixelFormat,
    index: usize,
}

impl Frame {
    pub fn new(data: Vec<u8>, width: u32, height: u32, format: PixelFormat, index: usize) -> Self {
        debug_assert_eq!(
            data.len(),
            (width as usize) * (height as usize) * (format.channels() as usize),
            "data length must equal width * height * channels"
        );
        Self {
            data,
            width,
            height,
            format,
            index,
        }
    }

    /// A frame filled with a single byte value.
    pub fn filled(width: u32, height: u32, format: PixelFormat, value: u8, index: usize) -> Self {
        let len = (width as usize) * (height as usize) * (format.channels() as usize);
        Self::new(vec![value; len], width, height, format, index)
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn format(&self) -> PixelFormat {
        self.format
    }

    pub fn channels(&self) -> u8 {
        self.format.channels()
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn set_index(&mut self, index: usize) {
        self.index = index;
    }

    pub fn into_data(self) -> Vec<u8> {
        self.data
    }

    pub fn as_ndarray(&self) -> ArrayView3<'_, u8> {
        ArrayView3::from_shape(self.shape(), &self.data)
            .expect("Frame data length must match dimensions")
    }

    pub fn as_ndarray_mut(&mut self) -> ArrayViewMut3<'_, u8> {
        ArrayViewMut3::from_shape(self.shape(), &mut self.data)
            .expect("Frame data length must match dimensions")
    }

    /// Returns a new single-channel copy using ITU-R BT.601 luma weights.
    ///
    /// The result never aliases `self`, so drawing on the colour frame
    /// afterwards leaves the grayscale copy untouched.
    pub fn to_grayscale(&self) -> Frame {
        let Some((r, g, b)) = self.format.rgb_offsets() else {
            return self.clone();
        };
        let gray = self
            .data
            .chunks_exact(3)
            .map(|px| luma(px[r], px[g], px[b]))
            .collect();
        Frame::new(gray, self.width, self.height, PixelFormat::Gray8, self.index)
    }

    /// Returns a copy scaled to `width` x `height` with bilinear filtering.
    pub fn resized(&self, width: u32, height: u32) -> Frame {
        if width == self.width && height == self.height {
            return self.clone();
        }
        let filter = image::imageops::FilterType::Triangle;
        let data = match self.format {
            PixelFormat::Gray8 => {
                let img = image::GrayImage::from_raw(self.width, self.height, self.data.clone())
                    .expect("Frame data length must match dimensions");
                image::imageops::resize(&img, width, height, filter).into_raw()
            }
            PixelFormat::Bgr24 | PixelFormat::Rgb24 => {
                // Channel order is irrelevant to the filter.
                let img = image::RgbImage::from_raw(self.width, self.height, self.data.clone())
                    .expect("Frame data length must match dimensions");
                image::imageops::resize(&img, width, height, filter).into_raw()
            }
        };
        Frame::new(data, width, height, self.format, self.index)
    }

    /// The bytes of one pixel of colour `rgb` in this frame's layout.
    pub fn native_pixel(&self, rgb: [u8; 3]) -> Vec<u8> {
        match self.format.rgb_offsets() {
            Some((r, g, b)) => {
                let mut px = vec![0; 3];
                px[r] = rgb[0];
                px[g] = rgb[1];
                px[b] = rgb[2];
                px
            }
            None => vec![luma(rgb[0], rgb[1], rgb[2])],
        }
    }

    /// Writes an RGB colour at `(x, y)`, honouring the frame's channel order.
    ///
    /// Grayscale frames receive the colour's luma. Out-of-bounds writes are ignored.
    pub fn put_pixel(&mut self, x: u32, y: u32, rgb: [u8; 3]) {
        if x >= self.width || y >= self.height {
            return;
        }
        let channels = self.channels() as usize;
        let offset = ((y as usize) * (self.width as usize) + x as usize) * channels;
        match self.format.rgb_offsets() {
            Some((r, g, b)) => {
                self.data[offset + r] = rgb[0];
                self.data[offset + g] = rgb[1];
                self.data[offset + b] = rgb[2];
            }
            None => self.data[offset] = luma(rgb[0], rgb[1], rgb[2]),
        }
    }

    fn shape(&self) -> (usize, usize, usize) {
        (
            self.height as usize,
            self.width as usize,
            self.channels() as usize,
        )
    }
}

/// Fixed-point BT.601 luma (14-bit coefficients).
fn luma(r: u8, g: u8, b: u8) -> u8 {
    let y = (r as u32) * 4899 + (g as u32) * 9617 + (b as u32) * 1868;
    ((y + (1 << 13)) >> 14).min(255) as u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_construction_and_accessors() {
        let data = vec![0u8; 12]; // 2x2x3
        let frame = Frame::new(data.clone(), 2, 2, PixelFormat::Bgr24, 5);
        assert_eq!(frame.width(), 2);
        assert_eq!(frame.height(), 2);
        assert_eq!(frame.channels(), 3);
        assert_eq!(frame.format(), PixelFormat::Bgr24);
        assert_eq!(frame.index(), 5);
        assert_eq!(frame.data(), &data[..]);
    }

    #[test]
    fn test_clone_is_independent() {
        let frame = Frame::filled(2, 2, PixelFormat::Rgb24, 100, 0);
        let mut cloned = frame.clone();
        cloned.data_mut()[0] = 0;
        assert_eq!(frame.data()[0], 100);
        assert_eq!(cloned.data()[0], 0);
    }

    #[test]
    #[should_panic(expected = "data length must equal width * height * channels")]
    fn test_mismatched_data_length_panics_in_debug() {
        Frame::new(vec![0u8; 10], 2, 2, PixelFormat::Bgr24, 0);
    }

    #[test]
    fn test_as_ndarray_shape() {
        let frame = Frame::filled(4, 2, PixelFormat::Bgr24, 0, 0);
        assert_eq!(frame.as_ndarray().shape(), &[2, 4, 3]);

        let gray = Frame::filled(4, 2, PixelFormat::Gray8, 0, 0);
        assert_eq!(gray.as_ndarray().shape(), &[2, 4, 1]);
    }

    #[rstest]
    #[case::white([255, 255, 255], 255)]
    #[case::black([0, 0, 0], 0)]
    #[case::pure_red([255, 0, 0], 76)]
    #[case::pure_green([0, 255, 0], 150)]
    #[case::pure_blue([0, 0, 255], 29)]
    fn test_luma(#[case] rgb: [u8; 3], #[case] expected: u8) {
        assert_eq!(luma(rgb[0], rgb[1], rgb[2]), expected);
    }

    #[test]
    fn test_to_grayscale_respects_channel_order() {
        // One pure-red pixel in each encoding.
        let bgr = Frame::new(vec![0, 0, 255], 1, 1, PixelFormat::Bgr24, 3);
        let rgb = Frame::new(vec![255, 0, 0], 1, 1, PixelFormat::Rgb24, 3);

        let g1 = bgr.to_grayscale();
        let g2 = rgb.to_grayscale();
        assert_eq!(g1.format(), PixelFormat::Gray8);
        assert_eq!(g1.index(), 3);
        assert_eq!(g1.data(), g2.data());
        assert_eq!(g1.data()[0], 76);
    }

    #[test]
    fn test_to_grayscale_is_independent_buffer() {
        let mut color = Frame::filled(4, 4, PixelFormat::Bgr24, 10, 0);
        let gray = color.to_grayscale();
        color.put_pixel(1, 1, [255, 255, 255]);
        assert!(gray.data().iter().all(|&v| v == 10));
    }

    #[test]
    fn test_put_pixel_bgr_order() {
        let mut frame = Frame::filled(2, 2, PixelFormat::Bgr24, 0, 0);
        frame.put_pixel(1, 0, [10, 20, 30]);
        let arr = frame.as_ndarray();
        assert_eq!(arr[[0, 1, 0]], 30); // B
        assert_eq!(arr[[0, 1, 1]], 20); // G
        assert_eq!(arr[[0, 1, 2]], 10); // R
    }

    #[test]
    fn test_put_pixel_out_of_bounds_ignored() {
        let mut frame = Frame::filled(2, 2, PixelFormat::Rgb24, 0, 0);
        frame.put_pixel(2, 0, [255, 255, 255]);
        frame.put_pixel(0, 5, [255, 255, 255]);
        assert!(frame.data().iter().all(|&v| v == 0));
    }

    #[test]
    fn test_resized_dimensions_and_format() {
        let frame = Frame::filled(8, 6, PixelFormat::Bgr24, 77, 4);
        let out = frame.resized(4, 3);
        assert_eq!(out.width(), 4);
        assert_eq!(out.height(), 3);
        assert_eq!(out.format(), PixelFormat::Bgr24);
        assert_eq!(out.index(), 4);
        assert!(out.data().iter().all(|&v| v == 77));
    }

    #[test]
    fn test_resized_same_size_is_copy() {
        let frame = Frame::filled(3, 3, PixelFormat::Gray8, 9, 0);
        let out = frame.resized(3, 3);
        assert_eq!(out.data(), frame.data());
    }
}
