/// Summed-area tables over an 8-bit image.
///
/// Both tables are `(width + 1) x (height + 1)` with a zero first row and
/// column, so any rectangle sum costs four lookups.
pub struct IntegralImage {
    width: u32,
    height: u32,
    stride: usize,
    sum: Vec<i64>,
    sq_sum: Vec<u64>,
}

impl IntegralImage {
    pub fn new(pixels: &[u8], width: u32, height: u32) -> Self {
        let stride = width as usize + 1;
        let rows = height as usize + 1;
        let mut sum = vec![0i64; stride * rows];
        let mut sq_sum = vec![0u64; stride * rows];

        for y in 0..height as usize {
            let mut row_sum = 0i64;
            let mut row_sq = 0u64;
            let src = &pixels[y * width as usize..(y + 1) * width as usize];
            for (x, &p) in src.iter().enumerate() {
                row_sum += p as i64;
                row_sq += (p as u64) * (p as u64);
                let at = (y + 1) * stride + x + 1;
                sum[at] = sum[at - stride] + row_sum;
                sq_sum[at] = sq_sum[at - stride] + row_sq;
            }
        }

        Self {
            width,
            height,
            stride,
            sum,
            sq_sum,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Sum of pixels in `[x, x + w) x [y, y + h)`. Caller keeps it in bounds.
    #[inline]
    pub fn rect_sum(&self, x: u32, y: u32, w: u32, h: u32) -> i64 {
        let (a, b, c, d) = self.corners(x, y, w, h);
        self.sum[d] - self.sum[b] - self.sum[c] + self.sum[a]
    }

    /// Sum of squared pixels in `[x, x + w) x [y, y + h)`.
    #[inline]
    pub fn rect_sq_sum(&self, x: u32, y: u32, w: u32, h: u32) -> u64 {
        let (a, b, c, d) = self.corners(x, y, w, h);
        (self.sq_sum[d] + self.sq_sum[a]) - (self.sq_sum[b] + self.sq_sum[c])
    }

    #[inline]
    fn corners(&self, x: u32, y: u32, w: u32, h: u32) -> (usize, usize, usize, usize) {
        let (x, y, w, h) = (x as usize, y as usize, w as usize, h as usize);
        let top = y * self.stride;
        let bottom = (y + h) * self.stride;
        (top + x, top + x + w, bottom + x, bottom + x + w)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn ramp(width: u32, height: u32) -> Vec<u8> {
        (0..width * height).map(|i| (i % 251) as u8).collect()
    }

    fn brute_sum(px: &[u8], width: u32, x: u32, y: u32, w: u32, h: u32) -> (i64, u64) {
        let mut s = 0i64;
        let mut sq = 0u64;
        for yy in y..y + h {
            for xx in x..x + w {
                let p = px[(yy * width + xx) as usize];
                s += p as i64;
                sq += (p as u64) * (p as u64);
            }
        }
        (s, sq)
    }

    #[rstest]
    #[case(0, 0, 1, 1)]
    #[case(0, 0, 17, 9)]
    #[case(3, 2, 5, 4)]
    #[case(16, 8, 1, 1)]
    #[case(10, 0, 7, 9)]
    fn test_rect_sums_match_brute_force(
        #[case] x: u32,
        #[case] y: u32,
        #[case] w: u32,
        #[case] h: u32,
    ) {
        let px = ramp(17, 9);
        let ii = IntegralImage::new(&px, 17, 9);
        let (s, sq) = brute_sum(&px, 17, x, y, w, h);
        assert_eq!(ii.rect_sum(x, y, w, h), s);
        assert_eq!(ii.rect_sq_sum(x, y, w, h), sq);
    }

    #[test]
    fn test_empty_rect_is_zero() {
        let px = ramp(4, 4);
        let ii = IntegralImage::new(&px, 4, 4);
        assert_eq!(ii.rect_sum(2, 2, 0, 0), 0);
        assert_eq!(ii.rect_sq_sum(1, 1, 0, 3), 0);
    }

    #[test]
    fn test_uniform_image() {
        let px = vec![255u8; 640 * 480];
        let ii = IntegralImage::new(&px, 640, 480);
        assert_eq!(ii.rect_sum(0, 0, 640, 480), 255 * 640 * 480);
        assert_eq!(ii.rect_sq_sum(0, 0, 640, 480), 255 * 255 * 640 * 480);
    }
}
