use kurbo::{Line, ParamCurveNearest, Point};

use crate::foundation::core::{CanvasSize, Rgb8};
use crate::foundation::error::InkstepResult;
use crate::surface::RasterSurface;

/// In-memory software raster. A pixel is covered when its center lies within
/// `width / 2` of the segment, which yields round caps and joins by construction.
///
/// Coverage is a hard threshold (no anti-aliasing), so output is bit-exact across
/// runs and platforms; replay determinism rests on this.
pub struct CpuSurface {
    size: CanvasSize,
    data: Vec<u8>,
}

impl CpuSurface {
    pub fn new(size: CanvasSize) -> InkstepResult<Self> {
        Ok(Self {
            size,
            data: vec![0u8; (size.pixel_count() * 3) as usize],
        })
    }

    /// Convenience: a new surface already cleared to `background`.
    pub fn with_background(size: CanvasSize, background: Rgb8) -> InkstepResult<Self> {
        let mut s = Self::new(size)?;
        s.fill(background);
        Ok(s)
    }

    pub fn size(&self) -> CanvasSize {
        self.size
    }

    fn put(&mut self, x: u32, y: u32, color: Rgb8) {
        let i = ((u64::from(y) * u64::from(self.size.width) + u64::from(x)) * 3) as usize;
        self.data[i] = color.r;
        self.data[i + 1] = color.g;
        self.data[i + 2] = color.b;
    }
}

impl RasterSurface for CpuSurface {
    fn width(&self) -> u32 {
        self.size.width
    }

    fn height(&self) -> u32 {
        self.size.height
    }

    fn fill(&mut self, color: Rgb8) {
        for px in self.data.chunks_exact_mut(3) {
            px[0] = color.r;
            px[1] = color.g;
            px[2] = color.b;
        }
    }

    fn stroke_segment(&mut self, from: Point, to: Point, width: f64, color: Rgb8) {
        let radius = (width / 2.0).max(0.0);
        if !radius.is_finite() || !from.x.is_finite() || !from.y.is_finite() {
            return;
        }

        let min_x = (from.x.min(to.x) - radius).floor().max(0.0) as u32;
        let min_y = (from.y.min(to.y) - radius).floor().max(0.0) as u32;
        let max_x = (from.x.max(to.x) + radius).ceil().min(f64::from(self.size.width) - 1.0);
        let max_y = (from.y.max(to.y) + radius).ceil().min(f64::from(self.size.height) - 1.0);
        if max_x < 0.0 || max_y < 0.0 {
            return;
        }
        let (max_x, max_y) = (max_x as u32, max_y as u32);

        let degenerate = from == to;
        let line = Line::new(from, to);
        let r2 = radius * radius;

        for y in min_y..=max_y {
            for x in min_x..=max_x {
                let center = Point::new(f64::from(x) + 0.5, f64::from(y) + 0.5);
                let d2 = if degenerate {
                    center.distance_squared(from)
                } else {
                    line.nearest(center, 1e-9).distance_sq
                };
                if d2 <= r2 {
                    self.put(x, y, color);
                }
            }
        }
    }

    fn pixel(&self, x: u32, y: u32) -> Rgb8 {
        let x = x.min(self.size.width - 1);
        let y = y.min(self.size.height - 1);
        let i = ((u64::from(y) * u64::from(self.size.width) + u64::from(x)) * 3) as usize;
        Rgb8::new(self.data[i], self.data[i + 1], self.data[i + 2])
    }

    fn data(&self) -> &[u8] {
        &self.data
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::core::DEFAULT_BACKGROUND;

    const INK: Rgb8 = Rgb8::new(0, 0, 0);

    fn surface(side: u32) -> CpuSurface {
        CpuSurface::with_background(CanvasSize::square(side).unwrap(), DEFAULT_BACKGROUND).unwrap()
    }

    #[test]
    fn fill_covers_every_pixel() {
        let s = surface(16);
        assert!(s.data().chunks_exact(3).all(|px| px == [0xF5, 0xF5, 0xDC]));
    }

    #[test]
    fn zero_length_segment_paints_a_dot() {
        let mut s = surface(32);
        s.stroke_segment(Point::new(16.0, 16.0), Point::new(16.0, 16.0), 5.0, INK);
        assert_eq!(s.pixel(16, 16), INK);
        // Dot radius is 2.5: pixels past it stay background.
        assert_eq!(s.pixel(16, 20), DEFAULT_BACKGROUND);
        assert_eq!(s.pixel(0, 0), DEFAULT_BACKGROUND);
    }

    #[test]
    fn segment_paints_its_whole_span() {
        let mut s = surface(64);
        s.stroke_segment(Point::new(8.0, 32.0), Point::new(56.0, 32.0), 5.0, INK);
        for x in [8u32, 20, 32, 44, 55] {
            assert_eq!(s.pixel(x, 32), INK, "x={x}");
        }
        assert_eq!(s.pixel(32, 8), DEFAULT_BACKGROUND);
    }

    #[test]
    fn out_of_bounds_segment_is_clipped_not_panicking() {
        let mut s = surface(16);
        s.stroke_segment(Point::new(-40.0, -40.0), Point::new(60.0, 60.0), 5.0, INK);
        assert_eq!(s.pixel(8, 8), INK);
    }

    #[test]
    fn painting_is_deterministic() {
        let mut a = surface(48);
        let mut b = surface(48);
        for s in [&mut a, &mut b] {
            s.stroke_segment(Point::new(3.3, 4.4), Point::new(40.1, 44.9), 6.0, INK);
        }
        assert_eq!(a.data(), b.data());
    }
}
