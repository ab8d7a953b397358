pub mod cpu;

pub use cpu::CpuSurface;

use kurbo::Point;

use crate::foundation::core::Rgb8;
use crate::foundation::error::{InkstepError, InkstepResult};

/// A 2D drawable raster the core paints on and reads back from.
///
/// Both recording and replay draw exclusively through [`stroke_segment`], which paints
/// with round caps so consecutive segments join smoothly and a zero-length segment
/// paints a dot. One writer at a time per surface; the single-threaded cooperative
/// scheduling already guarantees that.
///
/// [`stroke_segment`]: RasterSurface::stroke_segment
pub trait RasterSurface {
    fn width(&self) -> u32;
    fn height(&self) -> u32;

    /// Clears every pixel to `color`.
    fn fill(&mut self, color: Rgb8);

    /// Paints the segment `from..=to` at the given brush width with round caps.
    fn stroke_segment(&mut self, from: Point, to: Point, width: f64, color: Rgb8);

    /// Reads a single pixel back. Out-of-bounds coordinates return the last
    /// in-bounds pixel's row/column; callers are expected to stay in bounds.
    fn pixel(&self, x: u32, y: u32) -> Rgb8;

    /// Row-major straight RGB8 bytes, three per pixel.
    fn data(&self) -> &[u8];
}

/// Encodes the surface contents as a PNG, the raster blob stored alongside the
/// stroke log at submit time (and the fallback render path for legacy data).
pub fn encode_png(surface: &dyn RasterSurface) -> InkstepResult<Vec<u8>> {
    let mut out = std::io::Cursor::new(Vec::new());
    image::write_buffer_with_format(
        &mut out,
        surface.data(),
        surface.width(),
        surface.height(),
        image::ExtendedColorType::Rgb8,
        image::ImageFormat::Png,
    )
    .map_err(|e| InkstepError::validation(format!("png encode failed: {e}")))?;
    Ok(out.into_inner())
}
