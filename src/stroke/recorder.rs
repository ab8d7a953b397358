use kurbo::Point;

use crate::foundation::core::{CanvasSize, DisplayRect, Rgb8};
use crate::foundation::error::InkstepResult;
use crate::stroke::model::{Stroke, StrokeLog, StrokePoint};
use crate::surface::RasterSurface;

/// Maps raw display-pixel input into raster-surface coordinates.
///
/// Applied before a point is stored or painted, so the persisted log is always in
/// raster space regardless of device pixel scaling or CSS sizing.
#[derive(Clone, Copy, Debug)]
pub struct CoordinateMap {
    display: DisplayRect,
    scale_x: f64,
    scale_y: f64,
}

impl CoordinateMap {
    pub fn new(raster: CanvasSize, display: DisplayRect) -> Self {
        Self {
            display,
            scale_x: f64::from(raster.width) / display.width,
            scale_y: f64::from(raster.height) / display.height,
        }
    }

    /// Display and raster coincide (no scaling, origin at 0,0).
    pub fn identity(raster: CanvasSize) -> Self {
        let display = DisplayRect {
            left: 0.0,
            top: 0.0,
            width: f64::from(raster.width),
            height: f64::from(raster.height),
        };
        Self::new(raster, display)
    }

    pub fn to_raster(&self, display_pos: Point) -> Point {
        Point::new(
            (display_pos.x - self.display.left) * self.scale_x,
            (display_pos.y - self.display.top) * self.scale_y,
        )
    }
}

struct OpenStroke {
    points: Vec<StrokePoint>,
    color: Rgb8,
    last: Point,
}

/// Captures pointer-down / pointer-move / pointer-up into the stroke data model
/// while painting the same marks on the raster surface in real time.
///
/// The recorder owns the log for the whole session; [`finish`](StrokeRecorder::finish)
/// freezes it. A pointer-down with no movement is kept as a degenerate single-point
/// stroke, painted as a dot both here and on replay.
pub struct StrokeRecorder {
    map: CoordinateMap,
    brush_width: f64,
    log: StrokeLog,
    open: Option<OpenStroke>,
    first_input_ms: Option<u64>,
}

impl StrokeRecorder {
    pub fn new(map: CoordinateMap, brush_width: f64) -> InkstepResult<Self> {
        if !(brush_width > 0.0) || !brush_width.is_finite() {
            return Err(crate::foundation::error::InkstepError::validation(
                "brush width must be a positive finite number",
            ));
        }
        Ok(Self {
            map,
            brush_width,
            log: StrokeLog::new(),
            open: None,
            first_input_ms: None,
        })
    }

    /// Starts a new stroke. Ignored if a stroke is already open (a second
    /// pointer-down while drawing cannot corrupt the open stroke).
    ///
    /// `session_clock_ms` is milliseconds since the drawing session started; the
    /// first call's value is kept as the session's first-input timestamp for the
    /// minimum-time check.
    pub fn begin(
        &mut self,
        surface: &mut dyn RasterSurface,
        display_pos: Point,
        color: Rgb8,
        session_clock_ms: u64,
    ) {
        if self.open.is_some() {
            return;
        }
        let p = self.map.to_raster(display_pos);
        if self.first_input_ms.is_none() {
            self.first_input_ms = Some(session_clock_ms);
        }
        // Round cap dot at the start point, so record-time and replay-time
        // visuals agree even for a tap.
        surface.stroke_segment(p, p, self.brush_width, color);
        self.open = Some(OpenStroke {
            points: vec![p.into()],
            color,
            last: p,
        });
    }

    /// Appends a point to the open stroke and paints the connecting segment.
    /// No-op when no stroke is open.
    pub fn extend(&mut self, surface: &mut dyn RasterSurface, display_pos: Point) {
        let Some(open) = self.open.as_mut() else {
            return;
        };
        let p = self.map.to_raster(display_pos);
        surface.stroke_segment(open.last, p, self.brush_width, open.color);
        open.points.push(p.into());
        open.last = p;
    }

    /// Closes the open stroke and appends it to the log. No-op when no stroke is
    /// open. `session_clock_ms` becomes the stroke's `relative_time_ms`.
    pub fn end(&mut self, session_clock_ms: u64) {
        let Some(open) = self.open.take() else {
            return;
        };
        self.log.push(Stroke {
            points: open.points,
            color: open.color,
            relative_time_ms: session_clock_ms,
        });
    }

    pub fn is_drawing(&self) -> bool {
        self.open.is_some()
    }

    pub fn stroke_count(&self) -> usize {
        self.log.len()
    }

    /// Session-relative timestamp of the first pointer-down, if any input arrived.
    pub fn first_input_ms(&self) -> Option<u64> {
        self.first_input_ms
    }

    /// Freezes and returns the log. Any still-open stroke must have been ended
    /// (or deliberately discarded) by the caller first.
    pub fn finish(self) -> StrokeLog {
        self.log
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::core::{DEFAULT_BACKGROUND, DEFAULT_PALETTE};
    use crate::surface::CpuSurface;

    fn setup(side: u32) -> (CpuSurface, StrokeRecorder) {
        let size = CanvasSize::square(side).unwrap();
        let surface = CpuSurface::with_background(size, DEFAULT_BACKGROUND).unwrap();
        let rec = StrokeRecorder::new(CoordinateMap::identity(size), 5.0).unwrap();
        (surface, rec)
    }

    #[test]
    fn tap_is_kept_as_single_point_stroke() {
        let (mut surface, mut rec) = setup(64);
        rec.begin(&mut surface, Point::new(30.0, 30.0), DEFAULT_PALETTE[0], 500);
        rec.end(800);
        let log = rec.finish();
        assert_eq!(log.len(), 1);
        assert_eq!(log.strokes()[0].points.len(), 1);
        assert_eq!(log.strokes()[0].relative_time_ms, 800);
        // The tap painted a dot.
        assert_eq!(surface.pixel(30, 30), DEFAULT_PALETTE[0]);
    }

    #[test]
    fn extend_and_end_without_begin_are_noops() {
        let (mut surface, mut rec) = setup(64);
        rec.extend(&mut surface, Point::new(10.0, 10.0));
        rec.end(100);
        assert_eq!(rec.stroke_count(), 0);
        assert_eq!(surface.pixel(10, 10), DEFAULT_BACKGROUND);
        assert_eq!(rec.first_input_ms(), None);
    }

    #[test]
    fn second_begin_while_open_is_ignored() {
        let (mut surface, mut rec) = setup(64);
        rec.begin(&mut surface, Point::new(5.0, 5.0), DEFAULT_PALETTE[0], 100);
        rec.begin(&mut surface, Point::new(50.0, 50.0), DEFAULT_PALETTE[1], 200);
        rec.extend(&mut surface, Point::new(9.0, 5.0));
        rec.end(300);
        let log = rec.finish();
        assert_eq!(log.len(), 1);
        assert_eq!(log.strokes()[0].color, DEFAULT_PALETTE[0]);
        assert_eq!(log.strokes()[0].points.len(), 2);
    }

    #[test]
    fn first_input_is_recorded_once() {
        let (mut surface, mut rec) = setup(64);
        rec.begin(&mut surface, Point::new(5.0, 5.0), DEFAULT_PALETTE[0], 1_000);
        rec.end(1_100);
        rec.begin(&mut surface, Point::new(8.0, 8.0), DEFAULT_PALETTE[0], 9_000);
        rec.end(9_100);
        assert_eq!(rec.first_input_ms(), Some(1_000));
    }

    #[test]
    fn display_coordinates_are_scaled_into_raster_space() {
        let size = CanvasSize::square(200).unwrap();
        let mut surface = CpuSurface::with_background(size, DEFAULT_BACKGROUND).unwrap();
        // Canvas shown at 100x100 display pixels offset by (10, 20).
        let display = DisplayRect::new(10.0, 20.0, 100.0, 100.0).unwrap();
        let mut rec = StrokeRecorder::new(CoordinateMap::new(size, display), 5.0).unwrap();

        rec.begin(&mut surface, Point::new(60.0, 70.0), DEFAULT_PALETTE[0], 0);
        rec.end(10);
        let log = rec.finish();
        let p = log.strokes()[0].points[0];
        assert_eq!((p.x, p.y), (100.0, 100.0));
        assert_eq!(surface.pixel(100, 100), DEFAULT_PALETTE[0]);
    }
}
