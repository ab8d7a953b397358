use std::time::Duration;

use kurbo::Point;

use crate::foundation::core::{CanvasSize, DEFAULT_BACKGROUND, Rgb8};
use crate::foundation::error::{InkstepError, InkstepResult};
use crate::stroke::model::{ReplayCursor, StrokeLog};
use crate::surface::RasterSurface;

/// Pacing of a replay. The same values drive gallery animation and video export;
/// the exporter just interprets them on a virtual clock.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ReplayTiming {
    /// Yield between consecutive points of a stroke.
    pub point_delay: Duration,
    /// Longer yield between the end of one stroke and the start of the next,
    /// reproducing the pen-lift pacing of the original drawing.
    pub stroke_gap: Duration,
    /// How long the finished image is held before an export finalizes.
    pub final_dwell: Duration,
}

impl Default for ReplayTiming {
    fn default() -> Self {
        Self {
            point_delay: Duration::from_millis(8),
            stroke_gap: Duration::from_millis(50),
            final_dwell: Duration::from_millis(500),
        }
    }
}

#[derive(Clone, Copy, Debug)]
pub struct ReplayOpts {
    pub background: Rgb8,
    /// Brush width in the log's own coordinate space; scaled with the drawing.
    pub brush_width: f64,
    pub timing: ReplayTiming,
}

impl Default for ReplayOpts {
    fn default() -> Self {
        Self {
            background: DEFAULT_BACKGROUND,
            brush_width: 5.0,
            timing: ReplayTiming::default(),
        }
    }
}

/// Replay lifecycle. `Settled`, `Cancelled` and `Failed` are terminal for the
/// invocation; a new replay always starts a fresh `Idle -> Playing` cycle with a
/// fresh cursor.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReplayState {
    Idle,
    Playing,
    Settled,
    /// Mode A only: the surface was torn down mid-replay.
    Cancelled,
    /// Mode B only: the capture sink failed mid-export.
    Failed,
}

/// What [`ReplayEngine::step`] did, and how long to yield before the next step.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StepEvent {
    /// A point was painted (a dot for the first point of a stroke, a segment
    /// otherwise). The surface shows the partial stroke immediately.
    Painted { delay: Duration },
    /// A stroke finished and another follows; nothing was painted this step.
    StrokeGap { delay: Duration },
    /// The last point of the last stroke has been painted.
    Settled,
}

/// Deterministically redraws a stroke log onto a raster surface, one point per
/// step. The caller owns the pacing: cooperative deferred steps for the gallery,
/// a virtual frame clock for export.
///
/// The whole drawing is scaled uniformly by `target.min_side() / max coordinate
/// in the log`, so a log recorded on a differently-sized surface replays with
/// every relative position preserved. Line width scales by the same factor.
pub struct ReplayEngine<'a> {
    log: &'a StrokeLog,
    cursor: ReplayCursor,
    state: ReplayState,
    scale: f64,
    line_width: f64,
    background: Rgb8,
    timing: ReplayTiming,
}

impl<'a> ReplayEngine<'a> {
    /// Returns `Ok(None)` for an empty log: nothing can be drawn and the caller
    /// falls back to rendering the stored raster image instead.
    pub fn new(
        log: &'a StrokeLog,
        target: CanvasSize,
        opts: ReplayOpts,
    ) -> InkstepResult<Option<Self>> {
        log.validate()?;
        if log.is_empty() {
            return Ok(None);
        }
        if !(opts.brush_width > 0.0) || !opts.brush_width.is_finite() {
            return Err(InkstepError::validation(
                "brush width must be a positive finite number",
            ));
        }

        let max = log.max_coordinate();
        let scale = if max > 0.0 {
            f64::from(target.min_side()) / max
        } else {
            1.0
        };

        Ok(Some(Self {
            log,
            cursor: ReplayCursor::default(),
            state: ReplayState::Idle,
            scale,
            line_width: opts.brush_width * scale,
            background: opts.background,
            timing: opts.timing,
        }))
    }

    pub fn state(&self) -> ReplayState {
        self.state
    }

    pub fn cursor(&self) -> ReplayCursor {
        self.cursor
    }

    pub fn timing(&self) -> ReplayTiming {
        self.timing
    }

    /// Clears the surface to the background color and enters `Playing`.
    pub fn begin(&mut self, surface: &mut dyn RasterSurface) -> InkstepResult<()> {
        if self.state != ReplayState::Idle {
            return Err(InkstepError::validation(
                "replay already started; a new invocation needs a fresh engine",
            ));
        }
        surface.fill(self.background);
        self.state = ReplayState::Playing;
        Ok(())
    }

    /// Advances the replay by one point (or one stroke boundary). Idempotently
    /// returns `Settled` once terminal.
    pub fn step(&mut self, surface: &mut dyn RasterSurface) -> StepEvent {
        if self.state != ReplayState::Playing {
            return StepEvent::Settled;
        }

        let strokes = self.log.strokes();
        let stroke = &strokes[self.cursor.stroke];

        if self.cursor.point < stroke.points.len() {
            let p = self.scaled(stroke.points[self.cursor.point].into());
            if self.cursor.point == 0 {
                surface.stroke_segment(p, p, self.line_width, stroke.color);
            } else {
                let prev = self.scaled(stroke.points[self.cursor.point - 1].into());
                surface.stroke_segment(prev, p, self.line_width, stroke.color);
            }
            self.cursor.point += 1;

            if self.cursor.point == stroke.points.len() && self.cursor.stroke + 1 == strokes.len()
            {
                self.state = ReplayState::Settled;
                return StepEvent::Settled;
            }
            return StepEvent::Painted {
                delay: self.timing.point_delay,
            };
        }

        // Stroke boundary: advance to the next stroke after the pen-lift gap.
        self.cursor.stroke += 1;
        self.cursor.point = 0;
        StepEvent::StrokeGap {
            delay: self.timing.stroke_gap,
        }
    }

    /// Cooperative cancellation (Mode A teardown). Only meaningful while playing.
    pub fn cancel(&mut self) {
        if self.state == ReplayState::Playing {
            self.state = ReplayState::Cancelled;
        }
    }

    /// Marks the invocation failed (Mode B capture error).
    pub(crate) fn fail(&mut self) {
        if self.state == ReplayState::Playing {
            self.state = ReplayState::Failed;
        }
    }

    fn scaled(&self, p: Point) -> Point {
        Point::new(p.x * self.scale, p.y * self.scale)
    }
}

/// Runs a replay to completion on the caller's thread with no pacing, for final
/// frames and coverage checks. Returns `false` when the log was empty and the
/// raster fallback applies.
pub fn render_final_frame(
    log: &StrokeLog,
    surface: &mut dyn RasterSurface,
    opts: ReplayOpts,
) -> InkstepResult<bool> {
    let target = CanvasSize::new(surface.width(), surface.height())?;
    let Some(mut engine) = ReplayEngine::new(log, target, opts)? else {
        return Ok(false);
    };
    engine.begin(surface)?;
    while !matches!(engine.step(surface), StepEvent::Settled) {}
    Ok(true)
}
