use kurbo::Point;

use crate::foundation::core::Rgb8;
use crate::foundation::error::{InkstepError, InkstepResult};

/// One sampled pointer position in raster-surface coordinates.
///
/// Persisted as `{x, y}`; the wire schema for a whole log is an ordered list of
/// `{points: [{x, y}], color, relative_time_ms}` records.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct StrokePoint {
    pub x: f64,
    pub y: f64,
}

impl StrokePoint {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

impl From<StrokePoint> for Point {
    fn from(p: StrokePoint) -> Point {
        Point::new(p.x, p.y)
    }
}

impl From<Point> for StrokePoint {
    fn from(p: Point) -> StrokePoint {
        StrokePoint::new(p.x, p.y)
    }
}

/// One continuous pointer-down-to-pointer-up gesture.
///
/// Point order is drawing order and is never reordered. A finalized stroke always
/// has at least one point: a tap without movement is kept as a degenerate
/// single-point stroke and painted as a dot.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Stroke {
    pub points: Vec<StrokePoint>,
    pub color: Rgb8,
    /// Milliseconds since the drawing session started, captured when the stroke
    /// was finalized (not per point).
    pub relative_time_ms: u64,
}

impl Stroke {
    pub fn validate(&self) -> InkstepResult<()> {
        if self.points.is_empty() {
            return Err(InkstepError::validation(
                "finalized stroke must have at least one point",
            ));
        }
        Ok(())
    }
}

/// The ordered strokes of one submission. Append-only while a session is live,
/// frozen at submit time, immutable once persisted.
#[derive(Clone, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct StrokeLog {
    strokes: Vec<Stroke>,
}

impl StrokeLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push(&mut self, stroke: Stroke) {
        self.strokes.push(stroke);
    }

    pub fn len(&self) -> usize {
        self.strokes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strokes.is_empty()
    }

    pub fn strokes(&self) -> &[Stroke] {
        &self.strokes
    }

    /// The largest x or y value across every point, the denominator of the
    /// uniform replay scale rule. Zero for an empty log.
    pub fn max_coordinate(&self) -> f64 {
        let mut max = 0.0f64;
        for stroke in &self.strokes {
            for p in &stroke.points {
                max = max.max(p.x).max(p.y);
            }
        }
        max
    }

    pub fn validate(&self) -> InkstepResult<()> {
        for stroke in &self.strokes {
            stroke.validate()?;
        }
        Ok(())
    }

    pub fn from_json(json: &str) -> InkstepResult<Self> {
        let log: StrokeLog = serde_json::from_str(json)
            .map_err(|e| InkstepError::validation(format!("stroke log parse error: {e}")))?;
        log.validate()?;
        Ok(log)
    }

    pub fn from_path(path: impl AsRef<std::path::Path>) -> InkstepResult<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| {
            InkstepError::validation(format!("cannot read '{}': {e}", path.display()))
        })?;
        Self::from_json(&json)
    }
}

/// One accepted drawing. Both the rasterized PNG and the vector stroke log are
/// stored: the raster is the fallback render path, the log the preferred one.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct Submission {
    pub id: crate::session::gateway::SubmissionId,
    pub user_id: crate::session::gateway::UserId,
    pub prompt_index: u32,
    pub image_png: Vec<u8>,
    pub stroke_log: StrokeLog,
    pub coverage: f64,
    pub duration_secs: u64,
    /// Unix milliseconds.
    pub submitted_at: u64,
    pub archived: bool,
}

/// Progress marker used only during an active replay. Fresh per invocation,
/// never persisted, never reused.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ReplayCursor {
    pub stroke: usize,
    pub point: usize,
}
