//! Inkstep is the stroke engine behind a one-prompt-per-day drawing canvas.
//!
//! It turns pointer gestures into an ordered stroke log (`StrokeLog`), decides whether a
//! finished drawing is substantial enough to submit, and deterministically replays a stored
//! log over time, either as an interruptible gallery animation or as a frame-accurate MP4
//! export.
//!
//! # Pipeline overview
//!
//! 1. **Record**: `StrokeRecorder` maps display-space pointer events into raster-space
//!    strokes while painting them onto a [`RasterSurface`] in real time.
//! 2. **Validate**: [`coverage_fraction`] scans the final raster; [`validate_drawing`]
//!    classifies rejects as `BlankCanvas` or `TooFast`.
//! 3. **Persist**: the frozen log plus a PNG of the raster go through a
//!    [`PersistenceGateway`].
//! 4. **Replay**: [`ReplayEngine`] steps the log back onto a surface point by point;
//!    [`run_replay`] drives it cooperatively for the gallery, [`export_video`] drives it on
//!    a virtual clock into a [`FrameSink`] (system `ffmpeg` for MP4 output).
//!
//! The key design constraints:
//!
//! - **No unsafe**: `unsafe` is forbidden in this crate.
//! - **Deterministic-by-default**: replaying the same log twice produces pixel-identical
//!   output; gallery jitter is seeded.
//! - **Single-threaded, cooperative**: replay is a step function driven by a scheduler and
//!   a cancellation token, never a blocking loop the caller cannot interrupt.
//! - **Explicit clocks**: every time-dependent operation takes its timestamp as a
//!   parameter; nothing reads ambient wall-clock state.
#![forbid(unsafe_code)]

mod coverage;
mod encode;
mod foundation;
mod replay;
mod session;
mod stroke;
mod surface;

pub use coverage::{SubmitTrigger, ValidationPolicy, coverage_fraction, validate_drawing};
pub use encode::ffmpeg::{FfmpegSink, ensure_parent_dir, is_ffmpeg_on_path};
pub use foundation::core::{
    CanvasSize, DEFAULT_BACKGROUND, DEFAULT_PALETTE, DisplayRect, Point, Rgb8,
};
pub use foundation::error::{InkstepError, InkstepResult};
pub use replay::animate::{
    CancelToken, GalleryTile, ReplayOutcome, Scheduler, ThreadScheduler, TileState, run_replay,
};
pub use replay::engine::{
    ReplayEngine, ReplayOpts, ReplayState, ReplayTiming, StepEvent, render_final_frame,
};
pub use replay::export::{ExportArtifact, ExportOpts, FrameSink, VideoExporter, export_video};
pub use session::flow::{Screen, SessionConfig, SessionFlow, ValidationKind, format_hms};
pub use session::gateway::{
    MemoryGateway, PersistenceGateway, ReplaySource, SubmissionDraft, SubmissionId, UserId,
};
pub use stroke::model::{ReplayCursor, Stroke, StrokeLog, StrokePoint, Submission};
pub use stroke::recorder::{CoordinateMap, StrokeRecorder};
pub use surface::{CpuSurface, RasterSurface, encode_png};
