use kurbo::Point;

use crate::coverage::{SubmitTrigger, ValidationPolicy, coverage_fraction, validate_drawing};
use crate::foundation::core::{CanvasSize, DEFAULT_PALETTE, DisplayRect, Rgb8};
use crate::foundation::error::{InkstepError, InkstepResult};
use crate::session::gateway::{PersistenceGateway, SubmissionDraft, UserId};
use crate::stroke::model::Submission;
use crate::stroke::recorder::{CoordinateMap, StrokeRecorder};
use crate::surface::{CpuSurface, encode_png};

/// User-facing classification of a rejected submit.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ValidationKind {
    Blank,
    TooFast,
    Network,
}

/// Every screen the single-page flow can show. One variant per screen keeps
/// transitions exhaustively matched; adding a screen is a compile-time-checked
/// change.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Screen {
    Loading,
    Landing,
    /// One-time notice shown before the user's very first drawing session.
    FirstTime,
    Drawing,
    Submitting,
    ValidationError(ValidationKind),
    Congrats,
    Gallery,
    AlreadyDone,
}

#[derive(Clone, Debug)]
pub struct SessionConfig {
    pub canvas: CanvasSize,
    /// Drawing session length in seconds.
    pub timer_secs: u32,
    pub palette: Vec<Rgb8>,
    pub brush_width: f64,
    pub policy: ValidationPolicy,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            canvas: CanvasSize {
                width: 600,
                height: 600,
            },
            timer_secs: 60,
            palette: DEFAULT_PALETTE.to_vec(),
            brush_width: 5.0,
            policy: ValidationPolicy::default(),
        }
    }
}

/// The state machine sequencing one user's daily session: landing, the timed
/// drawing screen, validation and submit, then gallery.
///
/// Exactly one recorder session exists at a time, and every time-dependent
/// method takes `now_ms` (unix milliseconds) explicitly, so scheduled callers
/// pass state snapshots instead of capturing ambient clocks.
pub struct SessionFlow<'g, G: PersistenceGateway> {
    gateway: &'g mut G,
    config: SessionConfig,
    user: UserId,
    prompt_index: u32,
    screen: Screen,
    seen_notice: bool,
    selected_color: usize,
    time_left_secs: u32,
    session_started_ms: u64,
    surface: Option<CpuSurface>,
    recorder: Option<StrokeRecorder>,
    last_submission: Option<Submission>,
}

impl<'g, G: PersistenceGateway> SessionFlow<'g, G> {
    pub fn new(
        gateway: &'g mut G,
        config: SessionConfig,
        user: UserId,
        prompt_index: u32,
    ) -> InkstepResult<Self> {
        if config.palette.is_empty() {
            return Err(InkstepError::validation("palette must not be empty"));
        }
        if config.timer_secs == 0 {
            return Err(InkstepError::validation("timer must be > 0 seconds"));
        }
        Ok(Self {
            gateway,
            config,
            user,
            prompt_index,
            screen: Screen::Loading,
            seen_notice: false,
            selected_color: 0,
            time_left_secs: 0,
            session_started_ms: 0,
            surface: None,
            recorder: None,
            last_submission: None,
        })
    }

    pub fn screen(&self) -> Screen {
        self.screen
    }

    pub fn time_left_secs(&self) -> u32 {
        self.time_left_secs
    }

    pub fn selected_color(&self) -> Rgb8 {
        self.config.palette[self.selected_color]
    }

    pub fn last_submission(&self) -> Option<&Submission> {
        self.last_submission.as_ref()
    }

    /// The recording surface, for rendering the live canvas.
    pub fn surface(&self) -> Option<&CpuSurface> {
        self.surface.as_ref()
    }

    /// Resolves the initial screen. The one-submission-per-prompt gate is the
    /// gateway's query; the flow only reacts to it. A failing gateway lands on
    /// `Landing` rather than blocking the user.
    pub fn initialize(&mut self) -> Screen {
        self.screen = match self.gateway.has_submitted(&self.user, self.prompt_index) {
            Ok(true) => Screen::AlreadyDone,
            Ok(false) => Screen::Landing,
            Err(e) => {
                tracing::warn!(error = %e, "init status check failed");
                Screen::Landing
            }
        };
        self.screen
    }

    /// Advances from `Landing` (via the one-time `FirstTime` notice) into a
    /// fresh drawing session.
    pub fn start(&mut self, display: DisplayRect, now_ms: u64) -> InkstepResult<()> {
        match self.screen {
            Screen::Landing if !self.seen_notice => {
                self.screen = Screen::FirstTime;
                Ok(())
            }
            Screen::Landing => self.begin_drawing(display, now_ms),
            Screen::FirstTime => {
                self.seen_notice = true;
                self.begin_drawing(display, now_ms)
            }
            _ => Err(InkstepError::validation(
                "start is only valid from the landing screens",
            )),
        }
    }

    /// Discards the failed attempt and begins a fresh drawing session. Failed
    /// submissions never resume partial work.
    pub fn retry(&mut self, display: DisplayRect, now_ms: u64) -> InkstepResult<()> {
        match self.screen {
            Screen::ValidationError(_) => self.begin_drawing(display, now_ms),
            _ => Err(InkstepError::validation(
                "retry is only valid from the validation-error screen",
            )),
        }
    }

    fn begin_drawing(&mut self, display: DisplayRect, now_ms: u64) -> InkstepResult<()> {
        let surface =
            CpuSurface::with_background(self.config.canvas, self.config.policy.background)?;
        let recorder = StrokeRecorder::new(
            CoordinateMap::new(self.config.canvas, display),
            self.config.brush_width,
        )?;
        self.surface = Some(surface);
        self.recorder = Some(recorder);
        self.time_left_secs = self.config.timer_secs;
        self.session_started_ms = now_ms;
        self.screen = Screen::Drawing;
        tracing::debug!(prompt_index = self.prompt_index, "drawing session started");
        Ok(())
    }

    pub fn select_color(&mut self, index: usize) -> InkstepResult<()> {
        if index >= self.config.palette.len() {
            return Err(InkstepError::validation(format!(
                "palette index {index} out of range"
            )));
        }
        self.selected_color = index;
        Ok(())
    }

    pub fn pointer_down(&mut self, pos: Point, now_ms: u64) {
        if self.screen != Screen::Drawing {
            return;
        }
        let color = self.config.palette[self.selected_color];
        let clock = now_ms.saturating_sub(self.session_started_ms);
        if let (Some(rec), Some(surface)) = (self.recorder.as_mut(), self.surface.as_mut()) {
            rec.begin(surface, pos, color, clock);
        }
    }

    pub fn pointer_move(&mut self, pos: Point) {
        if self.screen != Screen::Drawing {
            return;
        }
        if let (Some(rec), Some(surface)) = (self.recorder.as_mut(), self.surface.as_mut()) {
            rec.extend(surface, pos);
        }
    }

    pub fn pointer_up(&mut self, now_ms: u64) {
        if self.screen != Screen::Drawing {
            return;
        }
        let clock = now_ms.saturating_sub(self.session_started_ms);
        if let Some(rec) = self.recorder.as_mut() {
            rec.end(clock);
        }
    }

    /// One-second countdown tick. At zero the auto-submit path runs: same
    /// validation and save as a manual submit, minus the minimum-time check.
    pub fn tick(&mut self, now_ms: u64) {
        if self.screen != Screen::Drawing {
            return;
        }
        self.time_left_secs = self.time_left_secs.saturating_sub(1);
        if self.time_left_secs == 0 {
            // Outcome is carried entirely by the screen transition.
            let _ = self.validate_and_submit(now_ms, SubmitTrigger::TimerExpired);
        }
    }

    /// Manual submit. On rejection the error also drives the screen to
    /// `ValidationError`, so callers may rely on either signal.
    pub fn submit(&mut self, now_ms: u64) -> InkstepResult<Submission> {
        if self.screen != Screen::Drawing {
            return Err(InkstepError::validation(
                "submit is only valid while drawing",
            ));
        }
        self.validate_and_submit(now_ms, SubmitTrigger::Manual)
    }

    #[tracing::instrument(skip(self), fields(prompt_index = self.prompt_index))]
    fn validate_and_submit(
        &mut self,
        now_ms: u64,
        trigger: SubmitTrigger,
    ) -> InkstepResult<Submission> {
        let clock = now_ms.saturating_sub(self.session_started_ms);

        // Finalize any in-progress pointer state before validation reads the
        // raster; the timer must not race an open stroke.
        let Some(mut recorder) = self.recorder.take() else {
            return Err(InkstepError::validation("no active drawing session"));
        };
        recorder.end(clock);
        let Some(surface) = self.surface.take() else {
            return Err(InkstepError::validation("no active drawing surface"));
        };

        let policy = self.config.policy;
        let coverage = coverage_fraction(&surface, policy.background, policy.tolerance);
        let elapsed_secs = recorder
            .first_input_ms()
            .map(|first| (clock.saturating_sub(first)) as f64 / 1_000.0)
            .unwrap_or(0.0);

        if let Err(e) = validate_drawing(coverage, elapsed_secs, &policy, trigger) {
            // Partial work is discarded; retry starts a fresh session.
            let kind = match e {
                InkstepError::TooFast { .. } => ValidationKind::TooFast,
                _ => ValidationKind::Blank,
            };
            self.screen = Screen::ValidationError(kind);
            self.time_left_secs = 0;
            tracing::debug!(coverage, elapsed_secs, ?kind, "submission rejected");
            return Err(e);
        }

        self.screen = Screen::Submitting;
        let image_png = match encode_png(&surface) {
            Ok(png) => png,
            Err(e) => {
                // Keep the flow re-enterable: rasterization failure is surfaced
                // like any other retryable submit failure.
                self.screen = Screen::ValidationError(ValidationKind::Network);
                self.time_left_secs = 0;
                return Err(e);
            }
        };
        let draft = SubmissionDraft {
            user_id: self.user.clone(),
            prompt_index: self.prompt_index,
            image_png,
            stroke_log: recorder.finish(),
            coverage,
            duration_secs: elapsed_secs.floor() as u64,
        };

        match self.gateway.save_submission(draft, now_ms) {
            Ok(submission) => {
                self.last_submission = Some(submission.clone());
                self.screen = Screen::Congrats;
                Ok(submission)
            }
            Err(e) => {
                // No partial submission survives; the in-memory strokes are
                // already gone and the user gets a retryable message.
                self.screen = Screen::ValidationError(ValidationKind::Network);
                self.time_left_secs = 0;
                tracing::warn!(error = %e, "save failed");
                Err(e)
            }
        }
    }

    /// Loads the gallery (viewer's drawing first, rest newest-first) and shows it.
    pub fn enter_gallery(&mut self) -> InkstepResult<Vec<Submission>> {
        let rows = self.gateway.load_gallery(self.prompt_index, &self.user)?;
        self.screen = Screen::Gallery;
        Ok(rows)
    }

    pub fn to_already_done(&mut self) {
        self.screen = Screen::AlreadyDone;
    }
}

/// Formats a countdown (e.g. time until the next prompt at midnight) as
/// `HH:MM:SS`.
pub fn format_hms(ms: u64) -> String {
    let total_secs = ms / 1_000;
    format!(
        "{:02}:{:02}:{:02}",
        total_secs / 3_600,
        (total_secs % 3_600) / 60,
        total_secs % 60
    )
}
