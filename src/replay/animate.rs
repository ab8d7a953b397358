use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use rand::{Rng as _, SeedableRng as _, rngs::StdRng};

use crate::foundation::error::InkstepResult;
use crate::replay::engine::{ReplayEngine, ReplayState, StepEvent};
use crate::surface::RasterSurface;

/// The cooperative yield primitive between replay steps. Implementations defer
/// control for `delay` and then let the caller's loop resume; tests substitute a
/// spy to assert what gets scheduled.
pub trait Scheduler {
    fn defer(&mut self, delay: Duration);
}

/// Sleeps on the current thread. Used by the CLI and demo drivers where the
/// replay owns the thread anyway.
#[derive(Clone, Copy, Debug, Default)]
pub struct ThreadScheduler;

impl Scheduler for ThreadScheduler {
    fn defer(&mut self, delay: Duration) {
        std::thread::sleep(delay);
    }
}

/// Cooperative cancellation shared between a replay loop and whoever tears the
/// surface down. Checked before every step; once set, no further step is
/// scheduled and nothing panics.
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// How a gallery replay invocation ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReplayOutcome {
    Settled,
    Cancelled,
}

/// Drives a replay cooperatively: paint one point, defer, repeat. The token is
/// consulted before every step, so cancellation between any two steps stops the
/// loop without scheduling anything further.
pub fn run_replay(
    engine: &mut ReplayEngine<'_>,
    surface: &mut dyn RasterSurface,
    scheduler: &mut dyn Scheduler,
    token: &CancelToken,
) -> InkstepResult<ReplayOutcome> {
    engine.begin(surface)?;
    loop {
        if token.is_cancelled() {
            engine.cancel();
            tracing::debug!(cursor = ?engine.cursor(), "replay cancelled");
            return Ok(ReplayOutcome::Cancelled);
        }
        match engine.step(surface) {
            StepEvent::Painted { delay } | StepEvent::StrokeGap { delay } => {
                scheduler.defer(delay);
            }
            StepEvent::Settled => return Ok(ReplayOutcome::Settled),
        }
    }
}

/// Lifecycle of one drawing's tile in the gallery.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TileState {
    /// Not yet visible; replay has not been considered.
    Hidden,
    /// Became visible; replay starts after the given delay.
    Pending { start_delay: Duration },
    Animating,
    /// Terminal: the finished image is simply displayed from now on.
    Settled,
}

/// At-most-once replay trigger for a gallery tile.
///
/// Replay is lazy: nothing happens until the tile becomes visible. The viewer's
/// own drawing starts immediately; everyone else's gets a small seeded startup
/// jitter so simultaneously visible tiles don't animate in lockstep.
#[derive(Clone, Debug)]
pub struct GalleryTile {
    state: TileState,
    seed: u64,
    index: u64,
}

/// Upper bound on the randomized startup jitter.
const MAX_STARTUP_JITTER: Duration = Duration::from_millis(300);

impl GalleryTile {
    pub fn new(seed: u64, index: u64) -> Self {
        Self {
            state: TileState::Hidden,
            seed,
            index,
        }
    }

    pub fn state(&self) -> TileState {
        self.state
    }

    /// Called when the tile's container becomes visible. Returns the start delay
    /// the first time; a repeat trigger (still animating, or already settled) is
    /// a no-op returning `None`.
    pub fn on_visible(&mut self, is_own_drawing: bool) -> Option<Duration> {
        if self.state != TileState::Hidden {
            return None;
        }
        let start_delay = if is_own_drawing {
            Duration::ZERO
        } else {
            startup_jitter(self.seed, self.index)
        };
        self.state = TileState::Pending { start_delay };
        Some(start_delay)
    }

    /// The delayed start fired and the replay loop is now running.
    pub fn begin_animating(&mut self) {
        if matches!(self.state, TileState::Pending { .. }) {
            self.state = TileState::Animating;
        }
    }

    /// The replay painted its last point; re-entering view must not restart it.
    pub fn settle(&mut self) {
        self.state = TileState::Settled;
    }
}

fn startup_jitter(seed: u64, index: u64) -> Duration {
    let mut rng = StdRng::seed_from_u64(seed ^ index.wrapping_mul(0x9E37_79B9_7F4A_7C15));
    Duration::from_millis(rng.gen_range(0..MAX_STARTUP_JITTER.as_millis() as u64))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::core::{CanvasSize, DEFAULT_PALETTE};
    use crate::replay::engine::ReplayOpts;
    use crate::stroke::model::{Stroke, StrokeLog, StrokePoint};
    use crate::surface::CpuSurface;

    /// Counts deferrals and can flip the token at a chosen call.
    struct SpyScheduler {
        calls: usize,
        cancel_at: Option<(usize, CancelToken)>,
    }

    impl Scheduler for SpyScheduler {
        fn defer(&mut self, _delay: Duration) {
            self.calls += 1;
            if let Some((at, token)) = &self.cancel_at
                && self.calls == *at
            {
                token.cancel();
            }
        }
    }

    fn two_stroke_log() -> StrokeLog {
        let mut log = StrokeLog::new();
        log.push(Stroke {
            points: vec![StrokePoint::new(10.0, 10.0), StrokePoint::new(40.0, 10.0)],
            color: DEFAULT_PALETTE[0],
            relative_time_ms: 100,
        });
        log.push(Stroke {
            points: vec![StrokePoint::new(10.0, 60.0), StrokePoint::new(40.0, 60.0)],
            color: DEFAULT_PALETTE[2],
            relative_time_ms: 900,
        });
        log
    }

    #[test]
    fn uncancelled_replay_settles() {
        let log = two_stroke_log();
        let mut surface = CpuSurface::new(CanvasSize::square(80).unwrap()).unwrap();
        let mut engine = ReplayEngine::new(&log, surface.size(), ReplayOpts::default())
            .unwrap()
            .unwrap();
        let mut sched = SpyScheduler {
            calls: 0,
            cancel_at: None,
        };
        let outcome =
            run_replay(&mut engine, &mut surface, &mut sched, &CancelToken::new()).unwrap();
        assert_eq!(outcome, ReplayOutcome::Settled);
        assert_eq!(engine.state(), ReplayState::Settled);
        // 2 point defers for stroke one, the gap defer, 1 point defer for stroke
        // two; the final point settles without a defer.
        assert_eq!(sched.calls, 4);
    }

    #[test]
    fn cancel_after_first_stroke_paints_nothing_further() {
        let log = two_stroke_log();
        let mut surface = CpuSurface::new(CanvasSize::square(80).unwrap()).unwrap();
        let mut engine = ReplayEngine::new(&log, surface.size(), ReplayOpts::default())
            .unwrap()
            .unwrap();

        // Defer #2 follows the last painted point of stroke one: cancel there.
        let token = CancelToken::new();
        let mut sched = SpyScheduler {
            calls: 0,
            cancel_at: Some((2, token.clone())),
        };
        let outcome = run_replay(&mut engine, &mut surface, &mut sched, &token).unwrap();
        assert_eq!(outcome, ReplayOutcome::Cancelled);
        assert_eq!(engine.state(), ReplayState::Cancelled);
        // No scheduling happened after the cancelling call.
        assert_eq!(sched.calls, 2);

        // Surface shows exactly the first stroke: its span is inked, the second
        // stroke's row is untouched.
        let scale = 80.0 / log.max_coordinate(); // 80/60
        let y1 = (10.0 * scale) as u32;
        let y2 = (60.0 * scale) as u32;
        assert_eq!(surface.pixel((20.0 * scale) as u32, y1), DEFAULT_PALETTE[0]);
        assert_ne!(
            surface.pixel((20.0 * scale) as u32, y2.min(79)),
            DEFAULT_PALETTE[2]
        );
    }

    #[test]
    fn own_drawing_starts_with_zero_delay() {
        let mut tile = GalleryTile::new(42, 0);
        assert_eq!(tile.on_visible(true), Some(Duration::ZERO));
    }

    #[test]
    fn other_drawings_get_bounded_jitter() {
        for index in 0..32 {
            let mut tile = GalleryTile::new(7, index);
            let delay = tile.on_visible(false).unwrap();
            assert!(delay < MAX_STARTUP_JITTER, "index {index}: {delay:?}");
        }
    }

    #[test]
    fn jitter_is_seed_deterministic() {
        let a = GalleryTile::new(7, 3).on_visible(false);
        let b = GalleryTile::new(7, 3).on_visible(false);
        assert_eq!(a, b);
    }

    #[test]
    fn second_trigger_is_a_noop() {
        let mut tile = GalleryTile::new(1, 1);
        assert!(tile.on_visible(false).is_some());
        assert_eq!(tile.on_visible(false), None);
        tile.begin_animating();
        assert_eq!(tile.on_visible(false), None);
        tile.settle();
        assert_eq!(tile.on_visible(false), None);
        assert_eq!(tile.state(), TileState::Settled);
    }
}
