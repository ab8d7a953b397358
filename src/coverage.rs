use crate::foundation::core::{DEFAULT_BACKGROUND, Rgb8};
use crate::foundation::error::{InkstepError, InkstepResult};
use crate::surface::RasterSurface;

/// Submit-time acceptance thresholds. These vary by deployment; treat them as
/// configuration, never as fixed contracts.
#[derive(Clone, Copy, Debug, serde::Serialize, serde::Deserialize)]
pub struct ValidationPolicy {
    /// Minimum fraction of pixels that must differ from the background.
    pub min_coverage: f64,
    /// Minimum seconds between the first pointer-down and submit (manual only).
    pub min_drawing_secs: f64,
    /// The color blank pixels are compared against.
    pub background: Rgb8,
    /// Per-channel threshold: a pixel is marked when any channel differs from
    /// the background by more than this.
    pub tolerance: u8,
}

impl Default for ValidationPolicy {
    fn default() -> Self {
        Self {
            min_coverage: 0.002,
            min_drawing_secs: 3.0,
            background: DEFAULT_BACKGROUND,
            tolerance: 10,
        }
    }
}

/// What initiated the submit. Timer expiry skips the minimum-time check since
/// the full allotted time has already elapsed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SubmitTrigger {
    Manual,
    TimerExpired,
}

/// Fraction of pixels whose color differs from `background` by more than
/// `tolerance` in any channel. Depends only on final raster contents, so a
/// drawing painted back over in the background color correctly reads as blank.
pub fn coverage_fraction(surface: &dyn RasterSurface, background: Rgb8, tolerance: u8) -> f64 {
    let data = surface.data();
    let total = data.len() / 3;
    if total == 0 {
        return 0.0;
    }

    let t = i16::from(tolerance);
    let (bg_r, bg_g, bg_b) = (
        i16::from(background.r),
        i16::from(background.g),
        i16::from(background.b),
    );

    let mut marked: u64 = 0;
    for px in data.chunks_exact(3) {
        if (i16::from(px[0]) - bg_r).abs() > t
            || (i16::from(px[1]) - bg_g).abs() > t
            || (i16::from(px[2]) - bg_b).abs() > t
        {
            marked += 1;
        }
    }
    marked as f64 / total as f64
}

/// Accepts or rejects a finished drawing.
///
/// Coverage is always checked first, so a blank canvas is reported as
/// `BlankCanvas` even when the drawing was also too fast. The time check only
/// applies to manual submits.
pub fn validate_drawing(
    coverage: f64,
    elapsed_secs: f64,
    policy: &ValidationPolicy,
    trigger: SubmitTrigger,
) -> InkstepResult<()> {
    if coverage < policy.min_coverage {
        return Err(InkstepError::BlankCanvas {
            coverage,
            minimum: policy.min_coverage,
        });
    }
    if trigger == SubmitTrigger::Manual && elapsed_secs < policy.min_drawing_secs {
        return Err(InkstepError::TooFast {
            elapsed_secs,
            minimum_secs: policy.min_drawing_secs,
        });
    }
    Ok(())
}
