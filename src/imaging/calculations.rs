//! Pure calculation functions for image dimensions and size deltas.
//!
//! All functions here are pure and testable without any I/O or images.
//! Arithmetic is done in `u64` integers so flooring is exact; the planner
//! never rejects degenerate results (a 1px source halves to 0px), that is
//! left to the rasterizer.

use super::params::{CompressionSettings, ResizeMode};

/// Calculate target dimensions for a source image under the given settings.
///
/// # Arguments
/// * `original` - Intrinsic source dimensions (width, height)
/// * `settings` - Resize mode and optional custom width/height
///
/// # Returns
/// * `(width, height)` - Target dimensions, floored
///
/// # Examples
/// ```
/// # use imgsquash::imaging::{plan_dimensions, CompressionSettings, ResizeMode};
/// let half = CompressionSettings { resize: ResizeMode::Half, ..Default::default() };
/// assert_eq!(plan_dimensions((101, 50), &half), (50, 25));
///
/// // Only a custom width: height follows the source aspect ratio
/// let custom = CompressionSettings {
///     resize: ResizeMode::Custom,
///     width: Some(300),
///     ..Default::default()
/// };
/// assert_eq!(plan_dimensions((400, 200), &custom), (300, 150));
/// ```
pub fn plan_dimensions(original: (u32, u32), settings: &CompressionSettings) -> (u32, u32) {
    let (orig_w, orig_h) = original;

    match settings.resize {
        ResizeMode::Original => original,
        ResizeMode::Half => (scale(orig_w, 1, 2), scale(orig_h, 1, 2)),
        ResizeMode::ThreeQuarters => (scale(orig_w, 3, 4), scale(orig_h, 3, 4)),
        ResizeMode::Custom => match (settings.width, settings.height) {
            (Some(w), Some(h)) => (w, h),
            (Some(w), None) => (w, scale(orig_h, w, orig_w)),
            (None, Some(h)) => (scale(orig_w, h, orig_h), h),
            (None, None) => original,
        },
    }
}

/// `floor(value * num / den)`, saturating at `u32::MAX`. A zero denominator yields 0.
fn scale(value: u32, num: u32, den: u32) -> u32 {
    (value as u64 * num as u64)
        .checked_div(den as u64)
        .map(|v| u32::try_from(v).unwrap_or(u32::MAX))
        .unwrap_or(0)
}

/// Percentage of the original size saved by the compressed output.
///
/// `round((original - compressed) / original * 100)`, rounding halves toward
/// positive infinity. Positive means the output shrank, negative means it grew.
/// An empty original reports 0.
pub fn percent_change(original: u64, compressed: u64) -> i64 {
    if original == 0 {
        return 0;
    }
    let delta = original as f64 - compressed as f64;
    (delta * 100.0 / original as f64 + 0.5).floor() as i64
}

/// Direction and magnitude of a size change, as reported to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SizeChange {
    /// Output is smaller by this many percent.
    Smaller(u32),
    /// Output is larger by this many percent.
    Larger(u32),
    /// Rounded change is zero.
    Same,
}

impl SizeChange {
    pub fn from_sizes(original: u64, compressed: u64) -> Self {
        Self::from_percent(percent_change(original, compressed))
    }

    pub fn from_percent(percent: i64) -> Self {
        let magnitude = u32::try_from(percent.unsigned_abs()).unwrap_or(u32::MAX);
        match percent.signum() {
            1 => SizeChange::Smaller(magnitude),
            -1 => SizeChange::Larger(magnitude),
            _ => SizeChange::Same,
        }
    }
}

impl std::fmt::Display for SizeChange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SizeChange::Smaller(p) => write!(f, "{p}% smaller"),
            SizeChange::Larger(p) => write!(f, "{p}% larger"),
            SizeChange::Same => f.write_str("same size"),
        }
    }
}
