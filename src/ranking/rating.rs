//! Single-chart rating.
//!
//! ```text
//! s = score / 10000
//! rating = 0                             if s < 50
//!          max(0, d + 1 - (98 - s) / 4)  if 50 <= s < 98
//!          d + 2 - (100 - s) / 2         if s >= 98
//! ```
//! rounded to 6 decimals.

/// Highest rating a chart can give above its difficulty (perfect score)
pub const MAX_BONUS: f64 = 2.0;

/// Score units per percent
const SCORE_SCALE: f64 = 10_000.0;

/// Rating of one play
pub fn rating(difficulty: f64, raw_score: u32) -> f64 {
    let s = raw_score as f64 / SCORE_SCALE;
    if s < 50.0 {
        return 0.0;
    }
    let r = if s >= 98.0 {
        difficulty + 2.0 - (100.0 - s) / 2.0
    } else {
        (difficulty + 1.0 - (98.0 - s) / 4.0).max(0.0)
    };
    round6(r)
}

/// Upper bound of [`rating`] on a chart of this difficulty.
///
/// Rounded the same way as [`rating`], so a perfect score hits it exactly.
pub fn max_rating(difficulty: f64) -> f64 {
    round6(difficulty + MAX_BONUS)
}

fn round6(x: f64) -> f64 {
    (x * 1e6).round() / 1e6
}
