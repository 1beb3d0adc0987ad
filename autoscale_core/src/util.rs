//! Small unit and timing helpers.

use std::time::{Duration, Instant};

/// Number of grams in one kilogram.
pub const GRAMS_PER_KG: f32 = 1_000.0;

/// Clamp magnitudes strictly below `band` to exactly zero.
#[inline]
pub fn deadband(x: f32, band: f32) -> f32 {
    if x.abs() < band { 0.0 } else { x }
}

/// Duration from `since` to `now`, zero if `now` is earlier.
#[inline]
pub fn elapsed(now: Instant, since: Instant) -> Duration {
    now.saturating_duration_since(since)
}

/// Milliseconds from `since` to `now` as `u32`, saturating.
#[inline]
pub fn rel_ms_u32(now: Instant, since: Instant) -> u32 {
    let ms = elapsed(now, since).as_millis();
    ms.min(u128::from(u32::MAX)) as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deadband_clamps_small_values_symmetrically() {
        assert_eq!(deadband(0.004, 0.005), 0.0);
        assert_eq!(deadband(-0.004, 0.005), 0.0);
        assert_eq!(deadband(0.005, 0.005), 0.005);
        assert_eq!(deadband(-2.5, 0.005), -2.5);
    }

    #[test]
    fn rel_ms_saturates_backwards() {
        let t = Instant::now();
        assert_eq!(rel_ms_u32(t, t + Duration::from_millis(5)), 0);
        assert_eq!(rel_ms_u32(t + Duration::from_millis(7), t), 7);
    }
}
