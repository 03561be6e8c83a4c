//! Exponential leveling curve.
//!
//! The cumulative XP threshold at which `level` begins is
//! `base_xp * multiplier^(level - 1)`; `level_for` returns the largest level
//! whose threshold is at or below the given XP. Thresholds are walked
//! iteratively rather than inverted with a logarithm so exact-threshold
//! inputs land on the right side of the boundary.

/// Hard ceiling on computed levels. The curve reaches astronomically large
/// thresholds long before this; the cap bounds the walk against a
/// misconfigured multiplier.
pub const LEVEL_CAP: u32 = 1000;

/// Cumulative XP at which `level` begins.
pub fn xp_threshold(level: u32, base_xp: u64, multiplier: f64) -> u64 {
    let exponent = level.max(1) - 1;
    (base_xp as f64 * multiplier.powi(exponent as i32)).floor() as u64
}

/// Largest level >= 1 whose threshold is <= `xp`.
pub fn level_for(xp: u64, base_xp: u64, multiplier: f64) -> u32 {
    let mut level = 1u32;
    while level < LEVEL_CAP {
        let next = xp_threshold(level + 1, base_xp, multiplier);
        // A multiplier at or below 1.0 stops producing higher thresholds;
        // treat the curve as exhausted rather than looping to the cap.
        if next <= xp_threshold(level, base_xp, multiplier) || xp < next {
            break;
        }
        level += 1;
    }
    level
}
