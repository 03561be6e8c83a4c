//! Stamina regeneration math.
//!
//! One stamina point accrues per fixed interval of wall-clock time. The
//! sweep credits whole intervals only and advances the last-regeneration
//! timestamp by exactly the credited amount, so fractional progress toward
//! the next tick survives sweep jitter.

use chrono::{DateTime, Duration, Utc};

/// Compute the regeneration credit for one player.
///
/// Returns `(stamina_to_add, new_last_stamina_time)`, or `None` when there
/// is nothing to apply (already at cap, or not a whole interval elapsed).
/// The caller persists both values together.
pub fn regen_ticks(
    stamina: u32,
    max_stamina: u32,
    last: DateTime<Utc>,
    now: DateTime<Utc>,
    interval_minutes: i64,
) -> Option<(u32, DateTime<Utc>)> {
    if stamina >= max_stamina || interval_minutes <= 0 {
        return None;
    }
    let elapsed_minutes = now.signed_duration_since(last).num_minutes();
    if elapsed_minutes < interval_minutes {
        return None;
    }
    let whole_intervals = (elapsed_minutes / interval_minutes) as u32;
    let to_add = whole_intervals.min(max_stamina - stamina);
    if to_add == 0 {
        return None;
    }
    // Advance by exactly the credited intervals, not to `now`: resetting the
    // clock on every sweep would leak partial progress each tick.
    let new_last = last + Duration::minutes(interval_minutes * to_add as i64);
    Some((to_add, new_last))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(minutes: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap() + Duration::minutes(minutes)
    }

    #[test]
    fn no_credit_before_a_whole_interval() {
        assert_eq!(regen_ticks(2, 5, at(0), at(29), 30), None);
        assert_eq!(regen_ticks(2, 5, at(0), at(0), 30), None);
    }

    #[test]
    fn credits_whole_intervals_only() {
        let (added, new_last) = regen_ticks(1, 5, at(0), at(75), 30).unwrap();
        assert_eq!(added, 2);
        // 75 minutes elapsed, 60 consumed; 15 minutes of progress retained.
        assert_eq!(new_last, at(60));
    }

    #[test]
    fn credit_is_capped_at_max_stamina() {
        let (added, new_last) = regen_ticks(4, 5, at(0), at(300), 30).unwrap();
        assert_eq!(added, 1);
        assert_eq!(new_last, at(30));
    }

    #[test]
    fn at_cap_is_a_noop() {
        assert_eq!(regen_ticks(5, 5, at(0), at(300), 30), None);
    }

    #[test]
    fn rerun_immediately_after_credit_is_a_noop() {
        let (added, new_last) = regen_ticks(0, 5, at(0), at(61), 30).unwrap();
        assert_eq!(added, 2);
        assert_eq!(regen_ticks(added, 5, new_last, at(61), 30), None);
    }

    #[test]
    fn clock_skew_backwards_is_a_noop() {
        assert_eq!(regen_ticks(1, 5, at(100), at(40), 30), None);
    }
}
