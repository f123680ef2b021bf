//! Retry backoff schedule
//!
//! The delay before attempt `n` is `n^4 + 5` seconds. There is no jitter: the
//! same attempt ordinal always yields the same delay.
//!
//! | attempt | delay |
//! |---------|-------|
//! | 2       | 21s   |
//! | 3       | 86s   |
//! | 4       | 261s  |
//! | 5       | 630s  |

use chrono::{DateTime, Utc};
use std::time::Duration;

/// Seconds added on top of the quartic term
pub const BASE_DELAY_SECS: u64 = 5;

/// Delay in whole seconds before the given attempt ordinal is made.
///
/// `attempt` is the ordinal about to be made, not the one that just failed.
pub fn delay_seconds(attempt: u32) -> u64 {
    let n = u64::from(attempt);
    n.saturating_mul(n)
        .saturating_mul(n)
        .saturating_mul(n)
        .saturating_add(BASE_DELAY_SECS)
}

/// [`delay_seconds`] as a [`std::time::Duration`]
pub fn delay(attempt: u32) -> Duration {
    Duration::from_secs(delay_seconds(attempt))
}

/// [`delay_seconds`] as a [`chrono::Duration`], clamped to the largest
/// representable value.
pub fn delay_chrono(attempt: u32) -> chrono::Duration {
    let secs = i64::try_from(delay_seconds(attempt)).unwrap_or(i64::MAX);
    chrono::Duration::try_seconds(secs).unwrap_or(chrono::Duration::MAX)
}

/// When the given attempt becomes due, counting from `reference_time`.
pub fn next_run_at(attempt: u32, reference_time: DateTime<Utc>) -> DateTime<Utc> {
    reference_time
        .checked_add_signed(delay_chrono(attempt))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use proptest::prelude::*;

    #[test]
    fn test_known_schedule() {
        assert_eq!(delay_seconds(1), 6);
        assert_eq!(delay_seconds(2), 21);
        assert_eq!(delay_seconds(3), 86);
        assert_eq!(delay_seconds(4), 261);
        assert_eq!(delay_seconds(5), 630);
        assert_eq!(delay_seconds(10), 10_005);
    }

    #[test]
    fn test_delay_wrappers_agree() {
        assert_eq!(delay(3), Duration::from_secs(86));
        assert_eq!(delay_chrono(3), chrono::Duration::seconds(86));
    }

    #[test]
    fn test_next_run_at() {
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();
        let at = next_run_at(2, now);
        assert_eq!((at - now).num_seconds(), 21);
    }

    #[test]
    fn test_huge_attempt_saturates() {
        assert_eq!(delay_seconds(u32::MAX), u64::MAX);
        let now = Utc::now();
        assert_eq!(next_run_at(u32::MAX, now), DateTime::<Utc>::MAX_UTC);
    }

    proptest! {
        #[test]
        fn prop_quartic_formula(n in 2u32..=1000) {
            let n64 = u64::from(n);
            prop_assert_eq!(delay_seconds(n), n64.pow(4) + 5);
        }

        #[test]
        fn prop_delay_strictly_increasing(n in 1u32..1000) {
            prop_assert!(delay_seconds(n + 1) > delay_seconds(n));
        }

        #[test]
        fn prop_always_at_least_one_second(n in any::<u32>()) {
            prop_assert!(delay_seconds(n) >= 1);
        }
    }
}
