//! Reset-period arithmetic. All day and week boundaries in the game
//! (check-ins, daily/weekly tasks, countdown timers, the earnings reset)
//! are anchored to midnight in a fixed UTC+4 zone.

use chrono::{DateTime, FixedOffset, Utc};

/// Offset of the reset zone from UTC, in seconds.
pub const RESET_OFFSET_SECS: i64 = 4 * 3600;

pub const DAY_SECS: i64 = 86_400;
pub const WEEK_SECS: i64 = 7 * DAY_SECS;

// 1970-01-01 was a Thursday, three days past a Monday.
const EPOCH_MONDAY_SHIFT: i64 = 3 * DAY_SECS;

pub fn now() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

fn reset_zone() -> FixedOffset {
    FixedOffset::east_opt(RESET_OFFSET_SECS as i32).expect("reset offset in range")
}

/// Calendar date in the reset zone, as `YYYY-MM-DD`.
pub fn date_string(now: i64) -> String {
    DateTime::<Utc>::from_timestamp(now, 0)
        .unwrap_or_default()
        .with_timezone(&reset_zone())
        .format("%Y-%m-%d")
        .to_string()
}

pub fn yesterday_string(now: i64) -> String {
    date_string(now - DAY_SECS)
}

pub fn rfc3339(ts: i64) -> String {
    DateTime::<Utc>::from_timestamp(ts, 0)
        .unwrap_or_default()
        .to_rfc3339()
}

/// Epoch second of the current day's midnight in the reset zone.
pub fn day_start(now: i64) -> i64 {
    now - (now + RESET_OFFSET_SECS).rem_euclid(DAY_SECS)
}

/// Epoch second of the most recent Monday 00:00 in the reset zone.
pub fn week_start(now: i64) -> i64 {
    now - (now + RESET_OFFSET_SECS + EPOCH_MONDAY_SHIFT).rem_euclid(WEEK_SECS)
}

/// Milliseconds until the next daily reset.
pub fn until_daily_reset(now: i64) -> i64 {
    (day_start(now) + DAY_SECS - now).max(0) * 1000
}

/// Milliseconds until the next Monday 00:00 in the reset zone.
pub fn until_weekly_reset(now: i64) -> i64 {
    (week_start(now) + WEEK_SECS - now).max(0) * 1000
}

#[cfg(test)]
mod tests {
    use super::*;

    // 2023-12-31T20:00:00Z == Monday 2024-01-01 00:00:00 in UTC+4
    const MONDAY_MIDNIGHT: i64 = 1_704_052_800;

    #[test]
    fn date_string_uses_reset_zone() {
        assert_eq!(date_string(MONDAY_MIDNIGHT), "2024-01-01");
        // One second earlier is still Sunday in the reset zone
        assert_eq!(date_string(MONDAY_MIDNIGHT - 1), "2023-12-31");
        // 21:00 UTC is already past midnight UTC+4
        assert_eq!(date_string(MONDAY_MIDNIGHT + 3600), "2024-01-01");
        assert_eq!(date_string(0), "1970-01-01");
    }

    #[test]
    fn yesterday_is_previous_reset_zone_date() {
        assert_eq!(yesterday_string(MONDAY_MIDNIGHT), "2023-12-31");
        assert_eq!(yesterday_string(MONDAY_MIDNIGHT + DAY_SECS), "2024-01-01");
    }

    #[test]
    fn day_start_is_fixed_point_at_midnight() {
        assert_eq!(day_start(MONDAY_MIDNIGHT), MONDAY_MIDNIGHT);
        assert_eq!(day_start(MONDAY_MIDNIGHT + 12 * 3600), MONDAY_MIDNIGHT);
        assert_eq!(day_start(MONDAY_MIDNIGHT - 1), MONDAY_MIDNIGHT - DAY_SECS);
    }

    #[test]
    fn week_start_lands_on_monday_midnight() {
        assert_eq!(week_start(MONDAY_MIDNIGHT), MONDAY_MIDNIGHT);
        // Any time during the week maps back to the same Monday
        assert_eq!(week_start(MONDAY_MIDNIGHT + 3 * DAY_SECS + 7_000), MONDAY_MIDNIGHT);
        // A second before the boundary belongs to the previous week
        assert_eq!(week_start(MONDAY_MIDNIGHT - 1), MONDAY_MIDNIGHT - WEEK_SECS);
    }

    #[test]
    fn countdowns_span_full_period_at_boundary() {
        assert_eq!(until_daily_reset(MONDAY_MIDNIGHT), DAY_SECS * 1000);
        assert_eq!(until_weekly_reset(MONDAY_MIDNIGHT), WEEK_SECS * 1000);
        assert_eq!(until_daily_reset(MONDAY_MIDNIGHT + DAY_SECS - 1), 1000);
    }

    #[test]
    fn countdowns_stay_positive_and_bounded() {
        for offset in [0, 1, 3599, 86_399, 100_000, 599_999] {
            let t = MONDAY_MIDNIGHT + offset;
            let daily = until_daily_reset(t);
            let weekly = until_weekly_reset(t);
            assert!(daily > 0 && daily <= DAY_SECS * 1000);
            assert!(weekly > 0 && weekly <= WEEK_SECS * 1000);
        }
    }
}
