//! Day boundaries for daily bonuses, streaks and time-of-day badges
//!
//! All checks use the user's local calendar day, given as a fixed offset from
//! UTC stored with the user's state. Offsets outside ±24h are treated as UTC.

use chrono::{DateTime, FixedOffset, NaiveDate, Offset, Timelike, Utc};

fn local_offset(utc_offset_minutes: i32) -> FixedOffset {
    utc_offset_minutes
        .checked_mul(60)
        .and_then(FixedOffset::east_opt)
        .unwrap_or_else(|| Utc.fix())
}

/// Calendar date of `at` on the user's local clock
pub fn local_date(at: DateTime<Utc>, utc_offset_minutes: i32) -> NaiveDate {
    at.with_timezone(&local_offset(utc_offset_minutes)).date_naive()
}

/// Hour (0-23) of `at` on the user's local clock
pub fn local_hour(at: DateTime<Utc>, utc_offset_minutes: i32) -> u32 {
    at.with_timezone(&local_offset(utc_offset_minutes)).hour()
}

/// Whether a measurement at `now` is the first of the user's local day
pub fn is_first_measurement_today(
    last_measured_at: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
    utc_offset_minutes: i32,
) -> bool {
    match last_measured_at {
        None => true,
        Some(last) => local_date(last, utc_offset_minutes) < local_date(now, utc_offset_minutes),
    }
}

/// Streak length after a measurement at `now`.
///
/// Same day keeps the streak, the following day extends it, any longer gap
/// restarts it at 1. A `now` on an earlier day than the last measurement
/// counts as the same day.
pub fn next_streak_days(
    last_measured_at: Option<DateTime<Utc>>,
    streak_days: u32,
    now: DateTime<Utc>,
    utc_offset_minutes: i32,
) -> u32 {
    let Some(last) = last_measured_at else {
        return 1;
    };
    let today = local_date(now, utc_offset_minutes);
    let last_day = local_date(last, utc_offset_minutes);

    match (today - last_day).num_days() {
        ..=0 => streak_days.max(1),
        1 => streak_days.saturating_add(1),
        _ => 1,
    }
}
