//! Human-relative time formatting for the `Posted` column.

const MINUTE: i64 = 60;
const HOUR: i64 = 60 * MINUTE;
const DAY: i64 = 24 * HOUR;
const WEEK: i64 = 7 * DAY;
const YEAR: i64 = 365 * DAY;

/// Render the delta between two epoch timestamps as a relative phrase.
///
/// Future timestamps (clock skew on the feed side) collapse to "just now".
#[must_use]
pub fn relative(then: i64, now: i64) -> String {
    let delta = now.saturating_sub(then);

    if delta < 10 {
        return "just now".to_string();
    }

    let (count, unit) = if delta < MINUTE {
        (delta, "second")
    } else if delta < HOUR {
        (delta / MINUTE, "minute")
    } else if delta < DAY {
        (delta / HOUR, "hour")
    } else if delta < WEEK {
        (delta / DAY, "day")
    } else if delta < YEAR {
        (delta / WEEK, "week")
    } else {
        (delta / YEAR, "year")
    };

    if count == 1 {
        format!("1 {unit} ago")
    } else {
        format!("{count} {unit}s ago")
    }
}
