use chrono::{Datelike, Duration, NaiveDate, Timelike, Weekday};
use chronos_core::Timestamp;

/// Calendar date a session's activity is attributed to
///
/// A session opening at or after 12:00 UTC belongs to the *following*
/// calendar date: overnight sessions (futures opening at 22:00 or 23:00,
/// shifting with daylight-saving changes) do the bulk of their trading after
/// midnight. The noon cut keeps the rule stable when the open hour moves by
/// exactly the DST offset.
pub fn trading_day(session_start: Timestamp) -> NaiveDate {
    let date = session_start.date_naive();
    if session_start.hour() >= 12 {
        date + Duration::days(1)
    } else {
        date
    }
}

/// ISO 8601 week number of a date
pub fn iso_week(date: NaiveDate) -> u32 {
    date.iso_week().week()
}

/// Zero-based quarter of a date (Jan/Feb/Mar = 0)
pub fn quarter_index(date: NaiveDate) -> u32 {
    (date.month() - 1) / 3
}

pub fn is_monday(date: NaiveDate) -> bool {
    date.weekday() == Weekday::Mon
}

/// The 4-hour block containing `t`, anchored at the session start
///
/// Blocks subdivide the session from its anchor: block `n` spans
/// `[anchor + 4n hours, anchor + 4(n+1) hours)`. Returns `None` for
/// observations before the anchor, which belong to no block.
pub fn four_hour_block(anchor: Timestamp, t: Timestamp) -> Option<(Timestamp, Timestamp)> {
    if t < anchor {
        return None;
    }
    let index = (t - anchor).num_hours() / 4;
    let start = anchor + Duration::hours(index * 4);
    Some((start, start + Duration::hours(4)))
}
