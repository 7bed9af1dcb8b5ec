use chrono::{DateTime, Duration, FixedOffset, NaiveTime};

use crate::services::CalendarEvent;

pub const DIVIDER: &str = "─────────────────────";

/// Local midnight of `now`'s day and the following midnight.
pub fn today_bounds(now: DateTime<FixedOffset>) -> (DateTime<FixedOffset>, DateTime<FixedOffset>) {
    let start = now - now.time().signed_duration_since(NaiveTime::MIN);
    (start, start + Duration::days(1))
}

pub fn fmt_hhmm(at: DateTime<FixedOffset>) -> String {
    at.format("%H:%M").to_string()
}

/// One schedule line; timed events are shown in `offset`.
pub fn format_event(event: &CalendarEvent, offset: FixedOffset) -> String {
    let title = event.summary.as_deref().unwrap_or("(no title)");
    match event.start.date_time {
        Some(start) => {
            let start = start.with_timezone(&offset);
            match event.end.date_time {
                Some(end) => format!(
                    "📝 {title}  ⏰ {}–{}",
                    fmt_hhmm(start),
                    fmt_hhmm(end.with_timezone(&offset))
                ),
                None => format!("📝 {title}  ⏰ {}", fmt_hhmm(start)),
            }
        }
        None => format!("📝 {title}  📌 All day"),
    }
}

/// `+05:30` style label for headers.
pub fn offset_label(offset: FixedOffset) -> String {
    let seconds = offset.local_minus_utc();
    let sign = if seconds < 0 { '-' } else { '+' };
    let minutes = seconds.abs() / 60;
    format!("UTC{sign}{:02}:{:02}", minutes / 60, minutes % 60)
}
