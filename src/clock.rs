//! Date and time helpers shared by the timeline stages.
//!
//! All comparisons are naive local time. Callers pass `now` explicitly so every
//! predicate here is deterministic.

use chrono::{Days, Duration, Months, NaiveDate, NaiveDateTime, NaiveTime, Timelike};

use crate::models::{Event, RepeatType};

/// Time assumed for an event without a start time.
pub fn start_of_day() -> NaiveTime {
    NaiveTime::MIN
}

/// Time assumed for an event without an end time.
pub fn end_of_day() -> NaiveTime {
    NaiveTime::from_hms_opt(23, 59, 0).expect("23:59 is a valid time")
}

/// Drops seconds and sub-seconds, matching the `HH:mm` precision of event times.
pub fn truncate_to_minute(instant: NaiveDateTime) -> NaiveDateTime {
    instant
        .with_second(0)
        .and_then(|t| t.with_nanosecond(0))
        .unwrap_or(instant)
}

pub fn effective_end_date(event: &Event) -> NaiveDate {
    event.end_date.unwrap_or(event.date)
}

/// `date` at `time`, or midnight. The sort key of the timeline.
pub fn start_instant(event: &Event) -> NaiveDateTime {
    event.date.and_time(event.time.unwrap_or_else(start_of_day))
}

/// Effective end date at `end_time`, or 23:59.
pub fn end_instant(event: &Event) -> NaiveDateTime {
    effective_end_date(event).and_time(event.end_time.unwrap_or_else(end_of_day))
}

/// Whether `now` falls inside the event's date range and time window.
///
/// The time window is checked against the wall-clock minute of `now` on every
/// day of the range, so a multi-day 09:00-17:00 event is only in progress during
/// office hours.
pub fn is_in_progress(event: &Event, now: NaiveDateTime) -> bool {
    let now = truncate_to_minute(now);
    let today = now.date();
    if today < event.date || today > effective_end_date(event) {
        return false;
    }
    let current = now.time();
    match (event.time, event.end_time) {
        (Some(start), Some(end)) => start <= current && current <= end,
        (Some(start), None) => current >= start,
        (None, Some(end)) => current <= end,
        (None, None) => true,
    }
}

/// Whether the event's end instant lies strictly before `now`.
pub fn is_past(event: &Event, now: NaiveDateTime) -> bool {
    end_instant(event) < now
}

/// Advances `instant` by `interval` units of `repeat`.
///
/// Month steps clamp to the last day of shorter months. Returns `None` when the
/// result leaves chrono's representable range.
pub fn advance(instant: NaiveDateTime, repeat: RepeatType, interval: u32) -> Option<NaiveDateTime> {
    match repeat {
        RepeatType::Hour => instant.checked_add_signed(Duration::hours(interval as i64)),
        RepeatType::Day => instant.checked_add_days(Days::new(interval as u64)),
        RepeatType::Week => instant.checked_add_days(Days::new(interval as u64 * 7)),
        RepeatType::Month => instant.checked_add_months(Months::new(interval)),
    }
}

/// Produces up to `count` instants starting at `anchor`, each one step after the
/// previous. Stepping is iterative, so a month series starting on the 31st
/// drifts once it hits a shorter month.
pub fn recurrence_dates(anchor: NaiveDateTime, repeat: RepeatType, interval: u32, count: usize) -> Vec<NaiveDateTime> {
    let mut dates = Vec::with_capacity(count);
    let mut current = Some(anchor);
    while dates.len() < count {
        let Some(instant) = current else { break };
        dates.push(instant);
        current = advance(instant, repeat, interval);
    }
    dates
}
