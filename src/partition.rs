use chrono::NaiveDateTime;

use crate::clock::{is_in_progress, is_past, start_instant, truncate_to_minute};
use crate::models::{Event, CURRENT_TIME_ID};

/// One row of the current-and-future column: a real event or the "now" divider.
#[derive(Debug, Clone, PartialEq)]
pub enum TimelineEntry {
    /// Divider placed where the present falls. `at` is `now` at minute precision.
    Marker { at: NaiveDateTime },
    Event(Event),
}

impl TimelineEntry {
    pub fn id(&self) -> &str {
        match self {
            TimelineEntry::Marker { .. } => CURRENT_TIME_ID,
            TimelineEntry::Event(e) => &e.id,
        }
    }

    pub fn is_marker(&self) -> bool {
        matches!(self, TimelineEntry::Marker { .. })
    }

    pub fn as_event(&self) -> Option<&Event> {
        match self {
            TimelineEntry::Event(e) => Some(e),
            TimelineEntry::Marker { .. } => None,
        }
    }

    pub fn start_instant(&self) -> NaiveDateTime {
        match self {
            TimelineEntry::Marker { at } => *at,
            TimelineEntry::Event(e) => start_instant(e),
        }
    }
}

/// Events split into the two timeline columns.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Partition {
    pub past: Vec<Event>,
    /// Always contains exactly one marker.
    pub current_and_future: Vec<TimelineEntry>,
}

/// Stable ascending sort by start instant.
pub fn sort_events(events: &mut [Event]) {
    events.sort_by_key(start_instant);
}

/// Wraps sorted events as entries and places the marker.
///
/// The marker goes before the first in-progress event. Failing that, before the
/// first event starting after `now`, and otherwise at the end.
pub fn insert_marker(sorted: Vec<Event>, now: NaiveDateTime) -> Vec<TimelineEntry> {
    let position = sorted
        .iter()
        .position(|e| is_in_progress(e, now))
        .or_else(|| sorted.iter().position(|e| start_instant(e) > now))
        .unwrap_or(sorted.len());

    let mut entries: Vec<TimelineEntry> = sorted.into_iter().map(TimelineEntry::Event).collect();
    entries.insert(position, TimelineEntry::Marker { at: truncate_to_minute(now) });
    entries
}

/// Sorts, places the marker, and splits on whether each event has ended.
///
/// Relative order is kept in both halves. The marker is never past.
pub fn partition(mut events: Vec<Event>, now: NaiveDateTime) -> Partition {
    sort_events(&mut events);
    let mut result = Partition::default();
    for entry in insert_marker(events, now) {
        match entry {
            TimelineEntry::Event(e) if is_past(&e, now) => result.past.push(e),
            other => result.current_and_future.push(other),
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::EventOrigin;
    use chrono::{NaiveDate, NaiveTime};

    fn at(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M").unwrap()
    }

    fn event(id: &str, date: &str, time: Option<&str>, end_time: Option<&str>) -> Event {
        let hm = |s: &str| NaiveTime::parse_from_str(s, "%H:%M").unwrap();
        Event {
            id: id.into(),
            date: NaiveDate::parse_from_str(date, "%Y-%m-%d").unwrap(),
            end_date: None,
            time: time.map(hm),
            end_time: end_time.map(hm),
            title: id.into(),
            description: None,
            color: None,
            created_at: String::new(),
            origin: EventOrigin::Manual,
        }
    }

    fn ids(entries: &[TimelineEntry]) -> Vec<&str> {
        entries.iter().map(TimelineEntry::id).collect()
    }

    #[test]
    fn sort_is_stable_for_equal_instants() {
        let mut events = vec![
            event("late", "2024-06-02", None, None),
            event("b", "2024-06-01", Some("00:00"), None),
            event("a", "2024-06-01", None, None),
        ];
        sort_events(&mut events);
        let order: Vec<&str> = events.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(order, ["b", "a", "late"]);
    }

    #[test]
    fn marker_precedes_first_future_event_when_nothing_is_running() {
        let events = vec![
            event("future", "2024-06-01", Some("15:00"), Some("16:00")),
            event("past", "2024-06-01", Some("08:00"), Some("09:00")),
        ];
        let result = partition(events, at("2024-06-01T12:00"));
        assert_eq!(ids(&result.current_and_future), ["current-time", "future"]);
        assert_eq!(result.past.len(), 1);
        assert_eq!(result.past[0].id, "past");
    }

    #[test]
    fn marker_precedes_first_running_event() {
        let events = vec![
            event("allday", "2024-06-01", None, None),
            event("meeting", "2024-06-01", Some("11:30"), Some("12:30")),
            event("tomorrow", "2024-06-02", None, None),
        ];
        let result = partition(events, at("2024-06-01T12:00"));
        assert!(result.past.is_empty());
        assert_eq!(ids(&result.current_and_future), ["current-time", "allday", "meeting", "tomorrow"]);
    }

    #[test]
    fn marker_goes_last_when_everything_started() {
        let events = vec![event("old", "2024-05-01", Some("08:00"), Some("09:00"))];
        let result = partition(events, at("2024-06-01T12:00"));
        assert_eq!(ids(&result.current_and_future), ["current-time"]);
        assert_eq!(result.past.len(), 1);
    }

    #[test]
    fn empty_timeline_still_has_marker() {
        let result = partition(Vec::new(), at("2024-06-01T12:00"));
        assert_eq!(result.current_and_future, vec![TimelineEntry::Marker { at: at("2024-06-01T12:00") }]);
    }

    #[test]
    fn finished_event_is_past_even_inside_its_start_minute_window() {
        let e = event("slot", "2024-06-01", Some("09:00"), Some("10:00"));
        let running = partition(vec![e.clone()], at("2024-06-01T09:00"));
        assert_eq!(ids(&running.current_and_future), ["current-time", "slot"]);

        let done = partition(vec![e], at("2024-06-01T10:01"));
        assert_eq!(done.past.len(), 1);
        assert_eq!(ids(&done.current_and_future), ["current-time"]);
    }

    #[test]
    fn started_without_end_time_stays_current_until_midnight() {
        let e = event("party", "2024-06-01", Some("20:00"), None);
        let result = partition(vec![e], at("2024-06-01T23:00"));
        assert_eq!(ids(&result.current_and_future), ["current-time", "party"]);
    }
}
