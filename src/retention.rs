use chrono::{Duration, NaiveDateTime};
use tracing::info;

use crate::clock::end_instant;
use crate::models::Event;

/// Days a finished manual event is kept before it is discarded.
pub const DEFAULT_HORIZON_DAYS: i64 = 14;

/// Drops manual events that ended `horizon_days` or more before `now`.
///
/// Generated events are never pruned. Meant to run once when a session starts.
///
/// A horizon reaching past the representable date range keeps every event.
pub fn prune(events: Vec<Event>, now: NaiveDateTime, horizon_days: i64) -> Vec<Event> {
    let Some(cutoff) = Duration::try_days(horizon_days).and_then(|d| now.checked_sub_signed(d)) else {
        return events;
    };
    let before = events.len();
    let retained: Vec<Event> = events
        .into_iter()
        .filter(|e| e.is_generated() || end_instant(e) > cutoff)
        .collect();

    let removed = before - retained.len();
    if removed > 0 {
        info!(removed, horizon_days, "pruned expired events");
    }
    retained
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::EventOrigin;
    use chrono::{NaiveDate, NaiveTime};

    fn now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 6, 15).unwrap().and_hms_opt(12, 0, 0).unwrap()
    }

    fn ending_at(id: &str, end: NaiveDateTime) -> Event {
        Event {
            id: id.into(),
            date: end.date(),
            end_date: None,
            time: None,
            end_time: Some(end.time()),
            title: id.into(),
            description: None,
            color: None,
            created_at: String::new(),
            origin: EventOrigin::from_id(id),
        }
    }

    #[test]
    fn boundary_is_exclusive() {
        let exactly = ending_at("1", now() - Duration::days(14));
        let just_inside = ending_at("2", now() - Duration::days(14) + Duration::minutes(1));
        let kept = prune(vec![exactly, just_inside], now(), DEFAULT_HORIZON_DAYS);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].id, "2");
    }

    #[test]
    fn open_ended_events_run_to_end_of_day() {
        let mut e = ending_at("3", now());
        e.date = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
        e.end_time = None;
        // 2024-06-01T23:59 is after the 2024-06-01T12:00 cutoff.
        assert_eq!(prune(vec![e], now(), 14).len(), 1);
    }

    #[test]
    fn multi_day_events_use_end_date() {
        let mut e = ending_at("4", NaiveDate::from_ymd_opt(2024, 5, 1).unwrap().and_time(NaiveTime::MIN));
        e.end_date = NaiveDate::from_ymd_opt(2024, 6, 10);
        e.end_time = None;
        assert_eq!(prune(vec![e], now(), 14).len(), 1);
    }

    #[test]
    fn generated_events_are_exempt() {
        let old = ending_at("auto-t-20200101-0", now() - Duration::days(400));
        assert_eq!(prune(vec![old], now(), 14).len(), 1);
    }

    #[test]
    fn huge_horizon_keeps_everything() {
        let ancient = ending_at("1", NaiveDate::from_ymd_opt(1900, 1, 1).unwrap().and_time(NaiveTime::MIN));
        assert_eq!(prune(vec![ancient.clone()], now(), 1_000_000_000).len(), 1);
        assert_eq!(prune(vec![ancient], now(), i64::MAX).len(), 1);
    }
}
