use chrono::NaiveDateTime;

use crate::expand::expand_all;
use crate::grouping::{group_by_year_month, YearMonthIndex};
use crate::merge::merge;
use crate::models::{Event, LookaheadCount, Template};
use crate::partition::{partition, TimelineEntry};

/// Everything a renderer needs for one frame.
#[derive(Debug, Clone, PartialEq)]
pub struct Timeline {
    pub now: NaiveDateTime,
    pub past: YearMonthIndex<Event>,
    pub current_and_future: YearMonthIndex<TimelineEntry>,
}

/// Manual events plus the visible templates' instances, deduplicated by id.
pub fn materialize(
    manual: &[Event],
    templates: &[Template],
    lookahead: LookaheadCount,
    now: NaiveDateTime,
) -> Vec<Event> {
    merge(manual.to_vec(), expand_all(templates, lookahead, now))
}

/// Runs expansion, merge, partition and grouping from scratch.
pub fn build(manual: &[Event], templates: &[Template], lookahead: LookaheadCount, now: NaiveDateTime) -> Timeline {
    let split = partition(materialize(manual, templates, lookahead, now), now);
    Timeline {
        now,
        past: group_by_year_month(split.past),
        current_and_future: group_by_year_month(split.current_and_future),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{EventOrigin, RepeatType};
    use chrono::{NaiveDate, NaiveTime};

    fn now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 6, 1).unwrap().and_hms_opt(12, 0, 0).unwrap()
    }

    fn manual(id: &str, date: NaiveDate) -> Event {
        Event {
            id: id.into(),
            date,
            end_date: None,
            time: Some(NaiveTime::from_hms_opt(9, 0, 0).unwrap()),
            end_time: Some(NaiveTime::from_hms_opt(10, 0, 0).unwrap()),
            title: id.into(),
            description: None,
            color: None,
            created_at: String::new(),
            origin: EventOrigin::Manual,
        }
    }

    fn weekly() -> Template {
        Template {
            id: "w".into(),
            title: "Review".into(),
            description: None,
            color: None,
            time: Some(NaiveTime::from_hms_opt(16, 0, 0).unwrap()),
            end_time: None,
            start_date: NaiveDate::from_ymd_opt(2024, 5, 25),
            repeat_type: RepeatType::Week,
            repeat_interval: 1,
            show_on_timeline: true,
        }
    }

    #[test]
    fn builds_both_columns() {
        let events = vec![
            manual("yesterday", NaiveDate::from_ymd_opt(2024, 5, 31).unwrap()),
            manual("next-month", NaiveDate::from_ymd_opt(2024, 7, 2).unwrap()),
        ];
        let timeline = build(&events, &[weekly()], LookaheadCount::new(3).unwrap(), now());

        let past: Vec<&str> = timeline.past.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(past, ["auto-w-20240525-0", "yesterday"]);

        let upcoming: Vec<&str> = timeline.current_and_future.iter().map(|e| e.id()).collect();
        assert_eq!(
            upcoming,
            ["current-time", "auto-w-20240601-1", "auto-w-20240608-2", "next-month"]
        );
        assert!(timeline.current_and_future.get(2024, 7).is_some());
    }

    #[test]
    fn rebuilding_is_stable() {
        let events = vec![manual("a", NaiveDate::from_ymd_opt(2024, 6, 3).unwrap())];
        let n = LookaheadCount::new(2).unwrap();
        assert_eq!(build(&events, &[weekly()], n, now()), build(&events, &[weekly()], n, now()));
    }
}
