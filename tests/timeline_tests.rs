use chrono::{Local, NaiveDate, NaiveDateTime, TimeZone};

use timeliner::partition::TimelineEntry;
use timeliner::state::Tracker;
use timeliner::models::{EventDraft, TemplateDraft};
use timeliner::storage::MemoryStore;

fn at(s: &str) -> NaiveDateTime {
    NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M").unwrap()
}

fn draft(title: &str, date: &str, time: Option<&str>, end_time: Option<&str>) -> EventDraft {
    EventDraft {
        title: title.into(),
        date: date.into(),
        time: time.map(Into::into),
        end_time: end_time.map(Into::into),
        ..Default::default()
    }
}

fn seeded() -> Tracker<MemoryStore> {
    let created = Local.with_ymd_and_hms(2024, 5, 1, 8, 0, 0).unwrap();
    let mut tracker = Tracker::load(MemoryStore::default());
    for d in [
        draft("Review", "2024-05-28", Some("14:00"), Some("15:00")),
        draft("Standup", "2024-06-01", Some("09:00"), Some("10:00")),
        draft("Lunch", "2024-06-01", Some("12:30"), Some("13:30")),
        draft("Conference", "2024-07-10", None, None),
        draft("New year", "2025-01-01", None, None),
    ] {
        tracker.add_event(d, created).unwrap();
    }
    tracker
}

fn titles(entries: &[TimelineEntry]) -> Vec<String> {
    entries
        .iter()
        .map(|e| match e {
            TimelineEntry::Marker { .. } => "<now>".to_string(),
            TimelineEntry::Event(e) => e.title.clone(),
        })
        .collect()
}

#[test]
fn in_progress_event_sits_right_after_the_marker() {
    let timeline = seeded().timeline(at("2024-06-01T09:00"));
    let june = timeline.current_and_future.get(2024, 6).unwrap();
    assert_eq!(titles(june), ["<now>", "Standup", "Lunch"]);
    assert_eq!(timeline.past.len(), 1);
}

#[test]
fn finished_event_moves_to_the_past_column() {
    let timeline = seeded().timeline(at("2024-06-01T10:01"));
    let past: Vec<&str> = timeline.past.iter().map(|e| e.title.as_str()).collect();
    assert_eq!(past, ["Review", "Standup"]);
    let june = timeline.current_and_future.get(2024, 6).unwrap();
    assert_eq!(titles(june), ["<now>", "Lunch"]);
}

#[test]
fn marker_precedes_first_future_event() {
    let timeline = seeded().timeline(at("2024-06-05T08:00"));
    let all: Vec<&TimelineEntry> = timeline.current_and_future.iter().collect();
    assert!(all[0].is_marker());
    assert_eq!(all[1].as_event().map(|e| e.title.as_str()), Some("Conference"));
    assert_eq!(timeline.current_and_future.iter().filter(|e| e.is_marker()).count(), 1);
}

#[test]
fn groups_span_years_in_order() {
    let timeline = seeded().timeline(at("2024-06-05T08:00"));
    let years: Vec<i32> = timeline.current_and_future.years().iter().map(|y| y.year).collect();
    assert_eq!(years, [2024, 2025]);
    let months: Vec<u32> = timeline.current_and_future.years()[0].months.iter().map(|m| m.month).collect();
    assert_eq!(months, [6, 7]);
}

#[test]
fn templates_feed_the_timeline_until_hidden() {
    let created = Local.with_ymd_and_hms(2024, 5, 1, 8, 0, 0).unwrap();
    let mut tracker = seeded();
    let gym = tracker
        .add_template(
            TemplateDraft {
                title: "Gym".into(),
                repeat_type: "day".into(),
                repeat_interval: 2,
                start_date: Some("2024-01-01".into()),
                ..Default::default()
            },
            created,
        )
        .unwrap();
    tracker.set_lookahead(3).unwrap();

    let timeline = tracker.timeline(at("2024-06-05T08:00"));
    let gym_dates: Vec<NaiveDate> = timeline
        .past
        .iter()
        .filter(|e| e.template_id() == Some(gym.id.as_str()))
        .map(|e| e.date)
        .collect();
    assert_eq!(
        gym_dates,
        [
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            NaiveDate::from_ymd_opt(2024, 1, 3).unwrap(),
            NaiveDate::from_ymd_opt(2024, 1, 5).unwrap(),
        ]
    );

    tracker.toggle_template(&gym.id).unwrap();
    let timeline = tracker.timeline(at("2024-06-05T08:00"));
    assert!(timeline.past.iter().all(|e| !e.is_generated()));
}

#[test]
fn session_start_applies_the_retention_window() {
    let store = MemoryStore::default();
    {
        let tracker = seeded();
        timeliner::storage::save_events(&store, tracker.events()).unwrap();
    }
    // Review ended 2024-05-28 15:00; exactly fourteen days later it is gone
    let kept = Tracker::open_session(&store, at("2024-06-11T14:59"), 14).unwrap();
    assert_eq!(kept.events().len(), 5);
    let pruned = Tracker::open_session(&store, at("2024-06-11T15:00"), 14).unwrap();
    assert_eq!(pruned.events().len(), 4);
}

#[test]
fn huge_retention_window_keeps_everything() {
    let store = MemoryStore::default();
    timeliner::storage::save_events(&store, seeded().events()).unwrap();
    let opened = Tracker::open_session(&store, at("2024-06-11T15:00"), i64::MAX).unwrap();
    assert_eq!(opened.events().len(), 5);
}
