use chrono::NaiveDateTime;
use tracing::warn;

use crate::clock::recurrence_dates;
use crate::models::{generated_id, Event, EventOrigin, LookaheadCount, Template};

/// First instant of a template's series.
///
/// `start_date` at `time` when both are set, `start_date` at midnight when only
/// the date is, today at `time` when only the time is, otherwise `now` itself.
pub fn anchor(template: &Template, now: NaiveDateTime) -> NaiveDateTime {
    match (template.start_date, template.time) {
        (Some(date), Some(time)) => date.and_time(time),
        (Some(date), None) => date.and_time(chrono::NaiveTime::MIN),
        (None, Some(time)) => now.date().and_time(time),
        (None, None) => now,
    }
}

/// Materializes `lookahead` instances of `template`, starting at its anchor.
///
/// Visibility is not checked here; see [`expand_all`].
pub fn expand(template: &Template, lookahead: LookaheadCount, now: NaiveDateTime) -> Vec<Event> {
    let count = lookahead.get();
    let dates = recurrence_dates(anchor(template, now), template.repeat_type, template.repeat_interval, count);
    if dates.len() < count {
        warn!(
            template = %template.id,
            produced = dates.len(),
            requested = count,
            "template series ran past the representable date range"
        );
    }
    let created_at = now.format("%Y-%m-%dT%H:%M:%S").to_string();

    dates
        .into_iter()
        .enumerate()
        .map(|(index, instant)| {
            let date = instant.date();
            Event {
                id: generated_id(&template.id, date, index),
                date,
                end_date: None,
                time: template.time,
                end_time: template.end_time,
                title: template.title.clone(),
                description: template.description.clone(),
                color: template.color.clone(),
                created_at: created_at.clone(),
                origin: EventOrigin::Generated {
                    template_id: template.id.clone(),
                    index,
                },
            }
        })
        .collect()
}

/// Expands every template marked to show on the timeline, in template order.
pub fn expand_all(templates: &[Template], lookahead: LookaheadCount, now: NaiveDateTime) -> Vec<Event> {
    templates
        .iter()
        .filter(|t| t.show_on_timeline)
        .flat_map(|t| expand(t, lookahead, now))
        .collect()
}
