use std::collections::HashSet;

use crate::models::Event;

/// Unions manual and generated events, keeping the first event seen for each id.
///
/// Manual events come first, so they win any id collision.
pub fn merge(manual: Vec<Event>, generated: Vec<Event>) -> Vec<Event> {
    let mut seen = HashSet::with_capacity(manual.len() + generated.len());
    manual
        .into_iter()
        .chain(generated)
        .filter(|event| seen.insert(event.id.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::EventOrigin;
    use chrono::NaiveDate;
    use proptest::prelude::*;

    fn event(id: &str, title: &str) -> Event {
        Event {
            id: id.into(),
            date: NaiveDate::from_ymd_opt(2024, 5, 1).unwrap(),
            end_date: None,
            time: None,
            end_time: None,
            title: title.into(),
            description: None,
            color: None,
            created_at: String::new(),
            origin: EventOrigin::from_id(id),
        }
    }

    #[test]
    fn first_occurrence_wins() {
        let merged = merge(
            vec![event("1", "manual"), event("1", "dup")],
            vec![event("auto-t-20240501-0", "gen"), event("auto-t-20240501-0", "again")],
        );
        let titles: Vec<&str> = merged.iter().map(|e| e.title.as_str()).collect();
        assert_eq!(titles, ["manual", "gen"]);
    }

    #[test]
    fn empty_inputs() {
        assert!(merge(Vec::new(), Vec::new()).is_empty());
    }

    fn ids() -> impl Strategy<Value = Vec<String>> {
        prop::collection::vec("[a-c]{1,2}", 0..12)
    }

    proptest! {
        #[test]
        fn repeated_merge_is_idempotent(a in ids(), b in ids()) {
            let manual: Vec<Event> = a.iter().map(|id| event(id, "m")).collect();
            let generated: Vec<Event> = b.iter().map(|id| event(&format!("auto-{id}-20240501-0"), "g")).collect();

            let once = merge(manual, generated.clone());
            let twice = merge(once.clone(), generated);
            prop_assert_eq!(once, twice);
        }
    }
}
