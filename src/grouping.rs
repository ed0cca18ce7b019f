use chrono::{Datelike, NaiveDateTime};

use crate::clock::start_instant;
use crate::models::Event;
use crate::partition::TimelineEntry;

/// Anything placed on the timeline by its start instant.
pub trait Dated {
    fn start_instant(&self) -> NaiveDateTime;
}

impl Dated for Event {
    fn start_instant(&self) -> NaiveDateTime {
        start_instant(self)
    }
}

impl Dated for TimelineEntry {
    fn start_instant(&self) -> NaiveDateTime {
        TimelineEntry::start_instant(self)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MonthGroup<T> {
    /// 1-based month number.
    pub month: u32,
    pub items: Vec<T>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct YearGroup<T> {
    pub year: i32,
    pub months: Vec<MonthGroup<T>>,
}

/// Year → month → items, with both levels in first-seen order.
#[derive(Debug, Clone, PartialEq)]
pub struct YearMonthIndex<T> {
    years: Vec<YearGroup<T>>,
}

impl<T> Default for YearMonthIndex<T> {
    fn default() -> Self {
        YearMonthIndex { years: Vec::new() }
    }
}

impl<T> YearMonthIndex<T> {
    pub fn years(&self) -> &[YearGroup<T>] {
        &self.years
    }

    pub fn is_empty(&self) -> bool {
        self.years.is_empty()
    }

    /// Total number of grouped items.
    pub fn len(&self) -> usize {
        self.iter().count()
    }

    pub fn get(&self, year: i32, month: u32) -> Option<&[T]> {
        self.years
            .iter()
            .find(|y| y.year == year)?
            .months
            .iter()
            .find(|m| m.month == month)
            .map(|m| m.items.as_slice())
    }

    /// Items in display order.
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.years.iter().flat_map(|y| y.months.iter().flat_map(|m| m.items.iter()))
    }
}

/// Buckets `items` by the year and month of each item's own start instant.
///
/// Groups appear in the order their first item appears in the input rather
/// than in calendar order, so an unsorted input yields unsorted groups.
pub fn group_by_year_month<T: Dated>(items: Vec<T>) -> YearMonthIndex<T> {
    let mut index = YearMonthIndex::default();
    for item in items {
        let instant = item.start_instant();
        let (year, month) = (instant.year(), instant.month());

        let year_pos = match index.years.iter().position(|y| y.year == year) {
            Some(pos) => pos,
            None => {
                index.years.push(YearGroup { year, months: Vec::new() });
                index.years.len() - 1
            }
        };
        let months = &mut index.years[year_pos].months;
        let month_pos = match months.iter().position(|m| m.month == month) {
            Some(pos) => pos,
            None => {
                months.push(MonthGroup { month, items: Vec::new() });
                months.len() - 1
            }
        };
        months[month_pos].items.push(item);
    }
    index
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::EventOrigin;
    use chrono::NaiveDate;
    use proptest::prelude::*;

    fn event(id: &str, y: i32, m: u32, d: u32) -> Event {
        Event {
            id: id.into(),
            date: NaiveDate::from_ymd_opt(y, m, d).unwrap(),
            end_date: None,
            time: None,
            end_time: None,
            title: id.into(),
            description: None,
            color: None,
            created_at: String::new(),
            origin: EventOrigin::Manual,
        }
    }

    #[test]
    fn groups_by_year_then_month() {
        let index = group_by_year_month(vec![
            event("a", 2023, 12, 30),
            event("b", 2024, 1, 2),
            event("c", 2024, 1, 20),
            event("d", 2024, 3, 1),
        ]);
        let years: Vec<i32> = index.years().iter().map(|y| y.year).collect();
        assert_eq!(years, [2023, 2024]);
        let months: Vec<u32> = index.years()[1].months.iter().map(|m| m.month).collect();
        assert_eq!(months, [1, 3]);
        assert_eq!(index.get(2024, 1).unwrap().len(), 2);
        assert_eq!(index.len(), 4);
    }

    #[test]
    fn first_seen_order_not_calendar_order() {
        let index = group_by_year_month(vec![event("x", 2024, 5, 1), event("y", 2024, 4, 1), event("z", 2024, 5, 9)]);
        let months: Vec<u32> = index.years()[0].months.iter().map(|m| m.month).collect();
        assert_eq!(months, [5, 4]);
        let may: Vec<&str> = index.get(2024, 5).unwrap().iter().map(|e| e.id.as_str()).collect();
        assert_eq!(may, ["x", "z"]);
    }

    #[test]
    fn marker_groups_by_its_own_instant() {
        let marker = TimelineEntry::Marker {
            at: NaiveDate::from_ymd_opt(2024, 7, 4).unwrap().and_hms_opt(9, 0, 0).unwrap(),
        };
        let index = group_by_year_month(vec![marker, TimelineEntry::Event(event("e", 2024, 8, 1))]);
        assert!(index.get(2024, 7).unwrap()[0].is_marker());
        assert_eq!(index.get(2024, 8).unwrap().len(), 1);
    }

    proptest! {
        #[test]
        fn same_month_items_keep_input_order(days in prop::collection::vec(1u32..=28, 1..30)) {
            let mut events: Vec<Event> = days
                .iter()
                .enumerate()
                .map(|(i, d)| event(&i.to_string(), 2024, 2, *d))
                .collect();
            crate::partition::sort_events(&mut events);
            let expected: Vec<String> = events.iter().map(|e| e.id.clone()).collect();

            let index = group_by_year_month(events);
            let grouped: Vec<String> = index.iter().map(|e| e.id.clone()).collect();
            prop_assert_eq!(grouped, expected);
        }
    }
}
