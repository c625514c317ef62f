use chrono::{Datelike, Duration, NaiveDate};

use crate::models::event::ParsedEvent;

/// Default number of occurrences a weekly template expands to.
pub const DEFAULT_OCCURRENCES: usize = 4;

/// Expands a recurring template into `count` dated occurrences anchored at
/// `anchor`. Non-recurring events pass through untouched. Occurrences are
/// spaced exactly seven days apart and never dated before the anchor.
pub fn expand(template: &ParsedEvent, count: usize, anchor: NaiveDate) -> Vec<ParsedEvent> {
    if !template.is_recurring {
        return vec![template.clone()];
    }

    let first = match template.day {
        Some(day) => {
            let mut candidate = anchor;
            while candidate.weekday() != day {
                candidate += Duration::days(1);
            }
            candidate
        }
        None => anchor,
    };

    (0..count)
        .map(|week| {
            let mut occurrence = template.clone();
            occurrence.date = first + Duration::days(7 * week as i64);
            occurrence
        })
        .collect()
}
