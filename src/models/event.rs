use chrono::{DateTime, NaiveDate, Utc, Weekday};

pub const DAYS_OF_WEEK: [&str; 7] = [
    "Sunday",
    "Monday",
    "Tuesday",
    "Wednesday",
    "Thursday",
    "Friday",
    "Saturday",
];

pub fn weekday_name(day: Weekday) -> &'static str {
    DAYS_OF_WEEK[day.num_days_from_sunday() as usize]
}

pub fn weekday_from_name(name: &str) -> Option<Weekday> {
    match name.to_lowercase().as_str() {
        "sunday" => Some(Weekday::Sun),
        "monday" => Some(Weekday::Mon),
        "tuesday" => Some(Weekday::Tue),
        "wednesday" => Some(Weekday::Wed),
        "thursday" => Some(Weekday::Thu),
        "friday" => Some(Weekday::Fri),
        "saturday" => Some(Weekday::Sat),
        _ => None,
    }
}

/// Where an event came from, kept for later verification and so that
/// manually-authored entries can be told apart from generated ones.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventOrigin {
    pub thread_id: Option<String>,
    pub thread_created_at: Option<DateTime<Utc>>,
    pub creator: Option<String>,
}

/// One event extracted from freeform schedule text. Constructed fresh on
/// every parse cycle and never mutated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedEvent {
    /// Cleaned event name with date/time/day tokens stripped.
    pub title: String,
    pub day: Option<Weekday>,
    /// Concrete date; for recurring templates, the first occurrence.
    pub date: NaiveDate,
    /// Always normalized to "H:MM AM/PM EST".
    pub time: String,
    /// Full range for display when the source gave one, e.g. "10:00 AM EST - 3:00 PM EST".
    pub time_range: Option<String>,
    pub is_recurring: bool,
    /// Source timezone token before normalization.
    pub timezone: String,
    /// Trailing "Hosted by <names>" captured from the source text.
    pub host: Option<String>,
    pub origin: EventOrigin,
    /// Manually-authored entries are preserved verbatim through rewrites.
    pub is_manual: bool,
}
