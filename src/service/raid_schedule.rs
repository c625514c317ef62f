use chrono::{DateTime, Datelike, Duration, NaiveDate, TimeZone, Utc};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::service::time_resolver;

/// How long a raid runs when the schedule line only gives a start time.
pub const RAID_DURATION_HOURS: i64 = 3;

static STRIKETHROUGH: Lazy<Regex> = Lazy::new(|| Regex::new(r"~~[^~]*~~").unwrap());
static MULTI_SPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());
static STRAY_COMMAS: Lazy<Regex> = Lazy::new(|| Regex::new(r",\s*(,\s*)+").unwrap());
static SHORT_DATE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b(\d{1,2})/(\d{1,2})\b").unwrap());
static TIMED_ZONE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(\d{1,2})(?::(\d{2}))?\s*(am|pm)\s*(ET|EST|EDT|CT|CST|CDT|MT|MST|MDT|PT|PST|PDT)\b")
        .unwrap()
});
static WEEKDAY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(Sunday|Monday|Tuesday|Wednesday|Thursday|Friday|Saturday)\b").unwrap()
});

/// One raid night parsed from a schedule line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RaidEvent {
    pub day: String,
    pub date: NaiveDate,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub targets: Vec<String>,
    /// The cleaned source line, kept for the canonical file.
    pub line: String,
}

/// Splits a schedule message on bullet markers and keeps only the lines
/// that carry a short date, a timed timezone token, and a non-empty body
/// after a colon. Returned lines are cleaned and re-bulleted.
pub fn extract_schedule_lines(content: &str) -> Vec<String> {
    content
        .split('•')
        .filter_map(|raw| {
            let line = clean_line(raw);
            if is_schedule_line(&line) {
                Some(format!("•{line}"))
            } else {
                None
            }
        })
        .collect()
}

fn clean_line(raw: &str) -> String {
    let line = STRIKETHROUGH.replace_all(raw, "");
    let line = MULTI_SPACE.replace_all(&line, " ");
    let line = STRAY_COMMAS.replace_all(&line, ", ");
    line.trim().trim_end_matches(',').trim().to_string()
}

fn is_schedule_line(line: &str) -> bool {
    if !SHORT_DATE.is_match(line) {
        return false;
    }
    // The target list sits after the colon that follows the time block, so
    // the colon inside "9:00pm" never counts.
    match TIMED_ZONE.find(line) {
        Some(m) => target_body(line, m.end()).is_some(),
        None => false,
    }
}

fn target_body(line: &str, from: usize) -> Option<&str> {
    let rest = &line[from..];
    let (_, body) = rest.split_once(':')?;
    let body = body.trim();
    if body.is_empty() {
        None
    } else {
        Some(body)
    }
}

/// Parses cleaned schedule lines into raid events. Lines that fail to
/// resolve a date or time are silently dropped; a bad line never aborts
/// its siblings.
pub fn parse_raid_lines(lines: &[String], now: DateTime<Utc>) -> Vec<RaidEvent> {
    lines
        .iter()
        .filter_map(|line| parse_raid_line(line, now))
        .collect()
}

fn parse_raid_line(line: &str, now: DateTime<Utc>) -> Option<RaidEvent> {
    let date_caps = SHORT_DATE.captures(line)?;
    let month: u32 = date_caps[1].parse().ok()?;
    let day_of_month: u32 = date_caps[2].parse().ok()?;

    let time_caps = TIMED_ZONE.captures(line)?;
    let hour: u32 = time_caps[1].parse().ok()?;
    let minute: u32 = time_caps
        .get(2)
        .map(|m| m.as_str().parse().ok())
        .unwrap_or(Some(0))?;
    let meridiem = time_caps[3].to_string();
    let timezone = time_caps[4].to_uppercase();

    let date = resolve_year(month, day_of_month, now.date_naive())?;
    let day = WEEKDAY
        .captures(line)
        .map(|c| c[1].to_string())
        .unwrap_or_else(|| crate::models::event::weekday_name(date.weekday()).to_string());

    let hour24 = time_resolver::to_24_hour(hour, &meridiem) as i64;
    let offset = time_resolver::utc_offset_hours(&timezone, date) as i64;
    let local_midnight = Utc.from_utc_datetime(&date.and_hms_opt(0, 0, 0)?);
    let start = local_midnight + Duration::hours(hour24 - offset) + Duration::minutes(minute as i64);
    let end = start + Duration::hours(RAID_DURATION_HOURS);

    let time_end = TIMED_ZONE.find(line).map(|m| m.end())?;
    let body = target_body(line, time_end)?;
    let targets: Vec<String> = body
        .split(',')
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .collect();
    if targets.is_empty() {
        return None;
    }

    Some(RaidEvent {
        day,
        date,
        start,
        end,
        targets,
        line: line.to_string(),
    })
}

// Short dates carry no year. Anchor to the reference year, rolling forward
// when the candidate has already passed with an earlier month.
fn resolve_year(month: u32, day: u32, reference: NaiveDate) -> Option<NaiveDate> {
    let candidate = NaiveDate::from_ymd_opt(reference.year(), month, day)?;
    if candidate < reference && candidate.month() < reference.month() {
        NaiveDate::from_ymd_opt(reference.year() + 1, month, day)
    } else {
        Some(candidate)
    }
}

/// Combines valid schedule lines from several recent messages, newest
/// last, into one canonical block.
pub fn combine_schedule_messages(messages: &[String]) -> Vec<String> {
    let mut lines = Vec::new();
    for message in messages {
        lines.extend(extract_schedule_lines(message));
    }
    lines
}
