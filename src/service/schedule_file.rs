use chrono::{DateTime, Datelike, Duration, NaiveDate, TimeZone, Utc};
use chrono_tz::America::New_York;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::models::event::{weekday_name, ParsedEvent};
use crate::service::time_resolver;

/// Offnight events run two hours; raid lines carry their own duration.
pub const OFFNIGHT_DURATION_HOURS: i64 = 2;

/// Standing raid nights on the mirror are never auto-deleted.
pub const RAID_NIGHT_PREFIX: &str = "Raid Night:";

static FILE_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^([A-Za-z]+)\s+(\d{1,2})/(\d{1,2})\s+(\d{1,2}):(\d{2})\s+(AM|PM)(?:\s+(?:EST|EDT|ET))?\.\s*(.+?)(?:\.\s*Hosted by\s+(.+))?$",
    )
    .unwrap()
});
static TIME_12H: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\d{1,2}):(\d{2})\s+(AM|PM)").unwrap());

/// One line of the canonical offnight file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OffnightFileEvent {
    pub day: String,
    pub date: NaiveDate,
    pub title: String,
    pub host: Option<String>,
    pub start: DateTime<Utc>,
    /// Lines without a host were written by a person, not the bot.
    pub is_manual: bool,
    pub line: String,
}

/// Renders one generated offnight line:
/// `Sunday 6/15 8:00 PM EST. Static Group. Hosted by <name>`.
pub fn format_offnight_line(event: &ParsedEvent) -> String {
    let day = event
        .day
        .map(weekday_name)
        .unwrap_or_else(|| weekday_name(event.date.weekday()));
    let host = event
        .host
        .clone()
        .or_else(|| event.origin.creator.clone())
        .unwrap_or_else(|| "Unknown".to_string());
    format!(
        "{day} {}/{} {}. {}. Hosted by {host}",
        event.date.month(),
        event.date.day(),
        event.time,
        event.title
    )
}

/// Builds the canonical offnight file: generated lines sorted by date,
/// then preserved manual lines.
pub fn generate_offnight_content(events: &[ParsedEvent], manual_entries: &[String]) -> String {
    let mut sorted: Vec<&ParsedEvent> = events.iter().collect();
    sorted.sort_by_key(|e| (e.date, e.time.clone()));

    let mut lines: Vec<String> = Vec::new();
    for event in sorted {
        let line = format_offnight_line(event);
        if !lines.contains(&line) {
            lines.push(line);
        }
    }
    for manual in manual_entries {
        let manual = manual.trim();
        if !manual.is_empty() && !lines.iter().any(|l| l == manual) {
            lines.push(manual.to_string());
        }
    }
    let mut content = lines.join("\n");
    if !content.is_empty() {
        content.push('\n');
    }
    content
}

/// Lines in the file that the bot did not generate, now or previously.
pub fn extract_manual_entries(
    file_content: &str,
    current_lines: &[String],
    previously_generated: &[String],
) -> Vec<String> {
    file_content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .filter(|line| !current_lines.iter().any(|l| l == line))
        .filter(|line| !previously_generated.iter().any(|l| l == line))
        .map(str::to_string)
        .collect()
}

/// Parses the canonical offnight file back into dated events for the
/// mirrors. Unparseable lines are skipped, never errors.
pub fn parse_offnight_content(content: &str, reference: NaiveDate) -> Vec<OffnightFileEvent> {
    content
        .lines()
        .filter_map(|line| parse_offnight_line(line.trim(), reference))
        .collect()
}

fn parse_offnight_line(line: &str, reference: NaiveDate) -> Option<OffnightFileEvent> {
    if line.is_empty() {
        return None;
    }
    let caps = FILE_LINE.captures(line)?;
    let day = caps[1].to_string();
    let month: u32 = caps[2].parse().ok()?;
    let day_of_month: u32 = caps[3].parse().ok()?;
    let hour: u32 = caps[4].parse().ok()?;
    let minute: u32 = caps[5].parse().ok()?;
    let meridiem = caps[6].to_string();
    let title = caps[7].trim().to_string();
    let host = caps.get(8).map(|m| m.as_str().trim().to_string());

    let date = resolve_year(month, day_of_month, reference)?;
    let start = eastern_to_utc(date, time_resolver::to_24_hour(hour, &meridiem), minute)?;

    Some(OffnightFileEvent {
        day,
        date,
        title,
        is_manual: host.is_none(),
        host,
        start,
        line: line.to_string(),
    })
}

// Rolls to next year only when the candidate trails the reference by more
// than a month, so recently-past lines still read as past for cleanup.
fn resolve_year(month: u32, day: u32, reference: NaiveDate) -> Option<NaiveDate> {
    let candidate = NaiveDate::from_ymd_opt(reference.year(), month, day)?;
    if candidate < reference && (candidate.month() as i32) < reference.month() as i32 - 1 {
        NaiveDate::from_ymd_opt(reference.year() + 1, month, day)
    } else {
        Some(candidate)
    }
}

/// Eastern wall-clock to the UTC instant, DST-aware via the tz database.
pub fn eastern_to_utc(date: NaiveDate, hour24: u32, minute: u32) -> Option<DateTime<Utc>> {
    let naive = date.and_hms_opt(hour24, minute, 0)?;
    New_York
        .from_local_datetime(&naive)
        .earliest()
        .map(|t| t.with_timezone(&Utc))
}

/// Parses "H:MM AM/PM ..." into (hour24, minute).
pub fn parse_time_12h(time: &str) -> Option<(u32, u32)> {
    let caps = TIME_12H.captures(time)?;
    let hour: u32 = caps[1].parse().ok()?;
    let minute: u32 = caps[2].parse().ok()?;
    Some((time_resolver::to_24_hour(hour, &caps[3]), minute))
}

/// Offnight mirror naming: halls-of-testing runs are offnight raids,
/// everything else is a static group.
pub fn offnight_event_name(title: &str) -> String {
    if title.to_lowercase().contains("halls of testing") {
        format!("Offnight Raid: {title}")
    } else {
        format!("Static Group: {title}")
    }
}

pub fn offnight_description(title: &str, host: Option<&str>) -> String {
    match host {
        Some(host) => format!(
            "{title}. Hosted by {host}\nSign up in the static-group signups channel"
        ),
        None => title.to_string(),
    }
}

pub fn raid_event_name(targets: &[String]) -> String {
    format!("{RAID_NIGHT_PREFIX} {}", targets.join(", "))
}

pub fn raid_description(targets: &[String]) -> String {
    format!(
        "Scheduled raid night.\n\nTargets: {}\n\nSign up in the raid channel before start.",
        targets.join(", ")
    )
}

/// Drops past bot-generated lines from the offnight file; manual lines and
/// future events survive. Returns (kept content, removed count).
pub fn cleanup_past_lines(content: &str, reference: NaiveDate) -> (String, usize) {
    let mut kept: Vec<&str> = Vec::new();
    let mut removed = 0;
    for line in content.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        match parse_offnight_line(trimmed, reference) {
            Some(event) if !event.is_manual && event.date < reference => removed += 1,
            _ => kept.push(trimmed),
        }
    }
    let mut result = kept.join("\n");
    if !result.is_empty() {
        result.push('\n');
    }
    (result, removed)
}

/// Raid nights overlapping midnight spill into the next day; the mirror
/// wants an end instant, so add the duration in UTC space.
pub fn end_of(start: DateTime<Utc>, hours: i64) -> DateTime<Utc> {
    start + Duration::hours(hours)
}
