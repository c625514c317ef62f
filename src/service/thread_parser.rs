use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc, Weekday};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::models::event::{weekday_from_name, EventOrigin, ParsedEvent};
use crate::service::time_resolver;

/// How far ahead a bare weekday token is resolved.
const LOOKAHEAD_WEEKS: i64 = 8;

/// Short-date disambiguation only second-guesses month-first order when the
/// reference instant is this close to the thread's creation.
const CONTEXT_WINDOW_DAYS: i64 = 7;

const DEFAULT_BEFORE_RAID: &str = "7:00 PM EST";
const DEFAULT_AFTER_RAID: &str = "11:30 PM EST";

const TZ: &str = "ET|EST|EDT|CT|CST|CDT|MT|MST|MDT|PT|PST|PDT";
const DAYS: &str = "Sunday|Monday|Tuesday|Wednesday|Thursday|Friday|Saturday";
const MONTHS: &str = "January|February|March|April|May|June|July|August|September|October|November|December";

static PLURAL_DAY: Lazy<Regex> =
    Lazy::new(|| Regex::new(&format!(r"(?i)\b({DAYS})s\b")).unwrap());
static SINGULAR_DAY: Lazy<Regex> =
    Lazy::new(|| Regex::new(&format!(r"(?i)\b({DAYS})\b")).unwrap());
static FULL_DATE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r"(?i)\b({MONTHS})\.?\s+(\d{{1,2}})(?:st|nd|rd|th)?(?:,?\s*(\d{{4}}))?\b"
    ))
    .unwrap()
});
static YMD_DATE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(\d{4})/(\d{1,2})/(\d{1,2})\b").unwrap());
static SHORT_DATE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(\d{1,2})/(\d{1,2})(?:/(\d{2,4}))?\b").unwrap());
static TIME_RANGE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r"(?i)\b(\d{{1,2}})(?::(\d{{2}}))?\s*(am|pm)?\s*(?:-|–|to)\s*(\d{{1,2}})(?::(\d{{2}}))?\s*(am|pm)\s*({TZ})?\b"
    ))
    .unwrap()
});
static APPROX_TIME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r"(?i)~\s*(\d{{1,2}})(?::(\d{{2}}))?\s*(am|pm)\s*({TZ})?\b"
    ))
    .unwrap()
});
static EXPLICIT_TIME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r"(?i)(?:@\s*)?\b(\d{{1,2}})(?::(\d{{2}}))?\s*(am|pm)\s*({TZ})?\b"
    ))
    .unwrap()
});
static BEFORE_RAID: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(?:before|pre)[\s-]*raids?\b").unwrap());
static AFTER_RAID: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(?:after|post)[\s-]*raids?\b").unwrap());
static HOSTED_BY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)[-,(]?\s*hosted\s+by\s+([^)]+?)\)?\s*$").unwrap());
static EMPTY_PARENS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\(\s*\)").unwrap());
static TRAILING_SLASH_NUM: Lazy<Regex> = Lazy::new(|| Regex::new(r"/\s*\d+\s*$").unwrap());
static MULTI_SPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

/// The guild's standing weekly raid windows, Eastern wall-clock 24h hours.
/// An end of 24 means midnight.
pub fn raid_window(day: Weekday) -> Option<(u32, u32)> {
    match day {
        Weekday::Mon | Weekday::Wed | Weekday::Fri | Weekday::Sat => Some((21, 24)),
        Weekday::Tue => Some((21, 23)),
        _ => None,
    }
}

/// "Before raid" is two hours ahead of that day's raid start.
pub fn before_raid_time(day: Weekday) -> String {
    match raid_window(day) {
        Some((start, _)) => time_resolver::format_12_hour(start - 2, 0),
        None => DEFAULT_BEFORE_RAID.to_string(),
    }
}

/// "After raid" is one hour past that day's raid end.
pub fn after_raid_time(day: Weekday) -> String {
    match raid_window(day) {
        Some((_, end)) => time_resolver::format_12_hour((end + 1) % 24, 0),
        None => DEFAULT_AFTER_RAID.to_string(),
    }
}

struct ResolvedTime {
    time: String,
    time_range: Option<String>,
    timezone: String,
}

/// Parses a forum-thread title into an event. Titles that do not satisfy
/// the grammar return `None`; that is a rejection, not an error. A title
/// must carry a time expression of some kind; a bare weekday mention is
/// not a schedule.
pub fn parse_thread_title(
    title: &str,
    reference: DateTime<Utc>,
    origin: EventOrigin,
) -> Option<ParsedEvent> {
    let reference_date = reference.date_naive();
    let mut remainder = title.to_string();

    let hosted = HOSTED_BY.captures(&remainder).map(|caps| {
        let full = caps.get(0).map(|m| m.range()).unwrap_or_default();
        (full, caps[1].trim().to_string())
    });
    let host = hosted.map(|(range, name)| {
        remainder.replace_range(range, "");
        name
    });

    // 1. Recurrence: a plural weekday marks a weekly template; a singular
    //    weekday pins an explicit day.
    let is_recurring = PLURAL_DAY.is_match(&remainder);
    let day_token = PLURAL_DAY
        .captures(&remainder)
        .or_else(|| SINGULAR_DAY.captures(&remainder))
        .and_then(|caps| weekday_from_name(&caps[1]));

    // 2. Concrete date: explicit forms win over weekday inference.
    let explicit_date = resolve_explicit_date(&mut remainder, reference_date, &origin);
    let date = match explicit_date {
        Some(date) => Some(date),
        None => match day_token {
            Some(day) => next_occurrence(day, reference_date),
            None if is_recurring => Some(reference_date),
            None => None,
        },
    }?;

    // 3. Time, first-match-wins across the ordered rules. No rule matching
    //    rejects the title.
    let day = day_token.unwrap_or(date.weekday());
    let resolved = resolve_time(&mut remainder, day)?;

    let clean = clean_title(&remainder);
    if clean.is_empty() {
        return None;
    }
    if !is_recurring && date < reference_date {
        return None;
    }

    Some(ParsedEvent {
        title: clean,
        day: Some(day),
        date,
        time: resolved.time,
        time_range: resolved.time_range,
        is_recurring,
        timezone: resolved.timezone,
        host,
        origin,
        is_manual: false,
    })
}

fn resolve_explicit_date(
    remainder: &mut String,
    reference: NaiveDate,
    origin: &EventOrigin,
) -> Option<NaiveDate> {
    if let Some(caps) = FULL_DATE.captures(remainder) {
        let month = month_number(&caps[1])?;
        let day: u32 = caps[2].parse().ok()?;
        let year: Option<i32> = caps.get(3).and_then(|m| m.as_str().parse().ok());
        let range = caps.get(0)?.range();
        remainder.replace_range(range, "");
        return match year {
            Some(y) => NaiveDate::from_ymd_opt(y, month, day),
            None => Some(adjust_year(month, day, reference)?),
        };
    }

    if let Some(caps) = YMD_DATE.captures(remainder) {
        let year: i32 = caps[1].parse().ok()?;
        let month: u32 = caps[2].parse().ok()?;
        let day: u32 = caps[3].parse().ok()?;
        let range = caps.get(0)?.range();
        remainder.replace_range(range, "");
        return NaiveDate::from_ymd_opt(year, month, day);
    }

    if let Some(caps) = SHORT_DATE.captures(remainder) {
        let first: u32 = caps[1].parse().ok()?;
        let second: u32 = caps[2].parse().ok()?;
        let year: Option<i32> = caps.get(3).and_then(|m| {
            let y: i32 = m.as_str().parse().ok()?;
            Some(if m.as_str().len() == 2 { 2000 + y } else { y })
        });
        let range = caps.get(0)?.range();
        remainder.replace_range(range, "");

        let (month, day) = disambiguate_short_date(first, second, reference, origin);
        return match year {
            Some(y) => NaiveDate::from_ymd_opt(y, month, day),
            None => Some(adjust_year(month, day, reference)?),
        };
    }

    None
}

/// Month-first by convention. When both components could be a month and the
/// parse happens within a week of the thread's creation, prefer whichever
/// component names the reference month or the one after it. The following-
/// month check deliberately does not wrap past December; that ambiguity is
/// inherited behavior.
fn disambiguate_short_date(
    first: u32,
    second: u32,
    reference: NaiveDate,
    origin: &EventOrigin,
) -> (u32, u32) {
    if first > 12 {
        return (second, first);
    }
    if second > 12 {
        return (first, second);
    }
    let fresh = origin
        .thread_created_at
        .map(|created| {
            let age = reference.signed_duration_since(created.date_naive());
            age.num_days().abs() <= CONTEXT_WINDOW_DAYS
        })
        .unwrap_or(false);
    if fresh {
        let preferred = |m: u32| m == reference.month() || m == reference.month() + 1;
        if !preferred(first) && preferred(second) {
            return (second, first);
        }
    }
    (first, second)
}

// A yearless date that has passed with an earlier month belongs to next year.
fn adjust_year(month: u32, day: u32, reference: NaiveDate) -> Option<NaiveDate> {
    let candidate = NaiveDate::from_ymd_opt(reference.year(), month, day)?;
    if candidate < reference && candidate.month() < reference.month() {
        NaiveDate::from_ymd_opt(reference.year() + 1, month, day)
    } else {
        Some(candidate)
    }
}

fn next_occurrence(day: Weekday, reference: NaiveDate) -> Option<NaiveDate> {
    let mut candidate = reference;
    for _ in 0..(LOOKAHEAD_WEEKS * 7) {
        if candidate.weekday() == day {
            return Some(candidate);
        }
        candidate += Duration::days(1);
    }
    None
}

fn resolve_time(remainder: &mut String, day: Weekday) -> Option<ResolvedTime> {
    // Range first: a range always contains an explicit time, so the explicit
    // rule would otherwise shadow it. Approximate next for the same reason.
    if let Some(caps) = TIME_RANGE.captures(remainder) {
        let end_meridiem = caps[6].to_string();
        let start_meridiem = caps
            .get(3)
            .map(|m| m.as_str().to_string())
            .unwrap_or_else(|| end_meridiem.clone());
        let timezone = caps
            .get(7)
            .map(|m| m.as_str().to_uppercase())
            .unwrap_or_else(|| "EST".to_string());
        let start_hour: u32 = caps[1].parse().unwrap_or(0);
        let start_minute: u32 = caps.get(2).and_then(|m| m.as_str().parse().ok()).unwrap_or(0);
        let end_hour: u32 = caps[4].parse().unwrap_or(0);
        let end_minute: u32 = caps.get(5).and_then(|m| m.as_str().parse().ok()).unwrap_or(0);

        let start = time_resolver::convert_to_eastern(start_hour, start_minute, &start_meridiem, &timezone);
        let end = time_resolver::convert_to_eastern(end_hour, end_minute, &end_meridiem, &timezone);
        let range = caps.get(0).map(|m| m.range()).unwrap_or_default();
        remainder.replace_range(range, "");
        return Some(ResolvedTime {
            time: start.clone(),
            time_range: Some(format!("{start} - {end}")),
            timezone,
        });
    }

    if let Some(caps) = APPROX_TIME.captures(remainder) {
        let hour: u32 = caps[1].parse().unwrap_or(0);
        let minute: u32 = caps.get(2).and_then(|m| m.as_str().parse().ok()).unwrap_or(0);
        let meridiem = caps[3].to_string();
        let timezone = caps
            .get(4)
            .map(|m| m.as_str().to_uppercase())
            .unwrap_or_else(|| "EST".to_string());
        let range = caps.get(0).map(|m| m.range()).unwrap_or_default();
        remainder.replace_range(range, "");
        return Some(ResolvedTime {
            time: time_resolver::convert_to_eastern(hour, minute, &meridiem, &timezone),
            time_range: None,
            timezone,
        });
    }

    if let Some(caps) = EXPLICIT_TIME.captures(remainder) {
        let hour: u32 = caps[1].parse().unwrap_or(0);
        let minute: u32 = caps.get(2).and_then(|m| m.as_str().parse().ok()).unwrap_or(0);
        let meridiem = caps[3].to_string();
        let timezone = caps
            .get(4)
            .map(|m| m.as_str().to_uppercase())
            .unwrap_or_else(|| "EST".to_string());
        let range = caps.get(0).map(|m| m.range()).unwrap_or_default();
        remainder.replace_range(range, "");
        return Some(ResolvedTime {
            time: time_resolver::convert_to_eastern(hour, minute, &meridiem, &timezone),
            time_range: None,
            timezone,
        });
    }

    if let Some(m) = BEFORE_RAID.find(remainder) {
        let range = m.range();
        remainder.replace_range(range, "");
        return Some(ResolvedTime {
            time: before_raid_time(day),
            time_range: None,
            timezone: "EST".to_string(),
        });
    }

    if let Some(m) = AFTER_RAID.find(remainder) {
        let range = m.range();
        remainder.replace_range(range, "");
        return Some(ResolvedTime {
            time: after_raid_time(day),
            time_range: None,
            timezone: "EST".to_string(),
        });
    }

    None
}

fn clean_title(remainder: &str) -> String {
    // Plurals before singulars, or "Sundays" leaves a stray "s" behind.
    let text = PLURAL_DAY.replace_all(remainder, "");
    let text = SINGULAR_DAY.replace_all(&text, "");
    let text = EMPTY_PARENS.replace_all(&text, "");
    let text = TRAILING_SLASH_NUM.replace_all(&text, "");
    let text = MULTI_SPACE.replace_all(&text, " ");
    text.trim()
        .trim_matches(|c: char| matches!(c, '-' | ',' | ';' | '@' | '~'))
        .trim()
        .to_string()
}

fn month_number(name: &str) -> Option<u32> {
    let idx = MONTHS
        .split('|')
        .position(|m| m.eq_ignore_ascii_case(name))?;
    Some(idx as u32 + 1)
}
