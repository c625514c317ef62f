use chrono::{Datelike, NaiveDate, Weekday};
use tracing::warn;

/// Returns true when US daylight saving is in effect on `date`: after the
/// second Sunday of March, through the first Sunday of November.
pub fn is_dst(date: NaiveDate) -> bool {
    let year = date.year();
    let second_sunday_march = nth_weekday_of_month(year, 3, Weekday::Sun, 2);
    let first_sunday_november = nth_weekday_of_month(year, 11, Weekday::Sun, 1);
    date > second_sunday_march && date <= first_sunday_november
}

fn nth_weekday_of_month(year: i32, month: u32, weekday: Weekday, n: u32) -> NaiveDate {
    let first = NaiveDate::from_ymd_opt(year, month, 1)
        .unwrap_or_else(|| NaiveDate::from_ymd_opt(year, 1, 1).unwrap_or_default());
    let offset = (7 + weekday.num_days_from_sunday() - first.weekday().num_days_from_sunday()) % 7;
    first + chrono::Duration::days((offset + (n - 1) * 7) as i64)
}

/// Signed hours to SUBTRACT from a wall-clock time in the given zone to get
/// UTC. General tokens (ET/CT/MT/PT) follow the seasonal rule for `date`;
/// explicit standard/daylight tokens are fixed year-round.
pub fn utc_offset_hours(timezone: &str, date: NaiveDate) -> i32 {
    let dst = is_dst(date);
    match timezone.to_uppercase().as_str() {
        "ET" => {
            if dst {
                -4
            } else {
                -5
            }
        }
        "EST" => -5,
        "EDT" => -4,
        "CT" => {
            if dst {
                -5
            } else {
                -6
            }
        }
        "CST" => -6,
        "CDT" => -5,
        "MT" => {
            if dst {
                -6
            } else {
                -7
            }
        }
        "MST" => -7,
        "MDT" => -6,
        "PT" => {
            if dst {
                -7
            } else {
                -8
            }
        }
        "PST" => -8,
        "PDT" => -7,
        other => {
            warn!("unknown timezone token '{other}', assuming Eastern");
            if dst {
                -4
            } else {
                -5
            }
        }
    }
}

/// 12-hour clock to 24-hour. "12 AM" is 0, "12 PM" is 12.
pub fn to_24_hour(hour: u32, meridiem: &str) -> u32 {
    let is_pm = meridiem.eq_ignore_ascii_case("pm");
    match (hour, is_pm) {
        (12, false) => 0,
        (12, true) => 12,
        (h, false) => h,
        (h, true) => h + 12,
    }
}

/// Hours to ADD to a wall-clock time in the source zone to express the same
/// instant in Eastern wall-clock. General tokens use their standard-time
/// delta, matching how the schedule authors write them.
fn eastern_delta_hours(timezone: &str) -> i32 {
    match timezone.to_uppercase().as_str() {
        "EST" | "EDT" | "ET" => 0,
        "CST" | "CT" | "CDT" => 1,
        "MST" | "MT" | "MDT" => 2,
        "PST" | "PT" | "PDT" => 3,
        other => {
            warn!("unknown timezone token '{other}', assuming Eastern");
            0
        }
    }
}

// Standard-time deltas overcount by one against daylight tokens.
const DAYLIGHT_TOKENS: [&str; 3] = ["CDT", "MDT", "PDT"];

/// Converts a 12-hour wall-clock time in `timezone` to the same instant
/// expressed as Eastern wall-clock, formatted "H:MM AM/PM EST". Minutes are
/// always rendered.
pub fn convert_to_eastern(hour: u32, minute: u32, meridiem: &str, timezone: &str) -> String {
    let mut delta = eastern_delta_hours(timezone);
    if DAYLIGHT_TOKENS.contains(&timezone.to_uppercase().as_str()) {
        delta -= 1;
    }
    let hour24 = to_24_hour(hour, meridiem) as i32;
    let eastern = (hour24 + delta).rem_euclid(24) as u32;
    format_12_hour(eastern, minute)
}

/// Formats a 24-hour time as "H:MM AM/PM EST".
pub fn format_12_hour(hour24: u32, minute: u32) -> String {
    let meridiem = if hour24 >= 12 { "PM" } else { "AM" };
    let hour = match hour24 % 12 {
        0 => 12,
        h => h,
    };
    format!("{hour}:{minute:02} {meridiem} EST")
}
