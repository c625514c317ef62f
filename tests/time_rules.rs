use chrono::{NaiveDate, TimeZone, Utc};

use guildSyncBot::service::schedule_file::eastern_to_utc;
use guildSyncBot::service::time_resolver::{
    convert_to_eastern, format_12_hour, is_dst, to_24_hour, utc_offset_hours,
};

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

#[test]
fn dst_boundaries_for_2025() {
    // Spring forward: second Sunday of March 2025 is the 9th.
    assert!(!is_dst(date(2025, 3, 9)));
    assert!(is_dst(date(2025, 3, 10)));
    // Fall back: first Sunday of November 2025 is the 2nd.
    assert!(is_dst(date(2025, 11, 2)));
    assert!(!is_dst(date(2025, 11, 3)));
}

#[test]
fn general_tokens_follow_the_season() {
    assert_eq!(utc_offset_hours("ET", date(2025, 7, 1)), -4);
    assert_eq!(utc_offset_hours("ET", date(2025, 1, 1)), -5);
    assert_eq!(utc_offset_hours("PT", date(2025, 7, 1)), -7);
    assert_eq!(utc_offset_hours("PT", date(2025, 1, 1)), -8);
}

#[test]
fn explicit_tokens_are_fixed_year_round() {
    for d in [date(2025, 7, 1), date(2025, 1, 1)] {
        assert_eq!(utc_offset_hours("EST", d), -5);
        assert_eq!(utc_offset_hours("EDT", d), -4);
        assert_eq!(utc_offset_hours("CST", d), -6);
        assert_eq!(utc_offset_hours("PDT", d), -7);
    }
}

#[test]
fn unknown_token_is_treated_as_eastern() {
    assert_eq!(utc_offset_hours("GMT", date(2025, 7, 1)), -4);
}

#[test]
fn twelve_hour_conversion_handles_noon_and_midnight() {
    assert_eq!(to_24_hour(12, "am"), 0);
    assert_eq!(to_24_hour(12, "pm"), 12);
    assert_eq!(to_24_hour(1, "am"), 1);
    assert_eq!(to_24_hour(11, "pm"), 23);
}

#[test]
fn converts_western_zones_to_eastern_wall_clock() {
    assert_eq!(convert_to_eastern(8, 0, "pm", "CST"), "9:00 PM EST");
    assert_eq!(convert_to_eastern(8, 0, "pm", "CDT"), "8:00 PM EST");
    assert_eq!(convert_to_eastern(6, 30, "pm", "PST"), "9:30 PM EST");
    assert_eq!(convert_to_eastern(10, 0, "pm", "PT"), "1:00 AM EST");
    assert_eq!(convert_to_eastern(9, 0, "pm", "ET"), "9:00 PM EST");
}

#[test]
fn minutes_are_always_rendered() {
    assert_eq!(format_12_hour(21, 0), "9:00 PM EST");
    assert_eq!(format_12_hour(0, 5), "12:05 AM EST");
    assert_eq!(format_12_hour(12, 30), "12:30 PM EST");
}

#[test]
fn nine_pm_eastern_shifts_across_spring_forward() {
    // One week before the 2025 transition 9 PM Eastern is 02:00 UTC, one
    // week after it is 01:00 UTC.
    let before = eastern_to_utc(date(2025, 3, 2), 21, 0).unwrap();
    let after = eastern_to_utc(date(2025, 3, 16), 21, 0).unwrap();
    assert_eq!(before, Utc.with_ymd_and_hms(2025, 3, 3, 2, 0, 0).unwrap());
    assert_eq!(after, Utc.with_ymd_and_hms(2025, 3, 17, 1, 0, 0).unwrap());
}
