use chrono::{Datelike, NaiveDate, TimeZone, Utc, Weekday};

use guildSyncBot::models::event::EventOrigin;
use guildSyncBot::service::recurrence::{self, DEFAULT_OCCURRENCES};
use guildSyncBot::service::thread_parser::parse_thread_title;

fn tuesday_reference() -> chrono::DateTime<Utc> {
    // Tuesday 2025-06-10.
    Utc.with_ymd_and_hms(2025, 6, 10, 15, 0, 0).unwrap()
}

fn origin_created(reference: chrono::DateTime<Utc>) -> EventOrigin {
    EventOrigin {
        thread_id: Some("123".to_string()),
        thread_created_at: Some(reference),
        creator: Some("Keeper".to_string()),
    }
}

#[test]
fn plural_weekday_becomes_weekly_template() {
    let event = parse_thread_title(
        "Sundays 8pm ET Static Group",
        tuesday_reference(),
        EventOrigin::default(),
    )
    .unwrap();

    assert!(event.is_recurring);
    assert_eq!(event.day, Some(Weekday::Sun));
    assert_eq!(event.date, NaiveDate::from_ymd_opt(2025, 6, 15).unwrap());
    assert_eq!(event.time, "8:00 PM EST");
    assert_eq!(event.title, "Static Group");
}

#[test]
fn recurring_template_expands_to_four_future_occurrences() {
    let reference = tuesday_reference();
    let event = parse_thread_title("Sundays 8pm ET Static Group", reference, EventOrigin::default())
        .unwrap();
    let occurrences = recurrence::expand(&event, DEFAULT_OCCURRENCES, reference.date_naive());

    assert_eq!(occurrences.len(), DEFAULT_OCCURRENCES);
    for (i, occ) in occurrences.iter().enumerate() {
        assert_eq!(occ.day, Some(Weekday::Sun));
        assert_eq!(occ.date.weekday(), Weekday::Sun);
        assert!(occ.date >= reference.date_naive());
        if i > 0 {
            assert_eq!(occ.date - occurrences[i - 1].date, chrono::Duration::days(7));
        }
    }
}

#[test]
fn before_raid_resolves_against_the_raid_window() {
    let event = parse_thread_title(
        "Friday - Halls of Testing before raid",
        tuesday_reference(),
        EventOrigin::default(),
    )
    .unwrap();

    // Friday raids start at 9 PM Eastern; before-raid is two hours ahead.
    assert_eq!(event.time, "7:00 PM EST");
    assert_eq!(event.day, Some(Weekday::Fri));
    assert_eq!(event.title, "Halls of Testing");
}

#[test]
fn after_raid_on_a_non_raid_day_uses_the_default() {
    let event = parse_thread_title(
        "Sunday gem farming after raid",
        tuesday_reference(),
        EventOrigin::default(),
    )
    .unwrap();
    assert_eq!(event.time, "11:30 PM EST");
}

#[test]
fn time_range_keeps_both_endpoints() {
    let event = parse_thread_title(
        "Saturday 10am-3pm ET Bazaar crawl",
        tuesday_reference(),
        EventOrigin::default(),
    )
    .unwrap();

    assert_eq!(event.time, "10:00 AM EST");
    assert_eq!(event.time_range.as_deref(), Some("10:00 AM EST - 3:00 PM EST"));
    assert_eq!(event.title, "Bazaar crawl");
}

#[test]
fn approximate_time_is_used_verbatim() {
    let event = parse_thread_title(
        "Wednesday ~9pm ET Epic fights",
        tuesday_reference(),
        EventOrigin::default(),
    )
    .unwrap();
    assert_eq!(event.time, "9:00 PM EST");
    assert_eq!(event.title, "Epic fights");
}

#[test]
fn central_time_converts_to_eastern() {
    let event = parse_thread_title(
        "Thursday 8pm CST Trade night",
        tuesday_reference(),
        EventOrigin::default(),
    )
    .unwrap();
    assert_eq!(event.time, "9:00 PM EST");
}

#[test]
fn hosted_by_suffix_is_captured_and_stripped() {
    let event = parse_thread_title(
        "Sundays 8pm ET Static Group - hosted by Vanidor",
        tuesday_reference(),
        EventOrigin::default(),
    )
    .unwrap();
    assert_eq!(event.host.as_deref(), Some("Vanidor"));
    assert_eq!(event.title, "Static Group");
}

#[test]
fn full_month_date_pins_the_event() {
    let event = parse_thread_title(
        "June 20th 8pm ET Anniversary run",
        tuesday_reference(),
        EventOrigin::default(),
    )
    .unwrap();
    assert_eq!(event.date, NaiveDate::from_ymd_opt(2025, 6, 20).unwrap());
    assert!(!event.is_recurring);
}

#[test]
fn short_date_prefers_month_first() {
    let event = parse_thread_title(
        "6/20 8pm ET Anniversary run",
        tuesday_reference(),
        EventOrigin::default(),
    )
    .unwrap();
    assert_eq!(event.date, NaiveDate::from_ymd_opt(2025, 6, 20).unwrap());
}

#[test]
fn fresh_thread_swaps_ambiguous_components_toward_the_reference_month() {
    // "3/7" parsed in June on a thread created this week: 3 is neither the
    // reference month nor the next one, 7 is, so the components flip and
    // the event lands on July 3rd instead of March 7th.
    let reference = tuesday_reference();
    let event = parse_thread_title(
        "3/7 8pm ET Quick clear",
        reference,
        origin_created(reference),
    )
    .unwrap();
    assert_eq!(event.date, NaiveDate::from_ymd_opt(2025, 7, 3).unwrap());

    let event = parse_thread_title(
        "15/6 8pm ET Quick clear",
        reference,
        origin_created(reference),
    )
    .unwrap();
    // 15 cannot be a month, so it must be the day.
    assert_eq!(event.date, NaiveDate::from_ymd_opt(2025, 6, 15).unwrap());
}

#[test]
fn stale_thread_keeps_month_first_order() {
    let reference = tuesday_reference();
    let created_long_ago = Utc.with_ymd_and_hms(2025, 3, 1, 0, 0, 0).unwrap();
    let origin = EventOrigin {
        thread_id: Some("9".to_string()),
        thread_created_at: Some(created_long_ago),
        creator: None,
    };
    let event = parse_thread_title("7/8 8pm ET Quick clear", reference, origin).unwrap();
    assert_eq!(event.date, NaiveDate::from_ymd_opt(2025, 7, 8).unwrap());
}

#[test]
fn past_one_off_events_are_rejected() {
    assert!(parse_thread_title(
        "June 1st 8pm ET Old run",
        tuesday_reference(),
        EventOrigin::default(),
    )
    .is_none());
}

#[test]
fn titles_without_any_schedule_tokens_are_rejected() {
    assert!(parse_thread_title(
        "General questions about the guild",
        tuesday_reference(),
        EventOrigin::default(),
    )
    .is_none());
}

#[test]
fn title_that_is_only_tokens_is_rejected() {
    assert!(parse_thread_title("Sundays 8pm ET", tuesday_reference(), EventOrigin::default())
        .is_none());
}

#[test]
fn title_without_a_time_expression_is_rejected() {
    assert!(parse_thread_title(
        "Mondays Sebilis key farming",
        tuesday_reference(),
        EventOrigin::default(),
    )
    .is_none());
}

#[test]
fn weekday_mention_alone_is_not_a_schedule() {
    // Ordinary discussion that happens to name a day must not turn into
    // an event in the canonical file or the mirrors.
    assert!(parse_thread_title(
        "Question about Friday raid requirements",
        tuesday_reference(),
        EventOrigin::default(),
    )
    .is_none());
}
