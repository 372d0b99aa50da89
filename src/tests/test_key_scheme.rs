use chrono::{NaiveDate, Utc};

use super::support::{epoch, segment};
use crate::{Clock, KeyScheme, SystemClock, TiergateError, UtcDay};

#[test]
fn keys_follow_entity_and_sort_key_layout() {
    let scheme = KeyScheme::default();
    let actor = segment("user_123");
    let action = segment("PRIMM_FEEDBACK");
    let day = UtcDay::parse("2025-03-11").unwrap();

    assert_eq!(
        scheme.minute_key(&actor, &action),
        "tiergate:USER#user_123#PRIMM_FEEDBACK:MINUTE_TRACK#LATEST"
    );
    assert_eq!(
        scheme.actor_daily_key(&actor, &action, &day),
        "tiergate:USER#user_123#PRIMM_FEEDBACK:DAILY_COUNT#2025-03-11"
    );
    assert_eq!(
        scheme.global_daily_key(&action, &day),
        "tiergate:GLOBAL#PRIMM_FEEDBACK:DAILY_COUNT#2025-03-11"
    );

    let keys = scheme.tier_keys(&actor, &action, &day);
    assert_eq!(keys.minute, scheme.minute_key(&actor, &action));
    assert_eq!(keys.actor_daily, scheme.actor_daily_key(&actor, &action, &day));
    assert_eq!(keys.global_daily, scheme.global_daily_key(&action, &day));
}

#[test]
fn custom_prefix_is_applied_to_every_key() {
    let scheme = KeyScheme::new(segment("svc"));
    let day = UtcDay::parse("2025-01-01").unwrap();
    let keys = scheme.tier_keys(&segment("a"), &segment("X"), &day);

    assert_eq!(scheme.prefix().as_str(), "svc");
    assert!(keys.minute.starts_with("svc:"));
    assert!(keys.actor_daily.starts_with("svc:"));
    assert!(keys.global_daily.starts_with("svc:"));
}

#[test]
fn distinct_actors_and_actions_never_share_keys() {
    let scheme = KeyScheme::default();
    let day = UtcDay::parse("2025-03-11").unwrap();

    let a = scheme.tier_keys(&segment("alice"), &segment("FEEDBACK"), &day);
    let b = scheme.tier_keys(&segment("bob"), &segment("FEEDBACK"), &day);
    let c = scheme.tier_keys(&segment("alice"), &segment("HINT"), &day);

    assert_ne!(a.minute, b.minute);
    assert_ne!(a.actor_daily, b.actor_daily);
    assert_eq!(a.global_daily, b.global_daily);

    assert_ne!(a.minute, c.minute);
    assert_ne!(a.actor_daily, c.actor_daily);
    assert_ne!(a.global_daily, c.global_daily);
}

#[test]
fn daily_keys_roll_over_at_utc_midnight() {
    let scheme = KeyScheme::default();
    let actor = segment("user_123");
    let action = segment("FEEDBACK");

    let before = UtcDay::from_epoch_seconds(epoch(2025, 3, 11, 23, 59, 59)).unwrap();
    let after = UtcDay::from_epoch_seconds(epoch(2025, 3, 12, 0, 0, 0)).unwrap();

    assert_eq!(before.to_string(), "2025-03-11");
    assert_eq!(after.to_string(), "2025-03-12");
    assert_ne!(
        scheme.actor_daily_key(&actor, &action, &before),
        scheme.actor_daily_key(&actor, &action, &after)
    );
    assert_ne!(
        scheme.global_daily_key(&action, &before),
        scheme.global_daily_key(&action, &after)
    );

    // the minute mark is not bucketed by day
    assert_eq!(
        scheme.minute_key(&actor, &action),
        KeyScheme::default().minute_key(&actor, &action)
    );
}

#[test]
fn utc_day_boundaries_and_expiry() {
    let day = UtcDay::from_epoch_seconds(epoch(2025, 3, 11, 9, 30, 15)).unwrap();
    let start = epoch(2025, 3, 11, 0, 0, 0);

    assert_eq!(day.date(), NaiveDate::from_ymd_opt(2025, 3, 11).unwrap());
    assert_eq!(day.start_epoch_seconds(), start);
    assert_eq!(day.next_day_start_epoch_seconds(), epoch(2025, 3, 12, 0, 0, 0));
    assert_eq!(day.expires_at(), start + 90_000);
    assert_eq!(day.expires_at(), epoch(2025, 3, 12, 1, 0, 0));

    assert_eq!(UtcDay::from_epoch_seconds(start).unwrap(), day);
    assert_eq!(UtcDay::from_epoch_seconds(start - 1).unwrap().to_string(), "2025-03-10");
}

#[test]
fn utc_day_before_epoch() {
    let day = UtcDay::from_epoch_seconds(-1).unwrap();

    assert_eq!(day.to_string(), "1969-12-31");
    assert_eq!(day.start_epoch_seconds(), -86_400);
    assert_eq!(day.next_day_start_epoch_seconds(), 0);
}

#[test]
fn utc_day_parse_round_trips_display() {
    let day = UtcDay::parse("2024-02-29").unwrap();
    assert_eq!(day.to_string(), "2024-02-29");
    assert_eq!(day.start_epoch_seconds(), epoch(2024, 2, 29, 0, 0, 0));

    assert!(UtcDay::parse("2025-02-29").is_err());
    assert!(UtcDay::parse("11/03/2025").is_err());
    assert!(UtcDay::parse("").is_err());
}

#[test]
fn utc_day_rejects_out_of_range_timestamps() {
    let err = UtcDay::from_epoch_seconds(i64::MAX).unwrap_err();
    assert!(matches!(err, TiergateError::InvalidTimestamp(i64::MAX)));
}

#[test]
fn system_clock_reports_current_utc_seconds() {
    let before = Utc::now().timestamp();
    let now = SystemClock.now_epoch_seconds();
    let after = Utc::now().timestamp();

    assert!(before <= now && now <= after, "{before} <= {now} <= {after}");
}
