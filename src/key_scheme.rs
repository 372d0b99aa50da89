use std::fmt;

use chrono::{DateTime, NaiveDate, TimeZone, Utc};

use crate::{KeySegment, TiergateError};

const SECONDS_PER_HOUR: i64 = 60 * 60;
const SECONDS_PER_DAY: i64 = 24 * SECONDS_PER_HOUR;

/// Daily records may be reclaimed one day plus one hour after their day starts.
///
/// The extra hour absorbs clock skew between the writer and the store.
const DAILY_RECORD_TTL_SECONDS: i64 = SECONDS_PER_DAY + SECONDS_PER_HOUR;

const MINUTE_TRACK_SUFFIX: &str = "MINUTE_TRACK#LATEST";
const DAILY_COUNT_PREFIX: &str = "DAILY_COUNT#";

/// A UTC calendar day, the bucket for daily counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UtcDay {
    date: NaiveDate,
    start_epoch_seconds: i64,
}

impl UtcDay {
    /// The UTC day containing `epoch_seconds`.
    pub fn from_epoch_seconds(epoch_seconds: i64) -> Result<Self, TiergateError> {
        let date = DateTime::<Utc>::from_timestamp(epoch_seconds, 0)
            .ok_or(TiergateError::InvalidTimestamp(epoch_seconds))?
            .date_naive();

        Self::from_date(date).ok_or(TiergateError::InvalidTimestamp(epoch_seconds))
    }

    /// Parse a `YYYY-MM-DD` date string.
    pub fn parse(date: &str) -> Result<Self, TiergateError> {
        let parsed = NaiveDate::parse_from_str(date, "%Y-%m-%d").map_err(|err| {
            TiergateError::InvalidKeySegment(format!("invalid UTC date {date:?}: {err}"))
        })?;

        Self::from_date(parsed).ok_or_else(|| {
            TiergateError::InvalidKeySegment(format!("UTC date {date:?} is out of range"))
        })
    }

    fn from_date(date: NaiveDate) -> Option<Self> {
        let midnight = date.and_hms_opt(0, 0, 0)?;
        let start_epoch_seconds = Utc.from_utc_datetime(&midnight).timestamp();

        Some(Self {
            date,
            start_epoch_seconds,
        })
    }

    /// Calendar date of this day.
    pub fn date(&self) -> NaiveDate {
        self.date
    }

    /// Epoch seconds of 00:00:00 UTC on this day.
    pub fn start_epoch_seconds(&self) -> i64 {
        self.start_epoch_seconds
    }

    /// Epoch seconds at which the next UTC day starts.
    pub fn next_day_start_epoch_seconds(&self) -> i64 {
        self.start_epoch_seconds.saturating_add(SECONDS_PER_DAY)
    }

    /// Reclamation point for this day's counter records: start of day + 25 hours.
    pub fn expires_at(&self) -> i64 {
        self.start_epoch_seconds.saturating_add(DAILY_RECORD_TTL_SECONDS)
    }
}

impl fmt::Display for UtcDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.date.format("%Y-%m-%d"))
    }
}

/// The three store keys touched by one guarded call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TierKeys {
    /// Key of the actor's minute mark.
    pub minute: String,
    /// Key of the actor's counter for the day.
    pub actor_daily: String,
    /// Key of the action type's global counter for the day.
    pub global_daily: String,
}

/// Deterministic mapping from (actor, action type, tier, period) to store keys.
///
/// Layout, with `P` the prefix:
///
/// - minute mark: `P:USER#<actor>#<action>:MINUTE_TRACK#LATEST`
/// - actor daily: `P:USER#<actor>#<action>:DAILY_COUNT#<YYYY-MM-DD>`
/// - global daily: `P:GLOBAL#<action>:DAILY_COUNT#<YYYY-MM-DD>`
///
/// Daily counters reset by construction: a new day yields a new key.
#[derive(Debug, Clone)]
pub struct KeyScheme {
    prefix: KeySegment,
}

impl Default for KeyScheme {
    fn default() -> Self {
        Self::new(KeySegment::default_prefix())
    }
}

impl KeyScheme {
    /// Create a scheme whose keys all start with `prefix`.
    pub fn new(prefix: KeySegment) -> Self {
        Self { prefix }
    }

    /// The key prefix.
    pub fn prefix(&self) -> &KeySegment {
        &self.prefix
    }

    fn actor_entity(&self, actor: &KeySegment, action_type: &KeySegment) -> String {
        format!("{}:USER#{}#{}", self.prefix, actor, action_type)
    }

    fn global_entity(&self, action_type: &KeySegment) -> String {
        format!("{}:GLOBAL#{}", self.prefix, action_type)
    }

    /// Key of the actor's most recent admitted call time for `action_type`.
    pub fn minute_key(&self, actor: &KeySegment, action_type: &KeySegment) -> String {
        format!(
            "{}:{}",
            self.actor_entity(actor, action_type),
            MINUTE_TRACK_SUFFIX
        )
    }

    /// Key of the actor's call counter for `action_type` on `day`.
    pub fn actor_daily_key(
        &self,
        actor: &KeySegment,
        action_type: &KeySegment,
        day: &UtcDay,
    ) -> String {
        format!(
            "{}:{}{}",
            self.actor_entity(actor, action_type),
            DAILY_COUNT_PREFIX,
            day
        )
    }

    /// Key of the all-actors call counter for `action_type` on `day`.
    pub fn global_daily_key(&self, action_type: &KeySegment, day: &UtcDay) -> String {
        format!(
            "{}:{}{}",
            self.global_entity(action_type),
            DAILY_COUNT_PREFIX,
            day
        )
    }

    /// All three keys for one call.
    pub fn tier_keys(
        &self,
        actor: &KeySegment,
        action_type: &KeySegment,
        day: &UtcDay,
    ) -> TierKeys {
        TierKeys {
            minute: self.minute_key(actor, action_type),
            actor_daily: self.actor_daily_key(actor, action_type, day),
            global_daily: self.global_daily_key(action_type, day),
        }
    }
}
